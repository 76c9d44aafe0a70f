//! In-memory stand-in for the PPDA reporting REST backend.
//!
//! # Design
//! Serves the same routes, filters and error bodies the dashboard client
//! consumes, backed by plain vectors behind a `RwLock`. Every request bumps a
//! hit counter so tests can tell whether the client went to the network or
//! answered from its cache. POST routes enforce the `X-CSRFToken` header the
//! way the production backend does.

pub mod models;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};

use models::{
    organismo_display, parse_date, CreateMedidaAvance, CreateOrganismo, CreatePpda, Medida,
    MedidaAvance, Organismo, Ppda, ReporteAnual, ResumenAnual, ESTADOS, TIPOS_ORGANISMO,
};

pub const DEFAULT_CSRF_TOKEN: &str = "mock-csrf-token";
pub const CSRF_HEADER: &str = "x-csrftoken";

#[derive(Default)]
struct Tables {
    organismos: Vec<Organismo>,
    ppdas: Vec<Ppda>,
    medidas: Vec<Medida>,
    avances: Vec<MedidaAvance>,
    reportes: Vec<ReporteAnual>,
}

pub struct AppState {
    tables: RwLock<Tables>,
    hits: AtomicUsize,
    csrf_token: String,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Empty backend accepting `csrf_token` on POST routes.
    pub fn new(csrf_token: &str) -> SharedState {
        Self::with_tables(csrf_token, Tables::default())
    }

    /// Backend pre-loaded with a small, fixed data set.
    ///
    /// Ids are 1-based per table: organismos SEA=1, SEC=2, CONAF=3; planes 1
    /// (CONAF) and 2 (SEA); medidas 1 and 2 under plan 1, 3 under plan 2.
    pub fn seeded(csrf_token: &str) -> SharedState {
        Self::with_tables(csrf_token, seed())
    }

    fn with_tables(csrf_token: &str, tables: Tables) -> SharedState {
        Arc::new(Self {
            tables: RwLock::new(tables),
            hits: AtomicUsize::new(0),
            csrf_token: csrf_token.to_string(),
        })
    }

    /// Number of requests served so far, whatever their outcome.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub fn app() -> Router {
    app_with_state(AppState::new(DEFAULT_CSRF_TOKEN))
}

pub fn app_with_state(state: SharedState) -> Router {
    Router::new()
        .route(
            "/api/organismos-sectoriales/",
            get(list_organismos).post(create_organismo),
        )
        .route("/api/planes-ppda/", get(list_ppdas).post(create_ppda))
        .route("/api/planes-ppda/{id}/medidas/", get(list_medidas_por_ppda))
        .route(
            "/api/medidas-avance/",
            get(list_medidas_avance).post(create_medida_avance),
        )
        .route("/api/reportes-anuales/", get(list_reportes))
        .route("/api/reportes-anuales/resumen_anual/", get(resumen_anual))
        .layer(middleware::from_fn_with_state(state.clone(), count_hits))
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: SharedState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

async fn count_hits(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let method = request.method().clone();
    let uri = request.uri().clone();
    let response = next.run(request).await;
    tracing::info!(%method, %uri, status = response.status().as_u16(), "handled request");
    response
}

type HandlerResult<T> = Result<T, Response>;

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn check_csrf(state: &AppState, headers: &HeaderMap) -> HandlerResult<()> {
    let supplied = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
    if supplied == Some(state.csrf_token.as_str()) {
        return Ok(());
    }
    tracing::warn!("rejected POST without a valid CSRF token");
    Err((
        StatusCode::FORBIDDEN,
        Json(json!({ "detail": "CSRF Failed: CSRF token missing or incorrect." })),
    )
        .into_response())
}

/// Treat empty query values as absent, the way the backend's filters do.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_id(field: &str, raw: &str) -> HandlerResult<u64> {
    raw.parse()
        .map_err(|_| error(StatusCode::BAD_REQUEST, format!("{field} inválido: {raw}")))
}

fn require_date(field: &str, raw: &str) -> HandlerResult<NaiveDate> {
    parse_date(raw).ok_or_else(|| {
        error(
            StatusCode::BAD_REQUEST,
            format!("{field}: formato de fecha inválido"),
        )
    })
}

// --- organismos ---

#[derive(Deserialize)]
struct OrganismoFilter {
    nombre: Option<String>,
}

async fn list_organismos(
    State(state): State<SharedState>,
    Query(filter): Query<OrganismoFilter>,
) -> Json<Vec<Organismo>> {
    let tables = state.tables.read().await;
    let needle = non_empty(&filter.nombre).map(str::to_lowercase);
    let mut rows: Vec<Organismo> = tables
        .organismos
        .iter()
        .filter(|o| {
            needle
                .as_deref()
                .is_none_or(|n| o.nombre.to_lowercase().contains(n))
        })
        .cloned()
        .collect();
    rows.sort_by(|a, b| a.nombre.cmp(&b.nombre));
    Json(rows)
}

async fn create_organismo(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(input): Json<CreateOrganismo>,
) -> HandlerResult<(StatusCode, Json<Organismo>)> {
    check_csrf(&state, &headers)?;
    if !TIPOS_ORGANISMO.iter().any(|(code, _)| *code == input.nombre) {
        return Err(error(
            StatusCode::BAD_REQUEST,
            format!("\"{}\" no es una elección válida.", input.nombre),
        ));
    }
    let mut tables = state.tables.write().await;
    if tables.organismos.iter().any(|o| o.nombre == input.nombre) {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "Ya existe un organismo sectorial con este nombre.",
        ));
    }
    let organismo = Organismo {
        id: tables.organismos.len() as u64 + 1,
        nombre: input.nombre,
        contacto: input.contacto,
        telefono: input.telefono,
    };
    tables.organismos.push(organismo.clone());
    Ok((StatusCode::CREATED, Json(organismo)))
}

// --- planes ppda ---

#[derive(Deserialize)]
struct PpdaFilter {
    organismo_id: Option<String>,
}

async fn list_ppdas(
    State(state): State<SharedState>,
    Query(filter): Query<PpdaFilter>,
) -> HandlerResult<Json<Vec<Ppda>>> {
    let organismo_id = non_empty(&filter.organismo_id)
        .map(|raw| parse_id("organismo_id", raw))
        .transpose()?;
    let tables = state.tables.read().await;
    let mut rows: Vec<Ppda> = tables
        .ppdas
        .iter()
        .filter(|p| organismo_id.is_none_or(|id| p.organismo_id == Some(id)))
        .cloned()
        .collect();
    rows.sort_by(|a, b| b.fecha_creacion.cmp(&a.fecha_creacion).then(b.id.cmp(&a.id)));
    Ok(Json(rows))
}

async fn create_ppda(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(input): Json<CreatePpda>,
) -> HandlerResult<(StatusCode, Json<Ppda>)> {
    check_csrf(&state, &headers)?;
    let fecha_inicio = require_date("fecha_inicio", &input.fecha_inicio)?;
    let fecha_termino = require_date("fecha_termino", &input.fecha_termino)?;
    if fecha_inicio < Utc::now().date_naive() {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "La fecha de inicio no puede ser en el pasado.",
        ));
    }
    if fecha_inicio > fecha_termino {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "La fecha de inicio no puede ser posterior a la fecha de término.",
        ));
    }
    let mut tables = state.tables.write().await;
    let organismo_nombre = match input.organismo {
        Some(id) => {
            let organismo = tables
                .organismos
                .iter()
                .find(|o| o.id == id)
                .ok_or_else(|| error(StatusCode::BAD_REQUEST, format!("organismo {id} no existe")))?;
            Some(organismo_display(&organismo.nombre))
        }
        None => None,
    };
    let ppda = Ppda {
        id: tables.ppdas.len() as u64 + 1,
        nombre: input.nombre,
        descripcion: input.descripcion,
        fecha_inicio,
        fecha_termino,
        organismo_nombre,
        fecha_creacion: Utc::now(),
        organismo_id: input.organismo,
    };
    tables.ppdas.push(ppda.clone());
    Ok((StatusCode::CREATED, Json(ppda)))
}

async fn list_medidas_por_ppda(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> HandlerResult<Json<Vec<MedidaAvance>>> {
    let tables = state.tables.read().await;
    if !tables.ppdas.iter().any(|p| p.id == id) {
        return Err((StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response());
    }
    let medida_ids: Vec<u64> = tables
        .medidas
        .iter()
        .filter(|m| m.ppda_id == Some(id))
        .map(|m| m.id)
        .collect();
    let rows = tables
        .avances
        .iter()
        .filter(|a| medida_ids.contains(&a.medida_id))
        .cloned()
        .collect();
    Ok(Json(rows))
}

// --- medidas de avance ---

#[derive(Deserialize)]
struct MedidaAvanceFilter {
    estado: Option<String>,
    avance_min: Option<String>,
}

async fn list_medidas_avance(
    State(state): State<SharedState>,
    Query(filter): Query<MedidaAvanceFilter>,
) -> HandlerResult<Json<Vec<MedidaAvance>>> {
    let avance_min: Option<u8> = non_empty(&filter.avance_min)
        .map(|raw| {
            raw.parse()
                .map_err(|_| error(StatusCode::BAD_REQUEST, format!("avance_min inválido: {raw}")))
        })
        .transpose()?;
    let estado = non_empty(&filter.estado);
    let tables = state.tables.read().await;
    let mut rows: Vec<MedidaAvance> = tables
        .avances
        .iter()
        .filter(|a| estado.is_none_or(|e| a.estado == e))
        .filter(|a| avance_min.is_none_or(|min| a.avance >= min))
        .cloned()
        .collect();
    rows.sort_by(|a, b| {
        b.fecha_actualizacion
            .cmp(&a.fecha_actualizacion)
            .then(b.id.cmp(&a.id))
    });
    Ok(Json(rows))
}

async fn create_medida_avance(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(input): Json<CreateMedidaAvance>,
) -> HandlerResult<(StatusCode, Json<MedidaAvance>)> {
    check_csrf(&state, &headers)?;
    if !(0..=100).contains(&input.avance) {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "El avance debe estar entre 0 y 100.",
        ));
    }
    if !ESTADOS.iter().any(|(code, _)| *code == input.estado) {
        return Err(error(
            StatusCode::BAD_REQUEST,
            format!("\"{}\" no es una elección válida.", input.estado),
        ));
    }
    let fecha_limite = require_date("fecha_limite", &input.fecha_limite)?;
    let mut tables = state.tables.write().await;
    let medida = tables
        .medidas
        .iter()
        .find(|m| m.id == input.medida)
        .cloned()
        .ok_or_else(|| {
            error(
                StatusCode::BAD_REQUEST,
                format!("medida {} no existe", input.medida),
            )
        })?;
    let avance = MedidaAvance {
        id: tables.avances.len() as u64 + 1,
        medida_nombre: medida.nombre.clone(),
        medida_tipo: medida.tipo_display().to_string(),
        descripcion: input.descripcion,
        fecha_limite,
        avance: input.avance as u8,
        estado: input.estado,
        observaciones: input.observaciones,
        fecha_actualizacion: Utc::now(),
        medida_id: medida.id,
    };
    tables.avances.push(avance.clone());
    Ok((StatusCode::CREATED, Json(avance)))
}

// --- reportes anuales ---

#[derive(Deserialize)]
struct ReporteFilter {
    periodo: Option<String>,
    organismo_id: Option<String>,
}

async fn list_reportes(
    State(state): State<SharedState>,
    Query(filter): Query<ReporteFilter>,
) -> HandlerResult<Json<Vec<ReporteAnual>>> {
    let periodo = non_empty(&filter.periodo)
        .map(|raw| require_date("periodo", raw))
        .transpose()?;
    let organismo_id = non_empty(&filter.organismo_id)
        .map(|raw| parse_id("organismo_id", raw))
        .transpose()?;
    let tables = state.tables.read().await;
    let mut rows: Vec<ReporteAnual> = tables
        .reportes
        .iter()
        .filter(|r| periodo.is_none_or(|p| r.periodo == p))
        .filter(|r| organismo_id.is_none_or(|id| r.organismo_id == id))
        .cloned()
        .collect();
    rows.sort_by(|a, b| b.periodo.cmp(&a.periodo).then(a.id.cmp(&b.id)));
    Ok(Json(rows))
}

async fn resumen_anual(State(state): State<SharedState>) -> Json<Vec<ResumenAnual>> {
    let tables = state.tables.read().await;
    let mut totals: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for reporte in &tables.reportes {
        let entry = totals.entry(reporte.periodo).or_insert((0.0, 0));
        entry.0 += reporte.cumplimiento;
        entry.1 += 1;
    }
    let rows = totals
        .into_iter()
        .map(|(periodo, (sum, count))| ResumenAnual {
            periodo,
            promedio_cumplimiento: (sum / count as f64 * 100.0).round() / 100.0,
        })
        .collect();
    Json(rows)
}

// --- seed data ---

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn seed() -> Tables {
    let created = Utc
        .with_ymd_and_hms(2024, 1, 15, 12, 0, 0)
        .single()
        .unwrap_or_default();

    let organismos = vec![
        Organismo {
            id: 1,
            nombre: "SEA".to_string(),
            contacto: Some("contacto@sea.gob.cl".to_string()),
            telefono: Some("+56 2 2345 6789".to_string()),
        },
        Organismo {
            id: 2,
            nombre: "SEC".to_string(),
            contacto: None,
            telefono: None,
        },
        Organismo {
            id: 3,
            nombre: "CONAF".to_string(),
            contacto: Some("ppda@conaf.cl".to_string()),
            telefono: None,
        },
    ];

    let ppdas = vec![
        Ppda {
            id: 1,
            nombre: "PPDA Concón, Quintero y Puchuncaví".to_string(),
            descripcion: "Plan de prevención y descontaminación atmosférica".to_string(),
            fecha_inicio: date(2024, 3, 1),
            fecha_termino: date(2029, 3, 1),
            organismo_nombre: Some(organismo_display("CONAF")),
            fecha_creacion: created,
            organismo_id: Some(3),
        },
        Ppda {
            id: 2,
            nombre: "PPDA Huasco".to_string(),
            descripcion: String::new(),
            fecha_inicio: date(2024, 6, 1),
            fecha_termino: date(2028, 6, 1),
            organismo_nombre: Some(organismo_display("SEA")),
            fecha_creacion: created,
            organismo_id: Some(1),
        },
    ];

    let medidas = vec![
        Medida {
            id: 1,
            nombre: "Recambio de calefactores".to_string(),
            regulatoria: false,
            ppda_id: Some(1),
        },
        Medida {
            id: 2,
            nombre: "Norma de emisión para fundiciones".to_string(),
            regulatoria: true,
            ppda_id: Some(1),
        },
        Medida {
            id: 3,
            nombre: "Monitoreo de calidad del aire".to_string(),
            regulatoria: false,
            ppda_id: Some(2),
        },
    ];

    let progress = |id: u64, medida: &Medida, avance: u8, estado: &str| MedidaAvance {
        id,
        medida_nombre: medida.nombre.clone(),
        medida_tipo: medida.tipo_display().to_string(),
        descripcion: format!("Avance {id} de {}", medida.nombre),
        fecha_limite: date(2025, 12, 31),
        avance,
        estado: estado.to_string(),
        observaciones: String::new(),
        fecha_actualizacion: created,
        medida_id: medida.id,
    };
    let avances = vec![
        progress(1, &medidas[0], 100, "C"),
        progress(2, &medidas[0], 40, "E"),
        progress(3, &medidas[1], 0, "P"),
        progress(4, &medidas[1], 15, "R"),
        progress(5, &medidas[2], 75, "E"),
    ];

    let reporte = |id: u64, organismo_id: u64, code: &str, periodo: NaiveDate, cumplimiento: f64| {
        ReporteAnual {
            id,
            organismo_nombre: organismo_display(code),
            periodo,
            medida_nombre: medidas[0].nombre.clone(),
            cumplimiento,
            observaciones: None,
            organismo_id,
        }
    };
    let reportes = vec![
        reporte(1, 3, "CONAF", date(2023, 12, 31), 80.0),
        reporte(2, 1, "SEA", date(2023, 12, 31), 65.5),
        reporte(3, 3, "CONAF", date(2024, 12, 31), 90.0),
        reporte(4, 1, "SEA", date(2024, 12, 31), 71.25),
    ];

    Tables {
        organismos,
        ppdas,
        medidas,
        avances,
        reportes,
    }
}
