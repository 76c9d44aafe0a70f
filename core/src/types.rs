//! Resources and DTOs of the reporting API.
//!
//! # Design
//! The DTOs mirror the backend serializers but are defined independently of
//! the mock-server crate; the integration tests catch schema drift. Display
//! fields the backend fills in (`organismo_nombre`, `medida_nombre`, ...) are
//! optional because older records may lack them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// REST collections the dashboard talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Organismos,
    PlanesPpda,
    MedidasAvance,
    ReportesAnuales,
}

impl Resource {
    /// Path relative to the API prefix, with leading and trailing slash.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Resource::Organismos => "/organismos-sectoriales/",
            Resource::PlanesPpda => "/planes-ppda/",
            Resource::MedidasAvance => "/medidas-avance/",
            Resource::ReportesAnuales => "/reportes-anuales/",
        }
    }

    /// Whether the dashboard offers a create form for this collection.
    pub fn accepts_create(&self) -> bool {
        !matches!(self, Resource::ReportesAnuales)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organismo {
    pub id: u64,
    pub nombre: String,
    #[serde(default)]
    pub contacto: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ppda {
    pub id: u64,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: String,
    pub fecha_inicio: NaiveDate,
    pub fecha_termino: NaiveDate,
    #[serde(default)]
    pub organismo_nombre: Option<String>,
    #[serde(default)]
    pub fecha_creacion: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedidaAvance {
    pub id: u64,
    #[serde(default)]
    pub medida_nombre: Option<String>,
    #[serde(default)]
    pub medida_tipo: Option<String>,
    pub descripcion: String,
    pub fecha_limite: NaiveDate,
    pub avance: u8,
    pub estado: String,
    #[serde(default)]
    pub observaciones: String,
    #[serde(default)]
    pub fecha_actualizacion: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReporteAnual {
    pub id: u64,
    #[serde(default)]
    pub organismo_nombre: Option<String>,
    pub periodo: NaiveDate,
    #[serde(default)]
    pub medida_nombre: Option<String>,
    pub cumplimiento: f64,
    #[serde(default)]
    pub observaciones: Option<String>,
}

/// One point of the annual compliance summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResumenAnual {
    pub periodo: NaiveDate,
    pub promedio_cumplimiento: f64,
}

/// Create payload for `/organismos-sectoriales/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrganismo {
    pub nombre: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefono: Option<String>,
}

/// Create payload for `/planes-ppda/`. Dates are whatever the form holds;
/// `ApiClient::create` normalizes them before sending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPpda {
    pub nombre: String,
    #[serde(default)]
    pub descripcion: String,
    pub fecha_inicio: String,
    pub fecha_termino: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organismo: Option<u64>,
}

/// Create payload for `/medidas-avance/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMedidaAvance {
    pub medida: u64,
    pub descripcion: String,
    pub fecha_limite: String,
    pub avance: u8,
    pub estado: String,
    #[serde(default)]
    pub observaciones: String,
}
