//! Dashboard driver: tabs, paging, retry and form submission.
//!
//! # Design
//! Each tab is a closed `Tab` variant that knows its resource and columns, so
//! there is no lookup by name. `load` always yields a `Panel`: either the
//! rendered table or the error message together with the `LoadRequest` that
//! reproduces the failed call, which is what a "retry" button hands back to
//! `retry`. Page state lives here, not in the renderer.

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::chart::{summary_chart, ChartView};
use crate::client::ApiClient;
use crate::config::{ConfigError, DashboardConfig};
use crate::error::ApiError;
use crate::query::QueryParams;
use crate::table::{render_table, FieldSpec, PageChange, RenderOptions, TableView, PLACEHOLDER};
use crate::transport::{Transport, UreqTransport};
use crate::types::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Organismos,
    PpdaPlanes,
    MedidasAvance,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Organismos, Tab::PpdaPlanes, Tab::MedidasAvance];

    pub fn resource(&self) -> Resource {
        match self {
            Tab::Organismos => Resource::Organismos,
            Tab::PpdaPlanes => Resource::PlanesPpda,
            Tab::MedidasAvance => Resource::MedidasAvance,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Organismos => "Organismos Sectoriales",
            Tab::PpdaPlanes => "Planes PPDA",
            Tab::MedidasAvance => "Medidas de Avance",
        }
    }

    pub fn fields(&self) -> Vec<FieldSpec> {
        match self {
            Tab::Organismos => vec![
                FieldSpec::new("id", "ID"),
                FieldSpec::new("nombre", "Nombre"),
                FieldSpec::new("contacto", "Contacto"),
                FieldSpec::new("telefono", "Teléfono"),
            ],
            Tab::PpdaPlanes => vec![
                FieldSpec::new("id", "ID"),
                FieldSpec::new("nombre", "Nombre"),
                FieldSpec::new("fecha_inicio", "Inicio"),
                FieldSpec::new("fecha_termino", "Término"),
                FieldSpec::new("organismo_nombre", "Organismo"),
            ],
            Tab::MedidasAvance => vec![
                FieldSpec::new("id", "ID"),
                FieldSpec::new("medida_nombre", "Medida"),
                FieldSpec::new("avance", "Avance").with_formatter(format_percent),
                FieldSpec::new("estado", "Estado").with_formatter(format_estado),
            ],
        }
    }
}

/// `45` → `45%`. Zero is a real progress value here, not a blank.
fn format_percent(value: Option<&Value>) -> String {
    match value.and_then(Value::as_f64) {
        Some(n) if n.fract() == 0.0 => format!("{}%", n as i64),
        Some(n) => format!("{n}%"),
        None => PLACEHOLDER.to_string(),
    }
}

fn format_estado(value: Option<&Value>) -> String {
    match value.and_then(Value::as_str) {
        Some("P") => "Pendiente".to_string(),
        Some("E") => "En progreso".to_string(),
        Some("C") => "Completado".to_string(),
        Some("R") => "Retrasado".to_string(),
        Some(other) if !other.is_empty() => other.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

/// Everything needed to repeat a tab load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub tab: Tab,
    pub params: QueryParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Panel {
    Table { tab: Tab, view: TableView },
    Failed { message: String, retry: LoadRequest },
}

impl Panel {
    pub fn view(&self) -> Option<&TableView> {
        match self {
            Panel::Table { view, .. } => Some(view),
            Panel::Failed { .. } => None,
        }
    }
}

pub struct Dashboard<T = UreqTransport> {
    client: ApiClient<T>,
    per_page: usize,
    invalidate_on_submit: bool,
    active: Option<LoadRequest>,
    page: usize,
}

impl Dashboard<UreqTransport> {
    pub fn new(config: &DashboardConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = ApiClient::new(&config.client)?;
        Ok(Self::with_client(client, config))
    }
}

impl<T: Transport> Dashboard<T> {
    pub fn with_client(client: ApiClient<T>, config: &DashboardConfig) -> Self {
        Self {
            client,
            per_page: config.per_page.max(1),
            invalidate_on_submit: config.invalidate_on_submit,
            active: None,
            page: 1,
        }
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn active(&self) -> Option<&LoadRequest> {
        self.active.as_ref()
    }

    /// Show `tab` filtered by `params`. A different tab or filter set starts
    /// again at page 1.
    pub async fn load(&mut self, tab: Tab, params: QueryParams) -> Panel {
        let request = LoadRequest { tab, params };
        if self.active.as_ref() != Some(&request) {
            self.page = 1;
        }
        self.show(request).await
    }

    /// Repeat a failed load, keeping the current page.
    pub async fn retry(&mut self, request: &LoadRequest) -> Panel {
        self.show(request.clone()).await
    }

    /// Move the active tab to another page. `None` when no tab is showing.
    pub async fn change_page(&mut self, change: PageChange) -> Option<Panel> {
        let request = self.active.clone()?;
        self.page = change.page.max(1);
        Some(self.show(request).await)
    }

    /// Create a record from a form and reload its tab. When that tab is the
    /// one showing, its filters and page are kept; otherwise it opens at
    /// page 1 without filters.
    pub async fn submit<P: Serialize + ?Sized>(
        &mut self,
        tab: Tab,
        payload: &P,
        csrf_token: Option<&str>,
    ) -> Result<Panel, ApiError> {
        let resource = tab.resource();
        self.client.create(resource, payload, csrf_token).await?;
        if self.invalidate_on_submit {
            self.client.invalidate(resource.endpoint()).await?;
        }
        info!(tab = tab.title(), "record saved, reloading tab");
        let panel = match self.active.clone() {
            Some(active) if active.tab == tab => self.show(active).await,
            _ => self.load(tab, QueryParams::new()).await,
        };
        Ok(panel)
    }

    /// Annual compliance chart.
    pub async fn summary(&self) -> Result<ChartView, ApiError> {
        let resumen = self.client.get_resumen_anual().await.inspect_err(|err| {
            error!(error = %err, "failed to load annual summary");
        })?;
        Ok(summary_chart(&resumen))
    }

    async fn show(&mut self, request: LoadRequest) -> Panel {
        self.active = Some(request.clone());
        match self
            .client
            .list(request.tab.resource(), &request.params)
            .await
        {
            Ok(records) => {
                let options = RenderOptions::paginated(self.page, self.per_page);
                Panel::Table {
                    tab: request.tab,
                    view: render_table(&records, &request.tab.fields(), &options),
                }
            }
            Err(err) => {
                error!(tab = request.tab.title(), error = %err, "failed to load tab");
                Panel::Failed {
                    message: err.message(),
                    retry: request,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::table::Table;
    use crate::testing::ScriptedTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn dashboard(
        transport: &Arc<ScriptedTransport>,
        per_page: usize,
        invalidate_on_submit: bool,
    ) -> Dashboard<Arc<ScriptedTransport>> {
        let client_config = ClientConfig::new("http://backend.test").with_csrf_token("tok");
        let mut config = DashboardConfig::new(client_config.clone());
        config.per_page = per_page;
        config.invalidate_on_submit = invalidate_on_submit;
        let client = ApiClient::with_transport(&client_config, transport.clone()).unwrap();
        Dashboard::with_client(client, &config)
    }

    fn avances(n: u64) -> Value {
        Value::Array(
            (1..=n)
                .map(|id| json!({"id": id, "medida_nombre": "Recambio", "avance": id * 10, "estado": "E"}))
                .collect(),
        )
    }

    fn table(panel: &Panel) -> &Table {
        panel.view().and_then(TableView::as_table).unwrap()
    }

    #[test]
    fn medidas_columns_format_progress_and_state() {
        let record = json!({"id": 1, "medida_nombre": "Recambio", "avance": 0, "estado": "C"})
            .as_object()
            .cloned()
            .unwrap();
        let texts: Vec<String> = Tab::MedidasAvance
            .fields()
            .iter()
            .map(|f| f.render(&record))
            .collect();
        assert_eq!(texts, ["1", "Recambio", "0%", "Completado"]);
    }

    #[test]
    fn percent_formatter_edges() {
        assert_eq!(format_percent(Some(&json!(12.5))), "12.5%");
        assert_eq!(format_percent(Some(&json!("x"))), PLACEHOLDER);
        assert_eq!(format_percent(None), PLACEHOLDER);
        assert_eq!(format_estado(Some(&json!("Z"))), "Z");
        assert_eq!(format_estado(None), PLACEHOLDER);
    }

    #[test]
    fn every_tab_maps_to_a_creatable_resource() {
        for tab in Tab::ALL {
            assert!(tab.resource().accepts_create(), "{}", tab.title());
            assert!(!tab.fields().is_empty());
        }
    }

    #[tokio::test]
    async fn load_renders_first_page() {
        let transport = Arc::new(ScriptedTransport::always(200, avances(5)));
        let mut dash = dashboard(&transport, 2, false);

        let panel = dash.load(Tab::MedidasAvance, QueryParams::new()).await;
        let table = table(&panel);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].cells[2].text, "10%");
        assert_eq!(table.pagination.as_ref().unwrap().page_count(), 3);
        assert_eq!(dash.page(), 1);
    }

    #[tokio::test]
    async fn page_change_reuses_the_cache() {
        let transport = Arc::new(ScriptedTransport::always(200, avances(5)));
        let mut dash = dashboard(&transport, 2, false);
        dash.load(Tab::MedidasAvance, QueryParams::new().with("estado", "E"))
            .await;

        let panel = dash.change_page(PageChange { page: 3 }).await.unwrap();
        let table = table(&panel);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].cells[0].text, "5");
        assert_eq!(table.pagination.as_ref().unwrap().active_page(), Some(3));
        assert_eq!(transport.calls(), 1);
        assert_eq!(
            dash.active().unwrap().params,
            QueryParams::new().with("estado", "E")
        );
    }

    #[tokio::test]
    async fn page_change_without_active_tab_is_ignored() {
        let transport = Arc::new(ScriptedTransport::always(200, avances(1)));
        let mut dash = dashboard(&transport, 2, false);
        assert!(dash.change_page(PageChange { page: 2 }).await.is_none());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn switching_tabs_resets_the_page() {
        let transport = Arc::new(ScriptedTransport::always(200, avances(5)));
        let mut dash = dashboard(&transport, 2, false);
        dash.load(Tab::MedidasAvance, QueryParams::new()).await;
        dash.change_page(PageChange { page: 2 }).await;
        assert_eq!(dash.page(), 2);

        dash.load(Tab::PpdaPlanes, QueryParams::new()).await;
        assert_eq!(dash.page(), 1);
    }

    #[tokio::test]
    async fn failure_carries_a_retry_that_succeeds() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_json(503, json!({"error": "servicio no disponible"}))
            .push_json(200, avances(1));
        let mut dash = dashboard(&transport, 10, false);
        let params = QueryParams::new().with("avance_min", "10");

        let panel = dash.load(Tab::MedidasAvance, params.clone()).await;
        let Panel::Failed { message, retry } = panel else {
            panic!("expected a failed panel");
        };
        assert_eq!(message, "servicio no disponible");
        assert_eq!(
            retry,
            LoadRequest {
                tab: Tab::MedidasAvance,
                params
            }
        );

        let panel = dash.retry(&retry).await;
        assert_eq!(table(&panel).rows.len(), 1);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn empty_listing_shows_placeholder() {
        let transport = Arc::new(ScriptedTransport::always(200, json!([])));
        let mut dash = dashboard(&transport, 10, false);
        let panel = dash.load(Tab::Organismos, QueryParams::new()).await;
        assert!(panel.view().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_reload_is_stale_by_default() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_json(200, json!([{"id": 1, "nombre": "SEA"}]))
            .push_json(201, json!({"id": 2, "nombre": "SAG"}));
        let mut dash = dashboard(&transport, 10, false);
        dash.load(Tab::Organismos, QueryParams::new()).await;

        let panel = dash
            .submit(Tab::Organismos, &json!({"nombre": "SAG"}), None)
            .await
            .unwrap();
        assert_eq!(table(&panel).rows.len(), 1);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn submit_can_invalidate_before_reloading() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_json(200, json!([{"id": 1, "nombre": "SEA"}]))
            .push_json(201, json!({"id": 2, "nombre": "SAG"}))
            .push_json(200, json!([{"id": 1, "nombre": "SEA"}, {"id": 2, "nombre": "SAG"}]));
        let mut dash = dashboard(&transport, 10, true);
        dash.load(Tab::Organismos, QueryParams::new()).await;

        let panel = dash
            .submit(Tab::Organismos, &json!({"nombre": "SAG"}), Some("form-tok"))
            .await
            .unwrap();
        assert_eq!(table(&panel).rows.len(), 2);
        assert_eq!(transport.calls(), 3);
        assert_eq!(
            transport.requests()[1].header("X-CSRFToken"),
            Some("form-tok")
        );
    }

    #[tokio::test]
    async fn submit_keeps_filters_and_page_of_the_active_tab() {
        let transport = Arc::new(ScriptedTransport::new());
        let filters = QueryParams::new().with("estado", "E");
        transport
            .push_json(200, avances(3))
            .push_json(201, json!({"id": 4}))
            .push_json(200, avances(4));
        let mut dash = dashboard(&transport, 2, true);
        dash.load(Tab::MedidasAvance, filters.clone()).await;
        dash.change_page(PageChange { page: 2 }).await;

        let panel = dash
            .submit(Tab::MedidasAvance, &json!({"medida": 1}), None)
            .await
            .unwrap();
        assert_eq!(dash.page(), 2);
        assert_eq!(dash.active().unwrap().params, filters);
        let table = table(&panel);
        assert_eq!(table.pagination.as_ref().unwrap().active_page(), Some(2));
        assert_eq!(table.rows.len(), 2);
        assert_eq!(
            transport.last_request().url,
            "http://backend.test/api/medidas-avance/?estado=E"
        );
    }

    #[tokio::test]
    async fn submit_to_another_tab_opens_it_unfiltered() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_json(200, avances(5))
            .push_json(201, json!({"id": 3}))
            .push_json(200, json!([{"id": 1, "nombre": "SEA"}]));
        let mut dash = dashboard(&transport, 2, false);
        dash.load(Tab::MedidasAvance, QueryParams::new().with("estado", "E"))
            .await;
        dash.change_page(PageChange { page: 3 }).await;

        dash.submit(Tab::Organismos, &json!({"nombre": "SEA"}), None)
            .await
            .unwrap();
        assert_eq!(dash.page(), 1);
        assert_eq!(
            dash.active(),
            Some(&LoadRequest {
                tab: Tab::Organismos,
                params: QueryParams::new()
            })
        );
    }

    #[tokio::test]
    async fn submit_errors_are_returned() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(400, json!({"error": "El avance debe estar entre 0 y 100."}));
        let mut dash = dashboard(&transport, 10, false);
        let err = dash
            .submit(Tab::MedidasAvance, &json!({"avance": 150}), None)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "El avance debe estar entre 0 y 100.");
        assert!(dash.active().is_none());
    }

    #[tokio::test]
    async fn summary_builds_the_chart() {
        let transport = Arc::new(ScriptedTransport::always(
            200,
            json!([{"periodo": "2024-12-31", "promedio_cumplimiento": 80.63}]),
        ));
        let dash = dashboard(&transport, 10, false);
        let chart = dash.summary().await.unwrap();
        assert_eq!(chart.config["data"]["labels"], json!(["2024-12-31"]));
    }
}
