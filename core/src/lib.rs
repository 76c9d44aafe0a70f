//! Client core for the environmental-plan reporting dashboard.
//!
//! # Overview
//! Talks to the reporting REST API (sector bodies, PPDA plans, progress
//! measures, annual reports), caches GET responses for the session, and turns
//! records into table and chart view-models.
//!
//! # Design
//! - `ApiClient` splits every call into `build_request` / `parse_response`
//!   around a `Transport`, so tests swap the network for scripted replies.
//! - GETs are memoized by URL plus sorted query string in a shared
//!   `ResponseCache`; entries leave only through `invalidate` / `clear_cache`.
//! - `render_table` and `render_chart` produce plain data; `html` is one
//!   backend that turns those into markup.
//! - `Dashboard` owns tab, page and retry state on top of the client.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod cache;
pub mod chart;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod html;
pub mod http;
pub mod query;
pub mod table;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use cache::ResponseCache;
pub use chart::{render_chart, summary_chart, ChartConfig, ChartPoint, ChartView};
pub use client::{ApiClient, RequestOptions};
pub use config::{ClientConfig, ConfigError, DashboardConfig};
pub use dashboard::{Dashboard, LoadRequest, Panel, Tab};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use query::{CacheKey, QueryParams};
pub use table::{render_table, FieldSpec, PageChange, Record, RenderOptions, TableView};
pub use transport::{Transport, UreqTransport};
pub use types::{
    MedidaAvance, NewMedidaAvance, NewOrganismo, NewPpda, Organismo, Ppda, ReporteAnual, Resource,
    ResumenAnual,
};
