//! Caching client for the reporting REST API.
//!
//! # Design
//! `ApiClient` splits every call into `build_request` (endpoint + options to
//! an `HttpRequest`) and `parse_response` (an `HttpResponse` to JSON or an
//! `ApiError`). `request` runs the round-trip through a `Transport` and
//! memoizes successful GETs in a `ResponseCache` keyed by URL plus sorted
//! query string.
//!
//! Cached GETs are served for the lifetime of the client. Nothing in this
//! module invalidates on its own; `invalidate` and `clear_cache` are the only
//! ways an entry leaves the cache.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::ResponseCache;
use crate::config::{ClientConfig, ConfigError};
use crate::error::{ApiError, GENERIC_FAILURE};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::query::{CacheKey, QueryParams};
use crate::table::{is_blank, Record};
use crate::transport::{Transport, UreqTransport};
use crate::types::{Resource, ResumenAnual};

pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Form fields converted to UTC timestamps before a create is sent.
pub const DATE_FIELDS: [&str; 2] = ["fecha_inicio", "fecha_termino"];

/// Per-call options for `ApiClient::request`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub method: HttpMethod,
    /// Merged over the default `Content-Type: application/json`.
    pub headers: Vec<(String, String)>,
    pub params: QueryParams,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn get(params: QueryParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient<T = UreqTransport> {
    api_root: String,
    csrf_token: Option<String>,
    transport: T,
    cache: ResponseCache,
}

impl ApiClient<UreqTransport> {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let transport = UreqTransport::new(Duration::from_millis(config.timeout_ms));
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(config: &ClientConfig, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            api_root: config.api_root(),
            csrf_token: config.csrf_token.clone().filter(|t| !t.is_empty()),
            transport,
            cache: ResponseCache::new(),
        })
    }

    /// Absolute URL of `endpoint`, without query string.
    pub fn url(&self, endpoint: &str) -> Result<String, ApiError> {
        if !endpoint.starts_with('/')
            || endpoint.contains("://")
            || endpoint.contains(['?', '#'])
        {
            return Err(ApiError::InvalidEndpoint(endpoint.to_string()));
        }
        Ok(format!("{}{endpoint}", self.api_root))
    }

    pub fn build_request(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<HttpRequest, ApiError> {
        let mut url = self.url(endpoint)?;
        if !options.params.is_empty() {
            url.push('?');
            url.push_str(&options.params.to_query_string());
        }
        let body = options
            .body
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ApiError::Serialize(e.to_string()))?;
        Ok(HttpRequest {
            method: options.method,
            url,
            headers: merge_headers(&options.headers),
            body,
        })
    }

    /// Interpret a response: 2xx bodies parse to JSON, anything else becomes
    /// `ApiError::Http` carrying the body's `error` or `message` field.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Value, ApiError> {
        if !response.is_success() {
            let body: Value = serde_json::from_str(&response.body)?;
            return Err(ApiError::Http {
                status: response.status,
                message: error_message(&body),
            });
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ApiError> {
        let request = self.build_request(endpoint, &options)?;
        let key = CacheKey::new(&self.url(endpoint)?, &options.params);
        let is_get = options.method == HttpMethod::Get;

        if is_get {
            if let Some(hit) = self.cache.get(&key).await {
                debug!(key = %key, "cache hit");
                return Ok(hit);
            }
        }

        debug!(method = options.method.as_str(), url = %request.url, "sending request");
        let result = match self.transport.execute(request).await {
            Ok(response) => self.parse_response(response),
            Err(err) => Err(err),
        };

        match result {
            Ok(value) => {
                if is_get {
                    self.cache.insert(key, value.clone()).await;
                }
                Ok(value)
            }
            Err(err) => {
                warn!(method = options.method.as_str(), endpoint, error = %err, "API request failed");
                Err(err)
            }
        }
    }

    /// GET `endpoint` and deserialize the body into `D`.
    pub async fn fetch_as<D: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &QueryParams,
    ) -> Result<D, ApiError> {
        let value = self
            .request(endpoint, RequestOptions::get(params.clone()))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// GET a collection as raw records.
    pub async fn list(&self, resource: Resource, params: &QueryParams) -> Result<Vec<Record>, ApiError> {
        self.fetch_as(resource.endpoint(), params).await
    }

    pub async fn get_organismos(&self, params: &QueryParams) -> Result<Vec<Record>, ApiError> {
        self.list(Resource::Organismos, params).await
    }

    pub async fn get_ppda_planes(&self, params: &QueryParams) -> Result<Vec<Record>, ApiError> {
        self.list(Resource::PlanesPpda, params).await
    }

    pub async fn get_medidas_avance(&self, params: &QueryParams) -> Result<Vec<Record>, ApiError> {
        self.list(Resource::MedidasAvance, params).await
    }

    pub async fn get_reportes_anuales(&self, params: &QueryParams) -> Result<Vec<Record>, ApiError> {
        self.list(Resource::ReportesAnuales, params).await
    }

    pub async fn get_resumen_anual(&self) -> Result<Vec<ResumenAnual>, ApiError> {
        self.fetch_as("/reportes-anuales/resumen_anual/", &QueryParams::new())
            .await
    }

    /// Progress records of the measures under plan `ppda_id`.
    pub async fn get_medidas_por_ppda(&self, ppda_id: u64) -> Result<Vec<Record>, ApiError> {
        self.fetch_as(
            &format!("/planes-ppda/{ppda_id}/medidas/"),
            &QueryParams::new(),
        )
        .await
    }

    /// POST a new record to `resource`.
    ///
    /// `fecha_inicio` / `fecha_termino` are rewritten as UTC timestamps and
    /// the request carries `X-CSRFToken` (the explicit token, else the
    /// configured one).
    pub async fn create<P: Serialize + ?Sized>(
        &self,
        resource: Resource,
        payload: &P,
        csrf_token: Option<&str>,
    ) -> Result<Value, ApiError> {
        if !resource.accepts_create() {
            return Err(ApiError::InvalidInput(format!(
                "{} does not accept new records",
                resource.endpoint()
            )));
        }
        let token = csrf_token
            .filter(|t| !t.is_empty())
            .or(self.csrf_token.as_deref())
            .ok_or(ApiError::MissingCsrfToken)?;

        let mut body = serde_json::to_value(payload).map_err(|e| ApiError::Serialize(e.to_string()))?;
        normalize_dates(&mut body)?;

        let options = RequestOptions::post(body).with_header(CSRF_HEADER, token);
        let created = self.request(resource.endpoint(), options).await?;
        info!(endpoint = resource.endpoint(), "record created");
        Ok(created)
    }

    /// Drop every cached GET of `endpoint`, whatever its parameters.
    pub async fn invalidate(&self, endpoint: &str) -> Result<usize, ApiError> {
        let url = self.url(endpoint)?;
        let removed = self.cache.invalidate_url(&url).await;
        debug!(endpoint, removed, "cache invalidated");
        Ok(removed)
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.len().await
    }
}

fn merge_headers(overrides: &[(String, String)]) -> Vec<(String, String)> {
    let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    for (name, value) in overrides {
        match headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value.clone(),
            None => headers.push((name.clone(), value.clone())),
        }
    }
    headers
}

/// `error`, then `message`, then the generic fallback. Scalars count as
/// text; blank values (`null`, `false`, `0`, `""`) and nested structures do
/// not.
fn error_message(body: &Value) -> String {
    ["error", "message"]
        .iter()
        .filter_map(|field| body.get(field))
        .find_map(message_text)
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

fn message_text(value: &Value) -> Option<String> {
    if is_blank(value) {
        return None;
    }
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) => Some(value.to_string()),
        _ => None,
    }
}

/// Rewrite the known date fields of a JSON object in place.
pub fn normalize_dates(body: &mut Value) -> Result<(), ApiError> {
    let Some(fields) = body.as_object_mut() else {
        return Ok(());
    };
    for name in DATE_FIELDS {
        if let Some(Value::String(raw)) = fields.get_mut(name) {
            if raw.trim().is_empty() {
                continue;
            }
            let normalized = to_utc_timestamp(raw)
                .ok_or_else(|| ApiError::InvalidInput(format!("{name}: invalid date {raw:?}")))?;
            *raw = normalized;
        }
    }
    Ok(())
}

/// Offset-less forms a `datetime-local` input or a hand-typed value may take.
/// `%.f` also matches whole seconds.
const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// `YYYY-MM-DDTHH:MM:SS.sssZ`. Plain dates are midnight UTC; timestamps
/// without an offset are read as UTC.
pub fn to_utc_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        date.and_hms_opt(0, 0, 0)?.and_utc()
    } else if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt.with_timezone(&Utc)
    } else {
        NAIVE_DATETIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())?
            .and_utc()
    };
    Some(parsed.to_rfc3339_opts(SecondsFormat::Millis, true))
}
