//! Query parameters and the cache keys derived from them.
//!
//! Parameters are held in a `BTreeMap`, so serialization is always sorted by
//! name. Two callers that build the same parameter set in a different order
//! therefore produce the same query string and the same `CacheKey`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Query parameters for a GET request, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a parameter, replacing any previous value for the same name.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `application/x-www-form-urlencoded` serialization, sorted by name.
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }

    /// Inverse of `to_query_string`. Later duplicates win.
    pub fn parse(query: &str) -> Self {
        form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Identifies a memoized GET: `{url}?{sorted query string}`.
///
/// The `?` is always present, so a request without parameters keys as
/// `{url}?`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(url: &str, params: &QueryParams) -> Self {
        CacheKey(format!("{url}?{}", params.to_query_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The URL part, without the query string.
    pub fn url(&self) -> &str {
        self.0.split_once('?').map_or(self.0.as_str(), |(url, _)| url)
    }

    /// Recover the parameter set this key was built from.
    pub fn params(&self) -> QueryParams {
        self.0
            .split_once('?')
            .map(|(_, query)| QueryParams::parse(query))
            .unwrap_or_default()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const URL: &str = "/api/medidas-avance/";

    #[test]
    fn empty_params_keep_the_separator() {
        let key = CacheKey::new(URL, &QueryParams::new());
        assert_eq!(key.as_str(), "/api/medidas-avance/?");
        assert_eq!(key.url(), URL);
        assert!(key.params().is_empty());
    }

    #[test]
    fn insertion_order_does_not_change_the_key() {
        let a = QueryParams::new().with("estado", "E").with("avance_min", "50");
        let b = QueryParams::new().with("avance_min", "50").with("estado", "E");
        assert_eq!(CacheKey::new(URL, &a), CacheKey::new(URL, &b));
        assert_eq!(
            CacheKey::new(URL, &a).as_str(),
            "/api/medidas-avance/?avance_min=50&estado=E"
        );
    }

    #[test]
    fn values_are_form_encoded() {
        let params = QueryParams::new().with("nombre", "Servicio Agrícola & Ganadero");
        assert_eq!(
            params.to_query_string(),
            "nombre=Servicio+Agr%C3%ADcola+%26+Ganadero"
        );
    }

    #[test]
    fn later_insert_replaces_value() {
        let mut params = QueryParams::new();
        assert_eq!(params.insert("periodo", "2023-12-31"), None);
        assert_eq!(
            params.insert("periodo", "2024-12-31"),
            Some("2023-12-31".to_string())
        );
        assert_eq!(params.get("periodo"), Some("2024-12-31"));
        assert_eq!(params.len(), 1);
    }

    proptest! {
        #[test]
        fn key_is_independent_of_insertion_order(
            pairs in proptest::collection::btree_map("[a-z_]{1,8}", "[ -~]{0,12}", 1..6)
        ) {
            let forward: QueryParams = pairs.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            let backward: QueryParams = pairs.iter().rev().map(|(k, v)| (k.clone(), v.clone())).collect();
            prop_assert_eq!(CacheKey::new(URL, &forward), CacheKey::new(URL, &backward));
        }

        #[test]
        fn query_string_round_trips(
            pairs in proptest::collection::btree_map("\\PC{1,8}", "\\PC{0,12}", 0..6)
        ) {
            let params: QueryParams = pairs.clone().into_iter().collect();
            let key = CacheKey::new(URL, &params);
            prop_assert_eq!(key.url(), URL);
            prop_assert_eq!(key.params(), params);
        }
    }
}
