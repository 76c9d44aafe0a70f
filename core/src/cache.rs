//! Memoized GET responses.
//!
//! Entries live as long as the cache: there is no TTL, no freshness check and
//! no eviction. `ApiClient` never drops an entry on its own; callers that want
//! fresh data use `invalidate_url` or `clear`.
//!
//! Clones share the same storage. The lock is never held across a network
//! call, so two overlapping requests for the same key may both miss and both
//! store; the last write wins.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::query::CacheKey;

#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    entries: Arc<RwLock<HashMap<CacheKey, Value>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, value: Value) {
        self.entries.write().await.insert(key, value);
    }

    /// Drop every entry whose URL (ignoring the query string) is `url`.
    /// Returns how many entries were removed.
    pub async fn invalidate_url(&self, url: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| key.url() != url);
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryParams;
    use serde_json::json;

    fn key(url: &str, params: &[(&str, &str)]) -> CacheKey {
        let params: QueryParams = params.iter().copied().collect();
        CacheKey::new(url, &params)
    }

    #[tokio::test]
    async fn stores_and_returns_values() {
        let cache = ResponseCache::new();
        let k = key("/api/planes-ppda/", &[]);
        assert!(cache.get(&k).await.is_none());
        cache.insert(k.clone(), json!([{"id": 1}])).await;
        assert_eq!(cache.get(&k).await, Some(json!([{"id": 1}])));
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let cache = ResponseCache::new();
        let handle = cache.clone();
        handle
            .insert(key("/api/planes-ppda/", &[]), json!([]))
            .await;
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn invalidate_url_drops_every_param_variant() {
        let cache = ResponseCache::new();
        cache
            .insert(key("/api/medidas-avance/", &[]), json!([]))
            .await;
        cache
            .insert(key("/api/medidas-avance/", &[("estado", "E")]), json!([]))
            .await;
        cache
            .insert(key("/api/planes-ppda/", &[]), json!([]))
            .await;

        assert_eq!(cache.invalidate_url("/api/medidas-avance/").await, 2);
        assert_eq!(cache.len().await, 1);
        assert!(cache
            .get(&CacheKey::new("/api/planes-ppda/", &QueryParams::new()))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn clear_empties_the_cache() {
        let cache = ResponseCache::new();
        cache
            .insert(key("/api/reportes-anuales/", &[]), json!([]))
            .await;
        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
