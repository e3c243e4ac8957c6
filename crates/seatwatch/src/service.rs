//! The public surface: acquire, look up, and inspect cached vacancy.

use crate::acquisition::{Acquirer, RetryPolicy};
use crate::cache::{CacheStats, TtlCache};
use crate::channel::{DirectChannel, RenderedChannel};
use crate::config::SeatwatchConfig;
use crate::error::VacancyResult;
use crate::renderer::Renderer;
use crate::types::VacancyRecord;
use serde::Serialize;
use std::sync::Arc;

/// Key prefix for acquired records. The scheduler tracks stores by it.
pub const CACHE_NAMESPACE: &str = "vacancy:";

/// Cache key for a store.
pub fn cache_key(store_id: &str) -> String {
    format!("{CACHE_NAMESPACE}{store_id}")
}

/// Store id from a namespaced cache key.
pub fn store_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(CACHE_NAMESPACE).filter(|id| !id.is_empty())
}

/// A cached record together with its age.
#[derive(Debug, Clone, Serialize)]
pub struct CachedRecord {
    #[serde(flatten)]
    pub record: VacancyRecord,
    pub age_secs: u64,
}

/// Acquisition with write-through caching.
pub struct VacancyService {
    acquirer: Acquirer,
    cache: Arc<TtlCache<VacancyRecord>>,
}

impl VacancyService {
    pub fn new(acquirer: Acquirer, cache: Arc<TtlCache<VacancyRecord>>) -> Self {
        Self { acquirer, cache }
    }

    /// Wire both channels, the retry policy and the cache from configuration.
    pub fn from_config(cfg: &SeatwatchConfig, renderer: Arc<dyn Renderer>) -> VacancyResult<Self> {
        let direct = DirectChannel::new(cfg.upstream.clone(), cfg.channel.request_timeout)?;
        let rendered = RenderedChannel::new(renderer, cfg.upstream.clone(), cfg.channel.clone());
        let acquirer = Acquirer::new(
            Arc::new(direct),
            Arc::new(rendered),
            RetryPolicy::exponential(cfg.channel.retry_attempts),
        );
        Ok(Self::new(acquirer, Arc::new(TtlCache::new(cfg.cache.ttl))))
    }

    pub fn cache(&self) -> &Arc<TtlCache<VacancyRecord>> {
        &self.cache
    }

    /// Fresh record from upstream, written through to the cache.
    ///
    /// The direct channel is tried once; only if it fails does the rendered
    /// channel run, with retries. The error of the last rendered attempt is
    /// returned when everything fails, and the cache is left untouched.
    pub async fn acquire(&self, store_id: &str) -> VacancyResult<VacancyRecord> {
        let record = match self.acquirer.fetch_direct(store_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    store = store_id,
                    kind = e.kind(),
                    "direct fetch failed, falling back to rendered: {e}"
                );
                self.acquirer
                    .fetch_via_rendered_with_retry(store_id, self.acquirer.max_attempts())
                    .await?
            }
        };

        tracing::info!(
            store = store_id,
            source = ?record.source,
            status = record.availability.status.as_str(),
            "acquired {}/{}",
            record.availability.available,
            record.availability.total
        );
        self.cache.set(cache_key(store_id), record.clone());
        Ok(record)
    }

    /// Cached record if fresh, otherwise [`acquire`](Self::acquire).
    pub async fn lookup(&self, store_id: &str) -> VacancyResult<VacancyRecord> {
        match self.cache.get(&cache_key(store_id)) {
            Some(record) => Ok(record),
            None => self.acquire(store_id).await,
        }
    }

    /// Cached record and its age, without contacting upstream.
    pub fn cached(&self, store_id: &str) -> Option<CachedRecord> {
        let key = cache_key(store_id);
        let record = self.cache.get(&key)?;
        let age_secs = self.cache.get_age(&key).unwrap_or(0);
        Some(CachedRecord { record, age_secs })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache_clear(&self) {
        self.cache.clear();
        tracing::info!("cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_roundtrip() {
        assert_eq!(cache_key("10001"), "vacancy:10001");
        assert_eq!(store_id_from_key("vacancy:10001"), Some("10001"));
        assert_eq!(store_id_from_key("vacancy:"), None);
        assert_eq!(store_id_from_key("other:10001"), None);
    }
}
