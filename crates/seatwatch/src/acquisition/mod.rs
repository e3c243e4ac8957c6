//! Acquisition orchestration over the two channels.
//!
//! The acquirer exposes each channel on its own; the direct-then-rendered
//! fallback is composed by [`VacancyService`](crate::service::VacancyService).

pub mod retry;

use crate::channel::VacancyChannel;
use crate::error::VacancyResult;
use crate::types::VacancyRecord;
use chrono::Utc;
use std::sync::Arc;

pub use retry::{Backoff, RetryPolicy};

/// Runs single fetches against a channel and stamps retrieval time.
pub struct Acquirer {
    direct: Arc<dyn VacancyChannel>,
    rendered: Arc<dyn VacancyChannel>,
    retry: RetryPolicy,
}

impl Acquirer {
    pub fn new(
        direct: Arc<dyn VacancyChannel>,
        rendered: Arc<dyn VacancyChannel>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            direct,
            rendered,
            retry,
        }
    }

    /// Default attempt budget for the rendered channel.
    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts
    }

    /// One attempt on the direct channel. Errors propagate unchanged.
    pub async fn fetch_direct(&self, store_id: &str) -> VacancyResult<VacancyRecord> {
        let record = self.direct.fetch(store_id).await?;
        Ok(record.with_fetched_at(Utc::now()))
    }

    /// Up to `max_attempts` sequential attempts on the rendered channel,
    /// backing off between failures. Exhaustion returns the last error.
    pub async fn fetch_via_rendered_with_retry(
        &self,
        store_id: &str,
        max_attempts: u32,
    ) -> VacancyResult<VacancyRecord> {
        let policy = self.retry.with_max_attempts(max_attempts);
        let channel = Arc::clone(&self.rendered);
        let record = policy
            .run(|attempt| {
                let channel = Arc::clone(&channel);
                async move {
                    tracing::debug!(
                        store = store_id,
                        "{} attempt {attempt}",
                        channel.name()
                    );
                    channel.fetch(store_id).await
                }
            })
            .await?;
        Ok(record.with_fetched_at(Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VacancyError;
    use crate::types::{Availability, RecordSource};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` calls, then succeeds.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl VacancyChannel for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }
        async fn fetch(&self, store_id: &str) -> VacancyResult<VacancyRecord> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                return Err(VacancyError::Browser(format!("call {n} failed")));
            }
            let epoch = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
            Ok(VacancyRecord {
                store_id: store_id.to_string(),
                store_name: "Test".to_string(),
                availability: Availability::from_counts(4, 10),
                upstream_updated_at: epoch,
                fetched_at: epoch,
                source: RecordSource::RenderedDom,
            })
        }
    }

    fn flaky(failures: u32) -> Arc<Flaky> {
        Arc::new(Flaky {
            failures,
            calls: AtomicU32::new(0),
        })
    }

    #[tokio::test]
    async fn test_fetch_direct_stamps_fetched_at() {
        let direct = flaky(0);
        let acq = Acquirer::new(direct, flaky(0), RetryPolicy::default());
        let before = Utc::now();
        let rec = acq.fetch_direct("10001").await.unwrap();
        assert!(rec.fetched_at >= before);
    }

    #[tokio::test]
    async fn test_fetch_direct_does_not_retry() {
        let direct = flaky(1);
        let acq = Acquirer::new(direct.clone(), flaky(0), RetryPolicy::default());
        assert!(acq.fetch_direct("10001").await.is_err());
        assert_eq!(direct.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rendered_retry_recovers() {
        let rendered = flaky(2);
        let acq = Acquirer::new(flaky(0), rendered.clone(), RetryPolicy::default());
        let start = tokio::time::Instant::now();

        let rec = acq.fetch_via_rendered_with_retry("10001", 3).await.unwrap();
        assert_eq!(rec.store_id, "10001");
        assert_eq!(rendered.calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rendered_retry_exhausts() {
        let rendered = flaky(10);
        let acq = Acquirer::new(flaky(0), rendered.clone(), RetryPolicy::default());
        let err = acq.fetch_via_rendered_with_retry("10001", 2).await.unwrap_err();
        assert!(matches!(err, VacancyError::Browser(msg) if msg == "call 2 failed"));
        assert_eq!(rendered.calls.load(Ordering::SeqCst), 2);
    }
}
