//! Cadence-aligned refresh of every tracked store.
//!
//! A store is tracked while it has a live record in the cache, so anything
//! a client has looked up keeps being refreshed until its entry expires.
//! With nothing tracked, the configured default stores are refreshed.

pub mod cadence;

use crate::service::{store_id_from_key, VacancyService};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;

pub use cadence::Cadence;

/// One store that failed during a round.
#[derive(Debug, Clone, Serialize)]
pub struct RoundFailure {
    pub store_id: String,
    pub kind: &'static str,
    pub message: String,
}

/// Outcome of one refresh round.
#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub refreshed: Vec<String>,
    pub failed: Vec<RoundFailure>,
}

impl RoundReport {
    pub fn total(&self) -> usize {
        self.refreshed.len() + self.failed.len()
    }
}

/// Periodic refresher.
pub struct Scheduler {
    service: Arc<VacancyService>,
    cadence: Cadence,
    default_stores: Vec<String>,
    timers: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl Scheduler {
    pub fn new(service: Arc<VacancyService>, cadence: Cadence, default_stores: Vec<String>) -> Self {
        Self {
            service,
            cadence,
            default_stores,
            timers: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    /// Run a warm-up round now, then refresh on every aligned trigger.
    ///
    /// The warm-up is awaited; the periodic timer runs in the background
    /// until [`stop`](Self::stop).
    pub async fn start(self: &Arc<Self>) -> RoundReport {
        let warmup = self.refresh_round().await;

        if self.stopped.load(Ordering::Acquire) {
            tracing::info!("scheduler stopped during warm-up, not arming timer");
            return warmup;
        }

        let scheduler = Arc::clone(self);
        let timer = tokio::spawn(async move {
            let now = Utc::now();
            let delay = scheduler.cadence.delay_until_next(now);
            tracing::info!(
                "next refresh at {} (in {}s)",
                scheduler.cadence.compute_next_trigger(now).to_rfc3339(),
                delay.as_secs()
            );
            // Later ticks are anchored to the aligned slot, not to when the
            // first round finished.
            let aligned = tokio::time::Instant::now() + delay;
            tokio::time::sleep_until(aligned).await;
            scheduler.refresh_round().await;

            let interval = scheduler.cadence.interval;
            let mut ticker = tokio::time::interval_at(aligned + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                scheduler.refresh_round().await;
            }
        });
        self.timers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(timer);

        warmup
    }

    /// Abort every outstanding timer. Idempotent and safe before `start`.
    pub fn stop(&self) {
        let was_stopped = self.stopped.swap(true, Ordering::AcqRel);
        let timers: Vec<JoinHandle<()>> = self
            .timers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for timer in &timers {
            timer.abort();
        }
        if !was_stopped {
            tracing::info!("scheduler stopped ({} timer(s) aborted)", timers.len());
        }
    }

    /// Distinct store ids with a live cache entry, or the defaults when
    /// nothing is tracked.
    pub fn tracked_entities(&self) -> Vec<String> {
        let ids: BTreeSet<String> = self
            .service
            .cache_stats()
            .keys
            .iter()
            .filter_map(|k| store_id_from_key(k))
            .map(String::from)
            .collect();
        if ids.is_empty() {
            return self.default_stores.clone();
        }
        ids.into_iter().collect()
    }

    /// Acquire every tracked store concurrently. A failing store is logged
    /// and reported; it never affects the others.
    pub async fn refresh_round(&self) -> RoundReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        let ids = self.tracked_entities();
        tracing::info!("refresh round started: {} store(s)", ids.len());

        let service = &self.service;
        let outcomes = join_all(ids.into_iter().map(|id| async move {
            let result = service.acquire(&id).await;
            (id, result)
        }))
        .await;

        let mut report = RoundReport {
            started_at,
            elapsed_ms: 0,
            refreshed: Vec::new(),
            failed: Vec::new(),
        };
        for (store_id, result) in outcomes {
            match result {
                Ok(_) => report.refreshed.push(store_id),
                Err(e) => {
                    tracing::warn!(store = %store_id, kind = e.kind(), "refresh failed: {e}");
                    report.failed.push(RoundFailure {
                        store_id,
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }
        report.elapsed_ms = clock.elapsed().as_millis() as u64;

        tracing::info!(
            "refresh round finished: {} ok, {} failed in {}ms",
            report.refreshed.len(),
            report.failed.len(),
            report.elapsed_ms
        );
        report
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for timer in self
            .timers
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
        {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{Acquirer, Backoff, RetryPolicy};
    use crate::cache::TtlCache;
    use crate::channel::VacancyChannel;
    use crate::error::{VacancyError, VacancyResult};
    use crate::service::cache_key;
    use crate::types::{Availability, RecordSource, VacancyRecord};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Succeeds for every store except `failing`.
    struct Selective {
        failing: &'static str,
        available: u32,
    }

    #[async_trait]
    impl VacancyChannel for Selective {
        fn name(&self) -> &'static str {
            "selective"
        }
        async fn fetch(&self, store_id: &str) -> VacancyResult<VacancyRecord> {
            if store_id == self.failing {
                return Err(VacancyError::Transport("connection refused".to_string()));
            }
            Ok(VacancyRecord {
                store_id: store_id.to_string(),
                store_name: format!("Store {store_id}"),
                availability: Availability::from_counts(self.available, 10),
                upstream_updated_at: Utc::now(),
                fetched_at: Utc::now(),
                source: RecordSource::Direct,
            })
        }
    }

    /// Counts fetches and takes `latency` (tokio time) per fetch.
    struct Counting {
        calls: AtomicUsize,
        latency: Duration,
    }

    #[async_trait]
    impl VacancyChannel for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }
        async fn fetch(&self, store_id: &str) -> VacancyResult<VacancyRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            Ok(VacancyRecord {
                store_id: store_id.to_string(),
                store_name: "Counted".to_string(),
                availability: Availability::from_counts(1, 10),
                upstream_updated_at: Utc::now(),
                fetched_at: Utc::now(),
                source: RecordSource::Direct,
            })
        }
    }

    fn scheduler(defaults: &[&str]) -> Arc<Scheduler> {
        scheduler_with(
            Arc::new(Selective {
                failing: "10003",
                available: 5,
            }),
            defaults,
        )
    }

    fn scheduler_with(channel: Arc<dyn VacancyChannel>, defaults: &[&str]) -> Arc<Scheduler> {
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: Backoff::Fixed(Duration::ZERO),
        };
        let acquirer = Acquirer::new(Arc::clone(&channel), channel, policy);
        let cache = Arc::new(TtlCache::new(Duration::from_secs(900)));
        let service = Arc::new(VacancyService::new(acquirer, cache));
        let cadence = Cadence::from(&crate::config::SeatwatchConfig::default().cadence);
        Arc::new(Scheduler::new(
            service,
            cadence,
            defaults.iter().map(|s| s.to_string()).collect(),
        ))
    }

    #[test]
    fn test_tracked_entities_falls_back_to_defaults() {
        let s = scheduler(&["10001", "10002"]);
        assert_eq!(s.tracked_entities(), vec!["10001", "10002"]);
    }

    #[tokio::test]
    async fn test_tracked_entities_from_cache_namespace() {
        let s = scheduler(&["10001"]);
        s.service.acquire("20002").await.unwrap();
        s.service.acquire("20001").await.unwrap();
        s.service.cache().set("other:99999", s.service.cache().get("vacancy:20001").unwrap());
        assert_eq!(s.tracked_entities(), vec!["20001", "20002"]);
    }

    #[tokio::test]
    async fn test_round_isolates_failures() {
        let s = scheduler(&["10001", "10002", "10003"]);
        let report = s.refresh_round().await;

        assert_eq!(report.total(), 3);
        assert_eq!(report.refreshed.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].store_id, "10003");
        assert_eq!(report.failed[0].kind, "transport");

        let cache = s.service.cache();
        assert!(cache.has(&cache_key("10001")));
        assert!(cache.has(&cache_key("10002")));
        assert!(!cache.has(&cache_key("10003")));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_safe_before_start() {
        let s = scheduler(&["10001"]);
        s.stop();
        s.stop();
        let warmup = s.start().await;
        assert_eq!(warmup.refreshed, vec!["10001"]);
        assert!(s.timers.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_arms_timer_until_stopped() {
        let s = scheduler(&["10001"]);
        s.start().await;
        assert_eq!(s.timers.lock().unwrap().len(), 1);
        s.stop();
        assert!(s.timers.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rounds_fire_on_aligned_trigger_then_every_interval() {
        let channel = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            latency: Duration::from_secs(30),
        });
        let s = scheduler_with(channel.clone(), &["10001"]);
        let interval = s.cadence().interval;

        s.start().await;
        assert_eq!(channel.calls.load(Ordering::SeqCst), 1);

        // Wall time does not move under the paused tokio clock, so this is
        // the same delay the timer task computed.
        let to_trigger = s.cadence().delay_until_next(Utc::now());
        tokio::time::sleep(to_trigger + Duration::from_secs(15)).await;
        assert_eq!(channel.calls.load(Ordering::SeqCst), 2);

        // Each 30s round must not push later ticks off the aligned slot.
        tokio::time::sleep(interval).await;
        assert_eq!(channel.calls.load(Ordering::SeqCst), 3);
        tokio::time::sleep(interval).await;
        assert_eq!(channel.calls.load(Ordering::SeqCst), 4);

        s.stop();
        tokio::time::sleep(interval * 2).await;
        assert_eq!(channel.calls.load(Ordering::SeqCst), 4);
    }
}
