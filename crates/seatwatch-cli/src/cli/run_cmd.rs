//! Long-running mode: warm the cache and refresh on the publish cadence.

use super::{build_renderer, load_config, Overrides};
use anyhow::{Context, Result};
use seatwatch::scheduler::{Cadence, Scheduler};
use seatwatch::service::VacancyService;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};

pub async fn run(overrides: &Overrides, stores: Vec<String>) -> Result<()> {
    let mut cfg = load_config(overrides)?;
    if !stores.is_empty() {
        cfg.cadence.default_stores = stores;
    }

    info!("starting seatwatch v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "cadence: interval={}s publish_lag={}s margin={}s defaults={:?}",
        cfg.cadence.interval.as_secs(),
        cfg.cadence.publish_lag.as_secs(),
        cfg.cadence.margin.as_secs(),
        cfg.cadence.default_stores
    );

    let renderer = build_renderer(&cfg, overrides);
    let service = Arc::new(
        VacancyService::from_config(&cfg, Arc::clone(&renderer))
            .context("failed to build acquisition service")?,
    );
    let mut sweeper = service.cache().spawn_sweeper(cfg.cache.sweep_every);
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&service),
        Cadence::from(&cfg.cadence),
        cfg.cadence.default_stores.clone(),
    ));

    // Set up SIGTERM/SIGINT handling
    let shutdown = Arc::new(Notify::new());
    let shutdown_signal = Arc::clone(&shutdown);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("received shutdown signal");
        shutdown_signal.notify_one();
    });

    tokio::select! {
        warmup = scheduler.start() => {
            if !warmup.failed.is_empty() {
                warn!("warm-up finished with {} failure(s)", warmup.failed.len());
            }
            shutdown.notified().await;
        }
        _ = shutdown.notified() => {
            info!("shutdown requested during warm-up");
        }
    }

    scheduler.stop();
    sweeper.stop();
    if let Err(e) = renderer.shutdown().await {
        warn!("browser shutdown failed: {e}");
    }
    info!("seatwatch stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("SIGTERM handler unavailable: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
