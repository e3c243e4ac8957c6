//! One-shot acquisition of a single store.

use super::{build_renderer, load_config, Overrides};
use anyhow::{Context, Result};
use seatwatch::service::VacancyService;
use std::sync::Arc;

pub async fn run(overrides: &Overrides, store: &str) -> Result<()> {
    let cfg = load_config(overrides)?;
    let renderer = build_renderer(&cfg, overrides);
    let service = VacancyService::from_config(&cfg, Arc::clone(&renderer))?;

    let result = service.acquire(store).await;
    if let Err(e) = renderer.shutdown().await {
        tracing::warn!("browser shutdown failed: {e}");
    }

    let record = result.with_context(|| format!("failed to acquire store {store}"))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
