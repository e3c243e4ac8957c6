//! Offline normalization of a saved payload.

use super::{load_config, Overrides};
use anyhow::{Context, Result};
use chrono::Utc;
use seatwatch::config::UpstreamConfig;
use seatwatch::normalize::{normalize_api_payload, normalize_document, parse_api_body, ExtractContext};
use seatwatch::types::{RecordSource, VacancyRecord};
use std::path::Path;

pub fn run(overrides: &Overrides, file: &Path, store: &str) -> Result<()> {
    let cfg = load_config(overrides)?;
    let body = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let record = normalize_saved(&cfg.upstream, &body, store)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// JSON bodies go through the structured parse, anything else through the
/// document strategies.
pub fn normalize_saved(upstream: &UpstreamConfig, body: &str, store: &str) -> Result<VacancyRecord> {
    let ctx = ExtractContext::new(upstream, store, Utc::now());
    if body.trim_start().starts_with('{') {
        let payload = parse_api_body(body).context("payload looks like JSON but does not decode")?;
        if payload.status != 0 {
            tracing::warn!("payload carries upstream status {}", payload.status);
        }
        return Ok(normalize_api_payload(&payload, &ctx, RecordSource::Direct));
    }
    Ok(normalize_document(body, &ctx))
}
