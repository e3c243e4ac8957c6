//! CLI subcommand implementations for the seatwatch binary.

pub mod fetch_cmd;
pub mod parse_cmd;
pub mod run_cmd;
pub mod trigger_cmd;

use anyhow::{Context, Result};
use seatwatch::config::SeatwatchConfig;
use seatwatch::renderer::chromium::{find_chromium, ChromiumRenderer};
use seatwatch::renderer::{NoopRenderer, Renderer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Flags that override the environment-derived configuration.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub chromium_path: Option<PathBuf>,
    pub headed: bool,
    pub no_browser: bool,
}

/// Defaults, then `SEATWATCH_*` variables, then flags.
pub fn load_config(overrides: &Overrides) -> Result<SeatwatchConfig> {
    let mut cfg = SeatwatchConfig::from_env();
    if let Some(base) = &overrides.base_url {
        let base = base.trim_end_matches('/').to_string();
        cfg.upstream.api_endpoint = format!("{base}{}", cfg.upstream.api_path());
        cfg.upstream.base_url = base;
    }
    if let Some(path) = &overrides.chromium_path {
        cfg.browser.chromium_path = Some(path.clone());
    }
    if overrides.headed {
        cfg.browser.headless = false;
    }
    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

/// The shared browser, or a renderer that refuses pages when disabled.
pub fn build_renderer(cfg: &SeatwatchConfig, overrides: &Overrides) -> Arc<dyn Renderer> {
    if overrides.no_browser {
        info!("browser fallback disabled");
        return Arc::new(NoopRenderer);
    }
    if find_chromium(cfg.browser.chromium_path.as_ref()).is_none() {
        warn!("no Chromium found on known paths; the first fallback will try chromiumoxide's own detection");
    }
    Arc::new(ChromiumRenderer::new(cfg.browser.clone()))
}

/// Accept exactly five ASCII digits.
pub fn validate_store_id(raw: &str) -> Result<String, String> {
    let id = raw.trim();
    if id.len() == 5 && id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(id.to_string())
    } else {
        Err(format!("store id must be exactly 5 digits, got {raw:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_store_id() {
        assert_eq!(validate_store_id("10001"), Ok("10001".to_string()));
        assert_eq!(validate_store_id(" 00042 "), Ok("00042".to_string()));
        for bad in ["", "1234", "123456", "1234a", "１２３４５", "12 34"] {
            assert!(validate_store_id(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_base_url_override_moves_endpoint() {
        let overrides = Overrides {
            base_url: Some("http://127.0.0.1:8080/".to_string()),
            ..Default::default()
        };
        let cfg = load_config(&overrides).unwrap();
        assert_eq!(cfg.upstream.base_url, "http://127.0.0.1:8080");
        assert_eq!(
            cfg.upstream.api_endpoint,
            "http://127.0.0.1:8080/api/store/seat_status"
        );
    }
}
