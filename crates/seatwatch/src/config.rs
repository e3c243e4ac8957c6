//! Runtime configuration.
//!
//! Values resolve in three layers: built-in defaults, `SEATWATCH_*`
//! environment variables, then explicit overrides applied by the caller
//! (the CLI maps its flags onto the struct fields).

use crate::error::{VacancyError, VacancyResult};
use chrono::{FixedOffset, Offset, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.example-seats.jp";
const DEFAULT_API_PATH: &str = "/api/store/seat_status";
const DEFAULT_TARGET_SEAT_NAME: &str = "オープン席";
const DEFAULT_CONTENT_SELECTOR: &str = "#vacancy-list";
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 9 * 60;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_CONTENT_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_SETTLE_DELAY_MS: u64 = 1_500;
const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_CACHE_TTL_SECS: u64 = 15 * 60;
const DEFAULT_SWEEP_SECS: u64 = 60;
const DEFAULT_CADENCE_INTERVAL_SECS: u64 = 10 * 60;
const DEFAULT_PUBLISH_LAG_SECS: u64 = 3 * 60;
const DEFAULT_TRIGGER_MARGIN_SECS: u64 = 4 * 60;
const DEFAULT_STORES: &[&str] = &["10001"];

/// Upstream endpoints and the seat category of interest.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Site root, e.g. `https://www.example-seats.jp`.
    pub base_url: String,
    /// Full URL of the structured vacancy endpoint.
    pub api_endpoint: String,
    /// Seat category to report, matched by name.
    pub target_seat_name: String,
    /// Seat category to report, matched by id. Either match is enough.
    pub target_category_id: Option<String>,
    /// Offset in which upstream writes naive timestamps.
    pub utc_offset: FixedOffset,
    /// Explicit id → display name table, consulted before any heuristic.
    pub store_names: HashMap<String, String>,
}

impl UpstreamConfig {
    /// Path component of the API endpoint, used to recognise captured
    /// responses in the browser.
    pub fn api_path(&self) -> String {
        url::Url::parse(&self.api_endpoint)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| DEFAULT_API_PATH.to_string())
    }

    /// Canonical per-store detail page.
    pub fn detail_page_url(&self, store_id: &str) -> String {
        let raw = format!(
            "{}/shop/detail/vacancy.html",
            self.base_url.trim_end_matches('/')
        );
        match url::Url::parse_with_params(&raw, &[("store_code", store_id)]) {
            Ok(u) => u.to_string(),
            Err(_) => format!("{raw}?store_code={store_id}"),
        }
    }
}

/// Timeouts and delays for the two channels.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub request_timeout: Duration,
    pub navigation_timeout: Duration,
    pub content_timeout: Duration,
    pub settle_delay: Duration,
    /// Element that must exist and have children before the page counts as
    /// populated.
    pub content_selector: String,
    pub retry_attempts: u32,
}

/// Browser launch options.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
}

/// Cache sizing and sweeping.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub sweep_every: Duration,
}

/// Upstream publish cadence.
#[derive(Debug, Clone)]
pub struct CadenceConfig {
    pub interval: Duration,
    pub publish_lag: Duration,
    pub margin: Duration,
    /// Stores kept warm before any client asks for one.
    pub default_stores: Vec<String>,
}

/// Complete configuration for a seatwatch process.
#[derive(Debug, Clone)]
pub struct SeatwatchConfig {
    pub upstream: UpstreamConfig,
    pub channel: ChannelConfig,
    pub browser: BrowserOptions,
    pub cache: CacheConfig,
    pub cadence: CadenceConfig,
}

impl Default for SeatwatchConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                api_endpoint: format!("{DEFAULT_BASE_URL}{DEFAULT_API_PATH}"),
                target_seat_name: DEFAULT_TARGET_SEAT_NAME.to_string(),
                target_category_id: None,
                utc_offset: offset_from_minutes(DEFAULT_UTC_OFFSET_MINUTES),
                store_names: HashMap::new(),
            },
            channel: ChannelConfig {
                request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
                navigation_timeout: Duration::from_millis(DEFAULT_NAVIGATION_TIMEOUT_MS),
                content_timeout: Duration::from_millis(DEFAULT_CONTENT_TIMEOUT_MS),
                settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
                content_selector: DEFAULT_CONTENT_SELECTOR.to_string(),
                retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            },
            browser: BrowserOptions {
                chromium_path: None,
                headless: true,
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
                sweep_every: Duration::from_secs(DEFAULT_SWEEP_SECS),
            },
            cadence: CadenceConfig {
                interval: Duration::from_secs(DEFAULT_CADENCE_INTERVAL_SECS),
                publish_lag: Duration::from_secs(DEFAULT_PUBLISH_LAG_SECS),
                margin: Duration::from_secs(DEFAULT_TRIGGER_MARGIN_SECS),
                default_stores: DEFAULT_STORES.iter().map(|s| s.to_string()).collect(),
            },
        }
    }
}

impl SeatwatchConfig {
    /// Defaults overridden by `SEATWATCH_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(base) = read_env_string("SEATWATCH_BASE_URL") {
            cfg.upstream.api_endpoint = format!("{}{DEFAULT_API_PATH}", base.trim_end_matches('/'));
            cfg.upstream.base_url = base;
        }
        if let Some(endpoint) = read_env_string("SEATWATCH_API_ENDPOINT") {
            cfg.upstream.api_endpoint = endpoint;
        }
        if let Some(name) = read_env_string("SEATWATCH_TARGET_SEAT") {
            cfg.upstream.target_seat_name = name;
        }
        cfg.upstream.target_category_id = read_env_string("SEATWATCH_TARGET_CATEGORY_ID");
        cfg.upstream.utc_offset = offset_from_minutes(read_env_i32(
            "SEATWATCH_UTC_OFFSET_MINUTES",
            DEFAULT_UTC_OFFSET_MINUTES,
        ));
        if let Some(raw) = read_env_string("SEATWATCH_STORE_NAMES") {
            cfg.upstream.store_names = parse_store_names(&raw);
        }

        cfg.channel.request_timeout = Duration::from_millis(read_env_u64(
            "SEATWATCH_REQUEST_TIMEOUT_MS",
            DEFAULT_REQUEST_TIMEOUT_MS,
        ));
        cfg.channel.navigation_timeout = Duration::from_millis(read_env_u64(
            "SEATWATCH_NAVIGATION_TIMEOUT_MS",
            DEFAULT_NAVIGATION_TIMEOUT_MS,
        ));
        cfg.channel.content_timeout = Duration::from_millis(read_env_u64(
            "SEATWATCH_CONTENT_TIMEOUT_MS",
            DEFAULT_CONTENT_TIMEOUT_MS,
        ));
        cfg.channel.settle_delay = Duration::from_millis(read_env_u64(
            "SEATWATCH_SETTLE_DELAY_MS",
            DEFAULT_SETTLE_DELAY_MS,
        ));
        if let Some(sel) = read_env_string("SEATWATCH_CONTENT_SELECTOR") {
            cfg.channel.content_selector = sel;
        }
        cfg.channel.retry_attempts =
            read_env_u32("SEATWATCH_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS).max(1);

        cfg.browser.chromium_path = read_env_string("SEATWATCH_CHROMIUM_PATH").map(PathBuf::from);
        cfg.browser.headless = read_env_string("SEATWATCH_HEADLESS")
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        cfg.cache.ttl = Duration::from_secs(read_env_u64(
            "SEATWATCH_CACHE_TTL_SECS",
            DEFAULT_CACHE_TTL_SECS,
        ));
        cfg.cache.sweep_every = Duration::from_secs(
            read_env_u64("SEATWATCH_CACHE_SWEEP_SECS", DEFAULT_SWEEP_SECS).max(1),
        );

        cfg.cadence.interval = Duration::from_secs(read_env_u64(
            "SEATWATCH_CADENCE_INTERVAL_SECS",
            DEFAULT_CADENCE_INTERVAL_SECS,
        ));
        cfg.cadence.publish_lag = Duration::from_secs(read_env_u64(
            "SEATWATCH_PUBLISH_LAG_SECS",
            DEFAULT_PUBLISH_LAG_SECS,
        ));
        cfg.cadence.margin = Duration::from_secs(read_env_u64(
            "SEATWATCH_TRIGGER_MARGIN_SECS",
            DEFAULT_TRIGGER_MARGIN_SECS,
        ));
        if let Some(raw) = read_env_string("SEATWATCH_DEFAULT_STORES") {
            let stores = parse_list(&raw);
            if !stores.is_empty() {
                cfg.cadence.default_stores = stores;
            }
        }

        cfg
    }

    /// Reject settings the scheduler and cache cannot work with.
    pub fn validate(&self) -> VacancyResult<()> {
        if self.cadence.interval.is_zero() {
            return Err(VacancyError::Config("cadence interval must be > 0".into()));
        }
        if self.cadence.margin >= self.cadence.interval {
            return Err(VacancyError::Config(format!(
                "trigger margin {:?} must be shorter than the interval {:?}",
                self.cadence.margin, self.cadence.interval
            )));
        }
        if self.cache.ttl.is_zero() {
            return Err(VacancyError::Config("cache ttl must be > 0".into()));
        }
        if url::Url::parse(&self.upstream.api_endpoint).is_err() {
            return Err(VacancyError::Config(format!(
                "invalid api endpoint: {}",
                self.upstream.api_endpoint
            )));
        }
        if self.cadence.margin < self.cadence.publish_lag {
            tracing::warn!(
                "trigger margin {}s is shorter than publish lag {}s; refreshes may read stale data",
                self.cadence.margin.as_secs(),
                self.cadence.publish_lag.as_secs()
            );
        }
        if self.cache.ttl < self.cadence.interval {
            tracing::warn!(
                "cache ttl {}s is shorter than the cadence interval {}s; tracked stores expire between rounds",
                self.cache.ttl.as_secs(),
                self.cadence.interval.as_secs()
            );
        }
        Ok(())
    }
}

/// Parse `id=name,id=name` pairs. Malformed pairs are skipped.
pub fn parse_store_names(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (id, name) = pair.split_once('=')?;
            let (id, name) = (id.trim(), name.trim());
            if id.is_empty() || name.is_empty() {
                return None;
            }
            Some((id.to_string(), name.to_string()))
        })
        .collect()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix())
}

fn read_env_u64(name: &str, default_value: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default_value)
}

fn read_env_u32(name: &str, default_value: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default_value)
}

fn read_env_i32(name: &str, default_value: i32) -> i32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<i32>().ok())
        .unwrap_or(default_value)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let cfg = SeatwatchConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.cadence.interval, Duration::from_secs(600));
        assert_eq!(cfg.cadence.margin, Duration::from_secs(240));
        assert_eq!(cfg.upstream.utc_offset.local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn test_margin_must_be_inside_interval() {
        let mut cfg = SeatwatchConfig::default();
        cfg.cadence.margin = cfg.cadence.interval;
        assert!(matches!(cfg.validate(), Err(VacancyError::Config(_))));
    }

    #[test]
    fn test_parse_store_names() {
        let names = parse_store_names("10001=Shinjuku East, 10002 = Ikebukuro ,bad,=x,y=");
        assert_eq!(names.len(), 2);
        assert_eq!(names["10001"], "Shinjuku East");
        assert_eq!(names["10002"], "Ikebukuro");
    }

    #[test]
    fn test_detail_page_url() {
        let cfg = SeatwatchConfig::default();
        assert_eq!(
            cfg.upstream.detail_page_url("12345"),
            "https://www.example-seats.jp/shop/detail/vacancy.html?store_code=12345"
        );
        assert_eq!(cfg.upstream.api_path(), "/api/store/seat_status");
    }
}
