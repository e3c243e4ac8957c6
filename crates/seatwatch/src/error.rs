//! Error taxonomy for vacancy acquisition.
//!
//! Extraction ambiguity is deliberately absent: the normalizer resolves every
//! unmatched field to a default and never fails.

use std::time::Duration;

/// All errors that can occur while acquiring vacancy data.
#[derive(thiserror::Error, Debug)]
pub enum VacancyError {
    /// The structured endpoint answered with a non-zero top-level status.
    #[error("Upstream rejected request for store {store_id}: status {status}")]
    UpstreamValidation { store_id: String, status: i64 },

    /// Network failure, timeout, or non-success HTTP status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The payload could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The content-ready marker did not appear in time. Non-fatal: the
    /// rendered channel logs it and parses whatever the page holds.
    #[error("Content not ready after {0:?}")]
    ContentTimeout(Duration),

    /// Browser launch, page creation, or navigation failure.
    #[error("Browser error: {0}")]
    Browser(String),

    /// Invalid configuration value.
    #[error("Config error: {0}")]
    Config(String),
}

impl VacancyError {
    /// Short machine-readable kind, used in logs and round reports.
    pub fn kind(&self) -> &'static str {
        match self {
            VacancyError::UpstreamValidation { .. } => "upstream_validation",
            VacancyError::Transport(_) => "transport",
            VacancyError::Decode(_) => "decode",
            VacancyError::ContentTimeout(_) => "content_timeout",
            VacancyError::Browser(_) => "browser",
            VacancyError::Config(_) => "config",
        }
    }
}

impl From<reqwest::Error> for VacancyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            VacancyError::Decode(e.to_string())
        } else {
            VacancyError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for VacancyError {
    fn from(e: serde_json::Error) -> Self {
        VacancyError::Decode(e.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for VacancyError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        VacancyError::Browser(e.to_string())
    }
}

/// Convenience result type.
pub type VacancyResult<T> = Result<T, VacancyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let e = VacancyError::UpstreamValidation {
            store_id: "10001".to_string(),
            status: 3,
        };
        assert_eq!(e.kind(), "upstream_validation");
        assert!(e.to_string().contains("status 3"));
        assert_eq!(
            VacancyError::ContentTimeout(Duration::from_secs(10)).kind(),
            "content_timeout"
        );
    }

    #[test]
    fn test_json_error_maps_to_decode() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let e: VacancyError = err.into();
        assert!(matches!(e, VacancyError::Decode(_)));
    }
}
