//! Canonical vacancy record and its value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display name used when no extraction strategy resolves the store name.
pub const PLACEHOLDER_STORE_NAME: &str = "Unknown store";

/// Ratio of available to total seats below which a store counts as crowded.
pub const CROWDED_RATIO: f64 = 0.3;

/// Coarse occupancy classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    Vacant,
    Crowded,
    Full,
    Unknown,
}

impl SeatStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vacant => "vacant",
            Self::Crowded => "crowded",
            Self::Full => "full",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive a status from seat counts.
///
/// `total == 0` is always unknown, whatever `available` says.
pub fn determine_status(available: u32, total: u32) -> SeatStatus {
    if total == 0 {
        return SeatStatus::Unknown;
    }
    if available == 0 {
        return SeatStatus::Full;
    }
    if (available as f64) / (total as f64) < CROWDED_RATIO {
        SeatStatus::Crowded
    } else {
        SeatStatus::Vacant
    }
}

/// Seat counts plus the derived (or upstream-overridden) status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: u32,
    pub total: u32,
    pub status: SeatStatus,
}

impl Availability {
    /// Counts with the ratio-derived status.
    pub fn from_counts(available: u32, total: u32) -> Self {
        Self {
            available,
            total,
            status: determine_status(available, total),
        }
    }

    /// Nothing known: zero counts, unknown status.
    pub fn unknown() -> Self {
        Self {
            available: 0,
            total: 0,
            status: SeatStatus::Unknown,
        }
    }

    /// Replace the status with an explicit upstream classification.
    pub fn with_status(self, status: SeatStatus) -> Self {
        Self { status, ..self }
    }
}

impl Default for Availability {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Which acquisition path produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    /// Structured endpoint called directly.
    Direct,
    /// Structured payload captured while the browser loaded the page.
    RenderedCapture,
    /// Heuristic parse of the rendered HTML.
    RenderedDom,
}

/// One store's vacancy snapshot. Recreated on every successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VacancyRecord {
    pub store_id: String,
    pub store_name: String,
    pub availability: Availability,
    /// Timestamp reported by upstream, or retrieval time when absent.
    pub upstream_updated_at: DateTime<Utc>,
    /// Local retrieval time. Stamped by the orchestrator.
    pub fetched_at: DateTime<Utc>,
    pub source: RecordSource,
}

impl VacancyRecord {
    /// Return a copy stamped with the given retrieval time.
    pub fn with_fetched_at(self, fetched_at: DateTime<Utc>) -> Self {
        Self { fetched_at, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determine_status_table() {
        assert_eq!(determine_status(0, 8), SeatStatus::Full);
        assert_eq!(determine_status(2, 8), SeatStatus::Crowded);
        assert_eq!(determine_status(5, 8), SeatStatus::Vacant);
        for available in [0, 1, 7, 100] {
            assert_eq!(determine_status(available, 0), SeatStatus::Unknown);
        }
    }

    #[test]
    fn test_crowded_boundary() {
        // 3/10 is exactly the ratio, so not crowded.
        assert_eq!(determine_status(3, 10), SeatStatus::Vacant);
        assert_eq!(determine_status(29, 100), SeatStatus::Crowded);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&SeatStatus::Crowded).unwrap();
        assert_eq!(json, "\"crowded\"");
        let src = serde_json::to_string(&RecordSource::RenderedCapture).unwrap();
        assert_eq!(src, "\"rendered_capture\"");
    }

    #[test]
    fn test_availability_override_keeps_counts() {
        let a = Availability::from_counts(4, 4).with_status(SeatStatus::Crowded);
        assert_eq!(a.available, 4);
        assert_eq!(a.total, 4);
        assert_eq!(a.status, SeatStatus::Crowded);
    }
}
