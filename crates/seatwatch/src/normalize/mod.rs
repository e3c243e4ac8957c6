//! Payload normalization: pure mapping from upstream payloads to
//! [`VacancyRecord`](crate::types::VacancyRecord).
//!
//! Two independent pipelines:
//! - [`api`] for the structured JSON feed (direct channel, or a response
//!   captured while the browser loaded the page);
//! - [`document`] for the rendered HTML, an ordered list of extraction
//!   strategies per field.
//!
//! Nothing here performs I/O and nothing here fails: fields no strategy can
//! resolve fall back to defaults.

pub mod api;
pub mod document;
pub mod status;
pub mod time;

use crate::config::UpstreamConfig;
use crate::types::PLACEHOLDER_STORE_NAME;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashMap;

pub use api::{normalize_api_payload, parse_api_body, ApiPayload, SeatCategory};
pub use document::normalize_document;
pub use status::{map_status_code, parse_status_text};

/// Inputs every extraction step may consult besides the payload itself.
#[derive(Debug, Clone)]
pub struct ExtractContext<'a> {
    pub store_id: &'a str,
    pub target_seat_name: &'a str,
    pub target_category_id: Option<&'a str>,
    pub store_names: &'a HashMap<String, String>,
    pub utc_offset: FixedOffset,
    /// Retrieval time; the fallback for missing upstream timestamps.
    pub now: DateTime<Utc>,
}

impl<'a> ExtractContext<'a> {
    pub fn new(upstream: &'a UpstreamConfig, store_id: &'a str, now: DateTime<Utc>) -> Self {
        Self {
            store_id,
            target_seat_name: &upstream.target_seat_name,
            target_category_id: upstream.target_category_id.as_deref(),
            store_names: &upstream.store_names,
            utc_offset: upstream.utc_offset,
            now,
        }
    }

    /// Name from the explicit id → name table.
    pub fn known_name(&self) -> Option<String> {
        self.store_names
            .get(self.store_id)
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(String::from)
    }

    pub(crate) fn placeholder_name() -> String {
        PLACEHOLDER_STORE_NAME.to_string()
    }
}
