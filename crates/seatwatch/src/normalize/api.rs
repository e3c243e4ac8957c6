//! Structured-payload parse.

use super::status::{map_status_code, parse_status_text};
use super::time::parse_timestamp_or_now;
use super::ExtractContext;
use crate::error::VacancyResult;
use crate::types::{Availability, RecordSource, VacancyRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level response of the structured vacancy endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiPayload {
    /// Zero on success; anything else is an upstream rejection. Required:
    /// a body without it is not a vacancy response.
    pub status: i64,
    #[serde(default)]
    pub seat_type: Vec<SeatCategory>,
    #[serde(default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

/// One seat category inside the payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeatCategory {
    #[serde(default)]
    pub seat_name: String,
    /// Observed as both a number and a string.
    #[serde(default)]
    pub category_id: Value,
    #[serde(default)]
    pub seat_status: String,
    #[serde(default)]
    pub status_no: Value,
}

impl SeatCategory {
    fn category_id_str(&self) -> Option<String> {
        scalar_to_string(&self.category_id)
    }

    /// Explicit numeric status code, when the payload carries one.
    pub fn status_code(&self) -> Option<i64> {
        match &self.status_no {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn matches(&self, ctx: &ExtractContext<'_>) -> bool {
        if self.seat_name.trim() == ctx.target_seat_name.trim() {
            return true;
        }
        match (ctx.target_category_id, self.category_id_str()) {
            (Some(want), Some(have)) => want.trim() == have.trim(),
            _ => false,
        }
    }
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode a raw body into an [`ApiPayload`].
pub fn parse_api_body(body: &str) -> VacancyResult<ApiPayload> {
    Ok(serde_json::from_str(body)?)
}

/// Derive availability for the target category.
///
/// The payload only reports a remaining count, so `total` mirrors
/// `available` when seats remain and is 0 otherwise.
pub fn category_availability(payload: &ApiPayload, ctx: &ExtractContext<'_>) -> Availability {
    let Some(category) = payload.seat_type.iter().find(|c| c.matches(ctx)) else {
        return Availability::unknown();
    };

    let available = parse_status_text(&category.seat_status);
    let total = if available > 0 { available } else { 0 };
    let derived = Availability::from_counts(available, total);

    match category.status_code() {
        Some(code) => derived.with_status(map_status_code(code)),
        None => derived,
    }
}

/// Map a structured payload onto a record. Never fails.
pub fn normalize_api_payload(
    payload: &ApiPayload,
    ctx: &ExtractContext<'_>,
    source: RecordSource,
) -> VacancyRecord {
    let store_name = payload
        .store_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .or_else(|| ctx.known_name())
        .unwrap_or_else(ExtractContext::placeholder_name);

    VacancyRecord {
        store_id: ctx.store_id.to_string(),
        store_name,
        availability: category_availability(payload, ctx),
        upstream_updated_at: parse_timestamp_or_now(
            payload.update_time.as_deref(),
            ctx.utc_offset,
            ctx.now,
        ),
        fetched_at: ctx.now,
        source,
    }
}
