//! Rendered-document parse.
//!
//! Upstream markup is undocumented and changes without notice, so every
//! field is extracted by an ordered list of independent strategies. Each
//! strategy is a pure `(document, context) -> Option<T>`; the first `Some`
//! wins and a field nobody resolves takes its default. A markup change only
//! ever needs the one failing strategy replaced or a new one appended.
//!
//! `scraper::Html` is `!Send`: parse and extract synchronously, never hold
//! the document across an `.await`.

use super::time::parse_clock_time;
use super::ExtractContext;
use crate::types::{Availability, RecordSource, VacancyRecord};
use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

/// A single extraction rule.
pub type Strategy<T> = fn(&Html, &ExtractContext<'_>) -> Option<T>;

// ── Strategy tables ──────────────────────────────────────────────────────────

/// Store name, most trustworthy first.
pub const NAME_STRATEGIES: &[(&str, Strategy<String>)] = &[
    ("directory", name_from_directory),
    ("script_variable", name_from_script_variable),
    ("selector", name_from_selectors),
    ("title", name_from_title),
];

/// Seat counts.
pub const AVAILABILITY_STRATEGIES: &[(&str, Strategy<Availability>)] = &[
    ("selector", availability_from_selectors),
    ("row_scan", availability_from_rows),
];

/// Last-updated time.
pub const UPDATED_AT_STRATEGIES: &[(&str, Strategy<DateTime<Utc>>)] =
    &[("selector", updated_at_from_selectors)];

const NAME_SELECTORS: &[&str] = &[
    ".store-name",
    ".shop-name",
    "#storeName",
    "#shopName",
    "h1.store-title",
    ".shop-detail h1",
];

const COUNT_SELECTORS: &[&str] = &[
    ".vacancy-count",
    ".seat-count",
    ".available-seats",
    "[data-vacancy]",
    ".vacancy-num",
];

const UPDATED_SELECTORS: &[&str] = &[
    ".update-time",
    ".updated-at",
    "#updateTime",
    ".last-update",
    "time",
];

/// Title fragments that describe the page rather than the store.
const TITLE_NOISE: &[&str] = &["の空席情報", "空席情報", "空席状況", "Vacancy", "vacancy"];

fn script_name_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r#"storeName\s*[=:]\s*["']([^"']+)["']"#)
                .expect("storeName regex is valid"),
            Regex::new(r#"store_name\s*[=:]\s*["']([^"']+)["']"#)
                .expect("store_name regex is valid"),
        ]
    })
}

fn pair_count_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*/\s*(\d+)\s*(?:席|seats?)").expect("pair count regex is valid")
    })
}

fn single_count_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*(?:席|seats?)").expect("single count regex is valid")
    })
}

fn bare_count_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)").expect("bare count regex is valid"))
}

// ── Entry point ──────────────────────────────────────────────────────────────

/// Map a rendered HTML document onto a record. Never fails.
pub fn normalize_document(html: &str, ctx: &ExtractContext<'_>) -> VacancyRecord {
    let document = Html::parse_document(html);

    let store_name = first_match(NAME_STRATEGIES, &document, ctx)
        .unwrap_or_else(ExtractContext::placeholder_name);
    let availability =
        first_match(AVAILABILITY_STRATEGIES, &document, ctx).unwrap_or_else(Availability::unknown);
    let upstream_updated_at = first_match(UPDATED_AT_STRATEGIES, &document, ctx).unwrap_or(ctx.now);

    VacancyRecord {
        store_id: ctx.store_id.to_string(),
        store_name,
        availability,
        upstream_updated_at,
        fetched_at: ctx.now,
        source: RecordSource::RenderedDom,
    }
}

/// Run strategies in order and return the first hit.
pub fn first_match<T>(
    strategies: &[(&str, Strategy<T>)],
    document: &Html,
    ctx: &ExtractContext<'_>,
) -> Option<T> {
    strategies.iter().find_map(|(label, strategy)| {
        let hit = strategy(document, ctx);
        if hit.is_some() {
            tracing::debug!(store = ctx.store_id, strategy = *label, "extraction strategy matched");
        }
        hit
    })
}

// ── Name strategies ──────────────────────────────────────────────────────────

fn name_from_directory(_document: &Html, ctx: &ExtractContext<'_>) -> Option<String> {
    ctx.known_name()
}

fn name_from_script_variable(document: &Html, _ctx: &ExtractContext<'_>) -> Option<String> {
    let sel = Selector::parse("script").ok()?;
    for script in document.select(&sel) {
        let body: String = script.text().collect();
        for re in script_name_patterns() {
            if let Some(name) = re
                .captures(&body)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|n| !n.is_empty())
            {
                return Some(name);
            }
        }
    }
    None
}

fn name_from_selectors(document: &Html, _ctx: &ExtractContext<'_>) -> Option<String> {
    NAME_SELECTORS.iter().find_map(|css| {
        let sel = Selector::parse(css).ok()?;
        document
            .select(&sel)
            .map(|el| element_text(&el))
            .find(|t| !t.is_empty())
    })
}

fn name_from_title(document: &Html, _ctx: &ExtractContext<'_>) -> Option<String> {
    let sel = Selector::parse("title").ok()?;
    let title = document.select(&sel).next().map(|el| element_text(&el))?;
    let head = title
        .split(['|', '｜', '–', '—'])
        .next()
        .unwrap_or_default()
        .split(" - ")
        .next()
        .unwrap_or_default();
    let mut name = head.trim().to_string();
    for noise in TITLE_NOISE {
        name = name.replace(noise, "");
    }
    let name = name.trim().to_string();
    (!name.is_empty()).then_some(name)
}

// ── Availability strategies ──────────────────────────────────────────────────

/// `N / M 席` gives both counts; a lone `N 席` mirrors `total` to
/// `available`, the same convention the structured feed follows.
fn counts_from_text(text: &str) -> Option<Availability> {
    if let Some(c) = pair_count_regex().captures(text) {
        let available = c.get(1)?.as_str().parse().ok()?;
        let total = c.get(2)?.as_str().parse().ok()?;
        return Some(Availability::from_counts(available, total));
    }
    let c = single_count_regex().captures(text)?;
    let available: u32 = c.get(1)?.as_str().parse().ok()?;
    Some(Availability::from_counts(available, available))
}

fn availability_from_selectors(document: &Html, _ctx: &ExtractContext<'_>) -> Option<Availability> {
    COUNT_SELECTORS.iter().find_map(|css| {
        let sel = Selector::parse(css).ok()?;
        document
            .select(&sel)
            .find_map(|el| counts_from_text(&element_text(&el)))
    })
}

fn availability_from_rows(document: &Html, ctx: &ExtractContext<'_>) -> Option<Availability> {
    let keyword = ctx.target_seat_name.trim();
    if keyword.is_empty() {
        return None;
    }
    let sel = Selector::parse("tr, li").ok()?;
    document.select(&sel).find_map(|row| {
        let text = element_text(&row);
        if !text.contains(keyword) {
            return None;
        }
        let rest = text.replacen(keyword, " ", 1);
        if let Some(a) = counts_from_text(&rest) {
            return Some(a);
        }
        let n: u32 = bare_count_regex()
            .captures(&rest)?
            .get(1)?
            .as_str()
            .parse()
            .ok()?;
        Some(Availability::from_counts(n, n))
    })
}

// ── Last-updated strategies ──────────────────────────────────────────────────

fn updated_at_from_selectors(document: &Html, ctx: &ExtractContext<'_>) -> Option<DateTime<Utc>> {
    UPDATED_SELECTORS.iter().find_map(|css| {
        let sel = Selector::parse(css).ok()?;
        document
            .select(&sel)
            .find_map(|el| parse_clock_time(&element_text(&el), ctx.utc_offset, ctx.now))
    })
}

/// Visible text of an element with whitespace collapsed.
fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
