//! Seat status grammar shared by both payload shapes.

use crate::types::SeatStatus;
use regex::Regex;
use std::sync::OnceLock;

/// Status strings that mean "no seats", compared after trimming.
const FULL_TOKENS: &[&str] = &["満席", "満", "×", "full", "sold out", "no vacancy"];

fn remaining_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"(?:残り|残)\s*(\d+)\s*(?:席|seats?)?").expect("jp remaining regex is valid"),
            Regex::new(r"(?i)remaining\s*[:\-]?\s*(\d+)").expect("remaining regex is valid"),
            Regex::new(r"(?i)(\d+)\s*seats?\s*(?:left|remaining|available)")
                .expect("seats-left regex is valid"),
            // "10 or more" keeps only the digits; the qualifier is dropped.
            Regex::new(r"(?i)(\d+)\s*(?:席以上|以上|\+|or\s+more)").expect("or-more regex is valid"),
        ]
    })
}

/// True when the text is one of the exact "full" tokens.
pub fn is_full_token(text: &str) -> bool {
    let t = text.trim();
    FULL_TOKENS.iter().any(|tok| t.eq_ignore_ascii_case(tok))
}

/// Parse an upstream status string into an available-seat count.
///
/// Full tokens and unmatched text both yield 0.
pub fn parse_status_text(text: &str) -> u32 {
    if is_full_token(text) {
        return 0;
    }
    for re in remaining_patterns() {
        if let Some(n) = re
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        {
            return n;
        }
    }
    0
}

/// Map an explicit upstream status code onto a status.
pub fn map_status_code(code: i64) -> SeatStatus {
    match code {
        1 => SeatStatus::Vacant,
        2 | 3 => SeatStatus::Crowded,
        4 => SeatStatus::Full,
        _ => SeatStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_tokens() {
        assert_eq!(parse_status_text("満席"), 0);
        assert_eq!(parse_status_text("  FULL "), 0);
        assert!(is_full_token("Sold Out"));
        assert!(!is_full_token("満席ではありません"));
    }

    #[test]
    fn test_remaining_patterns() {
        assert_eq!(parse_status_text("残り3席"), 3);
        assert_eq!(parse_status_text("残 12 席"), 12);
        assert_eq!(parse_status_text("remaining: 7"), 7);
        assert_eq!(parse_status_text("3 seats left"), 3);
    }

    #[test]
    fn test_or_more_is_literal_digits() {
        assert_eq!(parse_status_text("10席以上"), 10);
        assert_eq!(parse_status_text("残り10席以上"), 10);
        assert_eq!(parse_status_text("10 or more"), 10);
    }

    #[test]
    fn test_unparseable_is_zero() {
        assert_eq!(parse_status_text(""), 0);
        assert_eq!(parse_status_text("お問い合わせください"), 0);
        assert_eq!(parse_status_text("○"), 0);
    }

    #[test]
    fn test_status_code_map() {
        assert_eq!(map_status_code(1), SeatStatus::Vacant);
        assert_eq!(map_status_code(2), SeatStatus::Crowded);
        assert_eq!(map_status_code(3), SeatStatus::Crowded);
        assert_eq!(map_status_code(4), SeatStatus::Full);
        for other in [-1, 0, 5, 99] {
            assert_eq!(map_status_code(other), SeatStatus::Unknown);
        }
    }
}
