//! Upstream publish cadence.
//!
//! Upstream republishes on fixed boundaries (every 10 minutes by default)
//! and its data lags each boundary by a few minutes. Refreshes fire a
//! margin past every boundary so they read the new data, not the old.
//! Boundaries are multiples of the interval since the Unix epoch, which
//! coincide with local wall-clock boundaries for any whole-hour offset.

use crate::config::CadenceConfig;
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub interval: Duration,
    pub publish_lag: Duration,
    pub margin: Duration,
}

impl From<&CadenceConfig> for Cadence {
    fn from(cfg: &CadenceConfig) -> Self {
        Self {
            interval: cfg.interval,
            publish_lag: cfg.publish_lag,
            margin: cfg.margin,
        }
    }
}

impl Cadence {
    /// The earliest `boundary + margin` strictly after `now`.
    pub fn compute_next_trigger(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let interval = self.interval.as_secs().max(1) as i64;
        let margin = self.margin.as_secs() as i64;

        // Whole seconds; a `now` a fraction past the trigger counts as at it.
        let secs = now.timestamp();
        let slot = secs.div_euclid(interval) * interval;
        let mut trigger = slot + margin;
        if trigger <= secs {
            trigger += interval;
        }
        Utc.timestamp_opt(trigger, 0).single().unwrap_or(now)
    }

    /// How long to sleep from `now` until the next trigger.
    pub fn delay_until_next(&self, now: DateTime<Utc>) -> Duration {
        (self.compute_next_trigger(now) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// The next `count` triggers after `now`.
    pub fn upcoming(&self, now: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = now;
        for _ in 0..count {
            cursor = self.compute_next_trigger(cursor);
            out.push(cursor);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeatwatchConfig;

    fn cadence() -> Cadence {
        Cadence::from(&SeatwatchConfig::default().cadence)
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_before_trigger_in_slot() {
        assert_eq!(cadence().compute_next_trigger(at(23, 1, 0)), at(23, 4, 0));
    }

    #[test]
    fn test_exactly_at_trigger_advances() {
        assert_eq!(cadence().compute_next_trigger(at(23, 4, 0)), at(23, 14, 0));
    }

    #[test]
    fn test_after_trigger_in_slot() {
        assert_eq!(cadence().compute_next_trigger(at(23, 7, 30)), at(23, 14, 0));
    }

    #[test]
    fn test_rolls_over_midnight() {
        let next = cadence().compute_next_trigger(at(23, 56, 0));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 2, 0, 4, 0).unwrap());
    }

    #[test]
    fn test_sub_second_past_trigger() {
        let now = at(23, 4, 0) + chrono::Duration::milliseconds(300);
        assert_eq!(cadence().compute_next_trigger(now), at(23, 14, 0));
    }

    #[test]
    fn test_delay_and_upcoming() {
        let c = cadence();
        assert_eq!(c.delay_until_next(at(23, 1, 0)), Duration::from_secs(180));
        assert_eq!(
            c.upcoming(at(23, 1, 0), 3),
            vec![at(23, 4, 0), at(23, 14, 0), at(23, 24, 0)]
        );
    }
}
