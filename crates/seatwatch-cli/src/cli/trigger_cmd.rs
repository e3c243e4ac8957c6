//! Print upcoming refresh triggers.

use super::{load_config, Overrides};
use anyhow::Result;
use chrono::Utc;
use seatwatch::scheduler::Cadence;

pub fn run(overrides: &Overrides, count: usize) -> Result<()> {
    let cfg = load_config(overrides)?;
    let cadence = Cadence::from(&cfg.cadence);
    let now = Utc::now();
    for trigger in cadence.upcoming(now, count.max(1)) {
        let wait = (trigger - now).num_seconds();
        println!(
            "{}  (in {}m{:02}s)",
            trigger.with_timezone(&cfg.upstream.utc_offset).to_rfc3339(),
            wait / 60,
            wait % 60
        );
    }
    Ok(())
}
