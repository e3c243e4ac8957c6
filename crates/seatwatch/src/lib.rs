// Copyright 2026 Seatwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Seatwatch: seat-vacancy acquisition for a chain of stores.
//!
//! For each store id the pipeline tries the structured endpoint directly,
//! falls back to loading the store page in a shared headless browser, and
//! normalizes either payload into one [`VacancyRecord`]. Records are cached
//! with a TTL and every tracked store is refreshed on upstream's publish
//! cadence.
//!
//! ```text
//! Scheduler ─▶ VacancyService ─▶ Acquirer ─▶ DirectChannel ─┐
//!                   │                    └─▶ RenderedChannel ┴─▶ normalize
//!                   └─▶ TtlCache
//! ```

pub mod acquisition;
pub mod cache;
pub mod channel;
pub mod clock;
pub mod config;
pub mod error;
pub mod normalize;
pub mod renderer;
pub mod scheduler;
pub mod service;
pub mod types;

pub use cache::{CacheStats, TtlCache};
pub use config::SeatwatchConfig;
pub use error::{VacancyError, VacancyResult};
pub use scheduler::{Cadence, RoundReport, Scheduler};
pub use service::{CachedRecord, VacancyService};
pub use types::{Availability, RecordSource, SeatStatus, VacancyRecord};
