//! Acquisition channels.
//!
//! Each channel turns a store id into a [`VacancyRecord`] on its own:
//! [`direct::DirectChannel`] calls the structured endpoint over HTTP,
//! [`rendered::RenderedChannel`] loads the detail page in a browser.

pub mod direct;
pub mod rendered;

use crate::error::VacancyResult;
use crate::types::VacancyRecord;
use async_trait::async_trait;

pub use direct::DirectChannel;
pub use rendered::RenderedChannel;

/// One independent way of obtaining a store's vacancy.
#[async_trait]
pub trait VacancyChannel: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;
    /// Fetch and normalize one store. A single attempt, no retries.
    async fn fetch(&self, store_id: &str) -> VacancyResult<VacancyRecord>;
}
