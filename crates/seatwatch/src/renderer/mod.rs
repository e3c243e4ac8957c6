//! Renderer abstraction for browser-based page loads.
//!
//! Defines the `Renderer` and `RenderPage` traits that abstract over the
//! browser engine (currently Chromium via chromiumoxide). One renderer is
//! shared per process; every fetch owns and closes its own page.

pub mod chromium;

use crate::error::{VacancyError, VacancyResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that hands out pages.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a new blank page, launching the browser on first use.
    async fn new_page(&self) -> VacancyResult<Box<dyn RenderPage>>;
    /// Close the browser. Idempotent.
    async fn shutdown(&self) -> VacancyResult<()>;
    /// Number of pages currently open.
    fn active_pages(&self) -> usize;
}

/// A single browser page.
#[async_trait]
pub trait RenderPage: Send + Sync {
    /// Start recording JSON responses whose URL contains `path_fragment`.
    /// Must be called before [`navigate`](Self::navigate).
    async fn capture_responses(&mut self, path_fragment: &str) -> VacancyResult<()>;
    /// Navigate with a timeout.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> VacancyResult<NavigationResult>;
    /// Wait until `selector` exists and has child elements.
    ///
    /// Returns [`VacancyError::ContentTimeout`] when the deadline passes.
    async fn wait_for_content(&self, selector: &str, timeout: Duration) -> VacancyResult<()>;
    /// Bodies of the responses recorded so far, in arrival order.
    async fn captured_payloads(&self) -> VacancyResult<Vec<String>>;
    /// Full rendered HTML.
    async fn get_html(&self) -> VacancyResult<String>;
    /// Release the page.
    async fn close(self: Box<Self>) -> VacancyResult<()>;
}

/// A renderer that never opens pages.
///
/// Used when the browser fallback is disabled; the rendered channel then
/// fails fast and only the direct channel serves data.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_page(&self) -> VacancyResult<Box<dyn RenderPage>> {
        Err(VacancyError::Browser(
            "browser disabled, direct channel only".to_string(),
        ))
    }
    async fn shutdown(&self) -> VacancyResult<()> {
        Ok(())
    }
    fn active_pages(&self) -> usize {
        0
    }
}
