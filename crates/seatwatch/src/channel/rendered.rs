//! Rendered channel: load the detail page in the shared browser.
//!
//! While the page loads, responses from the structured endpoint are
//! recorded. A usable capture is authoritative and goes through the
//! structured parse; otherwise the rendered HTML goes through the document
//! strategies.

use super::VacancyChannel;
use crate::config::{ChannelConfig, UpstreamConfig};
use crate::error::{VacancyError, VacancyResult};
use crate::normalize::{normalize_api_payload, normalize_document, parse_api_body, ApiPayload, ExtractContext};
use crate::renderer::{RenderPage, Renderer};
use crate::types::{RecordSource, VacancyRecord};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Browser-driven acquisition.
pub struct RenderedChannel {
    renderer: Arc<dyn Renderer>,
    upstream: UpstreamConfig,
    settings: ChannelConfig,
}

impl RenderedChannel {
    pub fn new(renderer: Arc<dyn Renderer>, upstream: UpstreamConfig, settings: ChannelConfig) -> Self {
        Self {
            renderer,
            upstream,
            settings,
        }
    }

    async fn load_and_parse(
        &self,
        page: &mut dyn RenderPage,
        store_id: &str,
    ) -> VacancyResult<VacancyRecord> {
        page.capture_responses(&self.upstream.api_path()).await?;

        let url = self.upstream.detail_page_url(store_id);
        let nav = page.navigate(&url, self.settings.navigation_timeout).await?;
        tracing::debug!(store = store_id, "loaded {} in {}ms", nav.final_url, nav.load_time_ms);

        match page
            .wait_for_content(&self.settings.content_selector, self.settings.content_timeout)
            .await
        {
            Ok(()) => {}
            Err(VacancyError::ContentTimeout(waited)) => {
                tracing::warn!(
                    store = store_id,
                    "content marker {} not populated after {}ms, parsing anyway",
                    self.settings.content_selector,
                    waited.as_millis()
                );
            }
            Err(e) => return Err(e),
        }

        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }

        let captured = page.captured_payloads().await.unwrap_or_else(|e| {
            tracing::warn!(store = store_id, "reading captured responses failed: {e}");
            Vec::new()
        });

        if let Some(payload) = usable_capture(&captured, store_id) {
            let ctx = ExtractContext::new(&self.upstream, store_id, Utc::now());
            return Ok(normalize_api_payload(&payload, &ctx, RecordSource::RenderedCapture));
        }

        let html = page.get_html().await?;
        let ctx = ExtractContext::new(&self.upstream, store_id, Utc::now());
        Ok(normalize_document(&html, &ctx))
    }
}

/// The latest captured body that decodes with a zero status.
fn usable_capture(bodies: &[String], store_id: &str) -> Option<ApiPayload> {
    bodies.iter().rev().find_map(|body| match parse_api_body(body) {
        Ok(payload) if payload.status == 0 => Some(payload),
        Ok(payload) => {
            tracing::warn!(
                store = store_id,
                "captured payload has status {}, ignoring",
                payload.status
            );
            None
        }
        Err(e) => {
            tracing::debug!(store = store_id, "captured payload undecodable: {e}");
            None
        }
    })
}

#[async_trait]
impl VacancyChannel for RenderedChannel {
    fn name(&self) -> &'static str {
        "rendered"
    }

    async fn fetch(&self, store_id: &str) -> VacancyResult<VacancyRecord> {
        let mut page = self.renderer.new_page().await?;
        let result = self.load_and_parse(page.as_mut(), store_id).await;
        if let Err(e) = page.close().await {
            tracing::warn!(store = store_id, "closing page failed: {e}");
        }
        result
    }
}
