//! Direct channel: the structured vacancy endpoint over plain HTTP.
//!
//! The endpoint turns away clients that do not look like the site's own
//! XHR calls, so every request carries browser headers and a referer
//! pointing at the store's detail page.

use super::VacancyChannel;
use crate::config::UpstreamConfig;
use crate::error::{VacancyError, VacancyResult};
use crate::normalize::{normalize_api_payload, parse_api_body, ExtractContext};
use crate::types::{RecordSource, VacancyRecord};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

/// HTTP client for the structured endpoint.
#[derive(Clone)]
pub struct DirectChannel {
    client: reqwest::Client,
    upstream: UpstreamConfig,
    timeout: Duration,
}

impl DirectChannel {
    /// Build a client with browser-like default headers.
    pub fn new(upstream: UpstreamConfig, timeout: Duration) -> VacancyResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("ja,en-US;q=0.9,en;q=0.8"),
        );
        headers.insert(
            "X-Requested-With",
            HeaderValue::from_static("XMLHttpRequest"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            upstream,
            timeout,
        })
    }
}

#[async_trait]
impl VacancyChannel for DirectChannel {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn fetch(&self, store_id: &str) -> VacancyResult<VacancyRecord> {
        let resp = self
            .client
            .get(&self.upstream.api_endpoint)
            .query(&[("store_cd", store_id)])
            .header(header::REFERER, self.upstream.detail_page_url(store_id))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(VacancyError::Transport(format!(
                "HTTP {} from {}",
                status.as_u16(),
                self.upstream.api_endpoint
            )));
        }

        let body = resp.text().await?;
        let payload = parse_api_body(&body)?;
        if payload.status != 0 {
            return Err(VacancyError::UpstreamValidation {
                store_id: store_id.to_string(),
                status: payload.status,
            });
        }

        let ctx = ExtractContext::new(&self.upstream, store_id, Utc::now());
        Ok(normalize_api_payload(&payload, &ctx, RecordSource::Direct))
    }
}
