//! Chromium-based renderer using chromiumoxide.

use super::{NavigationResult, RenderPage, Renderer};
use crate::config::BrowserOptions;
use crate::error::{VacancyError, VacancyResult};
use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Interval between content-ready probes.
const CONTENT_POLL: Duration = Duration::from_millis(250);

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    // 1. Configured path (CLI flag or SEATWATCH_CHROMIUM_PATH)
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.clone());
        }
        tracing::warn!("configured Chromium path {} does not exist", path.display());
    }

    // 2. ~/.seatwatch/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".seatwatch/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".seatwatch/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".seatwatch/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".seatwatch/chromium/chrome-linux64/chrome"),
                home.join(".seatwatch/chromium/chrome"),
            ]
        };
        if let Some(c) = candidates.into_iter().find(|c| c.exists()) {
            return Some(c);
        }
    }

    // 3. System PATH
    ["google-chrome", "chromium", "chromium-browser"]
        .iter()
        .find_map(|bin| which::which(bin).ok())
}

struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// Chromium-based renderer.
///
/// The browser is launched lazily on the first `new_page` and reused for
/// every later page until `shutdown`.
pub struct ChromiumRenderer {
    options: BrowserOptions,
    session: Mutex<Option<BrowserSession>>,
    closed: AtomicBool,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Create a renderer. No browser process is started yet.
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            session: Mutex::new(None),
            closed: AtomicBool::new(false),
            active_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    async fn launch(&self) -> VacancyResult<BrowserSession> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");
        match find_chromium(self.options.chromium_path.as_ref()) {
            Some(path) => builder = builder.chrome_executable(path),
            None => tracing::debug!("no Chromium found on known paths, using chromiumoxide detection"),
        }
        if !self.options.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| VacancyError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| VacancyError::Browser(format!("failed to launch Chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!("Chromium session launched");
        Ok(BrowserSession { browser, handler })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_page(&self) -> VacancyResult<Box<dyn RenderPage>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(VacancyError::Browser("browser session is shut down".to_string()));
        }

        let page = {
            let mut guard = self.session.lock().await;
            // `shutdown` may have run while this call waited on the lock.
            if self.closed.load(Ordering::Acquire) {
                return Err(VacancyError::Browser("browser session is shut down".to_string()));
            }
            if guard.is_none() {
                *guard = Some(self.launch().await?);
            }
            let session = guard
                .as_ref()
                .ok_or_else(|| VacancyError::Browser("browser session unavailable".to_string()))?;
            session.browser.new_page("about:blank").await?
        };

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumPage {
            page,
            active_count: Arc::clone(&self.active_count),
            captured: Arc::new(std::sync::Mutex::new(Vec::new())),
            listener: None,
        }))
    }

    async fn shutdown(&self) -> VacancyResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let session = self.session.lock().await.take();
        if let Some(mut session) = session {
            if let Err(e) = session.browser.close().await {
                tracing::warn!("browser close failed: {e}");
            }
            let _ = session.browser.wait().await;
            session.handler.abort();
            tracing::info!("Chromium session closed");
        }
        Ok(())
    }

    fn active_pages(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page.
pub struct ChromiumPage {
    page: Page,
    active_count: Arc<AtomicUsize>,
    /// Request ids of matching responses; bodies are fetched on demand.
    captured: Arc<std::sync::Mutex<Vec<RequestId>>>,
    listener: Option<JoinHandle<()>>,
}

#[async_trait]
impl RenderPage for ChromiumPage {
    async fn capture_responses(&mut self, path_fragment: &str) -> VacancyResult<()> {
        let mut events = self.page.event_listener::<EventResponseReceived>().await?;
        let sink = Arc::clone(&self.captured);
        let fragment = path_fragment.to_string();

        self.listener = Some(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let response = &event.response;
                if response.url.contains(&fragment) && response.mime_type.contains("json") {
                    tracing::debug!("captured structured response {}", response.url);
                    sink.lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(event.request_id.clone());
                }
            }
        }));
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> VacancyResult<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(timeout, self.page.goto(url)).await;
        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| url.to_string());
                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => Err(VacancyError::Browser(format!("navigation failed: {e}"))),
            Err(_) => Err(VacancyError::Transport(format!(
                "navigation timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn wait_for_content(&self, selector: &str, timeout: Duration) -> VacancyResult<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return !!el && el.children.length > 0; }})()",
            serde_json::to_string(selector)?
        );

        let probe = async {
            loop {
                let ready = match self.page.evaluate(script.as_str()).await {
                    Ok(v) => v.into_value::<bool>().unwrap_or(false),
                    Err(_) => false,
                };
                if ready {
                    return;
                }
                tokio::time::sleep(CONTENT_POLL).await;
            }
        };

        tokio::time::timeout(timeout, probe)
            .await
            .map_err(|_| VacancyError::ContentTimeout(timeout))
    }

    async fn captured_payloads(&self) -> VacancyResult<Vec<String>> {
        let ids: Vec<RequestId> = self
            .captured
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let mut bodies = Vec::with_capacity(ids.len());
        for id in ids {
            match self.page.execute(GetResponseBodyParams::new(id)).await {
                Ok(resp) => {
                    let body = if resp.result.base64_encoded {
                        base64::engine::general_purpose::STANDARD
                            .decode(resp.result.body.as_bytes())
                            .ok()
                            .and_then(|b| String::from_utf8(b).ok())
                    } else {
                        Some(resp.result.body.clone())
                    };
                    if let Some(body) = body {
                        bodies.push(body);
                    }
                }
                Err(e) => tracing::debug!("captured response body unavailable: {e}"),
            }
        }
        Ok(bodies)
    }

    async fn get_html(&self) -> VacancyResult<String> {
        Ok(self.page.content().await?)
    }

    async fn close(self: Box<Self>) -> VacancyResult<()> {
        if let Some(listener) = &self.listener {
            listener.abort();
        }
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}
