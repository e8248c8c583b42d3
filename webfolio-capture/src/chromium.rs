//! Headless Chromium rendering engine backed by `chromiumoxide`.

use crate::config::ChromiumConfig;
use crate::engine::{EngineLauncher, PdfOptions, RenderEngine, RenderPage};
use crate::error::{CaptureError, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Display;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const CSS_PX_PER_INCH: f64 = 96.0;

/// How long the page must go without an open request to count as idle.
const NETWORK_IDLE_WINDOW: Duration = Duration::from_millis(500);

/// Polls the CDP handler until its stream ends. Errors on individual messages
/// are logged and skipped. Returns the number of messages seen.
async fn pump_handler<S, E>(mut events: S) -> usize
where
    S: Stream<Item = std::result::Result<(), E>> + Unpin,
    E: Display,
{
    let mut seen = 0;
    while let Some(event) = events.next().await {
        seen += 1;
        if let Err(e) = event {
            debug!("Chromium handler error: {}", e);
        }
    }
    debug!("Chromium handler stream ended after {} messages", seen);
    seen
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NetworkActivity {
    Started(String),
    Settled(String),
}

/// Resolves once no request has been open for `window`, or when the activity
/// stream ends. Callers bound the overall wait.
async fn wait_for_network_idle<S>(mut activity: S, window: Duration)
where
    S: Stream<Item = NetworkActivity> + Unpin,
{
    let mut inflight = HashSet::new();
    loop {
        let quiet = tokio::time::sleep(window);
        tokio::select! {
            event = activity.next() => match event {
                Some(NetworkActivity::Started(id)) => {
                    inflight.insert(id);
                }
                Some(NetworkActivity::Settled(id)) => {
                    inflight.remove(&id);
                }
                None => return,
            },
            _ = quiet, if inflight.is_empty() => return,
        }
    }
}

pub struct ChromiumLauncher {
    config: ChromiumConfig,
}

impl ChromiumLauncher {
    pub fn new(config: ChromiumConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.config.viewport_width, self.config.viewport_height)
            .viewport(Viewport {
                width: self.config.viewport_width,
                height: self.config.viewport_height,
                ..Viewport::default()
            })
            .arg("--disable-gpu");

        if !self.config.sandbox {
            builder = builder.no_sandbox().arg("--disable-setuid-sandbox");
        }
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = self.config.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(CaptureError::EngineLaunch)
    }
}

impl Default for ChromiumLauncher {
    fn default() -> Self {
        Self::new(ChromiumConfig::default())
    }
}

#[async_trait]
impl EngineLauncher for ChromiumLauncher {
    type Engine = ChromiumEngine;

    async fn launch(&self) -> Result<ChromiumEngine> {
        let config = self.browser_config()?;
        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| CaptureError::EngineLaunch(e.to_string()))?;

        // The CDP handler must be polled for the browser to make progress.
        let handler_task = tokio::spawn(async move {
            pump_handler(handler).await;
        });

        debug!("Chromium launched");
        Ok(ChromiumEngine {
            browser,
            handler_task: Some(handler_task),
        })
    }
}

pub struct ChromiumEngine {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
}

#[async_trait]
impl RenderEngine for ChromiumEngine {
    type Page = ChromiumPage;

    async fn open_page(&self) -> Result<ChromiumPage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| CaptureError::Navigation {
                url: "about:blank".to_string(),
                reason: format!("could not open page: {}", e),
            })?;
        Ok(ChromiumPage { page })
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.browser.close().await {
            warn!("Chromium close command failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Waiting for Chromium to exit failed: {}", e);
        }
        if let Some(task) = self.handler_task.take()
            && let Err(e) = task.await
        {
            warn!("Chromium handler task failed: {}", e);
        }
        debug!("Chromium closed");
        Ok(())
    }
}

pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    /// Request lifecycle events of this page, subscribed before navigating so
    /// nothing issued during the load is missed.
    async fn network_activity(
        &self,
    ) -> chromiumoxide::error::Result<impl Stream<Item = NetworkActivity> + Unpin + Send> {
        let started = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await?
            .map(|e| NetworkActivity::Started(e.request_id.inner().clone()));
        let finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await?
            .map(|e| NetworkActivity::Settled(e.request_id.inner().clone()));
        let failed = self
            .page
            .event_listener::<EventLoadingFailed>()
            .await?
            .map(|e| NetworkActivity::Settled(e.request_id.inner().clone()));

        Ok(futures::stream::select(
            started,
            futures::stream::select(finished, failed),
        ))
    }
}

#[async_trait]
impl RenderPage for ChromiumPage {
    /// Loads `url`, then waits until the network has been idle for
    /// [`NETWORK_IDLE_WINDOW`] so late XHR content is in the DOM.
    async fn navigate(&self, url: &str) -> Result<()> {
        let navigation_error = |reason: String| CaptureError::Navigation {
            url: url.to_string(),
            reason,
        };

        let activity = self
            .network_activity()
            .await
            .map_err(|e| navigation_error(format!("subscribing to network events: {}", e)))?;
        self.page
            .goto(url)
            .await
            .map_err(|e| navigation_error(e.to_string()))?;

        wait_for_network_idle(activity, NETWORK_IDLE_WINDOW).await;
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        self.page
            .url()
            .await
            .map_err(|e| CaptureError::Evaluation(e.to_string()))?
            .ok_or_else(|| CaptureError::Evaluation("page has no URL".to_string()))
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| CaptureError::Evaluation(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| CaptureError::Evaluation(e.to_string()))
    }

    async fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>> {
        let margin = options.margin_px as f64 / CSS_PX_PER_INCH;
        let params = PrintToPdfParams {
            print_background: Some(options.print_background),
            paper_width: Some(options.width_px as f64 / CSS_PX_PER_INCH),
            paper_height: Some(options.height_px as f64 / CSS_PX_PER_INCH),
            margin_top: Some(margin),
            margin_bottom: Some(margin),
            margin_left: Some(margin),
            margin_right: Some(margin),
            ..PrintToPdfParams::default()
        };

        self.page
            .pdf(params)
            .await
            .map_err(|e| CaptureError::Emission(e.to_string()))
    }

    async fn close(&self) -> Result<()> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| CaptureError::Evaluation(format!("closing page: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn started(id: &str) -> NetworkActivity {
        NetworkActivity::Started(id.to_string())
    }

    fn settled(id: &str) -> NetworkActivity {
        NetworkActivity::Settled(id.to_string())
    }

    #[tokio::test]
    async fn test_handler_keeps_polling_after_errors() {
        let events = stream::iter(vec![Ok(()), Err("connection reset"), Ok(()), Ok(())]);
        assert_eq!(pump_handler(events).await, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_page_is_idle_after_window() {
        let started_at = tokio::time::Instant::now();
        wait_for_network_idle(stream::pending(), NETWORK_IDLE_WINDOW).await;
        assert!(started_at.elapsed() >= NETWORK_IDLE_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_request_blocks_idle() {
        let activity = stream::iter(vec![started("1"), started("2"), settled("1")])
            .chain(stream::pending());
        let waited = tokio::time::timeout(
            Duration::from_secs(30),
            wait_for_network_idle(activity, NETWORK_IDLE_WINDOW),
        )
        .await;
        assert!(waited.is_err(), "request 2 never finished");
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_once_every_request_settles() {
        let activity = stream::iter(vec![
            started("1"),
            started("2"),
            settled("2"),
            settled("1"),
            settled("unknown"),
        ])
        .chain(stream::pending());
        let waited = tokio::time::timeout(
            Duration::from_secs(30),
            wait_for_network_idle(activity, NETWORK_IDLE_WINDOW),
        )
        .await;
        assert!(waited.is_ok());
    }
}
