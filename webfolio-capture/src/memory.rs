//! In-memory rendering engine.
//!
//! Serves a fixed set of HTML pages and produces placeholder PDF bytes. It
//! records every page it opens and closes so resource balance can be asserted.
//! Built only for tests, or for dependents with the `test-util` feature.
//!
//! Limitations: no layout, no script execution. Script evaluation only
//! understands the content-height probes the capture unit issues.

use crate::engine::{EngineLauncher, PdfOptions, RenderEngine, RenderPage};
use crate::error::{CaptureError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Called with the URL of every navigation before it resolves.
pub type NavigateHook = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone)]
struct MemoryPage {
    html: String,
    /// Content height reported on first measurement.
    height: i64,
    /// Growth per scroll step; 0 for static pages.
    growth: i64,
    load_delay: Duration,
    print_fails: bool,
}

/// The pages an in-memory engine can serve, keyed by URL without fragment.
#[derive(Debug, Clone, Default)]
pub struct MemorySite {
    pages: HashMap<String, MemoryPage>,
    redirects: HashMap<String, String>,
}

fn page_key(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

impl MemorySite {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(mut self, url: &str, page: MemoryPage) -> Self {
        self.pages.insert(page_key(url), page);
        self
    }

    pub fn page(self, url: &str, body: &str) -> Self {
        self.insert(
            url,
            MemoryPage {
                html: format!("<html><body>{}</body></html>", body),
                height: 1920,
                growth: 0,
                load_delay: Duration::ZERO,
                print_fails: false,
            },
        )
    }

    /// A page whose content keeps growing on every scroll step.
    pub fn endless_page(self, url: &str, body: &str) -> Self {
        let mut site = self.page(url, body);
        if let Some(page) = site.pages.get_mut(&page_key(url)) {
            page.growth = 480;
        }
        site
    }

    /// A page whose navigation takes `delay` to complete.
    pub fn slow_page(self, url: &str, body: &str, delay: Duration) -> Self {
        let mut site = self.page(url, body);
        if let Some(page) = site.pages.get_mut(&page_key(url)) {
            page.load_delay = delay;
        }
        site
    }

    /// A page that loads but cannot be printed.
    pub fn unprintable_page(self, url: &str, body: &str) -> Self {
        let mut site = self.page(url, body);
        if let Some(page) = site.pages.get_mut(&page_key(url)) {
            page.print_fails = true;
        }
        site
    }

    /// Navigating to `from` ends up on `to`, like an HTTP redirect.
    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(page_key(from), to.to_string());
        self
    }

    /// The page served for `url` and the URL it was served from.
    fn resolve(&self, url: &str) -> Option<(String, &MemoryPage)> {
        let final_url = self
            .redirects
            .get(&page_key(url))
            .cloned()
            .unwrap_or_else(|| url.to_string());
        let page = self.pages.get(&page_key(&final_url))?;
        Some((final_url, page))
    }
}

/// Counters shared by a launcher and every engine/page it creates.
#[derive(Debug, Default)]
pub struct EngineStats {
    launches: AtomicUsize,
    engines_closed: AtomicUsize,
    pages_opened: AtomicUsize,
    pages_closed: AtomicUsize,
    navigations: Mutex<Vec<String>>,
}

impl EngineStats {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn engines_closed(&self) -> usize {
        self.engines_closed.load(Ordering::SeqCst)
    }

    pub fn pages_opened(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst)
    }

    pub fn pages_closed(&self) -> usize {
        self.pages_closed.load(Ordering::SeqCst)
    }

    /// Every URL navigated to, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Clone)]
pub struct MemoryLauncher {
    site: Arc<MemorySite>,
    stats: Arc<EngineStats>,
    on_navigate: Option<NavigateHook>,
    launch_error: Option<String>,
}

impl MemoryLauncher {
    pub fn new(site: MemorySite) -> Self {
        Self {
            site: Arc::new(site),
            stats: Arc::new(EngineStats::default()),
            on_navigate: None,
            launch_error: None,
        }
    }

    /// A launcher whose every launch fails with `EngineLaunch`.
    pub fn failing(reason: &str) -> Self {
        let mut launcher = Self::new(MemorySite::new());
        launcher.launch_error = Some(reason.to_string());
        launcher
    }

    pub fn with_navigate_hook(mut self, hook: NavigateHook) -> Self {
        self.on_navigate = Some(hook);
        self
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl EngineLauncher for MemoryLauncher {
    type Engine = MemoryEngine;

    async fn launch(&self) -> Result<MemoryEngine> {
        if let Some(ref reason) = self.launch_error {
            return Err(CaptureError::EngineLaunch(reason.clone()));
        }
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryEngine {
            site: self.site.clone(),
            stats: self.stats.clone(),
            on_navigate: self.on_navigate.clone(),
        })
    }
}

pub struct MemoryEngine {
    site: Arc<MemorySite>,
    stats: Arc<EngineStats>,
    on_navigate: Option<NavigateHook>,
}

#[async_trait]
impl RenderEngine for MemoryEngine {
    type Page = MemoryPageHandle;

    async fn open_page(&self) -> Result<MemoryPageHandle> {
        self.stats.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryPageHandle {
            site: self.site.clone(),
            stats: self.stats.clone(),
            on_navigate: self.on_navigate.clone(),
            state: Mutex::new(PageState::default()),
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.stats.engines_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PageState {
    current: Option<MemoryPage>,
    url: Option<String>,
    height: i64,
}

pub struct MemoryPageHandle {
    site: Arc<MemorySite>,
    stats: Arc<EngineStats>,
    on_navigate: Option<NavigateHook>,
    state: Mutex<PageState>,
}

impl MemoryPageHandle {
    fn state(&self) -> std::sync::MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn loaded(&self) -> Result<MemoryPage> {
        self.state()
            .current
            .clone()
            .ok_or_else(|| CaptureError::Evaluation("no document loaded".to_string()))
    }
}

#[async_trait]
impl RenderPage for MemoryPageHandle {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.stats
            .navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        if let Some(ref hook) = self.on_navigate {
            hook(url);
        }

        let (final_url, page) = self
            .site
            .resolve(url)
            .map(|(final_url, page)| (final_url, page.clone()))
            .ok_or_else(|| CaptureError::Navigation {
                url: url.to_string(),
                reason: "host unreachable".to_string(),
            })?;

        if !page.load_delay.is_zero() {
            tokio::time::sleep(page.load_delay).await;
        }

        let mut state = self.state();
        state.height = page.height;
        state.current = Some(page);
        state.url = Some(final_url);
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        self.state()
            .url
            .clone()
            .ok_or_else(|| CaptureError::Evaluation("no document loaded".to_string()))
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let page = self.loaded()?;
        let mut state = self.state();
        if script.contains("scrollBy") {
            state.height += page.growth;
            return Ok(Value::from(state.height));
        }
        if script.contains("scrollHeight") {
            return Ok(Value::from(state.height));
        }
        Ok(Value::Bool(true))
    }

    async fn content(&self) -> Result<String> {
        Ok(self.loaded()?.html)
    }

    async fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>> {
        let page = self.loaded()?;
        if page.print_fails {
            return Err(CaptureError::Emission("printer on fire".to_string()));
        }
        Ok(format!(
            "%PDF-1.4\n% {}x{} placeholder\n%%EOF\n",
            options.width_px, options.height_px
        )
        .into_bytes())
    }

    async fn close(&self) -> Result<()> {
        self.stats.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
