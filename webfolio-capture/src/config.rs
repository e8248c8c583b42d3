use crate::engine::PdfOptions;
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for how a single page is turned into an artifact.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub scratch_dir: PathBuf,
    pub navigation_timeout: Duration,
    /// Delay between two scroll steps of the stabilization loop.
    pub scroll_interval: Duration,
    /// Consecutive observations without growth before content counts as stable.
    pub stable_observations: u32,
    /// Hard cap on scroll steps, for pages that grow forever.
    pub max_scroll_iterations: u32,
    pub stabilization_timeout: Duration,
    pub settle_delay: Duration,
    pub style_settle_delay: Duration,
    pub pdf: PdfOptions,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("temp"),
            navigation_timeout: Duration::from_secs(60),
            scroll_interval: Duration::from_millis(250),
            stable_observations: 15,
            max_scroll_iterations: 200,
            stabilization_timeout: Duration::from_secs(120),
            settle_delay: Duration::from_secs(5),
            style_settle_delay: Duration::from_millis(500),
            pdf: PdfOptions::default(),
        }
    }
}

impl CaptureConfig {
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    pub fn with_scroll_interval(mut self, interval: Duration) -> Self {
        self.scroll_interval = interval;
        self
    }

    pub fn with_stable_observations(mut self, observations: u32) -> Self {
        self.stable_observations = observations;
        self
    }

    pub fn with_max_scroll_iterations(mut self, iterations: u32) -> Self {
        self.max_scroll_iterations = iterations;
        self
    }

    pub fn with_stabilization_timeout(mut self, timeout: Duration) -> Self {
        self.stabilization_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_style_settle_delay(mut self, delay: Duration) -> Self {
        self.style_settle_delay = delay;
        self
    }
}

/// Launch settings for the bundled Chromium engine.
#[derive(Debug, Clone)]
pub struct ChromiumConfig {
    /// Browser binary; `None` lets the engine auto-detect an installed Chrome/Chromium.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub sandbox: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            sandbox: false,
            viewport_width: 1440,
            viewport_height: 1920,
        }
    }
}

impl ChromiumConfig {
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }
}
