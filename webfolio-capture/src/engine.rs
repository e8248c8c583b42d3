//! Contract between the capture orchestrator and a rendering engine.
//!
//! The orchestrator never talks to a browser directly. It launches an engine
//! through an [`EngineLauncher`], opens one [`RenderPage`] at a time, and closes
//! everything it opened. Implementations decide how navigation, script
//! evaluation and PDF printing actually happen.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Page geometry and print settings handed to [`RenderPage::print_pdf`].
#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    /// Paper width in CSS pixels.
    pub width_px: u32,
    /// Paper height in CSS pixels. Content taller than this flows onto more pages.
    pub height_px: u32,
    pub print_background: bool,
    pub margin_px: u32,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            width_px: 1440,
            height_px: 1920,
            print_background: true,
            margin_px: 0,
        }
    }
}

/// Starts a rendering engine for one capture session.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    type Engine: RenderEngine;

    /// Fails with `CaptureError::EngineLaunch` when no rendering capability is available.
    async fn launch(&self) -> Result<Self::Engine>;
}

/// A running engine instance owned by exactly one capture session.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    type Page: RenderPage;

    async fn open_page(&self) -> Result<Self::Page>;

    /// Releases the engine. Called exactly once, after every page is closed.
    async fn close(&mut self) -> Result<()>;
}

/// A single page context inside an engine.
#[async_trait]
pub trait RenderPage: Send + Sync {
    /// Loads `url` and resolves once the page has settled. Callers bound the wait.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// URL of the loaded document after redirects. Relative links resolve
    /// against this, not against the URL that was requested.
    async fn url(&self) -> Result<String>;

    /// Evaluates a script expression and returns its JSON-serializable result.
    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// Serialized HTML of the rendered DOM.
    async fn content(&self) -> Result<String>;

    async fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>>;

    async fn close(&self) -> Result<()>;
}
