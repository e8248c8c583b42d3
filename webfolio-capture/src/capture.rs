//! Single page capture.
//!
//! Drives one URL through navigation, content stabilization, print style
//! overrides and PDF emission, then optionally reads the rendered DOM for
//! outgoing links. The page context is closed on every exit path.

use crate::config::CaptureConfig;
use crate::engine::{RenderEngine, RenderPage};
use crate::error::{CaptureError, Result};
use crate::session::SessionHandle;
use crate::visited::TraversalNode;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

const MEASURE_SCRIPT: &str = "document.body ? document.body.scrollHeight : 0";

const SCROLL_STEP_SCRIPT: &str = r#"(() => {
    window.scrollBy(0, window.innerHeight);
    return document.body ? document.body.scrollHeight : 0;
})()"#;

const PRINT_STYLE_SCRIPT: &str = r#"(() => {
    const style = document.createElement('style');
    style.type = 'text/css';
    style.innerHTML = `
        html, body {
            overflow: visible !important;
        }
        header, footer, nav {
            position: static !important;
        }
        * {
            -webkit-print-color-adjust: exact !important;
            color-adjust: exact !important;
            print-color-adjust: exact !important;
        }
    `;
    document.head.appendChild(style);
    return true;
})()"#;

/// A PDF written to scratch storage for one visited page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedArtifact {
    pub source_url: String,
    pub file_path: PathBuf,
    pub depth: usize,
}

impl CapturedArtifact {
    pub fn filename(&self) -> String {
        self.file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug)]
pub enum PageOutcome {
    Captured {
        artifact: CapturedArtifact,
        /// Absolute http(s) anchor targets in DOM order. Empty unless requested.
        links: Vec<String>,
    },
    /// The session was stopped before the PDF was emitted.
    Cancelled,
}

/// Millisecond timestamps for artifact names, strictly increasing per traversal
/// so two fast captures at the same depth never share a name.
#[derive(Debug, Default)]
pub struct ArtifactClock {
    last: i64,
}

impl ArtifactClock {
    pub fn next(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let stamp = now.max(self.last + 1);
        self.last = stamp;
        stamp
    }
}

/// Replaces every character outside `[a-zA-Z0-9]` with `_`.
pub fn sanitize_host(host: &str) -> String {
    host.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// `<sanitizedHost>-<timestamp>-<depth>.pdf`
pub fn artifact_filename(url: &str, timestamp: i64, depth: usize) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}-{}-{}.pdf", sanitize_host(&host), timestamp, depth)
}

/// Base URL links in `document` resolve against: the first `<base href>`,
/// itself relative to `document_url`, or `document_url`.
fn document_base(document: &Html, document_url: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return document_url.clone();
    };
    document
        .select(&selector)
        .next()
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| document_url.join(href.trim()).ok())
        .unwrap_or_else(|| document_url.clone())
}

/// Collects `a[href]` targets in DOM order, resolved the way a browser does
/// against the document base, keeping only http(s).
///
/// `document_url` is where the document was actually loaded from.
pub fn extract_links(html: &str, document_url: &str) -> Vec<String> {
    let Ok(document_url) = Url::parse(document_url) else {
        return Vec::new();
    };
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let base = document_base(&document, &document_url);
    document
        .select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|url| url.to_string())
        .collect()
}

/// Runs the capture steps for `node` on a fresh page from `engine`.
///
/// Errors are per-page; the caller decides whether to continue.
pub async fn capture_page<E: RenderEngine>(
    engine: &E,
    config: &CaptureConfig,
    session: &SessionHandle,
    node: &TraversalNode,
    extract: bool,
    clock: &mut ArtifactClock,
) -> Result<PageOutcome> {
    let page = engine.open_page().await?;
    session.active_pages().acquire();

    let outcome = drive_page(&page, config, session, node, extract, clock).await;

    if let Err(e) = page.close().await {
        warn!("Failed to close page for {}: {}", node.url, e);
    }
    session.active_pages().release();

    outcome
}

async fn drive_page<P: RenderPage>(
    page: &P,
    config: &CaptureConfig,
    session: &SessionHandle,
    node: &TraversalNode,
    extract: bool,
    clock: &mut ArtifactClock,
) -> Result<PageOutcome> {
    navigate(page, &node.url, config).await?;
    stabilize(page, &node.url, config).await?;

    page.evaluate(PRINT_STYLE_SCRIPT).await?;
    tokio::time::sleep(config.style_settle_delay).await;

    if session.is_cancelled() {
        info!(
            "Stopping PDF generation for {} due to stop request",
            node.url
        );
        return Ok(PageOutcome::Cancelled);
    }

    let filename = artifact_filename(&node.url, clock.next(), node.depth);
    let file_path = config.scratch_dir.join(filename);
    emit_pdf(page, config, &file_path).await?;
    info!("Generated PDF: {}", file_path.display());

    let artifact = CapturedArtifact {
        source_url: node.url.clone(),
        file_path,
        depth: node.depth,
    };

    let links = if extract {
        read_links(page, &node.url).await
    } else {
        Vec::new()
    };

    Ok(PageOutcome::Captured { artifact, links })
}

/// Links of the rendered DOM. Failures here never fail the page; it simply
/// contributes no children.
async fn read_links<P: RenderPage>(page: &P, requested_url: &str) -> Vec<String> {
    let document_url = match page.url().await {
        Ok(url) => url,
        Err(e) => {
            warn!("Could not read final URL of {}: {}", requested_url, e);
            requested_url.to_string()
        }
    };
    if document_url != requested_url {
        debug!("{} was served from {}", requested_url, document_url);
    }

    match page.content().await {
        Ok(html) => extract_links(&html, &document_url),
        Err(e) => {
            warn!("Could not read rendered DOM of {}: {}", requested_url, e);
            Vec::new()
        }
    }
}

async fn navigate<P: RenderPage>(page: &P, url: &str, config: &CaptureConfig) -> Result<()> {
    debug!("Navigating to {}", url);
    match tokio::time::timeout(config.navigation_timeout, page.navigate(url)).await {
        Ok(result) => result,
        Err(_) => Err(CaptureError::Navigation {
            url: url.to_string(),
            reason: format!("timed out after {:?}", config.navigation_timeout),
        }),
    }
}

fn as_extent(value: &Value) -> Result<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|v| v as i64))
        .ok_or_else(|| CaptureError::Evaluation(format!("expected a content height, got {}", value)))
}

/// Scrolls one viewport at a time until the content height stops growing, so
/// lazily loaded content is present before printing.
async fn stabilize<P: RenderPage>(page: &P, url: &str, config: &CaptureConfig) -> Result<()> {
    let scroll_loop = async {
        let mut last_height = as_extent(&page.evaluate(MEASURE_SCRIPT).await?)?;
        let mut unchanged = 0;

        for step in 1..=config.max_scroll_iterations {
            tokio::time::sleep(config.scroll_interval).await;
            let height = as_extent(&page.evaluate(SCROLL_STEP_SCRIPT).await?)?;

            if height == last_height {
                unchanged += 1;
            } else {
                unchanged = 0;
            }
            last_height = height;

            if unchanged >= config.stable_observations {
                debug!("{} stable at {}px after {} scroll steps", url, height, step);
                return Ok(());
            }
        }

        warn!(
            "{} still growing after {} scroll steps, capturing as is",
            url, config.max_scroll_iterations
        );
        Ok::<(), CaptureError>(())
    };

    match tokio::time::timeout(config.stabilization_timeout, scroll_loop).await {
        Ok(result) => result?,
        Err(_) => return Err(CaptureError::StabilizationTimeout(url.to_string())),
    }

    tokio::time::sleep(config.settle_delay).await;
    Ok(())
}

async fn emit_pdf<P: RenderPage>(page: &P, config: &CaptureConfig, path: &Path) -> Result<()> {
    let bytes = page
        .print_pdf(&config.pdf)
        .await
        .map_err(|e| match e {
            CaptureError::Emission(_) => e,
            other => CaptureError::Emission(other.to_string()),
        })?;

    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| CaptureError::Emission(format!("writing {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_host() {
        assert_eq!(sanitize_host("docs.example-site.com"), "docs_example_site_com");
        assert_eq!(sanitize_host("localhost"), "localhost");
    }

    #[test]
    fn test_artifact_filename_format() {
        let name = artifact_filename("https://www.example.com:8443/a?b=c", 1700000000000, 2);
        assert_eq!(name, "www_example_com-1700000000000-2.pdf");
    }

    #[test]
    fn test_artifact_filename_ip_host() {
        let name = artifact_filename("http://127.0.0.1:3000/", 5, 0);
        assert_eq!(name, "127_0_0_1-5-0.pdf");
    }

    #[test]
    fn test_clock_is_strictly_increasing() {
        let mut clock = ArtifactClock::default();
        let first = clock.next();
        let second = clock.next();
        let third = clock.next();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_extract_links_resolves_and_filters_schemes() {
        let html = r#"<html><body>
            <a href="/about">About</a>
            <a href="https://other.org/x">Other</a>
            <a href="mailto:me@example.com">Mail</a>
            <a href="javascript:void(0)">JS</a>
            <a href="tel:+123">Call</a>
            <a href="contact#form">Contact</a>
            <a>No href</a>
        </body></html>"#;

        let links = extract_links(html, "https://example.com/docs/index.html");
        assert_eq!(
            links,
            vec![
                "https://example.com/about",
                "https://other.org/x",
                "https://example.com/docs/contact#form",
            ]
        );
    }

    #[test]
    fn test_extract_links_honours_base_element() {
        let html = r#"<html><head><base href="https://example.com/docs/"></head>
            <body><a href="intro">Intro</a><a href="/top">Top</a></body></html>"#;

        let links = extract_links(html, "https://example.com/start");
        assert_eq!(
            links,
            vec!["https://example.com/docs/intro", "https://example.com/top"]
        );
    }

    #[test]
    fn test_extract_links_relative_base_element() {
        let html = r#"<head><base href="guide/"></head><a href="setup">Setup</a>"#;
        let links = extract_links(html, "https://example.com/docs/");
        assert_eq!(links, vec!["https://example.com/docs/guide/setup"]);
    }

    #[test]
    fn test_extract_links_bad_base() {
        assert!(extract_links("<a href='/x'>x</a>", "not a url").is_empty());
    }

    #[test]
    fn test_artifact_filename_from_path() {
        let artifact = CapturedArtifact {
            source_url: "https://example.com".to_string(),
            file_path: PathBuf::from("/tmp/scratch/example_com-1-0.pdf"),
            depth: 0,
        };
        assert_eq!(artifact.filename(), "example_com-1-0.pdf");
    }
}
