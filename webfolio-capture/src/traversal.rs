use crate::capture::{ArtifactClock, CapturedArtifact, PageOutcome, capture_page};
use crate::config::CaptureConfig;
use crate::engine::RenderEngine;
use crate::session::SessionHandle;
use crate::visited::{TraversalNode, VisitedSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

/// Called with every artifact as soon as it has been written.
pub type ArtifactCallback = Arc<dyn Fn(&CapturedArtifact) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalOptions {
    pub follow_links: bool,
    pub max_depth: usize,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            follow_links: false,
            max_depth: 1,
        }
    }
}

/// Mutable state threaded through the recursive walk.
#[derive(Debug, Default)]
pub struct TraversalContext {
    pub visited: VisitedSet,
    pub artifacts: Vec<CapturedArtifact>,
    pub pages_attempted: usize,
    pub pages_failed: usize,
    clock: ArtifactClock,
}

impl TraversalContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Whether `link` may be followed from a page on `current`: same hostname,
/// not the site root, and not pointing at an anchor.
pub fn is_followable(link: &str, current: &Url) -> bool {
    let Ok(parsed) = Url::parse(link) else {
        return false;
    };
    parsed.host_str().is_some()
        && parsed.host_str() == current.host_str()
        && parsed.path() != "/"
        && parsed.fragment().is_none_or(str::is_empty)
}

/// Depth-first, pre-order walk over a seed URL's same-origin link graph.
///
/// One page is open at a time. The session's stop flag is checked at node
/// entry and before every child; the capture unit checks it again right before
/// emitting a PDF.
pub struct Traversal<'a, E: RenderEngine> {
    engine: &'a E,
    config: &'a CaptureConfig,
    session: SessionHandle,
    options: TraversalOptions,
    on_artifact: Option<ArtifactCallback>,
}

impl<'a, E: RenderEngine> Traversal<'a, E> {
    pub fn new(
        engine: &'a E,
        config: &'a CaptureConfig,
        session: SessionHandle,
        options: TraversalOptions,
    ) -> Self {
        Self {
            engine,
            config,
            session,
            options,
            on_artifact: None,
        }
    }

    pub fn with_artifact_callback(mut self, callback: ArtifactCallback) -> Self {
        self.on_artifact = Some(callback);
        self
    }

    pub async fn run(&self, seed_url: &str) -> TraversalContext {
        let mut ctx = TraversalContext::new();
        self.run_with(seed_url, &mut ctx).await;
        ctx
    }

    /// Like [`run`](Self::run) but accumulates into a caller-owned context, so
    /// partial results survive if the returned future is dropped.
    pub async fn run_with(&self, seed_url: &str, ctx: &mut TraversalContext) {
        info!(
            "Starting capture of {} (follow links: {}, max depth: {})",
            seed_url, self.options.follow_links, self.options.max_depth
        );
        self.walk(TraversalNode::seed(seed_url), ctx).await;
        info!(
            "Capture complete. {} artifacts from {} pages ({} failed)",
            ctx.artifacts.len(),
            ctx.pages_attempted,
            ctx.pages_failed
        );
    }

    /// Children of `node` would sit at `depth + 1`, which must stay below the
    /// maximum depth.
    fn follows_links_from(&self, node: &TraversalNode) -> bool {
        self.options.follow_links && node.depth + 1 < self.options.max_depth
    }

    fn stop_requested(&self) -> bool {
        self.session.is_cancelled()
    }

    fn walk<'b>(
        &'b self,
        node: TraversalNode,
        ctx: &'b mut TraversalContext,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'b>> {
        Box::pin(async move {
            if self.stop_requested() {
                info!(
                    "Stopping capture for {} due to stop request",
                    self.session.id()
                );
                return;
            }

            if !ctx.visited.should_visit(&node, self.options.max_depth) {
                return;
            }
            ctx.visited.mark_visited(&node);
            info!("Visiting: {} (depth {})", node.url, node.depth);

            let extract = self.follows_links_from(&node);
            ctx.pages_attempted += 1;

            let links = match capture_page(
                self.engine,
                self.config,
                &self.session,
                &node,
                extract,
                &mut ctx.clock,
            )
            .await
            {
                Ok(PageOutcome::Captured { artifact, links }) => {
                    if let Some(ref callback) = self.on_artifact {
                        callback(&artifact);
                    }
                    ctx.artifacts.push(artifact);
                    links
                }
                Ok(PageOutcome::Cancelled) => return,
                Err(e) => {
                    ctx.pages_failed += 1;
                    if e.is_node_level() {
                        warn!("Error processing URL {}: {}", node.url, e);
                    } else {
                        error!("Error processing URL {}: {}", node.url, e);
                    }
                    return;
                }
            };

            let Ok(current) = Url::parse(&node.url) else {
                return;
            };

            for link in links {
                if self.stop_requested() {
                    info!(
                        "Stopping link processing for {} due to stop request",
                        self.session.id()
                    );
                    break;
                }
                if !is_followable(&link, &current) {
                    debug!("Skipping {} (not followable from {})", link, node.url);
                    continue;
                }
                self.walk(node.child(link), ctx).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    #[test]
    fn test_followable_same_host() {
        let current = page("https://example.com/docs");
        assert!(is_followable("https://example.com/docs/intro", &current));
    }

    #[test]
    fn test_followable_ignores_scheme_and_port() {
        let current = page("https://example.com/docs");
        assert!(is_followable("http://example.com/blog", &current));
        assert!(is_followable("https://example.com:8443/blog", &current));
    }

    #[test]
    fn test_not_followable_cross_origin() {
        let current = page("https://example.com/docs");
        assert!(!is_followable("https://other.com/docs", &current));
        assert!(!is_followable("https://sub.example.com/docs", &current));
    }

    #[test]
    fn test_not_followable_root_or_anchor() {
        let current = page("https://example.com/docs");
        assert!(!is_followable("https://example.com/", &current));
        assert!(!is_followable("https://example.com/docs#section", &current));
        assert!(is_followable("https://example.com/docs#", &current));
    }

    #[test]
    fn test_not_followable_garbage() {
        let current = page("https://example.com/");
        assert!(!is_followable("::::", &current));
    }
}
