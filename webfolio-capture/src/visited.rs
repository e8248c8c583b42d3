use std::collections::HashSet;
use url::Url;

/// A (URL, depth) pair considered for capture. Depth 0 is the seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalNode {
    pub url: String,
    pub depth: usize,
}

impl TraversalNode {
    pub fn seed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: 0,
        }
    }

    pub fn child(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: self.depth + 1,
        }
    }
}

/// Dedup key for a URL: fragment and query stripped. Never navigated to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns `None` for strings that are not absolute URLs.
pub fn normalize(url: &str) -> Option<NormalizedUrl> {
    let mut parsed = Url::parse(url).ok()?;
    parsed.set_fragment(None);
    parsed.set_query(None);
    Some(NormalizedUrl(parsed.to_string()))
}

/// URLs seen by one traversal. Only ever grows.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: HashSet<NormalizedUrl>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_visit(&self, node: &TraversalNode, max_depth: usize) -> bool {
        if node.depth > max_depth {
            return false;
        }
        match normalize(&node.url) {
            Some(key) => !self.seen.contains(&key),
            None => false,
        }
    }

    /// Returns false if the node was already marked (or cannot be normalized).
    pub fn mark_visited(&mut self, node: &TraversalNode) -> bool {
        match normalize(&node.url) {
            Some(key) => self.seen.insert(key),
            None => false,
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        normalize(url).is_some_and(|key| self.seen.contains(&key))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_query_and_fragment() {
        let key = normalize("https://example.com/docs/page?lang=en#intro").unwrap();
        assert_eq!(key.as_str(), "https://example.com/docs/page");
    }

    #[test]
    fn test_normalize_keeps_port_and_scheme() {
        let key = normalize("http://example.com:8080/a").unwrap();
        assert_eq!(key.as_str(), "http://example.com:8080/a");
    }

    #[test]
    fn test_normalize_rejects_relative() {
        assert!(normalize("/relative/path").is_none());
    }

    #[test]
    fn test_should_visit_respects_depth() {
        let visited = VisitedSet::new();
        let node = TraversalNode {
            url: "https://example.com/a".to_string(),
            depth: 3,
        };
        assert!(!visited.should_visit(&node, 2));
        assert!(visited.should_visit(&node, 3));
    }

    #[test]
    fn test_variants_collapse_to_one_key() {
        let mut visited = VisitedSet::new();
        let seed = TraversalNode::seed("https://example.com/page");
        assert!(visited.should_visit(&seed, 1));
        assert!(visited.mark_visited(&seed));

        let variant = seed.child("https://example.com/page?utm=1#top");
        assert!(!visited.should_visit(&variant, 1));
        assert!(!visited.mark_visited(&variant));
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn test_unparseable_node_is_never_visited() {
        let mut visited = VisitedSet::new();
        let node = TraversalNode::seed("not a url");
        assert!(!visited.should_visit(&node, 5));
        assert!(!visited.mark_visited(&node));
        assert!(visited.is_empty());
    }
}
