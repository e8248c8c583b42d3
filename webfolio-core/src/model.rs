use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;
use webfolio_capture::{CaptureError, CapturedArtifact, Result, TraversalOptions};

fn default_max_depth() -> usize {
    1
}

/// An accepted-or-rejected request to capture a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub url: String,
    #[serde(default)]
    pub follow_links: bool,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Caller-chosen id; generated when absent.
    #[serde(default, alias = "requestId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl CaptureRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            follow_links: false,
            max_depth: default_max_depth(),
            session_id: None,
        }
    }

    pub fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| CaptureError::InvalidRequest(e.to_string()))
    }

    /// Checks the request before any session exists and returns the parsed seed.
    pub fn validate(&self) -> Result<Url> {
        let raw = self.url.trim();
        if raw.is_empty() {
            return Err(CaptureError::InvalidRequest("URL is required".to_string()));
        }

        let seed = Url::parse(raw)
            .map_err(|e| CaptureError::InvalidRequest(format!("Invalid URL '{}': {}", raw, e)))?;
        if !matches!(seed.scheme(), "http" | "https") {
            return Err(CaptureError::InvalidRequest(format!(
                "Unsupported scheme '{}'",
                seed.scheme()
            )));
        }
        if seed.host_str().is_none() {
            return Err(CaptureError::InvalidRequest(format!("URL '{}' has no host", raw)));
        }

        if self.max_depth < 1 {
            return Err(CaptureError::InvalidRequest(
                "maxDepth must be at least 1".to_string(),
            ));
        }
        if let Some(ref id) = self.session_id
            && id.trim().is_empty()
        {
            return Err(CaptureError::InvalidRequest(
                "sessionId must not be empty".to_string(),
            ));
        }

        Ok(seed)
    }

    pub fn traversal_options(&self) -> TraversalOptions {
        TraversalOptions {
            follow_links: self.follow_links,
            max_depth: self.max_depth,
        }
    }
}

/// `req_<unix millis>_<9 random base-16 chars>`
pub fn generate_session_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "req_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        &random[..9]
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRequest {
    #[serde(alias = "requestId")]
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub filename: String,
}

/// What the caller gets back once a capture finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResponse {
    pub session_id: String,
    pub artifacts: Vec<ArtifactRef>,
}

/// Full result of one capture session, including why it ended.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub session_id: String,
    pub seed_url: String,
    pub artifacts: Vec<CapturedArtifact>,
    pub pages_attempted: usize,
    pub pages_failed: usize,
    /// A stop request was observed; `artifacts` is a partial result.
    pub cancelled: bool,
}

impl CaptureOutcome {
    pub fn response(&self) -> CaptureResponse {
        CaptureResponse {
            session_id: self.session_id.clone(),
            artifacts: self
                .artifacts
                .iter()
                .map(|a| ArtifactRef {
                    filename: a.filename(),
                })
                .collect(),
        }
    }
}
