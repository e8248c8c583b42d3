use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Content of {0} did not stabilize in time")]
    StabilizationTimeout(String),

    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("PDF emission failed: {0}")]
    Emission(String),

    #[error("Capture session {0} not found")]
    SessionNotFound(String),

    #[error("Capture session {0} is already registered")]
    DuplicateSession(String),

    #[error("Rendering engine failed to launch: {0}")]
    EngineLaunch(String),

    #[error("Artifact {0} not found")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Whether the error is confined to a single page and must not abort the traversal.
    pub fn is_node_level(&self) -> bool {
        matches!(
            self,
            CaptureError::Navigation { .. }
                | CaptureError::StabilizationTimeout(_)
                | CaptureError::Evaluation(_)
                | CaptureError::Emission(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
