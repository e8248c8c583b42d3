pub mod capture;
pub mod chromium;
pub mod config;
pub mod engine;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod session;
pub mod traversal;
pub mod visited;

pub use capture::{CapturedArtifact, PageOutcome, capture_page};
pub use chromium::{ChromiumEngine, ChromiumLauncher};
pub use config::{CaptureConfig, ChromiumConfig};
pub use engine::{EngineLauncher, PdfOptions, RenderEngine, RenderPage};
pub use error::{CaptureError, Result};
#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryLauncher, MemorySite};
pub use session::{CancelFlag, SessionHandle, SessionRegistry};
pub use traversal::{ArtifactCallback, Traversal, TraversalContext, TraversalOptions};
pub use visited::{NormalizedUrl, TraversalNode, VisitedSet, normalize};
