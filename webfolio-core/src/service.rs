//! Capture sessions end to end: validation, registration, engine lifetime,
//! traversal and teardown.

use crate::model::{CaptureOutcome, CaptureRequest, generate_session_id};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use webfolio_capture::{
    ArtifactCallback, CaptureConfig, CaptureError, EngineLauncher, RenderEngine, Result,
    SessionHandle, SessionRegistry, Traversal, TraversalContext,
};

/// Removes the session from the registry when dropped, including during unwinding.
struct SessionGuard<'a> {
    registry: &'a SessionRegistry,
    id: String,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.registry.unregister(&self.id);
    }
}

/// Entry point for capture, stop and artifact retrieval.
///
/// Many captures may run at once on one service; each launches its own engine
/// and only the session registry is shared.
pub struct CaptureService<L: EngineLauncher> {
    launcher: L,
    registry: Arc<SessionRegistry>,
    config: CaptureConfig,
}

impl<L: EngineLauncher> CaptureService<L> {
    pub fn new(launcher: L, config: CaptureConfig) -> Self {
        Self::with_registry(launcher, config, Arc::new(SessionRegistry::new()))
    }

    pub fn with_registry(launcher: L, config: CaptureConfig, registry: Arc<SessionRegistry>) -> Self {
        Self {
            launcher,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub async fn capture(&self, request: CaptureRequest) -> Result<CaptureOutcome> {
        self.capture_with(request, None).await
    }

    /// Runs one capture session to completion.
    ///
    /// Page-level failures and stop requests still produce an outcome holding
    /// whatever was captured. Only an invalid request, a duplicate session id,
    /// an engine that cannot launch or an unusable scratch directory fail the
    /// call as a whole. The engine is closed and the session unregistered on
    /// every path.
    pub async fn capture_with(
        &self,
        request: CaptureRequest,
        on_artifact: Option<ArtifactCallback>,
    ) -> Result<CaptureOutcome> {
        let seed = request.validate()?;
        let session_id = request
            .session_id
            .clone()
            .unwrap_or_else(generate_session_id);

        let session = self.registry.register(&session_id)?;
        let _guard = SessionGuard {
            registry: &self.registry,
            id: session_id.clone(),
        };

        let mut engine = match self.launcher.launch().await {
            Ok(engine) => engine,
            Err(e) => {
                error!("Error in PDF generation process for {}: {}", session_id, e);
                return Err(match e {
                    CaptureError::EngineLaunch(_) => e,
                    other => CaptureError::EngineLaunch(other.to_string()),
                });
            }
        };

        let result = self
            .traverse(&engine, session.clone(), &request, seed.as_str(), on_artifact)
            .await;

        session.active_pages().wait_idle().await;
        if let Err(e) = engine.close().await {
            warn!("Failed to close rendering engine for {}: {}", session_id, e);
        }

        let ctx = result?;
        let cancelled = session.is_cancelled();
        if cancelled {
            info!(
                "Capture {} stopped early with {} artifacts",
                session_id,
                ctx.artifacts.len()
            );
        }

        Ok(CaptureOutcome {
            session_id,
            seed_url: seed.to_string(),
            artifacts: ctx.artifacts,
            pages_attempted: ctx.pages_attempted,
            pages_failed: ctx.pages_failed,
            cancelled,
        })
    }

    async fn traverse(
        &self,
        engine: &L::Engine,
        session: SessionHandle,
        request: &CaptureRequest,
        seed: &str,
        on_artifact: Option<ArtifactCallback>,
    ) -> Result<TraversalContext> {
        tokio::fs::create_dir_all(&self.config.scratch_dir).await?;

        let mut traversal =
            Traversal::new(engine, &self.config, session, request.traversal_options());
        if let Some(callback) = on_artifact {
            traversal = traversal.with_artifact_callback(callback);
        }
        Ok(traversal.run(seed).await)
    }

    /// Marks a running session for stopping.
    pub fn request_stop(&self, session_id: &str) -> Result<()> {
        self.registry.request_stop(session_id)
    }

    /// Location of `filename` in scratch storage. Names that would escape the
    /// scratch directory are reported as not found.
    pub fn artifact_path(&self, filename: &str) -> Result<PathBuf> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.config.scratch_dir.join(name)),
            _ => Err(CaptureError::NotFound(filename.to_string())),
        }
    }

    pub async fn fetch_artifact(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.artifact_path(filename)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CaptureError::NotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
