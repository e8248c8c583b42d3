//! Capture session registry and cooperative cancellation.
//!
//! A stop request never interrupts work in progress. It flips a flag that the
//! traversal polls at node entry, between children and right before PDF
//! emission, so the stop takes effect within one checkpoint.

use crate::error::{CaptureError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, info};

/// Shared stop flag. Cloning yields another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Number of page contexts currently open for a session.
#[derive(Debug, Default)]
pub struct ActivePages {
    count: AtomicUsize,
    idle: Notify,
}

impl ActivePages {
    pub fn acquire(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn release(&self) {
        let previous = self.count.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "page released more often than acquired");
        if previous == 1 {
            self.idle.notify_waiters();
        }
    }

    pub fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Resolves once no page context is open.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.current() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Per-session state shared between the traversal and stop requests.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    cancel: CancelFlag,
    active_pages: Arc<ActivePages>,
}

impl SessionHandle {
    fn new(id: String) -> Self {
        Self {
            id,
            cancel: CancelFlag::new(),
            active_pages: Arc::new(ActivePages::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn active_pages(&self) -> &Arc<ActivePages> {
        &self.active_pages
    }
}

/// Table of in-flight capture sessions, keyed by session id.
///
/// Shared through `Arc` between whoever runs captures and whoever handles
/// stop requests. There is no process-wide instance.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, id: &str) -> Result<SessionHandle> {
        let mut sessions = self.lock();
        if sessions.contains_key(id) {
            return Err(CaptureError::DuplicateSession(id.to_string()));
        }
        let handle = SessionHandle::new(id.to_string());
        sessions.insert(id.to_string(), handle.clone());
        debug!("Registered capture session {}", id);
        Ok(handle)
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.lock().get(id).cloned()
    }

    /// Marks the session for stopping. Repeating the request is harmless.
    pub fn request_stop(&self, id: &str) -> Result<()> {
        match self.lock().get(id) {
            Some(handle) => {
                handle.cancel.cancel();
                info!("Capture session {} marked for stopping", id);
                Ok(())
            }
            None => Err(CaptureError::SessionNotFound(id.to_string())),
        }
    }

    /// Removes the session if present. Returns whether anything was removed.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.lock().remove(id).is_some();
        if removed {
            debug!("Unregistered capture session {}", id);
        }
        removed
    }

    pub fn active_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = SessionRegistry::new();
        registry.register("req_1").unwrap();
        let err = registry.register("req_1").unwrap_err();
        assert!(matches!(err, CaptureError::DuplicateSession(id) if id == "req_1"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_request_stop_is_visible_through_handle() {
        let registry = SessionRegistry::new();
        let handle = registry.register("req_2").unwrap();
        assert!(!handle.is_cancelled());

        registry.request_stop("req_2").unwrap();
        registry.request_stop("req_2").unwrap();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_request_stop_unknown_session() {
        let registry = SessionRegistry::new();
        let err = registry.request_stop("gone").unwrap_err();
        assert!(matches!(err, CaptureError::SessionNotFound(_)));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.register("req_3").unwrap();
        assert!(registry.unregister("req_3"));
        assert!(!registry.unregister("req_3"));
        assert!(registry.is_empty());
        assert!(registry.get("req_3").is_none());
    }

    #[test]
    fn test_active_sessions_sorted() {
        let registry = SessionRegistry::new();
        registry.register("b").unwrap();
        registry.register("a").unwrap();
        assert_eq!(registry.active_sessions(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_wait_idle_resolves_after_release() {
        let pages = Arc::new(ActivePages::default());
        pages.acquire();

        let waiter = {
            let pages = pages.clone();
            tokio::spawn(async move { pages.wait_idle().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        pages.release();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait_idle should resolve")
            .unwrap();
        assert_eq!(pages.current(), 0);
    }
}
