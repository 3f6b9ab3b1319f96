//! Pass-through queries and buffer inspection

use std::collections::HashMap;

use crate::error::Result;
use crate::types::SessionName;

use super::super::janitor::{self, CleanupReport};
use super::core::SessionLifecycleManager;

impl SessionLifecycleManager {
    /// Every live session known to the executor
    ///
    /// # Errors
    /// Returns the executor error
    pub async fn list_sessions(&self) -> Result<Vec<SessionName>> {
        self.inner.executor.list().await
    }

    /// Whether a session exists
    ///
    /// # Errors
    /// Returns the executor error
    pub async fn session_exists(&self, session: &SessionName) -> Result<bool> {
        self.inner.executor.exists(session).await
    }

    /// Existence of many sessions, answered by a single executor call
    ///
    /// # Errors
    /// Returns the executor error
    pub async fn bulk_session_exists(
        &self,
        sessions: &[SessionName],
    ) -> Result<HashMap<SessionName, bool>> {
        if sessions.is_empty() {
            return Ok(HashMap::new());
        }
        self.inner.executor.bulk_exists(sessions).await
    }

    /// Sessions this manager tracks
    #[must_use]
    pub fn tracked_sessions(&self) -> Vec<SessionName> {
        self.inner.store.tracked()
    }

    /// Snapshot of a session's stored output buffer
    #[must_use]
    pub fn output_buffer(&self, session: &SessionName) -> Option<Vec<String>> {
        self.inner.store.buffer(session)
    }

    /// Run a memory cleanup immediately
    pub fn force_cleanup(&self) -> CleanupReport {
        janitor::force_cleanup(&self.inner.store, self.inner.config.max_buffer_size)
    }
}
