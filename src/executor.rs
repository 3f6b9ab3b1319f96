//! Terminal session command executor
//!
//! The manager never talks to the terminal multiplexer directly. Everything
//! it needs from the OS-level session (create, kill, type, capture) goes
//! through [`SessionCommandExecutor`], which the host application injects.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::SessionName;

/// Named keys understood by executors
pub mod keys {
    /// Confirms the typed input line
    pub const ENTER: &str = "Enter";
    /// Clears the current input line
    pub const CLEAR_LINE: &str = "C-u";
    /// Interrupts the foreground program
    pub const INTERRUPT: &str = "C-c";
    /// Dismisses prompts and menus
    pub const ESCAPE: &str = "Escape";
}

/// Low-level primitives over named terminal sessions
///
/// Implementations own the sessions' OS-level lifetime. All methods may be
/// called concurrently for different sessions.
#[async_trait]
pub trait SessionCommandExecutor: Send + Sync {
    /// Prepare the executor's backing server, if it has one
    ///
    /// # Errors
    /// Returns error if the server cannot be brought up
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Whether a session with this name exists
    async fn exists(&self, name: &SessionName) -> Result<bool>;

    /// Create a detached session rooted at `cwd`
    async fn create(&self, name: &SessionName, cwd: &Path, window: Option<&str>) -> Result<()>;

    /// Kill a session
    async fn kill(&self, name: &SessionName) -> Result<()>;

    /// Type literal text into the session without confirming it
    async fn write(&self, name: &SessionName, text: &str) -> Result<()>;

    /// Send a single named keystroke (see [`keys`])
    async fn send_key(&self, name: &SessionName, key: &str) -> Result<()>;

    /// Capture the last `lines` lines of visible output
    async fn capture(&self, name: &SessionName, lines: usize) -> Result<String>;

    /// Set an environment variable inside the session
    async fn set_env(&self, name: &SessionName, key: &str, value: &str) -> Result<()>;

    /// Check existence of many sessions in one call
    async fn bulk_exists(&self, names: &[SessionName]) -> Result<HashMap<SessionName, bool>>;

    /// Names of every live session
    async fn list(&self) -> Result<Vec<SessionName>>;
}
