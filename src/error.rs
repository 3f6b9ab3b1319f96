//! Error types for the agent fleet

use thiserror::Error;

/// Main error type for session orchestration and process supervision
#[derive(Error, Debug)]
pub enum FleetError {
    /// The OS did not hand back a process for a start attempt
    #[error("Spawn failure: {0}")]
    SpawnFailure(String),

    /// A session command executor call failed
    #[error("Command failed for session {session}: {message}")]
    CommandFailure {
        /// Session the command targeted
        session: String,
        /// Error message
        message: String,
    },

    /// The agent registration handshake exceeded its budget
    #[error("Registration timed out for session {session} after {timeout_ms}ms")]
    RegistrationTimeout {
        /// Session being registered
        session: String,
        /// Budget that was exceeded
        timeout_ms: u64,
    },

    /// The agent registration handshake reported failure
    #[error("Registration failed for session {session}: {message}")]
    RegistrationFailed {
        /// Session being registered
        session: String,
        /// Error reported by the registrar
        message: String,
    },

    /// The supervised child keeps exiting below the minimum runtime
    #[error("Crash loop detected: {restarts} consecutive short runs")]
    CrashLoop {
        /// Consecutive short runs observed
        restarts: u32,
    },

    /// The supervisor gave up restarting the child
    #[error("Restart limit exceeded ({0} restarts)")]
    RestartLimitExceeded(u32),

    /// Health probe failure
    #[error("Health check failed: {0}")]
    HealthCheck(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Session is not tracked by the manager
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The creation queue dropped a job before it completed
    #[error("Session creation queue closed: {0}")]
    QueueClosed(String),
}

/// Result type alias for fleet operations
pub type Result<T> = std::result::Result<T, FleetError>;

impl FleetError {
    /// Create a spawn failure
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::SpawnFailure(msg.into())
    }

    /// Create a command failure for a session
    pub fn command(session: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::CommandFailure {
            session: session.into(),
            message: msg.into(),
        }
    }

    /// Create a registration timeout error
    pub fn registration_timeout(session: impl Into<String>, timeout_ms: u64) -> Self {
        Self::RegistrationTimeout {
            session: session.into(),
            timeout_ms,
        }
    }

    /// Create a registration failure
    pub fn registration_failed(session: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::RegistrationFailed {
            session: session.into(),
            message: msg.into(),
        }
    }

    /// Create a health check error
    pub fn health(msg: impl Into<String>) -> Self {
        Self::HealthCheck(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a session not found error
    pub fn session_not_found(session: impl Into<String>) -> Self {
        Self::SessionNotFound(session.into())
    }

    /// Create a queue closed error
    pub fn queue_closed(msg: impl Into<String>) -> Self {
        Self::QueueClosed(msg.into())
    }
}
