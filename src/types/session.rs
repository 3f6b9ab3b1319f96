//! Session creation requests and the uniform result shapes returned to callers

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::identifiers::SessionName;
use super::runtime::RuntimeType;

// ============================================================================
// REQUEST TYPES
// ============================================================================

/// Request parameters for the orchestrator session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSessionConfig {
    /// Name of the orchestrator session
    pub session_name: SessionName,
    /// Working directory of the session
    pub project_path: PathBuf,
    /// Optional window name inside the session
    #[serde(default)]
    pub window_name: Option<String>,
}

/// Request parameters for a team member session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMemberSessionConfig {
    /// Role the agent plays (exported into the session environment)
    pub role: String,
    /// Working directory of the session
    pub project_path: PathBuf,
    /// Optional window name inside the session
    #[serde(default)]
    pub window_name: Option<String>,
    /// Identifier of the team member this session belongs to
    #[serde(default)]
    pub member_id: Option<String>,
    /// Runtime wire name; unknown or missing values use the configured default
    #[serde(default)]
    pub runtime_type: Option<String>,
}

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Uniform result of session creation and teardown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Whether the operation succeeded
    pub success: bool,
    /// Session the operation targeted
    pub session_name: SessionName,
    /// Human-readable success message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Structured error string on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionResult {
    /// Successful result
    pub fn ok(session_name: SessionName, message: impl Into<String>) -> Self {
        Self {
            success: true,
            session_name,
            message: Some(message.into()),
            error: None,
        }
    }

    /// Failed result
    pub fn failed(session_name: SessionName, error: impl Into<String>) -> Self {
        Self {
            success: false,
            session_name,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// Everything an [`AgentRegistrar`](crate::runtime::AgentRegistrar) needs to
/// bring an agent to readiness
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    /// Session the agent runs in
    pub session: SessionName,
    /// Role of the agent
    pub role: String,
    /// Working directory of the agent
    pub project_path: PathBuf,
    /// Budget for the whole handshake
    pub timeout: Duration,
    /// Identifier of the team member, if any
    pub member_id: Option<String>,
    /// Runtime selected for the agent
    pub runtime_type: RuntimeType,
}

/// Uniform registration result, independent of the runtime used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationOutcome {
    /// Whether the agent is ready
    pub success: bool,
    /// Success message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error string on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RegistrationOutcome {
    /// Successful registration
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    /// Failed registration
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}
