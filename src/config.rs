//! Configuration for the session manager and the process supervisor
//!
//! Every interval and threshold is a named default that can be overridden
//! from a TOML file, the environment, or directly in code. Durations are
//! stored in milliseconds and exposed as [`Duration`] accessors.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FleetError, Result};
use crate::types::RuntimeType;

/// Environment variable overriding the default runtime type
pub const RUNTIME_TYPE_ENV: &str = "FLEET_RUNTIME_TYPE";

/// Environment variable overriding the supervised server's health port
pub const HEALTH_PORT_ENV: &str = "FLEET_HEALTH_PORT";

// ============================================================================
// SESSION MANAGER CONFIGURATION
// ============================================================================

/// Tunables for [`SessionLifecycleManager`](crate::manager::SessionLifecycleManager)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Runtime used when a request does not name one
    pub default_runtime: RuntimeType,
    /// Upper bound on sessions simultaneously mid-initialization
    pub max_concurrent_initializing: usize,
    /// Maximum lines retained per output buffer
    pub max_buffer_size: usize,
    /// Lines requested from the executor on every output poll
    pub capture_lines: usize,
    /// Base output poll interval
    pub output_poll_base_ms: u64,
    /// Upper bound of the uniform jitter added to each poll
    pub output_poll_jitter_ms: u64,
    /// Pause between two creation jobs when more are queued
    pub session_creation_delay_ms: u64,
    /// Settle time after killing a stale session before re-creating it
    pub kill_settle_delay_ms: u64,
    /// Budget for the agent registration handshake
    pub registration_timeout_ms: u64,
    /// Interval of the memory janitor sweep
    pub janitor_interval_ms: u64,
    /// Capacity of the session event channel
    pub event_capacity: usize,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            default_runtime: RuntimeType::ClaudeCode,
            max_concurrent_initializing: 2,
            max_buffer_size: 1000,
            capture_lines: 100,
            output_poll_base_ms: 3000,
            output_poll_jitter_ms: 1000,
            session_creation_delay_ms: 1000,
            kill_settle_delay_ms: 1000,
            registration_timeout_ms: 90_000,
            janitor_interval_ms: 300_000,
            event_capacity: 1024,
        }
    }
}

impl FleetConfig {
    /// Apply `FLEET_RUNTIME_TYPE` if it is set
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`; unknown runtime names keep
    /// the current default
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(RUNTIME_TYPE_ENV) {
            self.default_runtime = RuntimeType::parse_or(&value, self.default_runtime);
        }
        self
    }

    /// Check invariants the manager relies on
    ///
    /// # Errors
    /// Returns `InvalidConfig` for a zero concurrency cap or buffer size
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_initializing == 0 {
            return Err(FleetError::invalid_config(
                "max_concurrent_initializing must be at least 1",
            ));
        }
        if self.max_buffer_size == 0 {
            return Err(FleetError::invalid_config("max_buffer_size must be at least 1"));
        }
        Ok(())
    }

    /// Base output poll interval
    #[must_use]
    pub const fn output_poll_base(&self) -> Duration {
        Duration::from_millis(self.output_poll_base_ms)
    }

    /// Maximum output poll jitter
    #[must_use]
    pub const fn output_poll_jitter(&self) -> Duration {
        Duration::from_millis(self.output_poll_jitter_ms)
    }

    /// Delay between creation jobs
    #[must_use]
    pub const fn session_creation_delay(&self) -> Duration {
        Duration::from_millis(self.session_creation_delay_ms)
    }

    /// Settle time after killing a stale session
    #[must_use]
    pub const fn kill_settle_delay(&self) -> Duration {
        Duration::from_millis(self.kill_settle_delay_ms)
    }

    /// Registration handshake budget
    #[must_use]
    pub const fn registration_timeout(&self) -> Duration {
        Duration::from_millis(self.registration_timeout_ms)
    }

    /// Janitor sweep interval
    #[must_use]
    pub const fn janitor_interval(&self) -> Duration {
        Duration::from_millis(self.janitor_interval_ms)
    }
}

// ============================================================================
// SUPERVISOR CONFIGURATION
// ============================================================================

/// Tunables for [`ProcessSupervisor`](crate::supervisor::ProcessSupervisor)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Program to run
    pub command: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Working directory of the child
    pub cwd: Option<PathBuf>,
    /// Variables layered over the supervisor's own environment
    pub env: HashMap<String, String>,
    /// Local port serving the health endpoint
    pub health_port: u16,
    /// Path of the health endpoint
    pub health_path: String,
    /// Restarts allowed before giving up
    pub max_restarts: u32,
    /// First backoff step
    pub base_delay_ms: u64,
    /// Backoff cap
    pub max_delay_ms: u64,
    /// Runs shorter than this count as a crash loop
    pub min_runtime_ms: u64,
    /// Health probe period
    pub health_check_interval_ms: u64,
    /// Per-request health probe timeout
    pub health_request_timeout_ms: u64,
    /// Sustained unhealthiness that forces a restart
    pub unhealthy_restart_threshold_ms: u64,
    /// Supervisor memory sampling period
    pub memory_sample_interval_ms: u64,
    /// Resident memory above which a warning is logged
    pub memory_warn_threshold_mb: u64,
    /// Grace period between terminate and kill on shutdown
    pub shutdown_timeout_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            command: "node".to_string(),
            args: vec!["dist/server.js".to_string()],
            cwd: None,
            env: HashMap::new(),
            health_port: 3000,
            health_path: "/health".to_string(),
            max_restarts: 10,
            base_delay_ms: 2000,
            max_delay_ms: 30_000,
            min_runtime_ms: 15_000,
            health_check_interval_ms: 15_000,
            health_request_timeout_ms: 5000,
            unhealthy_restart_threshold_ms: 60_000,
            memory_sample_interval_ms: 60_000,
            memory_warn_threshold_mb: 512,
            shutdown_timeout_ms: 10_000,
        }
    }
}

impl SupervisorConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// every key the file omits
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| {
            FleetError::invalid_config(format!("{}: {e}", path.display()))
        })
    }

    /// Apply `FLEET_HEALTH_PORT` if it is set and valid
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`; an unparsable port is logged
    /// and ignored
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(HEALTH_PORT_ENV) {
            match value.parse() {
                Ok(port) => self.health_port = port,
                Err(_) => log::warn!("Ignoring invalid {HEALTH_PORT_ENV}={value}"),
            }
        }
        self
    }

    /// Check invariants the supervisor relies on
    ///
    /// # Errors
    /// Returns `InvalidConfig` for an empty command or inverted backoff bounds
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(FleetError::invalid_config("command must not be empty"));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(FleetError::invalid_config(
                "base_delay_ms must not exceed max_delay_ms",
            ));
        }
        Ok(())
    }

    /// Full URL of the health endpoint
    #[must_use]
    pub fn health_url(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.health_port, self.health_path)
    }

    /// Backoff base
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Backoff cap
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Crash-loop runtime floor
    #[must_use]
    pub const fn min_runtime(&self) -> Duration {
        Duration::from_millis(self.min_runtime_ms)
    }

    /// Health probe period
    #[must_use]
    pub const fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    /// Health request timeout
    #[must_use]
    pub const fn health_request_timeout(&self) -> Duration {
        Duration::from_millis(self.health_request_timeout_ms)
    }

    /// Unhealthy duration that forces a restart
    #[must_use]
    pub const fn unhealthy_restart_threshold(&self) -> Duration {
        Duration::from_millis(self.unhealthy_restart_threshold_ms)
    }

    /// Memory sampling period
    #[must_use]
    pub const fn memory_sample_interval(&self) -> Duration {
        Duration::from_millis(self.memory_sample_interval_ms)
    }

    /// Memory warning threshold in bytes
    #[must_use]
    pub const fn memory_warn_threshold_bytes(&self) -> u64 {
        self.memory_warn_threshold_mb.saturating_mul(1024 * 1024)
    }

    /// Shutdown grace period
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
