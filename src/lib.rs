//! # Agent Fleet for Rust
//!
//! Orchestration of terminal-attached coding agents plus supervision of the
//! server process that hosts them.
//!
//! ## Quick Start
//!
//! The host application supplies a [`SessionCommandExecutor`] over its
//! terminal multiplexer; the manager does the rest:
//!
//! ```no_run
//! use std::sync::Arc;
//! use kodegen_agent_fleet::{
//!     FleetConfig, OrchestratorSessionConfig, SessionCommandExecutor, SessionLifecycleManager,
//! };
//!
//! # async fn example(executor: Arc<dyn SessionCommandExecutor>) -> kodegen_agent_fleet::Result<()> {
//! let manager = SessionLifecycleManager::new(FleetConfig::default(), executor)?;
//! manager.initialize().await;
//!
//! let result = manager
//!     .create_orchestrator_session(OrchestratorSessionConfig {
//!         session_name: "orchestrator".into(),
//!         project_path: "/work/project".into(),
//!         window_name: None,
//!     })
//!     .await;
//! log::info!("orchestrator ready: {}", result.success);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Features
//!
//! ### 1. Throttled Team Member Creation
//!
//! Team member sessions are created one at a time through a FIFO queue,
//! with at most `max_concurrent_initializing` agents starting at once:
//!
//! ```no_run
//! # use kodegen_agent_fleet::{SessionLifecycleManager, TeamMemberSessionConfig};
//! # async fn example(manager: SessionLifecycleManager) -> kodegen_agent_fleet::Result<()> {
//! let config = TeamMemberSessionConfig {
//!     role: "backend".to_string(),
//!     project_path: "/work/project".into(),
//!     window_name: None,
//!     member_id: Some("m-1".to_string()),
//!     runtime_type: Some("gemini-cli".to_string()),
//! };
//! let result = manager
//!     .create_team_member_session(config, "backend-1")
//!     .await?;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```
//!
//! ### 2. Output Streaming
//!
//! Tracked sessions are polled with jitter; only changed output is
//! published:
//!
//! ```no_run
//! # use kodegen_agent_fleet::{SessionEvent, SessionLifecycleManager};
//! # async fn example(manager: SessionLifecycleManager) {
//! let mut events = manager.subscribe();
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::Output(output) = event {
//!         log::info!("{}: {} bytes", output.session, output.content.len());
//!     }
//! }
//! # }
//! ```
//!
//! ### 3. Process Supervision
//!
//! [`ProcessSupervisor`] keeps the server process alive with exponential
//! backoff, health probing and crash loop detection:
//!
//! ```no_run
//! # use kodegen_agent_fleet::{ProcessSupervisor, SupervisorConfig};
//! # async fn example() -> kodegen_agent_fleet::Result<()> {
//! let supervisor = ProcessSupervisor::new(SupervisorConfig::default())?;
//! let pid = supervisor.start()?;
//! log::info!("server running as pid {pid}");
//!
//! tokio::signal::ctrl_c().await?;
//! supervisor.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`types`]: Identifiers, runtime types, session requests and results
//! - [`executor`]: The injected terminal session primitives
//! - [`runtime`]: Runtime adapters, factory and agent registration
//! - [`manager`]: Session lifecycle manager, queue, gate and buffers
//! - [`supervisor`]: Child process supervision
//! - [`events`]: Typed event bus
//! - [`timer`]: Cancellable repeating timers
//! - [`config`]: Configuration with defaults and environment overrides
//! - [`error`]: Error types and handling
//!
//! ## Error Handling
//!
//! Fallible operations return [`Result<T, FleetError>`](Result). Session
//! creation and teardown return a uniform [`SessionResult`] instead, so
//! callers can report failures without matching on error variants.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod manager;
pub mod runtime;
pub mod supervisor;
pub mod timer;
pub mod types;

// Re-export commonly used types for external API
pub use config::{FleetConfig, SupervisorConfig};
pub use error::{FleetError, Result};
pub use events::{EventBus, EventSubscription, OutputEvent, OutputKind, SessionEvent};
pub use executor::SessionCommandExecutor;
pub use manager::{CleanupReport, SessionLifecycleManager, SessionLifecycleManagerBuilder};
pub use runtime::{
    AdapterRegistrar, AgentRegistrar, CliRuntimeAdapter, RuntimeAdapter, RuntimeAdapterFactory,
};
pub use supervisor::{
    ProcessSupervisor, ShutdownOutcome, SupervisorEvent, SupervisorPhase, SupervisorStatus,
};
pub use timer::{RepeatingTimer, TickOutcome};
pub use types::{
    JobId, OrchestratorSessionConfig, RegistrationOutcome, RegistrationRequest, RuntimeType,
    SessionName, SessionResult, TeamMemberSessionConfig,
};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
