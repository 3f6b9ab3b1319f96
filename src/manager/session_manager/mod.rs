//! Session lifecycle manager implementation
//!
//! This module is organized into logical submodules:
//! - `core`: Core struct, builder, initialization and shutdown
//! - `create`: Orchestrator and team member session creation
//! - `interaction`: Messages, keys, capture, kill and streaming control
//! - `list`: Pass-through queries and buffer inspection

mod core;
mod create;
mod interaction;
mod list;

pub use self::core::{SessionLifecycleManager, SessionLifecycleManagerBuilder};

/// Environment variable carrying the session's own name
pub const SESSION_NAME_ENV: &str = "FLEET_SESSION_NAME";

/// Environment variable carrying the agent's role
pub const AGENT_ROLE_ENV: &str = "FLEET_AGENT_ROLE";

/// Environment variable carrying the team member id
pub const MEMBER_ID_ENV: &str = "FLEET_MEMBER_ID";
