//! Type definitions shared across the fleet
//!
//! - [`identifiers`] - Type-safe wrappers (`SessionName`, `JobId`)
//! - [`runtime`] - The closed set of supported agent runtimes
//! - [`session`] - Session creation requests and uniform results

pub mod identifiers;
pub mod runtime;
pub mod session;

pub use identifiers::{JobId, SessionName};
pub use runtime::RuntimeType;
pub use session::{
    OrchestratorSessionConfig, RegistrationOutcome, RegistrationRequest, SessionResult,
    TeamMemberSessionConfig,
};
