//! Process supervisor for the server's own child process
//!
//! Restart policy with exponential backoff, output signal detection,
//! HTTP health probing and self memory sampling.

mod health;
mod memory;
mod policy;
mod process;
mod signals;

pub use health::{HealthProbe, HealthStatus};
pub use memory::{MemorySample, MemorySampler};
pub use policy::{RestartDecision, RestartPolicy, backoff_delay};
pub use process::{
    PORT_ENV, ProcessSupervisor, SUPERVISED_ENV, ShutdownOutcome, SupervisorEvent,
    SupervisorPhase, SupervisorStatus,
};
pub use signals::{OutputSignal, SignalRule, SignalRules};
