//! Agent session management
//!
//! Provides `SessionLifecycleManager` for creating, queueing, throttling,
//! messaging and tearing down agent sessions, with bounded output
//! buffering and periodic cleanup.
//!
//! # Module Structure
//!
//! - `session_manager` - Core `SessionLifecycleManager` with public API
//! - `gate` - Concurrency gate over initializing sessions
//! - `queue` - Single-worker FIFO creation queue
//! - `store` - Session registry and output buffers
//! - `streamer` - Per-session output polling
//! - `janitor` - Periodic buffer trimming and garbage collection

mod gate;
mod janitor;
mod queue;
mod session_manager;
mod store;
mod streamer;

pub use gate::{ConcurrencyGate, InitSlot};
pub use janitor::{CleanupReport, MemoryJanitor, force_cleanup, sweep};
pub use queue::{QueuedJobHandle, SessionCreationQueue};
pub use session_manager::{
    AGENT_ROLE_ENV, MEMBER_ID_ENV, SESSION_NAME_ENV, SessionLifecycleManager,
    SessionLifecycleManagerBuilder,
};
pub use store::{CaptureUpdate, SessionStore};
pub use streamer::{OutputStreamer, PollOutcome, StreamerContext, poll_once};
