//! Runtime adapters and agent registration
//!
//! A runtime adapter knows how to start one coding-agent CLI inside an
//! already-created session. The [`RuntimeAdapterFactory`] picks and caches
//! adapters by runtime type; the [`AgentRegistrar`] wraps adapter dispatch
//! with role and timeout semantics so callers never branch on runtime type.

mod adapter;
mod factory;
mod registrar;

pub use adapter::{CliRuntimeAdapter, RuntimeAdapter};
pub use factory::RuntimeAdapterFactory;
pub use registrar::{AdapterRegistrar, AgentRegistrar};
