//! Agent registration handshake

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FleetError;
use crate::types::{RegistrationOutcome, RegistrationRequest};

use super::factory::RuntimeAdapterFactory;

/// Brings an agent inside a freshly created session to readiness
#[async_trait]
pub trait AgentRegistrar: Send + Sync {
    /// Run the handshake; never panics on failure, reports it in the outcome
    async fn register_agent(&self, request: RegistrationRequest) -> RegistrationOutcome;
}

/// Registrar that dispatches to the runtime adapter under a timeout
pub struct AdapterRegistrar {
    factory: Arc<RuntimeAdapterFactory>,
}

impl AdapterRegistrar {
    /// Create a registrar backed by `factory`
    #[must_use]
    pub const fn new(factory: Arc<RuntimeAdapterFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl AgentRegistrar for AdapterRegistrar {
    async fn register_agent(&self, request: RegistrationRequest) -> RegistrationOutcome {
        let adapter = self.factory.adapter_for(request.runtime_type);
        let init = adapter.initialize_in_session(&request.session, &request.project_path);

        match tokio::time::timeout(request.timeout, init).await {
            Ok(Ok(())) => RegistrationOutcome::ok(format!(
                "{} agent '{}' ready in {}",
                request.runtime_type, request.role, request.session
            )),
            Ok(Err(e)) => RegistrationOutcome::failed(e.to_string()),
            Err(_) => RegistrationOutcome::failed(
                FleetError::registration_timeout(
                    request.session.as_str(),
                    u64::try_from(request.timeout.as_millis()).unwrap_or(u64::MAX),
                )
                .to_string(),
            ),
        }
    }
}
