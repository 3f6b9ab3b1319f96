//! Orchestrator and team member session creation

use crate::error::{FleetError, Result};
use crate::types::{
    OrchestratorSessionConfig, RegistrationRequest, RuntimeType, SessionName, SessionResult,
    TeamMemberSessionConfig,
};

use super::super::queue::QueuedJobHandle;
use super::core::SessionLifecycleManager;
use super::{AGENT_ROLE_ENV, MEMBER_ID_ENV, SESSION_NAME_ENV};

impl SessionLifecycleManager {
    /// Create the orchestrator session unless it is already running
    ///
    /// Idempotent: an existing session is reported as success and left
    /// untouched. Otherwise the session is created and the default runtime
    /// is launched inside it.
    pub async fn create_orchestrator_session(
        &self,
        config: OrchestratorSessionConfig,
    ) -> SessionResult {
        let session = config.session_name.clone();

        match self.inner.executor.exists(&session).await {
            Ok(true) => {
                log::info!("[{session}] Orchestrator session already running");
                return SessionResult::ok(session, "Orchestrator session already running");
            }
            Ok(false) => {}
            Err(e) => {
                log::error!("[{session}] Could not check orchestrator session: {e}");
                return SessionResult::failed(session, e.to_string());
            }
        }

        match self.spawn_orchestrator(&config).await {
            Ok(runtime) => {
                log::info!("[{session}] Orchestrator session created ({runtime})");
                SessionResult::ok(session, format!("Orchestrator session created with {runtime}"))
            }
            Err(e) => {
                log::error!("[{session}] Orchestrator session creation failed: {e}");
                SessionResult::failed(session, e.to_string())
            }
        }
    }

    async fn spawn_orchestrator(&self, config: &OrchestratorSessionConfig) -> Result<RuntimeType> {
        let inner = &self.inner;
        let session = &config.session_name;

        inner
            .executor
            .create(session, &config.project_path, config.window_name.as_deref())
            .await?;

        let runtime = inner.factory.default_runtime();
        inner
            .factory
            .adapter_for(runtime)
            .initialize_in_session(session, &config.project_path)
            .await?;

        inner.store.track(session);
        self.start_streaming(session);
        Ok(runtime)
    }

    /// Queue creation of a team member session and wait for that job
    ///
    /// Creation never runs inline: the request waits its turn in the
    /// creation queue. The job's own error is returned on failure.
    ///
    /// # Errors
    /// Returns the error that failed the creation job
    pub async fn create_team_member_session(
        &self,
        config: TeamMemberSessionConfig,
        session_name: impl Into<SessionName>,
    ) -> Result<SessionResult> {
        self.queue_team_member_session(config, session_name)
            .wait()
            .await
    }

    /// Queue creation of a team member session without waiting
    pub fn queue_team_member_session(
        &self,
        config: TeamMemberSessionConfig,
        session_name: impl Into<SessionName>,
    ) -> QueuedJobHandle<SessionResult> {
        let session = session_name.into();
        let manager = self.clone();
        self.inner.queue.enqueue(session.to_string(), async move {
            manager
                .create_team_member_session_internal(config, session)
                .await
        })
    }

    async fn create_team_member_session_internal(
        &self,
        config: TeamMemberSessionConfig,
        session: SessionName,
    ) -> Result<SessionResult> {
        let gate = &self.inner.gate;
        let slot = gate.acquire(&session).await?;
        log::info!(
            "[{session}] Initialization slot acquired ({}/{})",
            gate.active_count(),
            gate.max()
        );

        let result = self.initialize_team_member(&config, &session).await;

        drop(slot);
        log::debug!("[{session}] Initialization slot released");
        result
    }

    async fn initialize_team_member(
        &self,
        config: &TeamMemberSessionConfig,
        session: &SessionName,
    ) -> Result<SessionResult> {
        let inner = &self.inner;

        self.discard_stale_session(session).await;
        tokio::time::sleep(inner.config.kill_settle_delay()).await;

        inner
            .executor
            .create(session, &config.project_path, config.window_name.as_deref())
            .await?;

        inner
            .executor
            .set_env(session, SESSION_NAME_ENV, session.as_str())
            .await?;
        inner
            .executor
            .set_env(session, AGENT_ROLE_ENV, &config.role)
            .await?;
        if let Some(member_id) = &config.member_id {
            inner
                .executor
                .set_env(session, MEMBER_ID_ENV, member_id)
                .await?;
        }

        let runtime_type = inner.factory.resolve(config.runtime_type.as_deref());
        let timeout = inner.config.registration_timeout();
        let request = RegistrationRequest {
            session: session.clone(),
            role: config.role.clone(),
            project_path: config.project_path.clone(),
            timeout,
            member_id: config.member_id.clone(),
            runtime_type,
        };

        let outcome = tokio::time::timeout(timeout, inner.registrar.register_agent(request))
            .await
            .map_err(|_| {
                FleetError::registration_timeout(
                    session.as_str(),
                    inner.config.registration_timeout_ms,
                )
            })?;

        if !outcome.success {
            let message = outcome
                .error
                .unwrap_or_else(|| "registrar reported failure".to_string());
            return Err(FleetError::registration_failed(session.as_str(), message));
        }

        inner.store.track(session);
        self.start_streaming(session);

        let message = outcome
            .message
            .unwrap_or_else(|| format!("{} agent '{}' ready", runtime_type, config.role));
        log::info!("[{session}] {message}");
        Ok(SessionResult::ok(session.clone(), message))
    }

    /// Kill whatever runs under `session` and forget it, ignoring failures
    async fn discard_stale_session(&self, session: &SessionName) {
        self.stop_streaming(session);
        self.inner.store.forget(session);
        if let Err(e) = self.inner.executor.kill(session).await {
            log::debug!("[{session}] No stale session to kill: {e}");
        }
    }
}
