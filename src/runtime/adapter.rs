//! Runtime adapter trait and the built-in CLI adapters

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::executor::{SessionCommandExecutor, keys};
use crate::types::{RuntimeType, SessionName};

/// Strategy for starting a specific coding-agent CLI inside a session
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    /// Runtime this adapter starts
    fn runtime_type(&self) -> RuntimeType;

    /// Start the agent CLI inside `session`
    ///
    /// # Errors
    /// Returns error if any executor call fails
    async fn initialize_in_session(
        &self,
        session: &SessionName,
        project_path: &Path,
    ) -> Result<()>;

    /// Whether the CLI binary is available on this host
    async fn check_installed(&self) -> bool;
}

/// Adapter that launches a CLI by typing its command line into the session
pub struct CliRuntimeAdapter {
    runtime: RuntimeType,
    binary: &'static str,
    launch_args: &'static [&'static str],
    executor: Arc<dyn SessionCommandExecutor>,
}

impl CliRuntimeAdapter {
    /// Built-in adapter for `runtime`
    #[must_use]
    pub fn for_runtime(runtime: RuntimeType, executor: Arc<dyn SessionCommandExecutor>) -> Self {
        let (binary, launch_args): (&'static str, &'static [&'static str]) = match runtime {
            RuntimeType::ClaudeCode => ("claude", &["--dangerously-skip-permissions"]),
            RuntimeType::GeminiCli => ("gemini", &["--yolo"]),
            RuntimeType::CodexCli => ("codex", &["--full-auto"]),
        };
        Self {
            runtime,
            binary,
            launch_args,
            executor,
        }
    }

    /// Command line typed into the session
    #[must_use]
    pub fn launch_command(&self) -> String {
        std::iter::once(self.binary)
            .chain(self.launch_args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl RuntimeAdapter for CliRuntimeAdapter {
    fn runtime_type(&self) -> RuntimeType {
        self.runtime
    }

    async fn initialize_in_session(
        &self,
        session: &SessionName,
        project_path: &Path,
    ) -> Result<()> {
        let escaped = project_path.to_string_lossy().replace('\'', "'\\''");
        let command = format!("cd '{escaped}' && {}", self.launch_command());

        log::debug!("[{session}] Launching {}: {command}", self.runtime);
        self.executor.write(session, &command).await?;
        self.executor.send_key(session, keys::ENTER).await?;
        Ok(())
    }

    async fn check_installed(&self) -> bool {
        let binary = self.binary;
        tokio::task::spawn_blocking(move || which::which(binary).is_ok())
            .await
            .unwrap_or(false)
    }
}
