//! Unit tests for runtime adapters
//!
//! Tests runtime resolution, adapter caching, launch commands and the
//! registrar timeout

#[path = "../common/mod.rs"]
mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{FakeExecutor, Op};
use kodegen_agent_fleet::error::Result;
use kodegen_agent_fleet::executor::keys;
use kodegen_agent_fleet::{
    AdapterRegistrar, AgentRegistrar, CliRuntimeAdapter, RegistrationRequest, RuntimeAdapter,
    RuntimeAdapterFactory, RuntimeType, SessionName,
};

struct StalledAdapter;

#[async_trait]
impl RuntimeAdapter for StalledAdapter {
    fn runtime_type(&self) -> RuntimeType {
        RuntimeType::CodexCli
    }

    async fn initialize_in_session(&self, _session: &SessionName, _path: &Path) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn check_installed(&self) -> bool {
        true
    }
}

fn request(runtime_type: RuntimeType, timeout: Duration) -> RegistrationRequest {
    RegistrationRequest {
        session: "agent".into(),
        role: "reviewer".to_string(),
        project_path: "/work/project".into(),
        timeout,
        member_id: None,
        runtime_type,
    }
}

#[test]
fn test_runtime_type_parsing() {
    assert_eq!(RuntimeType::parse("claude-code"), Some(RuntimeType::ClaudeCode));
    assert_eq!(RuntimeType::parse(" Gemini-CLI "), Some(RuntimeType::GeminiCli));
    assert_eq!(RuntimeType::parse("codex-cli"), Some(RuntimeType::CodexCli));
    assert_eq!(RuntimeType::parse("emacs"), None);
    assert_eq!(
        RuntimeType::parse_or("emacs", RuntimeType::GeminiCli),
        RuntimeType::GeminiCli
    );
    assert_eq!(RuntimeType::default(), RuntimeType::ClaudeCode);
    assert_eq!(RuntimeType::CodexCli.to_string(), "codex-cli");
}

#[test]
fn test_factory_resolves_with_fallback() {
    let factory = RuntimeAdapterFactory::new(FakeExecutor::new(), RuntimeType::GeminiCli);

    assert_eq!(factory.resolve(None), RuntimeType::GeminiCli);
    assert_eq!(factory.resolve(Some("")), RuntimeType::GeminiCli);
    assert_eq!(factory.resolve(Some("claude-code")), RuntimeType::ClaudeCode);
    assert_eq!(factory.resolve(Some("unknown")), RuntimeType::GeminiCli);
    assert_eq!(
        factory.adapter(Some("codex-cli")).runtime_type(),
        RuntimeType::CodexCli
    );
}

#[test]
fn test_factory_caches_adapters() {
    let factory = RuntimeAdapterFactory::new(FakeExecutor::new(), RuntimeType::ClaudeCode);

    let first = factory.adapter_for(RuntimeType::ClaudeCode);
    let second = factory.adapter(None);
    assert!(Arc::ptr_eq(&first, &second));

    let custom: Arc<dyn RuntimeAdapter> = Arc::new(StalledAdapter);
    factory.register(custom.clone());
    assert!(Arc::ptr_eq(&factory.adapter_for(RuntimeType::CodexCli), &custom));
}

#[test]
fn test_launch_commands() {
    let executor = FakeExecutor::new();
    let command = |runtime| CliRuntimeAdapter::for_runtime(runtime, executor.clone()).launch_command();

    assert_eq!(
        command(RuntimeType::ClaudeCode),
        "claude --dangerously-skip-permissions"
    );
    assert_eq!(command(RuntimeType::GeminiCli), "gemini --yolo");
    assert_eq!(command(RuntimeType::CodexCli), "codex --full-auto");
}

#[tokio::test]
async fn test_initialize_in_session_quotes_path() {
    let executor = FakeExecutor::new();
    let adapter = CliRuntimeAdapter::for_runtime(RuntimeType::CodexCli, executor.clone());

    adapter
        .initialize_in_session(&"agent".into(), Path::new("/tmp/it's here"))
        .await
        .unwrap();

    assert_eq!(
        executor.ops(),
        vec![
            Op::Write(
                "agent".to_string(),
                r"cd '/tmp/it'\''s here' && codex --full-auto".to_string()
            ),
            Op::SendKey("agent".to_string(), keys::ENTER.to_string()),
        ]
    );
}

#[tokio::test]
async fn test_registrar_dispatches_to_adapter() {
    let executor = FakeExecutor::new();
    let factory = Arc::new(RuntimeAdapterFactory::new(
        executor.clone(),
        RuntimeType::ClaudeCode,
    ));
    let registrar = AdapterRegistrar::new(factory);

    let outcome = registrar
        .register_agent(request(RuntimeType::GeminiCli, Duration::from_secs(5)))
        .await;
    assert!(outcome.success, "{outcome:?}");
    assert!(executor.ops().iter().any(|op| matches!(
        op,
        Op::Write(_, text) if text.ends_with("gemini --yolo")
    )));
}

#[tokio::test(start_paused = true)]
async fn test_registrar_times_out() {
    let factory = Arc::new(RuntimeAdapterFactory::new(
        FakeExecutor::new(),
        RuntimeType::ClaudeCode,
    ));
    factory.register(Arc::new(StalledAdapter));
    let registrar = AdapterRegistrar::new(factory);

    let outcome = registrar
        .register_agent(request(RuntimeType::CodexCli, Duration::from_millis(250)))
        .await;
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("timed out"));
}
