//! In-memory fakes shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use kodegen_agent_fleet::error::{FleetError, Result};
use kodegen_agent_fleet::{
    AgentRegistrar, RegistrationOutcome, RegistrationRequest, SessionCommandExecutor, SessionName,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// FAKE EXECUTOR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Initialize,
    Exists(String),
    Create(String),
    Kill(String),
    Write(String, String),
    SendKey(String, String),
    Capture(String),
    SetEnv(String, String, String),
    BulkExists(Vec<String>),
    List,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub at: Instant,
    pub op: Op,
}

/// Executor keeping sessions in memory and recording every call
#[derive(Default)]
pub struct FakeExecutor {
    calls: Mutex<Vec<Call>>,
    sessions: Mutex<HashSet<SessionName>>,
    captures: Mutex<HashMap<SessionName, String>>,
    fail_create: Mutex<HashSet<SessionName>>,
    fail_capture: AtomicBool,
    fail_kill: AtomicBool,
    fail_initialize: AtomicBool,
}

impl FakeExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, op: Op) {
        self.calls.lock().push(Call {
            at: Instant::now(),
            op,
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.calls.lock().iter().map(|call| call.op.clone()).collect()
    }

    /// Calls other than existence checks and captures made by pollers
    pub fn commands(&self) -> Vec<Op> {
        self.ops()
            .into_iter()
            .filter(|op| !matches!(op, Op::Exists(_) | Op::Capture(_)))
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| pred(&call.op)).count()
    }

    pub fn first_at(&self, pred: impl Fn(&Op) -> bool) -> Option<Instant> {
        self.calls
            .lock()
            .iter()
            .find(|call| pred(&call.op))
            .map(|call| call.at)
    }

    pub fn add_session(&self, name: &str) {
        self.sessions.lock().insert(name.into());
    }

    pub fn remove_session(&self, name: &str) {
        self.sessions.lock().remove(&SessionName::from(name));
    }

    pub fn has_session(&self, name: &str) -> bool {
        self.sessions.lock().contains(&SessionName::from(name))
    }

    pub fn set_capture(&self, name: &str, output: &str) {
        self.captures.lock().insert(name.into(), output.to_string());
    }

    pub fn fail_create_for(&self, name: &str) {
        self.fail_create.lock().insert(name.into());
    }

    pub fn set_fail_capture(&self, fail: bool) {
        self.fail_capture.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_kill(&self, fail: bool) {
        self.fail_kill.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionCommandExecutor for FakeExecutor {
    async fn initialize(&self) -> Result<()> {
        self.record(Op::Initialize);
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(FleetError::command("server", "no server running"));
        }
        Ok(())
    }

    async fn exists(&self, name: &SessionName) -> Result<bool> {
        self.record(Op::Exists(name.to_string()));
        Ok(self.sessions.lock().contains(name))
    }

    async fn create(&self, name: &SessionName, _cwd: &Path, _window: Option<&str>) -> Result<()> {
        self.record(Op::Create(name.to_string()));
        if self.fail_create.lock().contains(name) {
            return Err(FleetError::command(name.as_str(), "create refused"));
        }
        self.sessions.lock().insert(name.clone());
        Ok(())
    }

    async fn kill(&self, name: &SessionName) -> Result<()> {
        self.record(Op::Kill(name.to_string()));
        if self.fail_kill.load(Ordering::SeqCst) {
            return Err(FleetError::command(name.as_str(), "kill refused"));
        }
        if self.sessions.lock().remove(name) {
            Ok(())
        } else {
            Err(FleetError::command(name.as_str(), "can't find session"))
        }
    }

    async fn write(&self, name: &SessionName, text: &str) -> Result<()> {
        self.record(Op::Write(name.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_key(&self, name: &SessionName, key: &str) -> Result<()> {
        self.record(Op::SendKey(name.to_string(), key.to_string()));
        Ok(())
    }

    async fn capture(&self, name: &SessionName, _lines: usize) -> Result<String> {
        self.record(Op::Capture(name.to_string()));
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(FleetError::command(name.as_str(), "capture failed"));
        }
        Ok(self.captures.lock().get(name).cloned().unwrap_or_default())
    }

    async fn set_env(&self, name: &SessionName, key: &str, value: &str) -> Result<()> {
        self.record(Op::SetEnv(
            name.to_string(),
            key.to_string(),
            value.to_string(),
        ));
        Ok(())
    }

    async fn bulk_exists(&self, names: &[SessionName]) -> Result<HashMap<SessionName, bool>> {
        self.record(Op::BulkExists(
            names.iter().map(ToString::to_string).collect(),
        ));
        let sessions = self.sessions.lock();
        Ok(names
            .iter()
            .map(|name| (name.clone(), sessions.contains(name)))
            .collect())
    }

    async fn list(&self) -> Result<Vec<SessionName>> {
        self.record(Op::List);
        let mut names: Vec<_> = self.sessions.lock().iter().cloned().collect();
        names.sort();
        Ok(names)
    }
}

// ============================================================================
// FAKE REGISTRAR
// ============================================================================

/// Registrar that sleeps, then succeeds or fails, tracking overlap
pub struct FakeRegistrar {
    delay: Duration,
    succeed: bool,
    active: AtomicUsize,
    max_active: AtomicUsize,
    requests: Mutex<Vec<RegistrationRequest>>,
    finished: Mutex<Vec<(String, Instant)>>,
}

impl FakeRegistrar {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self::with_outcome(delay, true))
    }

    pub fn failing(delay: Duration) -> Arc<Self> {
        Arc::new(Self::with_outcome(delay, false))
    }

    fn with_outcome(delay: Duration, succeed: bool) -> Self {
        Self {
            delay,
            succeed,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RegistrationRequest> {
        self.requests.lock().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn finished_at(&self, session: &str) -> Option<Instant> {
        self.finished
            .lock()
            .iter()
            .find(|(name, _)| name == session)
            .map(|(_, at)| *at)
    }
}

#[async_trait]
impl AgentRegistrar for FakeRegistrar {
    async fn register_agent(&self, request: RegistrationRequest) -> RegistrationOutcome {
        let session = request.session.to_string();
        self.requests.lock().push(request);

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.finished.lock().push((session, Instant::now()));

        if self.succeed {
            RegistrationOutcome::ok("registered")
        } else {
            RegistrationOutcome::failed("agent never reported in")
        }
    }
}
