//! Supervision of the server's own child process
//!
//! Lifecycle: `Stopped -> Running -> Exited -> (Restarting -> Running |
//! Terminated)`, with `ShuttingDown -> Stopped` reachable from anywhere.
//! Output lines are classified against [`SignalRules`]; a periodic health
//! probe forces a restart after sustained unhealthiness; the restart delay
//! follows [`RestartPolicy`].

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio::sync::watch;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use crate::config::SupervisorConfig;
use crate::error::{FleetError, Result};
use crate::events::{EventBus, EventSubscription};
use crate::timer::{RepeatingTimer, TickOutcome};

use super::health::{HealthProbe, HealthStatus};
use super::memory::MemorySampler;
use super::policy::{RestartDecision, RestartPolicy};
use super::signals::{OutputSignal, SignalRules};

/// Marks the child as running under the supervisor
pub const SUPERVISED_ENV: &str = "FLEET_SUPERVISED";

/// Port the child should listen on
pub const PORT_ENV: &str = "PORT";

/// Longest output line kept whole
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// How long to wait for exit after a forceful kill
const KILL_WAIT: Duration = Duration::from_secs(2);

// ============================================================================
// PUBLIC TYPES
// ============================================================================

/// Coarse supervisor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPhase {
    /// No child and nothing scheduled
    Stopped,
    /// A child is alive
    Running,
    /// Waiting out the backoff before the next start
    Restarting,
    /// Restart limit reached; needs external intervention
    Terminated,
    /// Graceful shutdown in progress
    ShuttingDown,
}

/// Events emitted by the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// A child was spawned
    Started {
        /// OS process id
        pid: u32,
    },
    /// An output line matched a signal rule
    Signal {
        /// Matched signal
        signal: OutputSignal,
        /// The line itself
        line: String,
    },
    /// The health probe succeeded
    Healthy,
    /// The health probe failed
    Unhealthy {
        /// Time since the last healthy probe
        unhealthy_for: Duration,
        /// Why the probe failed
        reason: String,
    },
    /// Sustained unhealthiness triggered a restart
    ForcedRestart {
        /// Time since the last healthy probe
        unhealthy_for: Duration,
    },
    /// The child exited
    Exited {
        /// Exit code, if the child exited normally
        code: Option<i32>,
        /// Terminating signal, if any
        signal: Option<i32>,
        /// How long the child ran
        runtime: Duration,
    },
    /// A restart was scheduled
    RestartScheduled {
        /// Backoff delay
        delay: Duration,
        /// Restart counter after the exit
        restart_count: u32,
        /// Whether the run counted as a crash loop
        crash_loop: bool,
    },
    /// The supervisor gave up restarting
    RestartLimitExceeded {
        /// Counter that hit the limit
        restart_count: u32,
    },
    /// Graceful shutdown finished
    ShutdownComplete {
        /// Whether the child had to be killed forcefully
        forced: bool,
    },
}

/// Point-in-time view of the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorStatus {
    /// Current phase
    pub phase: SupervisorPhase,
    /// Pid of the live child
    pub pid: Option<u32>,
    /// Restart counter
    pub restart_count: u32,
    /// Uptime of the live child
    pub uptime: Option<Duration>,
    /// Time since the last healthy probe
    pub since_healthy: Option<Duration>,
    /// Whether shutdown has begun
    pub shutting_down: bool,
}

/// How a graceful shutdown ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownOutcome {
    /// Whether the child ignored the terminate signal and was killed
    pub forced: bool,
}

// ============================================================================
// SUPERVISOR
// ============================================================================

struct SupervisorState {
    phase: SupervisorPhase,
    child_pid: Option<u32>,
    process_start: Option<Instant>,
    last_healthy: Option<Instant>,
    policy: RestartPolicy,
}

struct Inner {
    config: SupervisorConfig,
    rules: SignalRules,
    probe: HealthProbe,
    state: Mutex<SupervisorState>,
    is_shutting_down: AtomicBool,
    events: EventBus<SupervisorEvent>,
    alive: watch::Sender<bool>,
    timers: Mutex<Vec<RepeatingTimer>>,
}

/// Spawns, monitors and restarts one critical child process
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

impl ProcessSupervisor {
    /// Create a supervisor with the default signal rules
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the health client
    /// cannot be built
    pub fn new(config: SupervisorConfig) -> Result<Self> {
        Self::with_rules(config, SignalRules::defaults())
    }

    /// Create a supervisor with a custom signal rule table
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the health client
    /// cannot be built
    pub fn with_rules(config: SupervisorConfig, rules: SignalRules) -> Result<Self> {
        config.validate()?;
        let probe = HealthProbe::new(config.health_url(), config.health_request_timeout())?;
        let (alive, _) = watch::channel(false);

        let inner = Inner {
            state: Mutex::new(SupervisorState {
                phase: SupervisorPhase::Stopped,
                child_pid: None,
                process_start: None,
                last_healthy: None,
                policy: RestartPolicy::from_config(&config),
            }),
            config,
            rules,
            probe,
            is_shutting_down: AtomicBool::new(false),
            events: EventBus::new(256),
            alive,
            timers: Mutex::new(Vec::new()),
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Spawn the child and start health probing and memory sampling
    ///
    /// Returns the child's pid. Calling this while a child is alive returns
    /// the existing pid.
    ///
    /// # Errors
    /// Returns `SpawnFailure` if the first start fails, or if the supervisor
    /// is waiting out a restart, has given up, or is shutting down
    pub fn start(&self) -> Result<u32> {
        {
            let mut state = self.inner.state.lock();
            match state.phase {
                SupervisorPhase::Stopped => state.phase = SupervisorPhase::Running,
                SupervisorPhase::Running => {
                    return state
                        .child_pid
                        .ok_or_else(|| FleetError::spawn("child is already starting"));
                }
                SupervisorPhase::Restarting => {
                    return Err(FleetError::spawn("a restart is already scheduled"));
                }
                SupervisorPhase::Terminated => {
                    return Err(FleetError::spawn("restart limit reached"));
                }
                SupervisorPhase::ShuttingDown => {
                    return Err(FleetError::spawn("supervisor is shutting down"));
                }
            }
        }

        match self.inner.spawn_child() {
            Ok(pid) => {
                self.inner.start_timers();
                Ok(pid)
            }
            Err(e) => {
                let mut state = self.inner.state.lock();
                if state.child_pid.is_none() && state.phase == SupervisorPhase::Running {
                    state.phase = SupervisorPhase::Stopped;
                }
                Err(e)
            }
        }
    }

    /// Ask the child to terminate so that the normal exit path restarts it
    ///
    /// # Errors
    /// Returns error if no child is running or the signal cannot be sent
    pub fn restart_child(&self) -> Result<()> {
        let pid = self
            .inner
            .state
            .lock()
            .child_pid
            .ok_or_else(|| FleetError::spawn("no child process is running"))?;
        log::info!("[supervisor] Manual restart requested for pid {pid}");
        terminate(pid)
    }

    /// Stop timers, terminate the child and escalate to a kill after the
    /// grace period
    ///
    /// Always resolves. Restarts are never scheduled once this has been
    /// called.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        let inner = &self.inner;
        let grace = inner.config.shutdown_timeout();

        if inner.is_shutting_down.swap(true, Ordering::SeqCst) {
            log::debug!("[supervisor] Shutdown already in progress");
            inner.wait_for_exit(grace + KILL_WAIT).await;
            return ShutdownOutcome { forced: false };
        }

        log::info!("[supervisor] Shutting down...");
        inner.state.lock().phase = SupervisorPhase::ShuttingDown;
        inner.stop_timers();

        let pid = inner.state.lock().child_pid;
        let mut forced = false;

        if let Some(pid) = pid {
            if let Err(e) = terminate(pid) {
                log::warn!("[supervisor] Failed to terminate pid {pid}: {e}");
            }

            if !inner.wait_for_exit(grace).await {
                log::warn!("[supervisor] Server did not exit within {grace:?}, killing pid {pid}");
                forced = true;
                if let Err(e) = force_kill(pid) {
                    log::error!("[supervisor] Failed to kill pid {pid}: {e}");
                }
                if !inner.wait_for_exit(KILL_WAIT).await {
                    log::error!("[supervisor] Pid {pid} still alive after kill");
                }
            }
        }

        inner.state.lock().phase = SupervisorPhase::Stopped;
        inner
            .events
            .publish(SupervisorEvent::ShutdownComplete { forced });
        log::info!("[supervisor] Shutdown complete");
        ShutdownOutcome { forced }
    }

    /// Subscribe to supervisor events
    #[must_use]
    pub fn subscribe(&self) -> EventSubscription<SupervisorEvent> {
        self.inner.events.subscribe()
    }

    /// Whether shutdown has begun
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.inner.is_shutting_down()
    }

    /// Snapshot of the supervisor state
    #[must_use]
    pub fn status(&self) -> SupervisorStatus {
        let state = self.inner.state.lock();
        SupervisorStatus {
            phase: state.phase,
            pid: state.child_pid,
            restart_count: state.policy.restart_count(),
            uptime: state
                .child_pid
                .and(state.process_start)
                .map(|start| start.elapsed()),
            since_healthy: state.last_healthy.map(|at| at.elapsed()),
            shutting_down: self.inner.is_shutting_down(),
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }
}

impl Inner {
    fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::SeqCst)
    }

    fn spawn_child(self: &Arc<Self>) -> Result<u32> {
        if self.is_shutting_down() {
            return Err(FleetError::spawn("supervisor is shutting down"));
        }

        let config = &self.config;
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .env(SUPERVISED_ENV, "1")
            .env(PORT_ENV, config.health_port.to_string())
            .envs(&config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| FleetError::spawn(format!("failed to start {}: {e}", config.command)))?;
        let pid = child
            .id()
            .ok_or_else(|| FleetError::spawn("the OS reported no pid for the child"))?;

        if let Some(stdout) = child.stdout.take() {
            self.spawn_output_reader(stdout, false);
        }
        if let Some(stderr) = child.stderr.take() {
            self.spawn_output_reader(stderr, true);
        }

        {
            let mut state = self.state.lock();
            let now = Instant::now();
            state.phase = SupervisorPhase::Running;
            state.child_pid = Some(pid);
            state.process_start = Some(now);
            state.last_healthy = Some(now);
        }
        self.alive.send_replace(true);

        log::info!("[supervisor] Started {} (pid {pid})", config.command);
        self.events.publish(SupervisorEvent::Started { pid });

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let status = child.wait().await;
            inner.on_child_exit(pid, status);
        });

        Ok(pid)
    }

    fn spawn_output_reader<R>(self: &Arc<Self>, reader: R, is_stderr: bool)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let mut lines =
                FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
            while let Some(line) = lines.next().await {
                match line {
                    Ok(line) => inner.on_output_line(&line, is_stderr),
                    Err(LinesCodecError::MaxLineLengthExceeded) => {
                        log::warn!("[server] Output line longer than {MAX_LINE_LENGTH} bytes skipped");
                    }
                    Err(LinesCodecError::Io(e)) => {
                        log::debug!("[server] Output stream closed: {e}");
                        break;
                    }
                }
            }
        });
    }

    fn on_output_line(&self, line: &str, is_stderr: bool) {
        if is_stderr {
            log::warn!("[server] {line}");
        } else {
            log::info!("[server] {line}");
        }

        let Some(signal) = self.rules.classify(line) else {
            return;
        };

        match signal {
            OutputSignal::ServerStarted => log::info!("[supervisor] Server reported startup"),
            OutputSignal::PortConflict => log::error!(
                "[supervisor] Port {} is already in use",
                self.config.health_port
            ),
            OutputSignal::FatalError => log::error!("[supervisor] Server reported a fatal error"),
            OutputSignal::ModuleImportError => {
                log::error!("[supervisor] Server failed to resolve a module");
            }
        }

        self.events.publish(SupervisorEvent::Signal {
            signal,
            line: line.to_string(),
        });
    }

    fn on_child_exit(self: &Arc<Self>, pid: u32, status: std::io::Result<ExitStatus>) {
        let runtime = {
            let mut state = self.state.lock();
            if state.child_pid != Some(pid) {
                log::debug!("[supervisor] Ignoring exit of untracked pid {pid}");
                return;
            }
            state.child_pid = None;
            state
                .process_start
                .map(|start| start.elapsed())
                .unwrap_or_default()
        };
        self.alive.send_replace(false);

        let (code, signal) = match &status {
            Ok(status) => (status.code(), exit_signal(status)),
            Err(e) => {
                log::error!("[supervisor] Failed to wait for pid {pid}: {e}");
                (None, None)
            }
        };

        log::warn!(
            "[supervisor] Server exited (code {code:?}, signal {signal:?}) after {runtime:?}"
        );
        self.events.publish(SupervisorEvent::Exited {
            code,
            signal,
            runtime,
        });

        self.handle_exit(runtime);
    }

    fn handle_exit(self: &Arc<Self>, runtime: Duration) {
        if self.is_shutting_down() {
            self.state.lock().phase = SupervisorPhase::Stopped;
            log::info!("[supervisor] Exit during shutdown, not restarting");
            return;
        }

        let decision = self.state.lock().policy.on_exit(runtime);

        match decision {
            RestartDecision::LimitExceeded { restart_count } => {
                self.state.lock().phase = SupervisorPhase::Terminated;
                self.stop_timers();
                log::error!(
                    "[supervisor] {}; manual intervention required",
                    FleetError::RestartLimitExceeded(restart_count)
                );
                self.events
                    .publish(SupervisorEvent::RestartLimitExceeded { restart_count });
            }
            RestartDecision::Restart {
                delay,
                restart_count,
                crash_loop,
            } => {
                if crash_loop {
                    log::warn!(
                        "[supervisor] {}",
                        FleetError::CrashLoop {
                            restarts: restart_count
                        }
                    );
                }
                self.state.lock().phase = SupervisorPhase::Restarting;
                log::info!("[supervisor] Restarting in {delay:?} (restart count {restart_count})");
                self.events.publish(SupervisorEvent::RestartScheduled {
                    delay,
                    restart_count,
                    crash_loop,
                });

                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if inner.is_shutting_down() {
                        return;
                    }
                    if let Err(e) = inner.spawn_child() {
                        log::error!("[supervisor] Restart failed: {e}");
                        inner.handle_exit(Duration::ZERO);
                    }
                });
            }
        }
    }

    fn start_timers(self: &Arc<Self>) {
        let health = {
            let inner = Arc::clone(self);
            RepeatingTimer::every(self.config.health_check_interval(), move || {
                let inner = Arc::clone(&inner);
                async move { inner.health_tick().await }
            })
        };

        let memory = {
            let inner = Arc::clone(self);
            let mut sampler = MemorySampler::new(self.config.memory_warn_threshold_bytes());
            RepeatingTimer::every(self.config.memory_sample_interval(), move || {
                let outcome = if inner.is_shutting_down() {
                    TickOutcome::Stop
                } else {
                    sampler.sample();
                    TickOutcome::Continue
                };
                futures::future::ready(outcome)
            })
        };

        let mut timers = self.timers.lock();
        timers.push(health);
        timers.push(memory);
    }

    fn stop_timers(&self) {
        let timers = std::mem::take(&mut *self.timers.lock());
        for timer in timers {
            timer.stop();
        }
    }

    async fn health_tick(&self) -> TickOutcome {
        if self.is_shutting_down() {
            return TickOutcome::Stop;
        }
        let Some(pid) = self.state.lock().child_pid else {
            return TickOutcome::Continue;
        };

        match self.probe.check().await {
            HealthStatus::Healthy { status } => {
                self.state.lock().last_healthy = Some(Instant::now());
                log::debug!(
                    "[supervisor] Health check ok ({})",
                    status.as_deref().unwrap_or("no status")
                );
                self.events.publish(SupervisorEvent::Healthy);
            }
            HealthStatus::Unhealthy { reason } => {
                let unhealthy_for = {
                    let state = self.state.lock();
                    state
                        .last_healthy
                        .or(state.process_start)
                        .map(|at| at.elapsed())
                        .unwrap_or_default()
                };
                log::warn!(
                    "[supervisor] {} (unhealthy for {unhealthy_for:?})",
                    FleetError::health(reason.clone())
                );
                self.events.publish(SupervisorEvent::Unhealthy {
                    unhealthy_for,
                    reason,
                });

                if unhealthy_for > self.config.unhealthy_restart_threshold()
                    && !self.is_shutting_down()
                {
                    self.force_restart(pid, unhealthy_for);
                }
            }
        }

        TickOutcome::Continue
    }

    fn force_restart(&self, pid: u32, unhealthy_for: Duration) {
        {
            let mut state = self.state.lock();
            if state.child_pid != Some(pid) {
                return;
            }
            state.last_healthy = Some(Instant::now());
        }

        log::error!("[supervisor] Unhealthy for {unhealthy_for:?}, forcing restart of pid {pid}");
        self.events
            .publish(SupervisorEvent::ForcedRestart { unhealthy_for });
        if let Err(e) = terminate(pid) {
            log::error!("[supervisor] Failed to terminate pid {pid}: {e}");
        }
    }

    async fn wait_for_exit(&self, timeout: Duration) -> bool {
        let mut alive = self.alive.subscribe();
        matches!(
            tokio::time::timeout(timeout, alive.wait_for(|alive| !*alive)).await,
            Ok(Ok(_))
        )
    }
}

// ============================================================================
// PLATFORM SIGNALS
// ============================================================================

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> Result<()> {
    let raw = i32::try_from(pid).map_err(|_| FleetError::spawn(format!("pid {pid} out of range")))?;
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(raw), signal)
        .map_err(|errno| FleetError::Io(std::io::Error::from(errno)))
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<()> {
    send_signal(pid, nix::sys::signal::Signal::SIGTERM)
}

#[cfg(unix)]
fn force_kill(pid: u32) -> Result<()> {
    send_signal(pid, nix::sys::signal::Signal::SIGKILL)
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn taskkill(pid: u32, force: bool) -> Result<()> {
    let mut cmd = std::process::Command::new("taskkill");
    cmd.args(["/PID", &pid.to_string()]);
    if force {
        cmd.arg("/F");
    }
    let status = cmd.stdout(Stdio::null()).stderr(Stdio::null()).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(FleetError::spawn(format!("taskkill exited with {status}")))
    }
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> Result<()> {
    taskkill(pid, false)
}

#[cfg(not(unix))]
fn force_kill(pid: u32) -> Result<()> {
    taskkill(pid, true)
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
