//! Per-session output polling
//!
//! Each streamer polls its session on an independently jittered clock,
//! diffs the capture against the stored buffer and publishes an
//! [`OutputEvent`] only when something changed. A streamer stops for good
//! when its session disappears or a capture fails; restarting means
//! starting a new one.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;

use crate::events::{EventBus, OutputEvent, OutputKind, SessionEvent};
use crate::executor::SessionCommandExecutor;
use crate::timer::{RepeatingTimer, TickOutcome};
use crate::types::SessionName;

use super::store::{CaptureUpdate, SessionStore};

/// Everything a streamer needs, shared with the manager
#[derive(Clone)]
pub struct StreamerContext {
    /// Executor used to capture output
    pub executor: Arc<dyn SessionCommandExecutor>,
    /// Registry and buffers
    pub store: Arc<SessionStore>,
    /// Where output events go
    pub events: EventBus<SessionEvent>,
    /// Lines requested per capture
    pub capture_lines: usize,
    /// Maximum lines kept per buffer
    pub max_buffer_size: usize,
    /// Base poll interval
    pub poll_base: Duration,
    /// Upper bound of the random delay added to each poll
    pub poll_jitter: Duration,
}

/// Result of one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Capture matched the stored buffer; nothing emitted
    Unchanged,
    /// Buffer replaced and an output event emitted
    Changed,
    /// Session no longer exists or is no longer tracked
    SessionGone,
    /// Existence check or capture failed
    Failed(String),
}

impl PollOutcome {
    /// Whether polling should stop after this outcome
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::SessionGone | Self::Failed(_))
    }
}

/// Handle to a running output poller for one session
pub struct OutputStreamer {
    session: SessionName,
    timer: RepeatingTimer,
}

impl OutputStreamer {
    /// Start polling `session`
    #[must_use]
    pub fn start(session: SessionName, ctx: StreamerContext) -> Self {
        log::debug!("[{session}] Output streaming started");

        let (base, jitter) = (ctx.poll_base, ctx.poll_jitter);
        let tick_session = session.clone();
        let timer = RepeatingTimer::start(
            move || jittered(base, jitter),
            move || {
                let ctx = ctx.clone();
                let session = tick_session.clone();
                async move {
                    if poll_once(&ctx, &session).await.is_terminal() {
                        log::debug!("[{session}] Output streaming stopped");
                        TickOutcome::Stop
                    } else {
                        TickOutcome::Continue
                    }
                }
            },
        );

        Self { session, timer }
    }

    /// Session being polled
    #[must_use]
    pub const fn session(&self) -> &SessionName {
        &self.session
    }

    /// Stop polling
    pub fn stop(&self) {
        self.timer.stop();
    }

    /// Whether polling continues
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }
}

/// Poll a session once: check it exists, capture, diff, store, emit
pub async fn poll_once(ctx: &StreamerContext, session: &SessionName) -> PollOutcome {
    match ctx.executor.exists(session).await {
        Ok(true) => {}
        Ok(false) => {
            log::info!("[{session}] Session no longer exists, dropping its tracking");
            ctx.store.forget(session);
            return PollOutcome::SessionGone;
        }
        Err(e) => {
            log::warn!("[{session}] Existence check failed: {e}");
            return PollOutcome::Failed(e.to_string());
        }
    }

    let raw = match ctx.executor.capture(session, ctx.capture_lines).await {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("[{session}] Output capture failed: {e}");
            return PollOutcome::Failed(e.to_string());
        }
    };

    let stored = match ctx
        .store
        .store_capture(session, split_capture(&raw), ctx.max_buffer_size)
    {
        CaptureUpdate::Changed(stored) => stored,
        CaptureUpdate::Unchanged => return PollOutcome::Unchanged,
        CaptureUpdate::Untracked => {
            log::debug!("[{session}] Session no longer tracked, capture dropped");
            return PollOutcome::SessionGone;
        }
    };

    ctx.events.publish(SessionEvent::Output(OutputEvent {
        session: session.clone(),
        content: stored.join("\n"),
        timestamp: Utc::now(),
        kind: OutputKind::Stdout,
    }));
    PollOutcome::Changed
}

/// Split raw pane output into lines, dropping the blank padding at the end
fn split_capture(raw: &str) -> Vec<String> {
    let mut lines: Vec<String> = raw.lines().map(str::to_string).collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    lines
}

fn jittered(base: Duration, jitter: Duration) -> Duration {
    let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
    if jitter_ms == 0 {
        return base;
    }
    base + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
}
