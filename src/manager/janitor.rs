//! Periodic trimming and garbage collection of output buffers

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::timer::{RepeatingTimer, TickOutcome};

use super::store::{SessionStore, trim_to_recent};

/// What a sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Buffers trimmed back to the size cap
    pub trimmed: usize,
    /// Lines dropped while trimming
    pub lines_dropped: usize,
    /// Buffers removed because their session is no longer tracked
    pub removed: usize,
}

/// Background sweeper over every output buffer
pub struct MemoryJanitor {
    timer: RepeatingTimer,
}

impl MemoryJanitor {
    /// Sweep `store` every `interval`
    #[must_use]
    pub fn start(store: Arc<SessionStore>, max_buffer_size: usize, interval: Duration) -> Self {
        let timer = RepeatingTimer::every(interval, move || {
            let store = Arc::clone(&store);
            async move {
                let report = sweep(&store, max_buffer_size);
                if report.trimmed > 0 || report.removed > 0 {
                    log::info!(
                        "Memory cleanup: trimmed {} buffer(s), removed {} stale buffer(s)",
                        report.trimmed,
                        report.removed
                    );
                }
                TickOutcome::Continue
            }
        });
        Self { timer }
    }

    /// Stop sweeping
    pub fn stop(&self) {
        self.timer.stop();
    }

    /// Whether sweeps are still scheduled
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }
}

/// Trim oversized buffers and drop buffers of untracked sessions
pub fn sweep(store: &SessionStore, max_buffer_size: usize) -> CleanupReport {
    store.with_buffers(|tracked, buffers| {
        let mut report = CleanupReport::default();

        buffers.retain(|session, lines| {
            if !tracked.contains(session) {
                log::debug!("[{session}] Removing buffer of untracked session");
                report.removed += 1;
                return false;
            }
            let dropped = trim_to_recent(lines, max_buffer_size);
            if dropped > 0 {
                report.trimmed += 1;
                report.lines_dropped += dropped;
            }
            true
        });

        report
    })
}

/// Sweep immediately, then release spare buffer capacity
pub fn force_cleanup(store: &SessionStore, max_buffer_size: usize) -> CleanupReport {
    let report = sweep(store, max_buffer_size);
    store.with_buffers(|_, buffers| {
        buffers.shrink_to_fit();
        for lines in buffers.values_mut() {
            lines.shrink_to_fit();
        }
    });
    log::info!(
        "Forced memory cleanup: trimmed {}, dropped {} line(s), removed {}",
        report.trimmed,
        report.lines_dropped,
        report.removed
    );
    report
}
