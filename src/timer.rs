//! Cancellable repeating timer
//!
//! Every periodic loop in the crate (output polling, janitor sweeps, health
//! probes, memory sampling) runs on a [`RepeatingTimer`]. The next delay is
//! asked for before every tick, which is how polling jitter is applied.
//! Under `tokio::time::pause` the timer follows virtual time.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What the timer should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Schedule the next tick
    Continue,
    /// Stop for good
    Stop,
}

/// Handle to a background repeating timer
///
/// Stopping is cooperative: an in-flight tick runs to completion, only the
/// next one is not scheduled. Dropping the handle stops the timer.
#[derive(Debug)]
pub struct RepeatingTimer {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RepeatingTimer {
    /// Start a timer whose delay before each tick comes from `next_delay`
    pub fn start<D, F, Fut>(mut next_delay: D, mut tick: F) -> Self
    where
        D: FnMut() -> Duration + Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickOutcome> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = child.cancelled() => break,
                    () = tokio::time::sleep(next_delay()) => {}
                }

                if tick().await == TickOutcome::Stop {
                    child.cancel();
                    break;
                }

                if child.is_cancelled() {
                    break;
                }
            }
        });

        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Start a timer with a fixed period
    pub fn every<F, Fut>(period: Duration, tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickOutcome> + Send + 'static,
    {
        Self::start(move || period, tick)
    }

    /// Stop scheduling further ticks
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Whether further ticks will be scheduled
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
            && self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the timer and wait for an in-flight tick to finish
    pub async fn join(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RepeatingTimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
