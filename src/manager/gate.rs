//! Concurrency gate bounding sessions that are mid-initialization

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{FleetError, Result};
use crate::types::SessionName;

/// Counting limiter over session initialization
///
/// At most `max` [`InitSlot`]s exist at any time. Waiters are woken in the
/// order they started waiting. A slot is released exactly once, when it is
/// dropped, so every exit path of the guarded job gives it back.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    active: Arc<Mutex<HashMap<SessionName, usize>>>,
    max: usize,
}

impl ConcurrencyGate {
    /// Create a gate admitting `max` concurrent initializations
    #[must_use]
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            active: Arc::new(Mutex::new(HashMap::new())),
            max,
        }
    }

    /// Wait for a free slot and reserve it for `session`
    ///
    /// # Errors
    /// Returns error only if the gate was closed
    pub async fn acquire(&self, session: &SessionName) -> Result<InitSlot> {
        if self.semaphore.available_permits() == 0 {
            log::debug!(
                "[{session}] Waiting for an initialization slot ({} in use)",
                self.max
            );
        }

        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| FleetError::queue_closed("concurrency gate closed"))?;

        *self.active.lock().entry(session.clone()).or_insert(0) += 1;

        Ok(InitSlot {
            session: session.clone(),
            active: Arc::clone(&self.active),
            _permit: permit,
        })
    }

    /// Slot limit
    #[must_use]
    pub const fn max(&self) -> usize {
        self.max
    }

    /// Slots currently held
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.max - self.semaphore.available_permits()
    }

    /// Whether `session` currently holds a slot
    #[must_use]
    pub fn is_initializing(&self, session: &SessionName) -> bool {
        self.active.lock().contains_key(session)
    }

    /// Sessions currently holding a slot
    #[must_use]
    pub fn initializing(&self) -> Vec<SessionName> {
        let mut names: Vec<_> = self.active.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

/// A reserved initialization slot; released on drop
#[derive(Debug)]
pub struct InitSlot {
    session: SessionName,
    active: Arc<Mutex<HashMap<SessionName, usize>>>,
    _permit: OwnedSemaphorePermit,
}

impl InitSlot {
    /// Session holding the slot
    #[must_use]
    pub const fn session(&self) -> &SessionName {
        &self.session
    }
}

impl Drop for InitSlot {
    fn drop(&mut self) {
        let mut active = self.active.lock();
        if let Some(count) = active.get_mut(&self.session) {
            *count -= 1;
            if *count == 0 {
                active.remove(&self.session);
            }
        }
    }
}
