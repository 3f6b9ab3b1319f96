//! Session registry and per-session output buffers

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;

use crate::types::SessionName;

/// What [`SessionStore::store_capture`] did with a capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureUpdate {
    /// Identical to the stored buffer
    Unchanged,
    /// Buffer replaced with these lines
    Changed(Vec<String>),
    /// Session is not tracked; nothing stored
    Untracked,
}

/// Sessions tracked by the manager and their bounded output buffers
///
/// Lock order is registry first, buffers second.
#[derive(Debug, Default)]
pub struct SessionStore {
    tracked: Mutex<HashSet<SessionName>>,
    buffers: Mutex<HashMap<SessionName, VecDeque<String>>>,
}

impl SessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a live session
    pub fn track(&self, session: &SessionName) {
        self.tracked.lock().insert(session.clone());
    }

    /// Whether the session is tracked
    #[must_use]
    pub fn is_tracked(&self, session: &SessionName) -> bool {
        self.tracked.lock().contains(session)
    }

    /// Tracked sessions, sorted by name
    #[must_use]
    pub fn tracked(&self) -> Vec<SessionName> {
        let mut names: Vec<_> = self.tracked.lock().iter().cloned().collect();
        names.sort();
        names
    }

    /// Drop the registry entry and output buffer of a session
    ///
    /// Returns whether anything was tracked.
    pub fn forget(&self, session: &SessionName) -> bool {
        let was_tracked = self.tracked.lock().remove(session);
        let had_buffer = self.buffers.lock().remove(session).is_some();
        was_tracked || had_buffer
    }

    /// Snapshot of a session's output buffer
    #[must_use]
    pub fn buffer(&self, session: &SessionName) -> Option<Vec<String>> {
        self.buffers
            .lock()
            .get(session)
            .map(|lines| lines.iter().cloned().collect())
    }

    /// Number of buffered lines for a session
    #[must_use]
    pub fn buffer_len(&self, session: &SessionName) -> usize {
        self.buffers.lock().get(session).map_or(0, VecDeque::len)
    }

    /// Number of sessions holding a buffer
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.buffers.lock().len()
    }

    /// Replace a buffer verbatim, without trimming
    pub fn replace_buffer(&self, session: &SessionName, lines: Vec<String>) {
        self.buffers.lock().insert(session.clone(), lines.into());
    }

    /// Store a fresh capture, keeping the most recent `max` lines
    ///
    /// Captures for untracked sessions are dropped. The registry lock is held
    /// across the write, so a concurrent [`forget`](Self::forget) either
    /// runs first or removes the new buffer.
    pub fn store_capture(
        &self,
        session: &SessionName,
        captured: Vec<String>,
        max: usize,
    ) -> CaptureUpdate {
        let tracked = self.tracked.lock();
        if !tracked.contains(session) {
            return CaptureUpdate::Untracked;
        }

        let mut lines: VecDeque<String> = captured.into();
        trim_to_recent(&mut lines, max);

        let mut buffers = self.buffers.lock();
        if buffers.get(session).is_some_and(|previous| *previous == lines) {
            return CaptureUpdate::Unchanged;
        }

        let stored: Vec<String> = lines.iter().cloned().collect();
        buffers.insert(session.clone(), lines);
        CaptureUpdate::Changed(stored)
    }

    /// Run `f` over the registry and the buffers under both locks
    pub(crate) fn with_buffers<R>(
        &self,
        f: impl FnOnce(&HashSet<SessionName>, &mut HashMap<SessionName, VecDeque<String>>) -> R,
    ) -> R {
        let tracked = self.tracked.lock();
        let mut buffers = self.buffers.lock();
        f(&tracked, &mut buffers)
    }
}

/// Drop the oldest lines until at most `max` remain
///
/// Returns how many lines were dropped.
pub(crate) fn trim_to_recent(lines: &mut VecDeque<String>, max: usize) -> usize {
    let excess = lines.len().saturating_sub(max);
    lines.drain(..excess);
    excess
}
