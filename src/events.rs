//! Typed publish/subscribe for manager and supervisor events
//!
//! Subscribers hold an [`EventSubscription`]; dropping it unsubscribes, so a
//! restarted session never leaves a dangling listener behind.

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::types::SessionName;

// ============================================================================
// SESSION EVENTS
// ============================================================================

/// Source stream of captured output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Terminal output captured from the session pane
    Stdout,
}

/// Changed output of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputEvent {
    /// Session the output belongs to
    pub session: SessionName,
    /// Newly stored buffer content, newline-joined
    pub content: String,
    /// When the change was observed
    pub timestamp: DateTime<Utc>,
    /// Output stream
    pub kind: OutputKind,
}

/// Events emitted by the session lifecycle manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A message was typed and confirmed
    MessageSent {
        /// Target session
        session: SessionName,
        /// Text that was written
        message: String,
    },
    /// A single keystroke was sent
    KeySent {
        /// Target session
        session: SessionName,
        /// Key that was sent
        key: String,
    },
    /// A session was killed and its tracking removed
    SessionKilled {
        /// Killed session
        session: SessionName,
    },
    /// Session output changed
    Output(OutputEvent),
}

impl SessionEvent {
    /// Session this event concerns
    #[must_use]
    pub fn session(&self) -> &SessionName {
        match self {
            Self::MessageSent { session, .. }
            | Self::KeySent { session, .. }
            | Self::SessionKilled { session } => session,
            Self::Output(output) => &output.session,
        }
    }
}

// ============================================================================
// EVENT BUS
// ============================================================================

/// Broadcast bus carrying events of type `E`
#[derive(Debug, Clone)]
pub struct EventBus<E> {
    tx: broadcast::Sender<E>,
}

impl<E: Clone + Send + 'static> EventBus<E> {
    /// Create a bus that buffers up to `capacity` events per slow subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event; a bus without subscribers drops it
    pub fn publish(&self, event: E) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to every event published from now on
    #[must_use]
    pub fn subscribe(&self) -> EventSubscription<E> {
        EventSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Handle to an event subscription; dropping it unsubscribes
#[derive(Debug)]
pub struct EventSubscription<E> {
    rx: broadcast::Receiver<E>,
}

impl<E: Clone + Send + 'static> EventSubscription<E> {
    /// Wait for the next event
    ///
    /// Returns `None` once the bus is gone. Events missed by a lagging
    /// subscriber are skipped with a warning.
    pub async fn recv(&mut self) -> Option<E> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    log::warn!("Event subscriber lagged, skipped {missed} event(s)");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<E> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(missed)) => {
                    log::warn!("Event subscriber lagged, skipped {missed} event(s)");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Unsubscribe explicitly
    pub fn unsubscribe(self) {}

    /// Turn the subscription into a stream of events
    pub fn into_stream(mut self) -> impl Stream<Item = E> + Send {
        async_stream::stream! {
            while let Some(event) = self.recv().await {
                yield event;
            }
        }
    }
}
