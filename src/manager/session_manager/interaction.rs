//! Messages, keystrokes, capture, teardown and streaming control

use crate::error::Result;
use crate::events::SessionEvent;
use crate::executor::keys;
use crate::types::{SessionName, SessionResult};

use super::super::streamer::OutputStreamer;
use super::core::SessionLifecycleManager;

impl SessionLifecycleManager {
    /// Type a message into a session and confirm it
    ///
    /// The input line is cleared first because some runtimes leave partial
    /// input behind; the text and the confirm key are separate calls.
    ///
    /// # Errors
    /// Returns the first executor error
    pub async fn send_message(&self, session: &SessionName, message: &str) -> Result<()> {
        let executor = &self.inner.executor;

        executor.send_key(session, keys::CLEAR_LINE).await?;
        executor.write(session, message).await?;
        executor.send_key(session, keys::ENTER).await?;

        log::debug!("[{session}] Message sent ({} chars)", message.len());
        self.inner.events.publish(SessionEvent::MessageSent {
            session: session.clone(),
            message: message.to_string(),
        });
        Ok(())
    }

    /// Send a single keystroke, without a confirm key
    ///
    /// # Errors
    /// Returns the executor error
    pub async fn send_key(&self, session: &SessionName, key: &str) -> Result<()> {
        self.inner.executor.send_key(session, key).await?;

        self.inner.events.publish(SessionEvent::KeySent {
            session: session.clone(),
            key: key.to_string(),
        });
        Ok(())
    }

    /// Kill a session and drop its local tracking
    ///
    /// Never fails: an executor error is logged and reported in the result,
    /// and local tracking is removed either way.
    pub async fn kill_session(&self, session: &SessionName) -> SessionResult {
        let killed = self.inner.executor.kill(session).await;

        self.stop_streaming(session);
        self.inner.store.forget(session);
        self.inner.events.publish(SessionEvent::SessionKilled {
            session: session.clone(),
        });

        match killed {
            Ok(()) => {
                log::info!("[{session}] Session killed");
                SessionResult::ok(session.clone(), "Session killed")
            }
            Err(e) => {
                log::warn!("[{session}] Kill failed, tracking removed anyway: {e}");
                SessionResult::failed(session.clone(), e.to_string())
            }
        }
    }

    /// Capture the last `lines` lines of a session's output
    ///
    /// # Errors
    /// Returns the executor error
    pub async fn capture_output(&self, session: &SessionName, lines: usize) -> Result<String> {
        self.inner.executor.capture(session, lines).await
    }

    /// Start a fresh output streamer for a session
    ///
    /// Any streamer already running for the session is replaced.
    pub fn enable_output_streaming(&self, session: &SessionName) {
        self.inner.store.track(session);
        self.start_streaming(session);
    }

    /// Stop the output streamer of a session
    pub fn disable_output_streaming(&self, session: &SessionName) {
        self.stop_streaming(session);
    }

    /// Whether a streamer is actively polling the session
    ///
    /// A streamer that stopped on its own is dropped here.
    #[must_use]
    pub fn is_streaming(&self, session: &SessionName) -> bool {
        let mut streamers = self.inner.streamers.lock();
        match streamers.get(session) {
            Some(streamer) if streamer.is_running() => true,
            Some(_) => {
                streamers.remove(session);
                false
            }
            None => false,
        }
    }

    /// Number of streamer handles held, finished ones included
    #[must_use]
    pub fn streamer_count(&self) -> usize {
        self.inner.streamers.lock().len()
    }

    pub(super) fn start_streaming(&self, session: &SessionName) {
        let streamer = OutputStreamer::start(session.clone(), self.streamer_context());
        let mut streamers = self.inner.streamers.lock();
        streamers.retain(|name, existing| name == session || existing.is_running());
        if let Some(previous) = streamers.insert(session.clone(), streamer) {
            previous.stop();
        }
    }

    pub(super) fn stop_streaming(&self, session: &SessionName) {
        if let Some(streamer) = self.inner.streamers.lock().remove(session) {
            streamer.stop();
        }
    }
}
