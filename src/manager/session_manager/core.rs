//! Core manager structure, construction and lifecycle

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::FleetConfig;
use crate::error::Result;
use crate::events::{EventBus, EventSubscription, SessionEvent};
use crate::executor::SessionCommandExecutor;
use crate::runtime::{AdapterRegistrar, AgentRegistrar, RuntimeAdapterFactory};
use crate::types::SessionName;

use super::super::gate::ConcurrencyGate;
use super::super::janitor::MemoryJanitor;
use super::super::queue::SessionCreationQueue;
use super::super::store::SessionStore;
use super::super::streamer::{OutputStreamer, StreamerContext};

// ============================================================================
// SESSION LIFECYCLE MANAGER CORE
// ============================================================================

pub(super) struct ManagerInner {
    pub(super) config: FleetConfig,
    pub(super) executor: Arc<dyn SessionCommandExecutor>,
    pub(super) factory: Arc<RuntimeAdapterFactory>,
    pub(super) registrar: Arc<dyn AgentRegistrar>,
    pub(super) gate: ConcurrencyGate,
    pub(super) queue: SessionCreationQueue,
    pub(super) store: Arc<SessionStore>,
    pub(super) events: EventBus<SessionEvent>,
    pub(super) streamers: Mutex<HashMap<SessionName, OutputStreamer>>,
    janitor: Mutex<Option<MemoryJanitor>>,
}

/// Facade over the fleet of agent sessions
///
/// The `SessionLifecycleManager` coordinates:
/// - Idempotent orchestrator session creation
/// - Queued, throttled team member session creation
/// - Messaging and keystrokes
/// - Output streaming with bounded buffers
/// - Periodic buffer cleanup
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct SessionLifecycleManager {
    pub(super) inner: Arc<ManagerInner>,
}

/// Builder wiring the manager's collaborators
pub struct SessionLifecycleManagerBuilder {
    config: FleetConfig,
    executor: Arc<dyn SessionCommandExecutor>,
    factory: Option<Arc<RuntimeAdapterFactory>>,
    registrar: Option<Arc<dyn AgentRegistrar>>,
}

impl SessionLifecycleManagerBuilder {
    /// Use a specific adapter factory
    #[must_use]
    pub fn factory(mut self, factory: Arc<RuntimeAdapterFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Use a specific agent registrar
    #[must_use]
    pub fn registrar(mut self, registrar: Arc<dyn AgentRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Build the manager and start the memory janitor
    ///
    /// `FLEET_RUNTIME_TYPE` is applied over the configured default runtime.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the configuration is rejected
    pub fn build(mut self) -> Result<SessionLifecycleManager> {
        self.config = self.config.with_env_overrides();
        self.config.validate()?;

        let factory = self.factory.unwrap_or_else(|| {
            Arc::new(RuntimeAdapterFactory::new(
                Arc::clone(&self.executor),
                self.config.default_runtime,
            ))
        });
        let registrar = self
            .registrar
            .unwrap_or_else(|| Arc::new(AdapterRegistrar::new(Arc::clone(&factory))));

        let store = Arc::new(SessionStore::new());
        let janitor = MemoryJanitor::start(
            Arc::clone(&store),
            self.config.max_buffer_size,
            self.config.janitor_interval(),
        );

        let inner = ManagerInner {
            gate: ConcurrencyGate::new(self.config.max_concurrent_initializing),
            queue: SessionCreationQueue::new(self.config.session_creation_delay()),
            events: EventBus::new(self.config.event_capacity),
            streamers: Mutex::new(HashMap::new()),
            janitor: Mutex::new(Some(janitor)),
            config: self.config,
            executor: self.executor,
            factory,
            registrar,
            store,
        };

        Ok(SessionLifecycleManager {
            inner: Arc::new(inner),
        })
    }
}

impl SessionLifecycleManager {
    /// Start building a manager over `executor`
    #[must_use]
    pub fn builder(
        config: FleetConfig,
        executor: Arc<dyn SessionCommandExecutor>,
    ) -> SessionLifecycleManagerBuilder {
        SessionLifecycleManagerBuilder {
            config,
            executor,
            factory: None,
            registrar: None,
        }
    }

    /// Build a manager with the default factory and registrar
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the configuration is rejected
    pub fn new(config: FleetConfig, executor: Arc<dyn SessionCommandExecutor>) -> Result<Self> {
        Self::builder(config, executor).build()
    }

    /// Bring up the executor's backing server
    ///
    /// A failure is logged and startup continues: sessions created later
    /// will surface the problem through their own errors.
    pub async fn initialize(&self) {
        match self.inner.executor.initialize().await {
            Ok(()) => log::info!("Session executor initialized"),
            Err(e) => log::error!("Session executor initialization failed, continuing: {e}"),
        }
    }

    /// Stop every output streamer and the memory janitor
    ///
    /// Sessions themselves keep running; they belong to the executor.
    pub fn shutdown(&self) {
        log::info!("Shutting down SessionLifecycleManager...");

        let streamers: Vec<_> = self.inner.streamers.lock().drain().collect();
        for (session, streamer) in streamers {
            log::debug!("[{session}] Stopping output streaming");
            streamer.stop();
        }

        if let Some(janitor) = self.inner.janitor.lock().take() {
            janitor.stop();
        }

        log::info!("SessionLifecycleManager shutdown complete");
    }

    /// Subscribe to session events
    #[must_use]
    pub fn subscribe(&self) -> EventSubscription<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &FleetConfig {
        &self.inner.config
    }

    /// Adapter factory in use
    #[must_use]
    pub fn factory(&self) -> &Arc<RuntimeAdapterFactory> {
        &self.inner.factory
    }

    /// Gate bounding concurrent initializations
    #[must_use]
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.inner.gate
    }

    /// Creation jobs waiting in the queue
    #[must_use]
    pub fn pending_creations(&self) -> usize {
        self.inner.queue.pending()
    }

    pub(super) fn streamer_context(&self) -> StreamerContext {
        let config = &self.inner.config;
        StreamerContext {
            executor: Arc::clone(&self.inner.executor),
            store: Arc::clone(&self.inner.store),
            events: self.inner.events.clone(),
            capture_lines: config.capture_lines,
            max_buffer_size: config.max_buffer_size,
            poll_base: config.output_poll_base(),
            poll_jitter: config.output_poll_jitter(),
        }
    }
}
