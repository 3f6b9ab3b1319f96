//! Runtime adapter selection and caching

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::executor::SessionCommandExecutor;
use crate::types::RuntimeType;

use super::adapter::{CliRuntimeAdapter, RuntimeAdapter};

/// Selects a cached adapter per runtime type
///
/// Unknown or missing runtime names resolve to the configured default
/// instead of failing.
pub struct RuntimeAdapterFactory {
    executor: Arc<dyn SessionCommandExecutor>,
    default_runtime: RuntimeType,
    adapters: Mutex<HashMap<RuntimeType, Arc<dyn RuntimeAdapter>>>,
}

impl RuntimeAdapterFactory {
    /// Create a factory that builds the built-in adapters on demand
    #[must_use]
    pub fn new(executor: Arc<dyn SessionCommandExecutor>, default_runtime: RuntimeType) -> Self {
        Self {
            executor,
            default_runtime,
            adapters: Mutex::new(HashMap::new()),
        }
    }

    /// Runtime used when a request names none or an unknown one
    #[must_use]
    pub const fn default_runtime(&self) -> RuntimeType {
        self.default_runtime
    }

    /// Resolve an optional wire name to a supported runtime
    #[must_use]
    pub fn resolve(&self, runtime: Option<&str>) -> RuntimeType {
        match runtime {
            Some(name) if !name.trim().is_empty() => {
                RuntimeType::parse_or(name, self.default_runtime)
            }
            _ => self.default_runtime,
        }
    }

    /// Adapter for an optional wire name
    #[must_use]
    pub fn adapter(&self, runtime: Option<&str>) -> Arc<dyn RuntimeAdapter> {
        self.adapter_for(self.resolve(runtime))
    }

    /// Cached adapter for `runtime`, built on first use
    #[must_use]
    pub fn adapter_for(&self, runtime: RuntimeType) -> Arc<dyn RuntimeAdapter> {
        let mut adapters = self.adapters.lock();
        Arc::clone(adapters.entry(runtime).or_insert_with(|| {
            Arc::new(CliRuntimeAdapter::for_runtime(
                runtime,
                Arc::clone(&self.executor),
            ))
        }))
    }

    /// Replace the adapter used for its runtime type
    pub fn register(&self, adapter: Arc<dyn RuntimeAdapter>) {
        self.adapters.lock().insert(adapter.runtime_type(), adapter);
    }
}
