use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::observability::metrics::Metrics;
use crate::registry::ConnectionRegistry;
use crate::store::{DispatchStore, InMemoryStore};

/// Shared application state. The registry and store are plain injectable
/// services so tests can drive dispatch with fake channels and short timeouts.
pub struct AppState {
    pub store: Arc<dyn DispatchStore>,
    pub registry: ConnectionRegistry,
    pub dispatch: DispatchConfig,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(dispatch: DispatchConfig) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            registry: ConnectionRegistry::new(),
            dispatch,
            metrics: Metrics::new(),
        }
    }

    pub fn with_store(store: Arc<dyn DispatchStore>, dispatch: DispatchConfig) -> Self {
        Self {
            store,
            registry: ConnectionRegistry::new(),
            dispatch,
            metrics: Metrics::new(),
        }
    }
}
