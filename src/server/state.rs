//! Application state management.

use std::sync::Arc;

use crate::cache::Coordinator;
use crate::store::FsStore;

use super::config::Config;

/// Shared application state: the process-wide coordinator.
#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<Coordinator<FsStore>>,
}

impl AppState {
    /// Create the coordinator for this process from configuration.
    pub fn from_config(config: &Config, run_id: impl Into<String>) -> Self {
        let store = FsStore::new(&config.storage.base_path);
        let coordinator = Coordinator::builder(store).run_id(run_id).build();
        Self::new(coordinator)
    }

    pub fn new(coordinator: Coordinator<FsStore>) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
        }
    }

    pub fn coordinator(&self) -> &Coordinator<FsStore> {
        &self.coordinator
    }
}
