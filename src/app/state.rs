//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::store::InventoryStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: InventoryStore,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Initialize the inventory store over the configured data directory
        let store = InventoryStore::new(config.data_dir.clone(), config.branches.clone());

        Self { config, store }
    }
}
