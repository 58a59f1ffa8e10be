pub mod rest;

use crate::config::Config;
use crate::storage::{ObjectStore, StorageMutator};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Path-safe mutator over the injected object store
    pub mutator: Arc<StorageMutator>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn ObjectStore>, config: Config) -> Self {
        Self {
            mutator: Arc::new(StorageMutator::new(store, config.batch.clone())),
            config,
        }
    }
}
