use std::sync::Arc;
use std::time::Instant;

use crate::db::{MemoryStore, SiteStore};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SiteStore>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn SiteStore>) -> Self {
        Self {
            store,
            started_at: Instant::now(),
        }
    }

    /// State over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
