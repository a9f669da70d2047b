//! History of completed downloads
//!
//! The list is a read-only snapshot of what the backend recorded. A refresh
//! replaces it wholesale. Failures are logged and otherwise ignored, keeping
//! whatever list was held before.

use std::sync::{PoisonError, RwLock};

use tracing::{debug, warn};

use crate::client::{Backend, HistoryRecord};

#[derive(Debug, Default)]
pub struct HistoryStore {
    records: RwLock<Vec<HistoryRecord>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, newest first as the backend orders it
    pub fn records(&self) -> Vec<HistoryRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch the full list from the backend. Returns whether the held list was
    /// replaced.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn refresh<B: Backend>(&self, backend: &B) -> bool {
        match backend.history().await {
            Ok(records) => {
                debug!(count = records.len(), "History refreshed");
                *self.records.write().unwrap_or_else(PoisonError::into_inner) = records;
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh download history, keeping previous list");
                false
            }
        }
    }
}
