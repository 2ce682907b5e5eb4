//! Read-only facade over the record store.

use bulk_ingest_core::record::Record;
use bulk_ingest_core::record_store::RecordStore;
use std::sync::Arc;
use uuid::Uuid;

/// Synchronous reads against the store's current state.
#[derive(Clone)]
pub struct RecordQuery {
    store: Arc<dyn RecordStore>,
}

impl RecordQuery {
    /// Create a facade over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Every stored record.
    #[must_use]
    pub fn get_all(&self) -> Vec<Record> {
        self.store.find_all()
    }

    /// The record with `id`, if stored.
    #[must_use]
    pub fn get_by_id(&self, id: Uuid) -> Option<Record> {
        self.store.find_by_id(id)
    }

    /// The record the email index currently points at.
    #[must_use]
    pub fn get_by_email(&self, email: &str) -> Option<Record> {
        self.store.find_by_email(email)
    }
}
