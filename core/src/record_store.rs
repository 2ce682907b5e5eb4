//! Storage contract for validated records.
//!
//! A record store is a primary map (`id → record`) plus a secondary index
//! (`email → id`). The index holds back-references only; the primary map owns
//! the records.
//!
//! # Consistency
//!
//! `save` performs two single-key writes, primary entry first, then index
//! entry. They are not linked by a transaction:
//!
//! - Two records sharing an email: the later save wins the index; both stay
//!   retrievable by id.
//! - A reader may briefly see a record by id before it is reachable by email.
//! - An index entry pointing at an id the primary map lacks resolves to
//!   `None` rather than failing.

use crate::record::Record;
use uuid::Uuid;

/// Concurrent store of validated records.
///
/// All operations are synchronous single-key map operations; implementations
/// must be safe to share across concurrently running workers.
pub trait RecordStore: Send + Sync {
    /// Insert or overwrite by id, then point the email index at that id.
    fn save(&self, record: Record);

    /// Point-in-time copy of every stored record.
    fn find_all(&self) -> Vec<Record>;

    /// Look up a record by id.
    fn find_by_id(&self, id: Uuid) -> Option<Record>;

    /// Look up a record through the email index.
    fn find_by_email(&self, email: &str) -> Option<Record>;

    /// Save each record in turn. Not atomic as a whole.
    fn save_all(&self, records: Vec<Record>) {
        for record in records {
            self.save(record);
        }
    }
}
