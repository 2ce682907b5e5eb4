//! In-memory record store.
//!
//! Two independently locked maps: the primary map owns records, the email
//! index holds back-references into it. Each lock is held for a single-key
//! operation only, so `save` is two atomic puts, never a transaction.

use bulk_ingest_core::record::Record;
use bulk_ingest_core::record_store::RecordStore;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// `HashMap`-backed [`RecordStore`] shared across concurrent workers.
///
/// # Example
///
/// ```
/// use bulk_ingest_core::record::{RecordSchema, Row};
/// use bulk_ingest_core::record_store::RecordStore;
/// use bulk_ingest_runtime::record_store::InMemoryRecordStore;
/// use chrono::Utc;
///
/// let store = InMemoryRecordStore::new();
/// let row = Row::from_pairs(["firstName", "lastName", "email"], ["Ada", "L", "ada@example.com"]);
/// let record = RecordSchema::Minimal.validate(&row, Utc::now()).unwrap();
/// let id = record.id();
///
/// store.save(record);
/// assert_eq!(store.find_by_email("ada@example.com").map(|r| r.id()), Some(id));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<Uuid, Record>>,
    email_index: RwLock<HashMap<String, Uuid>>,
}

// A panicking writer cannot leave a single-key insert half done, so the map
// behind a poisoned lock is still consistent.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.records).len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.records).is_empty()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn save(&self, record: Record) {
        let id = record.id();
        let email = record.email().to_string();

        write(&self.records).insert(id, record);
        write(&self.email_index).insert(email, id);
    }

    fn find_all(&self) -> Vec<Record> {
        let mut records: Vec<Record> = read(&self.records).values().cloned().collect();
        records.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        records
    }

    fn find_by_id(&self, id: Uuid) -> Option<Record> {
        read(&self.records).get(&id).cloned()
    }

    fn find_by_email(&self, email: &str) -> Option<Record> {
        let id = read(&self.email_index).get(email).copied()?;
        self.find_by_id(id)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use bulk_ingest_core::record::{RecordSchema, Row};
    use chrono::Utc;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn record(first: &str, email: &str) -> Record {
        let row = Row::zip(&["firstName", "lastName", "email"], &[first, "Doe", email]);
        RecordSchema::Minimal.validate(&row, Utc::now()).unwrap()
    }

    #[test]
    fn saves_and_finds_by_id_and_email() {
        let store = InMemoryRecordStore::new();
        let john = record("John", "john@example.com");
        let id = john.id();

        store.save(john.clone());

        assert_eq!(store.find_by_id(id), Some(john.clone()));
        assert_eq!(store.find_by_email("john@example.com"), Some(john));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_keys_are_absent() {
        let store = InMemoryRecordStore::new();
        assert!(store.is_empty());
        assert!(store.find_by_id(Uuid::new_v4()).is_none());
        assert!(store.find_by_email("nobody@example.com").is_none());
    }

    #[test]
    fn later_save_wins_the_email_index() {
        let store = InMemoryRecordStore::new();
        let first = record("First", "shared@example.com");
        let second = record("Second", "shared@example.com");

        store.save(first.clone());
        store.save(second.clone());

        assert_eq!(store.find_by_email("shared@example.com").map(|r| r.id()), Some(second.id()));
        assert_eq!(store.find_by_id(first.id()), Some(first));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn dangling_index_entry_resolves_to_none() {
        let store = InMemoryRecordStore::new();
        write(&store.email_index).insert("ghost@example.com".to_string(), Uuid::new_v4());

        assert!(store.find_by_email("ghost@example.com").is_none());
    }

    #[test]
    fn find_all_is_a_snapshot() {
        let store = InMemoryRecordStore::new();
        store.save(record("A", "a@example.com"));

        let snapshot = store.find_all();
        store.save(record("B", "b@example.com"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.find_all().len(), 2);
    }

    #[test]
    fn save_all_applies_each() {
        let store = InMemoryRecordStore::new();
        store.save_all(vec![record("A", "a@example.com"), record("B", "b@example.com")]);

        assert_eq!(store.len(), 2);
        assert!(store.find_by_email("b@example.com").is_some());
    }

    #[test]
    fn concurrent_saves_keep_every_record() {
        let store = Arc::new(InMemoryRecordStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.save(record("T", &format!("user{t}-{i}@example.com")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 400);
        assert!(store.find_by_email("user7-49@example.com").is_some());
    }

    proptest! {
        #[test]
        fn index_points_at_last_saved_record_per_email(
            emails in proptest::collection::vec(0u8..6, 1..40)
        ) {
            let store = InMemoryRecordStore::new();
            let mut last_for_email: HashMap<String, Uuid> = HashMap::new();

            for n in &emails {
                let email = format!("user{n}@example.com");
                let r = record("P", &email);
                last_for_email.insert(email, r.id());
                store.save(r);
            }

            prop_assert_eq!(store.len(), emails.len());
            for (email, id) in &last_for_email {
                let found = store.find_by_email(email).map(|r| r.id());
                prop_assert_eq!(found, Some(*id));
            }
        }
    }
}
