//! In-memory record store with zeroizing destruction.
//!
//! Volatile by design: nothing touches disk, so a process exit is itself a
//! purge. Destruction zeroes the owned ciphertext buffers before removal —
//! in an ownership language this replaces the multi-pass-overwrite ritual
//! of garbage-collected runtimes outright.

use std::collections::HashMap;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::encoder::SealedEvent;
use crate::error::{LedgerError, Result};

/// Sealed events keyed by event id, each carrying its own expiry.
pub struct RecordStore {
    records: RwLock<HashMap<Uuid, SealedEvent>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, event: SealedEvent) {
        self.records.write().insert(event.event_id, event);
    }

    /// Fetch a record by id.
    ///
    /// A record past its expiry is refused even if the reaper has not yet
    /// swept it away — retrievability ends at `expires_at_ms`, full stop.
    pub fn get(&self, event_id: Uuid, now_ms: u64) -> Result<SealedEvent> {
        let records = self.records.read();
        let record = records.get(&event_id).ok_or(LedgerError::NotFound)?;
        if record.expires_at_ms <= now_ms {
            return Err(LedgerError::NotFound);
        }
        Ok(record.clone())
    }

    /// Destroy every record at or past its expiry. Returns the count.
    pub fn purge_expired(&self, now_ms: u64) -> usize {
        let mut records = self.records.write();
        let expired: Vec<Uuid> = records
            .iter()
            .filter(|(_, record)| record.expires_at_ms <= now_ms)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            if let Some(mut record) = records.remove(id) {
                record.destroy();
            }
        }
        expired.len()
    }

    /// Destroy every record unconditionally. Returns the count.
    pub fn purge_all(&self) -> usize {
        let mut records = self.records.write();
        let count = records.len();
        for (_, mut record) in records.drain() {
            record.destroy();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Epoch;

    fn sealed(expires_at_ms: u64) -> SealedEvent {
        let epoch = Epoch::generate(0, 0).unwrap();
        crate::encoder::seal(
            &epoch,
            Uuid::new_v4(),
            "test",
            &serde_json::json!({"n": 1}),
            0,
            expires_at_ms,
        )
        .unwrap()
    }

    #[test]
    fn insert_then_get() {
        let store = RecordStore::new();
        let event = sealed(10_000);
        let id = event.event_id;
        store.insert(event);
        assert_eq!(store.get(id, 5_000).unwrap().event_id, id);
    }

    #[test]
    fn get_unknown_id_fails() {
        let store = RecordStore::new();
        assert!(matches!(
            store.get(Uuid::new_v4(), 0),
            Err(LedgerError::NotFound)
        ));
    }

    #[test]
    fn expired_record_is_unretrievable_before_any_sweep() {
        let store = RecordStore::new();
        let event = sealed(10_000);
        let id = event.event_id;
        store.insert(event);
        assert!(store.get(id, 9_999).is_ok());
        assert!(store.get(id, 10_000).is_err());
        assert!(store.get(id, 10_001).is_err());
    }

    #[test]
    fn purge_expired_removes_only_expired() {
        let store = RecordStore::new();
        let expiring = sealed(10_000);
        let surviving = sealed(20_000);
        let surviving_id = surviving.event_id;
        store.insert(expiring);
        store.insert(surviving);

        assert_eq!(store.purge_expired(15_000), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(surviving_id, 15_000).is_ok());
    }

    #[test]
    fn purge_expired_on_fresh_records_is_noop() {
        let store = RecordStore::new();
        store.insert(sealed(10_000));
        assert_eq!(store.purge_expired(5_000), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn purge_all_empties_the_store() {
        let store = RecordStore::new();
        store.insert(sealed(10_000));
        store.insert(sealed(20_000));
        assert_eq!(store.purge_all(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn purge_all_twice_is_idempotent() {
        let store = RecordStore::new();
        store.insert(sealed(10_000));
        assert_eq!(store.purge_all(), 1);
        assert_eq!(store.purge_all(), 0);
    }
}
