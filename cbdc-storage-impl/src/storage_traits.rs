use crate::transaction::{WriteOp, WriteSet};
use cbdc_core::error::StoreError;
use std::iter::Iterator;
use std::path::Path;

/// A key and its stored bytes, as yielded by range scans
pub type StateEntry = (String, Vec<u8>);

/// Iterator for traversing world-state entries in ascending key order
pub trait StateIterator: Iterator<Item = Result<StateEntry, StoreError>> {}

impl<T> StateIterator for T where T: Iterator<Item = Result<StateEntry, StoreError>> {}

/// The ordered key-value space the ledger maintains.
///
/// Implementations are supplied by the host; the registry only consumes them.
/// Keys compare by their UTF-8 bytes.
pub trait WorldState {
    /// Get the bytes stored under a key
    ///
    /// # Returns
    /// Some(bytes) if the key is present, None otherwise
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store bytes under a key, replacing any previous value
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Remove a key
    ///
    /// # Returns
    /// `StoreError::NotFound` if the key is absent
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Scan the keys in `[start_key, end_key)`.
    ///
    /// An empty `start_key` or `end_key` leaves that side unbounded, so
    /// `range_scan("", "")` walks the whole keyspace. Entries come back in
    /// ascending key order; a backend failure is yielded as an `Err` item.
    fn range_scan(&self, start_key: &str, end_key: &str) -> Box<dyn StateIterator + '_>;

    /// Apply a write-set produced by a transaction.
    ///
    /// The default implementation applies entries one at a time in key order
    /// and stops at the first failure. Backends with native batches override
    /// it so the whole write-set lands or none of it does.
    fn apply(&self, write_set: &WriteSet) -> Result<(), StoreError> {
        for (key, op) in write_set.iter() {
            match op {
                WriteOp::Put(value) => self.put(key, value)?,
                WriteOp::Delete => match self.delete(key) {
                    // A committed delete of an already-absent key is a no-op
                    Ok(()) | Err(StoreError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                },
            }
        }
        Ok(())
    }
}

impl<T: WorldState + ?Sized> WorldState for &T {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn range_scan(&self, start_key: &str, end_key: &str) -> Box<dyn StateIterator + '_> {
        (**self).range_scan(start_key, end_key)
    }

    fn apply(&self, write_set: &WriteSet) -> Result<(), StoreError> {
        (**self).apply(write_set)
    }
}

/// Append-only journal of committed write-sets
pub trait WriteSetJournal {
    /// Open (or create) the journal file
    fn init(&self, path: &Path) -> Result<(), StoreError>;

    /// Append a committed write-set
    ///
    /// # Returns
    /// The sequence number assigned to the entry
    fn record(&self, tx_id: &str, write_set: &WriteSet) -> Result<u64, StoreError>;

    /// Remove the most recent entry, which must carry `sequence`.
    ///
    /// Used when a journaled write-set could not be applied, so replay never
    /// resurrects a transaction that did not commit.
    fn discard_last(&self, sequence: u64) -> Result<(), StoreError>;

    /// Get an iterator over all journal entries in commit order
    fn iterate_entries(&self) -> Box<dyn Iterator<Item = Result<JournalEntry, StoreError>> + '_>;

    /// Re-apply every journaled write-set to `state`, in commit order
    ///
    /// # Returns
    /// The number of entries applied
    fn replay(&self, state: &dyn WorldState) -> Result<usize, StoreError> {
        let mut applied = 0;
        for entry in self.iterate_entries() {
            let entry = entry?;
            state.apply(&entry.write_set)?;
            applied += 1;
        }
        log::info!("Replayed {} journaled write-sets", applied);
        Ok(applied)
    }
}

/// One committed transaction as recorded in the journal
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JournalEntry {
    /// Position of the entry in the journal, starting at 0
    pub sequence: u64,

    /// Identifier of the transaction that produced the write-set
    pub tx_id: String,

    pub write_set: WriteSet,
}

/// Reject keys the ledger cannot store
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::Other("key must not be an empty string".to_string()));
    }
    Ok(())
}

/// Whether `key` falls inside the half-open scan range `[start_key, end_key)`
pub fn key_in_range(key: &str, start_key: &str, end_key: &str) -> bool {
    key >= start_key && (end_key.is_empty() || key < end_key)
}

/// Whether `[start_key, end_key)` can contain any key at all
pub fn range_is_empty(start_key: &str, end_key: &str) -> bool {
    !end_key.is_empty() && start_key >= end_key
}
