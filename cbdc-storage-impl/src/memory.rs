use crate::storage_traits::{
    key_in_range, range_is_empty, validate_key, StateEntry, StateIterator, WorldState,
};
use crate::transaction::{WriteOp, WriteSet};
use cbdc_core::error::StoreError;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory world state backed by an ordered map.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorldState {
    entries: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryWorldState {
    /// Create an empty world state
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.is_empty())
    }

    /// Copy of every stored entry, in key order
    pub fn snapshot(&self) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Vec<u8>>>, StoreError> {
        self.entries
            .lock()
            .map_err(|e| StoreError::Other(format!("Failed to acquire lock: {}", e)))
    }
}

impl WorldState for MemoryWorldState {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        validate_key(key)?;
        self.lock()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.lock()?.remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    fn range_scan(&self, start_key: &str, end_key: &str) -> Box<dyn StateIterator + '_> {
        if range_is_empty(start_key, end_key) {
            return Box::new(std::iter::empty());
        }

        let entries = match self.lock() {
            Ok(entries) => entries,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };

        // Snapshot the range so the lock is not held while the caller iterates
        let snapshot: Vec<StateEntry> = entries
            .range(start_key.to_string()..)
            .take_while(|(key, _)| key_in_range(key, start_key, end_key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Box::new(MemoryStateIterator {
            entries: snapshot.into_iter(),
        })
    }

    fn apply(&self, write_set: &WriteSet) -> Result<(), StoreError> {
        for (key, _) in write_set.iter() {
            validate_key(key)?;
        }

        let mut entries = self.lock()?;
        for (key, op) in write_set.iter() {
            match op {
                WriteOp::Put(value) => {
                    entries.insert(key.clone(), value.clone());
                }
                WriteOp::Delete => {
                    entries.remove(key);
                }
            }
        }
        Ok(())
    }
}

/// Iterator over a snapshot of in-memory entries
pub struct MemoryStateIterator {
    entries: std::vec::IntoIter<StateEntry>,
}

impl Iterator for MemoryStateIterator {
    type Item = Result<StateEntry, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_storage_operations() {
        let state = MemoryWorldState::new();

        state.put("asset1", b"value").unwrap();
        assert_eq!(state.get("asset1").unwrap(), Some(b"value".to_vec()));
        assert_eq!(state.get("asset2").unwrap(), None);

        state.put("asset1", b"other").unwrap();
        assert_eq!(state.get("asset1").unwrap(), Some(b"other".to_vec()));

        state.delete("asset1").unwrap();
        assert_eq!(state.get("asset1").unwrap(), None);
        assert!(matches!(state.delete("asset1"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_empty_key_rejected() {
        let state = MemoryWorldState::new();
        assert!(state.put("", b"value").is_err());
        assert!(state.is_empty().unwrap());
    }

    #[test]
    fn test_scan_operations() {
        let state = MemoryWorldState::new();
        for key in ["b", "a", "d", "c"] {
            state.put(key, key.as_bytes()).unwrap();
        }

        let all: Vec<String> = state
            .range_scan("", "")
            .map(|entry| entry.unwrap().0)
            .collect();
        assert_eq!(all, vec!["a", "b", "c", "d"]);

        let window: Vec<StateEntry> = state
            .range_scan("b", "d")
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(
            window,
            vec![
                ("b".to_string(), b"b".to_vec()),
                ("c".to_string(), b"c".to_vec())
            ]
        );

        assert_eq!(state.range_scan("d", "a").count(), 0);
    }

    #[test]
    fn test_scan_orders_by_key_bytes() {
        let state = MemoryWorldState::new();
        for key in ["asset10", "asset2", "Asset1", "asset1"] {
            state.put(key, b"").unwrap();
        }

        let all: Vec<String> = state
            .range_scan("", "")
            .map(|entry| entry.unwrap().0)
            .collect();
        assert_eq!(all, vec!["Asset1", "asset1", "asset10", "asset2"]);
    }

    #[test]
    fn test_poisoned_lock_is_an_error() {
        let state = MemoryWorldState::new();
        state.put("k", b"v").unwrap();

        let shared = state.clone();
        let _ = std::thread::spawn(move || {
            let _guard = shared.entries.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(matches!(state.len(), Err(StoreError::Other(_))));
        assert!(matches!(state.is_empty(), Err(StoreError::Other(_))));
        assert!(matches!(state.get("k"), Err(StoreError::Other(_))));
    }

    #[test]
    fn test_clones_share_state() {
        let state = MemoryWorldState::new();
        let other = state.clone();
        state.put("k", b"v").unwrap();
        assert_eq!(other.get("k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(other.len().unwrap(), 1);
    }
}
