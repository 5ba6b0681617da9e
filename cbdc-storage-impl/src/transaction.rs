use crate::storage_traits::{
    range_is_empty, validate_key, StateEntry, StateIterator, WorldState,
};
use cbdc_core::error::StoreError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::ops::Bound;

/// A single pending write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Store these bytes under the key
    Put(Vec<u8>),
    /// Remove the key
    Delete,
}

/// The ordered set of writes a transaction proposes.
///
/// Only the last write to a key is kept. Entries are ordered by key, so two
/// replicas that executed the same transaction over the same state hold
/// identical write-sets and identical digests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSet {
    writes: BTreeMap<String, WriteOp>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.writes.insert(key.into(), WriteOp::Put(value));
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.writes.insert(key.into(), WriteOp::Delete);
    }

    /// Get the pending write for a key, if any
    pub fn get(&self, key: &str) -> Option<&WriteOp> {
        self.writes.get(key)
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Iterate over the writes in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &WriteOp)> {
        self.writes.iter()
    }

    /// Iterate over the writes whose keys fall in `[start_key, end_key)`
    pub fn range<'a>(
        &'a self,
        start_key: &'a str,
        end_key: &'a str,
    ) -> Box<dyn Iterator<Item = (&'a String, &'a WriteOp)> + 'a> {
        if range_is_empty(start_key, end_key) {
            return Box::new(std::iter::empty());
        }
        let upper = if end_key.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(end_key)
        };
        Box::new(
            self.writes
                .range::<str, _>((Bound::Included(start_key), upper)),
        )
    }

    /// SHA-256 over the ordered writes.
    ///
    /// Each entry contributes the key length and bytes, a tag byte (0 for a
    /// put, 1 for a delete) and, for puts, the value length and bytes. Lengths
    /// are little-endian u64.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for (key, op) in &self.writes {
            hasher.update((key.len() as u64).to_le_bytes());
            hasher.update(key.as_bytes());
            match op {
                WriteOp::Put(value) => {
                    hasher.update([0u8]);
                    hasher.update((value.len() as u64).to_le_bytes());
                    hasher.update(value);
                }
                WriteOp::Delete => hasher.update([1u8]),
            }
        }
        hasher.finalize().into()
    }

    /// Hex form of [`WriteSet::digest`]
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest())
    }
}

/// World state as seen from inside one transaction.
///
/// Reads see the committed base state overlaid with the transaction's own
/// pending writes. Writes never reach the base; they accumulate in a
/// [`WriteSet`] that the caller commits or discards once the transaction ends.
pub struct TransactionContext<'a> {
    base: &'a dyn WorldState,
    writes: RefCell<WriteSet>,
}

impl<'a> TransactionContext<'a> {
    pub fn new(base: &'a dyn WorldState) -> Self {
        Self {
            base,
            writes: RefCell::new(WriteSet::new()),
        }
    }

    /// Number of pending writes
    pub fn pending(&self) -> usize {
        self.writes.borrow().len()
    }

    /// Finish the transaction and hand back its write-set
    pub fn into_write_set(self) -> WriteSet {
        self.writes.into_inner()
    }
}

impl WorldState for TransactionContext<'_> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.writes.borrow().get(key) {
            Some(WriteOp::Put(value)) => return Ok(Some(value.clone())),
            Some(WriteOp::Delete) => return Ok(None),
            None => {}
        }
        self.base.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        validate_key(key)?;
        self.writes.borrow_mut().put(key, value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        if self.get(key)?.is_none() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        self.writes.borrow_mut().delete(key);
        Ok(())
    }

    fn range_scan(&self, start_key: &str, end_key: &str) -> Box<dyn StateIterator + '_> {
        let overlay: Vec<(String, WriteOp)> = self
            .writes
            .borrow()
            .range(start_key, end_key)
            .map(|(key, op)| (key.clone(), op.clone()))
            .collect();

        Box::new(MergedStateIterator {
            base: self.base.range_scan(start_key, end_key).peekable(),
            overlay: overlay.into_iter().peekable(),
        })
    }

    fn apply(&self, write_set: &WriteSet) -> Result<(), StoreError> {
        let mut writes = self.writes.borrow_mut();
        for (key, op) in write_set.iter() {
            match op {
                WriteOp::Put(value) => writes.put(key.clone(), value.clone()),
                WriteOp::Delete => writes.delete(key.clone()),
            }
        }
        Ok(())
    }
}

enum MergeStep {
    Base,
    Overlay,
    Shadowed,
}

/// Merges a base scan with pending writes, both in key order
struct MergedStateIterator<'a> {
    base: Peekable<Box<dyn StateIterator + 'a>>,
    overlay: Peekable<std::vec::IntoIter<(String, WriteOp)>>,
}

impl Iterator for MergedStateIterator<'_> {
    type Item = Result<StateEntry, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let step = match (self.base.peek(), self.overlay.peek()) {
                (None, None) => return None,
                (Some(Err(_)), _) | (Some(Ok(_)), None) => MergeStep::Base,
                (None, Some(_)) => MergeStep::Overlay,
                (Some(Ok((base_key, _))), Some((overlay_key, _))) => {
                    match base_key.cmp(overlay_key) {
                        Ordering::Less => MergeStep::Base,
                        Ordering::Equal => MergeStep::Shadowed,
                        Ordering::Greater => MergeStep::Overlay,
                    }
                }
            };

            match step {
                MergeStep::Base => return self.base.next(),
                MergeStep::Shadowed => {
                    self.base.next();
                }
                MergeStep::Overlay => {}
            }

            if let Some((key, WriteOp::Put(value))) = self.overlay.next() {
                return Some(Ok((key, value)));
            }
        }
    }
}
