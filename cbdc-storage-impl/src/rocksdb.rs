#![cfg(feature = "rocksdb")]

use crate::storage_traits::{
    key_in_range, range_is_empty, validate_key, StateEntry, StateIterator, WorldState,
};
use crate::transaction::{WriteOp, WriteSet};
use anyhow::Context;
use cbdc_core::error::StoreError;
use log;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBIteratorWithThreadMode, Direction, IteratorMode,
    Options, WriteBatch, DB,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Column family holding every world-state key
const CF_WORLD_STATE: &str = "world_state";

/// RocksDB-backed world state
pub struct RocksDbWorldState {
    db: Arc<DB>,
    db_path: PathBuf,
}

impl RocksDbWorldState {
    /// Opens (or creates) a RocksDB world state at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();

        // Set up database options
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_world_state = ColumnFamilyDescriptor::new(CF_WORLD_STATE, Options::default());

        let db = DB::open_cf_descriptors(&opts, &db_path, vec![cf_world_state])
            .with_context(|| format!("Failed to open RocksDB database at {:?}", db_path))?;

        log::debug!("Opened RocksDB world state at {:?}", db_path);

        Ok(Self {
            db: Arc::new(db),
            db_path,
        })
    }

    /// Path of the database directory
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn cf(&self) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(CF_WORLD_STATE)
            .ok_or_else(|| StoreError::Database(format!("Missing column family: {}", CF_WORLD_STATE)))
    }
}

impl WorldState for RocksDbWorldState {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let cf = self.cf()?;
        let value = self
            .db
            .get_cf(cf, key.as_bytes())
            .with_context(|| format!("Failed to fetch key: {}", key))?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        validate_key(key)?;
        let cf = self.cf()?;
        self.db
            .put_cf(cf, key.as_bytes(), value)
            .with_context(|| format!("Failed to store key: {}", key))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let cf = self.cf()?;
        if self.db.get_cf(cf, key.as_bytes())?.is_none() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        self.db
            .delete_cf(cf, key.as_bytes())
            .with_context(|| format!("Failed to delete key: {}", key))?;
        Ok(())
    }

    fn range_scan(&self, start_key: &str, end_key: &str) -> Box<dyn StateIterator + '_> {
        if range_is_empty(start_key, end_key) {
            return Box::new(std::iter::empty());
        }

        let cf = match self.cf() {
            Ok(cf) => cf,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };

        let inner = self.db.iterator_cf(
            cf,
            IteratorMode::From(start_key.as_bytes(), Direction::Forward),
        );

        Box::new(RocksDbStateIterator {
            inner,
            start_key: start_key.to_string(),
            end_key: end_key.to_string(),
            done: false,
        })
    }

    fn apply(&self, write_set: &WriteSet) -> Result<(), StoreError> {
        let cf = self.cf()?;
        let mut batch = WriteBatch::default();

        for (key, op) in write_set.iter() {
            validate_key(key)?;
            match op {
                WriteOp::Put(value) => batch.put_cf(cf, key.as_bytes(), value),
                WriteOp::Delete => batch.delete_cf(cf, key.as_bytes()),
            }
        }

        self.db
            .write(batch)
            .with_context(|| format!("Failed to apply write-set of {} entries", write_set.len()))?;
        Ok(())
    }
}

/// Iterator over a key range of the world-state column family
pub struct RocksDbStateIterator<'a> {
    inner: DBIteratorWithThreadMode<'a, DB>,
    start_key: String,
    end_key: String,
    done: bool,
}

impl Iterator for RocksDbStateIterator<'_> {
    type Item = Result<StateEntry, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let (key, value) = match self.inner.next()? {
            Ok(pair) => pair,
            Err(e) => {
                self.done = true;
                return Some(Err(StoreError::from(e)));
            }
        };

        let key = match String::from_utf8(key.into_vec()) {
            Ok(key) => key,
            Err(e) => {
                self.done = true;
                return Some(Err(StoreError::Serialization(format!(
                    "Stored key is not valid UTF-8: {}",
                    e
                ))));
            }
        };

        if !key_in_range(&key, &self.start_key, &self.end_key) {
            self.done = true;
            return None;
        }

        Some(Ok((key, value.into_vec())))
    }
}
