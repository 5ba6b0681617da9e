pub mod memory;
pub mod storage_traits;
pub mod transaction;
pub mod wal;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "rocksdb")]
pub mod rocksdb;

// Re-export the main types for convenience
pub use storage_traits::{
    JournalEntry, StateEntry, StateIterator, WorldState, WriteSetJournal,
};
pub use transaction::{TransactionContext, WriteOp, WriteSet};

pub use memory::MemoryWorldState;
pub use wal::FileWriteAheadLog;

// Re-export the storage implementations
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteWorldState;

#[cfg(feature = "rocksdb")]
pub use crate::rocksdb::RocksDbWorldState;
