use crate::operation::Operation;
use std::io;
use thiserror::Error;

/// Represents all possible errors raised by a world-state backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO errors that occur when reading/writing files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors that occur with the underlying storage backend
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization/deserialization errors of backend-owned data
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A primitive operation targeted a key that is not present
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Errors that occur while appending to or reading the write-set journal
    #[error("Journal error: {0}")]
    Journal(String),

    /// Generic errors that don't fit in other categories
    #[error("Other error: {0}")]
    Other(String),

    /// Anyhow error wrapper for error context
    #[error(transparent)]
    Context(#[from] anyhow::Error),
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[cfg(feature = "rocksdb")]
impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("Row not found".to_string()),
            _ => StoreError::Database(err.to_string()),
        }
    }
}

impl From<String> for StoreError {
    fn from(err: String) -> Self {
        StoreError::Other(err)
    }
}

impl From<&str> for StoreError {
    fn from(err: &str) -> Self {
        StoreError::Other(err.to_string())
    }
}

/// Failure to move an asset between its in-memory and persisted forms
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("failed to encode asset: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("malformed asset record: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Errors surfaced by registry operations.
///
/// Every variant names the operation that failed and the asset it targeted, so
/// the message handed back to the remote caller is self-describing.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{operation}: the asset {id} does not exist")]
    NotFound { operation: Operation, id: String },

    #[error("{operation}: the asset {id} already exists")]
    AlreadyExists { operation: Operation, id: String },

    #[error("{operation}: failed to decode asset {id}: {source}")]
    Decode {
        operation: Operation,
        id: String,
        #[source]
        source: CodecError,
    },

    #[error("{operation}: failed to access world state for asset {id}: {source}")]
    Store {
        operation: Operation,
        id: String,
        #[source]
        source: StoreError,
    },
}

impl RegistryError {
    /// The operation that produced this error
    pub fn operation(&self) -> Operation {
        match self {
            RegistryError::NotFound { operation, .. }
            | RegistryError::AlreadyExists { operation, .. }
            | RegistryError::Decode { operation, .. }
            | RegistryError::Store { operation, .. } => *operation,
        }
    }

    /// The asset id the failing operation targeted
    pub fn asset_id(&self) -> &str {
        match self {
            RegistryError::NotFound { id, .. }
            | RegistryError::AlreadyExists { id, .. }
            | RegistryError::Decode { id, .. }
            | RegistryError::Store { id, .. } => id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, RegistryError::AlreadyExists { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_names_operation_and_asset() {
        let err = RegistryError::NotFound {
            operation: Operation::ReadAsset,
            id: "asset1".to_string(),
        };
        assert_eq!(err.to_string(), "ReadAsset: the asset asset1 does not exist");
        assert_eq!(err.operation(), Operation::ReadAsset);
        assert_eq!(err.asset_id(), "asset1");
        assert!(err.is_not_found());
        assert!(!err.is_already_exists());
    }

    #[test]
    fn test_store_error_conversions() {
        let err: StoreError = "disk on fire".into();
        assert!(matches!(err, StoreError::Other(ref msg) if msg == "disk on fire"));

        let io_err = io::Error::new(io::ErrorKind::Other, "boom");
        let err: StoreError = io_err.into();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
