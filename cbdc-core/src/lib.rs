pub mod asset;
pub mod codec;
pub mod error;
pub mod operation;

// Re-export the main types for convenience
pub use asset::{Asset, AssetUpdate};
pub use error::{CodecError, RegistryError, StoreError};
pub use operation::{Operation, UnknownOperation};
