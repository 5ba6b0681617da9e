pub mod contract;
pub mod registry;
pub mod runtime;
pub mod seeder;

// Re-export the main types for convenience
pub use contract::{parse_bool, parse_i64, AssetContract, ContractError};
pub use registry::{AssetIterator, AssetRegistry};
pub use runtime::{Invocation, LocalRuntime, RuntimeError, TransactionReceipt};
pub use seeder::{starter_assets, STARTER_AMOUNT, STARTER_PROPOSAL_TIME_STAMP};
