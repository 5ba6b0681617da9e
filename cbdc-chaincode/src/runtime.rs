use crate::contract::{AssetContract, ContractError};
use cbdc_core::error::StoreError;
use cbdc_storage_impl::storage_traits::{WorldState, WriteSetJournal};
use cbdc_storage_impl::transaction::{TransactionContext, WriteSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named call with string arguments, as submitted by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Identifier the committed write-set is journaled under
    pub tx_id: String,
    pub function: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, T>(tx_id: impl Into<String>, function: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tx_id: tx_id.into(),
            function: function.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Outcome of executing an invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_id: String,
    pub function: String,

    /// Bytes returned by the contract
    pub payload: Vec<u8>,

    /// Writes the invocation proposes (or committed, after a submit)
    pub write_set: WriteSet,
}

/// Errors from executing or committing an invocation
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("failed to commit transaction {tx_id}: {source}")]
    Commit {
        tx_id: String,
        #[source]
        source: StoreError,
    },
}

/// Executes invocations against a world state one at a time.
///
/// Each invocation runs inside its own [`TransactionContext`], so a failing
/// invocation leaves the world state exactly as it found it.
pub struct LocalRuntime<S: WorldState> {
    state: S,
    journal: Option<Box<dyn WriteSetJournal>>,
}

impl<S: WorldState> LocalRuntime<S> {
    pub fn new(state: S) -> Self {
        Self {
            state,
            journal: None,
        }
    }

    /// Journal every write-set before it is applied.
    ///
    /// An entry whose write-set then fails to apply is discarded again.
    pub fn with_journal(mut self, journal: Box<dyn WriteSetJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// The committed world state
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Executes `invocation` without committing anything
    pub fn simulate(&self, invocation: &Invocation) -> Result<TransactionReceipt, ContractError> {
        let ctx = TransactionContext::new(&self.state);
        let payload = AssetContract::invoke(&ctx, &invocation.function, &invocation.args)?;

        Ok(TransactionReceipt {
            tx_id: invocation.tx_id.clone(),
            function: invocation.function.clone(),
            payload,
            write_set: ctx.into_write_set(),
        })
    }

    /// Executes `invocation` and commits its write-set
    pub fn submit(&self, invocation: &Invocation) -> Result<TransactionReceipt, RuntimeError> {
        let receipt = self.simulate(invocation)?;
        if receipt.write_set.is_empty() {
            return Ok(receipt);
        }

        let commit_error = |source| RuntimeError::Commit {
            tx_id: receipt.tx_id.clone(),
            source,
        };

        let journaled = match &self.journal {
            Some(journal) => Some((
                journal,
                journal
                    .record(&receipt.tx_id, &receipt.write_set)
                    .map_err(commit_error)?,
            )),
            None => None,
        };

        if let Err(source) = self.state.apply(&receipt.write_set) {
            // A write-set that never reached the state must not be replayed
            if let Some((journal, sequence)) = journaled {
                if let Err(e) = journal.discard_last(sequence) {
                    log::error!(
                        "Failed to discard journal entry {} for {}: {}",
                        sequence,
                        receipt.tx_id,
                        e
                    );
                }
            }
            return Err(commit_error(source));
        }

        log::info!(
            "Committed {} ({}): {} writes, digest {}",
            receipt.tx_id,
            receipt.function,
            receipt.write_set.len(),
            receipt.write_set.digest_hex()
        );
        Ok(receipt)
    }
}
