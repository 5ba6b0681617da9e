use crate::registry::AssetRegistry;
use cbdc_core::error::RegistryError;
use cbdc_core::{Asset, Operation};
use cbdc_storage_impl::storage_traits::WorldState;

/// Proposal time shared by every starter asset (2021-06-01T12:00:00Z)
pub const STARTER_PROPOSAL_TIME_STAMP: i64 = 1622548800;

/// Amount shared by every starter asset
pub const STARTER_AMOUNT: i64 = 1000;

/// The fixed records written by `InitLedger`, in write order
pub fn starter_assets() -> Vec<Asset> {
    ["A", "B", "C", "D"]
        .iter()
        .enumerate()
        .map(|(i, party)| {
            Asset::new(
                format!("init{}", i),
                STARTER_PROPOSAL_TIME_STAMP,
                STARTER_AMOUNT,
                format!("Buyer{}", party),
                "BuyerASignature",
                format!("Merchant{}", party),
            )
        })
        .collect()
}

impl<S: WorldState + ?Sized> AssetRegistry<'_, S> {
    /// Writes the starter assets, overwriting any record already stored under
    /// their ids.
    ///
    /// Writes happen one at a time and are not rolled back here: run inside a
    /// transaction context, a failure discards the whole write-set; run
    /// against a raw store, the records written before the failure remain.
    pub fn init_ledger(&self) -> Result<usize, RegistryError> {
        let assets = starter_assets();
        for asset in &assets {
            self.write(Operation::InitLedger, asset)?;
        }
        log::info!("Seeded ledger with {} starter assets", assets.len());
        Ok(assets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbdc_core::error::StoreError;
    use cbdc_storage_impl::memory::MemoryWorldState;
    use cbdc_storage_impl::storage_traits::StateIterator;
    use cbdc_storage_impl::transaction::TransactionContext;

    /// World state that refuses writes to one key
    struct FlakyState<S: WorldState> {
        inner: S,
        fail_on: &'static str,
    }

    impl<S: WorldState> WorldState for FlakyState<S> {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
            if key == self.fail_on {
                return Err(StoreError::Other(format!("injected failure on {}", key)));
            }
            self.inner.put(key, value)
        }

        fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.inner.delete(key)
        }

        fn range_scan(&self, start_key: &str, end_key: &str) -> Box<dyn StateIterator + '_> {
            self.inner.range_scan(start_key, end_key)
        }
    }

    #[test]
    fn test_starter_assets() {
        let assets = starter_assets();
        let ids: Vec<&str> = assets.iter().map(|asset| asset.id()).collect();
        assert_eq!(ids, vec!["init0", "init1", "init2", "init3"]);

        assert_eq!(assets[3].buyer, "BuyerD");
        assert_eq!(assets[3].merchant, "MerchantD");
        for asset in &assets {
            assert_eq!(asset.proposal_time_stamp, STARTER_PROPOSAL_TIME_STAMP);
            assert_eq!(asset.amount, STARTER_AMOUNT);
            assert_eq!(asset.buyer_sig, "BuyerASignature");
            assert_eq!(asset.merchant_sig, "");
            assert!(!asset.trade_success);
        }
    }

    #[test]
    fn test_init_ledger_writes_starter_assets() {
        let state = MemoryWorldState::new();
        let registry = AssetRegistry::new(&state);

        assert_eq!(registry.init_ledger().unwrap(), 4);
        assert_eq!(registry.list_all().unwrap(), starter_assets());
    }

    #[test]
    fn test_init_ledger_overwrites_without_existence_check() {
        let state = MemoryWorldState::new();
        let registry = AssetRegistry::new(&state);
        registry.init_ledger().unwrap();
        registry.update_trade_success("init1", true).unwrap();

        registry.init_ledger().unwrap();
        assert!(!registry.read_asset("init1").unwrap().trade_success);
        assert_eq!(state.len().unwrap(), 4);
    }

    #[test]
    fn test_partial_failure_against_raw_store_keeps_earlier_writes() {
        let base = MemoryWorldState::new();
        let flaky = FlakyState {
            inner: &base,
            fail_on: "init2",
        };

        let err = AssetRegistry::new(&flaky).init_ledger().unwrap_err();
        assert_eq!(err.operation(), Operation::InitLedger);
        assert_eq!(err.asset_id(), "init2");

        let keys: Vec<String> = base.snapshot().unwrap().into_keys().collect();
        assert_eq!(keys, vec!["init0", "init1"]);
    }

    #[test]
    fn test_failure_inside_transaction_discards_everything() {
        let base = MemoryWorldState::new();
        let ctx = TransactionContext::new(&base);
        let flaky = FlakyState {
            inner: &ctx,
            fail_on: "init2",
        };

        assert!(AssetRegistry::new(&flaky).init_ledger().is_err());
        assert_eq!(ctx.pending(), 2);

        // The failed transaction's write-set is never applied
        drop(flaky);
        drop(ctx);
        assert!(base.is_empty().unwrap());
    }
}
