//! CBDC asset chaincode
//!
//! This crate re-exports all the components of the chaincode.

pub use cbdc_chaincode::*;
pub use cbdc_core::*;
pub use cbdc_storage_impl::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_exposes_a_working_runtime() {
        let runtime = LocalRuntime::new(MemoryWorldState::new());
        runtime
            .submit(&Invocation::new("tx1", "InitLedger", Vec::<String>::new()))
            .unwrap();

        let receipt = runtime
            .simulate(&Invocation::new("tx2", "ReadAsset", ["init3"]))
            .unwrap();
        let asset: Asset = codec::decode(&receipt.payload).unwrap();
        assert_eq!(asset.buyer, "BuyerD");
        assert_eq!(asset.merchant, "MerchantD");
    }
}
