use crate::registry::AssetRegistry;
use cbdc_core::codec;
use cbdc_core::error::{CodecError, RegistryError};
use cbdc_core::{AssetUpdate, Operation};
use cbdc_storage_impl::storage_traits::WorldState;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while dispatching a named invocation
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("unknown function {0}")]
    UnknownFunction(String),

    #[error("{function}: expected {expected} arguments, got {actual}")]
    ArgumentCount {
        function: Operation,
        expected: usize,
        actual: usize,
    },

    #[error("{function}: argument {position} ({value:?}) is not a valid {expected}")]
    InvalidArgument {
        function: Operation,
        position: usize,
        value: String,
        expected: &'static str,
    },

    #[error("{function}: failed to encode result: {source}")]
    Encode {
        function: Operation,
        #[source]
        source: CodecError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Name-based entry point to the asset registry.
///
/// Arguments arrive as strings, the way a remote client submits them, and
/// results leave as bytes.
pub struct AssetContract;

impl AssetContract {
    /// Runs `function` with `args` against `state`.
    ///
    /// Mutations return an empty payload, `AssetExists` returns `true` or
    /// `false`, and reads return canonical JSON.
    pub fn invoke<S, A>(state: &S, function: &str, args: &[A]) -> Result<Vec<u8>, ContractError>
    where
        S: WorldState + ?Sized,
        A: AsRef<str>,
    {
        let operation = Operation::from_str(function)
            .map_err(|_| ContractError::UnknownFunction(function.to_string()))?;

        if args.len() != operation.arity() {
            return Err(ContractError::ArgumentCount {
                function: operation,
                expected: operation.arity(),
                actual: args.len(),
            });
        }

        let args = Arguments { operation, args };
        let registry = AssetRegistry::new(state);

        match operation {
            Operation::InitLedger => {
                registry.init_ledger()?;
                Ok(Vec::new())
            }
            Operation::CreateAsset => {
                registry.create_asset(
                    args.text(0),
                    args.integer(1)?,
                    args.integer(2)?,
                    args.text(3),
                    args.text(4),
                    args.text(5),
                )?;
                Ok(Vec::new())
            }
            Operation::ReadAsset => {
                let asset = registry.read_asset(args.text(0))?;
                codec::encode(&asset).map_err(|source| ContractError::Encode {
                    function: operation,
                    source,
                })
            }
            Operation::UpdateAssetDeliveryTimeStamp => {
                update(&registry, &args, AssetUpdate::DeliveryTimeStamp(args.integer(1)?))
            }
            Operation::UpdateAssetPaymentSuccess => {
                update(&registry, &args, AssetUpdate::PaymentSuccess(args.flag(1)?))
            }
            Operation::UpdateAssetMerchantSig => {
                update(&registry, &args, AssetUpdate::MerchantSig(args.owned(1)))
            }
            Operation::UpdateAssetPlatformSig => {
                update(&registry, &args, AssetUpdate::PlatformSig(args.owned(1)))
            }
            Operation::UpdateAssetPartySig => {
                update(&registry, &args, AssetUpdate::PartySig(args.owned(1)))
            }
            Operation::UpdateAssetDeliverSuccess => {
                update(&registry, &args, AssetUpdate::DeliverSuccess(args.flag(1)?))
            }
            Operation::UpdateAssetBuyerConfirmDeliverSig => {
                update(&registry, &args, AssetUpdate::BuyerConfirmDeliverSig(args.owned(1)))
            }
            Operation::UpdateAssetTradeSuccess => {
                update(&registry, &args, AssetUpdate::TradeSuccess(args.flag(1)?))
            }
            Operation::DeleteAsset => {
                registry.delete_asset(args.text(0))?;
                Ok(Vec::new())
            }
            Operation::AssetExists => {
                let exists = registry.asset_exists(args.text(0))?;
                Ok(exists.to_string().into_bytes())
            }
            Operation::GetAllAssets => {
                let assets = registry.list_all()?;
                codec::encode_list(&assets).map_err(|source| ContractError::Encode {
                    function: operation,
                    source,
                })
            }
        }
    }
}

/// Applies one field change to the asset named by the first argument
fn update<S, A>(
    registry: &AssetRegistry<'_, S>,
    args: &Arguments<'_, A>,
    change: AssetUpdate,
) -> Result<Vec<u8>, ContractError>
where
    S: WorldState + ?Sized,
    A: AsRef<str>,
{
    registry.update_asset(args.text(0), change)?;
    Ok(Vec::new())
}

/// Positional string arguments of one invocation
struct Arguments<'a, A: AsRef<str>> {
    operation: Operation,
    args: &'a [A],
}

impl<A: AsRef<str>> Arguments<'_, A> {
    fn text(&self, position: usize) -> &str {
        self.args[position].as_ref()
    }

    fn integer(&self, position: usize) -> Result<i64, ContractError> {
        parse_i64(self.text(position)).ok_or_else(|| self.invalid(position, "integer"))
    }

    fn flag(&self, position: usize) -> Result<bool, ContractError> {
        parse_bool(self.text(position)).ok_or_else(|| self.invalid(position, "boolean"))
    }

    fn owned(&self, position: usize) -> String {
        self.text(position).to_string()
    }

    fn invalid(&self, position: usize, expected: &'static str) -> ContractError {
        ContractError::InvalidArgument {
            function: self.operation,
            position,
            value: self.text(position).to_string(),
            expected,
        }
    }
}

/// Parses the boolean spellings a remote client may send
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Parses a signed decimal integer
pub fn parse_i64(value: &str) -> Option<i64> {
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbdc_core::Asset;
    use cbdc_storage_impl::memory::MemoryWorldState;

    fn invoke(state: &MemoryWorldState, function: &str, args: &[&str]) -> Result<Vec<u8>, ContractError> {
        AssetContract::invoke(state, function, args)
    }

    fn create_asset1(state: &MemoryWorldState) {
        invoke(
            state,
            "CreateAsset",
            &["asset1", "1622548800", "1000", "BuyerA", "BuyerASignature", "MerchantA"],
        )
        .unwrap();
    }

    #[test]
    fn test_parse_bool() {
        for value in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(value), Some(true), "{}", value);
        }
        for value in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(value), Some(false), "{}", value);
        }
        for value in ["", "yes", "tRUE", " true", "2"] {
            assert_eq!(parse_bool(value), None, "{}", value);
        }
    }

    #[test]
    fn test_parse_i64() {
        assert_eq!(parse_i64("1622548800"), Some(1622548800));
        assert_eq!(parse_i64("-5"), Some(-5));
        assert_eq!(parse_i64("+7"), Some(7));
        assert_eq!(parse_i64("1.5"), None);
        assert_eq!(parse_i64(""), None);
        assert_eq!(parse_i64("99999999999999999999"), None);
    }

    #[test]
    fn test_create_and_read_over_string_arguments() {
        let state = MemoryWorldState::new();
        create_asset1(&state);

        let payload = invoke(&state, "ReadAsset", &["asset1"]).unwrap();
        let asset = codec::decode(&payload).unwrap();
        assert_eq!(
            asset,
            Asset::new("asset1", 1622548800, 1000, "BuyerA", "BuyerASignature", "MerchantA")
        );

        assert_eq!(invoke(&state, "AssetExists", &["asset1"]).unwrap(), b"true");
        assert_eq!(invoke(&state, "AssetExists", &["asset2"]).unwrap(), b"false");
    }

    #[test]
    fn test_update_operations_parse_their_argument() {
        let state = MemoryWorldState::new();
        create_asset1(&state);

        let calls = [
            ("UpdateAssetDeliveryTimeStamp", "1622635200"),
            ("UpdateAssetPaymentSuccess", "true"),
            ("UpdateAssetMerchantSig", "Sig1"),
            ("UpdateAssetPlatformSig", "Sig2"),
            ("UpdateAssetPartySig", "Sig3"),
            ("UpdateAssetDeliverSuccess", "T"),
            ("UpdateAssetBuyerConfirmDeliverSig", "Sig4"),
            ("UpdateAssetTradeSuccess", "1"),
        ];
        for (function, value) in calls {
            assert!(invoke(&state, function, &["asset1", value]).unwrap().is_empty());
        }

        let asset = AssetRegistry::new(&state).read_asset("asset1").unwrap();
        assert_eq!(asset.delivery_time_stamp, 1622635200);
        assert!(asset.payment_success);
        assert_eq!(asset.merchant_sig, "Sig1");
        assert_eq!(asset.platform_sig, "Sig2");
        assert_eq!(asset.party_sig, "Sig3");
        assert!(asset.deliver_success);
        assert_eq!(asset.buyer_confirm_deliver_sig, "Sig4");
        assert!(asset.trade_success);
    }

    #[test]
    fn test_get_all_assets_payload() {
        let state = MemoryWorldState::new();
        assert_eq!(invoke(&state, "GetAllAssets", &[]).unwrap(), b"[]");

        invoke(&state, "InitLedger", &[]).unwrap();
        let payload = invoke(&state, "GetAllAssets", &[]).unwrap();
        let assets: Vec<Asset> = serde_json::from_slice(&payload).unwrap();
        assert_eq!(assets.len(), 4);
        assert_eq!(assets[0].id, "init0");
    }

    #[test]
    fn test_dispatch_errors() {
        let state = MemoryWorldState::new();

        let err = invoke(&state, "TransferAsset", &["asset1"]).unwrap_err();
        assert!(matches!(err, ContractError::UnknownFunction(ref name) if name == "TransferAsset"));

        let err = invoke(&state, "ReadAsset", &[]).unwrap_err();
        assert!(matches!(
            err,
            ContractError::ArgumentCount { expected: 1, actual: 0, .. }
        ));

        let err = invoke(
            &state,
            "CreateAsset",
            &["asset1", "yesterday", "1000", "BuyerA", "Sig", "MerchantA"],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ContractError::InvalidArgument { position: 1, expected: "integer", .. }
        ));
        assert!(state.is_empty().unwrap());

        create_asset1(&state);
        let err = invoke(&state, "UpdateAssetPaymentSuccess", &["asset1", "yes"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "UpdateAssetPaymentSuccess: argument 1 (\"yes\") is not a valid boolean"
        );
    }

    #[test]
    fn test_update_argument_errors_name_their_function() {
        let state = MemoryWorldState::new();
        create_asset1(&state);
        let before = state.get("asset1").unwrap();

        let calls = [
            ("UpdateAssetDeliveryTimeStamp", "tomorrow", "integer"),
            ("UpdateAssetPaymentSuccess", "yes", "boolean"),
            ("UpdateAssetDeliverSuccess", "no", "boolean"),
            ("UpdateAssetTradeSuccess", "2", "boolean"),
        ];
        for (function, value, kind) in calls {
            let err = invoke(&state, function, &["asset1", value]).unwrap_err();
            match err {
                ContractError::InvalidArgument {
                    function: reported,
                    position,
                    expected,
                    ..
                } => {
                    assert_eq!(reported.to_string(), function);
                    assert_eq!(position, 1);
                    assert_eq!(expected, kind);
                }
                other => panic!("{}: unexpected error {}", function, other),
            }
        }
        assert_eq!(state.get("asset1").unwrap(), before);
    }

    #[test]
    fn test_registry_errors_pass_through() {
        let state = MemoryWorldState::new();
        let err = invoke(&state, "DeleteAsset", &["asset1"]).unwrap_err();
        assert_eq!(err.to_string(), "DeleteAsset: the asset asset1 does not exist");
        assert!(matches!(err, ContractError::Registry(ref e) if e.is_not_found()));

        create_asset1(&state);
        let err = invoke(
            &state,
            "CreateAsset",
            &["asset1", "1", "1", "B", "S", "M"],
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::Registry(ref e) if e.is_already_exists()));
    }
}
