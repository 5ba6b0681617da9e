use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every operation the asset contract exposes, addressed by its wire name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    InitLedger,
    CreateAsset,
    ReadAsset,
    UpdateAssetDeliveryTimeStamp,
    UpdateAssetPaymentSuccess,
    UpdateAssetMerchantSig,
    UpdateAssetPlatformSig,
    UpdateAssetPartySig,
    UpdateAssetDeliverSuccess,
    UpdateAssetBuyerConfirmDeliverSig,
    UpdateAssetTradeSuccess,
    DeleteAsset,
    AssetExists,
    GetAllAssets,
}

impl Operation {
    pub const ALL: [Operation; 14] = [
        Operation::InitLedger,
        Operation::CreateAsset,
        Operation::ReadAsset,
        Operation::UpdateAssetDeliveryTimeStamp,
        Operation::UpdateAssetPaymentSuccess,
        Operation::UpdateAssetMerchantSig,
        Operation::UpdateAssetPlatformSig,
        Operation::UpdateAssetPartySig,
        Operation::UpdateAssetDeliverSuccess,
        Operation::UpdateAssetBuyerConfirmDeliverSig,
        Operation::UpdateAssetTradeSuccess,
        Operation::DeleteAsset,
        Operation::AssetExists,
        Operation::GetAllAssets,
    ];

    /// The name a remote client uses to invoke this operation
    pub fn name(&self) -> &'static str {
        match self {
            Operation::InitLedger => "InitLedger",
            Operation::CreateAsset => "CreateAsset",
            Operation::ReadAsset => "ReadAsset",
            Operation::UpdateAssetDeliveryTimeStamp => "UpdateAssetDeliveryTimeStamp",
            Operation::UpdateAssetPaymentSuccess => "UpdateAssetPaymentSuccess",
            Operation::UpdateAssetMerchantSig => "UpdateAssetMerchantSig",
            Operation::UpdateAssetPlatformSig => "UpdateAssetPlatformSig",
            Operation::UpdateAssetPartySig => "UpdateAssetPartySig",
            Operation::UpdateAssetDeliverSuccess => "UpdateAssetDeliverSuccess",
            Operation::UpdateAssetBuyerConfirmDeliverSig => "UpdateAssetBuyerConfirmDeliverSig",
            Operation::UpdateAssetTradeSuccess => "UpdateAssetTradeSuccess",
            Operation::DeleteAsset => "DeleteAsset",
            Operation::AssetExists => "AssetExists",
            Operation::GetAllAssets => "GetAllAssets",
        }
    }

    /// Number of string arguments the operation takes on the wire
    pub fn arity(&self) -> usize {
        match self {
            Operation::InitLedger | Operation::GetAllAssets => 0,
            Operation::ReadAsset | Operation::DeleteAsset | Operation::AssetExists => 1,
            Operation::CreateAsset => 6,
            _ => 2,
        }
    }

    /// Whether the operation can produce writes
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Operation::ReadAsset | Operation::AssetExists | Operation::GetAllAssets
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a function name does not match any operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperation(pub String);

impl fmt::Display for UnknownOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown function {}", self.0)
    }
}

impl std::error::Error for UnknownOperation {}

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.name() == s)
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}
