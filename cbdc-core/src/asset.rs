use crate::operation::Operation;
use serde::{Deserialize, Serialize};

/// A trade record tracked by the asset contract.
///
/// The declaration order of the fields is the canonical encode order and is
/// part of the wire contract: every node must produce the same bytes for the
/// same record, so fields must never be reordered, renamed or skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Unique identifier, also the world-state key
    pub id: String,

    /// When the trade was proposed (Unix seconds, supplied by the caller)
    pub proposal_time_stamp: i64,

    /// When the goods were delivered (Unix seconds, supplied by the caller)
    pub delivery_time_stamp: i64,

    pub amount: i64,
    pub buyer: String,
    pub merchant: String,
    pub buyer_sig: String,
    pub merchant_sig: String,
    pub platform_sig: String,
    pub party_sig: String,
    pub payment_success: bool,
    pub deliver_success: bool,
    pub buyer_confirm_deliver_sig: String,

    /// Set once the whole trade has settled
    pub trade_success: bool,
}

impl Asset {
    /// Create a freshly proposed asset. Every field not supplied here starts at
    /// its zero value.
    pub fn new(
        id: impl Into<String>,
        proposal_time_stamp: i64,
        amount: i64,
        buyer: impl Into<String>,
        buyer_sig: impl Into<String>,
        merchant: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            proposal_time_stamp,
            amount,
            buyer: buyer.into(),
            buyer_sig: buyer_sig.into(),
            merchant: merchant.into(),
            ..Self::default()
        }
    }

    /// Get the asset ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Apply a single field update, leaving every other field untouched
    pub fn apply(&mut self, update: AssetUpdate) {
        match update {
            AssetUpdate::DeliveryTimeStamp(ts) => self.delivery_time_stamp = ts,
            AssetUpdate::PaymentSuccess(status) => self.payment_success = status,
            AssetUpdate::MerchantSig(sig) => self.merchant_sig = sig,
            AssetUpdate::PlatformSig(sig) => self.platform_sig = sig,
            AssetUpdate::PartySig(sig) => self.party_sig = sig,
            AssetUpdate::DeliverSuccess(status) => self.deliver_success = status,
            AssetUpdate::BuyerConfirmDeliverSig(sig) => self.buyer_confirm_deliver_sig = sig,
            AssetUpdate::TradeSuccess(status) => self.trade_success = status,
        }
    }
}

/// The closed set of mutations an existing asset accepts.
///
/// Each variant touches exactly one field and maps to one named contract
/// operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetUpdate {
    DeliveryTimeStamp(i64),
    PaymentSuccess(bool),
    MerchantSig(String),
    PlatformSig(String),
    PartySig(String),
    DeliverSuccess(bool),
    BuyerConfirmDeliverSig(String),
    TradeSuccess(bool),
}

impl AssetUpdate {
    /// The contract operation that carries this update
    pub fn operation(&self) -> Operation {
        match self {
            AssetUpdate::DeliveryTimeStamp(_) => Operation::UpdateAssetDeliveryTimeStamp,
            AssetUpdate::PaymentSuccess(_) => Operation::UpdateAssetPaymentSuccess,
            AssetUpdate::MerchantSig(_) => Operation::UpdateAssetMerchantSig,
            AssetUpdate::PlatformSig(_) => Operation::UpdateAssetPlatformSig,
            AssetUpdate::PartySig(_) => Operation::UpdateAssetPartySig,
            AssetUpdate::DeliverSuccess(_) => Operation::UpdateAssetDeliverSuccess,
            AssetUpdate::BuyerConfirmDeliverSig(_) => {
                Operation::UpdateAssetBuyerConfirmDeliverSig
            }
            AssetUpdate::TradeSuccess(_) => Operation::UpdateAssetTradeSuccess,
        }
    }

    /// Wire name of the field this update writes
    pub fn field(&self) -> &'static str {
        match self {
            AssetUpdate::DeliveryTimeStamp(_) => "deliveryTimeStamp",
            AssetUpdate::PaymentSuccess(_) => "paymentSuccess",
            AssetUpdate::MerchantSig(_) => "merchantSig",
            AssetUpdate::PlatformSig(_) => "platformSig",
            AssetUpdate::PartySig(_) => "partySig",
            AssetUpdate::DeliverSuccess(_) => "deliverSuccess",
            AssetUpdate::BuyerConfirmDeliverSig(_) => "buyerConfirmDeliverSig",
            AssetUpdate::TradeSuccess(_) => "tradeSuccess",
        }
    }
}
