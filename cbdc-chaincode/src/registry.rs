use cbdc_core::codec;
use cbdc_core::error::{CodecError, RegistryError, StoreError};
use cbdc_core::{Asset, AssetUpdate, Operation};
use cbdc_storage_impl::storage_traits::{StateIterator, WorldState};

/// Id reported by scan failures that cannot be pinned to a single key
const ANY_ASSET: &str = "*";

/// Asset lifecycle operations over a world state.
///
/// The registry holds no state of its own. Every operation is a pure
/// function of the world state it reads and the arguments it is given, and
/// it performs at most one write.
pub struct AssetRegistry<'a, S: WorldState + ?Sized> {
    state: &'a S,
}

impl<'a, S: WorldState + ?Sized> AssetRegistry<'a, S> {
    pub fn new(state: &'a S) -> Self {
        Self { state }
    }

    /// Creates a new asset with every field not supplied here zeroed
    pub fn create_asset(
        &self,
        id: &str,
        proposal_time_stamp: i64,
        amount: i64,
        buyer: &str,
        buyer_sig: &str,
        merchant: &str,
    ) -> Result<(), RegistryError> {
        let operation = Operation::CreateAsset;
        log::debug!("{} {}", operation, id);

        if self.load(operation, id)?.is_some() {
            log::warn!("{}: asset {} already exists", operation, id);
            return Err(RegistryError::AlreadyExists {
                operation,
                id: id.to_string(),
            });
        }

        let asset = Asset::new(id, proposal_time_stamp, amount, buyer, buyer_sig, merchant);
        self.write(operation, &asset)
    }

    /// Returns the asset stored under `id`
    pub fn read_asset(&self, id: &str) -> Result<Asset, RegistryError> {
        let operation = Operation::ReadAsset;
        log::debug!("{} {}", operation, id);
        self.fetch(operation, id)
    }

    /// Whether an asset is stored under `id`
    pub fn asset_exists(&self, id: &str) -> Result<bool, RegistryError> {
        let operation = Operation::AssetExists;
        log::debug!("{} {}", operation, id);
        Ok(self.load(operation, id)?.is_some())
    }

    /// Applies one field change to an existing asset.
    ///
    /// The record is decoded, changed and written back whole. Nothing is
    /// written when the asset is missing or fails to decode.
    pub fn update_asset(&self, id: &str, update: AssetUpdate) -> Result<(), RegistryError> {
        let operation = update.operation();
        log::debug!("{} {} ({})", operation, id, update.field());

        let mut asset = self.fetch(operation, id)?;
        asset.apply(update);
        self.write(operation, &asset)
    }

    pub fn update_delivery_time_stamp(&self, id: &str, time_stamp: i64) -> Result<(), RegistryError> {
        self.update_asset(id, AssetUpdate::DeliveryTimeStamp(time_stamp))
    }

    pub fn update_payment_success(&self, id: &str, status: bool) -> Result<(), RegistryError> {
        self.update_asset(id, AssetUpdate::PaymentSuccess(status))
    }

    pub fn update_merchant_sig(&self, id: &str, sig: &str) -> Result<(), RegistryError> {
        self.update_asset(id, AssetUpdate::MerchantSig(sig.to_string()))
    }

    pub fn update_platform_sig(&self, id: &str, sig: &str) -> Result<(), RegistryError> {
        self.update_asset(id, AssetUpdate::PlatformSig(sig.to_string()))
    }

    pub fn update_party_sig(&self, id: &str, sig: &str) -> Result<(), RegistryError> {
        self.update_asset(id, AssetUpdate::PartySig(sig.to_string()))
    }

    pub fn update_deliver_success(&self, id: &str, status: bool) -> Result<(), RegistryError> {
        self.update_asset(id, AssetUpdate::DeliverSuccess(status))
    }

    pub fn update_buyer_confirm_deliver_sig(&self, id: &str, sig: &str) -> Result<(), RegistryError> {
        self.update_asset(id, AssetUpdate::BuyerConfirmDeliverSig(sig.to_string()))
    }

    pub fn update_trade_success(&self, id: &str, status: bool) -> Result<(), RegistryError> {
        self.update_asset(id, AssetUpdate::TradeSuccess(status))
    }

    /// Removes the asset stored under `id`
    pub fn delete_asset(&self, id: &str) -> Result<(), RegistryError> {
        let operation = Operation::DeleteAsset;
        log::debug!("{} {}", operation, id);

        if self.load(operation, id)?.is_none() {
            return Err(Self::not_found(operation, id));
        }

        self.state.delete(id).map_err(|source| match source {
            StoreError::NotFound(_) => Self::not_found(operation, id),
            source => RegistryError::Store {
                operation,
                id: id.to_string(),
                source,
            },
        })
    }

    /// Lazily walks every asset in key order.
    ///
    /// The iterator stops after the first error it yields.
    pub fn get_all_assets(&self) -> AssetIterator<'a> {
        log::debug!("{}", Operation::GetAllAssets);
        AssetIterator {
            inner: self.state.range_scan("", ""),
            failed: false,
        }
    }

    /// Every asset in key order, or the first failure met on the way
    pub fn list_all(&self) -> Result<Vec<Asset>, RegistryError> {
        self.get_all_assets().collect()
    }

    /// Encodes `asset` and stores it under its id, with no existence check
    pub(crate) fn write(&self, operation: Operation, asset: &Asset) -> Result<(), RegistryError> {
        let id = asset.id();
        let bytes = codec::encode(asset).map_err(|e| RegistryError::Store {
            operation,
            id: id.to_string(),
            source: StoreError::Serialization(e.to_string()),
        })?;

        self.state.put(id, &bytes).map_err(|source| RegistryError::Store {
            operation,
            id: id.to_string(),
            source,
        })
    }

    fn load(&self, operation: Operation, id: &str) -> Result<Option<Vec<u8>>, RegistryError> {
        self.state.get(id).map_err(|source| RegistryError::Store {
            operation,
            id: id.to_string(),
            source,
        })
    }

    fn fetch(&self, operation: Operation, id: &str) -> Result<Asset, RegistryError> {
        let bytes = self
            .load(operation, id)?
            .ok_or_else(|| Self::not_found(operation, id))?;

        decode_asset(operation, id, &bytes)
    }

    fn not_found(operation: Operation, id: &str) -> RegistryError {
        log::warn!("{}: asset {} does not exist", operation, id);
        RegistryError::NotFound {
            operation,
            id: id.to_string(),
        }
    }
}

fn decode_asset(operation: Operation, id: &str, bytes: &[u8]) -> Result<Asset, RegistryError> {
    codec::decode(bytes).map_err(|source: CodecError| {
        log::warn!("{}: failed to decode asset {}: {}", operation, id, source);
        RegistryError::Decode {
            operation,
            id: id.to_string(),
            source,
        }
    })
}

/// Decoding iterator over a full world-state scan
pub struct AssetIterator<'a> {
    inner: Box<dyn StateIterator + 'a>,
    failed: bool,
}

impl Iterator for AssetIterator<'_> {
    type Item = Result<Asset, RegistryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let item = match self.inner.next()? {
            Ok((key, bytes)) => decode_asset(Operation::GetAllAssets, &key, &bytes),
            Err(source) => Err(RegistryError::Store {
                operation: Operation::GetAllAssets,
                id: ANY_ASSET.to_string(),
                source,
            }),
        };

        self.failed = item.is_err();
        Some(item)
    }
}
