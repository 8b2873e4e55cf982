use serde::{Deserialize, Serialize};

use crate::{
    crypto::{Address, Hash},
    serializer::{Reader, ReaderError, Serializer, Writer},
};

// TransferPayload moves an amount of an asset from the source account to the
// destination account.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TransferPayload {
    source: Address,
    destination: Address,
    asset: Hash,
    amount: u64,
}

impl TransferPayload {
    pub fn new(source: Address, destination: Address, asset: Hash, amount: u64) -> Self {
        TransferPayload {
            source,
            destination,
            asset,
            amount,
        }
    }

    #[inline]
    pub fn get_source(&self) -> &Address {
        &self.source
    }

    #[inline]
    pub fn get_destination(&self) -> &Address {
        &self.destination
    }

    #[inline]
    pub fn get_asset(&self) -> &Hash {
        &self.asset
    }

    #[inline]
    pub fn get_amount(&self) -> u64 {
        self.amount
    }
}

impl Serializer for TransferPayload {
    fn write(&self, writer: &mut Writer) {
        self.source.write(writer);
        self.destination.write(writer);
        self.asset.write(writer);
        self.amount.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<TransferPayload, ReaderError> {
        Ok(TransferPayload {
            source: Address::read(reader)?,
            destination: Address::read(reader)?,
            asset: Hash::read(reader)?,
            amount: u64::read(reader)?,
        })
    }
}
