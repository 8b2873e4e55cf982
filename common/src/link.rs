use std::{
    fmt::{Display, Error, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    crypto::Address,
    serializer::{Reader, ReaderError, Serializer, Writer},
};

pub const FOREIGN_PUBKEY_SIZE: usize = 32;

/// Account identifier in the embedded VM's own address space.
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Debug, Hash, Serialize, Deserialize)]
pub struct ForeignPubkey(#[serde(with = "hex::serde")] [u8; FOREIGN_PUBKEY_SIZE]);

impl ForeignPubkey {
    pub const fn new(bytes: [u8; FOREIGN_PUBKEY_SIZE]) -> Self {
        ForeignPubkey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FOREIGN_PUBKEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for ForeignPubkey {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| "Invalid hex string")?;
        let bytes: [u8; FOREIGN_PUBKEY_SIZE] =
            bytes.try_into().map_err(|_| "Invalid foreign pubkey")?;
        Ok(ForeignPubkey::new(bytes))
    }
}

impl Display for ForeignPubkey {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.to_hex())
    }
}

impl Serializer for ForeignPubkey {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(&self.0);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(ForeignPubkey::new(reader.read_array()?))
    }

    fn size(&self) -> usize {
        FOREIGN_PUBKEY_SIZE
    }
}

/// Bidirectional association between a native account and an embedded-VM
/// public key. Created once by the linking operation outside this pipeline;
/// the registry guarantees at most one link per key on either side, so the
/// admission path only ever reads these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityLink {
    native: Address,
    foreign: ForeignPubkey,
}

impl IdentityLink {
    pub fn new(native: Address, foreign: ForeignPubkey) -> Self {
        IdentityLink { native, foreign }
    }

    #[inline]
    pub fn native(&self) -> &Address {
        &self.native
    }

    #[inline]
    pub fn foreign(&self) -> &ForeignPubkey {
        &self.foreign
    }
}
