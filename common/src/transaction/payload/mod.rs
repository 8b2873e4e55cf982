mod relay;
mod transfer;
mod vm_batch;

pub use relay::RelayPayload;
pub use transfer::TransferPayload;
pub use vm_batch::{VmAccountMeta, VmBatchPayload, VmInstruction};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::{
    crypto::Address,
    serializer::{Reader, ReaderError, Serializer, Writer},
};

/// Every message kind recognized by this chain. The union is closed on
/// purpose: adding a kind forces each dispatch site through an exhaustive
/// match. `Unknown` captures foreign tags reaching us through non-wire paths
/// (JSON APIs, future peers); admission rejects it, never ignores it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    Transfer(TransferPayload),
    Relay(RelayPayload),
    VmBatch(VmBatchPayload),
    Unknown { type_tag: u8 },
}

impl Message {
    /// Native accounts that must sign a transaction carrying this message,
    /// in declaration order.
    pub fn required_signers(&self, signers: &mut IndexSet<Address>) {
        match self {
            Message::Transfer(payload) => {
                signers.insert(*payload.get_source());
            }
            Message::Relay(payload) => {
                signers.insert(*payload.get_relayer());
            }
            Message::VmBatch(payload) => {
                signers.extend(payload.get_signers().iter().copied());
            }
            Message::Unknown { .. } => {}
        }
    }

    pub fn type_tag(&self) -> u8 {
        match self {
            Message::Transfer(_) => 0,
            Message::Relay(_) => 1,
            Message::VmBatch(_) => 2,
            Message::Unknown { type_tag } => *type_tag,
        }
    }
}

impl Serializer for Message {
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.type_tag());
        match self {
            Message::Transfer(payload) => payload.write(writer),
            Message::Relay(payload) => payload.write(writer),
            Message::VmBatch(payload) => payload.write(writer),
            // No body: the tag alone is enough for admission to reject it.
            Message::Unknown { .. } => {}
        }
    }

    fn read(reader: &mut Reader) -> Result<Message, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => Message::Transfer(TransferPayload::read(reader)?),
            1 => Message::Relay(RelayPayload::read(reader)?),
            2 => Message::VmBatch(VmBatchPayload::read(reader)?),
            type_tag => Message::Unknown { type_tag },
        })
    }
}
