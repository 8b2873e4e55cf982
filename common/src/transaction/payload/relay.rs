use serde::{Deserialize, Serialize};

use crate::{
    crypto::{Address, Hash},
    serializer::{Reader, ReaderError, Serializer, Writer},
};

const MAX_CHANNEL_LEN: usize = 64;

// RelayPayload delivers a cross-chain packet receipt. Packets are identified
// by (channel, packet sequence); a receipt already recorded on-chain makes a
// second delivery redundant and the transaction is dropped at admission.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RelayPayload {
    relayer: Address,
    channel: String,
    packet_sequence: u64,
    commitment: Hash,
}

impl RelayPayload {
    pub fn new(relayer: Address, channel: String, packet_sequence: u64, commitment: Hash) -> Self {
        RelayPayload {
            relayer,
            channel,
            packet_sequence,
            commitment,
        }
    }

    #[inline]
    pub fn get_relayer(&self) -> &Address {
        &self.relayer
    }

    #[inline]
    pub fn get_channel(&self) -> &str {
        &self.channel
    }

    #[inline]
    pub fn get_packet_sequence(&self) -> u64 {
        self.packet_sequence
    }

    #[inline]
    pub fn get_commitment(&self) -> &Hash {
        &self.commitment
    }
}

impl Serializer for RelayPayload {
    fn write(&self, writer: &mut Writer) {
        self.relayer.write(writer);
        writer.write_var_bytes(self.channel.as_bytes());
        self.packet_sequence.write(writer);
        self.commitment.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<RelayPayload, ReaderError> {
        Ok(RelayPayload {
            relayer: Address::read(reader)?,
            channel: reader.read_string(MAX_CHANNEL_LEN)?,
            packet_sequence: u64::read(reader)?,
            commitment: Hash::read(reader)?,
        })
    }
}
