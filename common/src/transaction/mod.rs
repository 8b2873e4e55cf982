use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::{
    crypto::{Address, Hashable, PublicKey, Signature},
    serializer::{Reader, ReaderError, Serializer, Writer},
};

pub mod multisig;
pub mod payload;
pub mod sign_mode;
pub mod typed_data;
pub mod verify;

pub use multisig::{BitArray, MultiSigData};
pub use payload::{
    Message, RelayPayload, TransferPayload, VmAccountMeta, VmBatchPayload, VmInstruction,
};
pub use sign_mode::SignMode;

#[cfg(test)]
mod tests;

const MAX_SIGNATURE_BYTES: usize = 128;

/// Fee declared by the transaction: the amount offered and the gas limit the
/// admission meter is created with. `payer` overrides the default payer (the
/// first required signer); delegated typed-data fees carry their payer in the
/// extension instead.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Fee {
    amount: u64,
    gas_limit: u64,
    payer: Option<Address>,
}

impl Fee {
    pub fn new(amount: u64, gas_limit: u64, payer: Option<Address>) -> Self {
        Fee {
            amount,
            gas_limit,
            payer,
        }
    }

    #[inline]
    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    #[inline]
    pub fn get_gas_limit(&self) -> u64 {
        self.gas_limit
    }

    #[inline]
    pub fn get_payer(&self) -> &Option<Address> {
        &self.payer
    }
}

impl Serializer for Fee {
    fn write(&self, writer: &mut Writer) {
        self.amount.write(writer);
        self.gas_limit.write(writer);
        self.payer.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Fee, ReaderError> {
        Ok(Fee {
            amount: u64::read(reader)?,
            gas_limit: u64::read(reader)?,
            payer: Option::read(reader)?,
        })
    }
}

/// Out-of-band typed hint signaling an alternate verification interpretation.
/// Only the typed-data kind is recognized; every other tag is unsupported by
/// policy and rejected at dispatch, never ignored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionOption {
    TypedData(TypedDataExtension),
    Unknown { type_tag: u8 },
}

impl ExtensionOption {
    pub fn type_tag(&self) -> u8 {
        match self {
            ExtensionOption::TypedData(_) => 0,
            ExtensionOption::Unknown { type_tag } => *type_tag,
        }
    }
}

impl Serializer for ExtensionOption {
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.type_tag());
        match self {
            ExtensionOption::TypedData(ext) => ext.write(writer),
            // No body: the tag alone is enough for admission to reject it.
            ExtensionOption::Unknown { .. } => {}
        }
    }

    fn read(reader: &mut Reader) -> Result<ExtensionOption, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => ExtensionOption::TypedData(TypedDataExtension::read(reader)?),
            type_tag => ExtensionOption::Unknown { type_tag },
        })
    }
}

/// Delegated-fee typed-data extension: the declared numeric signing domain,
/// the account paying the fee, and that account's detached signature over the
/// typed-data digest. The signature proves consent to fee deduction from an
/// account outside the ordinary signer list.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TypedDataExtension {
    typed_data_chain_id: u64,
    fee_payer: Address,
    #[serde(with = "hex::serde")]
    fee_payer_sig: Vec<u8>,
}

impl TypedDataExtension {
    pub fn new(typed_data_chain_id: u64, fee_payer: Address, fee_payer_sig: Vec<u8>) -> Self {
        TypedDataExtension {
            typed_data_chain_id,
            fee_payer,
            fee_payer_sig,
        }
    }

    #[inline]
    pub fn get_typed_data_chain_id(&self) -> u64 {
        self.typed_data_chain_id
    }

    #[inline]
    pub fn get_fee_payer(&self) -> &Address {
        &self.fee_payer
    }

    #[inline]
    pub fn get_fee_payer_sig(&self) -> &[u8] {
        &self.fee_payer_sig
    }
}

impl Serializer for TypedDataExtension {
    fn write(&self, writer: &mut Writer) {
        self.typed_data_chain_id.write(writer);
        self.fee_payer.write(writer);
        writer.write_var_bytes(&self.fee_payer_sig);
    }

    fn read(reader: &mut Reader) -> Result<TypedDataExtension, ReaderError> {
        Ok(TypedDataExtension {
            typed_data_chain_id: u64::read(reader)?,
            fee_payer: Address::read(reader)?,
            fee_payer_sig: reader.read_var_bytes(MAX_SIGNATURE_BYTES)?,
        })
    }
}

/// Everything a signature commits to besides the transaction body. Account
/// number and sequence must match committed state at verification time; a
/// mismatch is a replay/ordering violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignerData {
    pub address: Address,
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
    pub pubkey: Option<PublicKey>,
}

/// One signature slot: a single signature under a declared sign mode, or a
/// threshold set for a multisig key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignatureData {
    Single { mode: SignMode, signature: Signature },
    Multi(MultiSigData),
}

impl Serializer for SignatureData {
    fn write(&self, writer: &mut Writer) {
        match self {
            SignatureData::Single { mode, signature } => {
                writer.write_u8(0);
                mode.write(writer);
                signature.write(writer);
            }
            SignatureData::Multi(multisig) => {
                writer.write_u8(1);
                multisig.write(writer);
            }
        }
    }

    fn read(reader: &mut Reader) -> Result<SignatureData, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => SignatureData::Single {
                mode: SignMode::read(reader)?,
                signature: Signature::read(reader)?,
            },
            1 => SignatureData::Multi(MultiSigData::read(reader)?),
            _ => return Err(ReaderError::InvalidValue),
        })
    }
}

/// A signature slot paired with the public key that produced it and the
/// account sequence it was signed at.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SignatureV2 {
    pub pubkey: PublicKey,
    pub data: SignatureData,
    pub sequence: u64,
}

impl Serializer for SignatureV2 {
    fn write(&self, writer: &mut Writer) {
        self.pubkey.write(writer);
        self.data.write(writer);
        self.sequence.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<SignatureV2, ReaderError> {
        Ok(SignatureV2 {
            pubkey: PublicKey::read(reader)?,
            data: SignatureData::read(reader)?,
            sequence: u64::read(reader)?,
        })
    }
}

// Transaction to be sent over the network
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Ordered messages executed atomically
    messages: Vec<Message>,
    fee: Fee,
    memo: String,
    /// Block height after which the transaction is invalid (0 = no expiry)
    timeout_height: u64,
    /// Out-of-band typed hints, at most one recognized kind
    extensions: Vec<ExtensionOption>,
    /// One slot per distinct required signer, in signer order
    signatures: Vec<SignatureV2>,
}

impl Transaction {
    pub fn new(
        messages: Vec<Message>,
        fee: Fee,
        memo: String,
        timeout_height: u64,
        extensions: Vec<ExtensionOption>,
        signatures: Vec<SignatureV2>,
    ) -> Self {
        Transaction {
            messages,
            fee,
            memo,
            timeout_height,
            extensions,
            signatures,
        }
    }

    #[inline]
    pub fn get_messages(&self) -> &[Message] {
        &self.messages
    }

    #[inline]
    pub fn get_fee(&self) -> &Fee {
        &self.fee
    }

    #[inline]
    pub fn get_memo(&self) -> &str {
        &self.memo
    }

    #[inline]
    pub fn get_timeout_height(&self) -> u64 {
        self.timeout_height
    }

    #[inline]
    pub fn get_extensions(&self) -> &[ExtensionOption] {
        &self.extensions
    }

    #[inline]
    pub fn get_signatures(&self) -> &[SignatureV2] {
        &self.signatures
    }

    /// Distinct required signers across all messages, in declaration order.
    pub fn required_signers(&self) -> IndexSet<Address> {
        let mut signers = IndexSet::new();
        for message in &self.messages {
            message.required_signers(&mut signers);
        }
        signers
    }

    /// The embedded-VM batch, if any message carries one.
    pub fn get_vm_batch(&self) -> Option<&VmBatchPayload> {
        self.messages.iter().find_map(|message| match message {
            Message::VmBatch(payload) => Some(payload),
            _ => None,
        })
    }

    /// The typed-data extension, if declared.
    pub fn get_typed_data_extension(&self) -> Option<&TypedDataExtension> {
        self.extensions.iter().find_map(|ext| match ext {
            ExtensionOption::TypedData(ext) => Some(ext),
            _ => None,
        })
    }

    /// Write everything a signature commits to: the full body, with the
    /// fee-payer consent signature blanked out of the extension (it cannot
    /// sign over itself).
    pub(crate) fn write_sign_payload(&self, writer: &mut Writer) {
        writer.write_u16(self.messages.len() as u16);
        for message in &self.messages {
            message.write(writer);
        }
        self.fee.write(writer);
        writer.write_var_bytes(self.memo.as_bytes());
        self.timeout_height.write(writer);
        writer.write_u8(self.extensions.len() as u8);
        for extension in &self.extensions {
            match extension {
                ExtensionOption::TypedData(ext) => {
                    writer.write_u8(extension.type_tag());
                    ext.get_typed_data_chain_id().write(writer);
                    ext.get_fee_payer().write(writer);
                }
                ExtensionOption::Unknown { .. } => {
                    writer.write_u8(extension.type_tag());
                }
            }
        }
    }
}

impl Serializer for Transaction {
    fn write(&self, writer: &mut Writer) {
        writer.write_u16(self.messages.len() as u16);
        for message in &self.messages {
            message.write(writer);
        }
        self.fee.write(writer);
        writer.write_var_bytes(self.memo.as_bytes());
        self.timeout_height.write(writer);
        writer.write_u8(self.extensions.len() as u8);
        for extension in &self.extensions {
            extension.write(writer);
        }
        writer.write_u8(self.signatures.len() as u8);
        for signature in &self.signatures {
            signature.write(writer);
        }
    }

    fn read(reader: &mut Reader) -> Result<Transaction, ReaderError> {
        let messages_len = reader.read_u16()? as usize;
        let mut messages = Vec::with_capacity(messages_len);
        for _ in 0..messages_len {
            messages.push(Message::read(reader)?);
        }
        let fee = Fee::read(reader)?;
        let memo = reader.read_string(crate::config::MAX_MEMO_SIZE)?;
        let timeout_height = u64::read(reader)?;
        let extensions_len = reader.read_u8()? as usize;
        let mut extensions = Vec::with_capacity(extensions_len);
        for _ in 0..extensions_len {
            extensions.push(ExtensionOption::read(reader)?);
        }
        let signatures_len = reader.read_u8()? as usize;
        let mut signatures = Vec::with_capacity(signatures_len);
        for _ in 0..signatures_len {
            signatures.push(SignatureV2::read(reader)?);
        }
        Ok(Transaction {
            messages,
            fee,
            memo,
            timeout_height,
            extensions,
            signatures,
        })
    }
}

impl Hashable for Transaction {}

impl AsRef<Transaction> for Transaction {
    fn as_ref(&self) -> &Transaction {
        self
    }
}
