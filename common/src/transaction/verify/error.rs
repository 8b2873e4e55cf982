use anyhow::Error as AnyError;
use thiserror::Error;

use crate::{
    crypto::{Address, CryptoError},
    gas::OutOfGas,
    link::ForeignPubkey,
    serializer::ReaderError,
};

#[derive(Error, Debug)]
pub enum VerificationError<T> {
    #[error("State error: {0}")]
    State(T),
    #[error("Invalid format: {0}")]
    InvalidFormat(&'static str),
    #[error("Unsupported extension option (tag {0})")]
    UnsupportedExtension(u8),
    #[error("At most one extension option may be declared")]
    MultipleExtensions,
    #[error("Unsupported message type (tag {0})")]
    UnsupportedMessage(u8),
    #[error("Expected {expected} signatures, got {got}")]
    SignerCountMismatch { expected: usize, got: usize },
    #[error("Account {0} not found")]
    AccountNotFound(Address),
    #[error("Invalid sequence for {address}, got {got} expected {expected}")]
    InvalidSequence {
        address: Address,
        expected: u64,
        got: u64,
    },
    #[error("Invalid chain ID: expected {expected}, got {got}")]
    InvalidChainId { expected: u64, got: u64 },
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Declared public key does not match signer {0}")]
    PubkeyMismatch(Address),
    #[error("Signature slot does not match the shape of the account key")]
    SignatureShapeMismatch,
    #[error("Unsupported sign mode for the active verification strategy")]
    UnsupportedSignMode,
    #[error("Invalid multisig participants count: key has {expected}, signature set has {got}")]
    MultisigParticipants { expected: usize, got: usize },
    #[error("Multisig threshold not met: need {threshold}, got {got}")]
    MultisigThresholdNotMet { threshold: u8, got: usize },
    #[error("Fee payer account {0} cannot be resolved")]
    FeePayerUnresolved(Address),
    #[error("Transaction timed out: timeout height {timeout}, current height {current}")]
    TxTimeout { timeout: u64, current: u64 },
    #[error("Memo is too large: {size} > {max}")]
    MemoTooLarge { size: usize, max: usize },
    #[error("Transaction is too large: {size} > {max}")]
    TxTooLarge { size: usize, max: usize },
    #[error("Relayed packet was already processed")]
    RedundantRelay,
    #[error("Embedded VM batch must be the only message in the transaction")]
    BatchNotAlone,
    #[error("Native signer {0} has no identity link")]
    UnlinkedNativeSigner(Address),
    #[error("Unlinked foreign account {0}")]
    UnlinkedForeignAccount(ForeignPubkey),
    #[error("Foreign account {foreign} not authorized by any verified native signature (linked to {native})")]
    UnauthorizedForeignSigner {
        foreign: ForeignPubkey,
        native: Address,
    },
    #[error("Instruction account index {index} out of range ({len} accounts)")]
    InvalidAccountIndex { index: u16, len: usize },
    #[error(transparent)]
    OutOfGas(#[from] OutOfGas),
    #[error("Decode error: {0}")]
    Decode(#[from] ReaderError),
    #[error("Crypto error: {0}")]
    Crypto(CryptoError),
    #[error("Failed to encode sign document: {0}")]
    SignDoc(#[from] serde_json::Error),
    #[error(transparent)]
    AnyError(#[from] AnyError),
}
