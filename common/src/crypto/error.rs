use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid public key length: expected {expected}, got {got}")]
    InvalidPublicKeyLength { expected: usize, got: usize },
    #[error("Invalid signature length: expected {expected}, got {got}")]
    InvalidSignatureLength { expected: usize, got: usize },
    #[error("Failed to parse public key")]
    InvalidPublicKey,
    #[error("Failed to parse secret key")]
    InvalidSecretKey,
    #[error("Signature verification failed")]
    VerificationFailed,
    #[error("Signature algorithm does not match the public key")]
    AlgorithmMismatch,
    #[error("Multisig public keys cannot be nested")]
    NestedMultisig,
    #[error("Invalid hex string: {0}")]
    HexError(String),
}
