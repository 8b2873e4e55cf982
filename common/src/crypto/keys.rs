use ed25519_dalek::{
    Signature as DalekSignature, SigningKey as Ed25519SigningKey,
    VerifyingKey as Ed25519VerifyingKey,
};
use k256::ecdsa::{
    signature::hazmat::{PrehashSigner as _, PrehashVerifier as _},
    signature::{Signer as _, Verifier as _},
    Signature as EcdsaSignature, SigningKey as Secp256k1SigningKey,
    VerifyingKey as Secp256k1VerifyingKey,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::{address::Address, error::CryptoError, hash::hash};
use crate::{
    config::MAX_MULTISIG_PARTICIPANTS,
    serializer::{Reader, ReaderError, Serializer, Writer},
};

/// Size of an Ed25519 public key in bytes.
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;
/// Size of a compressed SEC1 secp256k1 public key in bytes.
pub const SECP256K1_PUBLIC_KEY_SIZE: usize = 33;
/// Size of a signature in bytes, identical for both native algorithms.
pub const SIGNATURE_SIZE: usize = 64;

// Domain tags mixed into the address hash, one per key form.
const ADDRESS_TAG_ED25519: u8 = 0;
const ADDRESS_TAG_SECP256K1: u8 = 1;
const ADDRESS_TAG_MULTISIG: u8 = 2;

/// Account public key: one of the two native signature algorithms, or a
/// threshold multisig key aggregating several of them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicKey {
    Ed25519(#[serde(with = "hex::serde")] [u8; ED25519_PUBLIC_KEY_SIZE]),
    Secp256k1(#[serde(with = "hex::serde")] [u8; SECP256K1_PUBLIC_KEY_SIZE]),
    Multisig(MultisigPublicKey),
}

impl PublicKey {
    /// Derive the account address from this key.
    pub fn to_address(&self) -> Address {
        let mut bytes = Vec::new();
        match self {
            PublicKey::Ed25519(key) => {
                bytes.push(ADDRESS_TAG_ED25519);
                bytes.extend_from_slice(key);
            }
            PublicKey::Secp256k1(key) => {
                bytes.push(ADDRESS_TAG_SECP256K1);
                bytes.extend_from_slice(key);
            }
            PublicKey::Multisig(multisig) => {
                bytes.push(ADDRESS_TAG_MULTISIG);
                bytes.push(multisig.threshold());
                for sub_key in multisig.sub_keys() {
                    bytes.extend_from_slice(sub_key.to_address().as_bytes());
                }
            }
        }
        Address::new(hash(&bytes).to_bytes())
    }

    pub fn is_multisig(&self) -> bool {
        matches!(self, PublicKey::Multisig(_))
    }

    /// Verify a signature over a raw message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        match (self, signature) {
            (PublicKey::Ed25519(key), Signature::Ed25519(sig)) => {
                let verifying_key = Ed25519VerifyingKey::from_bytes(key)
                    .map_err(|_| CryptoError::InvalidPublicKey)?;
                verifying_key
                    .verify(message, &DalekSignature::from_bytes(sig))
                    .map_err(|_| CryptoError::VerificationFailed)
            }
            (PublicKey::Secp256k1(key), Signature::Secp256k1(sig)) => {
                let verifying_key = Secp256k1VerifyingKey::from_sec1_bytes(key)
                    .map_err(|_| CryptoError::InvalidPublicKey)?;
                let sig = EcdsaSignature::from_slice(sig)
                    .map_err(|_| CryptoError::VerificationFailed)?;
                verifying_key
                    .verify(message, &sig)
                    .map_err(|_| CryptoError::VerificationFailed)
            }
            (PublicKey::Multisig(_), _) => Err(CryptoError::AlgorithmMismatch),
            _ => Err(CryptoError::AlgorithmMismatch),
        }
    }

    /// Verify a signature over an already-computed 32-byte digest.
    /// Ed25519 signs the digest as a message; secp256k1 verifies the prehash.
    pub fn verify_prehash(&self, digest: &[u8; 32], signature: &Signature) -> Result<(), CryptoError> {
        match (self, signature) {
            (PublicKey::Ed25519(_), Signature::Ed25519(_)) => self.verify(digest, signature),
            (PublicKey::Secp256k1(key), Signature::Secp256k1(sig)) => {
                let verifying_key = Secp256k1VerifyingKey::from_sec1_bytes(key)
                    .map_err(|_| CryptoError::InvalidPublicKey)?;
                let sig = EcdsaSignature::from_slice(sig)
                    .map_err(|_| CryptoError::VerificationFailed)?;
                verifying_key
                    .verify_prehash(digest, &sig)
                    .map_err(|_| CryptoError::VerificationFailed)
            }
            (PublicKey::Multisig(_), _) => Err(CryptoError::AlgorithmMismatch),
            _ => Err(CryptoError::AlgorithmMismatch),
        }
    }

    /// Parse a raw 64-byte signature under this key's algorithm.
    pub fn parse_signature(&self, bytes: &[u8]) -> Result<Signature, CryptoError> {
        if bytes.len() != SIGNATURE_SIZE {
            return Err(CryptoError::InvalidSignatureLength {
                expected: SIGNATURE_SIZE,
                got: bytes.len(),
            });
        }
        let mut sig = [0u8; SIGNATURE_SIZE];
        sig.copy_from_slice(bytes);
        match self {
            PublicKey::Ed25519(_) => Ok(Signature::Ed25519(sig)),
            PublicKey::Secp256k1(_) => Ok(Signature::Secp256k1(sig)),
            PublicKey::Multisig(_) => Err(CryptoError::AlgorithmMismatch),
        }
    }
}

impl Serializer for PublicKey {
    fn write(&self, writer: &mut Writer) {
        match self {
            PublicKey::Ed25519(key) => {
                writer.write_u8(0);
                writer.write_bytes(key);
            }
            PublicKey::Secp256k1(key) => {
                writer.write_u8(1);
                writer.write_bytes(key);
            }
            PublicKey::Multisig(multisig) => {
                writer.write_u8(2);
                multisig.write(writer);
            }
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => PublicKey::Ed25519(reader.read_array()?),
            1 => PublicKey::Secp256k1(reader.read_array()?),
            2 => PublicKey::Multisig(MultisigPublicKey::read(reader)?),
            _ => return Err(ReaderError::InvalidValue),
        })
    }
}

/// Threshold public key: a signature set is valid when at least `threshold`
/// sub-keys have signed. Sub-keys are position-ordered; nesting is rejected.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MultisigPublicKey {
    threshold: u8,
    sub_keys: Vec<PublicKey>,
}

impl MultisigPublicKey {
    pub fn new(threshold: u8, sub_keys: Vec<PublicKey>) -> Result<Self, CryptoError> {
        let multisig = MultisigPublicKey { threshold, sub_keys };
        multisig.validate()?;
        Ok(multisig)
    }

    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.threshold == 0
            || self.threshold as usize > self.sub_keys.len()
            || self.sub_keys.len() > MAX_MULTISIG_PARTICIPANTS
        {
            return Err(CryptoError::InvalidPublicKey);
        }
        if self.sub_keys.iter().any(PublicKey::is_multisig) {
            return Err(CryptoError::NestedMultisig);
        }
        Ok(())
    }

    #[inline]
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    #[inline]
    pub fn sub_keys(&self) -> &[PublicKey] {
        &self.sub_keys
    }
}

impl Serializer for MultisigPublicKey {
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.threshold);
        writer.write_u8(self.sub_keys.len() as u8);
        for key in &self.sub_keys {
            key.write(writer);
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let threshold = reader.read_u8()?;
        let count = reader.read_u8()? as usize;
        let mut sub_keys = Vec::with_capacity(count);
        for _ in 0..count {
            sub_keys.push(PublicKey::read(reader)?);
        }
        MultisigPublicKey::new(threshold, sub_keys).map_err(|_| ReaderError::InvalidValue)
    }
}

/// A single signature, tagged with its algorithm.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signature {
    Ed25519(#[serde(with = "hex::serde")] [u8; SIGNATURE_SIZE]),
    Secp256k1(#[serde(with = "hex::serde")] [u8; SIGNATURE_SIZE]),
}

impl Signature {
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        match self {
            Signature::Ed25519(bytes) => bytes,
            Signature::Secp256k1(bytes) => bytes,
        }
    }
}

impl Serializer for Signature {
    fn write(&self, writer: &mut Writer) {
        match self {
            Signature::Ed25519(bytes) => {
                writer.write_u8(0);
                writer.write_bytes(bytes);
            }
            Signature::Secp256k1(bytes) => {
                writer.write_u8(1);
                writer.write_bytes(bytes);
            }
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => Signature::Ed25519(reader.read_array()?),
            1 => Signature::Secp256k1(reader.read_array()?),
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn size(&self) -> usize {
        1 + SIGNATURE_SIZE
    }
}

/// Signing handle used by transaction builders and tests.
pub enum KeyPair {
    Ed25519(Ed25519SigningKey),
    Secp256k1(Secp256k1SigningKey),
}

impl KeyPair {
    pub fn generate_ed25519() -> Self {
        KeyPair::Ed25519(Ed25519SigningKey::generate(&mut OsRng))
    }

    pub fn generate_secp256k1() -> Self {
        KeyPair::Secp256k1(Secp256k1SigningKey::random(&mut OsRng))
    }

    /// Rebuild an ed25519 keypair from a 32-byte seed. The seed copy is
    /// zeroized on drop.
    pub fn from_ed25519_seed(seed: &[u8; 32]) -> Self {
        let seed = Zeroizing::new(*seed);
        KeyPair::Ed25519(Ed25519SigningKey::from_bytes(&seed))
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            KeyPair::Ed25519(key) => PublicKey::Ed25519(key.verifying_key().to_bytes()),
            KeyPair::Secp256k1(key) => {
                let point = key.verifying_key().to_encoded_point(true);
                let mut bytes = [0u8; SECP256K1_PUBLIC_KEY_SIZE];
                bytes.copy_from_slice(point.as_bytes());
                PublicKey::Secp256k1(bytes)
            }
        }
    }

    pub fn address(&self) -> Address {
        self.public_key().to_address()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        match self {
            KeyPair::Ed25519(key) => Signature::Ed25519(key.sign(message).to_bytes()),
            KeyPair::Secp256k1(key) => {
                let sig: EcdsaSignature = key.sign(message);
                let mut bytes = [0u8; SIGNATURE_SIZE];
                bytes.copy_from_slice(&sig.to_bytes());
                Signature::Secp256k1(bytes)
            }
        }
    }

    /// Sign an already-computed 32-byte digest (typed-data flow).
    pub fn sign_prehash(&self, digest: &[u8; 32]) -> Result<Signature, CryptoError> {
        match self {
            KeyPair::Ed25519(_) => Ok(self.sign(digest)),
            KeyPair::Secp256k1(key) => {
                let sig: EcdsaSignature = key
                    .sign_prehash(digest)
                    .map_err(|_| CryptoError::InvalidSecretKey)?;
                let mut bytes = [0u8; SIGNATURE_SIZE];
                bytes.copy_from_slice(&sig.to_bytes());
                Ok(Signature::Secp256k1(bytes))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ed25519_sign_verify() {
        let keypair = KeyPair::generate_ed25519();
        let signature = keypair.sign(b"message");
        keypair
            .public_key()
            .verify(b"message", &signature)
            .expect("valid signature");
        assert!(keypair.public_key().verify(b"other", &signature).is_err());
    }

    #[test]
    fn test_secp256k1_prehash_roundtrip() {
        let keypair = KeyPair::generate_secp256k1();
        let digest = [7u8; 32];
        let signature = keypair.sign_prehash(&digest).expect("sign");
        keypair
            .public_key()
            .verify_prehash(&digest, &signature)
            .expect("valid prehash signature");

        let mut flipped = digest;
        flipped[0] ^= 1;
        assert!(keypair
            .public_key()
            .verify_prehash(&flipped, &signature)
            .is_err());
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let ed = KeyPair::generate_ed25519();
        let secp = KeyPair::generate_secp256k1();
        let signature = secp.sign(b"message");
        assert_eq!(
            ed.public_key().verify(b"message", &signature),
            Err(CryptoError::AlgorithmMismatch)
        );
    }

    #[test]
    fn test_addresses_differ_per_algorithm() {
        let ed = KeyPair::generate_ed25519();
        let secp = KeyPair::generate_secp256k1();
        assert_ne!(ed.address(), secp.address());
    }

    #[test]
    fn test_multisig_rejects_nesting() {
        let inner = MultisigPublicKey::new(
            1,
            vec![KeyPair::generate_ed25519().public_key()],
        )
        .expect("flat multisig");
        let result = MultisigPublicKey::new(1, vec![PublicKey::Multisig(inner)]);
        assert_eq!(result, Err(CryptoError::NestedMultisig));
    }

    #[test]
    fn test_public_key_wire_roundtrip() {
        let key = KeyPair::generate_secp256k1().public_key();
        let decoded = PublicKey::from_bytes(&key.to_bytes()).expect("decode");
        assert_eq!(key, decoded);
    }
}
