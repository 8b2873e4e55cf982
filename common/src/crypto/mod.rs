mod address;
mod error;
mod hash;
mod keys;

pub use address::{Address, ADDRESS_SIZE};
pub use error::CryptoError;
pub use hash::{hash, Hash, Hashable, HASH_SIZE};
pub use keys::{
    KeyPair, MultisigPublicKey, PublicKey, Signature, ED25519_PUBLIC_KEY_SIZE,
    SECP256K1_PUBLIC_KEY_SIZE, SIGNATURE_SIZE,
};
