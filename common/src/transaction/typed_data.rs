use serde_json::Value;
use sha3::{Digest, Keccak256};

use crate::config::{
    TYPED_DATA_DOMAIN_NAME, TYPED_DATA_DOMAIN_VERSION, TYPED_DATA_VERIFYING_CONTRACT,
};

const DOMAIN_TYPE: &[u8] =
    b"TypedDomain(string name,string version,uint256 chainId,string verifyingContract)";

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

/// Signing domain separating typed-data digests from any other chain,
/// protocol version or verifying module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedDomain {
    name: &'static str,
    version: &'static str,
    chain_id: u64,
    verifying_contract: &'static str,
}

impl TypedDomain {
    /// The protocol domain for a given numeric chain id.
    pub fn for_chain(chain_id: u64) -> Self {
        TypedDomain {
            name: TYPED_DATA_DOMAIN_NAME,
            version: TYPED_DATA_DOMAIN_VERSION,
            chain_id,
            verifying_contract: TYPED_DATA_VERIFYING_CONTRACT,
        }
    }

    #[inline]
    pub fn get_chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn separator(&self) -> [u8; 32] {
        let mut chain_id = [0u8; 32];
        chain_id[24..].copy_from_slice(&self.chain_id.to_be_bytes());

        let mut buf = Vec::with_capacity(32 * 5);
        buf.extend_from_slice(&keccak256(DOMAIN_TYPE));
        buf.extend_from_slice(&keccak256(self.name.as_bytes()));
        buf.extend_from_slice(&keccak256(self.version.as_bytes()));
        buf.extend_from_slice(&chain_id);
        buf.extend_from_slice(&keccak256(self.verifying_contract.as_bytes()));
        keccak256(&buf)
    }
}

/// Structured document a typed-data signature commits to. Built from the
/// legacy canonical sign document, so the two modes can never diverge on
/// transaction content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedDocument {
    domain: TypedDomain,
    primary_type: String,
    payload: Value,
}

impl TypedDocument {
    /// Parse the legacy sign document and lift it into a typed document.
    /// The primary type is driven by the first message's kind, so documents
    /// for different message schemas hash under different type tags.
    pub fn from_sign_bytes(
        domain: TypedDomain,
        legacy_sign_bytes: &[u8],
    ) -> Result<Self, serde_json::Error> {
        let payload: Value = serde_json::from_slice(legacy_sign_bytes)?;
        let primary_type = primary_type_of(&payload);
        Ok(TypedDocument {
            domain,
            primary_type,
            payload,
        })
    }

    #[inline]
    pub fn get_primary_type(&self) -> &str {
        &self.primary_type
    }

    /// The domain-separated digest signatures are verified against:
    /// `keccak256(0x1901 || domain_separator || struct_hash)`.
    pub fn digest(&self) -> [u8; 32] {
        let mut struct_buf = Vec::with_capacity(64);
        struct_buf.extend_from_slice(&keccak256(self.primary_type.as_bytes()));
        struct_buf.extend_from_slice(&hash_value(&self.payload));
        let struct_hash = keccak256(&struct_buf);

        let mut buf = Vec::with_capacity(2 + 32 + 32);
        buf.extend_from_slice(&[0x19, 0x01]);
        buf.extend_from_slice(&self.domain.separator());
        buf.extend_from_slice(&struct_hash);
        keccak256(&buf)
    }
}

fn primary_type_of(payload: &Value) -> String {
    let msg_kind = payload
        .get("msgs")
        .and_then(Value::as_array)
        .and_then(|msgs| msgs.first())
        .and_then(Value::as_object)
        .and_then(|msg| msg.keys().next());
    match msg_kind {
        Some(kind) => format!("Tx:{}", kind),
        None => "Tx".to_string(),
    }
}

// Deterministic structural hash of a JSON value. serde_json objects iterate
// in key order, so identical documents hash identically regardless of how
// they were assembled.
fn hash_value(value: &Value) -> [u8; 32] {
    match value {
        Value::Null => keccak256(b"null"),
        Value::Bool(b) => keccak256(if *b { b"true" } else { b"false" }),
        Value::Number(n) => keccak256(n.to_string().as_bytes()),
        Value::String(s) => keccak256(s.as_bytes()),
        Value::Array(items) => {
            let mut buf = Vec::with_capacity(items.len() * 32);
            for item in items {
                buf.extend_from_slice(&hash_value(item));
            }
            keccak256(&buf)
        }
        Value::Object(fields) => {
            let mut buf = Vec::with_capacity(fields.len() * 64);
            for (key, field) in fields {
                buf.extend_from_slice(&keccak256(key.as_bytes()));
                buf.extend_from_slice(&hash_value(field));
            }
            keccak256(&buf)
        }
    }
}
