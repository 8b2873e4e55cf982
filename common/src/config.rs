// Admission limits and gas schedule. Constants are consensus-critical:
// changing any of them is a network upgrade.

// Gas charged per signature verification, keyed by the concrete algorithm of
// the verified key. Threshold multisigs charge per set sub-signature.
pub const GAS_PER_ED25519_SIGNATURE: u64 = 590;
pub const GAS_PER_SECP256K1_SIGNATURE: u64 = 1000;

// Gas charged per byte of encoded transaction, and per byte of memo on top
// (memos are pure storage cost).
pub const GAS_PER_TX_BYTE: u64 = 10;
pub const GAS_PER_MEMO_BYTE: u64 = 3;

pub const MAX_MEMO_SIZE: usize = 256;
// Maximum size of a fully encoded transaction
pub const MAX_TRANSACTION_SIZE: usize = 1024 * 1024; // 1 MB
// Maximum number of participants in a multi signature account
pub const MAX_MULTISIG_PARTICIPANTS: usize = 255;

// Embedded-VM batch limits
pub const MAX_VM_ACCOUNTS: usize = 256;
pub const MAX_VM_INSTRUCTIONS: usize = 64;
pub const MAX_VM_INSTRUCTION_DATA: usize = 10 * 1024;
pub const MAX_VM_COMPUTE_BUDGET: u64 = 1_400_000;

// Typed-data signing domain. The numeric chain id comes from the network,
// everything else is fixed per protocol version.
pub const TYPED_DATA_DOMAIN_NAME: &str = "Axon Web3";
pub const TYPED_DATA_DOMAIN_VERSION: &str = "1.0.0";
pub const TYPED_DATA_VERIFYING_CONTRACT: &str = "axon";
