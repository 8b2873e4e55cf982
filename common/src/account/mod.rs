use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;

/// Monotonic per-account transaction counter, checked against the committed
/// state during admission to reject replayed or out-of-order transactions.
pub type Sequence = u64;

/// Committed account metadata as read from state at verification time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    /// Stable account identifier assigned at account creation.
    pub account_number: u64,
    pub sequence: Sequence,
    /// Unset until the account has sent its first signed transaction.
    pub pubkey: Option<PublicKey>,
}

impl AccountMeta {
    pub fn new(account_number: u64, sequence: Sequence, pubkey: Option<PublicKey>) -> Self {
        AccountMeta {
            account_number,
            sequence,
            pubkey,
        }
    }
}
