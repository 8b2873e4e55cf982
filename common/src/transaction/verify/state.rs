use async_trait::async_trait;

use crate::{
    account::AccountMeta,
    crypto::Address,
    link::{ForeignPubkey, IdentityLink},
    network::Network,
    transaction::{Fee, RelayPayload},
};

/// Virtual snapshot of the chain state a transaction is admitted against,
/// committed or simulated. All lookups are synchronous reads against the
/// snapshot; implementations must not block.
#[async_trait]
pub trait BlockchainAdmissionState<E> {
    /// Get the committed metadata of an account, if it exists.
    async fn get_account(&mut self, address: &Address) -> Result<Option<AccountMeta>, E>;

    /// Write back an account sequence after successful verification.
    async fn set_account_sequence(&mut self, address: &Address, sequence: u64) -> Result<(), E>;

    /// Deduct the declared fee from the payer. Balance bookkeeping lives
    /// outside the pipeline; failures surface as state errors.
    async fn deduct_fee(&mut self, payer: &Address, fee: &Fee) -> Result<(), E>;

    /// Resolve a native address to its embedded-VM identity link.
    async fn get_link_by_address(
        &mut self,
        address: &Address,
    ) -> Result<Option<IdentityLink>, E>;

    /// Resolve an embedded-VM public key back to its identity link.
    async fn get_link_by_foreign_key(
        &mut self,
        key: &ForeignPubkey,
    ) -> Result<Option<IdentityLink>, E>;

    /// Whether this relayed packet receipt was already recorded on-chain.
    async fn is_relay_processed(&mut self, relay: &RelayPayload) -> Result<bool, E>;

    /// Get the network type (for chain-id validation)
    fn get_network(&self) -> Network;

    /// Get the block height the transaction is admitted at
    fn get_block_height(&self) -> u64;
}
