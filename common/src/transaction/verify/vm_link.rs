use indexmap::IndexSet;
use log::{debug, trace};

use crate::{
    crypto::Address,
    transaction::{Transaction, VmBatchPayload},
};

use super::{error::VerificationError, state::BlockchainAdmissionState};

/// Proves every signer the embedded batch implies in the foreign address
/// space is backed by a cryptographically verified native signature, through
/// the persisted identity-link registry. Without this check a batch could
/// declare any foreign account as signer without ever controlling a key in
/// either address space.
///
/// Must run after signature verification has produced the verified native
/// signer set; that postcondition is its only security dependency. Purely
/// read-only: no link is created here and execution has not begun.
pub struct VmLinkVerifier;

impl VmLinkVerifier {
    pub async fn verify<E, B: BlockchainAdmissionState<E>>(
        &self,
        tx: &Transaction,
        batch: &VmBatchPayload,
        state: &mut B,
        verified_signers: &IndexSet<Address>,
    ) -> Result<(), VerificationError<E>> {
        // The batch owns the whole transaction: one compute budget, one
        // atomicity boundary. Rejected before any signer resolution.
        if tx.get_messages().len() != 1 {
            debug!(
                "embedded batch combined with {} other message(s)",
                tx.get_messages().len() - 1
            );
            return Err(VerificationError::BatchNotAlone);
        }

        // Every native signer the batch claims must be linked
        for signer in batch.get_signers() {
            let link = state
                .get_link_by_address(signer)
                .await
                .map_err(VerificationError::State)?;
            if link.is_none() {
                return Err(VerificationError::UnlinkedNativeSigner(*signer));
            }
        }

        // Every instruction account flagged as signer must resolve, through
        // the registry, to a member of the verified signer set
        let accounts = batch.get_accounts();
        for instruction in batch.get_instructions() {
            for meta in &instruction.accounts {
                if !meta.is_signer {
                    continue;
                }
                let foreign = accounts.get(meta.caller_index as usize).ok_or(
                    VerificationError::InvalidAccountIndex {
                        index: meta.caller_index,
                        len: accounts.len(),
                    },
                )?;
                let link = state
                    .get_link_by_foreign_key(foreign)
                    .await
                    .map_err(VerificationError::State)?
                    .ok_or(VerificationError::UnlinkedForeignAccount(*foreign))?;
                if !verified_signers.contains(link.native()) {
                    return Err(VerificationError::UnauthorizedForeignSigner {
                        foreign: *foreign,
                        native: *link.native(),
                    });
                }
                trace!("foreign signer {} authorized via {}", foreign, link.native());
            }
        }

        Ok(())
    }
}
