use indexmap::IndexSet;
use log::{debug, trace};

use crate::{
    crypto::Address,
    gas::GasMeter,
    transaction::{
        sign_mode::sign_bytes,
        typed_data::{TypedDocument, TypedDomain},
        SignMode, SignatureData, SignerData, Transaction, TypedDataExtension,
    },
};

use super::{
    error::VerificationError, multisig_gas::signature_cost, state::BlockchainAdmissionState,
};

/// Signature-verification strategy for delegated-fee transactions signed
/// over a structured, domain-separated document instead of the flat
/// canonical sign bytes.
pub struct TypedDataVerifier;

impl TypedDataVerifier {
    /// Verify the transaction's signature slot and the fee payer's detached
    /// consent signature against the typed-data digest. Returns the verified
    /// native signer set on success.
    pub async fn verify<E, B: BlockchainAdmissionState<E>>(
        &self,
        tx: &Transaction,
        ext: &TypedDataExtension,
        state: &mut B,
        meter: &mut GasMeter,
        simulate: bool,
    ) -> Result<IndexSet<Address>, VerificationError<E>> {
        let network = state.get_network();
        let expected_chain_id = network.typed_data_chain_id();
        if ext.get_typed_data_chain_id() != expected_chain_id {
            return Err(VerificationError::InvalidChainId {
                expected: expected_chain_id,
                got: ext.get_typed_data_chain_id(),
            });
        }

        // Typed-data transactions are wallet-originated and carry exactly one
        // signer; the delegated fee payer signs separately below.
        let required = tx.required_signers();
        if required.len() != 1 || tx.get_signatures().len() != 1 {
            return Err(VerificationError::InvalidFormat(
                "typed-data transactions declare exactly one signer",
            ));
        }
        let address = required[0];
        let slot = &tx.get_signatures()[0];

        let account = state
            .get_account(&address)
            .await
            .map_err(VerificationError::State)?
            .ok_or(VerificationError::AccountNotFound(address))?;
        if slot.sequence != account.sequence {
            return Err(VerificationError::InvalidSequence {
                address,
                expected: account.sequence,
                got: slot.sequence,
            });
        }
        if slot.pubkey.to_address() != address {
            return Err(VerificationError::PubkeyMismatch(address));
        }

        let (mode, signature) = match &slot.data {
            SignatureData::Single { mode, signature } => (*mode, signature),
            // Threshold sets have no typed-data representation
            SignatureData::Multi(_) => return Err(VerificationError::UnsupportedSignMode),
        };
        if mode != SignMode::Legacy {
            debug!("typed-data verification with non-legacy mode {:?}", mode);
            return Err(VerificationError::UnsupportedSignMode);
        }

        let cost = signature_cost(&slot.pubkey)
            .ok_or(VerificationError::SignatureShapeMismatch)?;
        meter.consume(cost, "typed-data signature verification")?;

        let signer_data = SignerData {
            address,
            chain_id: network.chain_id().to_string(),
            account_number: account.account_number,
            sequence: account.sequence,
            pubkey: Some(slot.pubkey.clone()),
        };
        let legacy_bytes = sign_bytes(SignMode::Legacy, &signer_data, tx)?;
        let document =
            TypedDocument::from_sign_bytes(TypedDomain::for_chain(expected_chain_id), &legacy_bytes)?;
        let digest = document.digest();
        trace!(
            "typed-data digest {} for signer {}",
            hex::encode(digest),
            address
        );

        if !simulate {
            slot.pubkey
                .verify_prehash(&digest, signature)
                .map_err(|_| VerificationError::InvalidSignature)?;
        }

        // The fee payer consents to the deduction by signing the same digest
        // with its on-chain key, outside the ordinary signature list.
        let payer_address = *ext.get_fee_payer();
        let payer_key = state
            .get_account(&payer_address)
            .await
            .map_err(VerificationError::State)?
            .and_then(|meta| meta.pubkey)
            .ok_or(VerificationError::FeePayerUnresolved(payer_address))?;
        let payer_cost = signature_cost(&payer_key)
            .ok_or(VerificationError::SignatureShapeMismatch)?;
        meter.consume(payer_cost, "fee payer signature verification")?;
        if !simulate {
            let payer_sig = payer_key
                .parse_signature(ext.get_fee_payer_sig())
                .map_err(VerificationError::Crypto)?;
            payer_key
                .verify_prehash(&digest, &payer_sig)
                .map_err(|_| VerificationError::InvalidSignature)?;
        }

        let mut verified = IndexSet::with_capacity(1);
        verified.insert(address);
        Ok(verified)
    }
}
