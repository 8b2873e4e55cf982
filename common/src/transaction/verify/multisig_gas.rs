use crate::{
    config::{GAS_PER_ED25519_SIGNATURE, GAS_PER_SECP256K1_SIGNATURE},
    crypto::{MultisigPublicKey, PublicKey},
    gas::GasMeter,
    transaction::MultiSigData,
};

use super::error::VerificationError;

/// Verification cost of one signature under the key's concrete algorithm.
/// Threshold keys have no flat cost; they are charged per sub-signature.
pub fn signature_cost(pubkey: &PublicKey) -> Option<u64> {
    match pubkey {
        PublicKey::Ed25519(_) => Some(GAS_PER_ED25519_SIGNATURE),
        PublicKey::Secp256k1(_) => Some(GAS_PER_SECP256K1_SIGNATURE),
        PublicKey::Multisig(_) => None,
    }
}

/// Charge gas proportional to the cryptographic work a threshold signature
/// requires: each present sub-signature costs its sub-key's verification
/// price, absent positions cost nothing. Walks sub-key positions in
/// ascending order, so a meter exhaustion reports exactly how far
/// verification would have progressed. No partial charge is refunded.
pub fn consume_multisig_gas<E>(
    meter: &mut GasMeter,
    multisig: &MultiSigData,
    pubkey: &MultisigPublicKey,
) -> Result<(), VerificationError<E>> {
    let sub_keys = pubkey.sub_keys();
    if multisig.positions() != sub_keys.len() {
        return Err(VerificationError::MultisigParticipants {
            expected: sub_keys.len(),
            got: multisig.positions(),
        });
    }
    for (index, _signature) in multisig.iter_set() {
        // Nested multisig sub-keys are rejected at key construction, so a
        // flat cost always exists here.
        let cost = signature_cost(&sub_keys[index])
            .ok_or(VerificationError::SignatureShapeMismatch)?;
        meter.consume(cost, "multisig sub-signature verification")?;
    }
    Ok(())
}
