mod error;
mod multisig_gas;
mod state;
mod typed_data;
mod vm_link;

pub use error::VerificationError;
pub use multisig_gas::{consume_multisig_gas, signature_cost};
pub use state::BlockchainAdmissionState;
pub use typed_data::TypedDataVerifier;
pub use vm_link::VmLinkVerifier;

use indexmap::IndexSet;
use log::{debug, trace};

use crate::{
    config::{GAS_PER_MEMO_BYTE, GAS_PER_TX_BYTE, MAX_MEMO_SIZE, MAX_TRANSACTION_SIZE},
    crypto::{Address, PublicKey},
    gas::GasMeter,
    serializer::Serializer,
    transaction::{
        sign_mode::sign_bytes, ExtensionOption, Message, SignMode, SignatureData, SignerData,
        Transaction, TypedDataExtension,
    },
};

/// Explicit pipeline configuration. The cross-VM link check is independently
/// switchable so operators disable it only by deliberate choice, never by
/// accident of transaction shape.
#[derive(Clone, Copy, Debug)]
pub struct DispatcherOptions {
    pub verify_vm_links: bool,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        DispatcherOptions {
            verify_vm_links: true,
        }
    }
}

/// Result of a successful admission pass, handed to the execution engine.
#[derive(Clone, Debug)]
pub struct AdmissionContext {
    pub gas_used: u64,
    pub gas_limit: Option<u64>,
    /// Native signers whose signatures were verified for this transaction
    pub verified_signers: IndexSet<Address>,
    pub simulate: bool,
}

/// Which decorator chain a transaction is routed through, decided once per
/// transaction from its declared extension options.
enum Route<'a> {
    Standard,
    TypedData(&'a TypedDataExtension),
}

/// Pre-execution admission pipeline. Selects a verification strategy per
/// transaction and runs the decorators strictly in order, threading one gas
/// meter; the first error aborts the whole transaction and is returned
/// verbatim.
pub struct Dispatcher {
    options: DispatcherOptions,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Dispatcher::new(DispatcherOptions::default())
    }
}

impl Dispatcher {
    pub fn new(options: DispatcherOptions) -> Self {
        Dispatcher { options }
    }

    /// Admit one decoded transaction against the given state snapshot.
    /// Invoked exactly once per transaction before any execution engine runs.
    /// Simulation runs the identical chain on an unbounded meter so gas
    /// estimates include the state-dependent decorators.
    pub async fn handle<E, B: BlockchainAdmissionState<E>>(
        &self,
        tx: &Transaction,
        state: &mut B,
        simulate: bool,
    ) -> Result<AdmissionContext, VerificationError<E>> {
        trace!(
            "admitting transaction: {} message(s), {} extension(s), simulate={}",
            tx.get_messages().len(),
            tx.get_extensions().len(),
            simulate
        );
        let route = Self::route(tx)?;
        Self::validate_basic(tx)?;

        if !simulate && tx.get_fee().get_gas_limit() == 0 {
            return Err(VerificationError::InvalidFormat("zero gas limit"));
        }
        let mut meter = if simulate {
            GasMeter::infinite()
        } else {
            GasMeter::finite(tx.get_fee().get_gas_limit())
        };

        // Expiry runs before anything that spends gas on cryptography or
        // link resolution
        Self::check_timeout_height(tx, state)?;
        Self::consume_size_gas(tx, &mut meter)?;
        self.deduct_fee(tx, &route, state).await?;

        let verified_signers = match route {
            Route::Standard => {
                self.verify_native_signatures(tx, state, &mut meter, simulate)
                    .await?
            }
            Route::TypedData(ext) => {
                TypedDataVerifier
                    .verify(tx, ext, state, &mut meter, simulate)
                    .await?
            }
        };

        self.increment_sequences(tx, state).await?;
        self.check_relay_replay(tx, state).await?;

        if let Some(batch) = tx.get_vm_batch() {
            if self.options.verify_vm_links {
                VmLinkVerifier
                    .verify(tx, batch, state, &verified_signers)
                    .await?;
            }
        }

        Ok(AdmissionContext {
            gas_used: meter.consumed(),
            gas_limit: meter.limit(),
            verified_signers,
            simulate,
        })
    }

    /// Dispatch rule, evaluated once: no extensions selects the standard
    /// chain, the single recognized typed-data extension selects the
    /// typed-data chain, anything else is unsupported by policy.
    fn route<E>(tx: &Transaction) -> Result<Route<'_>, VerificationError<E>> {
        match tx.get_extensions() {
            [] => Ok(Route::Standard),
            [ExtensionOption::TypedData(ext)] => Ok(Route::TypedData(ext)),
            [ExtensionOption::Unknown { type_tag }] => {
                debug!("rejecting unknown extension option tag {}", type_tag);
                Err(VerificationError::UnsupportedExtension(*type_tag))
            }
            _ => Err(VerificationError::MultipleExtensions),
        }
    }

    /// Stateless shape checks: message set, declared signature count, memo
    /// and encoded-size limits.
    fn validate_basic<E>(tx: &Transaction) -> Result<(), VerificationError<E>> {
        if tx.get_messages().is_empty() {
            return Err(VerificationError::InvalidFormat(
                "transaction carries no messages",
            ));
        }
        for message in tx.get_messages() {
            match message {
                Message::Unknown { type_tag } => {
                    return Err(VerificationError::UnsupportedMessage(*type_tag));
                }
                Message::VmBatch(payload) => {
                    if !payload.has_valid_format() {
                        return Err(VerificationError::InvalidFormat(
                            "malformed embedded VM batch",
                        ));
                    }
                }
                Message::Transfer(_) | Message::Relay(_) => {}
            }
        }

        let memo_size = tx.get_memo().len();
        if memo_size > MAX_MEMO_SIZE {
            return Err(VerificationError::MemoTooLarge {
                size: memo_size,
                max: MAX_MEMO_SIZE,
            });
        }
        let tx_size = tx.size();
        if tx_size > MAX_TRANSACTION_SIZE {
            return Err(VerificationError::TxTooLarge {
                size: tx_size,
                max: MAX_TRANSACTION_SIZE,
            });
        }

        let required = tx.required_signers();
        if tx.get_signatures().len() != required.len() {
            return Err(VerificationError::SignerCountMismatch {
                expected: required.len(),
                got: tx.get_signatures().len(),
            });
        }
        Ok(())
    }

    fn check_timeout_height<E, B: BlockchainAdmissionState<E>>(
        tx: &Transaction,
        state: &B,
    ) -> Result<(), VerificationError<E>> {
        let timeout = tx.get_timeout_height();
        let current = state.get_block_height();
        if timeout != 0 && current > timeout {
            debug!("transaction expired at height {}, current {}", timeout, current);
            return Err(VerificationError::TxTimeout { timeout, current });
        }
        Ok(())
    }

    /// Storage cost of the transaction itself: per encoded byte, plus the
    /// memo surcharge.
    fn consume_size_gas<E>(
        tx: &Transaction,
        meter: &mut GasMeter,
    ) -> Result<(), VerificationError<E>> {
        let memo_size = tx.get_memo().len() as u64;
        meter.consume(memo_size * GAS_PER_MEMO_BYTE, "memo size")?;
        meter.consume(tx.size() as u64 * GAS_PER_TX_BYTE, "transaction size")?;
        Ok(())
    }

    /// Resolve the paying account and hand the deduction to the state. The
    /// typed-data chain pays from the delegated fee payer; otherwise the
    /// explicitly declared payer or the first required signer pays.
    async fn deduct_fee<E, B: BlockchainAdmissionState<E>>(
        &self,
        tx: &Transaction,
        route: &Route<'_>,
        state: &mut B,
    ) -> Result<(), VerificationError<E>> {
        let fee = tx.get_fee();
        if fee.get_amount() == 0 {
            return Ok(());
        }
        let payer = match route {
            Route::TypedData(ext) => *ext.get_fee_payer(),
            Route::Standard => match fee.get_payer() {
                Some(payer) => *payer,
                None => *tx
                    .required_signers()
                    .first()
                    .ok_or(VerificationError::InvalidFormat("no signer to pay the fee"))?,
            },
        };
        state
            .deduct_fee(&payer, fee)
            .await
            .map_err(VerificationError::State)
    }

    /// Standard-chain signature verification over the canonical sign bytes,
    /// with threshold keys charged through the multisig gas accountant.
    async fn verify_native_signatures<E, B: BlockchainAdmissionState<E>>(
        &self,
        tx: &Transaction,
        state: &mut B,
        meter: &mut GasMeter,
        simulate: bool,
    ) -> Result<IndexSet<Address>, VerificationError<E>> {
        let required = tx.required_signers();
        let network = state.get_network();
        let mut verified = IndexSet::with_capacity(required.len());

        for (address, slot) in required.iter().zip(tx.get_signatures()) {
            let account = state
                .get_account(address)
                .await
                .map_err(VerificationError::State)?
                .ok_or(VerificationError::AccountNotFound(*address))?;
            if slot.sequence != account.sequence {
                return Err(VerificationError::InvalidSequence {
                    address: *address,
                    expected: account.sequence,
                    got: slot.sequence,
                });
            }
            if slot.pubkey.to_address() != *address {
                return Err(VerificationError::PubkeyMismatch(*address));
            }

            let signer_data = SignerData {
                address: *address,
                chain_id: network.chain_id().to_string(),
                account_number: account.account_number,
                sequence: account.sequence,
                pubkey: Some(slot.pubkey.clone()),
            };

            match &slot.data {
                SignatureData::Single { mode, signature } => {
                    let cost = signature_cost(&slot.pubkey)
                        .ok_or(VerificationError::SignatureShapeMismatch)?;
                    meter.consume(cost, "signature verification")?;
                    let bytes = sign_bytes(*mode, &signer_data, tx)?;
                    if !simulate {
                        slot.pubkey.verify(&bytes, signature).map_err(|_| {
                            debug!("signature of {} is invalid", address);
                            VerificationError::InvalidSignature
                        })?;
                    }
                }
                SignatureData::Multi(multisig) => {
                    let PublicKey::Multisig(multisig_key) = &slot.pubkey else {
                        return Err(VerificationError::SignatureShapeMismatch);
                    };
                    consume_multisig_gas(meter, multisig, multisig_key)?;
                    if multisig.count() < multisig_key.threshold() as usize {
                        return Err(VerificationError::MultisigThresholdNotMet {
                            threshold: multisig_key.threshold(),
                            got: multisig.count(),
                        });
                    }
                    // Sub-keys sign the legacy canonical document
                    let bytes = sign_bytes(SignMode::Legacy, &signer_data, tx)?;
                    if !simulate {
                        for (index, signature) in multisig.iter_set() {
                            let sub_key = &multisig_key.sub_keys()[index];
                            sub_key.verify(&bytes, signature).map_err(|_| {
                                debug!(
                                    "multisig sub-signature {} of {} is invalid",
                                    index, address
                                );
                                VerificationError::InvalidSignature
                            })?;
                        }
                    }
                }
            }
            verified.insert(*address);
        }
        Ok(verified)
    }

    /// Write back incremented sequences so a second submission of the same
    /// transaction fails the sequence check.
    async fn increment_sequences<E, B: BlockchainAdmissionState<E>>(
        &self,
        tx: &Transaction,
        state: &mut B,
    ) -> Result<(), VerificationError<E>> {
        for address in tx.required_signers() {
            let account = state
                .get_account(&address)
                .await
                .map_err(VerificationError::State)?
                .ok_or(VerificationError::AccountNotFound(address))?;
            state
                .set_account_sequence(&address, account.sequence + 1)
                .await
                .map_err(VerificationError::State)?;
        }
        Ok(())
    }

    /// Replay guard for relayed packets: a receipt already recorded on-chain
    /// makes the delivery redundant.
    async fn check_relay_replay<E, B: BlockchainAdmissionState<E>>(
        &self,
        tx: &Transaction,
        state: &mut B,
    ) -> Result<(), VerificationError<E>> {
        for message in tx.get_messages() {
            if let Message::Relay(relay) = message {
                if state
                    .is_relay_processed(relay)
                    .await
                    .map_err(VerificationError::State)?
                {
                    return Err(VerificationError::RedundantRelay);
                }
            }
        }
        Ok(())
    }
}
