use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::{
    account::AccountMeta,
    config::{GAS_PER_ED25519_SIGNATURE, GAS_PER_MEMO_BYTE, GAS_PER_TX_BYTE},
    crypto::{Address, Hash, KeyPair, MultisigPublicKey, PublicKey},
    gas::GasMeter,
    link::{ForeignPubkey, IdentityLink},
    network::Network,
    serializer::Serializer,
    transaction::{
        multisig::MultiSigData,
        sign_mode::sign_bytes,
        typed_data::{TypedDocument, TypedDomain},
        verify::{BlockchainAdmissionState, Dispatcher, DispatcherOptions, VerificationError},
        ExtensionOption, Fee, Message, RelayPayload, SignMode, SignatureData, SignatureV2,
        SignerData, Transaction, TransferPayload, TypedDataExtension, VmAccountMeta,
        VmBatchPayload, VmInstruction,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct TestError(&'static str);

struct ChainState {
    accounts: HashMap<Address, AccountMeta>,
    balances: HashMap<Address, u64>,
    links_by_native: HashMap<Address, IdentityLink>,
    links_by_foreign: HashMap<ForeignPubkey, IdentityLink>,
    relayed: HashSet<(String, u64)>,
    network: Network,
    height: u64,
    next_account_number: u64,
}

impl ChainState {
    fn new() -> Self {
        ChainState {
            accounts: HashMap::new(),
            balances: HashMap::new(),
            links_by_native: HashMap::new(),
            links_by_foreign: HashMap::new(),
            relayed: HashSet::new(),
            network: Network::Devnet,
            height: 100,
            next_account_number: 1,
        }
    }

    fn register(&mut self, pubkey: PublicKey, balance: u64) -> Address {
        let address = pubkey.to_address();
        let account_number = self.next_account_number;
        self.next_account_number += 1;
        self.accounts
            .insert(address, AccountMeta::new(account_number, 0, Some(pubkey)));
        self.balances.insert(address, balance);
        address
    }

    fn link(&mut self, native: Address, foreign: ForeignPubkey) {
        let link = IdentityLink::new(native, foreign);
        self.links_by_native.insert(native, link.clone());
        self.links_by_foreign.insert(foreign, link);
    }

    fn balance_of(&self, address: &Address) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    fn sequence_of(&self, address: &Address) -> u64 {
        self.accounts
            .get(address)
            .map(|meta| meta.sequence)
            .unwrap_or(0)
    }
}

#[async_trait]
impl BlockchainAdmissionState<TestError> for ChainState {
    async fn get_account(&mut self, address: &Address) -> Result<Option<AccountMeta>, TestError> {
        Ok(self.accounts.get(address).cloned())
    }

    async fn set_account_sequence(
        &mut self,
        address: &Address,
        sequence: u64,
    ) -> Result<(), TestError> {
        let meta = self
            .accounts
            .get_mut(address)
            .ok_or(TestError("unknown account"))?;
        meta.sequence = sequence;
        Ok(())
    }

    async fn deduct_fee(&mut self, payer: &Address, fee: &Fee) -> Result<(), TestError> {
        let balance = self
            .balances
            .get_mut(payer)
            .ok_or(TestError("unknown fee payer"))?;
        if *balance < fee.get_amount() {
            return Err(TestError("insufficient balance for fee"));
        }
        *balance -= fee.get_amount();
        Ok(())
    }

    async fn get_link_by_address(
        &mut self,
        address: &Address,
    ) -> Result<Option<IdentityLink>, TestError> {
        Ok(self.links_by_native.get(address).cloned())
    }

    async fn get_link_by_foreign_key(
        &mut self,
        key: &ForeignPubkey,
    ) -> Result<Option<IdentityLink>, TestError> {
        Ok(self.links_by_foreign.get(key).cloned())
    }

    async fn is_relay_processed(&mut self, relay: &RelayPayload) -> Result<bool, TestError> {
        Ok(self
            .relayed
            .contains(&(relay.get_channel().to_string(), relay.get_packet_sequence())))
    }

    fn get_network(&self) -> Network {
        self.network
    }

    fn get_block_height(&self) -> u64 {
        self.height
    }
}

fn default_fee() -> Fee {
    Fee::new(500, 200_000, None)
}

fn transfer_message(source: Address) -> Message {
    Message::Transfer(TransferPayload::new(
        source,
        Address::new([0xaa; 32]),
        Hash::zero(),
        1_000,
    ))
}

fn signer_data_for(state: &ChainState, address: Address, pubkey: PublicKey) -> SignerData {
    let meta = state.accounts.get(&address).expect("account registered");
    SignerData {
        address,
        chain_id: state.network.chain_id().to_string(),
        account_number: meta.account_number,
        sequence: meta.sequence,
        pubkey: Some(pubkey),
    }
}

fn body_tx(messages: Vec<Message>, fee: Fee, extensions: Vec<ExtensionOption>) -> Transaction {
    Transaction::new(messages, fee, String::new(), 0, extensions, Vec::new())
}

/// Sign a single-signer transaction body and return the completed transaction.
fn sign_tx(state: &ChainState, keypair: &KeyPair, body: Transaction, mode: SignMode) -> Transaction {
    let data = signer_data_for(state, keypair.address(), keypair.public_key());
    let bytes = sign_bytes(mode, &data, &body).expect("sign doc");
    let signature = SignatureV2 {
        pubkey: keypair.public_key(),
        data: SignatureData::Single {
            mode,
            signature: keypair.sign(&bytes),
        },
        sequence: data.sequence,
    };
    Transaction::new(
        body.get_messages().to_vec(),
        body.get_fee().clone(),
        body.get_memo().to_string(),
        body.get_timeout_height(),
        body.get_extensions().to_vec(),
        vec![signature],
    )
}

fn signed_transfer(state: &ChainState, keypair: &KeyPair) -> Transaction {
    let body = body_tx(
        vec![transfer_message(keypair.address())],
        default_fee(),
        Vec::new(),
    );
    sign_tx(state, keypair, body, SignMode::Direct)
}

/// Build a fully signed typed-data transaction with a delegated fee payer.
fn typed_data_tx(
    state: &ChainState,
    sender: &KeyPair,
    payer: &KeyPair,
    typed_data_chain_id: u64,
) -> Transaction {
    let placeholder = ExtensionOption::TypedData(TypedDataExtension::new(
        typed_data_chain_id,
        payer.address(),
        Vec::new(),
    ));
    let body = body_tx(
        vec![transfer_message(sender.address())],
        default_fee(),
        vec![placeholder],
    );
    let data = signer_data_for(state, sender.address(), sender.public_key());
    let legacy_bytes = sign_bytes(SignMode::Legacy, &data, &body).expect("sign doc");
    let digest = TypedDocument::from_sign_bytes(
        TypedDomain::for_chain(typed_data_chain_id),
        &legacy_bytes,
    )
    .expect("document")
    .digest();

    let sender_sig = sender.sign_prehash(&digest).expect("sender signs");
    let payer_sig = payer.sign_prehash(&digest).expect("payer signs");
    let extension = ExtensionOption::TypedData(TypedDataExtension::new(
        typed_data_chain_id,
        payer.address(),
        payer_sig.as_bytes().to_vec(),
    ));
    Transaction::new(
        body.get_messages().to_vec(),
        body.get_fee().clone(),
        String::new(),
        0,
        vec![extension],
        vec![SignatureV2 {
            pubkey: sender.public_key(),
            data: SignatureData::Single {
                mode: SignMode::Legacy,
                signature: sender_sig,
            },
            sequence: data.sequence,
        }],
    )
}

fn vm_batch_message(
    sender: Address,
    accounts: Vec<ForeignPubkey>,
    signer_index: u16,
) -> Message {
    Message::VmBatch(VmBatchPayload::new(
        sender,
        vec![sender],
        accounts.clone(),
        vec![VmInstruction {
            program_index: (accounts.len() - 1) as u16,
            accounts: vec![VmAccountMeta {
                caller_index: signer_index,
                is_signer: true,
                is_writable: true,
            }],
            data: vec![1, 2, 3],
        }],
        100_000,
    ))
}

#[tokio::test]
async fn test_standard_transfer_accepted() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 10_000);

    let tx = signed_transfer(&state, &sender);
    let context = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect("admitted");

    assert!(context.verified_signers.contains(&sender.address()));
    assert!(context.gas_used > 0);
    assert_eq!(state.sequence_of(&sender.address()), 1);
    // fee was deducted from the sender, the default payer
    assert_eq!(state.balance_of(&sender.address()), 10_000 - 500);
}

#[tokio::test]
async fn test_standard_gas_accounting_exact() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 10_000);

    let tx = signed_transfer(&state, &sender);
    let context = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect("admitted");

    let expected = tx.get_memo().len() as u64 * GAS_PER_MEMO_BYTE
        + tx.size() as u64 * GAS_PER_TX_BYTE
        + GAS_PER_ED25519_SIGNATURE;
    assert_eq!(context.gas_used, expected);
}

#[tokio::test]
async fn test_standard_rejects_invalid_signature() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 10_000);

    let body = body_tx(
        vec![transfer_message(sender.address())],
        default_fee(),
        Vec::new(),
    );
    let data = signer_data_for(&state, sender.address(), sender.public_key());
    // signature over unrelated bytes
    let signature = SignatureV2 {
        pubkey: sender.public_key(),
        data: SignatureData::Single {
            mode: SignMode::Direct,
            signature: sender.sign(b"unrelated"),
        },
        sequence: data.sequence,
    };
    let tx = Transaction::new(
        body.get_messages().to_vec(),
        default_fee(),
        String::new(),
        0,
        Vec::new(),
        vec![signature],
    );

    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("rejected");
    assert!(matches!(err, VerificationError::InvalidSignature));
}

#[tokio::test]
async fn test_sequence_mismatch_is_replay_violation() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 10_000);

    let tx = signed_transfer(&state, &sender);
    Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect("first admission");

    // identical transaction again: committed sequence moved to 1
    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("replay rejected");
    assert!(matches!(
        err,
        VerificationError::InvalidSequence { expected: 1, got: 0, .. }
    ));
}

#[tokio::test]
async fn test_unknown_extension_rejected_before_any_decorator() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 10_000);

    let body = body_tx(
        vec![transfer_message(sender.address())],
        default_fee(),
        vec![ExtensionOption::Unknown { type_tag: 42 }],
    );
    let tx = sign_tx(&state, &sender, body, SignMode::Direct);

    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("rejected");
    assert!(matches!(err, VerificationError::UnsupportedExtension(42)));
    // dispatch failed before any decorator ran: no fee charged, no sequence moved
    assert_eq!(state.balance_of(&sender.address()), 10_000);
    assert_eq!(state.sequence_of(&sender.address()), 0);
}

#[tokio::test]
async fn test_multiple_extensions_rejected() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    let payer = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 10_000);
    state.register(payer.public_key(), 10_000);

    let ext = ExtensionOption::TypedData(TypedDataExtension::new(
        state.network.typed_data_chain_id(),
        payer.address(),
        Vec::new(),
    ));
    let body = body_tx(
        vec![transfer_message(sender.address())],
        default_fee(),
        vec![ext.clone(), ext],
    );
    let tx = sign_tx(&state, &sender, body, SignMode::Legacy);

    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("rejected");
    assert!(matches!(err, VerificationError::MultipleExtensions));
}

#[tokio::test]
async fn test_unknown_message_rejected() {
    let mut state = ChainState::new();
    let tx = Transaction::new(
        vec![Message::Unknown { type_tag: 99 }],
        default_fee(),
        String::new(),
        0,
        Vec::new(),
        Vec::new(),
    );
    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("rejected");
    assert!(matches!(err, VerificationError::UnsupportedMessage(99)));
}

#[tokio::test]
async fn test_timeout_height_enforced() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 10_000);

    let body = Transaction::new(
        vec![transfer_message(sender.address())],
        default_fee(),
        String::new(),
        state.height - 1, // expired
        Vec::new(),
        Vec::new(),
    );
    let tx = sign_tx(&state, &sender, body, SignMode::Direct);

    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("expired");
    assert!(matches!(
        err,
        VerificationError::TxTimeout { timeout: 99, current: 100 }
    ));
}

#[tokio::test]
async fn test_timeout_at_exact_height_still_valid() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 10_000);

    let body = Transaction::new(
        vec![transfer_message(sender.address())],
        default_fee(),
        String::new(),
        state.height,
        Vec::new(),
        Vec::new(),
    );
    let tx = sign_tx(&state, &sender, body, SignMode::Direct);
    Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect("still valid at its timeout height");
}

#[tokio::test]
async fn test_out_of_gas_aborts_admission() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 10_000);

    let body = body_tx(
        vec![transfer_message(sender.address())],
        Fee::new(500, 10, None), // far below the size charge
        Vec::new(),
    );
    let tx = sign_tx(&state, &sender, body, SignMode::Direct);

    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("exhausted");
    assert!(matches!(err, VerificationError::OutOfGas(_)));
}

#[tokio::test]
async fn test_signer_count_mismatch_rejected() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 10_000);

    let tx = body_tx(
        vec![transfer_message(sender.address())],
        default_fee(),
        Vec::new(),
    );
    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("no signatures");
    assert!(matches!(
        err,
        VerificationError::SignerCountMismatch { expected: 1, got: 0 }
    ));
}

#[tokio::test]
async fn test_multisig_transfer_accepted_and_charged() {
    let mut state = ChainState::new();
    let members: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate_ed25519()).collect();
    let multisig_key = MultisigPublicKey::new(
        2,
        members.iter().map(KeyPair::public_key).collect(),
    )
    .expect("valid key");
    let pubkey = PublicKey::Multisig(multisig_key);
    let address = state.register(pubkey.clone(), 10_000);

    let body = body_tx(vec![transfer_message(address)], default_fee(), Vec::new());
    let data = signer_data_for(&state, address, pubkey.clone());
    let bytes = sign_bytes(SignMode::Legacy, &data, &body).expect("sign doc");

    // members 0 and 2 sign; position 1 stays empty
    let multisig = MultiSigData::new(vec![
        Some(members[0].sign(&bytes)),
        None,
        Some(members[2].sign(&bytes)),
    ]);
    let tx = Transaction::new(
        body.get_messages().to_vec(),
        default_fee(),
        String::new(),
        0,
        Vec::new(),
        vec![SignatureV2 {
            pubkey,
            data: SignatureData::Multi(multisig),
            sequence: 0,
        }],
    );

    let context = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect("admitted");
    let expected = tx.size() as u64 * GAS_PER_TX_BYTE + 2 * GAS_PER_ED25519_SIGNATURE;
    assert_eq!(context.gas_used, expected);
    assert!(context.verified_signers.contains(&address));
}

#[tokio::test]
async fn test_multisig_below_threshold_rejected() {
    let mut state = ChainState::new();
    let members: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate_ed25519()).collect();
    let multisig_key = MultisigPublicKey::new(
        2,
        members.iter().map(KeyPair::public_key).collect(),
    )
    .expect("valid key");
    let pubkey = PublicKey::Multisig(multisig_key);
    let address = state.register(pubkey.clone(), 10_000);

    let body = body_tx(vec![transfer_message(address)], default_fee(), Vec::new());
    let data = signer_data_for(&state, address, pubkey.clone());
    let bytes = sign_bytes(SignMode::Legacy, &data, &body).expect("sign doc");

    let multisig = MultiSigData::new(vec![Some(members[0].sign(&bytes)), None, None]);
    let tx = Transaction::new(
        body.get_messages().to_vec(),
        default_fee(),
        String::new(),
        0,
        Vec::new(),
        vec![SignatureV2 {
            pubkey,
            data: SignatureData::Multi(multisig),
            sequence: 0,
        }],
    );

    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("below threshold");
    assert!(matches!(
        err,
        VerificationError::MultisigThresholdNotMet { threshold: 2, got: 1 }
    ));
}

#[tokio::test]
async fn test_typed_data_delegated_fee_accepted() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_secp256k1();
    let payer = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 0); // sender holds nothing
    state.register(payer.public_key(), 10_000);

    let tx = typed_data_tx(&state, &sender, &payer, state.network.typed_data_chain_id());
    let context = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect("admitted");

    assert!(context.verified_signers.contains(&sender.address()));
    // delegated fee came out of the payer, not the sender
    assert_eq!(state.balance_of(&payer.address()), 10_000 - 500);
    assert_eq!(state.balance_of(&sender.address()), 0);
    assert_eq!(state.sequence_of(&sender.address()), 1);
}

#[tokio::test]
async fn test_typed_data_rejects_wrong_chain_id() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_secp256k1();
    let payer = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 0);
    state.register(payer.public_key(), 10_000);

    let tx = typed_data_tx(&state, &sender, &payer, 7777);
    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("rejected");
    assert!(matches!(
        err,
        VerificationError::InvalidChainId { got: 7777, .. }
    ));
}

#[tokio::test]
async fn test_typed_data_rejects_non_legacy_mode() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_secp256k1();
    let payer = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 0);
    state.register(payer.public_key(), 10_000);

    let mut tx = typed_data_tx(&state, &sender, &payer, state.network.typed_data_chain_id());
    // re-declare the slot under the direct mode
    let slot = tx.get_signatures()[0].clone();
    let SignatureData::Single { signature, .. } = slot.data else {
        panic!("single slot expected");
    };
    tx = Transaction::new(
        tx.get_messages().to_vec(),
        tx.get_fee().clone(),
        String::new(),
        0,
        tx.get_extensions().to_vec(),
        vec![SignatureV2 {
            pubkey: slot.pubkey,
            data: SignatureData::Single {
                mode: SignMode::Direct,
                signature,
            },
            sequence: slot.sequence,
        }],
    );

    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("rejected");
    assert!(matches!(err, VerificationError::UnsupportedSignMode));
}

#[tokio::test]
async fn test_typed_data_rejects_unresolved_fee_payer() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_secp256k1();
    let payer = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 0);
    // the payer can cover the fee but has no on-chain account (and thus no
    // key to check the consent signature against)
    state.balances.insert(payer.address(), 10_000);

    let tx = typed_data_tx(&state, &sender, &payer, state.network.typed_data_chain_id());
    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("rejected");
    assert!(matches!(err, VerificationError::FeePayerUnresolved(a) if a == payer.address()));
}

#[tokio::test]
async fn test_typed_data_rejects_tampered_fee_payer_signature() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_secp256k1();
    let payer = KeyPair::generate_ed25519();
    let intruder = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 0);
    state.register(payer.public_key(), 10_000);

    let mut tx = typed_data_tx(&state, &sender, &payer, state.network.typed_data_chain_id());
    // swap the payer's consent signature for one from another key
    let forged = intruder.sign(b"consent");
    tx = Transaction::new(
        tx.get_messages().to_vec(),
        tx.get_fee().clone(),
        String::new(),
        0,
        vec![ExtensionOption::TypedData(TypedDataExtension::new(
            state.network.typed_data_chain_id(),
            payer.address(),
            forged.as_bytes().to_vec(),
        ))],
        tx.get_signatures().to_vec(),
    );

    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("rejected");
    assert!(matches!(err, VerificationError::InvalidSignature));
}

#[tokio::test]
async fn test_vm_batch_authorized_signer_accepted() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    let address = state.register(sender.public_key(), 10_000);
    let foreign = ForeignPubkey::new([0x11; 32]);
    let program = ForeignPubkey::new([0x22; 32]);
    state.link(address, foreign);

    let body = body_tx(
        vec![vm_batch_message(address, vec![foreign, program], 0)],
        default_fee(),
        Vec::new(),
    );
    let tx = sign_tx(&state, &sender, body, SignMode::Direct);

    let context = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect("admitted");
    assert!(context.verified_signers.contains(&address));
}

#[tokio::test]
async fn test_vm_batch_unlinked_native_signer_rejected() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    let address = state.register(sender.public_key(), 10_000);
    let foreign = ForeignPubkey::new([0x11; 32]);
    let program = ForeignPubkey::new([0x22; 32]);
    // no link for the sender at all

    let body = body_tx(
        vec![vm_batch_message(address, vec![foreign, program], 0)],
        default_fee(),
        Vec::new(),
    );
    let tx = sign_tx(&state, &sender, body, SignMode::Direct);

    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("rejected");
    assert!(matches!(err, VerificationError::UnlinkedNativeSigner(a) if a == address));
}

#[tokio::test]
async fn test_vm_batch_unlinked_foreign_account_rejected() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    let address = state.register(sender.public_key(), 10_000);
    let linked = ForeignPubkey::new([0x33; 32]);
    let unlinked = ForeignPubkey::new([0x11; 32]);
    let program = ForeignPubkey::new([0x22; 32]);
    state.link(address, linked);

    // instruction flags the unlinked account as signer
    let body = body_tx(
        vec![vm_batch_message(address, vec![unlinked, program], 0)],
        default_fee(),
        Vec::new(),
    );
    let tx = sign_tx(&state, &sender, body, SignMode::Direct);

    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("rejected");
    assert!(matches!(err, VerificationError::UnlinkedForeignAccount(f) if f == unlinked));
}

#[tokio::test]
async fn test_vm_batch_foreign_signer_outside_verified_set_rejected() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    let other = KeyPair::generate_ed25519();
    let address = state.register(sender.public_key(), 10_000);
    let other_address = state.register(other.public_key(), 10_000);
    let sender_foreign = ForeignPubkey::new([0x33; 32]);
    let other_foreign = ForeignPubkey::new([0x11; 32]);
    let program = ForeignPubkey::new([0x22; 32]);
    state.link(address, sender_foreign);
    state.link(other_address, other_foreign);

    // the flagged signer account belongs to `other`, who never signed this tx
    let body = body_tx(
        vec![vm_batch_message(address, vec![other_foreign, program], 0)],
        default_fee(),
        Vec::new(),
    );
    let tx = sign_tx(&state, &sender, body, SignMode::Direct);

    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("rejected");
    assert!(matches!(
        err,
        VerificationError::UnauthorizedForeignSigner { foreign, native }
            if foreign == other_foreign && native == other_address
    ));
}

#[tokio::test]
async fn test_vm_batch_with_other_messages_rejected() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    let address = state.register(sender.public_key(), 10_000);
    let foreign = ForeignPubkey::new([0x11; 32]);
    let program = ForeignPubkey::new([0x22; 32]);
    state.link(address, foreign);

    // every signer is valid and linked; co-occurrence alone must reject
    let body = body_tx(
        vec![
            vm_batch_message(address, vec![foreign, program], 0),
            transfer_message(address),
        ],
        default_fee(),
        Vec::new(),
    );
    let tx = sign_tx(&state, &sender, body, SignMode::Direct);

    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("rejected");
    assert!(matches!(err, VerificationError::BatchNotAlone));
}

#[tokio::test]
async fn test_vm_link_check_disabled_by_explicit_configuration() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    let address = state.register(sender.public_key(), 10_000);
    let foreign = ForeignPubkey::new([0x11; 32]);
    let program = ForeignPubkey::new([0x22; 32]);
    // nothing linked

    let body = body_tx(
        vec![vm_batch_message(address, vec![foreign, program], 0)],
        default_fee(),
        Vec::new(),
    );
    let tx = sign_tx(&state, &sender, body, SignMode::Direct);

    let dispatcher = Dispatcher::new(DispatcherOptions {
        verify_vm_links: false,
    });
    dispatcher
        .handle(&tx, &mut state, false)
        .await
        .expect("link check disabled by operator choice");
}

#[tokio::test]
async fn test_simulation_still_runs_vm_link_check() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    let address = state.register(sender.public_key(), 10_000);
    let foreign = ForeignPubkey::new([0x11; 32]);
    let program = ForeignPubkey::new([0x22; 32]);
    // nothing linked

    let body = body_tx(
        vec![vm_batch_message(address, vec![foreign, program], 0)],
        default_fee(),
        Vec::new(),
    );
    let tx = sign_tx(&state, &sender, body, SignMode::Direct);

    let err = Dispatcher::default()
        .handle(&tx, &mut state, true)
        .await
        .expect_err("simulation must not skip link resolution");
    assert!(matches!(err, VerificationError::UnlinkedNativeSigner(_)));
}

#[tokio::test]
async fn test_simulation_estimates_gas_without_signature_checks() {
    let mut state = ChainState::new();
    let sender = KeyPair::generate_ed25519();
    state.register(sender.public_key(), 10_000);

    let body = body_tx(
        vec![transfer_message(sender.address())],
        Fee::new(500, 0, None), // no limit needed when simulating
        Vec::new(),
    );
    let data = signer_data_for(&state, sender.address(), sender.public_key());
    let tx = Transaction::new(
        body.get_messages().to_vec(),
        body.get_fee().clone(),
        String::new(),
        0,
        Vec::new(),
        vec![SignatureV2 {
            pubkey: sender.public_key(),
            data: SignatureData::Single {
                mode: SignMode::Direct,
                signature: sender.sign(b"placeholder"), // not valid on purpose
            },
            sequence: data.sequence,
        }],
    );

    let context = Dispatcher::default()
        .handle(&tx, &mut state, true)
        .await
        .expect("simulated");
    assert!(context.simulate);
    assert_eq!(context.gas_limit, None);
    let expected = tx.size() as u64 * GAS_PER_TX_BYTE + GAS_PER_ED25519_SIGNATURE;
    assert_eq!(context.gas_used, expected);

    // the same transaction fails for real
    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("invalid signature outside simulation");
    assert!(matches!(err, VerificationError::InvalidSignature));
}

#[tokio::test]
async fn test_redundant_relay_rejected() {
    let mut state = ChainState::new();
    let relayer = KeyPair::generate_ed25519();
    state.register(relayer.public_key(), 10_000);
    state.relayed.insert(("channel-0".to_string(), 7));

    let relay = Message::Relay(RelayPayload::new(
        relayer.address(),
        "channel-0".to_string(),
        7,
        Hash::zero(),
    ));
    let body = body_tx(vec![relay], default_fee(), Vec::new());
    let tx = sign_tx(&state, &relayer, body, SignMode::Direct);

    let err = Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect_err("redundant");
    assert!(matches!(err, VerificationError::RedundantRelay));
}

#[tokio::test]
async fn test_fresh_relay_accepted() {
    let mut state = ChainState::new();
    let relayer = KeyPair::generate_ed25519();
    state.register(relayer.public_key(), 10_000);

    let relay = Message::Relay(RelayPayload::new(
        relayer.address(),
        "channel-0".to_string(),
        8,
        Hash::zero(),
    ));
    let body = body_tx(vec![relay], default_fee(), Vec::new());
    let tx = sign_tx(&state, &relayer, body, SignMode::Direct);

    Dispatcher::default()
        .handle(&tx, &mut state, false)
        .await
        .expect("fresh relay admitted");
}

#[test]
fn test_transaction_wire_roundtrip() {
    let sender = KeyPair::generate_ed25519();
    let payer = KeyPair::generate_secp256k1();
    let tx = Transaction::new(
        vec![transfer_message(sender.address())],
        Fee::new(500, 200_000, Some(payer.address())),
        "memo".to_string(),
        42,
        vec![ExtensionOption::TypedData(TypedDataExtension::new(
            8802,
            payer.address(),
            vec![1; 64],
        ))],
        vec![SignatureV2 {
            pubkey: sender.public_key(),
            data: SignatureData::Single {
                mode: SignMode::Direct,
                signature: sender.sign(b"body"),
            },
            sequence: 3,
        }],
    );
    let decoded = Transaction::from_bytes(&tx.to_bytes()).expect("decode");
    assert_eq!(tx, decoded);
}

#[test]
fn test_gas_meter_shared_reference_threading() {
    // decorators thread one meter; charges accumulate in order
    let mut meter = GasMeter::finite(1_000);
    meter.consume(100, "a").expect("a");
    meter.consume(200, "b").expect("b");
    assert_eq!(meter.consumed(), 300);
}
