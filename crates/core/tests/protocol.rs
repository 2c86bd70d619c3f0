//! End-to-end protocol scenarios with real Groth16 proofs.
//!
//! Setup for the four circuits is expensive, so every test shares one key
//! set at batch size 2. The full reference batch (N = 10) runs the same
//! generic code path; its proving-heavy variant is `#[ignore]`d and can be
//! run explicitly.

use std::sync::OnceLock;

use ark_bw6_761::Fr;
use ark_ff::UniformRand;
use rand::rngs::OsRng;

use joule_core::crypto::{key_image, DhKeypair};
use joule_core::ledger::{Ledger, LedgerTx};
use joule_core::{
    create_transfer, create_withdraw, register, verify_exchange, verify_registration,
    verify_transfer, CancelToken, CircuitKeys, Note, Orchestrator, ParticipantSpec,
    ProtocolError,
};

const TEST_BATCH: usize = 2;

fn keys() -> &'static CircuitKeys<TEST_BATCH> {
    static KEYS: OnceLock<CircuitKeys<TEST_BATCH>> = OnceLock::new();
    KEYS.get_or_init(|| CircuitKeys::setup().expect("circuit setup"))
}

fn specs() -> Vec<ParticipantSpec> {
    (0..TEST_BATCH)
        .map(|i| ParticipantSpec {
            name: format!("participant{}", i + 1),
            coins: 1000 + 200 * i as u64,
            energy: 50 + 10 * i as u64,
            bid: 25 + 3 * i as u64,
        })
        .collect()
}

#[test]
fn single_transfer_and_double_spend() {
    let keys = keys();
    let cancel = CancelToken::new();

    let sk_old = Fr::rand(&mut OsRng);
    let note = Note::mint(Fr::from(100u64), Fr::from(50u64), &sk_old, &mut OsRng);

    let sk_new = Fr::rand(&mut OsRng);
    let pk_new = key_image(&sk_new);
    let recipient = DhKeypair::generate(&mut OsRng);

    let record = create_transfer(
        &note,
        &sk_old,
        &pk_new,
        note.coins,
        note.energy,
        &recipient.pk,
        &keys.transfer,
        &cancel,
        &mut OsRng,
    )
    .expect("transfer");

    verify_transfer(&record, &keys.transfer).expect("proof verifies");

    let mut ledger = Ledger::new();
    ledger
        .append_tx(LedgerTx::Transfer(record.clone()))
        .expect("first append");
    assert_eq!(ledger.sn_list.len(), 1);
    assert_eq!(ledger.cm_list.len(), 1);

    // Spending the same note towards a different recipient must be
    // refused by the ledger, not by the prover.
    let second = create_transfer(
        &note,
        &sk_old,
        &key_image(&Fr::rand(&mut OsRng)),
        note.coins,
        note.energy,
        &recipient.pk,
        &keys.transfer,
        &cancel,
        &mut OsRng,
    )
    .expect("second transfer proves");
    assert!(matches!(
        ledger.append_tx(LedgerTx::Transfer(second)),
        Err(ProtocolError::DoubleSpend)
    ));
    assert_eq!(ledger.sn_list.len(), 1);
}

#[test]
fn transfer_rejects_foreign_secret() {
    let keys = keys();
    let cancel = CancelToken::new();

    let note = Note::mint(
        Fr::from(100u64),
        Fr::from(50u64),
        &Fr::from(1u64),
        &mut OsRng,
    );
    let recipient = DhKeypair::generate(&mut OsRng);

    let result = create_transfer(
        &note,
        &Fr::from(2u64),
        &key_image(&Fr::from(3u64)),
        note.coins,
        note.energy,
        &recipient.pk,
        &keys.transfer,
        &cancel,
        &mut OsRng,
    );
    assert!(matches!(result, Err(ProtocolError::InvalidOwnership)));
}

#[test]
fn registration_proves_and_opens() {
    let keys = keys();
    let cancel = CancelToken::new();
    let auctioneer = DhKeypair::generate(&mut OsRng);

    let sk_base = Fr::rand(&mut OsRng);
    let base_note = Note::mint(Fr::from(100u64), Fr::from(50u64), &sk_base, &mut OsRng);

    let registration = register(
        &base_note,
        &sk_base,
        Fr::from(25u64),
        Some(&auctioneer.pk),
        &keys.transfer,
        &keys.register,
        &cancel,
        &mut OsRng,
    )
    .expect("register");

    verify_transfer(&registration.tx_in, &keys.transfer).expect("inner transfer verifies");
    verify_registration(&registration.record, &keys.register).expect("registration verifies");

    // The auctioneer opens the payload and sees exactly what was sealed.
    let (plain, note) =
        joule_core::open_registration(&registration.payload, &auctioneer).expect("open");
    assert_eq!(plain.bid, Fr::from(25u64));
    assert_eq!(plain.pk_out, registration.secrets.pk_out);
    assert_eq!(plain.sk_in, registration.secrets.sk_in);
    assert_eq!(note, registration.tx_in.new_note);

    // Registration without the auctioneer's point fails fast.
    let result = register(
        &base_note,
        &sk_base,
        Fr::from(25u64),
        None,
        &keys.transfer,
        &keys.register,
        &cancel,
        &mut OsRng,
    );
    assert!(matches!(result, Err(ProtocolError::MissingCounterparty)));
}

#[test]
fn exchange_round_settles_every_wallet() {
    let keys = keys();
    let mut orchestrator = Orchestrator::new(keys, specs()).expect("orchestrator");
    orchestrator.run().expect("full round");

    {
        let ledger = orchestrator.ledger.read();
        // One inner transfer per registration, then the batched exchange.
        assert_eq!(ledger.tx_list.len(), TEST_BATCH + 1);
        assert_eq!(ledger.sn_list.len(), 2 * TEST_BATCH);
        assert!(ledger.has_valid_exchange(keys.exchange.prepared_vk()));

        let exchange = ledger.exchanges().next().expect("exchange record");
        verify_exchange(exchange, &keys.exchange).expect("exchange verifies");

        // Conservation across the batch.
        let spec_list = specs();
        let in_coins: u64 = spec_list.iter().map(|s| s.coins).sum();
        let in_energy: u64 = spec_list.iter().map(|s| s.energy).sum();
        let out_coins: Fr = exchange.produced_notes.iter().map(|n| n.coins).sum();
        let out_energy: Fr = exchange.produced_notes.iter().map(|n| n.energy).sum();
        assert_eq!(out_coins, Fr::from(in_coins));
        assert_eq!(out_energy, Fr::from(in_energy));
    }

    // Every wallet shows the registered note spent and the claimed
    // exchange output unspent.
    for participant in orchestrator.participants() {
        let wallet = &participant.wallet;
        assert_eq!(wallet.len(), 2);
        assert!(wallet.spent_flags[0], "registered note consumed");
        assert!(!wallet.spent_flags[1], "exchange output claimable");
    }
}

#[test]
fn withdraw_path_when_no_exchange_lands() {
    let keys = keys();
    let mut orchestrator = Orchestrator::new(keys, specs()).expect("orchestrator");
    orchestrator.run_registration().expect("registration");
    // The auctioneer never posts an exchange; participants withdraw.
    orchestrator.run_receiving().expect("receiving");

    {
        let ledger = orchestrator.ledger.read();
        assert!(!ledger.has_valid_exchange(keys.exchange.prepared_vk()));
        assert_eq!(ledger.withdraw_txs.len(), TEST_BATCH);
        assert_eq!(ledger.sn_list.len(), 2 * TEST_BATCH);
    }

    for participant in orchestrator.participants() {
        let wallet = &participant.wallet;
        assert_eq!(wallet.len(), 2);
        assert!(wallet.spent_flags[0], "registered note reclaimed");
        assert!(!wallet.spent_flags[1], "withdrawn output unspent");
    }
}

#[test]
fn withdrawn_record_survives_ledger_persistence() {
    let keys = keys();
    let cancel = CancelToken::new();
    let auctioneer = DhKeypair::generate(&mut OsRng);

    let sk_in = Fr::rand(&mut OsRng);
    let note = Note::mint(Fr::from(100u64), Fr::from(50u64), &sk_in, &mut OsRng);
    let sk_new = Fr::rand(&mut OsRng);

    let record = create_withdraw(
        &note,
        &sk_in,
        Fr::from(90u64),
        Fr::from(45u64),
        &key_image(&sk_new),
        Fr::from(25u64),
        Some(&auctioneer.pk),
        &keys.withdraw,
        &cancel,
        &mut OsRng,
    )
    .expect("withdraw");

    let mut ledger = Ledger::new();
    ledger
        .append_withdraw(record.clone(), keys.withdraw.prepared_vk())
        .expect("verified append");

    // Replaying the same withdraw is a double spend.
    assert!(matches!(
        ledger.append_withdraw(record, keys.withdraw.prepared_vk()),
        Err(ProtocolError::DoubleSpend)
    ));

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ledger.json");
    ledger.save(&path).expect("save");
    let back = Ledger::load(&path).expect("load");
    assert_eq!(back.withdraw_txs.len(), 1);
    assert_eq!(back.sn_list, ledger.sn_list);
}

#[test]
fn tampered_withdraw_proof_is_refused() {
    let keys = keys();
    let cancel = CancelToken::new();
    let auctioneer = DhKeypair::generate(&mut OsRng);

    let sk_in = Fr::rand(&mut OsRng);
    let note = Note::mint(Fr::from(100u64), Fr::from(50u64), &sk_in, &mut OsRng);

    let mut record = create_withdraw(
        &note,
        &sk_in,
        Fr::from(100u64),
        Fr::from(50u64),
        &key_image(&Fr::rand(&mut OsRng)),
        Fr::from(25u64),
        Some(&auctioneer.pk),
        &keys.withdraw,
        &cancel,
        &mut OsRng,
    )
    .expect("withdraw");

    // Claim a different output note than the one proved.
    record.cm_out = Fr::rand(&mut OsRng);

    let mut ledger = Ledger::new();
    assert!(matches!(
        ledger.append_withdraw(record, keys.withdraw.prepared_vk()),
        Err(ProtocolError::InvalidProof)
    ));
    assert!(ledger.withdraw_txs.is_empty());
    assert!(ledger.sn_list.is_empty());
}

#[test]
fn cancelled_proving_leaves_ledger_untouched() {
    let keys = keys();
    let cancel = CancelToken::new();
    cancel.cancel();

    let sk_old = Fr::rand(&mut OsRng);
    let note = Note::mint(Fr::from(100u64), Fr::from(50u64), &sk_old, &mut OsRng);
    let recipient = DhKeypair::generate(&mut OsRng);

    let result = create_transfer(
        &note,
        &sk_old,
        &key_image(&Fr::rand(&mut OsRng)),
        note.coins,
        note.energy,
        &recipient.pk,
        &keys.transfer,
        &cancel,
        &mut OsRng,
    );
    assert!(matches!(
        result,
        Err(ProtocolError::Proof(joule_core::ProofError::Cancelled))
    ));
}

/// The reference scenario: ten participants, full proving. Expensive;
/// run with `cargo test --release -- --ignored`.
#[test]
#[ignore]
fn reference_batch_of_ten() {
    let keys = CircuitKeys::<10>::setup().expect("setup");
    let specs: Vec<ParticipantSpec> = (0..10)
        .map(|i| ParticipantSpec {
            name: format!("participant{}", i + 1),
            coins: 1000 + 200 * i as u64,
            energy: 50 + 10 * i as u64,
            bid: 25 + 3 * i as u64,
        })
        .collect();

    let mut orchestrator = Orchestrator::new(&keys, specs).expect("orchestrator");
    orchestrator.run().expect("full round");

    let ledger = orchestrator.ledger.read();
    assert_eq!(ledger.tx_list.len(), 11);
    assert!(ledger.has_valid_exchange(keys.exchange.prepared_vk()));
}
