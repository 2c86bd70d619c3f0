//! End-to-end protocol orchestration: Setup, Registration, Auction,
//! Receiving.
//!
//! The orchestrator owns the ledger, the circuit keys and the participant
//! wallets. Drivers do the cryptographic work; this module sequences the
//! phases and moves records between parties. The reference deployment runs
//! a fixed batch of [`EXCHANGE_BATCH`] participants.

use std::path::Path;

use ark_bls12_377::G1Affine;
use ark_bw6_761::Fr;
use ark_ff::UniformRand;
use rand::rngs::OsRng;
use tracing::info;

use crate::circuit::{ExchangeCircuit, RegisterCircuit, TransferCircuit, WithdrawCircuit};
use crate::crypto::key_image;
use crate::crypto::keys::DhKeypair;
use crate::error::{ProtocolError, ProtocolResult};
use crate::exchange::{run_exchange, DoubleAuction, MatchingPolicy};
use crate::ledger::{Ledger, LedgerTx, SharedLedger};
use crate::note::Note;
use crate::proof::{CancelToken, ProofSystem};
use crate::register::{register, RegistrationPayload};
use crate::wallet::{Wallet, WithdrawAux};
use crate::withdraw::create_withdraw;

/// Fixed exchange fan-in of the reference deployment.
pub const EXCHANGE_BATCH: usize = 10;

/// The four compiled circuits with their Groth16 key pairs. Shared
/// read-only after setup.
pub struct CircuitKeys<const N: usize> {
    pub transfer: ProofSystem<TransferCircuit>,
    pub register: ProofSystem<RegisterCircuit>,
    pub exchange: ProofSystem<ExchangeCircuit<N>>,
    pub withdraw: ProofSystem<WithdrawCircuit>,
}

/// Keys for the reference batch size.
pub type AuctionKeys = CircuitKeys<EXCHANGE_BATCH>;

impl<const N: usize> CircuitKeys<N> {
    /// Run the trusted setup for all four circuits.
    pub fn setup() -> ProtocolResult<Self> {
        info!("compiling circuits and running setup");
        Ok(Self {
            transfer: ProofSystem::setup(TransferCircuit::blank())?,
            register: ProofSystem::setup(RegisterCircuit::blank())?,
            exchange: ProofSystem::setup(ExchangeCircuit::<N>::blank())?,
            withdraw: ProofSystem::setup(WithdrawCircuit::blank())?,
        })
    }

    /// Load the key pairs from `dir`, running setup and persisting for any
    /// that are missing. Every party must share the same key files.
    pub fn setup_or_load(dir: &Path) -> ProtocolResult<Self> {
        std::fs::create_dir_all(dir)?;
        let path = |name: &str| dir.join(name);
        Ok(Self {
            transfer: ProofSystem::setup_or_load(
                TransferCircuit::blank(),
                &path("transfer.pk"),
                &path("transfer.vk"),
            )?,
            register: ProofSystem::setup_or_load(
                RegisterCircuit::blank(),
                &path("register.pk"),
                &path("register.vk"),
            )?,
            exchange: ProofSystem::setup_or_load(
                ExchangeCircuit::<N>::blank(),
                &path(&format!("exchange{N}.pk")),
                &path(&format!("exchange{N}.vk")),
            )?,
            withdraw: ProofSystem::setup_or_load(
                WithdrawCircuit::blank(),
                &path("withdraw.pk"),
                &path("withdraw.vk"),
            )?,
        })
    }
}

/// Initial holdings and bid of one participant.
#[derive(Clone, Debug)]
pub struct ParticipantSpec {
    pub name: String,
    pub coins: u64,
    pub energy: u64,
    pub bid: u64,
}

/// A participant: DH identity plus wallet.
pub struct Participant {
    pub dh: DhKeypair,
    pub wallet: Wallet,
    spec: ParticipantSpec,
}

/// Orchestrates one auction round over a batch of N participants.
///
/// Compiled constraint systems and Groth16 keys are read-only after setup;
/// the orchestrator borrows them so every party shares one set.
pub struct Orchestrator<'k, const N: usize> {
    keys: &'k CircuitKeys<N>,
    pub ledger: SharedLedger,
    auctioneer: DhKeypair,
    participants: Vec<Participant>,
    payloads: Vec<RegistrationPayload>,
    policy: Box<dyn MatchingPolicy>,
    cancel: CancelToken,
}

impl<'k, const N: usize> Orchestrator<'k, N> {
    /// Create an orchestrator for exactly N participants.
    pub fn new(keys: &'k CircuitKeys<N>, specs: Vec<ParticipantSpec>) -> ProtocolResult<Self> {
        if specs.len() != N {
            return Err(ProtocolError::Witness(format!(
                "expected {N} participants, got {}",
                specs.len()
            )));
        }

        let auctioneer = DhKeypair::generate(&mut OsRng);
        let participants = specs
            .into_iter()
            .map(|spec| {
                let dh = DhKeypair::generate(&mut OsRng);
                let wallet = Wallet::new(spec.name.clone(), &dh);
                Participant { dh, wallet, spec }
            })
            .collect();

        Ok(Self {
            keys,
            ledger: SharedLedger::new(Ledger::new()),
            auctioneer,
            participants,
            payloads: Vec::new(),
            policy: Box::new(DoubleAuction::new()),
            cancel: CancelToken::new(),
        })
    }

    /// Replace the default matching policy.
    pub fn with_policy(mut self, policy: Box<dyn MatchingPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// The cancel token observed by every proving call.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn auctioneer_pk(&self) -> G1Affine {
        self.auctioneer.pk
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participants_mut(&mut self) -> &mut [Participant] {
        &mut self.participants
    }

    /// Phase 2: every participant mints its base note, registers, and the
    /// inner transfer lands on the ledger.
    pub fn run_registration(&mut self) -> ProtocolResult<()> {
        info!(n = N, "registration phase");
        let auctioneer_pk = self.auctioneer.pk;

        for participant in &mut self.participants {
            let spec = &participant.spec;
            let base_sk = Fr::rand(&mut OsRng);
            let base_note = Note::mint(
                Fr::from(spec.coins),
                Fr::from(spec.energy),
                &base_sk,
                &mut OsRng,
            );

            let registration = register(
                &base_note,
                &base_sk,
                Fr::from(spec.bid),
                Some(&auctioneer_pk),
                &self.keys.transfer,
                &self.keys.register,
                &self.cancel,
                &mut OsRng,
            )?;

            self.ledger
                .append_tx(LedgerTx::Transfer(registration.tx_in.clone()))?;

            let secrets = &registration.secrets;
            participant.wallet.counterparty = Some(auctioneer_pk);
            participant.wallet.add_note_with_aux(
                registration.tx_in.new_note.clone(),
                secrets.sk_in,
                Some(WithdrawAux {
                    bid: secrets.bid,
                    sk_out: secrets.sk_out,
                    r_enc: secrets.r_enc,
                    c_aux: registration.record.c_aux,
                }),
            )?;

            self.payloads.push(registration.payload);
            info!(participant = %spec.name, "registered");
        }
        Ok(())
    }

    /// Phase 3: the auctioneer opens all payloads, matches, and posts the
    /// batched exchange.
    pub fn run_auction(&mut self) -> ProtocolResult<()> {
        info!("auction phase");
        let record = run_exchange::<N, _>(
            &self.payloads,
            &self.auctioneer,
            self.policy.as_ref(),
            &self.keys.exchange,
            &self.cancel,
            &mut OsRng,
        )?;
        self.ledger.append_tx(LedgerTx::Exchange(record))?;
        info!("exchange appended");
        Ok(())
    }

    /// Phase 4: claim exchange outputs if a valid exchange landed,
    /// otherwise run the withdraw path for every participant.
    pub fn run_receiving(&mut self) -> ProtocolResult<()> {
        info!("receiving phase");
        let snapshot = self.ledger.read().clone();

        if snapshot.has_valid_exchange(self.keys.exchange.prepared_vk()) {
            for participant in &mut self.participants {
                participant.wallet.reconcile(&snapshot);
                participant.wallet.claim_exchange_output(&snapshot)?;
            }
            return Ok(());
        }

        info!("no valid exchange observed, withdrawing");
        for participant in &mut self.participants {
            participant.wallet.reconcile(&snapshot);
            let view = participant.wallet.withdraw_view()?;

            let sk_new = Fr::rand(&mut OsRng);
            let pk_out = key_image(&sk_new);
            let record = create_withdraw(
                &view.note,
                &view.sk,
                view.note.coins,
                view.note.energy,
                &pk_out,
                view.bid,
                Some(&view.auctioneer_pk),
                &self.keys.withdraw,
                &self.cancel,
                &mut OsRng,
            )?;

            self.ledger
                .append_withdraw(record.clone(), self.keys.withdraw.prepared_vk())?;
            participant.wallet.add_note(record.produced_note, sk_new)?;
        }

        // Flags for the withdrawn inputs flip on the next reconcile.
        let snapshot = self.ledger.read().clone();
        for participant in &mut self.participants {
            participant.wallet.reconcile(&snapshot);
        }
        Ok(())
    }

    /// Run one full round: registration, auction, receiving.
    pub fn run(&mut self) -> ProtocolResult<()> {
        self.run_registration()?;
        self.run_auction()?;
        self.run_receiving()
    }

    /// Persist the ledger and every wallet under `dir`.
    pub fn save_state(&self, dir: &Path) -> ProtocolResult<()> {
        std::fs::create_dir_all(dir)?;
        self.ledger.save(&dir.join("ledger.json"))?;
        for participant in &self.participants {
            let path = dir.join(format!("{}_wallet.json", participant.wallet.name));
            participant.wallet.save(&path)?;
        }
        Ok(())
    }
}
