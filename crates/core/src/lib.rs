//! Joule - privacy-preserving sealed-bid double auction over confidential
//! energy notes.
//!
//! The protocol engine behind an energy market in which participants trade
//! two fungible quantities (coins and energy) through an auctioneer without
//! revealing identities, balances or bids. Value lives in Zerocash-style
//! confidential notes; four Groth16 circuits over BW6-761 (with BLS12-377
//! point arithmetic expressed as native field constraints) enforce the
//! protocol invariants.
//!
//! # Modules
//! - `crypto`: Poseidon sponge, commitments, serial numbers, DH key
//!   agreement, one-time-pad encryption
//! - `note`: the confidential note model
//! - `circuit`: the four circuits (transfer, register, exchange, withdraw)
//!   and their gadgets
//! - `proof`: Groth16 setup/prove/verify plumbing and key persistence
//! - `transfer`, `register`, `exchange`, `withdraw`: per-algorithm drivers
//!   and their published records
//! - `ledger`: the append-only public log with double-spend refusal
//! - `wallet`: per-participant note tracking and ledger reconciliation
//! - `orchestrator`: the four protocol phases end to end

pub mod circuit;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod exchange;
pub mod ledger;
pub mod note;
pub mod orchestrator;
pub mod proof;
pub mod register;
pub mod transfer;
pub mod wallet;
pub mod withdraw;

pub use error::{CryptoError, ProofError, ProtocolError, ProtocolResult};
pub use exchange::{
    run_exchange, verify_exchange, Allocation, DoubleAuction, ExchangeRecord, MatchingPolicy,
    Order,
};
pub use ledger::{Ledger, LedgerTx, SharedLedger};
pub use note::Note;
pub use orchestrator::{
    AuctionKeys, CircuitKeys, Orchestrator, Participant, ParticipantSpec, EXCHANGE_BATCH,
};
pub use proof::{CancelToken, ProofSystem};
pub use register::{
    open_registration, register, verify_registration, Registration, RegistrationPayload,
    RegistrationRecord, RegistrationSecrets,
};
pub use transfer::{create_transfer, verify_transfer, TransferRecord};
pub use wallet::{Wallet, WithdrawAux, WithdrawView};
pub use withdraw::{create_withdraw, verify_withdraw, WithdrawRecord};
