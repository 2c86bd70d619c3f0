//! Per-participant wallet.
//!
//! Tracks the notes a participant can spend, their spending secrets, a
//! spent flag per note, and the registration metadata the withdraw path
//! needs. The wallet reconciles against the ledger, never the other way
//! around, and holds no references into ledger memory.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ark_bls12_377::{Fr as DhScalar, G1Affine};
use ark_bw6_761::Fr;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::encryption::REGISTRATION_CIPHERTEXT_LEN;
use crate::crypto::keys::DhKeypair;
use crate::crypto::{key_image, serial_number};
use crate::encoding;
use crate::error::{ProtocolError, ProtocolResult};
use crate::ledger::Ledger;
use crate::note::Note;

/// Registration metadata retained for claiming or withdrawing one note.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawAux {
    #[serde(with = "encoding::field")]
    pub bid: Fr,
    /// Spending secret of the auction output promised to this wallet.
    #[serde(with = "encoding::field")]
    pub sk_out: Fr,
    /// Ephemeral DH scalar of the registration.
    #[serde(with = "encoding::scalar")]
    pub r_enc: DhScalar,
    #[serde(with = "encoding::field_array")]
    pub c_aux: [Fr; REGISTRATION_CIPHERTEXT_LEN],
}

/// Everything the withdraw driver needs from a wallet.
#[derive(Clone, Debug)]
pub struct WithdrawView {
    pub note: Note,
    pub sk: Fr,
    pub bid: Fr,
    pub auctioneer_pk: G1Affine,
}

/// A participant's wallet.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Wallet {
    pub name: String,
    #[serde(with = "encoding::scalar")]
    pub sk_dh: DhScalar,
    #[serde(with = "encoding::point")]
    pub pk_dh: G1Affine,
    pub notes: Vec<Note>,
    #[serde(with = "encoding::field_vec")]
    pub note_secret_keys: Vec<Fr>,
    pub spent_flags: Vec<bool>,
    pub withdraw_aux: Vec<Option<WithdrawAux>>,
    /// The auctioneer's public point, once known.
    #[serde(with = "encoding::point_opt")]
    pub counterparty: Option<G1Affine>,
}

impl Wallet {
    pub fn new(name: impl Into<String>, dh: &DhKeypair) -> Self {
        Self {
            name: name.into(),
            sk_dh: dh.sk,
            pk_dh: dh.pk,
            notes: Vec::new(),
            note_secret_keys: Vec::new(),
            spent_flags: Vec::new(),
            withdraw_aux: Vec::new(),
            counterparty: None,
        }
    }

    /// Number of notes, spent or not.
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Add a note this wallet can spend.
    pub fn add_note(&mut self, note: Note, sk: Fr) -> ProtocolResult<usize> {
        self.add_note_with_aux(note, sk, None)
    }

    /// Add a note together with its registration metadata.
    pub fn add_note_with_aux(
        &mut self,
        note: Note,
        sk: Fr,
        aux: Option<WithdrawAux>,
    ) -> ProtocolResult<usize> {
        if key_image(&sk) != note.pk {
            return Err(ProtocolError::InvalidOwnership);
        }
        self.notes.push(note);
        self.note_secret_keys.push(sk);
        self.spent_flags.push(false);
        self.withdraw_aux.push(aux);
        Ok(self.notes.len() - 1)
    }

    /// Mark a note spent by index.
    pub fn mark_spent(&mut self, index: usize) -> ProtocolResult<()> {
        let flag = self
            .spent_flags
            .get_mut(index)
            .ok_or_else(|| ProtocolError::Witness(format!("no note at index {index}")))?;
        *flag = true;
        Ok(())
    }

    /// Recompute every note's serial number and flip spent flags for those
    /// the ledger has seen. One-way: a flag never goes back to unspent.
    pub fn reconcile(&mut self, ledger: &Ledger) {
        for i in 0..self.notes.len() {
            if self.spent_flags[i] {
                continue;
            }
            let sn = serial_number(&self.note_secret_keys[i], &self.notes[i].rho);
            if ledger.has_sn(&sn) {
                debug!(wallet = %self.name, index = i, "note observed spent");
                self.spent_flags[i] = true;
            }
        }
    }

    /// Indices and notes not yet known to be spent.
    pub fn unspent(&self) -> Vec<(usize, &Note)> {
        self.notes
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.spent_flags[*i])
            .collect()
    }

    /// Whether this wallet already holds a note with the given commitment.
    pub fn has_commitment(&self, cm: &Fr) -> bool {
        self.notes.iter().any(|n| n.cm == *cm)
    }

    /// Claim this wallet's output of the most recent exchange.
    ///
    /// Scans exchange records newest-first for a produced note whose key
    /// image matches an `sk_out` this wallet retained at registration.
    pub fn claim_exchange_output(&mut self, ledger: &Ledger) -> ProtocolResult<Option<usize>> {
        let claimable: Vec<(Fr, Fr)> = self
            .withdraw_aux
            .iter()
            .flatten()
            .map(|aux| (key_image(&aux.sk_out), aux.sk_out))
            .collect();

        let exchanges: Vec<_> = ledger.exchanges().collect();
        for record in exchanges.into_iter().rev() {
            for note in &record.produced_notes {
                for (pk_out, sk_out) in &claimable {
                    if note.pk == *pk_out && !self.has_commitment(&note.cm) {
                        let index = self.add_note(note.clone(), *sk_out)?;
                        debug!(wallet = %self.name, index, "exchange output claimed");
                        return Ok(Some(index));
                    }
                }
            }
        }
        Ok(None)
    }

    /// The first unspent note with registration metadata, ready for the
    /// withdraw driver. Fails loudly when the metadata or the auctioneer
    /// point was never stored.
    pub fn withdraw_view(&self) -> ProtocolResult<WithdrawView> {
        if self.unspent().is_empty() {
            return Err(ProtocolError::Witness("no unspent notes".into()));
        }
        let auctioneer_pk = self.counterparty.ok_or(ProtocolError::MissingCounterparty)?;

        for (i, note) in self.unspent() {
            if let Some(aux) = &self.withdraw_aux[i] {
                return Ok(WithdrawView {
                    note: note.clone(),
                    sk: self.note_secret_keys[i],
                    bid: aux.bid,
                    auctioneer_pk,
                });
            }
        }
        Err(ProtocolError::MissingCounterparty)
    }

    /// Persist to a JSON file.
    pub fn save(&self, path: &Path) -> ProtocolResult<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> ProtocolResult<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ProtocolError::Serialization(e.to_string()))
    }
}
