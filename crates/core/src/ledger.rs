//! The append-only public ledger.
//!
//! Ground truth for spend status: commitments, serial numbers, transfer and
//! exchange records in insertion order, withdraw records in their own list.
//! An append either lands completely or leaves every list untouched. The
//! orchestrator owns the ledger behind a single write lock; nothing here is
//! process-global.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::{Arc, RwLock};

use ark_bw6_761::{Fr, BW6_761};
use ark_groth16::PreparedVerifyingKey;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::encoding;
use crate::error::{ProtocolError, ProtocolResult};
use crate::exchange::ExchangeRecord;
use crate::note::Note;
use crate::proof::verify_proof_bytes;
use crate::transfer::TransferRecord;
use crate::withdraw::WithdrawRecord;

/// A value-moving transaction on the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LedgerTx {
    Transfer(TransferRecord),
    Exchange(ExchangeRecord),
}

impl LedgerTx {
    /// Serial numbers this transaction consumes.
    pub fn consumed_serials(&self) -> Vec<Fr> {
        match self {
            LedgerTx::Transfer(tx) => vec![tx.sn_old],
            LedgerTx::Exchange(tx) => tx.sn_in.clone(),
        }
    }

    /// Commitments this transaction produces.
    pub fn produced_commitments(&self) -> Vec<Fr> {
        match self {
            LedgerTx::Transfer(tx) => vec![tx.cm_new],
            LedgerTx::Exchange(tx) => tx.cm_out.clone(),
        }
    }

    /// Output notes this transaction publishes.
    pub fn produced_notes(&self) -> Vec<&Note> {
        match self {
            LedgerTx::Transfer(tx) => vec![&tx.new_note],
            LedgerTx::Exchange(tx) => tx.produced_notes.iter().collect(),
        }
    }

    /// The record's public input vector, in circuit order.
    pub fn public_inputs(&self) -> Vec<Fr> {
        match self {
            LedgerTx::Transfer(tx) => tx.public_inputs(),
            LedgerTx::Exchange(tx) => tx.public_inputs(),
        }
    }
}

/// Append-only ledger state.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ledger {
    #[serde(with = "encoding::field_vec")]
    pub cm_list: Vec<Fr>,
    #[serde(with = "encoding::field_vec")]
    pub sn_list: Vec<Fr>,
    pub tx_list: Vec<LedgerTx>,
    pub withdraw_txs: Vec<WithdrawRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a serial number has been revealed on this ledger.
    pub fn has_sn(&self, sn: &Fr) -> bool {
        self.sn_list.contains(sn)
    }

    /// Whether a commitment has been published on this ledger.
    pub fn has_cm(&self, cm: &Fr) -> bool {
        self.cm_list.contains(cm)
    }

    /// Append a transfer or exchange transaction.
    ///
    /// The whole batch of consumed serial numbers is checked before any
    /// mutation, so two racing spends of one note see exactly one success.
    pub fn append_tx(&mut self, tx: LedgerTx) -> ProtocolResult<()> {
        let serials = tx.consumed_serials();
        let commitments = tx.produced_commitments();

        for (i, sn) in serials.iter().enumerate() {
            if self.has_sn(sn) || serials[..i].contains(sn) {
                warn!(sn = %encoding::field_to_string(sn), "append rejected");
                return Err(ProtocolError::DoubleSpend);
            }
        }
        for (i, cm) in commitments.iter().enumerate() {
            if self.has_cm(cm) || commitments[..i].contains(cm) {
                return Err(ProtocolError::DuplicateCommitment);
            }
        }

        self.sn_list.extend(serials);
        self.cm_list.extend(commitments);
        self.tx_list.push(tx);
        Ok(())
    }

    /// Verify and append a withdraw transaction.
    ///
    /// The proof is checked against the withdraw verifying key before the
    /// double-spend check; a bad proof never reaches the lists.
    pub fn append_withdraw(
        &mut self,
        record: WithdrawRecord,
        vk: &PreparedVerifyingKey<BW6_761>,
    ) -> ProtocolResult<()> {
        let valid = verify_proof_bytes(vk, &record.proof, &record.public_inputs())?;
        if !valid {
            return Err(ProtocolError::InvalidProof);
        }
        if self.has_sn(&record.sn_in) {
            return Err(ProtocolError::DoubleSpend);
        }
        if self.has_cm(&record.cm_out) {
            return Err(ProtocolError::DuplicateCommitment);
        }

        self.sn_list.push(record.sn_in);
        self.cm_list.push(record.cm_out);
        self.withdraw_txs.push(record);
        Ok(())
    }

    /// True iff some appended exchange record's proof verifies.
    pub fn has_valid_exchange(&self, vk: &PreparedVerifyingKey<BW6_761>) -> bool {
        self.tx_list.iter().rev().any(|tx| match tx {
            LedgerTx::Exchange(record) => {
                verify_proof_bytes(vk, &record.proof, &record.public_inputs())
                    .unwrap_or(false)
            }
            _ => false,
        })
    }

    /// Exchange records, oldest first.
    pub fn exchanges(&self) -> impl Iterator<Item = &ExchangeRecord> {
        self.tx_list.iter().filter_map(|tx| match tx {
            LedgerTx::Exchange(record) => Some(record),
            _ => None,
        })
    }

    /// Persist to a JSON file.
    pub fn save(&self, path: &Path) -> ProtocolResult<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        info!(path = %path.display(), txs = self.tx_list.len(), "ledger saved");
        Ok(())
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> ProtocolResult<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ProtocolError::Serialization(e.to_string()))
    }
}

/// The ledger behind its single write lock, as the orchestrator shares it.
///
/// Writers serialise on the exclusive lock; readers may overlap each other.
/// A reconcile that runs against a snapshot can miss an in-flight append,
/// which only ever errs on the UNSPENT side.
#[derive(Clone, Default)]
pub struct SharedLedger {
    inner: Arc<RwLock<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    pub fn append_tx(&self, tx: LedgerTx) -> ProtocolResult<()> {
        self.write().append_tx(tx)
    }

    pub fn append_withdraw(
        &self,
        record: WithdrawRecord,
        vk: &PreparedVerifyingKey<BW6_761>,
    ) -> ProtocolResult<()> {
        self.write().append_withdraw(record, vk)
    }

    /// Shared read access.
    pub fn read(&self) -> std::sync::RwLockReadGuard<'_, Ledger> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Exclusive write access.
    pub fn write(&self) -> std::sync::RwLockWriteGuard<'_, Ledger> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn save(&self, path: &Path) -> ProtocolResult<()> {
        self.read().save(path)
    }

    pub fn load(path: &Path) -> ProtocolResult<Self> {
        Ok(Self::new(Ledger::load(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::encryption::NOTE_CIPHERTEXT_LEN;
    use crate::crypto::keys::DhKeypair;
    use crate::note::Note;
    use ark_ff::UniformRand;
    use rand::rngs::OsRng;

    fn dummy_transfer(sn: Fr, cm: Fr) -> LedgerTx {
        let kp = DhKeypair::generate(&mut OsRng);
        let note = Note::mint(
            Fr::from(100u64),
            Fr::from(50u64),
            &Fr::from(1u64),
            &mut OsRng,
        );
        LedgerTx::Transfer(TransferRecord {
            old_coin: note.coins,
            old_energy: note.energy,
            cm_old: note.cm,
            sn_old: sn,
            pk_old: note.pk,
            new_coin: note.coins,
            new_energy: note.energy,
            cm_new: cm,
            c_new: [Fr::from(0u64); NOTE_CIPHERTEXT_LEN],
            g: kp.pk,
            g_b: kp.pk,
            g_r: kp.pk,
            proof: vec![0u8; 8],
            old_note: note.clone(),
            new_note: note,
        })
    }

    #[test]
    fn empty_ledger_has_nothing() {
        let ledger = Ledger::new();
        assert!(!ledger.has_sn(&Fr::from(1u64)));
        assert!(!ledger.has_cm(&Fr::from(1u64)));
        assert!(ledger.tx_list.is_empty());
    }

    #[test]
    fn first_append_lands() {
        let mut ledger = Ledger::new();
        ledger
            .append_tx(dummy_transfer(Fr::from(1u64), Fr::from(2u64)))
            .expect("first append");

        assert_eq!(ledger.sn_list.len(), 1);
        assert_eq!(ledger.cm_list.len(), 1);
        assert!(ledger.has_sn(&Fr::from(1u64)));
        assert!(ledger.has_cm(&Fr::from(2u64)));
    }

    #[test]
    fn replayed_serial_is_rejected_pointwise_unchanged() {
        let mut ledger = Ledger::new();
        ledger
            .append_tx(dummy_transfer(Fr::from(1u64), Fr::from(2u64)))
            .expect("first append");

        let before_sn = ledger.sn_list.clone();
        let before_cm = ledger.cm_list.clone();

        let result = ledger.append_tx(dummy_transfer(Fr::from(1u64), Fr::from(3u64)));
        assert!(matches!(result, Err(ProtocolError::DoubleSpend)));

        assert_eq!(ledger.sn_list, before_sn);
        assert_eq!(ledger.cm_list, before_cm);
        assert_eq!(ledger.tx_list.len(), 1);
    }

    #[test]
    fn duplicate_commitment_is_rejected() {
        let mut ledger = Ledger::new();
        ledger
            .append_tx(dummy_transfer(Fr::from(1u64), Fr::from(2u64)))
            .expect("first append");

        let result = ledger.append_tx(dummy_transfer(Fr::from(9u64), Fr::from(2u64)));
        assert!(matches!(result, Err(ProtocolError::DuplicateCommitment)));
    }

    #[test]
    fn concurrent_spends_of_one_note_yield_one_success() {
        let shared = SharedLedger::new(Ledger::new());
        let sn = Fr::rand(&mut OsRng);

        let handles: Vec<_> = (0..4u64)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || shared.append_tx(dummy_transfer(sn, Fr::from(100 + i))))
            })
            .collect();

        let outcomes: Vec<ProtocolResult<()>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(ProtocolError::DoubleSpend)))
                .count(),
            3
        );
        assert_eq!(shared.read().sn_list.len(), 1);
    }

    #[test]
    fn ledger_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ledger.json");

        let mut ledger = Ledger::new();
        ledger
            .append_tx(dummy_transfer(Fr::from(1u64), Fr::from(2u64)))
            .expect("append");
        ledger.save(&path).expect("save");

        let back = Ledger::load(&path).expect("load");
        assert_eq!(back.sn_list, ledger.sn_list);
        assert_eq!(back.cm_list, ledger.cm_list);
        assert_eq!(back.tx_list.len(), 1);
    }
}
