//! Withdraw: reclaim registered funds when the auctioneer fails.

use ark_bls12_377::G1Affine;
use ark_bw6_761::Fr;
use ark_ff::UniformRand;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::circuit::withdraw::{OpeningWitness, WithdrawCircuit};
use crate::crypto::encryption::{encrypt_withdraw, WITHDRAW_CIPHERTEXT_LEN};
use crate::encoding;
use crate::error::{ProtocolError, ProtocolResult};
use crate::note::Note;
use crate::proof::{CancelToken, ProofSystem};

/// A published withdraw transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawRecord {
    #[serde(with = "encoding::field")]
    pub sn_in: Fr,
    #[serde(with = "encoding::field")]
    pub cm_out: Fr,
    #[serde(with = "encoding::point")]
    pub pk_t: G1Affine,
    #[serde(with = "encoding::field_array")]
    pub c_wd: [Fr; WITHDRAW_CIPHERTEXT_LEN],
    #[serde(with = "encoding::hex_bytes")]
    pub proof: Vec<u8>,
    /// The reclaimed note, opening included, for the withdrawing wallet.
    pub produced_note: Note,
}

impl WithdrawRecord {
    /// Public inputs in the circuit's allocation order.
    pub fn public_inputs(&self) -> Vec<Fr> {
        let mut inputs = vec![self.sn_in, self.cm_out, self.pk_t.x, self.pk_t.y];
        inputs.extend_from_slice(&self.c_wd);
        inputs
    }
}

fn opening(note: &Note) -> OpeningWitness {
    OpeningWitness {
        coins: Some(note.coins),
        energy: Some(note.energy),
        pk: Some(note.pk),
        rho: Some(note.rho),
        r: Some(note.r),
        cm: Some(note.cm),
    }
}

/// Reclaim a registered note into a fresh output note for `pk_out`.
#[allow(clippy::too_many_arguments)]
pub fn create_withdraw<R: RngCore + CryptoRng>(
    input_note: &Note,
    sk_in: &Fr,
    coins_out: Fr,
    energy_out: Fr,
    pk_out: &Fr,
    bid: Fr,
    auctioneer_pk: Option<&G1Affine>,
    system: &ProofSystem<WithdrawCircuit>,
    cancel: &CancelToken,
    rng: &mut R,
) -> ProtocolResult<WithdrawRecord> {
    let pk_t = auctioneer_pk.ok_or(ProtocolError::MissingCounterparty)?;
    if !input_note.is_owned_by(sk_in) {
        return Err(ProtocolError::InvalidOwnership);
    }

    let sn_in = input_note.serial(sk_in);
    let rho_out = Fr::rand(rng);
    let rand_out = Fr::rand(rng);
    let note_out = Note::from_opening(coins_out, energy_out, *pk_out, rho_out, rand_out);

    let c_wd = encrypt_withdraw(pk_t, &bid, sk_in, pk_out);

    let circuit = WithdrawCircuit {
        sn_in: Some(sn_in),
        cm_out: Some(note_out.cm),
        pk_t: Some(*pk_t),
        c_wd: c_wd.map(Some),
        sk_in: Some(*sk_in),
        bid: Some(bid),
        note_in: opening(input_note),
        note_out: opening(&note_out),
    };
    let proof = system.prove(circuit, cancel)?;
    debug!(sn = %encoding::field_to_string(&sn_in), "withdraw proved");

    Ok(WithdrawRecord {
        sn_in,
        cm_out: note_out.cm,
        pk_t: *pk_t,
        c_wd,
        proof,
        produced_note: note_out,
    })
}

/// Verify a withdraw record's proof against its public inputs.
pub fn verify_withdraw(
    record: &WithdrawRecord,
    system: &ProofSystem<WithdrawCircuit>,
) -> ProtocolResult<()> {
    if system.verify(&record.proof, &record.public_inputs())? {
        Ok(())
    } else {
        Err(ProtocolError::InvalidProof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::DhKeypair;
    use rand::rngs::OsRng;

    #[test]
    fn public_inputs_are_ordered() {
        let kp = DhKeypair::generate(&mut OsRng);
        let note = Note::mint(
            Fr::from(90u64),
            Fr::from(45u64),
            &Fr::from(5u64),
            &mut OsRng,
        );

        let record = WithdrawRecord {
            sn_in: Fr::from(1u64),
            cm_out: note.cm,
            pk_t: kp.pk,
            c_wd: [Fr::from(2u64); WITHDRAW_CIPHERTEXT_LEN],
            proof: vec![9],
            produced_note: note,
        };

        let inputs = record.public_inputs();
        assert_eq!(inputs.len(), 2 + 2 + WITHDRAW_CIPHERTEXT_LEN);
        assert_eq!(inputs[0], record.sn_in);
        assert_eq!(inputs[2], record.pk_t.x);
        assert_eq!(inputs[4], record.c_wd[0]);
    }

    #[test]
    fn record_json_round_trip() {
        let kp = DhKeypair::generate(&mut OsRng);
        let note = Note::mint(
            Fr::from(90u64),
            Fr::from(45u64),
            &Fr::from(5u64),
            &mut OsRng,
        );

        let record = WithdrawRecord {
            sn_in: Fr::from(1u64),
            cm_out: note.cm,
            pk_t: kp.pk,
            c_wd: [Fr::from(2u64); WITHDRAW_CIPHERTEXT_LEN],
            proof: vec![1, 2, 3],
            produced_note: note,
        };

        let json = serde_json::to_string(&record).expect("serialize");
        let back: WithdrawRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.public_inputs(), record.public_inputs());
    }
}
