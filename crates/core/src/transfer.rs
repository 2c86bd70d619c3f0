//! Single-note transfer: driver, record, verification.

use ark_bls12_377::{Fr as DhScalar, G1Affine};
use ark_bw6_761::Fr;
use ark_ff::UniformRand;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::circuit::TransferCircuit;
use crate::crypto::encryption::{encrypt_note, NOTE_CIPHERTEXT_LEN};
use crate::crypto::keys::{generator, mul_generator, mul_point, scalar_to_field};
use crate::crypto::transfer_output_rho;
use crate::encoding;
use crate::error::{ProtocolError, ProtocolResult};
use crate::note::Note;
use crate::proof::{CancelToken, ProofSystem};

/// A published single-note transfer: public inputs, proof, and the consumed
/// and produced notes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferRecord {
    #[serde(with = "encoding::field")]
    pub old_coin: Fr,
    #[serde(with = "encoding::field")]
    pub old_energy: Fr,
    #[serde(with = "encoding::field")]
    pub cm_old: Fr,
    #[serde(with = "encoding::field")]
    pub sn_old: Fr,
    #[serde(with = "encoding::field")]
    pub pk_old: Fr,
    #[serde(with = "encoding::field")]
    pub new_coin: Fr,
    #[serde(with = "encoding::field")]
    pub new_energy: Fr,
    #[serde(with = "encoding::field")]
    pub cm_new: Fr,
    #[serde(with = "encoding::field_array")]
    pub c_new: [Fr; NOTE_CIPHERTEXT_LEN],
    #[serde(with = "encoding::point")]
    pub g: G1Affine,
    #[serde(with = "encoding::point")]
    pub g_b: G1Affine,
    #[serde(with = "encoding::point")]
    pub g_r: G1Affine,
    #[serde(with = "encoding::hex_bytes")]
    pub proof: Vec<u8>,
    pub old_note: Note,
    pub new_note: Note,
}

impl TransferRecord {
    /// Public inputs in the circuit's allocation order.
    pub fn public_inputs(&self) -> Vec<Fr> {
        let mut inputs = vec![
            self.old_coin,
            self.old_energy,
            self.cm_old,
            self.sn_old,
            self.pk_old,
            self.new_coin,
            self.new_energy,
            self.cm_new,
        ];
        inputs.extend_from_slice(&self.c_new);
        for p in [&self.g, &self.g_b, &self.g_r] {
            inputs.push(p.x);
            inputs.push(p.y);
        }
        inputs
    }
}

/// Spend `old_note` into a note of the same value owned by `pk_new`.
///
/// `recipient_key` is the point the ciphertext key is built against
/// (`G_b`); whoever holds its discrete log can recompute
/// `enc_key = [b] G_r` and recognise the note.
#[allow(clippy::too_many_arguments)]
pub fn create_transfer<R: RngCore + CryptoRng>(
    old_note: &Note,
    sk_old: &Fr,
    pk_new: &Fr,
    coins: Fr,
    energy: Fr,
    recipient_key: &G1Affine,
    system: &ProofSystem<TransferCircuit>,
    cancel: &CancelToken,
    rng: &mut R,
) -> ProtocolResult<TransferRecord> {
    if !old_note.is_owned_by(sk_old) {
        return Err(ProtocolError::InvalidOwnership);
    }
    if coins != old_note.coins || energy != old_note.energy {
        return Err(ProtocolError::Witness(
            "transfer must conserve the note value".into(),
        ));
    }

    let sn_old = old_note.serial(sk_old);
    let rho_new = transfer_output_rho(&sn_old);
    let rand_new = Fr::rand(rng);
    let new_note = Note::from_opening(coins, energy, *pk_new, rho_new, rand_new);

    // Ephemeral key agreement against the recipient point.
    let r = DhScalar::rand(rng);
    let g = generator();
    let g_b = *recipient_key;
    let g_r = mul_generator(&r);
    let enc_key = mul_point(&g_b, &r);
    let c_new = encrypt_note(&new_note, &enc_key);

    let circuit = TransferCircuit {
        old_coin: Some(old_note.coins),
        old_energy: Some(old_note.energy),
        cm_old: Some(old_note.cm),
        sn_old: Some(sn_old),
        pk_old: Some(old_note.pk),
        new_coin: Some(new_note.coins),
        new_energy: Some(new_note.energy),
        cm_new: Some(new_note.cm),
        c_new: c_new.map(Some),
        g: Some(g),
        g_b: Some(g_b),
        g_r: Some(g_r),
        sk_old: Some(*sk_old),
        rho_old: Some(old_note.rho),
        rand_old: Some(old_note.r),
        pk_new: Some(*pk_new),
        rho_new: Some(rho_new),
        rand_new: Some(rand_new),
        r: Some(scalar_to_field(&r)),
    };

    let proof = system.prove(circuit, cancel)?;
    debug!(sn = %encoding::field_to_string(&sn_old), "transfer proved");

    Ok(TransferRecord {
        old_coin: old_note.coins,
        old_energy: old_note.energy,
        cm_old: old_note.cm,
        sn_old,
        pk_old: old_note.pk,
        new_coin: new_note.coins,
        new_energy: new_note.energy,
        cm_new: new_note.cm,
        c_new,
        g,
        g_b,
        g_r,
        proof,
        old_note: old_note.clone(),
        new_note,
    })
}

/// Verify a transfer record's proof against its public inputs.
pub fn verify_transfer(
    record: &TransferRecord,
    system: &ProofSystem<TransferCircuit>,
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
    fn record_public_inputs_are_flat_and_ordered() {
        let sk = Fr::from(1u64);
        let note = Note::mint(Fr::from(100u64), Fr::from(50u64), &sk, &mut OsRng);
        let kp = DhKeypair::generate(&mut OsRng);

        let record = TransferRecord {
            old_coin: note.coins,
            old_energy: note.energy,
            cm_old: note.cm,
            sn_old: Fr::from(3u64),
            pk_old: note.pk,
            new_coin: note.coins,
            new_energy: note.energy,
            cm_new: Fr::from(4u64),
            c_new: [Fr::from(5u64); NOTE_CIPHERTEXT_LEN],
            g: kp.pk,
            g_b: kp.pk,
            g_r: kp.pk,
            proof: vec![0u8; 4],
            old_note: note.clone(),
            new_note: note,
        };

        let inputs = record.public_inputs();
        // 8 scalars + 6 ciphertext elements + 3 points of 2 coordinates.
        assert_eq!(inputs.len(), 8 + NOTE_CIPHERTEXT_LEN + 6);
        assert_eq!(inputs[0], record.old_coin);
        assert_eq!(inputs[8], record.c_new[0]);
        assert_eq!(inputs[14], record.g.x);
    }

    #[test]
    fn record_json_round_trip() {
        let sk = Fr::from(1u64);
        let note = Note::mint(Fr::from(100u64), Fr::from(50u64), &sk, &mut OsRng);
        let kp = DhKeypair::generate(&mut OsRng);

        let record = TransferRecord {
            old_coin: note.coins,
            old_energy: note.energy,
            cm_old: note.cm,
            sn_old: Fr::from(3u64),
            pk_old: note.pk,
            new_coin: note.coins,
            new_energy: note.energy,
            cm_new: Fr::from(4u64),
            c_new: [Fr::from(5u64); NOTE_CIPHERTEXT_LEN],
            g: kp.pk,
            g_b: kp.pk,
            g_r: kp.pk,
            proof: vec![1, 2, 3],
            old_note: note.clone(),
            new_note: note,
        };

        let json = serde_json::to_string(&record).expect("serialize");
        let back: TransferRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.public_inputs(), record.public_inputs());
        assert_eq!(back.proof, record.proof);
    }
}
