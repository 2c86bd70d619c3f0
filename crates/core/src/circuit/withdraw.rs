//! Withdraw circuit.
//!
//! The escape hatch when the auctioneer never posts an exchange: proves
//! that the withdrawing party knows the spending secret behind the revealed
//! serial number, that the output note commits correctly, and that the
//! 3-element ciphertext identifies the registration being reclaimed. The
//! mask chain is keyed by the auctioneer's long-term point alone; no
//! ephemeral scalar is involved.

use ark_bls12_377::G1Affine;
use ark_bw6_761::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::gadgets::otp::otp_encrypt_with_public_point;
use super::gadgets::{PointCoords, PoseidonGadget};
use crate::crypto::encryption::WITHDRAW_CIPHERTEXT_LEN;

/// A note opening carried in the witness.
#[derive(Clone, Copy)]
pub struct OpeningWitness {
    pub coins: Option<Fr>,
    pub energy: Option<Fr>,
    pub pk: Option<Fr>,
    pub rho: Option<Fr>,
    pub r: Option<Fr>,
    pub cm: Option<Fr>,
}

impl OpeningWitness {
    pub fn blank() -> Self {
        Self {
            coins: None,
            energy: None,
            pk: None,
            rho: None,
            r: None,
            cm: None,
        }
    }
}

/// Withdraw circuit. `None` fields make a blank instance for setup.
#[derive(Clone)]
pub struct WithdrawCircuit {
    // ===== Public inputs =====
    pub sn_in: Option<Fr>,
    pub cm_out: Option<Fr>,
    pub pk_t: Option<G1Affine>,
    pub c_wd: [Option<Fr>; WITHDRAW_CIPHERTEXT_LEN],

    // ===== Witness =====
    pub sk_in: Option<Fr>,
    pub bid: Option<Fr>,
    pub note_in: OpeningWitness,
    pub note_out: OpeningWitness,
}

impl WithdrawCircuit {
    /// Blank instance for Groth16 setup.
    pub fn blank() -> Self {
        Self {
            sn_in: None,
            cm_out: None,
            pk_t: None,
            c_wd: [None; WITHDRAW_CIPHERTEXT_LEN],
            sk_in: None,
            bid: None,
            note_in: OpeningWitness::blank(),
            note_out: OpeningWitness::blank(),
        }
    }
}

impl ConstraintSynthesizer<Fr> for WithdrawCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let witness = |v: &Option<Fr>| {
            let v = *v;
            FpVar::new_witness(cs.clone(), move || {
                v.ok_or(SynthesisError::AssignmentMissing)
            })
        };

        // Public inputs, in WithdrawRecord::public_inputs order.
        let sn_in = FpVar::new_input(cs.clone(), || {
            self.sn_in.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let cm_out = FpVar::new_input(cs.clone(), || {
            self.cm_out.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let pk_t = PointCoords::new_input(cs.clone(), &self.pk_t)?;
        let mut c_wd = Vec::with_capacity(WITHDRAW_CIPHERTEXT_LEN);
        for c in &self.c_wd {
            c_wd.push(FpVar::new_input(cs.clone(), || {
                c.ok_or(SynthesisError::AssignmentMissing)
            })?);
        }

        // Witness.
        let sk_in = witness(&self.sk_in)?;
        let bid = witness(&self.bid)?;

        let in_coins = witness(&self.note_in.coins)?;
        let in_energy = witness(&self.note_in.energy)?;
        let in_pk = witness(&self.note_in.pk)?;
        let in_rho = witness(&self.note_in.rho)?;
        let in_rand = witness(&self.note_in.r)?;
        let in_cm = witness(&self.note_in.cm)?;

        let out_coins = witness(&self.note_out.coins)?;
        let out_energy = witness(&self.note_out.energy)?;
        let out_pk = witness(&self.note_out.pk)?;
        let out_rho = witness(&self.note_out.rho)?;
        let out_rand = witness(&self.note_out.r)?;

        let poseidon = PoseidonGadget::new(cs.clone())?;

        // The revealed serial number belongs to the input note.
        let sn_computed = poseidon.hash2(&sk_in, &in_rho)?;
        sn_computed.enforce_equal(&sn_in)?;

        // The withdrawing party actually owns that note.
        let pk_computed = poseidon.hash(&[sk_in.clone()])?;
        pk_computed.enforce_equal(&in_pk)?;
        let in_cm_computed = poseidon.hash(&[in_coins, in_energy, in_pk, in_rho, in_rand])?;
        in_cm_computed.enforce_equal(&in_cm)?;

        // The output note commits to the declared opening.
        let cm_out_computed =
            poseidon.hash(&[out_coins, out_energy, out_pk.clone(), out_rho, out_rand])?;
        cm_out_computed.enforce_equal(&cm_out)?;

        // The ciphertext identifies the registration being withdrawn.
        let cipher = otp_encrypt_with_public_point(&poseidon, &pk_t, &[bid, sk_in, out_pk])?;
        for (computed, declared) in cipher.iter().zip(&c_wd) {
            computed.enforce_equal(declared)?;
        }

        Ok(())
    }
}
