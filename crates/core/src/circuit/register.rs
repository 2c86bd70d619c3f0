//! Registration circuit.
//!
//! Proves that the note committed on the ledger opens to the declared
//! opening, that its owner key image is derived from `sk_in`, and that the
//! published 5-element ciphertext is the one-time-pad encryption of
//! `(pk_out, sk_in, bid, coins, energy)` under `[R] pk_T` with `G_r = [R] G`
//! revealed. The bid and the note value stay in the witness: a sealed bid
//! is sealed.

use ark_bls12_377::G1Affine;
use ark_bw6_761::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::gadgets::otp::otp_encrypt_with_point;
use super::gadgets::{bound_point, scalar_mul, PointCoords, PoseidonGadget};
use crate::crypto::encryption::REGISTRATION_CIPHERTEXT_LEN;

/// Registration circuit. `None` fields make a blank instance for setup.
#[derive(Clone)]
pub struct RegisterCircuit {
    // ===== Public inputs =====
    pub cm_in: Option<Fr>,
    pub c_aux: [Option<Fr>; REGISTRATION_CIPHERTEXT_LEN],
    pub g: Option<G1Affine>,
    pub pk_t: Option<G1Affine>,
    pub g_r: Option<G1Affine>,

    // ===== Witness =====
    pub coins: Option<Fr>,
    pub energy: Option<Fr>,
    pub bid: Option<Fr>,
    pub rho_in: Option<Fr>,
    pub rand_in: Option<Fr>,
    pub sk_in: Option<Fr>,
    pub pk_in: Option<Fr>,
    pub pk_out: Option<Fr>,
    /// Ephemeral DH scalar R, embedded in the circuit field.
    pub r: Option<Fr>,
}

impl RegisterCircuit {
    /// Blank instance for Groth16 setup.
    pub fn blank() -> Self {
        Self {
            cm_in: None,
            c_aux: [None; REGISTRATION_CIPHERTEXT_LEN],
            g: None,
            pk_t: None,
            g_r: None,
            coins: None,
            energy: None,
            bid: None,
            rho_in: None,
            rand_in: None,
            sk_in: None,
            pk_in: None,
            pk_out: None,
            r: None,
        }
    }
}

impl ConstraintSynthesizer<Fr> for RegisterCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // Public inputs, in RegistrationRecord::public_inputs order.
        let cm_in = FpVar::new_input(cs.clone(), || {
            self.cm_in.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let mut c_aux = Vec::with_capacity(REGISTRATION_CIPHERTEXT_LEN);
        for c in &self.c_aux {
            c_aux.push(FpVar::new_input(cs.clone(), || {
                c.ok_or(SynthesisError::AssignmentMissing)
            })?);
        }
        let g_coords = PointCoords::new_input(cs.clone(), &self.g)?;
        let pk_t_coords = PointCoords::new_input(cs.clone(), &self.pk_t)?;
        let g_r_coords = PointCoords::new_input(cs.clone(), &self.g_r)?;

        // Witness.
        let new_witness = |v: &Option<Fr>| {
            let v = *v;
            FpVar::new_witness(cs.clone(), move || {
                v.ok_or(SynthesisError::AssignmentMissing)
            })
        };
        let coins = new_witness(&self.coins)?;
        let energy = new_witness(&self.energy)?;
        let bid = new_witness(&self.bid)?;
        let rho_in = new_witness(&self.rho_in)?;
        let rand_in = new_witness(&self.rand_in)?;
        let sk_in = new_witness(&self.sk_in)?;
        let pk_in = new_witness(&self.pk_in)?;
        let pk_out = new_witness(&self.pk_out)?;
        let r = new_witness(&self.r)?;

        let g = bound_point(cs.clone(), &self.g, &g_coords)?;
        let pk_t = bound_point(cs.clone(), &self.pk_t, &pk_t_coords)?;

        let poseidon = PoseidonGadget::new(cs.clone())?;

        // The registered note opens to the declared opening.
        let cm_computed = poseidon.hash(&[
            coins.clone(),
            energy.clone(),
            pk_in.clone(),
            rho_in,
            rand_in,
        ])?;
        cm_computed.enforce_equal(&cm_in)?;

        // pk_in = H(sk_in).
        let pk_computed = poseidon.hash(&[sk_in.clone()])?;
        pk_computed.enforce_equal(&pk_in)?;

        // C_Aux is the OTP encryption under the shared key [R] pk_T.
        let shared = scalar_mul(&pk_t, &r)?;
        let cipher =
            otp_encrypt_with_point(&poseidon, &shared, &[pk_out, sk_in, bid, coins, energy])?;
        for (computed, declared) in cipher.iter().zip(&c_aux) {
            computed.enforce_equal(declared)?;
        }

        // G_r = [R] G.
        let g_r_computed = scalar_mul(&g, &r)?;
        g_r_coords.enforce_matches(&g_r_computed)?;

        Ok(())
    }
}
