//! Batched exchange circuit, fixed fan-in/out N.
//!
//! Per slot it carries the transfer-style constraints (serial number, key
//! image, input commitment opening, output commitment, batched rho
//! derivation) plus the decrypt-check that the published registration
//! ciphertext opens, under the auctioneer/participant shared key, to the
//! same values the slot is spending. The shared keys themselves are bound
//! to the declared DH points: `shared_k[i] = [sk_T] pk_dh[i]` with
//! `pk_T = [sk_T] G`.
//!
//! The matching rule stays off-circuit; the circuit pins the policy
//! invariant instead: output totals equal input totals, coin-wise and
//! energy-wise.

use ark_bls12_377::G1Affine;
use ark_bw6_761::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::gadgets::otp::otp_encrypt_with_point;
use super::gadgets::{bound_point, scalar_mul, PointCoords, PoseidonGadget};
use crate::crypto::encryption::REGISTRATION_CIPHERTEXT_LEN;

/// Per-slot witness of the exchange circuit.
#[derive(Clone, Copy)]
pub struct ExchangeSlotWitness {
    pub in_coin: Option<Fr>,
    pub in_energy: Option<Fr>,
    pub pk_in: Option<Fr>,
    pub rho_in: Option<Fr>,
    pub rand_in: Option<Fr>,
    pub sk_in: Option<Fr>,
    pub bid: Option<Fr>,
    pub out_coin: Option<Fr>,
    pub out_energy: Option<Fr>,
    pub pk_out: Option<Fr>,
    pub rho_out: Option<Fr>,
    pub rand_out: Option<Fr>,
}

impl ExchangeSlotWitness {
    pub fn blank() -> Self {
        Self {
            in_coin: None,
            in_energy: None,
            pk_in: None,
            rho_in: None,
            rand_in: None,
            sk_in: None,
            bid: None,
            out_coin: None,
            out_energy: None,
            pk_out: None,
            rho_out: None,
            rand_out: None,
        }
    }
}

/// Exchange circuit for a batch of N registrations.
#[derive(Clone)]
pub struct ExchangeCircuit<const N: usize> {
    // ===== Public inputs =====
    pub sn_in: [Option<Fr>; N],
    pub cm_in: [Option<Fr>; N],
    pub cm_out: [Option<Fr>; N],
    pub c: [[Option<Fr>; REGISTRATION_CIPHERTEXT_LEN]; N],
    pub pk_dh: [Option<G1Affine>; N],
    pub pk_t: Option<G1Affine>,
    pub g: Option<G1Affine>,

    // ===== Witness =====
    pub slots: [ExchangeSlotWitness; N],
    /// Auctioneer DH secret, embedded in the circuit field.
    pub sk_t: Option<Fr>,
}

impl<const N: usize> ExchangeCircuit<N> {
    /// Blank instance for Groth16 setup.
    pub fn blank() -> Self {
        Self {
            sn_in: [None; N],
            cm_in: [None; N],
            cm_out: [None; N],
            c: [[None; REGISTRATION_CIPHERTEXT_LEN]; N],
            pk_dh: [None; N],
            pk_t: None,
            g: None,
            slots: [ExchangeSlotWitness::blank(); N],
            sk_t: None,
        }
    }
}

impl<const N: usize> ConstraintSynthesizer<Fr> for ExchangeCircuit<N> {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let input = |v: &Option<Fr>| {
            let v = *v;
            FpVar::new_input(cs.clone(), move || {
                v.ok_or(SynthesisError::AssignmentMissing)
            })
        };
        let witness = |v: &Option<Fr>| {
            let v = *v;
            FpVar::new_witness(cs.clone(), move || {
                v.ok_or(SynthesisError::AssignmentMissing)
            })
        };

        // Public inputs, in ExchangeRecord::public_inputs order.
        let sn_in: Vec<FpVar<Fr>> = self.sn_in.iter().map(&input).collect::<Result<_, _>>()?;
        let cm_in: Vec<FpVar<Fr>> = self.cm_in.iter().map(&input).collect::<Result<_, _>>()?;
        let cm_out: Vec<FpVar<Fr>> = self.cm_out.iter().map(&input).collect::<Result<_, _>>()?;
        let mut c = Vec::with_capacity(N);
        for row in &self.c {
            let row: Vec<FpVar<Fr>> = row.iter().map(&input).collect::<Result<_, _>>()?;
            c.push(row);
        }
        let mut pk_dh_coords = Vec::with_capacity(N);
        for p in &self.pk_dh {
            pk_dh_coords.push(PointCoords::new_input(cs.clone(), p)?);
        }
        let pk_t_coords = PointCoords::new_input(cs.clone(), &self.pk_t)?;
        let g_coords = PointCoords::new_input(cs.clone(), &self.g)?;

        // Witness.
        let sk_t = witness(&self.sk_t)?;
        let g = bound_point(cs.clone(), &self.g, &g_coords)?;
        let mut pk_dh = Vec::with_capacity(N);
        for (p, coords) in self.pk_dh.iter().zip(&pk_dh_coords) {
            pk_dh.push(bound_point(cs.clone(), p, coords)?);
        }

        let poseidon = PoseidonGadget::new(cs.clone())?;

        // The declared auctioneer key matches the decryption secret.
        let pk_t_computed = scalar_mul(&g, &sk_t)?;
        pk_t_coords.enforce_matches(&pk_t_computed)?;

        // Serial numbers first: every slot's output rho hashes all of them.
        let mut serials = Vec::with_capacity(N);
        let mut slots = Vec::with_capacity(N);
        for slot in &self.slots {
            let sk_in = witness(&slot.sk_in)?;
            let rho_in = witness(&slot.rho_in)?;
            let sn = poseidon.hash2(&sk_in, &rho_in)?;
            serials.push(sn);
            slots.push((sk_in, rho_in));
        }
        for (sn, declared) in serials.iter().zip(&sn_in) {
            sn.enforce_equal(declared)?;
        }

        let mut total_in_coin = FpVar::<Fr>::zero();
        let mut total_in_energy = FpVar::<Fr>::zero();
        let mut total_out_coin = FpVar::<Fr>::zero();
        let mut total_out_energy = FpVar::<Fr>::zero();

        for (i, slot) in self.slots.iter().enumerate() {
            let (sk_in, rho_in) = slots[i].clone();

            let in_coin = witness(&slot.in_coin)?;
            let in_energy = witness(&slot.in_energy)?;
            let pk_in = witness(&slot.pk_in)?;
            let rand_in = witness(&slot.rand_in)?;
            let bid = witness(&slot.bid)?;
            let out_coin = witness(&slot.out_coin)?;
            let out_energy = witness(&slot.out_energy)?;
            let pk_out = witness(&slot.pk_out)?;
            let rho_out = witness(&slot.rho_out)?;
            let rand_out = witness(&slot.rand_out)?;

            // Key image of the slot's spender.
            let pk_computed = poseidon.hash(&[sk_in.clone()])?;
            pk_computed.enforce_equal(&pk_in)?;

            // The consumed note opens.
            let cm_in_computed = poseidon.hash(&[
                in_coin.clone(),
                in_energy.clone(),
                pk_in,
                rho_in,
                rand_in,
            ])?;
            cm_in_computed.enforce_equal(&cm_in[i])?;

            // rho_out[i] = H(i, sn_0, ..., sn_{N-1}).
            let mut rho_inputs = Vec::with_capacity(N + 1);
            rho_inputs.push(FpVar::constant(Fr::from(i as u64)));
            rho_inputs.extend(serials.iter().cloned());
            let rho_out_computed = poseidon.hash(&rho_inputs)?;
            rho_out_computed.enforce_equal(&rho_out)?;

            // The produced note's commitment.
            let cm_out_computed = poseidon.hash(&[
                out_coin.clone(),
                out_energy.clone(),
                pk_out.clone(),
                rho_out,
                rand_out,
            ])?;
            cm_out_computed.enforce_equal(&cm_out[i])?;

            // The registration ciphertext opens, under the slot's shared
            // key, to exactly the values this slot spends and pays out to.
            let shared = scalar_mul(&pk_dh[i], &sk_t)?;
            let cipher = otp_encrypt_with_point(
                &poseidon,
                &shared,
                &[pk_out, sk_in, bid, in_coin.clone(), in_energy.clone()],
            )?;
            for (computed, declared) in cipher.iter().zip(&c[i]) {
                computed.enforce_equal(declared)?;
            }

            total_in_coin += &in_coin;
            total_in_energy += &in_energy;
            total_out_coin += &out_coin;
            total_out_energy += &out_energy;
        }

        // Conservation across the batch.
        total_in_coin.enforce_equal(&total_out_coin)?;
        total_in_energy.enforce_equal(&total_out_energy)?;

        Ok(())
    }
}
