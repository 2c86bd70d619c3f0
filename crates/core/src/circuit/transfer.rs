//! Single-note transfer circuit (fan-in 1, fan-out 1).
//!
//! Proves that a spent note's opening is consistent with the published
//! serial number, that the produced note commits to the same value under
//! the recipient's key with `rho_new = H(0, sn_old)`, and that the
//! published ciphertext and ephemeral points were derived honestly.

use ark_bls12_377::G1Affine;
use ark_bw6_761::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::gadgets::{bound_point, scalar_mul, PointCoords, PoseidonGadget};
use crate::crypto::encryption::NOTE_CIPHERTEXT_LEN;

/// Transfer circuit. `None` fields make a blank instance for key setup.
#[derive(Clone)]
pub struct TransferCircuit {
    // ===== Public inputs =====
    pub old_coin: Option<Fr>,
    pub old_energy: Option<Fr>,
    pub cm_old: Option<Fr>,
    pub sn_old: Option<Fr>,
    pub pk_old: Option<Fr>,
    pub new_coin: Option<Fr>,
    pub new_energy: Option<Fr>,
    pub cm_new: Option<Fr>,
    pub c_new: [Option<Fr>; NOTE_CIPHERTEXT_LEN],
    pub g: Option<G1Affine>,
    pub g_b: Option<G1Affine>,
    pub g_r: Option<G1Affine>,

    // ===== Witness =====
    pub sk_old: Option<Fr>,
    pub rho_old: Option<Fr>,
    pub rand_old: Option<Fr>,
    pub pk_new: Option<Fr>,
    pub rho_new: Option<Fr>,
    pub rand_new: Option<Fr>,
    /// Ephemeral scalar, embedded in the circuit field.
    pub r: Option<Fr>,
}

impl TransferCircuit {
    /// Blank instance for Groth16 setup.
    pub fn blank() -> Self {
        Self {
            old_coin: None,
            old_energy: None,
            cm_old: None,
            sn_old: None,
            pk_old: None,
            new_coin: None,
            new_energy: None,
            cm_new: None,
            c_new: [None; NOTE_CIPHERTEXT_LEN],
            g: None,
            g_b: None,
            g_r: None,
            sk_old: None,
            rho_old: None,
            rand_old: None,
            pk_new: None,
            rho_new: None,
            rand_new: None,
            r: None,
        }
    }
}

fn input(cs: ConstraintSystemRef<Fr>, v: &Option<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
    FpVar::new_input(cs, || v.ok_or(SynthesisError::AssignmentMissing))
}

fn witness(cs: ConstraintSystemRef<Fr>, v: &Option<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
    FpVar::new_witness(cs, || v.ok_or(SynthesisError::AssignmentMissing))
}

impl ConstraintSynthesizer<Fr> for TransferCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // Public inputs, in the order TransferRecord::public_inputs emits.
        let old_coin = input(cs.clone(), &self.old_coin)?;
        let old_energy = input(cs.clone(), &self.old_energy)?;
        let cm_old = input(cs.clone(), &self.cm_old)?;
        let sn_old = input(cs.clone(), &self.sn_old)?;
        let pk_old = input(cs.clone(), &self.pk_old)?;
        let new_coin = input(cs.clone(), &self.new_coin)?;
        let new_energy = input(cs.clone(), &self.new_energy)?;
        let cm_new = input(cs.clone(), &self.cm_new)?;
        let mut c_new = Vec::with_capacity(NOTE_CIPHERTEXT_LEN);
        for c in &self.c_new {
            c_new.push(input(cs.clone(), c)?);
        }
        let g_coords = PointCoords::new_input(cs.clone(), &self.g)?;
        let g_b_coords = PointCoords::new_input(cs.clone(), &self.g_b)?;
        let g_r_coords = PointCoords::new_input(cs.clone(), &self.g_r)?;

        // Witness.
        let sk_old = witness(cs.clone(), &self.sk_old)?;
        let rho_old = witness(cs.clone(), &self.rho_old)?;
        let rand_old = witness(cs.clone(), &self.rand_old)?;
        let pk_new = witness(cs.clone(), &self.pk_new)?;
        let rho_new = witness(cs.clone(), &self.rho_new)?;
        let rand_new = witness(cs.clone(), &self.rand_new)?;
        let r = witness(cs.clone(), &self.r)?;

        let g = bound_point(cs.clone(), &self.g, &g_coords)?;
        let g_b = bound_point(cs.clone(), &self.g_b, &g_b_coords)?;

        let poseidon = PoseidonGadget::new(cs.clone())?;

        // Serial number of the spent note.
        let sn = poseidon.hash2(&sk_old, &rho_old)?;
        sn.enforce_equal(&sn_old)?;

        // Owner key image.
        let pk = poseidon.hash(&[sk_old])?;
        pk.enforce_equal(&pk_old)?;

        // The spent note's commitment opens.
        let cm_old_computed = poseidon.hash(&[
            old_coin.clone(),
            old_energy.clone(),
            pk_old.clone(),
            rho_old,
            rand_old,
        ])?;
        cm_old_computed.enforce_equal(&cm_old)?;

        // rho of the output is bound to the consumed serial number.
        let rho_new_computed = poseidon.hash(&[FpVar::zero(), sn])?;
        rho_new_computed.enforce_equal(&rho_new)?;

        // The produced note's commitment.
        let cm_new_computed = poseidon.hash(&[
            new_coin.clone(),
            new_energy.clone(),
            pk_new.clone(),
            rho_new.clone(),
            rand_new.clone(),
        ])?;
        cm_new_computed.enforce_equal(&cm_new)?;

        // Ciphertext under enc_key = [r] G_b.
        let enc_key = scalar_mul(&g_b, &r)?;
        let cipher = super::gadgets::otp::otp_encrypt_with_point(
            &poseidon,
            &enc_key,
            &[pk_new, new_coin.clone(), new_energy.clone(), rho_new, rand_new, cm_new.clone()],
        )?;
        for (computed, declared) in cipher.iter().zip(&c_new) {
            computed.enforce_equal(declared)?;
        }

        // G_r = [r] G.
        let g_r_computed = scalar_mul(&g, &r)?;
        g_r_coords.enforce_matches(&g_r_computed)?;

        // Value conservation.
        old_coin.enforce_equal(&new_coin)?;
        old_energy.enforce_equal(&new_energy)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::encryption::encrypt_note;
    use crate::crypto::keys::{generator, mul_generator, mul_point, scalar_to_field};
    use crate::crypto::{key_image, serial_number, transfer_output_rho};
    use crate::note::Note;
    use ark_bls12_377::Fr as DhScalar;
    use ark_ff::UniformRand;
    use ark_relations::r1cs::ConstraintSystem;
    use rand::rngs::OsRng;

    fn honest_instance() -> TransferCircuit {
        let sk_old = Fr::rand(&mut OsRng);
        let old_note = Note::mint(Fr::from(100u64), Fr::from(50u64), &sk_old, &mut OsRng);

        let sk_new = Fr::rand(&mut OsRng);
        let pk_new = key_image(&sk_new);

        let sn_old = serial_number(&sk_old, &old_note.rho);
        let rho_new = transfer_output_rho(&sn_old);
        let rand_new = Fr::rand(&mut OsRng);
        let new_note =
            Note::from_opening(old_note.coins, old_note.energy, pk_new, rho_new, rand_new);

        let b = DhScalar::rand(&mut OsRng);
        let r = DhScalar::rand(&mut OsRng);
        let g = generator();
        let g_b = mul_generator(&b);
        let g_r = mul_generator(&r);
        let enc_key = mul_point(&g_b, &r);
        let c_new = encrypt_note(&new_note, &enc_key);

        TransferCircuit {
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
            sk_old: Some(sk_old),
            rho_old: Some(old_note.rho),
            rand_old: Some(old_note.r),
            pk_new: Some(pk_new),
            rho_new: Some(rho_new),
            rand_new: Some(rand_new),
            r: Some(scalar_to_field(&r)),
        }
    }

    #[test]
    fn honest_transfer_satisfies() {
        let circuit = honest_instance();

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn wrong_serial_number_fails() {
        let mut circuit = honest_instance();
        circuit.sn_old = Some(Fr::rand(&mut OsRng));

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn broken_value_conservation_fails() {
        let mut circuit = honest_instance();
        circuit.new_coin = Some(Fr::from(999u64));

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let mut circuit = honest_instance();
        circuit.c_new[2] = circuit.c_new[2].map(|c| c + Fr::from(1u64));

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn foreign_secret_key_fails() {
        let mut circuit = honest_instance();
        circuit.sk_old = Some(Fr::rand(&mut OsRng));

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }
}
