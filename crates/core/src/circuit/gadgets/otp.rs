//! One-time-pad gadget.
//!
//! In-circuit mirror of `crypto::encryption`: masks are a Poseidon chain
//! seeded with the key point's affine coordinates, ciphertext elements are
//! plaintext plus mask.

use ark_bw6_761::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::r1cs::SynthesisError;

use super::curve::PointCoords;
use super::poseidon::PoseidonGadget;
use ark_bls12_377::constraints::G1Var;

/// Derive the OTP mask chain from key point coordinates.
pub fn mask_chain_from_coords(
    poseidon: &PoseidonGadget,
    key_x: &FpVar<Fr>,
    key_y: &FpVar<Fr>,
    len: usize,
) -> Result<Vec<FpVar<Fr>>, SynthesisError> {
    let mut masks = Vec::with_capacity(len);
    if len == 0 {
        return Ok(masks);
    }
    masks.push(poseidon.hash2(key_x, key_y)?);
    for i in 1..len {
        let next = poseidon.hash(&masks[i - 1..i])?;
        masks.push(next);
    }
    Ok(masks)
}

/// Derive the mask chain from a key point held in the curve gadget.
pub fn mask_chain_from_point(
    poseidon: &PoseidonGadget,
    key: &G1Var,
    len: usize,
) -> Result<Vec<FpVar<Fr>>, SynthesisError> {
    let affine = key.to_affine()?;
    mask_chain_from_coords(poseidon, &affine.x, &affine.y, len)
}

/// Encrypt a plaintext vector under public key coordinates.
pub fn otp_encrypt_with_coords(
    poseidon: &PoseidonGadget,
    key_x: &FpVar<Fr>,
    key_y: &FpVar<Fr>,
    plaintext: &[FpVar<Fr>],
) -> Result<Vec<FpVar<Fr>>, SynthesisError> {
    let masks = mask_chain_from_coords(poseidon, key_x, key_y, plaintext.len())?;
    Ok(plaintext
        .iter()
        .zip(masks)
        .map(|(p, m)| p + m)
        .collect())
}

/// Encrypt a plaintext vector under a key point.
pub fn otp_encrypt_with_point(
    poseidon: &PoseidonGadget,
    key: &G1Var,
    plaintext: &[FpVar<Fr>],
) -> Result<Vec<FpVar<Fr>>, SynthesisError> {
    let affine = key.to_affine()?;
    otp_encrypt_with_coords(poseidon, &affine.x, &affine.y, plaintext)
}

/// Encrypt under a point given as public coordinates.
pub fn otp_encrypt_with_public_point(
    poseidon: &PoseidonGadget,
    key: &PointCoords,
    plaintext: &[FpVar<Fr>],
) -> Result<Vec<FpVar<Fr>>, SynthesisError> {
    otp_encrypt_with_coords(poseidon, &key.x, &key.y, plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::gadgets::curve::witness_point;
    use crate::crypto::encryption::otp_encrypt;
    use crate::crypto::keys::DhKeypair;
    use ark_ff::UniformRand;
    use ark_r1cs_std::prelude::*;
    use ark_relations::r1cs::ConstraintSystem;
    use rand::rngs::OsRng;

    #[test]
    fn gadget_masks_match_native() {
        let kp = DhKeypair::generate(&mut OsRng);
        let other = DhKeypair::generate(&mut OsRng);
        let key = kp.shared_key(&other.pk);

        let plaintext: Vec<Fr> = (0..6).map(|_| Fr::rand(&mut OsRng)).collect();
        let native = otp_encrypt(&key, &plaintext);

        let cs = ConstraintSystem::<Fr>::new_ref();
        let poseidon = PoseidonGadget::new(cs.clone()).unwrap();
        let key_var = witness_point(cs.clone(), &Some(key)).unwrap();
        let plain_vars: Vec<FpVar<Fr>> = plaintext
            .iter()
            .map(|p| FpVar::new_witness(cs.clone(), || Ok(*p)).unwrap())
            .collect();

        let cipher = otp_encrypt_with_point(&poseidon, &key_var, &plain_vars).unwrap();

        for (var, expected) in cipher.iter().zip(&native) {
            assert_eq!(var.value().unwrap(), *expected);
        }
        assert!(cs.is_satisfied().unwrap());
    }
}
