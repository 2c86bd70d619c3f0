//! Note commitments.
//!
//! A note commits to its full opening with a single sponge evaluation:
//! `cm = H(coins, energy, pk, rho, r)`. Dropping `pk` from the commitment
//! would let two notes of equal value owned by different parties collide.

use ark_bw6_761::Fr;

use super::poseidon::poseidon_hash;

/// Commit to a note opening: `Com(coins, energy, pk, rho, r)`.
pub fn note_commitment(coins: &Fr, energy: &Fr, pk: &Fr, rho: &Fr, r: &Fr) -> Fr {
    poseidon_hash(&[*coins, *energy, *pk, *rho, *r])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::serial::key_image;

    #[test]
    fn commitment_is_deterministic() {
        let pk = key_image(&Fr::from(999u64));
        let a = note_commitment(
            &Fr::from(100u64),
            &Fr::from(50u64),
            &pk,
            &Fr::from(111u64),
            &Fr::from(222u64),
        );
        let b = note_commitment(
            &Fr::from(100u64),
            &Fr::from(50u64),
            &pk,
            &Fr::from(111u64),
            &Fr::from(222u64),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn commitment_binds_value() {
        let pk = key_image(&Fr::from(999u64));
        let a = note_commitment(
            &Fr::from(100u64),
            &Fr::from(50u64),
            &pk,
            &Fr::from(111u64),
            &Fr::from(222u64),
        );
        let b = note_commitment(
            &Fr::from(101u64),
            &Fr::from(50u64),
            &pk,
            &Fr::from(111u64),
            &Fr::from(222u64),
        );
        assert_ne!(a, b);
    }

    #[test]
    fn commitment_binds_owner() {
        let a = note_commitment(
            &Fr::from(100u64),
            &Fr::from(50u64),
            &key_image(&Fr::from(1u64)),
            &Fr::from(111u64),
            &Fr::from(222u64),
        );
        let b = note_commitment(
            &Fr::from(100u64),
            &Fr::from(50u64),
            &key_image(&Fr::from(2u64)),
            &Fr::from(111u64),
            &Fr::from(222u64),
        );
        assert_ne!(a, b);
    }
}
