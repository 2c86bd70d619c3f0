//! Key images and serial numbers.
//!
//! A note owner is identified by the key image `pk = H(sk)`; the note's
//! single spend marker is the serial number `sn = H(sk, rho)`, revealed only
//! when the note is consumed. Both are Poseidon evaluations so the circuits
//! can recompute them from the witness.

use ark_bw6_761::Fr;

use super::poseidon::{poseidon_hash, poseidon_hash2};

/// Derive the public key image of a spending secret, `pk = H(sk)`.
pub fn key_image(sk: &Fr) -> Fr {
    poseidon_hash(&[*sk])
}

/// Compute the serial number of a note, `sn = PRF_sk(rho) = H(sk, rho)`.
pub fn serial_number(sk: &Fr, rho: &Fr) -> Fr {
    poseidon_hash2(sk, rho)
}

/// Rho of the single output of a one-to-one transfer, `H(0, sn_old)`.
///
/// Binding the fresh rho to the consumed serial number stops a prover from
/// smuggling in an externally chosen rho.
pub fn transfer_output_rho(sn_old: &Fr) -> Fr {
    poseidon_hash(&[Fr::from(0u64), *sn_old])
}

/// Rho of exchange output slot `j`, `H(j, sn_0, ..., sn_{N-1})`.
pub fn exchange_output_rho(slot: usize, serials: &[Fr]) -> Fr {
    let mut inputs = Vec::with_capacity(serials.len() + 1);
    inputs.push(Fr::from(slot as u64));
    inputs.extend_from_slice(serials);
    poseidon_hash(&inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::PrimeField;

    #[test]
    fn serial_number_is_deterministic_and_keyed() {
        let sk = Fr::from_be_bytes_mod_order(&[0xaa; 32]);
        let sk_other = Fr::from_be_bytes_mod_order(&[0xac; 32]);
        let rho = Fr::from_be_bytes_mod_order(&[0xbb; 32]);

        assert_eq!(serial_number(&sk, &rho), serial_number(&sk, &rho));
        assert_ne!(serial_number(&sk, &rho), serial_number(&sk_other, &rho));
    }

    #[test]
    fn key_image_hides_secret() {
        let sk = Fr::from(999u64);
        assert_ne!(key_image(&sk), sk);
        assert_eq!(key_image(&sk), key_image(&sk));
    }

    #[test]
    fn transfer_rho_matches_slot_zero_of_batch() {
        let sn = Fr::from(4242u64);
        assert_eq!(transfer_output_rho(&sn), exchange_output_rho(0, &[sn]));
    }

    #[test]
    fn exchange_rho_separates_slots() {
        let serials: Vec<Fr> = (0..4u64).map(Fr::from).collect();
        assert_ne!(
            exchange_output_rho(0, &serials),
            exchange_output_rho(1, &serials)
        );
    }
}
