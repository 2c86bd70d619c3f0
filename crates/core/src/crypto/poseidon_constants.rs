//! Poseidon round constants for the BW6-761 scalar field.
//!
//! The constants are derived deterministically from a domain separator so
//! the native hash and the in-circuit gadget always agree. For a production
//! deployment they should come from a published parameter set.
//!
//! Parameters:
//! - Field: BW6-761 scalar field (the BLS12-377 base field)
//! - Width: t = 3 (2 inputs + 1 capacity)
//! - Full rounds: RF = 8 (4 at start, 4 at end)
//! - Partial rounds: RP = 57
//! - S-box: x^5

use ark_bw6_761::Fr;
use ark_ff::{Field, PrimeField};

/// Number of full rounds (RF = 8)
pub const FULL_ROUNDS: usize = 8;

/// Number of partial rounds (RP = 57)
pub const PARTIAL_ROUNDS: usize = 57;

/// State width (t = 3 for 2 inputs)
pub const WIDTH: usize = 3;

/// Total number of round constants
pub const NUM_CONSTANTS: usize = WIDTH * (FULL_ROUNDS + PARTIAL_ROUNDS);

/// Generate round constants deterministically from the domain separator.
pub fn round_constants() -> Vec<Fr> {
    let mut constants = Vec::with_capacity(NUM_CONSTANTS);

    let domain = b"Poseidon_BW6761_t3_RF8_RP57";

    for i in 0..NUM_CONSTANTS {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain);
        hasher.update(&(i as u64).to_le_bytes());
        hasher.update(b"round_constant");

        let hash = hasher.finalize();
        // Bytes enter the field big-endian, the same convention the rest of
        // the crate uses for byte-to-field conversion.
        let constant = Fr::from_be_bytes_mod_order(hash.as_bytes());
        constants.push(constant);
    }

    constants
}

/// Generate the MDS matrix as a Cauchy matrix, M[i][j] = 1 / (x_i + y_j)
/// with x = [0, 1, 2] and y = [3, 4, 5]. Cauchy matrices with distinct,
/// non-overlapping generators are always MDS.
pub fn mds_matrix() -> Vec<Vec<Fr>> {
    let mut matrix = vec![vec![Fr::from(0u64); WIDTH]; WIDTH];

    let x: Vec<Fr> = (0..WIDTH).map(|i| Fr::from(i as u64)).collect();
    let y: Vec<Fr> = (WIDTH..(2 * WIDTH)).map(|i| Fr::from(i as u64)).collect();

    for i in 0..WIDTH {
        for j in 0..WIDTH {
            let sum = x[i] + y[j];
            matrix[i][j] = sum.inverse().unwrap_or_else(|| Fr::from(1u64));
        }
    }

    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_deterministic() {
        let a = round_constants();
        let b = round_constants();
        assert_eq!(a, b);
        assert_eq!(a.len(), NUM_CONSTANTS);
    }

    #[test]
    fn constants_are_distinct() {
        let constants = round_constants();
        for i in 1..constants.len() {
            assert_ne!(constants[0], constants[i]);
        }
    }

    #[test]
    fn mds_matrix_has_no_zero_entries() {
        let mds = mds_matrix();
        assert_eq!(mds.len(), WIDTH);
        for row in &mds {
            assert_eq!(row.len(), WIDTH);
            for entry in row {
                assert_ne!(*entry, Fr::from(0u64));
            }
        }
    }
}
