//! Poseidon sponge over the BW6-761 scalar field.
//!
//! This is the protocol hash H: every commitment, serial number, key image
//! and encryption mask in the system is a Poseidon evaluation. The sponge
//! absorbs at rate 2 (additive absorption, one permutation per chunk) and
//! squeezes a single field element. The circuit gadget in
//! `circuit::gadgets::poseidon` mirrors this function round for round;
//! any divergence between the two makes every Groth16 proof unverifiable.

use ark_bw6_761::Fr;
use ark_ff::Field;

use super::poseidon_constants::{self, FULL_ROUNDS, PARTIAL_ROUNDS, WIDTH};

/// Poseidon parameters: round constants and MDS matrix.
pub struct PoseidonParams {
    pub round_constants: Vec<Fr>,
    pub mds_matrix: Vec<Vec<Fr>>,
}

impl Default for PoseidonParams {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseidonParams {
    pub fn new() -> Self {
        Self {
            round_constants: poseidon_constants::round_constants(),
            mds_matrix: poseidon_constants::mds_matrix(),
        }
    }
}

/// Poseidon hasher instance.
pub struct Poseidon {
    params: PoseidonParams,
}

impl Default for Poseidon {
    fn default() -> Self {
        Self::new()
    }
}

impl Poseidon {
    pub fn new() -> Self {
        Self {
            params: PoseidonParams::new(),
        }
    }

    /// Sponge hash of an arbitrary number of field elements.
    ///
    /// Absorbs the input in rate-2 chunks into state slots 1 and 2 (slot 0
    /// is the capacity), permuting after each chunk, then squeezes state[0].
    /// An empty input is a protocol bug, not a runtime condition.
    pub fn hash(&self, inputs: &[Fr]) -> Fr {
        debug_assert!(!inputs.is_empty(), "hashing an empty input");

        let mut state = [Fr::from(0u64); WIDTH];
        for chunk in inputs.chunks(WIDTH - 1) {
            for (i, input) in chunk.iter().enumerate() {
                state[i + 1] += input;
            }
            self.permute(&mut state);
        }
        state[0]
    }

    /// Hash two field elements.
    pub fn hash2(&self, a: &Fr, b: &Fr) -> Fr {
        self.hash(&[*a, *b])
    }

    /// Apply the Poseidon permutation to the state.
    fn permute(&self, state: &mut [Fr; WIDTH]) {
        let mut round_ctr = 0;

        // First half of full rounds
        for _ in 0..(FULL_ROUNDS / 2) {
            self.full_round(state, round_ctr);
            round_ctr += WIDTH;
        }

        // Partial rounds
        for _ in 0..PARTIAL_ROUNDS {
            self.partial_round(state, round_ctr);
            round_ctr += WIDTH;
        }

        // Second half of full rounds
        for _ in 0..(FULL_ROUNDS / 2) {
            self.full_round(state, round_ctr);
            round_ctr += WIDTH;
        }
    }

    /// Full round: S-box on all elements, then MDS.
    fn full_round(&self, state: &mut [Fr; WIDTH], round_ctr: usize) {
        for i in 0..WIDTH {
            state[i] += self.params.round_constants[round_ctr + i];
        }

        for elem in state.iter_mut() {
            *elem = sbox(*elem);
        }

        self.mds_multiply(state);
    }

    /// Partial round: S-box on the first element only, then MDS.
    fn partial_round(&self, state: &mut [Fr; WIDTH], round_ctr: usize) {
        for i in 0..WIDTH {
            state[i] += self.params.round_constants[round_ctr + i];
        }

        state[0] = sbox(state[0]);

        self.mds_multiply(state);
    }

    fn mds_multiply(&self, state: &mut [Fr; WIDTH]) {
        let mut new_state = [Fr::from(0u64); WIDTH];

        for i in 0..WIDTH {
            for j in 0..WIDTH {
                new_state[i] += self.params.mds_matrix[i][j] * state[j];
            }
        }

        *state = new_state;
    }
}

/// S-box function: x^5
#[inline]
fn sbox(x: Fr) -> Fr {
    let x2 = x.square();
    let x4 = x2.square();
    x4 * x
}

// ============================================================================
// Public API
// ============================================================================

// Parameter generation is not free, so each thread reuses one instance.
thread_local! {
    static POSEIDON: Poseidon = Poseidon::new();
}

/// Sponge hash of a slice of field elements.
pub fn poseidon_hash(inputs: &[Fr]) -> Fr {
    POSEIDON.with(|p| p.hash(inputs))
}

/// Hash two field elements.
pub fn poseidon_hash2(a: &Fr, b: &Fr) -> Fr {
    POSEIDON.with(|p| p.hash2(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let inputs = [
            Fr::from(12345u64),
            Fr::from(67890u64),
            Fr::from(111u64),
            Fr::from(222u64),
            Fr::from(333u64),
        ];

        assert_eq!(poseidon_hash(&inputs), poseidon_hash(&inputs));
    }

    #[test]
    fn hash_separates_inputs() {
        let a = Fr::from(1u64);
        let b = Fr::from(2u64);
        let c = Fr::from(3u64);

        assert_ne!(poseidon_hash2(&a, &b), poseidon_hash2(&a, &c));
        assert_ne!(poseidon_hash2(&a, &b), poseidon_hash2(&b, &a));
    }

    #[test]
    fn hash_length_extension_differs() {
        let a = Fr::from(7u64);
        let b = Fr::from(8u64);

        assert_ne!(poseidon_hash(&[a]), poseidon_hash(&[a, b]));
        assert_ne!(poseidon_hash(&[a, b]), poseidon_hash(&[a, b, a]));
    }

    #[test]
    fn permutation_moves_state() {
        let poseidon = Poseidon::new();

        let mut state = [Fr::from(0u64), Fr::from(1u64), Fr::from(2u64)];
        poseidon.permute(&mut state);

        assert_ne!(state[0], Fr::from(0u64));
    }

    #[test]
    fn sbox_is_fifth_power() {
        let x = Fr::from(2u64);
        assert_eq!(sbox(x), Fr::from(32u64));
    }

    #[test]
    fn single_input_hash() {
        let hash = poseidon_hash(&[Fr::from(42u64)]);
        assert_ne!(hash, Fr::from(0u64));
    }
}
