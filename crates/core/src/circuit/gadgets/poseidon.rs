//! Poseidon hash gadget.
//!
//! R1CS mirror of `crypto::poseidon`: same constants, same sponge chunking,
//! same round structure. Every circuit recomputes commitments, serial
//! numbers and masks with this gadget and compares them to values produced
//! natively, so the two implementations must agree bit for bit.

use ark_bw6_761::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::crypto::poseidon_constants::{
    mds_matrix, round_constants, FULL_ROUNDS, PARTIAL_ROUNDS, WIDTH,
};

/// Poseidon hash gadget holding the constants as circuit constants.
pub struct PoseidonGadget {
    round_constants: Vec<FpVar<Fr>>,
    mds_matrix: Vec<Vec<FpVar<Fr>>>,
}

impl PoseidonGadget {
    pub fn new(cs: ConstraintSystemRef<Fr>) -> Result<Self, SynthesisError> {
        let rc = round_constants();
        let mds = mds_matrix();

        let round_constants = rc
            .iter()
            .map(|c| FpVar::new_constant(cs.clone(), *c))
            .collect::<Result<Vec<_>, _>>()?;

        let mds_matrix = mds
            .iter()
            .map(|row| {
                row.iter()
                    .map(|c| FpVar::new_constant(cs.clone(), *c))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            round_constants,
            mds_matrix,
        })
    }

    /// Sponge hash of the inputs; chunking identical to the native sponge.
    pub fn hash(&self, inputs: &[FpVar<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
        if inputs.is_empty() {
            return Err(SynthesisError::AssignmentMissing);
        }

        let mut state = vec![FpVar::zero(); WIDTH];
        for chunk in inputs.chunks(WIDTH - 1) {
            for (i, input) in chunk.iter().enumerate() {
                state[i + 1] = &state[i + 1] + input;
            }
            self.permute(&mut state)?;
        }
        Ok(state[0].clone())
    }

    /// Hash two elements.
    pub fn hash2(&self, a: &FpVar<Fr>, b: &FpVar<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
        self.hash(&[a.clone(), b.clone()])
    }

    fn permute(&self, state: &mut [FpVar<Fr>]) -> Result<(), SynthesisError> {
        let mut round_ctr = 0;

        for _ in 0..(FULL_ROUNDS / 2) {
            self.full_round(state, round_ctr)?;
            round_ctr += WIDTH;
        }

        for _ in 0..PARTIAL_ROUNDS {
            self.partial_round(state, round_ctr)?;
            round_ctr += WIDTH;
        }

        for _ in 0..(FULL_ROUNDS / 2) {
            self.full_round(state, round_ctr)?;
            round_ctr += WIDTH;
        }

        Ok(())
    }

    fn full_round(&self, state: &mut [FpVar<Fr>], round_ctr: usize) -> Result<(), SynthesisError> {
        for i in 0..WIDTH {
            state[i] = &state[i] + &self.round_constants[round_ctr + i];
        }

        for elem in state.iter_mut() {
            *elem = sbox(elem);
        }

        self.mds_multiply(state);
        Ok(())
    }

    fn partial_round(
        &self,
        state: &mut [FpVar<Fr>],
        round_ctr: usize,
    ) -> Result<(), SynthesisError> {
        for i in 0..WIDTH {
            state[i] = &state[i] + &self.round_constants[round_ctr + i];
        }

        state[0] = sbox(&state[0]);

        self.mds_multiply(state);
        Ok(())
    }

    fn mds_multiply(&self, state: &mut [FpVar<Fr>]) {
        let mut new_state = Vec::with_capacity(WIDTH);

        for i in 0..WIDTH {
            let mut sum = FpVar::zero();
            for j in 0..WIDTH {
                sum += &self.mds_matrix[i][j] * &state[j];
            }
            new_state.push(sum);
        }

        for (i, val) in new_state.into_iter().enumerate() {
            state[i] = val;
        }
    }
}

/// S-box: x^5
fn sbox(x: &FpVar<Fr>) -> FpVar<Fr> {
    let x2 = x * x;
    let x4 = &x2 * &x2;
    &x4 * x
}
