//! Inner-curve point gadgets.
//!
//! The constraint field equals the inner curve's base field, so a point is
//! two circuit field elements. Points that appear in a statement are
//! published as `(x, y)` coordinate pairs: the circuit allocates the affine
//! coordinates as public inputs, allocates the point itself as a witness
//! through the curve gadget, and binds the two. Derived points (scalar
//! multiples) are computed in-circuit and compared against their public
//! coordinates.

use ark_bls12_377::constraints::G1Var;
use ark_bls12_377::{G1Affine, G1Projective};
use ark_bw6_761::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

/// Public affine coordinates of a statement point.
#[derive(Clone)]
pub struct PointCoords {
    pub x: FpVar<Fr>,
    pub y: FpVar<Fr>,
}

impl PointCoords {
    /// Allocate the coordinates of `point` as public inputs.
    pub fn new_input(
        cs: ConstraintSystemRef<Fr>,
        point: &Option<G1Affine>,
    ) -> Result<Self, SynthesisError> {
        let x = FpVar::new_input(cs.clone(), || {
            point.map(|p| p.x).ok_or(SynthesisError::AssignmentMissing)
        })?;
        let y = FpVar::new_input(cs, || {
            point.map(|p| p.y).ok_or(SynthesisError::AssignmentMissing)
        })?;
        Ok(Self { x, y })
    }

    /// Enforce that `point` normalises to these coordinates.
    pub fn enforce_matches(&self, point: &G1Var) -> Result<(), SynthesisError> {
        let affine = point.to_affine()?;
        affine.x.enforce_equal(&self.x)?;
        affine.y.enforce_equal(&self.y)
    }
}

/// Allocate a point as a witness through the curve gadget.
pub fn witness_point(
    cs: ConstraintSystemRef<Fr>,
    point: &Option<G1Affine>,
) -> Result<G1Var, SynthesisError> {
    G1Var::new_witness(cs, || {
        point
            .map(G1Projective::from)
            .ok_or(SynthesisError::AssignmentMissing)
    })
}

/// Allocate a witness point and bind it to its public coordinates.
pub fn bound_point(
    cs: ConstraintSystemRef<Fr>,
    point: &Option<G1Affine>,
    coords: &PointCoords,
) -> Result<G1Var, SynthesisError> {
    let var = witness_point(cs, point)?;
    coords.enforce_matches(&var)?;
    Ok(var)
}

/// Multiply a point by a scalar given as a field element witness.
pub fn scalar_mul(base: &G1Var, scalar: &FpVar<Fr>) -> Result<G1Var, SynthesisError> {
    let bits = scalar.to_bits_le()?;
    base.scalar_mul_le(bits.iter())
}
