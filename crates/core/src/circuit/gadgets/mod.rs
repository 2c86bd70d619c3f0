//! R1CS gadgets shared by the four protocol circuits.

pub mod curve;
pub mod otp;
pub mod poseidon;

pub use curve::{bound_point, scalar_mul, witness_point, PointCoords};
pub use poseidon::PoseidonGadget;
