//! Diffie-Hellman key agreement on BLS12-377 G1.
//!
//! Participants and the auctioneer each hold `(sk, pk = [sk] G)`. The shared
//! key `[sk_A] pk_B = [sk_B] pk_A` is a curve point whose affine coordinates
//! live in the circuit field, so it can seed the one-time-pad mask chain
//! both natively and inside a proof.

use ark_bls12_377::{Fr as DhScalar, G1Affine, G1Projective};
use ark_bw6_761::Fr;
use ark_ec::{AffineRepr, CurveGroup, Group};
use ark_ff::{BigInteger, PrimeField, UniformRand};
use rand::{CryptoRng, RngCore};

/// A Diffie-Hellman keypair on the inner curve.
#[derive(Clone, Debug)]
pub struct DhKeypair {
    /// Private scalar.
    pub sk: DhScalar,
    /// Public key, `[sk] G`.
    pub pk: G1Affine,
}

impl DhKeypair {
    /// Generate a fresh keypair.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let sk = DhScalar::rand(rng);
        Self::from_scalar(sk)
    }

    /// Build the keypair for a known scalar.
    pub fn from_scalar(sk: DhScalar) -> Self {
        let pk = (G1Projective::generator() * sk).into_affine();
        Self { sk, pk }
    }

    /// Compute the shared key with another party's public point.
    pub fn shared_key(&self, other: &G1Affine) -> G1Affine {
        (G1Projective::from(*other) * self.sk).into_affine()
    }
}

/// The fixed generator G of the inner curve.
pub fn generator() -> G1Affine {
    G1Affine::generator()
}

/// Multiply the generator by a scalar.
pub fn mul_generator(scalar: &DhScalar) -> G1Affine {
    (G1Projective::generator() * scalar).into_affine()
}

/// Multiply an arbitrary point by a scalar.
pub fn mul_point(point: &G1Affine, scalar: &DhScalar) -> G1Affine {
    (G1Projective::from(*point) * scalar).into_affine()
}

/// Embed a DH scalar into the circuit field.
///
/// The inner scalar field order is below the circuit field order, so the
/// integer value is preserved exactly; circuits decompose it back to bits
/// for scalar multiplication.
pub fn scalar_to_field(scalar: &DhScalar) -> Fr {
    Fr::from_be_bytes_mod_order(&scalar.into_bigint().to_bytes_be())
}
