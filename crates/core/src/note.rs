//! Confidential notes.
//!
//! A note is the atomic unit of value: a pair of fungible quantities
//! (coins, energy) bound to an owner key image and two pieces of
//! randomness, identified publicly by its commitment. Spending reveals the
//! serial number `H(sk, rho)` and nothing else.

use ark_bw6_761::Fr;
use ark_ff::UniformRand;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::crypto::{key_image, note_commitment, serial_number};
use crate::encoding;

/// A confidential note and its full opening.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Committed coin quantity.
    #[serde(with = "encoding::field")]
    pub coins: Fr,
    /// Committed energy quantity.
    #[serde(with = "encoding::field")]
    pub energy: Fr,
    /// Owner key image, `H(sk)`.
    #[serde(with = "encoding::field")]
    pub pk: Fr,
    /// Uniqueness randomness; the serial number is `H(sk, rho)`.
    #[serde(with = "encoding::field")]
    pub rho: Fr,
    /// Hiding randomness.
    #[serde(with = "encoding::field")]
    pub r: Fr,
    /// Commitment, `H(coins, energy, pk, rho, r)`.
    #[serde(with = "encoding::field")]
    pub cm: Fr,
}

impl Note {
    /// Mint a fresh note for the holder of `sk` with random `rho` and `r`.
    pub fn mint<R: RngCore + CryptoRng>(coins: Fr, energy: Fr, sk: &Fr, rng: &mut R) -> Self {
        let rho = Fr::rand(rng);
        let r = Fr::rand(rng);
        Self::from_opening(coins, energy, key_image(sk), rho, r)
    }

    /// Build a note from an explicit opening, computing its commitment.
    pub fn from_opening(coins: Fr, energy: Fr, pk: Fr, rho: Fr, r: Fr) -> Self {
        let cm = note_commitment(&coins, &energy, &pk, &rho, &r);
        Self {
            coins,
            energy,
            pk,
            rho,
            r,
            cm,
        }
    }

    /// Whether the stored commitment matches the stored opening.
    pub fn opens(&self) -> bool {
        self.cm == note_commitment(&self.coins, &self.energy, &self.pk, &self.rho, &self.r)
    }

    /// The serial number this note reveals when spent with `sk`.
    pub fn serial(&self, sk: &Fr) -> Fr {
        serial_number(sk, &self.rho)
    }

    /// Whether `sk` is the spending secret of this note.
    pub fn is_owned_by(&self, sk: &Fr) -> bool {
        key_image(sk) == self.pk
    }
}
