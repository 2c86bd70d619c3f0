//! One-time-pad encryption over the circuit field.
//!
//! Masks come from a Poseidon chain seeded by a curve point:
//! `m_0 = H(K.x, K.y)`, `m_{i+1} = H(m_i)`; encryption adds the mask to each
//! plaintext element, decryption subtracts it. The circuits recompute the
//! exact same chain, so mask derivation here and in
//! `circuit::gadgets::otp` must stay in lockstep.
//!
//! Three payload shapes share the primitive:
//! - 6 elements: a full note `(pk, coins, energy, rho, r, cm)` published
//!   with a transfer so the recipient can recognise it;
//! - 5 elements: the registration payload `(pk_out, sk_in, bid, coins,
//!   energy)` sealed for the auctioneer;
//! - 3 elements: the withdraw payload `(bid, sk_in, pk_out)` keyed by the
//!   auctioneer's long-term point.

use ark_bls12_377::G1Affine;
use ark_bw6_761::Fr;

use super::poseidon::{poseidon_hash, poseidon_hash2};
use crate::note::Note;

/// Number of field elements in a published note ciphertext.
pub const NOTE_CIPHERTEXT_LEN: usize = 6;

/// Number of field elements in a registration ciphertext.
pub const REGISTRATION_CIPHERTEXT_LEN: usize = 5;

/// Number of field elements in a withdraw ciphertext.
pub const WITHDRAW_CIPHERTEXT_LEN: usize = 3;

/// Derive the OTP mask chain from a key point.
pub fn mask_chain(key: &G1Affine, len: usize) -> Vec<Fr> {
    let mut masks = Vec::with_capacity(len);
    if len == 0 {
        return masks;
    }
    masks.push(poseidon_hash2(&key.x, &key.y));
    for i in 1..len {
        let next = poseidon_hash(&[masks[i - 1]]);
        masks.push(next);
    }
    masks
}

/// Encrypt a plaintext vector under a key point, `c_i = p_i + m_i`.
pub fn otp_encrypt(key: &G1Affine, plaintext: &[Fr]) -> Vec<Fr> {
    mask_chain(key, plaintext.len())
        .into_iter()
        .zip(plaintext)
        .map(|(mask, p)| *p + mask)
        .collect()
}

/// Decrypt a ciphertext vector under a key point, `p_i = c_i - m_i`.
pub fn otp_decrypt(key: &G1Affine, ciphertext: &[Fr]) -> Vec<Fr> {
    mask_chain(key, ciphertext.len())
        .into_iter()
        .zip(ciphertext)
        .map(|(mask, c)| *c - mask)
        .collect()
}

/// Encrypt a full note for a shared-key holder.
pub fn encrypt_note(note: &Note, key: &G1Affine) -> [Fr; NOTE_CIPHERTEXT_LEN] {
    let plaintext = [
        note.pk,
        note.coins,
        note.energy,
        note.rho,
        note.r,
        note.cm,
    ];
    let cipher = otp_encrypt(key, &plaintext);
    [
        cipher[0], cipher[1], cipher[2], cipher[3], cipher[4], cipher[5],
    ]
}

/// Decrypt a published note ciphertext.
pub fn decrypt_note(cipher: &[Fr; NOTE_CIPHERTEXT_LEN], key: &G1Affine) -> Note {
    let fields = otp_decrypt(key, cipher);
    Note {
        pk: fields[0],
        coins: fields[1],
        energy: fields[2],
        rho: fields[3],
        r: fields[4],
        cm: fields[5],
    }
}

/// Decrypt a note ciphertext and accept it only if it belongs to `my_pk`
/// and its commitment opens. Recipients use this to scan the ledger.
pub fn recognize_note(
    cipher: &[Fr; NOTE_CIPHERTEXT_LEN],
    key: &G1Affine,
    my_pk: &Fr,
) -> Option<Note> {
    let note = decrypt_note(cipher, key);
    if note.pk != *my_pk || !note.opens() {
        return None;
    }
    Some(note)
}

/// Seal a registration payload `(pk_out, sk_in, bid, coins, energy)`.
pub fn encrypt_registration(
    key: &G1Affine,
    pk_out: &Fr,
    sk_in: &Fr,
    bid: &Fr,
    coins: &Fr,
    energy: &Fr,
) -> [Fr; REGISTRATION_CIPHERTEXT_LEN] {
    let cipher = otp_encrypt(key, &[*pk_out, *sk_in, *bid, *coins, *energy]);
    [cipher[0], cipher[1], cipher[2], cipher[3], cipher[4]]
}

/// A decrypted registration payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationPlaintext {
    pub pk_out: Fr,
    pub sk_in: Fr,
    pub bid: Fr,
    pub coins: Fr,
    pub energy: Fr,
}

/// Open a registration ciphertext with the shared key.
pub fn decrypt_registration(
    key: &G1Affine,
    cipher: &[Fr; REGISTRATION_CIPHERTEXT_LEN],
) -> RegistrationPlaintext {
    let fields = otp_decrypt(key, cipher);
    RegistrationPlaintext {
        pk_out: fields[0],
        sk_in: fields[1],
        bid: fields[2],
        coins: fields[3],
        energy: fields[4],
    }
}

/// Seal a withdraw payload `(bid, sk_in, pk_out)` under the auctioneer's
/// long-term public point. No ephemeral scalar is involved: the withdraw
/// path only has to identify the withdrawing registration, and the ledger
/// already makes that public.
pub fn encrypt_withdraw(
    auctioneer_pk: &G1Affine,
    bid: &Fr,
    sk_in: &Fr,
    pk_out: &Fr,
) -> [Fr; WITHDRAW_CIPHERTEXT_LEN] {
    let cipher = otp_encrypt(auctioneer_pk, &[*bid, *sk_in, *pk_out]);
    [cipher[0], cipher[1], cipher[2]]
}

/// Open a withdraw ciphertext.
pub fn decrypt_withdraw(
    auctioneer_pk: &G1Affine,
    cipher: &[Fr; WITHDRAW_CIPHERTEXT_LEN],
) -> (Fr, Fr, Fr) {
    let fields = otp_decrypt(auctioneer_pk, cipher);
    (fields[0], fields[1], fields[2])
}
