//! Cryptographic primitives: the Poseidon sponge, commitments, serial
//! numbers, Diffie-Hellman key agreement and one-time-pad encryption.

pub mod commitment;
pub mod encryption;
pub mod keys;
pub mod poseidon;
pub mod poseidon_constants;
pub mod serial;

pub use commitment::note_commitment;
pub use encryption::{
    decrypt_note, decrypt_registration, decrypt_withdraw, encrypt_note, encrypt_registration,
    encrypt_withdraw, mask_chain, otp_decrypt, otp_encrypt, recognize_note,
    RegistrationPlaintext, NOTE_CIPHERTEXT_LEN, REGISTRATION_CIPHERTEXT_LEN,
    WITHDRAW_CIPHERTEXT_LEN,
};
pub use keys::{generator, mul_generator, mul_point, scalar_to_field, DhKeypair};
pub use poseidon::{poseidon_hash, poseidon_hash2, Poseidon};
pub use serial::{exchange_output_rho, key_image, serial_number, transfer_output_rho};
