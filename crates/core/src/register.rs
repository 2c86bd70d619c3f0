//! Registration: bind a bid to an encrypted fund commitment.
//!
//! The participant moves its base note to a fresh key image `pk_in`
//! through an inner transfer, seals `(pk_out, sk_in, bid, coins, energy)`
//! for the auctioneer under the shared key `[R] pk_T`, and proves the
//! registration circuit. The payload handed to the auctioneer carries the
//! ciphertext, the ephemeral public point `[R] G` (its half of the key
//! agreement), and the registered note sealed under the same shared key.

use ark_bls12_377::{Fr as DhScalar, G1Affine};
use ark_bw6_761::Fr;
use ark_ff::UniformRand;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::circuit::RegisterCircuit;
use crate::crypto::encryption::{
    decrypt_note, decrypt_registration, encrypt_note, encrypt_registration,
    RegistrationPlaintext, NOTE_CIPHERTEXT_LEN, REGISTRATION_CIPHERTEXT_LEN,
};
use crate::crypto::keys::{generator, mul_generator, mul_point, scalar_to_field, DhKeypair};
use crate::crypto::key_image;
use crate::encoding;
use crate::error::{ProtocolError, ProtocolResult};
use crate::note::Note;
use crate::proof::{CancelToken, ProofSystem};
use crate::transfer::{create_transfer, TransferRecord};

/// Public record of a registration proof.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistrationRecord {
    #[serde(with = "encoding::field")]
    pub cm_in: Fr,
    #[serde(with = "encoding::field_array")]
    pub c_aux: [Fr; REGISTRATION_CIPHERTEXT_LEN],
    #[serde(with = "encoding::point")]
    pub g: G1Affine,
    #[serde(with = "encoding::point")]
    pub pk_t: G1Affine,
    #[serde(with = "encoding::point")]
    pub g_r: G1Affine,
    #[serde(with = "encoding::hex_bytes")]
    pub proof: Vec<u8>,
}

impl RegistrationRecord {
    /// Public inputs in the circuit's allocation order.
    pub fn public_inputs(&self) -> Vec<Fr> {
        let mut inputs = vec![self.cm_in];
        inputs.extend_from_slice(&self.c_aux);
        for p in [&self.g, &self.pk_t, &self.g_r] {
            inputs.push(p.x);
            inputs.push(p.y);
        }
        inputs
    }
}

/// What the auctioneer receives from one registration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistrationPayload {
    #[serde(with = "encoding::field_array")]
    pub c_aux: [Fr; REGISTRATION_CIPHERTEXT_LEN],
    /// The participant's half of the key agreement, `[R] G`.
    #[serde(with = "encoding::point")]
    pub pk_dh: G1Affine,
    /// The registered note, sealed under the shared key.
    #[serde(with = "encoding::field_array")]
    pub note_cipher: [Fr; NOTE_CIPHERTEXT_LEN],
}

/// Secrets the registering wallet must retain to claim or withdraw.
#[derive(Clone, Debug)]
pub struct RegistrationSecrets {
    pub sk_in: Fr,
    pub pk_in: Fr,
    pub sk_out: Fr,
    pub pk_out: Fr,
    /// Ephemeral DH scalar R of this registration.
    pub r_enc: DhScalar,
    pub bid: Fr,
}

/// Everything a registration produces.
#[derive(Clone, Debug)]
pub struct Registration {
    pub record: RegistrationRecord,
    pub tx_in: TransferRecord,
    pub payload: RegistrationPayload,
    pub secrets: RegistrationSecrets,
}

/// Run the registration for one participant.
#[allow(clippy::too_many_arguments)]
pub fn register<R: RngCore + CryptoRng>(
    base_note: &Note,
    sk_base: &Fr,
    bid: Fr,
    auctioneer_pk: Option<&G1Affine>,
    transfer_system: &ProofSystem<crate::circuit::TransferCircuit>,
    register_system: &ProofSystem<RegisterCircuit>,
    cancel: &CancelToken,
    rng: &mut R,
) -> ProtocolResult<Registration> {
    let pk_t = auctioneer_pk.ok_or(ProtocolError::MissingCounterparty)?;

    // Fresh spending secrets for the auction input and output notes.
    let sk_in = Fr::rand(rng);
    let pk_in = key_image(&sk_in);
    let sk_out = Fr::rand(rng);
    let pk_out = key_image(&sk_out);

    // Ephemeral key agreement with the auctioneer. The same point doubles
    // as the recipient key of the inner transfer, so the participant can
    // later recognise its own registered note from the ledger.
    let r_enc = DhScalar::rand(rng);
    let g_r = mul_generator(&r_enc);
    let shared = mul_point(pk_t, &r_enc);

    // Inner transfer of the base note's full value to pk_in.
    let tx_in = create_transfer(
        base_note,
        sk_base,
        &pk_in,
        base_note.coins,
        base_note.energy,
        &g_r,
        transfer_system,
        cancel,
        rng,
    )?;
    let note_in = tx_in.new_note.clone();

    let c_aux = encrypt_registration(
        &shared,
        &pk_out,
        &sk_in,
        &bid,
        &note_in.coins,
        &note_in.energy,
    );
    let note_cipher = encrypt_note(&note_in, &shared);

    let circuit = RegisterCircuit {
        cm_in: Some(note_in.cm),
        c_aux: c_aux.map(Some),
        g: Some(generator()),
        pk_t: Some(*pk_t),
        g_r: Some(g_r),
        coins: Some(note_in.coins),
        energy: Some(note_in.energy),
        bid: Some(bid),
        rho_in: Some(note_in.rho),
        rand_in: Some(note_in.r),
        sk_in: Some(sk_in),
        pk_in: Some(pk_in),
        pk_out: Some(pk_out),
        r: Some(scalar_to_field(&r_enc)),
    };
    let proof = register_system.prove(circuit, cancel)?;
    debug!(cm = %encoding::field_to_string(&note_in.cm), "registration proved");

    Ok(Registration {
        record: RegistrationRecord {
            cm_in: note_in.cm,
            c_aux,
            g: generator(),
            pk_t: *pk_t,
            g_r,
            proof,
        },
        tx_in,
        payload: RegistrationPayload {
            c_aux,
            pk_dh: g_r,
            note_cipher,
        },
        secrets: RegistrationSecrets {
            sk_in,
            pk_in,
            sk_out,
            pk_out,
            r_enc,
            bid,
        },
    })
}

/// Verify a registration record's proof.
pub fn verify_registration(
    record: &RegistrationRecord,
    system: &ProofSystem<RegisterCircuit>,
) -> ProtocolResult<()> {
    if system.verify(&record.proof, &record.public_inputs())? {
        Ok(())
    } else {
        Err(ProtocolError::InvalidProof)
    }
}

/// Auctioneer side: open one payload with the long-term DH secret.
///
/// Returns the sealed bid data and the registered note, after checking that
/// the two agree with each other.
pub fn open_registration(
    payload: &RegistrationPayload,
    auctioneer: &DhKeypair,
) -> ProtocolResult<(RegistrationPlaintext, Note)> {
    let shared = auctioneer.shared_key(&payload.pk_dh);
    let plain = decrypt_registration(&shared, &payload.c_aux);
    let note = decrypt_note(&payload.note_cipher, &shared);

    if !note.opens() {
        return Err(ProtocolError::Witness(
            "registered note ciphertext does not open".into(),
        ));
    }
    if key_image(&plain.sk_in) != note.pk {
        return Err(ProtocolError::Witness(
            "registration secret does not own the registered note".into(),
        ));
    }
    if plain.coins != note.coins || plain.energy != note.energy {
        return Err(ProtocolError::Witness(
            "registration value disagrees with the registered note".into(),
        ));
    }

    Ok((plain, note))
}
