//! Groth16 proof system plumbing.
//!
//! One `ProofSystem` per circuit family: setup (or load) the key pair,
//! prove, verify. Keys are shared read-only after setup. Proof bytes are
//! the backend's compressed canonical encoding; key files are size-prefixed
//! opaque blobs, never JSON.

use std::fs::File;
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ark_bw6_761::{Fr, BW6_761};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, ProvingKey, VerifyingKey};
use ark_relations::r1cs::ConstraintSynthesizer;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::{CircuitSpecificSetupSNARK, SNARK};
use rand::rngs::OsRng;
use tracing::info;

use crate::error::ProofError;

/// Cooperative cancellation flag for long-running proving calls.
///
/// Proving is pure compute; a cancelled driver returns before any ledger
/// mutation, so cancellation can never corrupt shared state.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of in-flight proving work.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Verify compressed proof bytes against a prepared verifying key.
pub fn verify_proof_bytes(
    pvk: &PreparedVerifyingKey<BW6_761>,
    proof_bytes: &[u8],
    public_inputs: &[Fr],
) -> Result<bool, ProofError> {
    let proof = Proof::<BW6_761>::deserialize_compressed(proof_bytes)
        .map_err(|e| ProofError::SerializationError(e.to_string()))?;
    Groth16::<BW6_761>::verify_with_processed_vk(pvk, public_inputs, &proof)
        .map_err(|e| ProofError::VerificationError(e.to_string()))
}

/// Groth16 key pair and prepared verifying key for one circuit family.
pub struct ProofSystem<C> {
    proving_key: ProvingKey<BW6_761>,
    verifying_key: VerifyingKey<BW6_761>,
    prepared_vk: PreparedVerifyingKey<BW6_761>,
    _circuit: PhantomData<C>,
}

impl<C: ConstraintSynthesizer<Fr>> ProofSystem<C> {
    /// Run the circuit-specific trusted setup on a blank circuit.
    ///
    /// The toxic waste is discarded; for production keys run a ceremony and
    /// load the result with [`ProofSystem::load`].
    pub fn setup(blank: C) -> Result<Self, ProofError> {
        let (pk, vk) = Groth16::<BW6_761>::circuit_specific_setup(blank, &mut OsRng)
            .map_err(|e| ProofError::SetupFailed(e.to_string()))?;
        Self::from_keys(pk, vk)
    }

    fn from_keys(pk: ProvingKey<BW6_761>, vk: VerifyingKey<BW6_761>) -> Result<Self, ProofError> {
        let prepared_vk = Groth16::<BW6_761>::process_vk(&vk)
            .map_err(|e| ProofError::SetupFailed(e.to_string()))?;
        Ok(Self {
            proving_key: pk,
            verifying_key: vk,
            prepared_vk,
            _circuit: PhantomData,
        })
    }

    /// Load the key pair from disk, or run setup and persist it.
    pub fn setup_or_load(blank: C, pk_path: &Path, vk_path: &Path) -> Result<Self, ProofError> {
        if pk_path.exists() && vk_path.exists() {
            return Self::load(pk_path, vk_path);
        }
        info!(pk = %pk_path.display(), "groth16 setup");
        let system = Self::setup(blank)?;
        system.save_keys(pk_path, vk_path)?;
        Ok(system)
    }

    /// Generate a proof. Checked against the cancel token immediately
    /// before and after the blocking prover call.
    pub fn prove(&self, circuit: C, cancel: &CancelToken) -> Result<Vec<u8>, ProofError> {
        if cancel.is_cancelled() {
            return Err(ProofError::Cancelled);
        }

        let proof = Groth16::<BW6_761>::prove(&self.proving_key, circuit, &mut OsRng)
            .map_err(|e| ProofError::GenerationFailed(e.to_string()))?;

        if cancel.is_cancelled() {
            return Err(ProofError::Cancelled);
        }

        let mut bytes = Vec::new();
        proof
            .serialize_compressed(&mut bytes)
            .map_err(|e| ProofError::SerializationError(e.to_string()))?;
        Ok(bytes)
    }

    /// Verify a proof against public inputs.
    pub fn verify(&self, proof_bytes: &[u8], public_inputs: &[Fr]) -> Result<bool, ProofError> {
        verify_proof_bytes(&self.prepared_vk, proof_bytes, public_inputs)
    }

    pub fn verifying_key(&self) -> &VerifyingKey<BW6_761> {
        &self.verifying_key
    }

    pub fn prepared_vk(&self) -> &PreparedVerifyingKey<BW6_761> {
        &self.prepared_vk
    }

    /// Persist the key pair as size-prefixed opaque blobs.
    pub fn save_keys(&self, pk_path: &Path, vk_path: &Path) -> Result<(), ProofError> {
        let mut pk_bytes = Vec::new();
        self.proving_key
            .serialize_compressed(&mut pk_bytes)
            .map_err(|e| ProofError::SerializationError(e.to_string()))?;
        write_sized(pk_path, &pk_bytes)
            .map_err(|e| ProofError::SerializationError(e.to_string()))?;

        let mut vk_bytes = Vec::new();
        self.verifying_key
            .serialize_compressed(&mut vk_bytes)
            .map_err(|e| ProofError::SerializationError(e.to_string()))?;
        write_sized(vk_path, &vk_bytes)
            .map_err(|e| ProofError::SerializationError(e.to_string()))?;
        Ok(())
    }

    /// Load a persisted key pair.
    pub fn load(pk_path: &Path, vk_path: &Path) -> Result<Self, ProofError> {
        let pk_bytes = read_sized(pk_path).map_err(|_| ProofError::InvalidProvingKey)?;
        let pk = ProvingKey::<BW6_761>::deserialize_compressed(&pk_bytes[..])
            .map_err(|_| ProofError::InvalidProvingKey)?;

        let vk_bytes = read_sized(vk_path).map_err(|_| ProofError::InvalidVerifyingKey)?;
        let vk = VerifyingKey::<BW6_761>::deserialize_compressed(&vk_bytes[..])
            .map_err(|_| ProofError::InvalidVerifyingKey)?;

        Self::from_keys(pk, vk)
    }
}

fn write_sized(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(&(bytes.len() as u64).to_le_bytes())?;
    file.write_all(bytes)
}

fn read_sized(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut len_bytes = [0u8; 8];
    file.read_exact(&mut len_bytes)?;
    let len = u64::from_le_bytes(len_bytes) as usize;
    let mut bytes = vec![0u8; len];
    file.read_exact(&mut bytes)?;
    Ok(bytes)
}
