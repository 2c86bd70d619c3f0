//! Error types for the protocol engine.
//!
//! Drivers abort and surface these unchanged; the orchestrator halts the
//! current phase on the first failure. A failed ledger append leaves the
//! ledger pointwise unchanged, and only I/O errors are sensibly retryable.

use thiserror::Error;

/// Top-level protocol error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The supplied secret key does not own the note being spent.
    #[error("secret key does not match note owner")]
    InvalidOwnership,

    /// The ledger already contains one of the serial numbers being appended.
    #[error("double-spend detected: serial number already in ledger")]
    DoubleSpend,

    /// The ledger already contains one of the commitments being appended.
    #[error("commitment already in ledger")]
    DuplicateCommitment,

    /// A Groth16 proof failed verification.
    #[error("proof verification failed")]
    InvalidProof,

    /// Witness assembly found inconsistent data.
    #[error("witness assembly failed: {0}")]
    Witness(String),

    /// The auctioneer's public point is required but absent.
    #[error("auctioneer public key is not available")]
    MissingCounterparty,

    /// Proving-layer failure, surfaced unchanged.
    #[error(transparent)]
    Proof(#[from] ProofError),

    /// Primitive-layer failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Persistence failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed persisted state.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias used throughout the crate.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors from the Groth16 proving layer.
#[derive(Error, Debug)]
pub enum ProofError {
    #[error("proof generation failed: {0}")]
    GenerationFailed(String),

    #[error("proof generation cancelled")]
    Cancelled,

    #[error("proof verification errored: {0}")]
    VerificationError(String),

    #[error("setup failed: {0}")]
    SetupFailed(String),

    #[error("invalid proving key")]
    InvalidProvingKey,

    #[error("invalid verifying key")]
    InvalidVerifyingKey,

    #[error("proof serialization failed: {0}")]
    SerializationError(String),
}

/// Errors from cryptographic encodings and primitives.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("invalid field element: {0}")]
    InvalidFieldElement(String),

    #[error("point is not on the curve or not in the prime-order subgroup")]
    PointNotOnCurve,

    #[error("value does not fit the expected integer range")]
    ValueOutOfRange,

    #[error("invalid ciphertext length: expected {expected}, got {got}")]
    InvalidCiphertextLength { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_their_taxonomy() {
        assert_eq!(
            ProtocolError::InvalidOwnership.to_string(),
            "secret key does not match note owner"
        );
        assert!(ProtocolError::DoubleSpend.to_string().contains("double-spend"));
        assert_eq!(
            ProtocolError::from(ProofError::Cancelled).to_string(),
            "proof generation cancelled"
        );
    }
}
