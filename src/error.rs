//! Error types for primes-api.

use thiserror::Error;

/// Main error type for primes-api.
#[derive(Error, Debug)]
pub enum PrimesError {
    #[error("Failed to spawn compute unit: {0}")]
    SpawnFailed(String),

    #[error("Sieve allocation failed for limit {limit}: {reason}")]
    Allocation { limit: u64, reason: String },

    #[error("Worker protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for primes-api operations.
pub type Result<T> = std::result::Result<T, PrimesError>;
