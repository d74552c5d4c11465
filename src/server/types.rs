//! API request and response types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::sieve::ComputationResult;
use crate::worker::Isolation;

/// Largest count returned as a full array.
pub const MAX_DISPLAY_PRIMES: usize = 100;

/// How many primes are shown in a truncated list.
pub const TRUNCATED_PREFIX_LEN: usize = 10;

/// Note attached to truncated responses.
pub const TRUNCATION_MESSAGE: &str = "List truncated for display. Full count provided.";

/// Primes as displayed: the full list, or a short textual preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum PrimeList {
    /// Every prime up to the limit.
    Full(Vec<u64>),
    /// The first few primes followed by `...`.
    Truncated(String),
}

impl PrimeList {
    /// Shape `primes` for display.
    ///
    /// Lists of at most [`MAX_DISPLAY_PRIMES`] are returned whole; longer ones
    /// become e.g. `"2,3,5,7,11,13,17,19,23,29..."`.
    pub fn for_display(primes: Vec<u64>) -> Self {
        if primes.len() <= MAX_DISPLAY_PRIMES {
            return Self::Full(primes);
        }
        let prefix: Vec<String> = primes
            .iter()
            .take(TRUNCATED_PREFIX_LEN)
            .map(u64::to_string)
            .collect();
        Self::Truncated(format!("{}...", prefix.join(",")))
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated(_))
    }
}

/// Successful prime computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PrimesResponse {
    /// The requested upper bound.
    pub limit: u64,
    /// Number of primes up to `limit`, always exact.
    pub count: usize,
    /// The primes, or a truncated preview when there are more than 100.
    pub primes: PrimeList,
    /// Sieve duration in milliseconds, rounded to three decimals.
    pub duration_ms: f64,
    /// Present when `primes` was truncated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PrimesResponse {
    /// Build the response body for a computed result.
    pub fn from_result(limit: u64, result: ComputationResult) -> Self {
        let count = result.primes.len();
        let primes = PrimeList::for_display(result.primes);
        let message = primes
            .is_truncated()
            .then(|| TRUNCATION_MESSAGE.to_string());

        Self {
            limit,
            count,
            primes,
            duration_ms: round_millis(result.duration_ms),
            message,
        }
    }
}

/// Round to three decimal places.
fn round_millis(ms: f64) -> f64 {
    (ms * 1000.0).round() / 1000.0
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Compute unit isolation mode.
    pub isolation: Isolation,
    /// Advisory worker capacity (not enforced).
    pub worker_capacity: usize,
}
