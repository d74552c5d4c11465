//! Sieve of Eratosthenes.
//!
//! This is the payload every compute unit runs. The flag table is allocated
//! with `try_reserve_exact` so an impossible limit surfaces as an error
//! instead of aborting the process.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{PrimesError, Result};

/// Primes found by one compute unit plus the time the sieve itself took.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationResult {
    /// All primes `p` with `2 <= p <= limit`, ascending.
    pub primes: Vec<u64>,
    /// Wall-clock duration of the sieve in milliseconds.
    pub duration_ms: f64,
}

/// Compute all primes up to and including `limit`.
///
/// Runs in O(limit · log log limit) time and O(limit) space. Limits below 2
/// yield an empty list.
///
/// # Errors
///
/// Returns [`PrimesError::Allocation`] when the flag table for `limit` cannot
/// be allocated.
///
/// # Examples
///
/// ```
/// use primes_api::sieve::primes_up_to;
///
/// assert_eq!(primes_up_to(10).unwrap(), vec![2, 3, 5, 7]);
/// assert!(primes_up_to(1).unwrap().is_empty());
/// ```
pub fn primes_up_to(limit: u64) -> Result<Vec<u64>> {
    if limit < 2 {
        return Ok(Vec::new());
    }

    let size = usize::try_from(limit)
        .ok()
        .and_then(|n| n.checked_add(1))
        .ok_or_else(|| PrimesError::Allocation {
            limit,
            reason: "limit exceeds the addressable range".to_string(),
        })?;

    let mut is_prime: Vec<bool> = Vec::new();
    is_prime
        .try_reserve_exact(size)
        .map_err(|e| PrimesError::Allocation {
            limit,
            reason: e.to_string(),
        })?;
    is_prime.resize(size, true);
    is_prime[0] = false;
    is_prime[1] = false;

    let mut p = 2usize;
    while p.saturating_mul(p) < size {
        if is_prime[p] {
            for multiple in (p * p..size).step_by(p) {
                is_prime[multiple] = false;
            }
        }
        p += 1;
    }

    Ok(is_prime
        .iter()
        .enumerate()
        .filter_map(|(n, &prime)| prime.then_some(n as u64))
        .collect())
}

/// Run the sieve and measure how long it took.
///
/// Timing covers only the sieve; serialization on either side of the unit
/// boundary is excluded.
pub fn timed_sieve(limit: u64) -> Result<ComputationResult> {
    let start = Instant::now();
    let primes = primes_up_to(limit)?;
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    Ok(ComputationResult {
        primes,
        duration_ms,
    })
}
