//! IPC protocol between the dispatcher and a compute-unit process.
//!
//! Messages are JSON-serialized and newline-delimited.

use serde::{Deserialize, Serialize};

use crate::sieve::ComputationResult;

/// Request from dispatcher to worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkRequest {
    /// Compute all primes up to `limit`.
    #[serde(rename = "compute")]
    Compute {
        /// Inclusive upper bound.
        limit: u64,
    },
}

/// Response from worker to dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkResponse {
    /// Successful sieve result.
    #[serde(rename = "result")]
    Result {
        /// Ascending primes up to the requested limit
        primes: Vec<u64>,
        /// Sieve duration in milliseconds
        duration_ms: f64,
    },

    /// The unit raised an error while computing.
    #[serde(rename = "error")]
    Error {
        /// Error message
        message: String,
    },
}

impl WorkRequest {
    /// Create a compute request.
    pub fn compute(limit: u64) -> Self {
        Self::Compute { limit }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Deserialize from JSON line.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

impl WorkResponse {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Deserialize from JSON line.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

impl From<ComputationResult> for WorkResponse {
    fn from(result: ComputationResult) -> Self {
        Self::Result {
            primes: result.primes,
            duration_ms: result.duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_request_wire_format() {
        let line = WorkRequest::compute(10).to_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.trim_end(), r#"{"type":"compute","limit":10}"#);
        assert_eq!(WorkRequest::from_line(&line).unwrap(), WorkRequest::compute(10));
    }

    #[test]
    fn test_result_response_wire_format() {
        let resp = WorkResponse::from(ComputationResult {
            primes: vec![2, 3, 5, 7],
            duration_ms: 0.25,
        });
        let line = resp.to_line().unwrap();
        assert!(line.contains(r#""type":"result""#));
        assert!(line.contains(r#""primes":[2,3,5,7]"#));

        match WorkResponse::from_line(&line).unwrap() {
            WorkResponse::Result { primes, duration_ms } => {
                assert_eq!(primes, vec![2, 3, 5, 7]);
                assert_eq!(duration_ms, 0.25);
            }
            other => panic!("Expected Result variant, got {:?}", other),
        }
    }

    #[test]
    fn test_error_response_parses_from_foreign_writer() {
        // Hand-written line as a shell script would emit it.
        let parsed = WorkResponse::from_line("{\"type\":\"error\",\"message\":\"boom\"}\r\n").unwrap();
        assert_eq!(parsed, WorkResponse::error("boom"));
    }

    #[test]
    fn test_unknown_response_type_is_rejected() {
        assert!(WorkResponse::from_line(r#"{"type":"ready"}"#).is_err());
        assert!(WorkResponse::from_line("not json").is_err());
    }
}
