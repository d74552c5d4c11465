//! Compute-unit process entry point.
//!
//! This module runs when `primes-api worker` is invoked by the dispatcher.
//! It answers exactly one request and exits.

use super::ipc::{PipeFd, UnitChannel};
use super::protocol::{WorkRequest, WorkResponse};
use crate::error::Result;
use crate::sieve;

/// Exit status after a delivered result.
const EXIT_OK: i32 = 0;
/// Exit status after the unit raised an error.
const EXIT_FAILED: i32 = 1;

/// Run the sieve for one request and build the response.
fn handle_compute(limit: u64) -> WorkResponse {
    match sieve::timed_sieve(limit) {
        Ok(result) => {
            tracing::debug!(
                limit,
                count = result.primes.len(),
                duration_ms = result.duration_ms,
                "Sieve finished"
            );
            WorkResponse::from(result)
        }
        Err(e) => {
            tracing::error!(limit, error = %e, "Sieve failed");
            WorkResponse::error(e.to_string())
        }
    }
}

/// Serve a single request over `channel`, returning the process exit status.
fn serve_one(channel: &mut UnitChannel) -> Result<i32> {
    let response = match channel.recv_request() {
        Ok(Some(WorkRequest::Compute { limit })) => handle_compute(limit),
        Ok(None) => {
            // Dispatcher went away before sending anything.
            tracing::debug!("No request received, exiting");
            return Ok(EXIT_OK);
        }
        Err(e) => WorkResponse::error(e.to_string()),
    };

    let status = match response {
        WorkResponse::Result { .. } => EXIT_OK,
        WorkResponse::Error { .. } => EXIT_FAILED,
    };
    channel.send_response(&response)?;
    Ok(status)
}

/// Run the worker process main function.
///
/// Never returns: the process exits with 0 after a result and 1 after an error.
pub fn run_worker_main() -> ! {
    // Pipe errors are reported through io::Error instead of killing us.
    unsafe {
        nix::sys::signal::signal(
            nix::sys::signal::Signal::SIGPIPE,
            nix::sys::signal::SigHandler::SigIgn,
        )
        .ok();
    }

    // Safety: descriptors 0 and 1 are the pipes set up by the dispatcher and
    // nothing else in this process uses them.
    let stdin_fd = unsafe { PipeFd::from_raw(0) };
    let stdout_fd = unsafe { PipeFd::from_raw(1) };
    let mut channel = UnitChannel::new(stdin_fd, stdout_fd);

    match serve_one(&mut channel) {
        Ok(status) => std::process::exit(status),
        Err(e) => {
            tracing::error!(error = %e, "Worker failed to report");
            std::process::exit(EXIT_FAILED);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn pipe() -> (PipeFd, PipeFd) {
        let (r, w) = nix::unistd::pipe().expect("Failed to create pipe");
        (PipeFd::new(r), PipeFd::new(w))
    }

    fn run(input: &[u8]) -> (i32, String) {
        let (req_read, mut req_write) = pipe();
        let (mut resp_read, resp_write) = pipe();

        req_write.write_all(input).unwrap();
        drop(req_write);

        let mut channel = UnitChannel::new(req_read, resp_write);
        let status = serve_one(&mut channel).unwrap();
        drop(channel);

        let mut output = String::new();
        resp_read.read_to_string(&mut output).unwrap();
        (status, output)
    }

    #[test]
    fn test_compute_request_yields_result() {
        let (status, output) = run(WorkRequest::compute(10).to_line().unwrap().as_bytes());
        assert_eq!(status, EXIT_OK);
        match WorkResponse::from_line(&output).unwrap() {
            WorkResponse::Result { primes, duration_ms } => {
                assert_eq!(primes, vec![2, 3, 5, 7]);
                assert!(duration_ms >= 0.0);
            }
            other => panic!("Expected Result, got {:?}", other),
        }
    }

    #[test]
    fn test_unallocatable_limit_yields_error() {
        let line = format!("{{\"type\":\"compute\",\"limit\":{}}}\n", u64::MAX);
        let (status, output) = run(line.as_bytes());
        assert_eq!(status, EXIT_FAILED);
        assert!(matches!(
            WorkResponse::from_line(&output).unwrap(),
            WorkResponse::Error { .. }
        ));
    }

    #[test]
    fn test_malformed_request_yields_error() {
        let (status, output) = run(b"hello\n");
        assert_eq!(status, EXIT_FAILED);
        match WorkResponse::from_line(&output).unwrap() {
            WorkResponse::Error { message } => assert!(message.contains("Invalid request")),
            other => panic!("Expected Error, got {:?}", other),
        }
    }

    #[test]
    fn test_eof_without_request_exits_cleanly() {
        let (status, output) = run(b"");
        assert_eq!(status, EXIT_OK);
        assert!(output.is_empty());
    }
}
