//! The compute-unit seam: what a spawned unit reports back and how it is spawned.

use std::fmt;
use std::process::ExitStatus;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::Result;
use crate::sieve::ComputationResult;

/// Log-correlation identity of one compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

/// Validated input for one compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputationRequest {
    limit: u64,
}

impl ComputationRequest {
    /// Smallest accepted limit.
    pub const MIN_LIMIT: i64 = 2;

    /// Validate a caller-supplied limit. Returns `None` for anything below 2.
    pub fn new(limit: i64) -> Option<Self> {
        if limit < Self::MIN_LIMIT {
            return None;
        }
        u64::try_from(limit).ok().map(|limit| Self { limit })
    }

    /// The inclusive upper bound.
    pub fn limit(&self) -> u64 {
        self.limit
    }
}

/// How a compute unit terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitExit {
    /// Exit code, when the unit exited on its own.
    pub code: Option<i32>,
    /// Terminating signal, when the unit was killed.
    pub signal: Option<i32>,
}

impl UnitExit {
    /// Exit with status code `code`.
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Termination by `signal`.
    pub fn signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// Whether this is a normal exit (status 0).
    pub fn success(&self) -> bool {
        self.code == Some(0) && self.signal.is_none()
    }
}

impl From<ExitStatus> for UnitExit {
    fn from(status: ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }
}

impl fmt::Display for UnitExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(sig)) => match nix::sys::signal::Signal::try_from(sig) {
                Ok(signal) => write!(f, "signal {} ({})", sig, signal.as_str()),
                Err(_) => write!(f, "signal {}", sig),
            },
            (None, None) => write!(f, "unknown status"),
        }
    }
}

/// Lifecycle event emitted by a compute unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitEvent {
    /// The unit delivered its result.
    Message(ComputationResult),
    /// The unit raised an error while running.
    Error(String),
    /// The unit's execution context ended.
    Exit(UnitExit),
}

/// Dispatcher-side handle to a running compute unit.
///
/// Dropping the handle lets the unit run to completion; its events are discarded.
pub struct UnitHandle {
    id: UnitId,
    events: mpsc::UnboundedReceiver<UnitEvent>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl UnitHandle {
    /// Wrap an event stream. `shutdown`, when present, asks the unit to stop.
    pub fn new(
        id: UnitId,
        events: mpsc::UnboundedReceiver<UnitEvent>,
        shutdown: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self {
            id,
            events,
            shutdown,
        }
    }

    /// The unit's identity.
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Wait for the next lifecycle event. `None` once the unit is gone.
    pub async fn next_event(&mut self) -> Option<UnitEvent> {
        self.events.recv().await
    }

    /// Ask the unit to wind down. Later calls are no-ops.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Creates isolated compute units.
///
/// Implementations must not share mutable state between the units they spawn.
pub trait UnitSpawner: Send + Sync + 'static {
    /// Short backend name used in logs and the health endpoint.
    fn name(&self) -> &'static str;

    /// Start a unit computing `request`. Must not block the caller.
    fn spawn(&self, id: UnitId, request: ComputationRequest) -> Result<UnitHandle>;
}
