//! Per-request dispatch of prime computations to isolated compute units.
//!
//! [`Dispatcher::submit`] validates the limit, spawns exactly one unit and
//! hands back a [`Submission`] future. A watcher task listens to the unit's
//! events and resolves the submission exactly once:
//!
//! - **Message** resolves with the result and asks the unit to shut down.
//! - **Error** resolves with [`DispatchError::ComputationRuntimeError`] and
//!   asks the unit to shut down.
//! - **Exit** with a non-normal status resolves with
//!   [`DispatchError::WorkerAbnormalExit`]. A normal exit with nothing
//!   delivered counts as abnormal too, so a request can never hang.
//!
//! Whatever comes after the first resolution is ignored.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::error::PrimesError;
use crate::sieve::ComputationResult;
use crate::worker::{ComputationRequest, UnitEvent, UnitExit, UnitHandle, UnitId, UnitSpawner};

/// Why a submission failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Invalid limit {raw}: must be an integer greater than 1")]
    InvalidInput { raw: i64 },

    #[error("Compute unit for limit {limit} raised an error: {message}")]
    ComputationRuntimeError { limit: u64, message: String },

    #[error("Compute unit for limit {limit} stopped abnormally ({exit})")]
    WorkerAbnormalExit { limit: u64, exit: AbnormalExit },

    #[error("Failed to start compute unit for limit {limit}: {message}")]
    SpawnFailed { limit: u64, message: String },
}

/// Detail of an abnormal unit termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbnormalExit {
    /// The unit exited with a failure status or was killed.
    Status(UnitExit),
    /// The unit exited normally without delivering anything.
    Silent(UnitExit),
    /// The unit's event stream ended without an exit status.
    Vanished,
}

impl std::fmt::Display for AbnormalExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(exit) => write!(f, "{}", exit),
            Self::Silent(exit) => write!(f, "{} without a result", exit),
            Self::Vanished => write!(f, "event stream closed"),
        }
    }
}

/// Terminal outcome of one submission.
pub type Outcome = Result<ComputationResult, DispatchError>;

/// Dispatcher-wide settings.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Advisory capacity hint. Spawning is not bounded by it.
    pub worker_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_capacity: crate::worker::default_worker_capacity(),
        }
    }
}

/// Spawns one isolated compute unit per submission.
pub struct Dispatcher {
    spawner: Arc<dyn UnitSpawner>,
    config: DispatcherConfig,
    next_id: AtomicU64,
}

impl Dispatcher {
    pub fn new(spawner: Arc<dyn UnitSpawner>, config: DispatcherConfig) -> Self {
        Self {
            spawner,
            config,
            next_id: AtomicU64::new(1),
        }
    }

    /// Name of the isolation backend in use.
    pub fn backend(&self) -> &'static str {
        self.spawner.name()
    }

    /// The advisory worker capacity.
    pub fn worker_capacity(&self) -> usize {
        self.config.worker_capacity
    }

    /// Submit a computation for all primes up to `limit`.
    ///
    /// Validation and unit creation happen before this returns; invalid input
    /// never creates a unit. The returned [`Submission`] resolves once the unit
    /// reports. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`DispatchError::InvalidInput`] for limits below 2 and
    /// [`DispatchError::SpawnFailed`] when the unit could not be created.
    pub fn submit(&self, limit: i64) -> Result<Submission, DispatchError> {
        let request =
            ComputationRequest::new(limit).ok_or(DispatchError::InvalidInput { raw: limit })?;
        let id = UnitId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let unit = self.spawner.spawn(id, request).map_err(|e| {
            tracing::error!(unit = %id, limit = request.limit(), error = %e, "Failed to spawn compute unit");
            DispatchError::SpawnFailed {
                limit: request.limit(),
                message: match e {
                    PrimesError::SpawnFailed(msg) => msg,
                    other => other.to_string(),
                },
            }
        })?;

        tracing::debug!(unit = %id, limit = request.limit(), backend = self.backend(), "Compute unit spawned");

        let (tx, rx) = oneshot::channel();
        tokio::spawn(watch_unit(unit, request.limit(), OutcomeSlot::new(tx)));

        Ok(Submission {
            id,
            limit: request.limit(),
            rx,
        })
    }
}

/// Pending outcome of one submitted computation.
#[must_use = "dropping a submission discards the outcome"]
pub struct Submission {
    id: UnitId,
    limit: u64,
    rx: oneshot::Receiver<Outcome>,
}

impl Submission {
    /// Identity of the unit computing this submission.
    pub fn unit_id(&self) -> UnitId {
        self.id
    }

    /// The validated limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }
}

impl Future for Submission {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let limit = self.limit;
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or(Err(DispatchError::WorkerAbnormalExit {
                limit,
                exit: AbnormalExit::Vanished,
            }))
        })
    }
}

/// Single-resolution result cell: the first `resolve` wins.
pub(crate) struct OutcomeSlot {
    tx: Option<oneshot::Sender<Outcome>>,
}

impl OutcomeSlot {
    pub(crate) fn new(tx: oneshot::Sender<Outcome>) -> Self {
        Self { tx: Some(tx) }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.tx.is_some()
    }

    /// Resolve with `outcome`. Returns `false` if already resolved.
    pub(crate) fn resolve(&mut self, outcome: Outcome) -> bool {
        match self.tx.take() {
            Some(tx) => {
                // A dropped receiver means the caller stopped waiting; the
                // outcome is simply discarded.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }
}

/// Listen to a unit's events and resolve `slot` from whichever terminal event comes first.
async fn watch_unit(mut unit: UnitHandle, limit: u64, mut slot: OutcomeSlot) {
    let id = unit.id();
    let started = Instant::now();

    while let Some(event) = unit.next_event().await {
        match event {
            UnitEvent::Message(result) => {
                let count = result.primes.len();
                if slot.resolve(Ok(result)) {
                    tracing::info!(
                        unit = %id,
                        limit,
                        count,
                        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                        "Compute unit delivered result"
                    );
                } else {
                    tracing::debug!(unit = %id, "Ignoring late result");
                }
                unit.shutdown();
            }
            UnitEvent::Error(message) => {
                tracing::error!(unit = %id, limit, error = %message, "Compute unit raised an error");
                slot.resolve(Err(DispatchError::ComputationRuntimeError { limit, message }));
                unit.shutdown();
            }
            UnitEvent::Exit(exit) => {
                if slot.is_pending() {
                    let detail = if exit.success() {
                        AbnormalExit::Silent(exit)
                    } else {
                        AbnormalExit::Status(exit)
                    };
                    tracing::error!(unit = %id, limit, exit = %detail, "Compute unit exited abnormally");
                    slot.resolve(Err(DispatchError::WorkerAbnormalExit {
                        limit,
                        exit: detail,
                    }));
                } else {
                    tracing::trace!(unit = %id, %exit, "Compute unit exited");
                }
                return;
            }
        }
    }

    if slot.resolve(Err(DispatchError::WorkerAbnormalExit {
        limit,
        exit: AbnormalExit::Vanished,
    })) {
        tracing::error!(unit = %id, limit, "Compute unit vanished without reporting");
    }
}
