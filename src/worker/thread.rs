//! Thread-backed compute units.
//!
//! Each unit is a fresh named OS thread that owns its sieve table. Panics are
//! caught at the thread boundary and reported like any other runtime error.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tokio::sync::mpsc;

use super::unit::{ComputationRequest, UnitEvent, UnitExit, UnitHandle, UnitId, UnitSpawner};
use crate::error::{PrimesError, Result};
use crate::sieve;

/// Spawns one OS thread per compute unit.
#[derive(Debug, Clone, Default)]
pub struct ThreadSpawner {
    stack_size: Option<usize>,
}

impl ThreadSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the stack size of unit threads.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

impl UnitSpawner for ThreadSpawner {
    fn name(&self) -> &'static str {
        "thread"
    }

    fn spawn(&self, id: UnitId, request: ComputationRequest) -> Result<UnitHandle> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut builder = std::thread::Builder::new().name(id.to_string());
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }

        builder
            .spawn(move || {
                let limit = request.limit();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| sieve::timed_sieve(limit)));

                // Receiver may already be gone; the unit still terminates normally.
                match outcome {
                    Ok(Ok(result)) => {
                        let _ = tx.send(UnitEvent::Message(result));
                        let _ = tx.send(UnitEvent::Exit(UnitExit::code(0)));
                    }
                    Ok(Err(e)) => {
                        let _ = tx.send(UnitEvent::Error(e.to_string()));
                        let _ = tx.send(UnitEvent::Exit(UnitExit::code(1)));
                    }
                    Err(payload) => {
                        let _ = tx.send(UnitEvent::Error(panic_message(payload.as_ref())));
                        let _ = tx.send(UnitEvent::Exit(UnitExit::code(1)));
                    }
                }
            })
            .map_err(|e| PrimesError::SpawnFailed(format!("thread {}: {}", id, e)))?;

        Ok(UnitHandle::new(id, rx, None))
    }
}

/// Extract a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("compute unit panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("compute unit panicked: {}", s)
    } else {
        "compute unit panicked".to_string()
    }
}
