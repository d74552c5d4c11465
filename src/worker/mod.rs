//! Isolated compute units.
//!
//! Every request gets its own unit; nothing is pooled or reused. A unit is
//! either a child process or a dedicated thread, and both report back through
//! the same event stream.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────┐
//!                     │   Dispatcher    │
//!                     │ (request task)  │
//!                     └────────┬────────┘
//!                              │ one unit per request
//!               ┌──────────────┼──────────────┐
//!               │              │              │
//!         ┌─────▼─────┐  ┌─────▼─────┐  ┌─────▼─────┐
//!         │  Unit 1   │  │  Unit 2   │  │  Unit N   │
//!         │ (process) │  │ (process) │  │ (process) │
//!         │  Sieve    │  │  Sieve    │  │  Sieve    │
//!         └───────────┘  └───────────┘  └───────────┘
//! ```
//!
//! # Events
//!
//! - **Message**: the unit delivered `{primes, duration_ms}`
//! - **Error**: the unit raised a runtime error (e.g. allocation failure)
//! - **Exit**: the unit's execution context ended, with its status

mod ipc;
pub mod protocol;
mod spawn;
mod thread;
mod unit;
mod worker_main;

pub use spawn::{ProcessSpawner, WORKER_SUBCOMMAND};
pub use thread::ThreadSpawner;
pub use unit::{ComputationRequest, UnitEvent, UnitExit, UnitHandle, UnitId, UnitSpawner};
pub use worker_main::run_worker_main;

use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which isolation mechanism backs compute units.
#[derive(
    ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Isolation {
    /// One child process per unit.
    #[default]
    Process,
    /// One OS thread per unit.
    Thread,
}

impl Isolation {
    /// Build the spawner for this isolation mode.
    pub fn spawner(self) -> Result<Arc<dyn UnitSpawner>> {
        Ok(match self {
            Isolation::Process => Arc::new(ProcessSpawner::current_exe()?),
            Isolation::Thread => Arc::new(ThreadSpawner::new()),
        })
    }
}

impl std::fmt::Display for Isolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Process => write!(f, "process"),
            Self::Thread => write!(f, "thread"),
        }
    }
}

/// Advisory worker capacity: the number of CPUs, or 4 when unknown.
///
/// Units are not limited to this number; it is reported for operators.
pub fn default_worker_capacity() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
