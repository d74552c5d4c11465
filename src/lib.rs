//! primes-api: compute all primes up to N over HTTP.
//!
//! Each request is served by its own short-lived compute unit: a child
//! process by default, or a dedicated thread. With process isolation a crash,
//! abort or OOM kill in one computation never takes down the server or a
//! concurrent request. Thread units only contain reported errors and panics;
//! an abort or OOM kill in a thread unit ends the whole server.
//!
//! - [`sieve`]: the Sieve of Eratosthenes and its timing wrapper
//! - [`worker`]: compute units and the backends that create them
//! - [`dispatcher`]: one-unit-per-request dispatch with single resolution
//! - [`server`]: the axum HTTP surface

pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod server;
pub mod sieve;
pub mod version;
pub mod worker;
