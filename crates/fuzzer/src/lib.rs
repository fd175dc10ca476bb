//! Strategy-driven eBPF program fuzzer.
//!
//! The [`units::ControlUnit`] binds an [`executor::Executor`], a
//! [`coverage::CoverageManager`] and a [`strategies::Strategy`] chosen by
//! name, then runs the strategy's loop while [`units::MetricsCollection`]
//! aggregates verdicts and coverage for reporting.

/// Command-line configuration.
pub mod config;
/// Coverage manager contract and in-memory implementation.
pub mod coverage;
/// Fuzzer-level error types.
pub mod errors;
/// Executor contract and the corpus-writing executor.
pub mod executor;
/// Tracing subscriber setup.
pub mod logging;
/// Strategy contract and built-in strategies.
pub mod strategies;
/// Control unit and metrics.
pub mod units;

pub use errors::{ConfigError, FuzzError};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use tempfile as _;
