//! Fuzzer business logic: lifecycle control and metrics.

/// Strategy selection and the run lifecycle.
pub mod control_unit;
/// Thread-safe counters and coverage snapshots.
pub mod metrics;

pub use control_unit::{ControlUnit, ControlUnitState, RunLimits, STRATEGY_TABLE};
pub use metrics::{CoverageInfo, MetricsCollection, MetricsSnapshot};
