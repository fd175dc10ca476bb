//! Thread-safe fuzzing metrics.
//!
//! Strategies record outcomes from the fuzzing thread while the reporter
//! reads snapshots from the main thread. One mutex guards both counters and
//! the coverage read so a snapshot is never torn.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::coverage::CoverageManager;

/// Covered lines of one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageInfo {
    /// Last path segment.
    pub file_name: String,
    /// Path as reported by the coverage manager.
    pub full_path: String,
    /// Covered line numbers as reported by the coverage manager.
    pub covered_lines: Vec<u32>,
}

/// Point-in-time copy of the metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Programs submitted to the verifier.
    pub programs_verified: u64,
    /// Programs the verifier accepted.
    pub valid_programs: u64,
    /// Per-file coverage.
    pub coverage: Vec<CoverageInfo>,
}

impl MetricsSnapshot {
    /// Total covered lines across all files.
    #[must_use]
    pub fn covered_lines(&self) -> usize {
        self.coverage.iter().map(|info| info.covered_lines.len()).sum()
    }

    /// Pretty-printed JSON form of the snapshot.
    ///
    /// # Errors
    ///
    /// Returns the serializer error, which does not occur for this type in
    /// practice.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "programs verified: {}, valid: {}, files covered: {}, lines covered: {}",
            self.programs_verified,
            self.valid_programs,
            self.coverage.len(),
            self.covered_lines()
        )
    }
}

#[derive(Debug, Default)]
struct Counters {
    programs_verified: u64,
    valid_programs: u64,
}

/// Shared metrics for one fuzzing session.
pub struct MetricsCollection {
    counters: Mutex<Counters>,
    coverage: Arc<dyn CoverageManager>,
}

impl fmt::Debug for MetricsCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsCollection")
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl MetricsCollection {
    /// Creates zeroed metrics reading coverage from `coverage`.
    #[must_use]
    pub fn new(coverage: Arc<dyn CoverageManager>) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            coverage,
        }
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts one submitted program and, if `accepted`, one valid program,
    /// under a single lock.
    pub fn record_outcome(&self, accepted: bool) {
        let mut counters = self.counters();
        counters.programs_verified += 1;
        if accepted {
            counters.valid_programs += 1;
        }
    }

    /// Counts one program submitted to the verifier.
    pub fn record_verified_program(&self) {
        self.counters().programs_verified += 1;
    }

    /// Counts one program the verifier accepted.
    pub fn record_valid_program(&self) {
        self.counters().valid_programs += 1;
    }

    /// Programs submitted so far.
    #[must_use]
    pub fn programs_verified(&self) -> u64 {
        self.counters().programs_verified
    }

    /// Programs accepted so far.
    #[must_use]
    pub fn valid_programs(&self) -> u64 {
        self.counters().valid_programs
    }

    /// Consistent copy of the counters and the coverage breakdown.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self.counters();
        let mut coverage = Vec::new();
        for (full_path, lines) in self.coverage.coverage_info_map() {
            let Some(file_name) = full_path.rsplit('/').next().map(str::to_string) else {
                continue;
            };
            coverage.push(CoverageInfo {
                file_name,
                full_path,
                covered_lines: lines,
            });
        }

        MetricsSnapshot {
            programs_verified: counters.programs_verified,
            valid_programs: counters.valid_programs,
            coverage,
        }
    }
}
