//! Coverage manager contract and an in-memory implementation.
//!
//! A coverage manager turns raw kernel addresses reported by the executor
//! into per-file covered line numbers. The fuzzer core only ever reads
//! snapshots of that map.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// Coverage processing failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoverageError {
    /// Address symbolisation backend failed.
    #[error("coverage backend failed: {0}")]
    Backend(String),
}

/// Aggregates coverage across fuzzing iterations.
pub trait CoverageManager: Send + Sync {
    /// Folds one run's raw coverage addresses into the map.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError`] if the addresses cannot be symbolised.
    fn process_coverage_addresses(&self, addresses: &[u64]) -> Result<(), CoverageError>;

    /// Snapshot of covered lines keyed by source file path.
    fn coverage_info_map(&self) -> BTreeMap<String, Vec<u32>>;
}

/// Source location of one instrumented address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// Source file path.
    pub path: String,
    /// 1-based line number.
    pub line: u32,
}

/// Coverage manager backed by a fixed address table.
///
/// Addresses missing from the table are ignored.
#[derive(Debug, Default)]
pub struct InMemoryCoverage {
    symbols: BTreeMap<u64, SourceLine>,
    covered: Mutex<BTreeMap<String, BTreeSet<u32>>>,
}

impl InMemoryCoverage {
    /// Creates a manager that symbolises with `symbols`.
    #[must_use]
    pub fn new(symbols: impl IntoIterator<Item = (u64, SourceLine)>) -> Self {
        Self {
            symbols: symbols.into_iter().collect(),
            covered: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of distinct lines covered so far.
    #[must_use]
    pub fn covered_line_count(&self) -> usize {
        self.covered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(BTreeSet::len)
            .sum()
    }
}

impl CoverageManager for InMemoryCoverage {
    fn process_coverage_addresses(&self, addresses: &[u64]) -> Result<(), CoverageError> {
        let mut covered = self.covered.lock().unwrap_or_else(PoisonError::into_inner);
        for address in addresses {
            if let Some(source) = self.symbols.get(address) {
                covered
                    .entry(source.path.clone())
                    .or_default()
                    .insert(source.line);
            }
        }
        Ok(())
    }

    fn coverage_info_map(&self) -> BTreeMap<String, Vec<u32>> {
        self.covered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(path, lines)| (path.clone(), lines.iter().copied().collect()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{CoverageManager, InMemoryCoverage, SourceLine};

    fn manager() -> InMemoryCoverage {
        InMemoryCoverage::new([
            (
                0x10,
                SourceLine {
                    path: "kernel/bpf/verifier.c".into(),
                    line: 120,
                },
            ),
            (
                0x20,
                SourceLine {
                    path: "kernel/bpf/verifier.c".into(),
                    line: 90,
                },
            ),
            (
                0x30,
                SourceLine {
                    path: "kernel/bpf/core.c".into(),
                    line: 7,
                },
            ),
        ])
    }

    #[test]
    fn addresses_fold_into_sorted_line_sets() {
        let coverage = manager();
        coverage
            .process_coverage_addresses(&[0x10, 0x20, 0x10])
            .expect("in-memory coverage never fails");
        coverage
            .process_coverage_addresses(&[0x30])
            .expect("in-memory coverage never fails");

        let map = coverage.coverage_info_map();
        assert_eq!(map["kernel/bpf/verifier.c"], vec![90, 120]);
        assert_eq!(map["kernel/bpf/core.c"], vec![7]);
        assert_eq!(coverage.covered_line_count(), 3);
    }

    #[test]
    fn unknown_addresses_are_ignored() {
        let coverage = manager();
        coverage
            .process_coverage_addresses(&[0xdead])
            .expect("in-memory coverage never fails");
        assert!(coverage.coverage_info_map().is_empty());
    }
}
