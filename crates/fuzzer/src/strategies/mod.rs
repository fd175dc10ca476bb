//! Strategy contract and the shared submission loop.
//!
//! A strategy owns program generation. Everything after generation
//! (encoding, execution, metrics and coverage bookkeeping) goes through
//! [`FuzzSession::submit`] so every strategy reports the same way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assembler::Program;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::coverage::CoverageManager;
use crate::errors::FuzzError;
use crate::executor::{ExecutionRequest, ExecutionResult, Executor};
use crate::units::metrics::MetricsCollection;

pub mod parse_verifier_log;
pub mod playground;
pub mod pointer_arithmetic;
pub mod stack_corruption;

pub use parse_verifier_log::ParseVerifierLogStrategy;
pub use playground::PlaygroundStrategy;
pub use pointer_arithmetic::PointerArithmeticStrategy;
pub use stack_corruption::StackCorruptionStrategy;

/// A program-generation policy.
pub trait Strategy: Send {
    /// Registered name.
    fn name(&self) -> &'static str;

    /// Runs the fuzzing loop until the session says to stop.
    ///
    /// # Errors
    ///
    /// Returns [`FuzzError`] if a generated sequence fails to assemble or the
    /// executor fails.
    fn fuzz(
        &mut self,
        executor: &mut dyn Executor,
        coverage: &dyn CoverageManager,
        session: &FuzzSession,
    ) -> Result<(), FuzzError>;
}

/// Shared state handed to a running strategy.
pub struct FuzzSession {
    /// Metrics updated after every submission.
    pub metrics: Arc<MetricsCollection>,
    /// Set from another thread to end the loop before the next iteration.
    pub stop: Arc<AtomicBool>,
    /// Maximum number of programs to submit; unbounded when `None`.
    pub iterations: Option<u64>,
    /// Per-program timeout forwarded to the executor.
    pub timeout: Option<Duration>,
    /// Generator seed; drawn from the OS when `None`.
    pub seed: Option<u64>,
}

impl FuzzSession {
    /// Creates an unbounded session with no timeout.
    #[must_use]
    pub fn new(metrics: Arc<MetricsCollection>) -> Self {
        Self {
            metrics,
            stop: Arc::new(AtomicBool::new(false)),
            iterations: None,
            timeout: None,
            seed: None,
        }
    }

    /// Returns true while neither the stop flag nor the budget ends the loop.
    #[must_use]
    pub fn should_continue(&self, completed: u64) -> bool {
        !self.stop.load(Ordering::Relaxed) && self.iterations.is_none_or(|limit| completed < limit)
    }

    /// Random generator for this session.
    #[must_use]
    pub fn rng(&self) -> StdRng {
        self.seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
    }

    /// Encodes, executes and records one program.
    ///
    /// Coverage failures are logged and do not end the loop.
    ///
    /// # Errors
    ///
    /// Returns [`FuzzError::Executor`] if the executor fails.
    pub fn submit(
        &self,
        program: &Program,
        executor: &mut dyn Executor,
        coverage: &dyn CoverageManager,
    ) -> Result<ExecutionResult, FuzzError> {
        let words = program.bytecode();
        let request = ExecutionRequest::new(&words).with_timeout(self.timeout);
        let result = executor.execute(&request)?;

        self.metrics.record_outcome(result.accepted);
        debug!(
            words = words.len(),
            accepted = result.accepted,
            "program executed"
        );

        if let Err(err) = coverage.process_coverage_addresses(&result.coverage_addresses) {
            warn!(error = %err, "failed to process coverage");
        }
        Ok(result)
    }

    /// Calls `iteration` until the session ends, logging start and finish.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `iteration`.
    pub fn run_loop(
        &self,
        strategy: &'static str,
        mut iteration: impl FnMut(u64) -> Result<(), FuzzError>,
    ) -> Result<(), FuzzError> {
        info!(strategy, limit = ?self.iterations, "fuzzing started");
        let mut completed = 0;
        while self.should_continue(completed) {
            iteration(completed)?;
            completed += 1;
        }
        info!(strategy, completed, "fuzzing finished");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use super::FuzzSession;
    use crate::coverage::InMemoryCoverage;
    use crate::executor::{ExecutionRequest, ExecutionResult, Executor, ExecutorError};
    use crate::units::metrics::MetricsCollection;

    /// Executor that records submissions and replays a fixed result.
    #[derive(Default)]
    pub struct RecordingExecutor {
        pub programs: Vec<Vec<u64>>,
        pub result: ExecutionResult,
    }

    impl Executor for RecordingExecutor {
        fn execute(
            &mut self,
            request: &ExecutionRequest<'_>,
        ) -> Result<ExecutionResult, ExecutorError> {
            self.programs.push(request.words.to_vec());
            Ok(self.result.clone())
        }
    }

    pub fn session(iterations: u64) -> FuzzSession {
        let coverage = Arc::new(InMemoryCoverage::default());
        let mut session = FuzzSession::new(Arc::new(MetricsCollection::new(coverage)));
        session.iterations = Some(iterations);
        session.seed = Some(7);
        session
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{session, RecordingExecutor};
    use crate::coverage::InMemoryCoverage;
    use crate::executor::ExecutionResult;
    use assembler::instruction_sequence;
    use ebpf_core::instruction::{exit, mov64};
    use ebpf_core::Register;
    use std::sync::atomic::Ordering;

    #[test]
    fn budget_bounds_the_loop() {
        let session = session(3);
        let mut seen = Vec::new();
        session
            .run_loop("test", |i| {
                seen.push(i);
                Ok(())
            })
            .expect("loop succeeds");
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn stop_flag_ends_loop_before_next_iteration() {
        let session = session(100);
        let mut count = 0;
        session
            .run_loop("test", |_| {
                count += 1;
                session.stop.store(true, Ordering::Relaxed);
                Ok(())
            })
            .expect("loop succeeds");
        assert_eq!(count, 1);
    }

    #[test]
    fn submit_records_verdict() {
        let session = session(1);
        let coverage = InMemoryCoverage::default();
        let program = instruction_sequence![mov64(Register::R0, 0), exit()].expect("valid");
        let mut executor = RecordingExecutor {
            result: ExecutionResult {
                accepted: false,
                ..ExecutionResult::default()
            },
            ..RecordingExecutor::default()
        };

        session
            .submit(&program, &mut executor, &coverage)
            .expect("executor succeeds");
        executor.result.accepted = true;
        session
            .submit(&program, &mut executor, &coverage)
            .expect("executor succeeds");

        assert_eq!(executor.programs.len(), 2);
        assert_eq!(executor.programs[0], program.bytecode());
        assert_eq!(session.metrics.programs_verified(), 2);
        assert_eq!(session.metrics.valid_programs(), 1);
    }
}
