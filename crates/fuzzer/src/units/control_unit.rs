//! Control unit: strategy selection and the run lifecycle.
//!
//! The unit moves through `Uninitialized -> Ready -> Running`. `init` binds
//! the executor, coverage manager and a strategy resolved by name;
//! `run_fuzzer` hands them to the strategy exactly once.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::coverage::CoverageManager;
use crate::errors::{ConfigError, FuzzError};
use crate::executor::Executor;
use crate::strategies::{
    parse_verifier_log, playground, pointer_arithmetic, stack_corruption, FuzzSession,
    ParseVerifierLogStrategy, PlaygroundStrategy, PointerArithmeticStrategy,
    StackCorruptionStrategy, Strategy,
};
use crate::units::metrics::MetricsCollection;

fn new_playground() -> Box<dyn Strategy> {
    Box::new(PlaygroundStrategy)
}

fn new_pointer_arithmetic() -> Box<dyn Strategy> {
    Box::new(PointerArithmeticStrategy::default())
}

fn new_stack_corruption() -> Box<dyn Strategy> {
    Box::new(StackCorruptionStrategy)
}

fn new_parse_verifier_log() -> Box<dyn Strategy> {
    Box::new(ParseVerifierLogStrategy::default())
}

/// Registered strategies keyed by name.
pub const STRATEGY_TABLE: &[(&str, fn() -> Box<dyn Strategy>)] = &[
    (playground::STRATEGY_NAME, new_playground),
    (pointer_arithmetic::STRATEGY_NAME, new_pointer_arithmetic),
    (stack_corruption::STRATEGY_NAME, new_stack_corruption),
    (parse_verifier_log::STRATEGY_NAME, new_parse_verifier_log),
];

/// Instantiates the strategy registered under `name`.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownStrategy`] if no strategy has that name.
pub fn strategy_by_name(name: &str) -> Result<Box<dyn Strategy>, ConfigError> {
    STRATEGY_TABLE
        .iter()
        .find(|(registered, _)| *registered == name)
        .map(|(_, build)| build())
        .ok_or_else(|| ConfigError::UnknownStrategy(name.to_string()))
}

/// Lifecycle state of a [`ControlUnit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlUnitState {
    /// `init` has not succeeded yet.
    Uninitialized,
    /// A strategy is bound and waiting for `run_fuzzer`.
    Ready,
    /// `run_fuzzer` has been called.
    Running,
}

/// Bounds applied to a fuzzing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunLimits {
    /// Maximum number of programs to submit.
    pub iterations: Option<u64>,
    /// Per-program executor timeout.
    pub timeout: Option<Duration>,
    /// Generator seed.
    pub seed: Option<u64>,
}

struct Bound {
    strategy: Box<dyn Strategy>,
    executor: Box<dyn Executor>,
    coverage: Arc<dyn CoverageManager>,
}

/// Drives one strategy against one executor.
pub struct ControlUnit {
    state: ControlUnitState,
    limits: RunLimits,
    bound: Option<Bound>,
    metrics: Option<Arc<MetricsCollection>>,
    stop: Arc<AtomicBool>,
}

impl Default for ControlUnit {
    fn default() -> Self {
        Self::new(RunLimits::default())
    }
}

impl ControlUnit {
    /// Creates an uninitialized unit.
    #[must_use]
    pub fn new(limits: RunLimits) -> Self {
        Self {
            state: ControlUnitState::Uninitialized,
            limits,
            bound: None,
            metrics: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Binds collaborators and resolves `strategy_name`.
    ///
    /// On failure the unit keeps its previous state. A unit may be
    /// re-initialized while ready, but not once it has started running.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadyStarted`] after `run_fuzzer` has been
    /// called, or [`ConfigError::UnknownStrategy`] for an unregistered name.
    pub fn init(
        &mut self,
        executor: Box<dyn Executor>,
        coverage: Arc<dyn CoverageManager>,
        strategy_name: &str,
    ) -> Result<(), ConfigError> {
        if self.state == ControlUnitState::Running {
            return Err(ConfigError::AlreadyStarted);
        }
        let strategy = strategy_by_name(strategy_name)?;
        info!(strategy = strategy.name(), "control unit ready");

        self.metrics = Some(Arc::new(MetricsCollection::new(Arc::clone(&coverage))));
        self.bound = Some(Bound {
            strategy,
            executor,
            coverage,
        });
        self.state = ControlUnitState::Ready;
        Ok(())
    }

    /// Returns true once `init` has succeeded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state != ControlUnitState::Uninitialized
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ControlUnitState {
        self.state
    }

    /// Name of the bound strategy.
    #[must_use]
    pub fn strategy_name(&self) -> Option<&'static str> {
        self.bound.as_ref().map(|bound| bound.strategy.name())
    }

    /// Metrics of the bound session.
    #[must_use]
    pub fn metrics(&self) -> Option<Arc<MetricsCollection>> {
        self.metrics.clone()
    }

    /// Flag that stops the running strategy before its next iteration.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Runs the bound strategy to completion.
    ///
    /// # Errors
    ///
    /// Returns [`FuzzError::NotReady`] before `init`,
    /// [`FuzzError::AlreadyRunning`] on a second call, or whatever the
    /// strategy returns.
    pub fn run_fuzzer(&mut self) -> Result<(), FuzzError> {
        match self.state {
            ControlUnitState::Uninitialized => return Err(FuzzError::NotReady),
            ControlUnitState::Running => return Err(FuzzError::AlreadyRunning),
            ControlUnitState::Ready => {}
        }
        let (Some(mut bound), Some(metrics)) = (self.bound.take(), self.metrics.clone()) else {
            return Err(FuzzError::NotReady);
        };
        self.state = ControlUnitState::Running;

        let session = FuzzSession {
            metrics,
            stop: Arc::clone(&self.stop),
            iterations: self.limits.iterations,
            timeout: self.limits.timeout,
            seed: self.limits.seed,
        };
        let strategy_name = bound.strategy.name();
        let result = bound
            .strategy
            .fuzz(bound.executor.as_mut(), bound.coverage.as_ref(), &session);
        self.bound = Some(bound);

        info!(
            strategy = strategy_name,
            programs = session.metrics.programs_verified(),
            ok = result.is_ok(),
            "strategy returned"
        );
        result
    }
}
