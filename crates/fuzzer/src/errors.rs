//! Fuzzer-level error types.

use assembler::AssembleError;
use thiserror::Error;

use crate::coverage::CoverageError;
use crate::executor::ExecutorError;

/// Startup configuration failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No strategy is registered under this name.
    #[error("unknown fuzzing strategy: {0}")]
    UnknownStrategy(String),
    /// No subcommand was given.
    #[error("missing command")]
    MissingCommand,
    /// Subcommand is not recognised.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    /// `run` was given without `--strategy`.
    #[error("missing required option --strategy")]
    MissingStrategy,
    /// Option was not followed by a value.
    #[error("missing value for {flag}")]
    MissingValue {
        /// The option.
        flag: String,
    },
    /// Option value could not be parsed.
    #[error("invalid value '{value}' for {flag}")]
    InvalidValue {
        /// The option.
        flag: String,
        /// The rejected value.
        value: String,
    },
    /// Option is not recognised.
    #[error("unknown option: {0}")]
    UnknownOption(String),
    /// `init` was called after the unit started running.
    #[error("control unit has already started running")]
    AlreadyStarted,
}

/// Failure while driving a strategy.
#[derive(Debug, Error)]
pub enum FuzzError {
    /// `run_fuzzer` was called before a successful `init`.
    #[error("control unit is not ready")]
    NotReady,
    /// `run_fuzzer` was called a second time.
    #[error("control unit is already running")]
    AlreadyRunning,
    /// A strategy produced a sequence that does not assemble.
    #[error("strategy produced an invalid program: {0}")]
    Assemble(#[from] AssembleError),
    /// The executor could not run a program.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    /// The coverage manager could not process a report.
    #[error(transparent)]
    Coverage(#[from] CoverageError),
}
