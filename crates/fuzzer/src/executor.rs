//! Executor contract and the corpus-writing executor.
//!
//! An executor takes the encoded words of one program, submits them to
//! whatever backend verifies and runs them, and reports the verdict together
//! with the raw coverage addresses the run produced.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use assembler::Program;
use ebpf_core::DecodeError;
use thiserror::Error;

/// One program submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionRequest<'a> {
    /// Encoded program words in order.
    pub words: &'a [u64],
    /// Upper bound on the run, if the backend supports one.
    pub timeout: Option<Duration>,
}

impl<'a> ExecutionRequest<'a> {
    /// Request with no timeout.
    #[must_use]
    pub const fn new(words: &'a [u64]) -> Self {
        Self {
            words,
            timeout: None,
        }
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Verdict and feedback for one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Whether the verifier accepted the program.
    pub accepted: bool,
    /// Verifier log text, empty when the backend produced none.
    pub verifier_log: String,
    /// Program return value (`r0`) when it was run.
    pub return_value: Option<u64>,
    /// Kernel coverage addresses hit during verification.
    pub coverage_addresses: Vec<u64>,
}

/// Backend failure unrelated to the program's verdict.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Filesystem access failed.
    #[error("i/o error at {}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The submitted words are not a well-formed program.
    #[error("malformed program: {0}")]
    Malformed(#[from] DecodeError),
    /// The backend is not reachable or refused the request.
    #[error("executor unavailable: {0}")]
    Unavailable(String),
}

/// Runs programs on behalf of a strategy.
pub trait Executor: Send {
    /// Submits one program and blocks until the verdict is known.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when the backend itself fails; a rejected
    /// program is reported through [`ExecutionResult::accepted`].
    fn execute(&mut self, request: &ExecutionRequest<'_>) -> Result<ExecutionResult, ExecutorError>;
}

/// Writes every submitted program into a directory and accepts it.
///
/// Each submission produces `prog-NNNNNN.bin` (little-endian words) and
/// `prog-NNNNNN.c` (a C initializer of the reproduction macros).
#[derive(Debug)]
pub struct CorpusExecutor {
    dir: PathBuf,
    written: u64,
}

impl CorpusExecutor {
    /// Creates the executor, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Io`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ExecutorError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ExecutorError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, written: 0 })
    }

    /// Output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of programs written so far.
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.written
    }

    fn write(&self, name: &str, contents: &[u8]) -> Result<(), ExecutorError> {
        let path = self.dir.join(name);
        fs::write(&path, contents).map_err(|source| ExecutorError::Io { path, source })
    }
}

impl Executor for CorpusExecutor {
    fn execute(
        &mut self,
        request: &ExecutionRequest<'_>,
    ) -> Result<ExecutionResult, ExecutorError> {
        let program = Program::from_bytecode(request.words)?;
        let stem = format!("prog-{:06}", self.written);
        self.write(&format!("{stem}.bin"), &program.to_bytes())?;
        self.write(&format!("{stem}.c"), program.poc_source().as_bytes())?;
        self.written += 1;

        Ok(ExecutionResult {
            accepted: true,
            ..ExecutionResult::default()
        })
    }
}
