//! Fixed minimal program, useful for checking an executor end to end.

use assembler::{instruction_sequence, AssembleError, Program};
use ebpf_core::instruction::{exit, mov64};
use ebpf_core::Register;

use super::{FuzzSession, Strategy};
use crate::coverage::CoverageManager;
use crate::errors::FuzzError;
use crate::executor::Executor;

/// Registered name.
pub const STRATEGY_NAME: &str = "playground";

/// Submits `r0 = 0; exit` on every iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaygroundStrategy;

impl PlaygroundStrategy {
    /// Builds the playground program.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches the assembler's.
    pub fn generate() -> Result<Program, AssembleError> {
        instruction_sequence![mov64(Register::R0, 0), exit()]
    }
}

impl Strategy for PlaygroundStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    fn fuzz(
        &mut self,
        executor: &mut dyn Executor,
        coverage: &dyn CoverageManager,
        session: &FuzzSession,
    ) -> Result<(), FuzzError> {
        session.run_loop(STRATEGY_NAME, |_| {
            let program = Self::generate()?;
            session.submit(&program, executor, coverage)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::PlaygroundStrategy;
    use crate::coverage::InMemoryCoverage;
    use crate::strategies::test_support::{session, RecordingExecutor};
    use crate::strategies::Strategy;
    use ebpf_core::decode_word;

    #[test]
    fn program_is_mov_then_exit() {
        let words = PlaygroundStrategy::generate()
            .expect("fixed program assembles")
            .bytecode();
        assert_eq!(words.len(), 2);
        assert_eq!(decode_word(words[0]).opcode, 0xB7);
        assert_eq!(decode_word(words[0]).dst, 0);
        assert_eq!(decode_word(words[1]).opcode, 0x95);
    }

    #[test]
    fn submits_once_per_iteration() {
        let session = session(4);
        let mut executor = RecordingExecutor::default();
        PlaygroundStrategy
            .fuzz(&mut executor, &InMemoryCoverage::default(), &session)
            .expect("fuzz succeeds");
        assert_eq!(executor.programs.len(), 4);
        assert_eq!(session.metrics.programs_verified(), 4);
    }
}
