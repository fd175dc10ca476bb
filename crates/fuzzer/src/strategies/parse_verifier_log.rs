//! Cross-checks the verifier's view of `r0` against its concrete value.
//!
//! Programs are straight-line 64-bit ALU chains on `r0` with immediate
//! operands, so the final value is known before submission. When the
//! verifier log reports a constant for `r0`, or the executor reports the
//! return value, it must equal that value.

use assembler::{instruction_sequence, AssembleError, Program};
use ebpf_core::instruction::{alu64, exit, mov64};
use ebpf_core::{AluOp, Instruction, InstructionClass, Register, Source};
use rand::Rng;
use tracing::warn;

use super::{FuzzSession, Strategy};
use crate::coverage::CoverageManager;
use crate::errors::FuzzError;
use crate::executor::Executor;

/// Registered name.
pub const STRATEGY_NAME: &str = "parse_verifier_log";

const MAX_OPERATIONS: usize = 8;

const CHAIN_OPS: [AluOp; 9] = [
    AluOp::Add,
    AluOp::Sub,
    AluOp::Mul,
    AluOp::Or,
    AluOp::And,
    AluOp::Lsh,
    AluOp::Rsh,
    AluOp::Xor,
    AluOp::Arsh,
];

/// Verifier-log cross-checking strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseVerifierLogStrategy {
    mismatches: u64,
}

impl ParseVerifierLogStrategy {
    /// Programs whose reported `r0` disagreed with the computed value.
    #[must_use]
    pub const fn mismatches(&self) -> u64 {
        self.mismatches
    }

    /// Builds one ALU chain on `r0`.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError`] if the generated sequence does not link.
    pub fn generate(rng: &mut impl Rng) -> Result<Program, AssembleError> {
        let count = rng.gen_range(1..=MAX_OPERATIONS);
        let mut chain = Vec::with_capacity(count + 2);
        chain.push(mov64(Register::R0, rng.gen::<i32>()));
        for _ in 0..count {
            let op = CHAIN_OPS[rng.gen_range(0..CHAIN_OPS.len())];
            let imm = if matches!(op, AluOp::Lsh | AluOp::Rsh | AluOp::Arsh) {
                rng.gen_range(0_i32..64)
            } else {
                rng.gen::<i32>()
            };
            chain.push(alu64(op, Register::R0, imm));
        }
        chain.push(exit());
        instruction_sequence(chain)
    }
}

/// Concrete `r0` at exit for a straight-line chain of 64-bit immediate ALU
/// operations on `r0`; `None` for any other shape.
#[must_use]
#[allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]
pub fn evaluate_r0(program: &Program) -> Option<u64> {
    let mut r0: u64 = 0;
    for insn in program.instructions() {
        let alu = match insn {
            Instruction::Alu(alu) => alu,
            Instruction::Exit => return Some(r0),
            _ => return None,
        };
        if alu.dst() != Register::R0 || !matches!(alu.class(), InstructionClass::Alu64) {
            return None;
        }
        let Source::Imm(imm) = alu.src() else {
            return None;
        };
        let operand = i64::from(imm) as u64;
        let shift = (operand & 63) as u32;
        r0 = match alu.op() {
            AluOp::Mov => operand,
            AluOp::Add => r0.wrapping_add(operand),
            AluOp::Sub => r0.wrapping_sub(operand),
            AluOp::Mul => r0.wrapping_mul(operand),
            AluOp::Or => r0 | operand,
            AluOp::And => r0 & operand,
            AluOp::Xor => r0 ^ operand,
            AluOp::Lsh => r0 << shift,
            AluOp::Rsh => r0 >> shift,
            AluOp::Arsh => ((r0 as i64) >> shift) as u64,
            AluOp::Neg => r0.wrapping_neg(),
            _ => return None,
        };
    }
    None
}

/// Constant held by `register` in the last state the verifier log reports.
///
/// Recognises `R0=5`, `R0_w=-3`, `R0=inv7` and `R0_w=0x1f` forms. If the
/// last state is a range such as `R0_w=scalar(...)` the result is `None`,
/// even when an earlier state was constant.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn parse_register_constant(log: &str, register: Register) -> Option<u64> {
    let plain = format!("R{}=", register.number());
    let written = format!("R{}_w=", register.number());

    log.split(|c: char| c.is_whitespace() || c == ';' || c == ',')
        .rev()
        .find_map(|token| {
            token
                .strip_prefix(&plain)
                .or_else(|| token.strip_prefix(&written))
        })
        .and_then(|value| {
            let value = value.strip_prefix("inv").unwrap_or(value);
            match value.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16).ok(),
                None => value.parse::<i64>().ok().map(|v| v as u64),
            }
        })
}

impl Strategy for ParseVerifierLogStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    fn fuzz(
        &mut self,
        executor: &mut dyn Executor,
        coverage: &dyn CoverageManager,
        session: &FuzzSession,
    ) -> Result<(), FuzzError> {
        let mut rng = session.rng();
        let mismatches = &mut self.mismatches;
        session.run_loop(STRATEGY_NAME, |iteration| {
            let program = Self::generate(&mut rng)?;
            let result = session.submit(&program, executor, coverage)?;
            if !result.accepted {
                return Ok(());
            }
            let Some(expected) = evaluate_r0(&program) else {
                return Ok(());
            };

            let claimed = parse_register_constant(&result.verifier_log, Register::R0);
            let diverged = claimed.is_some_and(|value| value != expected)
                || result.return_value.is_some_and(|value| value != expected);
            if diverged {
                *mismatches += 1;
                warn!(
                    iteration,
                    expected,
                    claimed = ?claimed,
                    returned = ?result.return_value,
                    program = %program.poc_source(),
                    "r0 disagrees with computed value"
                );
            }
            Ok(())
        })
    }
}
