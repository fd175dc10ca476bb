//! Random scalar arithmetic folded into a map value pointer.
//!
//! Each program looks up key 0 in a map, builds a random scalar in `r3`
//! with a chain of ALU operations, adds it to the returned value pointer
//! and dereferences the result. The verifier must track the scalar's bounds
//! precisely to decide whether the access stays inside the value.

use assembler::{instruction_sequence, jmp_to, label, AssembleError, Node, Program};
use ebpf_core::instruction::{add64, alu32, alu64, call, exit, ld_dw, ld_map_fd, mov64, st_dw};
use ebpf_core::{AluOp, JumpOp, Register};
use rand::Rng;

use super::{FuzzSession, Strategy};
use crate::coverage::CoverageManager;
use crate::errors::FuzzError;
use crate::executor::Executor;

/// Registered name.
pub const STRATEGY_NAME: &str = "pointer_arithmetic";

/// Default length of the random ALU chain.
pub const DEFAULT_INSTRUCTION_COUNT: usize = 60;

/// `bpf_map_lookup_elem` helper id.
pub const MAP_LOOKUP_ELEM: i32 = 1;

const SCALAR_OPS: [AluOp; 9] = [
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

/// Pointer-arithmetic strategy.
#[derive(Debug, Clone, Copy)]
pub struct PointerArithmeticStrategy {
    /// Number of random ALU operations per program.
    pub instruction_count: usize,
    /// Map file descriptor loaded into `r1`.
    pub map_fd: i32,
}

impl Default for PointerArithmeticStrategy {
    fn default() -> Self {
        Self {
            instruction_count: DEFAULT_INSTRUCTION_COUNT,
            map_fd: 0,
        }
    }
}

fn random_alu(rng: &mut impl Rng) -> Node {
    let op = SCALAR_OPS[rng.gen_range(0..SCALAR_OPS.len())];
    let wide = rng.gen_bool(0.5);
    let bits: i32 = if wide { 64 } else { 32 };
    let imm = if matches!(op, AluOp::Lsh | AluOp::Rsh | AluOp::Arsh) {
        rng.gen_range(0..bits)
    } else {
        rng.gen_range(-1024_i32..=1024)
    };

    let insn = match (wide, rng.gen_bool(0.25)) {
        (true, true) => alu64(op, Register::R3, Register::R4),
        (true, false) => alu64(op, Register::R3, imm),
        (false, true) => alu32(op, Register::R3, Register::R4),
        (false, false) => alu32(op, Register::R3, imm),
    };
    Node::from(insn)
}

impl PointerArithmeticStrategy {
    /// Builds one program.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError`] if the generated sequence does not link.
    pub fn generate(&self, rng: &mut impl Rng) -> Result<Program, AssembleError> {
        let mut nodes = vec![
            Node::from(st_dw(Register::R10, 0, -8)),
            Node::from(ld_map_fd(Register::R1, self.map_fd)),
            Node::from(mov64(Register::R2, Register::R10)),
            Node::from(add64(Register::R2, -8)),
            Node::from(call(MAP_LOOKUP_ELEM)),
            jmp_to(JumpOp::Jeq, Register::R0, 0, "out"),
            Node::from(mov64(Register::R3, rng.gen_range(-1024_i32..=1024))),
            Node::from(mov64(Register::R4, rng.gen_range(-1024_i32..=1024))),
        ];
        nodes.extend((0..self.instruction_count).map(|_| random_alu(rng)));
        nodes.extend([
            Node::from(add64(Register::R0, Register::R3)),
            Node::from(ld_dw(Register::R1, Register::R0, 0)),
            label("out"),
            Node::from(mov64(Register::R0, 0)),
            Node::from(exit()),
        ]);
        instruction_sequence(nodes)
    }
}

impl Strategy for PointerArithmeticStrategy {
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
        session.run_loop(STRATEGY_NAME, |_| {
            let program = self.generate(&mut rng)?;
            session.submit(&program, executor, coverage)?;
            Ok(())
        })
    }
}
