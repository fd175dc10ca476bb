//! Random stores and atomics against the frame pointer.

use assembler::{instruction_sequence, AssembleError, Node, Program};
use ebpf_core::instruction::{atomic, exit, ld_dw, mov64, st_b, st_dw, st_h, st_w};
use ebpf_core::{AccessSize, AtomicOp, Register};
use rand::Rng;

use super::{FuzzSession, Strategy};
use crate::coverage::CoverageManager;
use crate::errors::FuzzError;
use crate::executor::Executor;

/// Registered name.
pub const STRATEGY_NAME: &str = "stack_corruption";

/// Size of the eBPF stack frame in bytes.
pub const STACK_SIZE: i16 = 512;

const MAX_WRITES: usize = 16;

const ATOMIC_OPS: [AtomicOp; 4] = [AtomicOp::Add, AtomicOp::Or, AtomicOp::And, AtomicOp::Xor];

/// Writes random values at random frame offsets, then reads one back.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackCorruptionStrategy;

fn random_size(rng: &mut impl Rng) -> AccessSize {
    match rng.gen_range(0..4) {
        0 => AccessSize::B,
        1 => AccessSize::H,
        2 => AccessSize::W,
        _ => AccessSize::Dw,
    }
}

fn random_write(rng: &mut impl Rng) -> Node {
    let offset = rng.gen_range(-STACK_SIZE..0);
    let size = random_size(rng);

    match rng.gen_range(0..3) {
        0 => {
            let value = rng.gen::<i32>();
            Node::from(match size {
                AccessSize::B => st_b(Register::R10, value, offset),
                AccessSize::H => st_h(Register::R10, value, offset),
                AccessSize::W => st_w(Register::R10, value, offset),
                AccessSize::Dw => st_dw(Register::R10, value, offset),
            })
        }
        1 => Node::from(match size {
            AccessSize::B => st_b(Register::R10, Register::R1, offset),
            AccessSize::H => st_h(Register::R10, Register::R1, offset),
            AccessSize::W => st_w(Register::R10, Register::R1, offset),
            AccessSize::Dw => st_dw(Register::R10, Register::R1, offset),
        }),
        _ => {
            let op = ATOMIC_OPS[rng.gen_range(0..ATOMIC_OPS.len())];
            let size = if rng.gen_bool(0.5) {
                AccessSize::Dw
            } else {
                AccessSize::W
            };
            Node::from(atomic(
                size,
                op,
                rng.gen_bool(0.25),
                Register::R10,
                Register::R1,
                offset,
            ))
        }
    }
}

impl StackCorruptionStrategy {
    /// Builds one program.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError`] if the generated sequence does not link.
    pub fn generate(rng: &mut impl Rng) -> Result<Program, AssembleError> {
        let writes = rng.gen_range(1..=MAX_WRITES);
        let mut nodes = Vec::with_capacity(writes + 3);
        nodes.push(Node::from(mov64(Register::R1, rng.gen::<i32>())));
        nodes.extend((0..writes).map(|_| random_write(rng)));
        let read_back = rng.gen_range(-STACK_SIZE / 8..0) * 8;
        nodes.push(Node::from(ld_dw(Register::R0, Register::R10, read_back)));
        nodes.push(Node::from(exit()));
        instruction_sequence(nodes)
    }
}

impl Strategy for StackCorruptionStrategy {
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
            let program = Self::generate(&mut rng)?;
            session.submit(&program, executor, coverage)?;
            Ok(())
        })
    }
}
