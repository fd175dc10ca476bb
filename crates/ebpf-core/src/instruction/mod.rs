//! Instruction variants and their encodings.
//!
//! Every variant answers the same two questions: which 64-bit words does it
//! occupy in a program, and which reproduction macro regenerates it. Factory
//! functions in the submodules are the supported way to build instructions.

mod alu;
mod jump;
mod memory;

pub use alu::{
    add32, add64, alu32, alu64, and32, and64, arsh32, arsh64, div32, div64, lsh32, lsh64, mod32,
    mod64, mov32, mov64, mul32, mul64, neg32, neg64, or32, or64, rsh32, rsh64, sub32, sub64,
    xor32, xor64, AluInstruction,
};
pub use jump::{call, exit, ja, jmp, jmp32, JumpInstruction};
pub use memory::{
    atomic, ld_b, ld_dw, ld_h, ld_map_fd, ld_w, mem_add, mem_add64, mem_and, mem_and64, mem_or,
    mem_or64, mem_xor, mem_xor64, st_b, st_dw, st_h, st_w, MemoryInstruction, StoreSource,
};

use crate::encoding::{encode_word, InstructionClass, JumpOp, SourceKind};
use crate::register::Register;

/// Operand of an ALU or jump instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Source {
    /// 32-bit signed immediate (`BPF_K`).
    Imm(i32),
    /// Register operand (`BPF_X`).
    Reg(Register),
}

impl Source {
    /// Opcode source selector for this operand.
    #[must_use]
    pub const fn kind(self) -> SourceKind {
        match self {
            Self::Imm(_) => SourceKind::K,
            Self::Reg(_) => SourceKind::X,
        }
    }

    /// Number packed into the `src` field; zero for immediates.
    #[must_use]
    pub const fn register_number(self) -> u8 {
        match self {
            Self::Imm(_) => 0,
            Self::Reg(reg) => reg.number(),
        }
    }

    /// Value packed into the `imm` field; zero for registers.
    #[must_use]
    pub const fn immediate(self) -> i32 {
        match self {
            Self::Imm(imm) => imm,
            Self::Reg(_) => 0,
        }
    }

    fn operand_text(self) -> String {
        match self {
            Self::Imm(imm) => imm.to_string(),
            Self::Reg(reg) => reg.to_string(),
        }
    }
}

impl From<i32> for Source {
    fn from(value: i32) -> Self {
        Self::Imm(value)
    }
}

impl From<Register> for Source {
    fn from(value: Register) -> Self {
        Self::Reg(value)
    }
}

/// A single eBPF instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Instruction {
    /// 32- or 64-bit arithmetic/logic.
    Alu(AluInstruction),
    /// Conditional or unconditional relative jump.
    Jump(JumpInstruction),
    /// Load, store, atomic or 64-bit immediate pseudo-load.
    Memory(MemoryInstruction),
    /// Helper function call.
    Call {
        /// Helper function id.
        helper: i32,
    },
    /// Return from the program with `r0` as result.
    Exit,
}

impl Instruction {
    /// Operation family driving the binary layout.
    #[must_use]
    pub const fn class(&self) -> InstructionClass {
        match self {
            Self::Alu(alu) => alu.class(),
            Self::Jump(jump) => jump.class(),
            Self::Memory(mem) => mem.class(),
            Self::Call { .. } | Self::Exit => InstructionClass::Jmp,
        }
    }

    /// Register written by this instruction; `r0` for calls and exit.
    #[must_use]
    pub const fn dst(&self) -> Register {
        match self {
            Self::Alu(alu) => alu.dst(),
            Self::Jump(jump) => jump.dst(),
            Self::Memory(mem) => mem.dst(),
            Self::Call { .. } | Self::Exit => Register::R0,
        }
    }

    /// Number of 64-bit words this instruction occupies (1, or 2 for ld_imm64).
    #[must_use]
    pub const fn word_count(&self) -> usize {
        match self {
            Self::Memory(mem) => mem.word_count(),
            _ => 1,
        }
    }

    /// Returns true for jumps and exit, which end a straight-line block.
    #[must_use]
    pub const fn is_branch(&self) -> bool {
        matches!(self, Self::Jump(_) | Self::Exit)
    }

    /// Produces the instruction's words in program order.
    #[must_use]
    pub fn encode(&self) -> Vec<u64> {
        match self {
            Self::Alu(alu) => vec![alu.encode()],
            Self::Jump(jump) => vec![jump.encode()],
            Self::Memory(mem) => mem.encode(),
            Self::Call { helper } => vec![encode_word(
                InstructionClass::Jmp.bits() | JumpOp::Call.bits(),
                0,
                0,
                0,
                *helper,
            )],
            Self::Exit => vec![encode_word(
                InstructionClass::Jmp.bits() | JumpOp::Exit.bits(),
                0,
                0,
                0,
                0,
            )],
        }
    }

    /// Produces the reproduction macro for this instruction.
    #[must_use]
    pub fn repro(&self) -> String {
        match self {
            Self::Alu(alu) => alu.repro(),
            Self::Jump(jump) => jump.repro(),
            Self::Memory(mem) => mem.repro(),
            Self::Call { helper } => format!("BPF_EMIT_CALL({helper})"),
            Self::Exit => "BPF_EXIT_INSN()".to_string(),
        }
    }
}

impl From<AluInstruction> for Instruction {
    fn from(value: AluInstruction) -> Self {
        Self::Alu(value)
    }
}

impl From<JumpInstruction> for Instruction {
    fn from(value: JumpInstruction) -> Self {
        Self::Jump(value)
    }
}

impl From<MemoryInstruction> for Instruction {
    fn from(value: MemoryInstruction) -> Self {
        Self::Memory(value)
    }
}
