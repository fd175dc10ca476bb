use super::{Instruction, Source};
use crate::encoding::{encode_word, InstructionClass, JumpOp};
use crate::register::Register;

/// Relative jump. `offset` counts 64-bit words from the instruction after the jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct JumpInstruction {
    pub(crate) class: InstructionClass,
    pub(crate) op: JumpOp,
    pub(crate) dst: Register,
    pub(crate) src: Source,
    pub(crate) offset: i16,
}

impl JumpInstruction {
    /// `BPF_JMP` or `BPF_JMP32`.
    #[must_use]
    pub const fn class(&self) -> InstructionClass {
        self.class
    }

    /// The jump condition.
    #[must_use]
    pub const fn op(&self) -> JumpOp {
        self.op
    }

    /// Left-hand comparison register.
    #[must_use]
    pub const fn dst(&self) -> Register {
        self.dst
    }

    /// Right-hand comparison operand.
    #[must_use]
    pub const fn src(&self) -> Source {
        self.src
    }

    /// Word offset of the taken branch.
    #[must_use]
    pub const fn offset(&self) -> i16 {
        self.offset
    }

    /// Returns a copy of this jump with a different offset.
    #[must_use]
    pub const fn with_offset(self, offset: i16) -> Self {
        Self { offset, ..self }
    }

    pub(super) const fn encode(&self) -> u64 {
        encode_word(
            self.class.bits() | self.op.bits() | self.src.kind() as u8,
            self.dst.number(),
            self.src.register_number(),
            self.offset,
            self.src.immediate(),
        )
    }

    pub(super) fn repro(&self) -> String {
        if matches!(self.op, JumpOp::Ja) {
            return format!("BPF_JMP_A({})", self.offset);
        }
        let class = if matches!(self.class, InstructionClass::Jmp32) {
            "JMP32"
        } else {
            "JMP"
        };
        let form = match self.src {
            Source::Imm(_) => "IMM",
            Source::Reg(_) => "REG",
        };
        format!(
            "BPF_{class}_{form}({}, {}, {}, {})",
            self.op.macro_name(),
            self.dst,
            self.src.operand_text(),
            self.offset
        )
    }
}

/// Builds a 64-bit comparison jump.
#[must_use]
pub fn jmp(op: JumpOp, dst: Register, src: impl Into<Source>, offset: i16) -> Instruction {
    Instruction::Jump(JumpInstruction {
        class: InstructionClass::Jmp,
        op,
        dst,
        src: src.into(),
        offset,
    })
}

/// Builds a 32-bit comparison jump.
#[must_use]
pub fn jmp32(op: JumpOp, dst: Register, src: impl Into<Source>, offset: i16) -> Instruction {
    Instruction::Jump(JumpInstruction {
        class: InstructionClass::Jmp32,
        op,
        dst,
        src: src.into(),
        offset,
    })
}

/// Unconditional jump.
#[must_use]
pub const fn ja(offset: i16) -> Instruction {
    Instruction::Jump(JumpInstruction {
        class: InstructionClass::Jmp,
        op: JumpOp::Ja,
        dst: Register::R0,
        src: Source::Imm(0),
        offset,
    })
}

/// Calls helper function `helper`; arguments in `r1..=r5`, result in `r0`.
#[must_use]
pub const fn call(helper: i32) -> Instruction {
    Instruction::Call { helper }
}

/// Returns from the program.
#[must_use]
pub const fn exit() -> Instruction {
    Instruction::Exit
}

#[cfg(test)]
mod tests {
    use super::{ja, jmp, jmp32};
    use crate::encoding::JumpOp;
    use crate::instruction::Instruction;
    use crate::register::Register;

    #[test]
    fn conditional_jump_packs_offset_and_immediate() {
        let word = jmp(JumpOp::Jeq, Register::R1, 0, 2).encode()[0];
        assert_eq!(word & 0xFF, 0x15);
        assert_eq!((word >> 8) & 0x0F, 1);
        assert_eq!((word >> 16) & 0xFFFF, 2);
    }

    #[test]
    fn backward_jump_offset_is_twos_complement() {
        let word = ja(-3).encode()[0];
        assert_eq!(word & 0xFF, 0x05);
        assert_eq!((word >> 16) & 0xFFFF, 0xFFFD);
    }

    #[test]
    fn jmp32_register_form() {
        let word = jmp32(JumpOp::Jgt, Register::R2, Register::R3, 1).encode()[0];
        assert_eq!(word & 0xFF, 0x2E);
        assert_eq!((word >> 12) & 0x0F, 3);
    }

    #[test]
    fn with_offset_rewrites_only_the_offset() {
        let Instruction::Jump(jump) = jmp(JumpOp::Jne, Register::R4, 9, 0) else {
            panic!("expected jump");
        };
        let moved = jump.with_offset(5);
        assert_eq!(moved.offset(), 5);
        assert_eq!(moved.op(), JumpOp::Jne);
        assert_eq!(moved.dst(), Register::R4);
    }

    #[test]
    fn repro_uses_jump_macros() {
        assert_eq!(
            jmp(JumpOp::Jeq, Register::R1, 0, 2).repro(),
            "BPF_JMP_IMM(BPF_JEQ, r1, 0, 2)"
        );
        assert_eq!(
            jmp32(JumpOp::Jslt, Register::R1, Register::R2, -1).repro(),
            "BPF_JMP32_REG(BPF_JSLT, r1, r2, -1)"
        );
        assert_eq!(ja(4).repro(), "BPF_JMP_A(4)");
    }
}
