use super::{Instruction, Source};
use crate::encoding::{encode_word, AluOp, InstructionClass};
use crate::register::Register;

/// Arithmetic/logic instruction on 32-bit (`BPF_ALU`) or 64-bit (`BPF_ALU64`) operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AluInstruction {
    pub(crate) class: InstructionClass,
    pub(crate) op: AluOp,
    pub(crate) dst: Register,
    pub(crate) src: Source,
}

impl AluInstruction {
    /// `BPF_ALU` or `BPF_ALU64`.
    #[must_use]
    pub const fn class(&self) -> InstructionClass {
        self.class
    }

    /// The arithmetic operation.
    #[must_use]
    pub const fn op(&self) -> AluOp {
        self.op
    }

    /// Destination register.
    #[must_use]
    pub const fn dst(&self) -> Register {
        self.dst
    }

    /// Immediate or register operand.
    #[must_use]
    pub const fn src(&self) -> Source {
        self.src
    }

    pub(super) const fn encode(&self) -> u64 {
        encode_word(
            self.class.bits() | self.op.bits() | self.src.kind() as u8,
            self.dst.number(),
            self.src.register_number(),
            0,
            self.src.immediate(),
        )
    }

    pub(super) fn repro(&self) -> String {
        let width = if matches!(self.class, InstructionClass::Alu64) {
            "ALU64"
        } else {
            "ALU32"
        };
        let form = match self.src {
            Source::Imm(_) => "IMM",
            Source::Reg(_) => "REG",
        };
        format!(
            "BPF_{width}_{form}({}, {}, {})",
            self.op.macro_name(),
            self.dst,
            self.src.operand_text()
        )
    }
}

/// Builds a 64-bit ALU instruction.
#[must_use]
pub fn alu64(op: AluOp, dst: Register, src: impl Into<Source>) -> Instruction {
    Instruction::Alu(AluInstruction {
        class: InstructionClass::Alu64,
        op,
        dst,
        src: src.into(),
    })
}

/// Builds a 32-bit ALU instruction.
#[must_use]
pub fn alu32(op: AluOp, dst: Register, src: impl Into<Source>) -> Instruction {
    Instruction::Alu(AluInstruction {
        class: InstructionClass::Alu,
        op,
        dst,
        src: src.into(),
    })
}

macro_rules! alu_shorthands {
    ($($op:ident => $name64:ident, $name32:ident;)*) => {
        $(
            #[doc = concat!("`dst ", stringify!($op), "= src` on 64-bit operands.")]
            #[must_use]
            pub fn $name64(dst: Register, src: impl Into<Source>) -> Instruction {
                alu64(AluOp::$op, dst, src)
            }

            #[doc = concat!("`dst ", stringify!($op), "= src` on 32-bit operands.")]
            #[must_use]
            pub fn $name32(dst: Register, src: impl Into<Source>) -> Instruction {
                alu32(AluOp::$op, dst, src)
            }
        )*
    };
}

alu_shorthands! {
    Add => add64, add32;
    Sub => sub64, sub32;
    Mul => mul64, mul32;
    Div => div64, div32;
    Or => or64, or32;
    And => and64, and32;
    Lsh => lsh64, lsh32;
    Rsh => rsh64, rsh32;
    Mod => mod64, mod32;
    Xor => xor64, xor32;
    Mov => mov64, mov32;
    Arsh => arsh64, arsh32;
}

/// `dst = -dst` on 64-bit operands.
#[must_use]
pub fn neg64(dst: Register) -> Instruction {
    alu64(AluOp::Neg, dst, 0)
}

/// `dst = -dst` on 32-bit operands.
#[must_use]
pub fn neg32(dst: Register) -> Instruction {
    alu32(AluOp::Neg, dst, 0)
}

#[cfg(test)]
mod tests {
    use super::{add64, mov32, mov64, neg64};
    use crate::encoding::InstructionClass;
    use crate::register::Register;

    #[test]
    fn mov_immediate_matches_kernel_encoding() {
        // BPF_ALU64 | BPF_MOV | BPF_K, dst r0, imm 0
        assert_eq!(mov64(Register::R0, 0).encode(), vec![0xB7]);
        // imm = -1 lands in the top 32 bits
        assert_eq!(
            mov64(Register::R2, -1).encode(),
            vec![0xFFFF_FFFF_0000_02B7]
        );
    }

    #[test]
    fn register_form_sets_source_bit_and_field() {
        let word = add64(Register::R1, Register::R9).encode()[0];
        assert_eq!(word & 0xFF, 0x0F);
        assert_eq!((word >> 8) & 0x0F, 1);
        assert_eq!((word >> 12) & 0x0F, 9);
        assert_eq!(word >> 32, 0);
    }

    #[test]
    fn alu32_uses_alu_class() {
        let insn = mov32(Register::R3, 5);
        assert_eq!(insn.class(), InstructionClass::Alu);
        assert_eq!(insn.encode()[0] & 0xFF, 0xB4);
    }

    #[test]
    fn repro_names_width_form_and_operands() {
        assert_eq!(mov64(Register::R0, 0).repro(), "BPF_ALU64_IMM(BPF_MOV, r0, 0)");
        assert_eq!(
            add64(Register::R1, Register::R2).repro(),
            "BPF_ALU64_REG(BPF_ADD, r1, r2)"
        );
        assert_eq!(mov32(Register::R4, -3).repro(), "BPF_ALU32_IMM(BPF_MOV, r4, -3)");
        assert_eq!(neg64(Register::R5).repro(), "BPF_ALU64_IMM(BPF_NEG, r5, 0)");
    }
}
