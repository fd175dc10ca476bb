//! Instruction decoder for eBPF bytecode.
//!
//! Splits 64-bit words back into their fields and rebuilds [`Instruction`]
//! values, folding each ld_imm64 pair into one instruction.

use crate::encoding::{
    AccessMode, AccessSize, AluOp, InstructionClass, JumpOp, SourceKind, PSEUDO_WORD,
};
use crate::error::DecodeError;
use crate::instruction::{
    AluInstruction, Instruction, JumpInstruction, MemoryInstruction, Source,
};
use crate::register::{Register, PSEUDO_MAP_FD};

/// Raw fields of one 64-bit instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DecodedWord {
    /// Opcode byte (`class | size | mode` or `class | op | source`).
    pub opcode: u8,
    /// Destination register number.
    pub dst: u8,
    /// Source register number.
    pub src: u8,
    /// Signed 16-bit offset.
    pub offset: i16,
    /// Signed 32-bit immediate.
    pub imm: i32,
}

impl DecodedWord {
    /// Instruction class of the opcode.
    #[must_use]
    pub const fn class(&self) -> InstructionClass {
        InstructionClass::from_opcode(self.opcode)
    }

    /// Access size; meaningful for load/store classes only.
    #[must_use]
    pub const fn size(&self) -> AccessSize {
        AccessSize::from_opcode(self.opcode)
    }

    /// Addressing mode; meaningful for load/store classes only.
    #[must_use]
    pub const fn mode(&self) -> Option<AccessMode> {
        AccessMode::from_opcode(self.opcode)
    }
}

/// Splits a word into its fields.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const fn decode_word(word: u64) -> DecodedWord {
    DecodedWord {
        opcode: (word & 0xFF) as u8,
        dst: ((word >> 8) & 0x0F) as u8,
        src: ((word >> 12) & 0x0F) as u8,
        offset: ((word >> 16) & 0xFFFF) as u16 as i16,
        imm: (word >> 32) as u32 as i32,
    }
}

fn register(number: u8, index: usize) -> Result<Register, DecodeError> {
    Register::from_number(number).ok_or(DecodeError::InvalidRegister { index, number })
}

fn source(fields: &DecodedWord, index: usize) -> Result<Source, DecodeError> {
    match SourceKind::from_opcode(fields.opcode) {
        SourceKind::K => Ok(Source::Imm(fields.imm)),
        SourceKind::X => register(fields.src, index).map(Source::Reg),
    }
}

fn decode_alu(fields: &DecodedWord, index: usize) -> Result<Instruction, DecodeError> {
    let op = AluOp::from_opcode(fields.opcode).ok_or(DecodeError::IllegalOpcode {
        index,
        opcode: fields.opcode,
    })?;
    Ok(Instruction::Alu(AluInstruction {
        class: fields.class(),
        op,
        dst: register(fields.dst, index)?,
        src: source(fields, index)?,
    }))
}

fn decode_jump(fields: &DecodedWord, index: usize) -> Result<Instruction, DecodeError> {
    let illegal = DecodeError::IllegalOpcode {
        index,
        opcode: fields.opcode,
    };
    let op = JumpOp::from_opcode(fields.opcode).ok_or(illegal)?;
    let is_jmp64 = matches!(fields.class(), InstructionClass::Jmp);

    match op {
        JumpOp::Call if is_jmp64 => Ok(Instruction::Call { helper: fields.imm }),
        JumpOp::Exit if is_jmp64 => Ok(Instruction::Exit),
        JumpOp::Call | JumpOp::Exit => Err(illegal),
        _ => Ok(Instruction::Jump(JumpInstruction {
            class: fields.class(),
            op,
            dst: register(fields.dst, index)?,
            src: source(fields, index)?,
            offset: fields.offset,
        })),
    }
}

fn decode_memory(fields: &DecodedWord, index: usize) -> Result<Instruction, DecodeError> {
    let mode = fields.mode().ok_or(DecodeError::IllegalOpcode {
        index,
        opcode: fields.opcode,
    })?;
    let class = fields.class();
    let src = if matches!(class, InstructionClass::Ld)
        && matches!(mode, AccessMode::Imm)
        && fields.src == PSEUDO_MAP_FD
    {
        Register::PseudoMapFd
    } else {
        register(fields.src, index)?
    };

    Ok(Instruction::Memory(MemoryInstruction {
        class,
        size: fields.size(),
        mode,
        dst: register(fields.dst, index)?,
        src,
        imm: fields.imm,
        offset: fields.offset,
    }))
}

/// Decodes one instruction starting at `words[index]`.
///
/// # Errors
///
/// Returns [`DecodeError::IndexOutOfBounds`] when `index` is past the end of
/// `words`, or another [`DecodeError`] for illegal opcodes, out-of-range
/// registers, or a malformed ld_imm64 pair.
pub fn decode_at(words: &[u64], index: usize) -> Result<Instruction, DecodeError> {
    let Some(&word) = words.get(index) else {
        return Err(DecodeError::IndexOutOfBounds {
            index,
            len: words.len(),
        });
    };
    let fields = decode_word(word);
    let class = fields.class();

    if class.is_alu() {
        return decode_alu(&fields, index);
    }
    if class.is_jump() {
        return decode_jump(&fields, index);
    }

    let insn = decode_memory(&fields, index)?;
    if insn.word_count() == 2 {
        match words.get(index + 1) {
            None => return Err(DecodeError::TruncatedWideLoad { index }),
            Some(&second) if second != PSEUDO_WORD => {
                return Err(DecodeError::ReservedBitsSet { index });
            }
            Some(_) => {}
        }
    }
    Ok(insn)
}

/// Decodes a whole program back into instructions.
///
/// # Errors
///
/// Returns the first [`DecodeError`] encountered.
pub fn decode_program(words: &[u64]) -> Result<Vec<Instruction>, DecodeError> {
    let mut program = Vec::with_capacity(words.len());
    let mut index = 0;
    while index < words.len() {
        let insn = decode_at(words, index)?;
        index += insn.word_count();
        program.push(insn);
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::{decode_at, decode_program, decode_word};
    use crate::encoding::{InstructionClass, JumpOp};
    use crate::error::DecodeError;
    use crate::instruction::{exit, jmp, ld_map_fd, mem_or64, mov64, st_h};
    use crate::register::Register;

    #[test]
    fn word_fields_are_sign_extended() {
        let fields = decode_word(0xFFFF_FFFE_FFF8_0A7A);
        assert_eq!(fields.opcode, 0x7A);
        assert_eq!(fields.dst, 10);
        assert_eq!(fields.src, 0);
        assert_eq!(fields.offset, -8);
        assert_eq!(fields.imm, -2);
        assert_eq!(fields.class(), InstructionClass::St);
    }

    #[test]
    fn program_roundtrips_through_encode() {
        let program = vec![
            ld_map_fd(Register::R1, 3),
            st_h(Register::R10, 9, -2).expect("fits in i32"),
            mem_or64(Register::R10, Register::R2, -8),
            jmp(JumpOp::Jsge, Register::R0, Register::R1, 1),
            mov64(Register::R0, 0),
            exit(),
        ];
        let words: Vec<u64> = program.iter().flat_map(|insn| insn.encode()).collect();
        assert_eq!(words.len(), 7);
        assert_eq!(decode_program(&words), Ok(program));
    }

    #[test]
    fn truncated_wide_load_is_rejected() {
        let words = ld_map_fd(Register::R1, 3).encode();
        assert_eq!(
            decode_program(&words[..1]),
            Err(DecodeError::TruncatedWideLoad { index: 0 })
        );
    }

    #[test]
    fn index_past_end_is_out_of_bounds() {
        let words = [mov64(Register::R0, 0).encode()[0], exit().encode()[0]];
        assert_eq!(decode_at(&words, 1), Ok(exit()));
        assert_eq!(
            decode_at(&words, 2),
            Err(DecodeError::IndexOutOfBounds { index: 2, len: 2 })
        );
        assert_eq!(
            decode_at(&[], 0),
            Err(DecodeError::IndexOutOfBounds { index: 0, len: 0 })
        );
    }

    #[test]
    fn non_zero_second_word_is_rejected() {
        let mut words = ld_map_fd(Register::R1, 3).encode();
        words[1] = 1;
        assert_eq!(
            decode_program(&words),
            Err(DecodeError::ReservedBitsSet { index: 0 })
        );
    }

    #[test]
    fn illegal_opcodes_and_registers_are_reported() {
        assert_eq!(
            decode_program(&[0xE7]),
            Err(DecodeError::IllegalOpcode {
                index: 0,
                opcode: 0xE7
            })
        );
        // exit is only defined for the 64-bit jump class
        assert_eq!(
            decode_program(&[0x96]),
            Err(DecodeError::IllegalOpcode {
                index: 0,
                opcode: 0x96
            })
        );
        assert_eq!(
            decode_program(&[0x0FB7]),
            Err(DecodeError::InvalidRegister {
                index: 0,
                number: 15
            })
        );
    }
}
