use thiserror::Error;

/// Outcome of a factory asked to build an instruction from an operand it
/// cannot encode. No instruction exists when this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BuildError {
    /// Integer operand does not fit the signed 32-bit immediate field.
    #[error("immediate operand {0} does not fit in 32 bits")]
    ImmediateOutOfRange(i64),
}

/// Failure decoding a stream of instruction words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DecodeError {
    /// Decoding was asked to start past the end of the stream.
    #[error("word index {index} is past the end of a {len}-word stream")]
    IndexOutOfBounds {
        /// Requested word index.
        index: usize,
        /// Number of words in the stream.
        len: usize,
    },
    /// A 64-bit immediate load was the last word of the stream.
    #[error("64-bit immediate load at word {index} is missing its second word")]
    TruncatedWideLoad {
        /// Word index of the primary word.
        index: usize,
    },
    /// The reserved fields of the second ld_imm64 word are not zero.
    #[error("second word of 64-bit immediate load at word {index} has reserved bits set")]
    ReservedBitsSet {
        /// Word index of the primary word.
        index: usize,
    },
    /// Opcode names no assigned class/mode/operation combination.
    #[error("illegal opcode 0x{opcode:02X} at word {index}")]
    IllegalOpcode {
        /// Word index of the offending word.
        index: usize,
        /// The opcode byte.
        opcode: u8,
    },
    /// Register field above `r10`.
    #[error("invalid register number {number} at word {index}")]
    InvalidRegister {
        /// Word index of the offending word.
        index: usize,
        /// The raw 4-bit register number.
        number: u8,
    },
}
