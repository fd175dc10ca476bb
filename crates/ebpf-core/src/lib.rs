//! eBPF instruction model for the program fuzzer.

/// Register identities and the pseudo map-fd sentinel.
pub mod register;
pub use register::{Register, PSEUDO_MAP_FD, REGISTER_COUNT};

/// Opcode field tables and word packing.
pub mod encoding;
pub use encoding::{
    encode_word, memory_opcode, AccessMode, AccessSize, AluOp, AtomicOp, InstructionClass,
    JumpOp, SourceKind, ALU_OP_TABLE, ATOMIC_FETCH, CLASS_TABLE, JUMP_OP_TABLE, PSEUDO_WORD,
};

/// Instruction variants, factories, and their bytecode/reproduction output.
pub mod instruction;
pub use instruction::{Instruction, Source, StoreSource};

/// Word decoding back into instructions.
pub mod decoder;
pub use decoder::{decode_at, decode_program, decode_word, DecodedWord};

/// Construction and decode error types.
pub mod error;
pub use error::{BuildError, DecodeError};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
