/// Mask selecting the instruction class from an opcode byte.
pub const CLASS_MASK: u8 = 0x07;
/// Mask selecting the access size of a load/store opcode.
pub const SIZE_MASK: u8 = 0x18;
/// Mask selecting the addressing mode of a load/store opcode.
pub const MODE_MASK: u8 = 0xE0;
/// Mask selecting the operation nibble of an ALU/JMP opcode.
pub const OP_MASK: u8 = 0xF0;
/// Source-operand bit of an ALU/JMP opcode.
pub const SOURCE_MASK: u8 = 0x08;
/// Second word of a 64-bit immediate load; the upper immediate half is zero.
pub const PSEUDO_WORD: u64 = 0;
/// Atomic immediate flag requesting the old value back in `src`.
pub const ATOMIC_FETCH: i32 = 0x01;

/// Instruction classes (`opcode & 0x07`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum InstructionClass {
    Ld = 0x00,
    Ldx = 0x01,
    St = 0x02,
    Stx = 0x03,
    Alu = 0x04,
    Jmp = 0x05,
    Jmp32 = 0x06,
    Alu64 = 0x07,
}

/// Single source-of-truth class table: `(bits, class, macro name)`.
pub const CLASS_TABLE: &[(u8, InstructionClass, &str)] = &[
    (0x00, InstructionClass::Ld, "BPF_LD"),
    (0x01, InstructionClass::Ldx, "BPF_LDX"),
    (0x02, InstructionClass::St, "BPF_ST"),
    (0x03, InstructionClass::Stx, "BPF_STX"),
    (0x04, InstructionClass::Alu, "BPF_ALU"),
    (0x05, InstructionClass::Jmp, "BPF_JMP"),
    (0x06, InstructionClass::Jmp32, "BPF_JMP32"),
    (0x07, InstructionClass::Alu64, "BPF_ALU64"),
];

impl InstructionClass {
    /// Extracts the class from an opcode byte. Every 3-bit value is assigned.
    #[must_use]
    pub const fn from_opcode(opcode: u8) -> Self {
        match opcode & CLASS_MASK {
            0x00 => Self::Ld,
            0x01 => Self::Ldx,
            0x02 => Self::St,
            0x03 => Self::Stx,
            0x04 => Self::Alu,
            0x05 => Self::Jmp,
            0x06 => Self::Jmp32,
            _ => Self::Alu64,
        }
    }

    /// Returns the raw class bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Reproduction macro name, e.g. `BPF_STX`.
    #[must_use]
    pub fn macro_name(self) -> &'static str {
        CLASS_TABLE
            .iter()
            .find_map(|(_, class, name)| (*class == self).then_some(*name))
            .unwrap_or("unknown")
    }

    /// Load/store classes use the size/mode layout.
    #[must_use]
    pub const fn is_memory(self) -> bool {
        matches!(self, Self::Ld | Self::Ldx | Self::St | Self::Stx)
    }

    /// ALU classes use the op/source layout.
    #[must_use]
    pub const fn is_alu(self) -> bool {
        matches!(self, Self::Alu | Self::Alu64)
    }

    /// Jump classes use the op/source layout.
    #[must_use]
    pub const fn is_jump(self) -> bool {
        matches!(self, Self::Jmp | Self::Jmp32)
    }
}

/// Load/store access widths (`opcode & 0x18`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum AccessSize {
    /// 4 bytes.
    W = 0x00,
    /// 2 bytes (half word).
    H = 0x08,
    /// 1 byte.
    B = 0x10,
    /// 8 bytes (double word).
    Dw = 0x18,
}

impl AccessSize {
    /// Extracts the access size from an opcode byte.
    #[must_use]
    pub const fn from_opcode(opcode: u8) -> Self {
        match opcode & SIZE_MASK {
            0x00 => Self::W,
            0x08 => Self::H,
            0x10 => Self::B,
            _ => Self::Dw,
        }
    }

    /// Returns the raw size bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Width of the access in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::B => 1,
            Self::H => 2,
            Self::W => 4,
            Self::Dw => 8,
        }
    }

    /// Reproduction macro name, e.g. `BPF_DW`.
    #[must_use]
    pub const fn macro_name(self) -> &'static str {
        match self {
            Self::W => "BPF_W",
            Self::H => "BPF_H",
            Self::B => "BPF_B",
            Self::Dw => "BPF_DW",
        }
    }
}

/// Load/store addressing modes (`opcode & 0xE0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum AccessMode {
    /// 64-bit immediate pseudo-load (`BPF_LD | BPF_IMM | BPF_DW`).
    Imm = 0x00,
    /// Legacy packet access, absolute offset.
    Abs = 0x20,
    /// Legacy packet access, register-relative offset.
    Ind = 0x40,
    /// Plain memory access.
    Mem = 0x60,
    /// Atomic read-modify-write; the operation sits in `imm`.
    Atomic = 0xC0,
}

impl AccessMode {
    /// Extracts the mode from an opcode byte; unassigned modes yield `None`.
    #[must_use]
    pub const fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode & MODE_MASK {
            0x00 => Some(Self::Imm),
            0x20 => Some(Self::Abs),
            0x40 => Some(Self::Ind),
            0x60 => Some(Self::Mem),
            0xC0 => Some(Self::Atomic),
            _ => None,
        }
    }

    /// Returns the raw mode bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Operand source selector for ALU and JMP classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum SourceKind {
    /// 32-bit immediate (`BPF_K`).
    K = 0x00,
    /// Source register (`BPF_X`).
    X = 0x08,
}

impl SourceKind {
    /// Extracts the source selector from an opcode byte.
    #[must_use]
    pub const fn from_opcode(opcode: u8) -> Self {
        if opcode & SOURCE_MASK == 0 {
            Self::K
        } else {
            Self::X
        }
    }
}

/// ALU operations (`opcode & 0xF0` for ALU/ALU64 classes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum AluOp {
    Add = 0x00,
    Sub = 0x10,
    Mul = 0x20,
    Div = 0x30,
    Or = 0x40,
    And = 0x50,
    Lsh = 0x60,
    Rsh = 0x70,
    Neg = 0x80,
    Mod = 0x90,
    Xor = 0xA0,
    Mov = 0xB0,
    Arsh = 0xC0,
    End = 0xD0,
}

/// ALU operation table: `(bits, op, macro name)`.
pub const ALU_OP_TABLE: &[(u8, AluOp, &str)] = &[
    (0x00, AluOp::Add, "BPF_ADD"),
    (0x10, AluOp::Sub, "BPF_SUB"),
    (0x20, AluOp::Mul, "BPF_MUL"),
    (0x30, AluOp::Div, "BPF_DIV"),
    (0x40, AluOp::Or, "BPF_OR"),
    (0x50, AluOp::And, "BPF_AND"),
    (0x60, AluOp::Lsh, "BPF_LSH"),
    (0x70, AluOp::Rsh, "BPF_RSH"),
    (0x80, AluOp::Neg, "BPF_NEG"),
    (0x90, AluOp::Mod, "BPF_MOD"),
    (0xA0, AluOp::Xor, "BPF_XOR"),
    (0xB0, AluOp::Mov, "BPF_MOV"),
    (0xC0, AluOp::Arsh, "BPF_ARSH"),
    (0xD0, AluOp::End, "BPF_END"),
];

impl AluOp {
    /// Extracts the ALU operation from an opcode byte.
    #[must_use]
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        ALU_OP_TABLE
            .iter()
            .find_map(|(bits, op, _)| (*bits == opcode & OP_MASK).then_some(*op))
    }

    /// Returns the raw operation bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Reproduction macro name, e.g. `BPF_ADD`.
    #[must_use]
    pub fn macro_name(self) -> &'static str {
        ALU_OP_TABLE
            .iter()
            .find_map(|(_, op, name)| (*op == self).then_some(*name))
            .unwrap_or("unknown")
    }
}

/// Jump operations (`opcode & 0xF0` for JMP/JMP32 classes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum JumpOp {
    Ja = 0x00,
    Jeq = 0x10,
    Jgt = 0x20,
    Jge = 0x30,
    Jset = 0x40,
    Jne = 0x50,
    Jsgt = 0x60,
    Jsge = 0x70,
    Call = 0x80,
    Exit = 0x90,
    Jlt = 0xA0,
    Jle = 0xB0,
    Jslt = 0xC0,
    Jsle = 0xD0,
}

/// Jump operation table: `(bits, op, macro name)`.
pub const JUMP_OP_TABLE: &[(u8, JumpOp, &str)] = &[
    (0x00, JumpOp::Ja, "BPF_JA"),
    (0x10, JumpOp::Jeq, "BPF_JEQ"),
    (0x20, JumpOp::Jgt, "BPF_JGT"),
    (0x30, JumpOp::Jge, "BPF_JGE"),
    (0x40, JumpOp::Jset, "BPF_JSET"),
    (0x50, JumpOp::Jne, "BPF_JNE"),
    (0x60, JumpOp::Jsgt, "BPF_JSGT"),
    (0x70, JumpOp::Jsge, "BPF_JSGE"),
    (0x80, JumpOp::Call, "BPF_CALL"),
    (0x90, JumpOp::Exit, "BPF_EXIT"),
    (0xA0, JumpOp::Jlt, "BPF_JLT"),
    (0xB0, JumpOp::Jle, "BPF_JLE"),
    (0xC0, JumpOp::Jslt, "BPF_JSLT"),
    (0xD0, JumpOp::Jsle, "BPF_JSLE"),
];

impl JumpOp {
    /// Extracts the jump operation from an opcode byte.
    #[must_use]
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        JUMP_OP_TABLE
            .iter()
            .find_map(|(bits, op, _)| (*bits == opcode & OP_MASK).then_some(*op))
    }

    /// Returns the raw operation bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Reproduction macro name, e.g. `BPF_JEQ`.
    #[must_use]
    pub fn macro_name(self) -> &'static str {
        JUMP_OP_TABLE
            .iter()
            .find_map(|(_, op, name)| (*op == self).then_some(*name))
            .unwrap_or("unknown")
    }

    /// Conditional jumps compare `dst` against a source operand.
    #[must_use]
    pub const fn is_conditional(self) -> bool {
        !matches!(self, Self::Ja | Self::Call | Self::Exit)
    }
}

/// Atomic read-modify-write operations carried in the `imm` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum AtomicOp {
    Add = 0x00,
    Or = 0x40,
    And = 0x50,
    Xor = 0xA0,
}

impl AtomicOp {
    /// Operation selector as stored in `imm`, optionally with the fetch flag.
    #[must_use]
    pub const fn selector(self, fetch: bool) -> i32 {
        let base = self as i32;
        if fetch {
            base | ATOMIC_FETCH
        } else {
            base
        }
    }

    /// Decodes an `imm` selector, returning the operation and its fetch flag.
    #[must_use]
    pub const fn from_selector(imm: i32) -> Option<(Self, bool)> {
        let fetch = imm & ATOMIC_FETCH != 0;
        let op = match imm & !ATOMIC_FETCH {
            0x00 => Self::Add,
            0x40 => Self::Or,
            0x50 => Self::And,
            0xA0 => Self::Xor,
            _ => return None,
        };
        Some((op, fetch))
    }

    /// Reproduction macro name, e.g. `BPF_XOR`.
    #[must_use]
    pub const fn macro_name(self) -> &'static str {
        match self {
            Self::Add => "BPF_ADD",
            Self::Or => "BPF_OR",
            Self::And => "BPF_AND",
            Self::Xor => "BPF_XOR",
        }
    }
}

/// Packs one `struct bpf_insn` into a 64-bit word.
///
/// Bit layout (little-endian struct viewed as `u64`):
/// `[IMM:32][OFF:16][SRC:4][DST:4][OPCODE:8]`
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn encode_word(opcode: u8, dst: u8, src: u8, offset: i16, imm: i32) -> u64 {
    let imm_part = (imm as u32 as u64) << 32;
    let off_part = (offset as u16 as u64) << 16;
    let src_part = ((src & 0x0F) as u64) << 12;
    let dst_part = ((dst & 0x0F) as u64) << 8;
    imm_part | off_part | src_part | dst_part | opcode as u64
}

/// Builds a load/store opcode byte from its three fields.
#[must_use]
pub const fn memory_opcode(class: InstructionClass, size: AccessSize, mode: AccessMode) -> u8 {
    class.bits() | size.bits() | mode.bits()
}
