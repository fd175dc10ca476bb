use super::Instruction;
use crate::encoding::{
    encode_word, memory_opcode, AccessMode, AccessSize, AtomicOp, InstructionClass, PSEUDO_WORD,
};
use crate::error::BuildError;
use crate::register::Register;

/// Load, store, atomic or 64-bit immediate load.
///
/// `src` and `imm` are always populated. Which one carries meaning depends on
/// the class and mode; the other holds a harmless default (`r0` or `0`).
/// On the map-fd pseudo-load, `src` holds [`Register::PseudoMapFd`], which the
/// verifier reads as "`imm` is a map file descriptor".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemoryInstruction {
    pub(crate) class: InstructionClass,
    pub(crate) size: AccessSize,
    pub(crate) mode: AccessMode,
    pub(crate) dst: Register,
    pub(crate) src: Register,
    pub(crate) imm: i32,
    pub(crate) offset: i16,
}

impl MemoryInstruction {
    /// One of `LD`, `LDX`, `ST`, `STX`.
    #[must_use]
    pub const fn class(&self) -> InstructionClass {
        self.class
    }

    /// Access width.
    #[must_use]
    pub const fn size(&self) -> AccessSize {
        self.size
    }

    /// Addressing mode.
    #[must_use]
    pub const fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Destination (base register for stores).
    #[must_use]
    pub const fn dst(&self) -> Register {
        self.dst
    }

    /// Source register, or the pseudo sentinel on map-fd loads.
    #[must_use]
    pub const fn src(&self) -> Register {
        self.src
    }

    /// Immediate: stored value, map fd, or atomic operation selector.
    #[must_use]
    pub const fn imm(&self) -> i32 {
        self.imm
    }

    /// Memory offset relative to the base register.
    #[must_use]
    pub const fn offset(&self) -> i16 {
        self.offset
    }

    /// Returns true for `BPF_LD | BPF_IMM`, the only two-word form.
    #[must_use]
    pub const fn is_wide_load(&self) -> bool {
        matches!(self.class, InstructionClass::Ld) && matches!(self.mode, AccessMode::Imm)
    }

    /// Decodes the atomic operation and fetch flag, if this is an atomic.
    #[must_use]
    pub const fn atomic_op(&self) -> Option<(AtomicOp, bool)> {
        if matches!(self.mode, AccessMode::Atomic) {
            AtomicOp::from_selector(self.imm)
        } else {
            None
        }
    }

    pub(super) const fn word_count(&self) -> usize {
        if self.is_wide_load() {
            2
        } else {
            1
        }
    }

    pub(super) fn encode(&self) -> Vec<u64> {
        let mut words = Vec::with_capacity(self.word_count());
        words.push(encode_word(
            memory_opcode(self.class, self.size, self.mode),
            self.dst.number(),
            self.src.number(),
            self.offset,
            self.imm,
        ));

        // ld_imm64 occupies two slots; the verifier reads the upper 32 bits
        // of the immediate from the second one (always zero here).
        if self.is_wide_load() {
            words.push(PSEUDO_WORD);
        }
        words
    }

    pub(super) fn repro(&self) -> String {
        if self.is_wide_load() {
            return format!("BPF_LD_MAP_FD(/*dst=*/{}, map_fd)", self.dst);
        }

        if let Some((op, fetch)) = self.atomic_op() {
            let op_name = if fetch {
                format!("{} | BPF_FETCH", op.macro_name())
            } else {
                op.macro_name().to_string()
            };
            return format!(
                "BPF_ATOMIC_OP({}, {op_name}, /*dst=*/{}, /*src=*/{}, /*offset=*/{})",
                self.size.macro_name(),
                self.dst,
                self.src,
                self.offset
            );
        }

        match self.class {
            InstructionClass::Stx | InstructionClass::Ldx => format!(
                "BPF_MEM_OPERATION({}, {}, /*dst=*/{}, /*src=*/{}, /*offset=*/{})",
                self.class.macro_name(),
                self.size.macro_name(),
                self.dst,
                self.src,
                self.offset
            ),
            _ => format!(
                "BPF_MEM_IMM_OPERATION({}, {}, /*dst=*/{}, /*imm=*/{}, /*offset=*/{})",
                self.class.macro_name(),
                self.size.macro_name(),
                self.dst,
                self.imm,
                self.offset
            ),
        }
    }
}

/// Value stored by a store instruction: an integer constant or a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StoreSource {
    /// Integer constant; must fit the 32-bit immediate.
    Imm(i64),
    /// Register whose value is stored.
    Reg(Register),
}

macro_rules! store_source_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for StoreSource {
                fn from(value: $ty) -> Self {
                    Self::Imm(i64::from(value))
                }
            }
        )*
    };
}

store_source_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<Register> for StoreSource {
    fn from(value: Register) -> Self {
        Self::Reg(value)
    }
}

fn store(
    size: AccessSize,
    dst: Register,
    src: StoreSource,
    offset: i16,
) -> Result<Instruction, BuildError> {
    let (class, src, imm) = match src {
        StoreSource::Imm(value) => {
            let imm = i32::try_from(value).map_err(|_| BuildError::ImmediateOutOfRange(value))?;
            (InstructionClass::St, Register::R0, imm)
        }
        StoreSource::Reg(reg) => (InstructionClass::Stx, reg, 0),
    };

    Ok(Instruction::Memory(MemoryInstruction {
        class,
        size,
        mode: AccessMode::Mem,
        dst,
        src,
        imm,
        offset,
    }))
}

/// Stores 8 bytes of `src` at `dst + offset`.
///
/// # Errors
///
/// Returns [`BuildError::ImmediateOutOfRange`] when an integer `src` does not
/// fit in 32 bits.
pub fn st_dw(
    dst: Register,
    src: impl Into<StoreSource>,
    offset: i16,
) -> Result<Instruction, BuildError> {
    store(AccessSize::Dw, dst, src.into(), offset)
}

/// Stores 4 bytes of `src` at `dst + offset`.
///
/// # Errors
///
/// Returns [`BuildError::ImmediateOutOfRange`] when an integer `src` does not
/// fit in 32 bits.
pub fn st_w(
    dst: Register,
    src: impl Into<StoreSource>,
    offset: i16,
) -> Result<Instruction, BuildError> {
    store(AccessSize::W, dst, src.into(), offset)
}

/// Stores 2 bytes of `src` at `dst + offset`.
///
/// # Errors
///
/// Returns [`BuildError::ImmediateOutOfRange`] when an integer `src` does not
/// fit in 32 bits.
pub fn st_h(
    dst: Register,
    src: impl Into<StoreSource>,
    offset: i16,
) -> Result<Instruction, BuildError> {
    store(AccessSize::H, dst, src.into(), offset)
}

/// Stores 1 byte of `src` at `dst + offset`.
///
/// # Errors
///
/// Returns [`BuildError::ImmediateOutOfRange`] when an integer `src` does not
/// fit in 32 bits.
pub fn st_b(
    dst: Register,
    src: impl Into<StoreSource>,
    offset: i16,
) -> Result<Instruction, BuildError> {
    store(AccessSize::B, dst, src.into(), offset)
}

const fn load(size: AccessSize, dst: Register, src: Register, offset: i16) -> Instruction {
    Instruction::Memory(MemoryInstruction {
        class: InstructionClass::Ldx,
        size,
        mode: AccessMode::Mem,
        dst,
        src,
        imm: 0,
        offset,
    })
}

/// Loads 8 bytes from `src + offset` into `dst`.
#[must_use]
pub const fn ld_dw(dst: Register, src: Register, offset: i16) -> Instruction {
    load(AccessSize::Dw, dst, src, offset)
}

/// Loads 4 bytes from `src + offset` into `dst`.
#[must_use]
pub const fn ld_w(dst: Register, src: Register, offset: i16) -> Instruction {
    load(AccessSize::W, dst, src, offset)
}

/// Loads 2 bytes from `src + offset` into `dst`.
#[must_use]
pub const fn ld_h(dst: Register, src: Register, offset: i16) -> Instruction {
    load(AccessSize::H, dst, src, offset)
}

/// Loads 1 byte from `src + offset` into `dst`.
#[must_use]
pub const fn ld_b(dst: Register, src: Register, offset: i16) -> Instruction {
    load(AccessSize::B, dst, src, offset)
}

/// Loads a pointer to the map named by file descriptor `fd` into `dst`.
///
/// Encodes as `BPF_LD | BPF_IMM | BPF_DW` with the pseudo map-fd tag in the
/// source slot, followed by a zero second word.
#[must_use]
pub const fn ld_map_fd(dst: Register, fd: i32) -> Instruction {
    Instruction::Memory(MemoryInstruction {
        class: InstructionClass::Ld,
        size: AccessSize::Dw,
        mode: AccessMode::Imm,
        dst,
        src: Register::PseudoMapFd,
        imm: fd,
        offset: 0,
    })
}

/// Atomic `*(size *)(dst + offset) op= src`, optionally fetching the old value into `src`.
#[must_use]
pub const fn atomic(
    size: AccessSize,
    op: AtomicOp,
    fetch: bool,
    dst: Register,
    src: Register,
    offset: i16,
) -> Instruction {
    Instruction::Memory(MemoryInstruction {
        class: InstructionClass::Stx,
        size,
        mode: AccessMode::Atomic,
        dst,
        src,
        imm: op.selector(fetch),
        offset,
    })
}

macro_rules! atomic_helpers {
    ($($name:ident => $size:ident, $op:ident;)*) => {
        $(
            #[doc = concat!(
                "Atomic ",
                stringify!($op),
                " of `src` into the ",
                stringify!($size),
                "-sized value at `dst + offset`."
            )]
            #[must_use]
            pub const fn $name(dst: Register, src: Register, offset: i16) -> Instruction {
                atomic(AccessSize::$size, AtomicOp::$op, false, dst, src, offset)
            }
        )*
    };
}

atomic_helpers! {
    mem_add => W, Add;
    mem_add64 => Dw, Add;
    mem_or => W, Or;
    mem_or64 => Dw, Or;
    mem_and => W, And;
    mem_and64 => Dw, And;
    mem_xor => W, Xor;
    mem_xor64 => Dw, Xor;
}

#[cfg(test)]
mod tests {
    use super::{ld_dw, ld_map_fd, mem_add64, mem_xor, st_b, st_dw, st_w, StoreSource};
    use crate::encoding::{AccessMode, AccessSize, AtomicOp, InstructionClass};
    use crate::error::BuildError;
    use crate::instruction::Instruction;
    use crate::register::Register;

    fn memory(insn: Instruction) -> super::MemoryInstruction {
        match insn {
            Instruction::Memory(mem) => mem,
            other => panic!("expected memory instruction, got {other:?}"),
        }
    }

    #[test]
    fn integer_store_selects_st_class_with_r0_source() {
        let mem = memory(st_dw(Register::R10, 42, -8).expect("fits in i32"));
        assert_eq!(mem.class(), InstructionClass::St);
        assert_eq!(mem.src(), Register::R0);
        assert_eq!(mem.imm(), 42);
        assert_eq!(mem.mode(), AccessMode::Mem);
        assert_eq!(mem.encode(), vec![0x2A_FFF8_0A7A]);
    }

    #[test]
    fn register_store_selects_stx_class_with_zero_immediate() {
        let mem = memory(st_w(Register::R10, Register::R3, -4).expect("register source"));
        assert_eq!(mem.class(), InstructionClass::Stx);
        assert_eq!(mem.src(), Register::R3);
        assert_eq!(mem.imm(), 0);
        assert_eq!(mem.size(), AccessSize::W);
    }

    #[test]
    fn oversized_integer_store_produces_no_instruction() {
        let value = i64::from(i32::MAX) + 1;
        assert_eq!(
            st_b(Register::R1, value, 0),
            Err(BuildError::ImmediateOutOfRange(value))
        );
        assert!(st_b(Register::R1, StoreSource::Imm(i64::from(i32::MIN)), 0).is_ok());
    }

    #[test]
    fn load_uses_ldx_mem() {
        let insn = ld_dw(Register::R2, Register::R10, -16);
        assert_eq!(insn.encode(), vec![0xFFF0_A279]);
        assert_eq!(
            insn.repro(),
            "BPF_MEM_OPERATION(BPF_LDX, BPF_DW, /*dst=*/r2, /*src=*/r10, /*offset=*/-16)"
        );
    }

    #[test]
    fn map_fd_load_emits_trailing_zero_word() {
        let words = ld_map_fd(Register::R1, 7).encode();
        assert_eq!(words, vec![0x0000_0007_0000_1118, 0]);
        assert_eq!(
            ld_map_fd(Register::R1, 7).repro(),
            "BPF_LD_MAP_FD(/*dst=*/r1, map_fd)"
        );
    }

    #[test]
    fn atomic_helpers_encode_selector_and_width() {
        let add = memory(mem_add64(Register::R1, Register::R2, 8));
        assert_eq!(add.atomic_op(), Some((AtomicOp::Add, false)));
        assert_eq!(add.encode(), vec![0x0008_21DB]);

        let xor = memory(mem_xor(Register::R1, Register::R2, 0));
        assert_eq!(xor.size(), AccessSize::W);
        assert_eq!(xor.imm(), 0xA0);
        assert_eq!(
            xor.repro(),
            "BPF_ATOMIC_OP(BPF_W, BPF_XOR, /*dst=*/r1, /*src=*/r2, /*offset=*/0)"
        );
    }

    #[test]
    fn store_immediate_repro_prints_value() {
        let insn = st_dw(Register::R10, -1, -8).expect("fits in i32");
        assert_eq!(
            insn.repro(),
            "BPF_MEM_IMM_OPERATION(BPF_ST, BPF_DW, /*dst=*/r10, /*imm=*/-1, /*offset=*/-8)"
        );
    }
}
