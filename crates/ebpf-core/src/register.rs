use std::fmt;

/// Number of architecturally visible eBPF registers (`R0..=R10`).
pub const REGISTER_COUNT: usize = 11;

/// Source-register value that tags a 64-bit immediate load as a map file
/// descriptor (`BPF_PSEUDO_MAP_FD`).
pub const PSEUDO_MAP_FD: u8 = 1;

/// eBPF register identifier.
///
/// `R0` holds helper and program return values, `R1..=R9` are general
/// purpose and `R10` is the read-only frame pointer. [`Register::PseudoMapFd`]
/// is not an operand: it only ever appears in the source slot of a map-fd
/// load, where the verifier reads it as a mode discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    PseudoMapFd,
}

impl Register {
    /// Ordered list of all real registers.
    pub const ALL: [Self; REGISTER_COUNT] = [
        Self::R0,
        Self::R1,
        Self::R2,
        Self::R3,
        Self::R4,
        Self::R5,
        Self::R6,
        Self::R7,
        Self::R8,
        Self::R9,
        Self::R10,
    ];

    /// Alias for the frame pointer.
    pub const FP: Self = Self::R10;

    /// Returns the 4-bit register number packed into `dst`/`src` fields.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::R0 => 0,
            Self::R1 => 1,
            Self::R2 => 2,
            Self::R3 => 3,
            Self::R4 => 4,
            Self::R5 => 5,
            Self::R6 => 6,
            Self::R7 => 7,
            Self::R8 => 8,
            Self::R9 => 9,
            Self::R10 => 10,
            Self::PseudoMapFd => PSEUDO_MAP_FD,
        }
    }

    /// Decodes a register field into a real register.
    ///
    /// The pseudo sentinel shares its number with `R1` and is never returned.
    #[must_use]
    pub const fn from_number(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::R0),
            1 => Some(Self::R1),
            2 => Some(Self::R2),
            3 => Some(Self::R3),
            4 => Some(Self::R4),
            5 => Some(Self::R5),
            6 => Some(Self::R6),
            7 => Some(Self::R7),
            8 => Some(Self::R8),
            9 => Some(Self::R9),
            10 => Some(Self::R10),
            _ => None,
        }
    }

    /// Canonical text form used in reproduction macros.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::R0 => "r0",
            Self::R1 => "r1",
            Self::R2 => "r2",
            Self::R3 => "r3",
            Self::R4 => "r4",
            Self::R5 => "r5",
            Self::R6 => "r6",
            Self::R7 => "r7",
            Self::R8 => "r8",
            Self::R9 => "r9",
            Self::R10 => "r10",
            Self::PseudoMapFd => "PSEUDO_MAP_FD",
        }
    }

    /// Returns true for the frame pointer, which programs may read but never write.
    #[must_use]
    pub const fn is_frame_pointer(self) -> bool {
        matches!(self, Self::R10)
    }

    /// Returns true for the pseudo sentinel.
    #[must_use]
    pub const fn is_pseudo(self) -> bool {
        matches!(self, Self::PseudoMapFd)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::{Register, PSEUDO_MAP_FD, REGISTER_COUNT};

    #[test]
    fn real_registers_roundtrip_through_their_number() {
        for (index, reg) in Register::ALL.iter().enumerate() {
            assert_eq!(usize::from(reg.number()), index);
            assert_eq!(Register::from_number(reg.number()), Some(*reg));
        }
        assert_eq!(Register::ALL.len(), REGISTER_COUNT);
    }

    #[test]
    fn out_of_range_numbers_are_rejected() {
        for bits in 11u8..=15 {
            assert_eq!(Register::from_number(bits), None);
        }
    }

    #[test]
    fn pseudo_sentinel_uses_map_fd_discriminant() {
        assert_eq!(Register::PseudoMapFd.number(), PSEUDO_MAP_FD);
        assert!(Register::PseudoMapFd.is_pseudo());
        assert_eq!(Register::from_number(PSEUDO_MAP_FD), Some(Register::R1));
    }

    #[test]
    fn display_matches_canonical_names() {
        assert_eq!(Register::R0.to_string(), "r0");
        assert_eq!(Register::R10.to_string(), "r10");
        assert_eq!(Register::FP, Register::R10);
        assert!(Register::FP.is_frame_pointer());
    }
}
