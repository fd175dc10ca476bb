//! Linked programs and their output forms.

use ebpf_core::{decode_program, DecodeError, Instruction};

/// One row of a program listing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ListingEntry {
    /// Word position of the instruction.
    pub position: usize,
    /// Encoded words (two for ld_imm64).
    pub words: Vec<u64>,
    /// Reproduction macro text.
    pub text: String,
}

/// An assembled, fully resolved instruction sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    /// Wraps instructions whose offsets are already concrete.
    #[must_use]
    pub const fn from_instructions(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Rebuilds a program from raw bytecode.
    ///
    /// # Errors
    ///
    /// Returns the first [`DecodeError`] in `words`.
    pub fn from_bytecode(words: &[u64]) -> Result<Self, DecodeError> {
        decode_program(words).map(Self::from_instructions)
    }

    /// Instructions in program order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions (a wide load counts once).
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if the program has no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Program length in 64-bit words.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.instructions.iter().map(Instruction::word_count).sum()
    }

    /// Encoded words in program order.
    #[must_use]
    pub fn bytecode(&self) -> Vec<u64> {
        self.instructions.iter().flat_map(Instruction::encode).collect()
    }

    /// Bytecode as little-endian bytes, the layout the kernel loader expects.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytecode()
            .into_iter()
            .flat_map(u64::to_le_bytes)
            .collect()
    }

    /// One reproduction macro per instruction.
    #[must_use]
    pub fn repro(&self) -> Vec<String> {
        self.instructions.iter().map(Instruction::repro).collect()
    }

    /// C array initializer reproducing the program.
    #[must_use]
    pub fn poc_source(&self) -> String {
        let mut out = String::from("struct bpf_insn prog[] = {\n");
        for line in self.repro() {
            out.push_str("    ");
            out.push_str(&line);
            out.push_str(",\n");
        }
        out.push_str("};\n");
        out
    }

    /// Word-positioned listing of the program.
    #[must_use]
    pub fn listing(&self) -> Vec<ListingEntry> {
        let mut position = 0;
        self.instructions
            .iter()
            .map(|insn| {
                let entry = ListingEntry {
                    position,
                    words: insn.encode(),
                    text: insn.repro(),
                };
                position += insn.word_count();
                entry
            })
            .collect()
    }
}

impl From<Vec<Instruction>> for Program {
    fn from(value: Vec<Instruction>) -> Self {
        Self::from_instructions(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Program;
    use ebpf_core::instruction::{exit, ld_map_fd, mov64};
    use ebpf_core::Register;

    fn sample() -> Program {
        Program::from_instructions(vec![
            ld_map_fd(Register::R1, 3),
            mov64(Register::R0, 0),
            exit(),
        ])
    }

    #[test]
    fn bytes_are_little_endian_words() {
        let program = sample();
        let bytes = program.to_bytes();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..8], &program.bytecode()[0].to_le_bytes());
        assert_eq!(bytes[0], 0x18);
    }

    #[test]
    fn listing_positions_account_for_wide_load() {
        let listing = sample().listing();
        let positions: Vec<usize> = listing.iter().map(|entry| entry.position).collect();
        assert_eq!(positions, vec![0, 2, 3]);
        assert_eq!(listing[0].words.len(), 2);
    }

    #[test]
    fn poc_source_is_c_initializer() {
        assert_eq!(
            sample().poc_source(),
            "struct bpf_insn prog[] = {\n    BPF_LD_MAP_FD(/*dst=*/r1, map_fd),\n    BPF_ALU64_IMM(BPF_MOV, r0, 0),\n    BPF_EXIT_INSN(),\n};\n"
        );
    }

    #[test]
    fn bytecode_roundtrips_through_decoder() {
        let program = sample();
        assert_eq!(Program::from_bytecode(&program.bytecode()), Ok(program));
    }
}
