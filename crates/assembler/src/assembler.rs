//! Top-level two-pass assembler pipeline.
//!
//! A sequence is a list of [`Node`]s: concrete instructions, factory
//! outcomes that may carry a [`BuildError`], label markers, and branches
//! that name a label instead of an offset. Assembly preserves node order
//! exactly; labels occupy no words.

use ebpf_core::instruction::{ja, jmp, jmp32, JumpInstruction};
use ebpf_core::{BuildError, Instruction, JumpOp, Register, Source};

use crate::encoder::resolve_branches;
use crate::errors::AssembleError;
use crate::program::Program;
use crate::symbols::assign_positions;

/// One element of an instruction sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A fully built instruction.
    Instruction(Instruction),
    /// A factory outcome that produced no instruction.
    Invalid(BuildError),
    /// Defines a label at the position of the next instruction.
    Label(String),
    /// A jump whose offset is resolved from a label during pass 2.
    Branch {
        /// Jump template; its offset is overwritten on resolution.
        jump: JumpInstruction,
        /// Label the branch is taken to.
        target: String,
    },
}

impl Node {
    /// Number of bytecode words this node occupies.
    #[must_use]
    pub const fn word_count(&self) -> usize {
        match self {
            Self::Instruction(insn) => insn.word_count(),
            Self::Branch { .. } => 1,
            Self::Invalid(_) | Self::Label(_) => 0,
        }
    }
}

impl From<Instruction> for Node {
    fn from(value: Instruction) -> Self {
        Self::Instruction(value)
    }
}

impl From<Result<Instruction, BuildError>> for Node {
    fn from(value: Result<Instruction, BuildError>) -> Self {
        match value {
            Ok(insn) => Self::Instruction(insn),
            Err(err) => Self::Invalid(err),
        }
    }
}

fn branch(insn: Instruction, target: String) -> Node {
    match insn {
        Instruction::Jump(jump) => Node::Branch { jump, target },
        other => Node::Instruction(other),
    }
}

/// Label marker.
#[must_use]
pub fn label(name: impl Into<String>) -> Node {
    Node::Label(name.into())
}

/// 64-bit conditional jump to a label.
#[must_use]
pub fn jmp_to(
    op: JumpOp,
    dst: Register,
    src: impl Into<Source>,
    target: impl Into<String>,
) -> Node {
    branch(jmp(op, dst, src, 0), target.into())
}

/// 32-bit conditional jump to a label.
#[must_use]
pub fn jmp32_to(
    op: JumpOp,
    dst: Register,
    src: impl Into<Source>,
    target: impl Into<String>,
) -> Node {
    branch(jmp32(op, dst, src, 0), target.into())
}

/// Unconditional jump to a label.
#[must_use]
pub fn ja_to(target: impl Into<String>) -> Node {
    branch(ja(0), target.into())
}

/// Assembles nodes into a program, preserving their order.
///
/// # Errors
///
/// Returns [`AssembleError`] if any node is an invalid instruction, a label
/// is defined twice, a branch target is undefined, or a branch offset does
/// not fit in 16 bits. No partial program is produced.
pub fn instruction_sequence<I>(nodes: I) -> Result<Program, AssembleError>
where
    I: IntoIterator,
    I::Item: Into<Node>,
{
    let nodes: Vec<Node> = nodes.into_iter().map(Into::into).collect();
    let assignment = assign_positions(&nodes)?;
    let instructions = resolve_branches(&nodes, &assignment)?;
    Ok(Program::from_instructions(instructions))
}

/// Assembles a heterogeneous list of nodes.
///
/// Each argument may be an [`Instruction`], a factory
/// `Result<Instruction, BuildError>`, or a [`Node`] such as [`label`].
///
/// ```text
/// instruction_sequence![
///     mov64(Register::R0, 0),
///     st_dw(Register::R10, 42, -8),
///     jmp_to(JumpOp::Jeq, Register::R0, 0, "out"),
///     label("out"),
///     exit(),
/// ]
/// ```
#[macro_export]
macro_rules! instruction_sequence {
    ($($node:expr),* $(,)?) => {{
        let nodes: ::std::vec::Vec<$crate::Node> =
            ::std::vec![$($crate::Node::from($node)),*];
        $crate::instruction_sequence(nodes)
    }};
}

#[cfg(test)]
mod tests {
    use super::{instruction_sequence, ja_to, jmp_to, label, Node};
    use crate::errors::AssembleError;
    use ebpf_core::instruction::{exit, ld_map_fd, mov64, st_dw};
    use ebpf_core::{decode_word, BuildError, JumpOp, Register};

    #[test]
    fn playground_sequence_is_two_words() {
        let program = crate::instruction_sequence![mov64(Register::R0, 0), exit()]
            .expect("valid sequence");
        let words = program.bytecode();
        assert_eq!(words.len(), 2);
        assert_eq!(decode_word(words[0]).dst, 0);
        assert_eq!(decode_word(words[1]).opcode, 0x95);
    }

    #[test]
    fn invalid_factory_outcome_fails_with_its_index() {
        let err = crate::instruction_sequence![
            mov64(Register::R0, 0),
            st_dw(Register::R10, i64::MAX, -8),
            exit(),
        ]
        .expect_err("out-of-range store");
        assert_eq!(
            err,
            AssembleError::InvalidInstruction {
                index: 1,
                source: BuildError::ImmediateOutOfRange(i64::MAX),
            }
        );
    }

    #[test]
    fn forward_branch_skips_wide_load() {
        let program = crate::instruction_sequence![
            jmp_to(JumpOp::Jeq, Register::R1, 0, "done"),
            ld_map_fd(Register::R1, 4),
            mov64(Register::R0, 1),
            label("done"),
            exit(),
        ]
        .expect("valid sequence");
        let words = program.bytecode();
        assert_eq!(words.len(), 5);
        // jump at 0, target at 4
        assert_eq!(decode_word(words[0]).offset, 3);
    }

    #[test]
    fn backward_branch_is_negative() {
        let program = instruction_sequence(vec![
            label("top"),
            Node::from(mov64(Register::R0, 0)),
            ja_to("top"),
        ])
        .expect("valid sequence");
        assert_eq!(decode_word(program.bytecode()[1]).offset, -2);
    }

    #[test]
    fn word_count_ignores_labels_and_invalid_nodes() {
        assert_eq!(label("x").word_count(), 0);
        assert_eq!(Node::from(ld_map_fd(Register::R2, 1)).word_count(), 2);
        assert_eq!(ja_to("x").word_count(), 1);
        assert_eq!(
            Node::from(st_dw(Register::R10, i64::MIN, 0)).word_count(),
            0
        );
    }

    #[test]
    fn empty_sequence_assembles_to_empty_program() {
        let program = crate::instruction_sequence![].expect("empty is valid");
        assert!(program.is_empty());
        assert!(program.bytecode().is_empty());
    }
}
