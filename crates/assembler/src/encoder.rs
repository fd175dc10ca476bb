//! Pass 2: branch resolution.
//!
//! Turns the positioned node list into concrete instructions. A branch at
//! word `p` to a label at word `t` receives offset `t - (p + 1)`.

use ebpf_core::Instruction;

use crate::assembler::Node;
use crate::errors::AssembleError;
use crate::symbols::Assignment;

/// Relative offset from the word after `from` to `to`.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn branch_offset(from: usize, to: usize) -> i64 {
    to as i64 - (from as i64 + 1)
}

/// Resolves every branch and drops label markers.
///
/// # Errors
///
/// Returns [`AssembleError::UndefinedLabel`] or
/// [`AssembleError::JumpOutOfRange`] for the first branch that cannot be
/// resolved.
pub fn resolve_branches(
    nodes: &[Node],
    assignment: &Assignment,
) -> Result<Vec<Instruction>, AssembleError> {
    let mut instructions = Vec::with_capacity(nodes.len());

    for (index, node) in nodes.iter().enumerate() {
        match node {
            Node::Instruction(insn) => instructions.push(*insn),
            Node::Branch { jump, target } => {
                let symbol =
                    assignment
                        .symbols
                        .get(target)
                        .ok_or_else(|| AssembleError::UndefinedLabel {
                            name: target.clone(),
                            index,
                        })?;
                let offset = branch_offset(assignment.positions[index], symbol.position);
                let offset = i16::try_from(offset).map_err(|_| AssembleError::JumpOutOfRange {
                    name: target.clone(),
                    index,
                    offset,
                })?;
                instructions.push(Instruction::Jump(jump.with_offset(offset)));
            }
            Node::Label(_) => {}
            Node::Invalid(source) => {
                return Err(AssembleError::InvalidInstruction {
                    index,
                    source: *source,
                });
            }
        }
    }

    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::{branch_offset, resolve_branches};
    use crate::assembler::{ja_to, label, Node};
    use crate::errors::AssembleError;
    use crate::symbols::assign_positions;
    use ebpf_core::instruction::mov64;
    use ebpf_core::Register;

    #[test]
    fn offset_is_relative_to_next_word() {
        assert_eq!(branch_offset(0, 1), 0);
        assert_eq!(branch_offset(0, 4), 3);
        assert_eq!(branch_offset(5, 0), -6);
    }

    #[test]
    fn undefined_label_is_reported_at_branch() {
        let nodes = vec![Node::from(mov64(Register::R0, 0)), ja_to("nowhere")];
        let assignment = assign_positions(&nodes).expect("pass 1 succeeds");
        assert_eq!(
            resolve_branches(&nodes, &assignment),
            Err(AssembleError::UndefinedLabel {
                name: "nowhere".into(),
                index: 1,
            })
        );
    }

    #[test]
    fn displacement_beyond_i16_is_rejected() {
        let mut nodes = vec![ja_to("far")];
        nodes.extend((0..40_000).map(|_| Node::from(mov64(Register::R0, 0))));
        nodes.push(label("far"));
        let assignment = assign_positions(&nodes).expect("pass 1 succeeds");
        assert_eq!(
            resolve_branches(&nodes, &assignment),
            Err(AssembleError::JumpOutOfRange {
                name: "far".into(),
                index: 0,
                offset: 40_000,
            })
        );
    }
}
