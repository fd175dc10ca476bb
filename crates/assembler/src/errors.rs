//! Structured error reporting for assembler passes.
//!
//! Every variant carries the node index it was raised at so a caller can
//! point back into the sequence it handed over.

use ebpf_core::BuildError;
use thiserror::Error;

/// Failure linking a node sequence into a [`crate::Program`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    /// A factory refused to build the instruction at this node.
    #[error("node {index}: invalid instruction: {source}")]
    InvalidInstruction {
        /// Node index.
        index: usize,
        /// Construction failure reported by the factory.
        #[source]
        source: BuildError,
    },
    /// The same label name was defined twice.
    #[error("node {index}: duplicate label '{name}' (first defined at node {first_definition})")]
    DuplicateLabel {
        /// Label name.
        name: String,
        /// Node index of the second definition.
        index: usize,
        /// Node index of the first definition.
        first_definition: usize,
    },
    /// A branch names a label that is never defined.
    #[error("node {index}: undefined label '{name}'")]
    UndefinedLabel {
        /// Label name.
        name: String,
        /// Node index of the branch.
        index: usize,
    },
    /// The branch displacement does not fit the signed 16-bit offset field.
    #[error("node {index}: jump to '{name}' is out of range (offset {offset})")]
    JumpOutOfRange {
        /// Label name.
        name: String,
        /// Node index of the branch.
        index: usize,
        /// The displacement that would be required.
        offset: i64,
    },
}

impl AssembleError {
    /// Node index the error was raised at.
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::InvalidInstruction { index, .. }
            | Self::DuplicateLabel { index, .. }
            | Self::UndefinedLabel { index, .. }
            | Self::JumpOutOfRange { index, .. } => *index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AssembleError;
    use ebpf_core::BuildError;
    use std::error::Error as _;

    #[test]
    fn invalid_instruction_exposes_build_error_as_source() {
        let err = AssembleError::InvalidInstruction {
            index: 3,
            source: BuildError::ImmediateOutOfRange(1 << 40),
        };
        assert_eq!(err.index(), 3);
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("node 3: invalid instruction"));
    }

    #[test]
    fn duplicate_label_names_both_definitions() {
        let err = AssembleError::DuplicateLabel {
            name: "loop".into(),
            index: 7,
            first_definition: 2,
        };
        assert_eq!(
            err.to_string(),
            "node 7: duplicate label 'loop' (first defined at node 2)"
        );
    }
}
