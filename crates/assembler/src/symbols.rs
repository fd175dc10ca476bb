//! Symbol table and pass-1 position assignment.
//!
//! Walks the node sequence once, assigning each node the word position it
//! starts at and recording every label definition. Invalid factory outcomes
//! stop assembly here, before any branch is resolved.

use std::collections::HashMap;

use crate::assembler::Node;
use crate::errors::AssembleError;

/// A label with its resolved word position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// Word position of the instruction following the label.
    pub position: usize,
    /// Node index where the label was defined.
    pub defined_at: usize,
}

/// Symbol table mapping label names to their definitions.
pub type SymbolTable = HashMap<String, Symbol>;

/// Result of pass-1 position assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Starting word position of each node, parallel to the input.
    pub positions: Vec<usize>,
    /// Label definitions.
    pub symbols: SymbolTable,
    /// Total program length in words.
    pub word_count: usize,
}

/// Assigns word positions and builds the symbol table.
///
/// # Errors
///
/// Returns [`AssembleError::InvalidInstruction`] for the first invalid node
/// and [`AssembleError::DuplicateLabel`] for a repeated label.
pub fn assign_positions(nodes: &[Node]) -> Result<Assignment, AssembleError> {
    let mut positions = Vec::with_capacity(nodes.len());
    let mut symbols = SymbolTable::new();
    let mut position = 0;

    for (index, node) in nodes.iter().enumerate() {
        positions.push(position);
        match node {
            Node::Invalid(source) => {
                return Err(AssembleError::InvalidInstruction {
                    index,
                    source: *source,
                });
            }
            Node::Label(name) => {
                if let Some(existing) = symbols.get(name) {
                    return Err(AssembleError::DuplicateLabel {
                        name: name.clone(),
                        index,
                        first_definition: existing.defined_at,
                    });
                }
                symbols.insert(
                    name.clone(),
                    Symbol {
                        position,
                        defined_at: index,
                    },
                );
            }
            Node::Instruction(_) | Node::Branch { .. } => {}
        }
        position += node.word_count();
    }

    Ok(Assignment {
        positions,
        symbols,
        word_count: position,
    })
}
