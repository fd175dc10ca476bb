//! Order-preserving assembler for eBPF instruction sequences.
//!
//! Nodes are linked in two passes: [`symbols`] assigns word positions and
//! collects labels, [`encoder`] resolves symbolic branches into relative
//! offsets. The result is a [`Program`] ready for loading or reproduction.

/// Node model, entry points and the `instruction_sequence!` macro.
pub mod assembler;
pub use assembler::{instruction_sequence, ja_to, jmp32_to, jmp_to, label, Node};

/// Pass-2 branch resolution.
pub mod encoder;

/// Assembly error types.
pub mod errors;
pub use errors::AssembleError;

/// Linked programs and their output forms.
pub mod program;
pub use program::{ListingEntry, Program};

/// Symbol table and pass-1 position assignment.
pub mod symbols;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
