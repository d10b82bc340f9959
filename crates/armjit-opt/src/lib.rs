//! Block-local optimization passes run on freshly translated `armjit_ir`
//! blocks before they're handed to the backend.
//!
//! Default pipeline order, matching the dependency between passes (each
//! exposes more redundancy for the next to clean up):
//!
//! `GetSetElimination` (per-ISA) → `ConstantPropagation` → `ConstantMemoryReads`
//! → `MergeInterpretBlocks` → `DeadCodeElimination` → `Verification`.

pub mod constant_memory_reads;
pub mod constant_propagation;
pub mod dce;
pub mod get_set_elimination;
pub mod merge_interpret_blocks;
pub mod verification;

pub use constant_memory_reads::{constant_memory_reads, ReadOnlyMemoryOracle};
pub use constant_propagation::constant_propagation;
pub use dce::dead_code_elimination;
pub use get_set_elimination::{a32_get_set_elimination, a64_get_set_elimination};
pub use merge_interpret_blocks::merge_interpret_blocks;
pub use verification::{verify, VerificationError};

use armjit_ir::Block;
use armjit_types::ExecMode;

/// Runs the per-block portion of the default pipeline (everything up to
/// `MergeInterpretBlocks`, which operates across blocks and is left to the
/// runtime's translate-and-cache path) on a single freshly translated block.
pub fn optimize_block(block: &mut Block, mode: ExecMode, memory: Option<&dyn ReadOnlyMemoryOracle>) {
    match mode {
        ExecMode::A32 | ExecMode::Thumb => a32_get_set_elimination(block),
        ExecMode::A64 => a64_get_set_elimination(block),
    }
    constant_propagation(block);
    if let Some(oracle) = memory {
        constant_memory_reads(block, oracle);
    }
    dead_code_elimination(block);
}
