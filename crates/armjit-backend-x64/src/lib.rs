//! Lowers an optimized `armjit_ir::Block` to x86-64 machine code: register
//! allocation (`regalloc`), one emit routine per microinstruction opcode
//! dispatched by a single match (`emit`), terminal lowering to branches and
//! relinkable patch sites (`terminal`/`patch`), and the ABI-stable per-thread
//! state layout emitted code addresses through (`jitstate`).

pub mod emit;
pub mod jitstate;
pub mod patch;
pub mod regalloc;
pub mod terminal;

pub use jitstate::{JitState, RSB_SIZE};
pub use patch::{PatchKind, PatchSite};

use armjit_ir::Block;
use emit::EmitContext;
use iced_x86::{BlockEncoder, BlockEncoderOptions, InstructionBlock};
use regalloc::RegAlloc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("x86-64 encoding failed: {0}")]
    Encode(String),
}

/// Machine code for one guest block: the encoded bytes, the patch sites the
/// runtime must fill in or relink, and the spill-slot count the runtime must
/// reserve stack space for before entering the code.
pub struct CompiledBlock {
    pub code: Vec<u8>,
    pub patches: Vec<PatchSite>,
    pub spill_slots: u32,
}

/// Compiles one optimized block into host machine code at `rip` (the address
/// the runtime's code-buffer allocator has reserved for it). `rip` matters
/// only for absolute near-branch resolution inside `BlockEncoder`; the
/// runtime is free to relocate the buffer later as long as it rewrites every
/// `PatchSite`.
pub fn compile_block(block: &Block, rip: u64) -> Result<CompiledBlock, BackendError> {
    let mut ra = RegAlloc::new();
    ra.reset();
    let mut ctx = EmitContext::new(block, &mut ra);
    emit::emit_block_body(&mut ctx);

    let terminal = block.terminal().expect("compile_block requires a block with a terminal set");
    // Terminal lowering appends to the same `ctx.code` the body was emitted
    // into, so its patch sites are already instruction indices into the full
    // block buffer — no rebasing needed before the index->offset fixup below.
    let mut patches = terminal::emit_terminal(&mut ctx, terminal, block.cycle_count());

    let spill_slots = ra.spill_slots_used();
    let mut instructions = ctx.code;
    for (idx, instr) in instructions.iter_mut().enumerate() {
        instr.set_ip(idx as u64);
    }

    let block_encoder_result = BlockEncoder::encode(
        64,
        InstructionBlock::new(&instructions, rip),
        BlockEncoderOptions::NONE,
    )
    .map_err(|e| BackendError::Encode(e.to_string()))?;

    // Translate each patch's instruction-index placeholder into the real
    // byte offset of that instruction's encoding within the final buffer.
    let new_offsets = block_encoder_result.new_instruction_offsets;
    for patch in &mut patches {
        let idx = patch.code_offset;
        patch.code_offset = new_offsets
            .get(idx)
            .copied()
            .expect("patch site references an instruction that wasn't encoded") as usize;
    }

    Ok(CompiledBlock {
        code: block_encoder_result.code_buffer,
        patches,
        spill_slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use armjit_ir::{IREmitter, LocationDescriptor, Terminal};
    use armjit_types::ExecMode;

    #[test]
    fn compiles_a_trivial_return_to_dispatch_block() {
        let mut emitter = IREmitter::new(armjit_ir::Block::new(LocationDescriptor::new(0x1000, ExecMode::A64, 0)));
        let v = emitter.imm32(5);
        emitter.set_register(0, v);
        emitter.block.set_terminal(Terminal::ReturnToDispatch);
        let compiled = compile_block(&emitter.block, 0x7f00_0000_0000).expect("compiles");
        assert!(!compiled.code.is_empty());
        assert!(compiled.patches.is_empty());
    }

    #[test]
    fn link_block_fast_produces_relinkable_patch_sites() {
        let mut emitter = IREmitter::new(armjit_ir::Block::new(LocationDescriptor::new(0x1000, ExecMode::A64, 0)));
        let v = emitter.imm32(1);
        emitter.set_register(0, v);
        let target = LocationDescriptor::new(0x1004, ExecMode::A64, 0);
        emitter.block.set_terminal(Terminal::LinkBlockFast(target));
        let compiled = compile_block(&emitter.block, 0x7f00_0000_0000).expect("compiles");
        assert_eq!(compiled.patches.len(), 2);
        assert!(compiled.patches.iter().all(|p| p.target == target));
    }
}
