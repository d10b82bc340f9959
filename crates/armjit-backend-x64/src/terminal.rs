//! Lowers a block's `Terminal` tree to host code plus the `PatchSite`s the
//! runtime must relink once their target blocks exist.
//!
//! Every terminal shares one piece of setup: the block's cycle cost is
//! subtracted from `cycles_remaining` exactly once, before any branch is
//! taken, regardless of which leaf of the terminal tree ends up executing
//! (mirrors dynarmic's `EmitAddCycles` followed by `EmitTerminal`). Control
//! flow inside the lowered code itself (the `if`/`else` shape of `If` and
//! `CheckBit`, and the ret-or-continue shape of `CheckHalt`/`LinkBlock`'s
//! cycle check) uses intra-block forward branches: each branch instruction
//! is pushed with a placeholder target equal to the *index* its destination
//! instruction will occupy in `ctx.code`, not a byte offset. The final
//! assembly pass (`lib::compile_block`) assigns every instruction an `ip`
//! equal to its index before handing the buffer to `iced_x86::BlockEncoder`,
//! which resolves branches whose target matches another instruction's `ip`
//! to its real encoded address. Patch sites recorded here follow the same
//! convention: `PatchSite::code_offset` is an instruction index until that
//! same pass rewrites it to a true byte offset from the encoder's output.

use crate::emit::EmitContext;
use crate::jitstate::abi;
use crate::jitstate::RSB_SIZE;
use crate::patch::{PatchKind, PatchSite};
use armjit_ir::{LocationDescriptor, Terminal};
use armjit_types::{Cond, Type};
use iced_x86::{Code, Instruction, Register};

pub fn emit_terminal(ctx: &mut EmitContext, terminal: &Terminal, cycle_count: u32) -> Vec<PatchSite> {
    emit_add_cycles(ctx, cycle_count);
    let mut patches = Vec::new();
    lower(ctx, terminal, &mut patches);
    patches
}

fn emit_add_cycles(ctx: &mut EmitContext, cycle_count: u32) {
    ctx.code.push(
        Instruction::with2(Code::Sub_rm64_imm32, ctx.state_mem(abi::CYCLES_REMAINING), cycle_count).unwrap(),
    );
}

fn lower(ctx: &mut EmitContext, terminal: &Terminal, patches: &mut Vec<PatchSite>) {
    match terminal {
        Terminal::Interpret(desc) => emit_link(ctx, *desc, PatchKind::UnconditionalNear, Code::Jmp_rel32_32, patches),
        Terminal::InterpretMany { count, .. } => emit_interpret_many(ctx, *count),
        Terminal::ReturnToDispatch => emit_ret(ctx),
        Terminal::LinkBlock(desc) => emit_link_block(ctx, *desc, true, patches),
        Terminal::LinkBlockFast(desc) => emit_link_block(ctx, *desc, false, patches),
        Terminal::PopRSBHint => emit_pop_rsb_hint(ctx),
        Terminal::If { cond, then, els } => emit_if(ctx, *cond, then, els, patches),
        Terminal::CheckBit { then, els } => emit_check_bit(ctx, then, els, patches),
        Terminal::CheckHalt { inner } => emit_check_halt(ctx, inner, patches),
    }
}

/// Returns to the dispatcher trampoline with RAX cleared. The trampoline's
/// contract: RAX = 0 means "fully returned, nothing pending"; a nonzero RAX
/// (see the shared dispatch stub `armjit-runtime` installs at a fixed code
/// address, reached only via an as-yet-unresolved link's jump) carries a
/// packed `LocationDescriptor` the dispatcher must resolve and re-enter at.
fn emit_ret(ctx: &mut EmitContext) {
    ctx.code.push(Instruction::with2(Code::Xor_r32_rm32, Register::EAX, Register::EAX).unwrap());
    ctx.code.push(Instruction::with(Code::Retnq));
}

/// Every `Interpret`/`InterpretMany`/`LinkBlock`/`LinkBlockFast` site is
/// wired the same way: load the target's packed value into RCX for a shared
/// "resolve and dispatch" stub (a `MovImmediateToRcx` patch, relinked once
/// the target has a compiled entry), then jump to that stub (an
/// `UnconditionalNear` patch, relinked to jump straight at the compiled
/// entry once it exists, bypassing the stub).
fn emit_link(
    ctx: &mut EmitContext,
    desc: LocationDescriptor,
    jump_kind: PatchKind,
    branch: Code,
    patches: &mut Vec<PatchSite>,
) {
    let mov_idx = ctx.code.len();
    ctx.code.push(Instruction::with2(Code::Mov_r64_imm64, Register::RCX, desc.value()).unwrap());
    patches.push(PatchSite {
        kind: PatchKind::MovImmediateToRcx,
        code_offset: mov_idx,
        target: desc,
    });
    let jmp_idx = ctx.code.len();
    ctx.code.push(Instruction::with_branch(branch, 0).unwrap());
    patches.push(PatchSite {
        kind: jump_kind,
        code_offset: jmp_idx,
        target: desc,
    });
}

/// `LinkBlock` has a cycle-remaining check; rather than an intra-block
/// branch around a separately-linked jump, the check's own conditional jump
/// *is* the link (a `ConditionalNear` patch, not an `UnconditionalNear`
/// one): falling through (cycles exhausted) returns to the dispatcher.
/// `LinkBlockFast` skips the check and links unconditionally.
fn emit_link_block(ctx: &mut EmitContext, desc: LocationDescriptor, check: bool, patches: &mut Vec<PatchSite>) {
    if check {
        let reg = ctx.ra.scratch_register(Type::U64);
        ctx.code.push(Instruction::with2(Code::Mov_r64_rm64, reg, ctx.state_mem(abi::CYCLES_REMAINING)).unwrap());
        ctx.code.push(Instruction::with2(Code::Test_rm64_r64, reg, reg).unwrap());
        emit_link(ctx, desc, PatchKind::ConditionalNear, Code::Jg_rel32_32, patches);
        emit_ret(ctx);
    } else {
        emit_link(ctx, desc, PatchKind::UnconditionalNear, Code::Jmp_rel32_32, patches);
    }
}

/// Calls the external interpreter callback `count` times in a row, then
/// returns to the dispatcher for a fresh lookup at wherever the interpreter
/// left the guest PC. Unlike `Interpret`, there's no static target to relink
/// to: the interpreter may leave the guest anywhere, so this always falls
/// back to a full dispatch.
fn emit_interpret_many(ctx: &mut EmitContext, count: u32) {
    ctx.code.push(Instruction::with2(Code::Mov_r32_imm32, Register::ECX, count).unwrap());
    ctx.code.push(Instruction::with_branch(Code::Call_rel32_32, 0).unwrap());
    emit_ret(ctx);
}

/// Probes the return-stack-buffer ring most-recent-slot-first: each slot
/// holds `(return_address, target_code_ptr)`. A slot whose return address
/// matches the current guest PC is an indirect jump to its stored code
/// pointer (a runtime value, not a compile-time target, so this needs no
/// patch site — `Terminal::linked_descriptors` agrees, returning none for
/// `PopRSBHint`). Falling through every slot returns to the dispatcher for a
/// full lookup.
fn emit_pop_rsb_hint(ctx: &mut EmitContext) {
    let pc_reg = ctx.ra.scratch_register(Type::U64);
    ctx.code.push(Instruction::with2(Code::Mov_r64_rm64, pc_reg, ctx.state_mem(abi::PC)).unwrap());
    for slot in 0..RSB_SIZE {
        let slot_offset = abi::RSB + slot * 16;
        let addr_reg = ctx.ra.scratch_register(Type::U64);
        ctx.code.push(Instruction::with2(Code::Mov_r64_rm64, addr_reg, ctx.state_mem(slot_offset)).unwrap());
        ctx.code.push(Instruction::with2(Code::Cmp_rm64_r64, addr_reg, pc_reg).unwrap());
        let miss = push_placeholder_branch(ctx, Code::Jne_rel32_32);
        let target_reg = ctx.ra.scratch_register(Type::U64);
        ctx.code
            .push(Instruction::with2(Code::Mov_r64_rm64, target_reg, ctx.state_mem(slot_offset + 8)).unwrap());
        ctx.code.push(Instruction::with1(Code::Jmp_rm64, target_reg).unwrap());
        patch_branch_to_here(ctx, miss, Code::Jne_rel32_32);
    }
    emit_ret(ctx);
}

fn emit_if(ctx: &mut EmitContext, cond: Cond, then: &Terminal, els: &Terminal, patches: &mut Vec<PatchSite>) {
    if matches!(cond, Cond::Al | Cond::Nv) {
        lower(ctx, then, patches);
        return;
    }
    let true_reg = emit_cond_eval(ctx, cond);
    ctx.code.push(Instruction::with2(Code::Test_rm32_r32, true_reg, true_reg).unwrap());
    emit_branch_pair(ctx, Code::Jne_rel32_32, then, els, patches);
}

fn emit_check_bit(ctx: &mut EmitContext, then: &Terminal, els: &Terminal, patches: &mut Vec<PatchSite>) {
    let reg = ctx.ra.scratch_register(Type::U32);
    ctx.code.push(Instruction::with2(Code::Mov_r32_rm32, reg, ctx.state_mem(abi::TERM_BIT)).unwrap());
    ctx.code.push(Instruction::with2(Code::Test_rm32_r32, reg, reg).unwrap());
    emit_branch_pair(ctx, Code::Jne_rel32_32, then, els, patches);
}

/// Shared shape for `If`/`CheckBit`: a flag has just been computed into a
/// register tested against itself; `taken` jumps to `then`'s code, fall
/// through runs `els`'s code followed by a skip over `then`'s code.
fn emit_branch_pair(
    ctx: &mut EmitContext,
    taken: Code,
    then: &Terminal,
    els: &Terminal,
    patches: &mut Vec<PatchSite>,
) {
    let to_then = push_placeholder_branch(ctx, taken);
    lower(ctx, els, patches);
    let to_end = push_placeholder_branch(ctx, Code::Jmp_rel32_32);
    patch_branch_to_here(ctx, to_then, taken);
    lower(ctx, then, patches);
    patch_branch_to_here(ctx, to_end, Code::Jmp_rel32_32);
}

fn emit_check_halt(ctx: &mut EmitContext, inner: &Terminal, patches: &mut Vec<PatchSite>) {
    let reg = ctx.ra.scratch_register(Type::U32);
    ctx.code.push(Instruction::with2(Code::Mov_r32_rm32, reg, ctx.state_mem(abi::HALT_REQUESTED)).unwrap());
    ctx.code.push(Instruction::with2(Code::Test_rm32_r32, reg, reg).unwrap());
    let not_halted = push_placeholder_branch(ctx, Code::Je_rel32_32);
    emit_ret(ctx);
    patch_branch_to_here(ctx, not_halted, Code::Je_rel32_32);
    lower(ctx, inner, patches);
}

/// Evaluates an ARM condition against the packed NZCV word into a scratch
/// register holding 0 or 1, so every condition (including the compound
/// `Hi`/`Ls`/`Ge`/`Lt`/`Gt`/`Le`) resolves through a single final `test`
/// rather than a bespoke branch shape per condition. Bit positions match
/// `JitState::nzcv`: N=31, Z=30, C=29, V=28.
fn emit_cond_eval(ctx: &mut EmitContext, cond: Cond) -> Register {
    const N: u32 = 31;
    const Z: u32 = 30;
    const C: u32 = 29;
    const V: u32 = 28;

    let nzcv = ctx.ra.scratch_register(Type::U32);
    ctx.code.push(Instruction::with2(Code::Mov_r32_rm32, nzcv, ctx.state_mem(abi::NZCV)).unwrap());

    match cond {
        Cond::Eq => extract_bit(ctx, nzcv, Z),
        Cond::Ne => extract_bit_inverted(ctx, nzcv, Z),
        Cond::Hs => extract_bit(ctx, nzcv, C),
        Cond::Lo => extract_bit_inverted(ctx, nzcv, C),
        Cond::Mi => extract_bit(ctx, nzcv, N),
        Cond::Pl => extract_bit_inverted(ctx, nzcv, N),
        Cond::Vs => extract_bit(ctx, nzcv, V),
        Cond::Vc => extract_bit_inverted(ctx, nzcv, V),
        Cond::Hi => {
            let c = extract_bit(ctx, nzcv, C);
            let z = extract_bit(ctx, nzcv, Z);
            ctx.code.push(Instruction::with2(Code::Not_rm32, z, z).unwrap());
            ctx.code.push(Instruction::with2(Code::And_r32_rm32, c, z).unwrap());
            c
        }
        Cond::Ls => {
            let hi = emit_cond_eval(ctx, Cond::Hi);
            ctx.code.push(Instruction::with2(Code::Xor_rm32_imm32, hi, 1u32).unwrap());
            hi
        }
        Cond::Ge => {
            let n_eq_v = xor_bits(ctx, nzcv, N, V);
            ctx.code.push(Instruction::with2(Code::Xor_rm32_imm32, n_eq_v, 1u32).unwrap());
            n_eq_v
        }
        Cond::Lt => xor_bits(ctx, nzcv, N, V),
        Cond::Gt => {
            let ge = emit_cond_eval(ctx, Cond::Ge);
            let z_clear = extract_bit_inverted(ctx, nzcv, Z);
            ctx.code.push(Instruction::with2(Code::And_r32_rm32, ge, z_clear).unwrap());
            ge
        }
        Cond::Le => {
            let gt = emit_cond_eval(ctx, Cond::Gt);
            ctx.code.push(Instruction::with2(Code::Xor_rm32_imm32, gt, 1u32).unwrap());
            gt
        }
        Cond::Al | Cond::Nv => {
            ctx.code.push(Instruction::with2(Code::Mov_r32_imm32, nzcv, 1u32).unwrap());
            nzcv
        }
    }
}

fn extract_bit(ctx: &mut EmitContext, reg: Register, bit: u32) -> Register {
    let out = ctx.ra.scratch_register(Type::U32);
    ctx.code.push(Instruction::with2(Code::Mov_r32_rm32, out, reg).unwrap());
    ctx.code.push(Instruction::with2(Code::Shr_rm32_imm8, out, bit as u32).unwrap());
    ctx.code.push(Instruction::with2(Code::And_rm32_imm32, out, 1u32).unwrap());
    out
}

fn extract_bit_inverted(ctx: &mut EmitContext, reg: Register, bit: u32) -> Register {
    let out = extract_bit(ctx, reg, bit);
    ctx.code.push(Instruction::with2(Code::Xor_rm32_imm32, out, 1u32).unwrap());
    out
}

fn xor_bits(ctx: &mut EmitContext, reg: Register, a: u32, b: u32) -> Register {
    let lhs = extract_bit(ctx, reg, a);
    let rhs = extract_bit(ctx, reg, b);
    ctx.code.push(Instruction::with2(Code::Xor_r32_rm32, lhs, rhs).unwrap());
    lhs
}

fn push_placeholder_branch(ctx: &mut EmitContext, code: Code) -> usize {
    let idx = ctx.code.len();
    ctx.code.push(Instruction::with_branch(code, 0).unwrap());
    idx
}

fn patch_branch_to_here(ctx: &mut EmitContext, branch_idx: usize, code: Code) {
    let target = ctx.code.len() as u64;
    ctx.code[branch_idx] = Instruction::with_branch(code, target).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regalloc::RegAlloc;
    use armjit_ir::{Block, LocationDescriptor as Loc};
    use armjit_types::ExecMode;

    fn empty_block() -> Block {
        Block::new(Loc::new(0x1000, ExecMode::A64, 0))
    }

    #[test]
    fn return_to_dispatch_emits_a_ret_after_subtracting_cycles() {
        let block = empty_block();
        let mut ra = RegAlloc::new();
        let mut ctx = EmitContext::new(&block, &mut ra);
        let patches = emit_terminal(&mut ctx, &Terminal::ReturnToDispatch, 4);
        assert!(patches.is_empty());
        assert!(ctx.code.iter().any(|i| i.code() == Code::Retnq));
    }

    #[test]
    fn link_block_records_both_patch_kinds() {
        let block = empty_block();
        let mut ra = RegAlloc::new();
        let mut ctx = EmitContext::new(&block, &mut ra);
        let target = Loc::new(0x2000, ExecMode::A64, 0);
        let patches = emit_terminal(&mut ctx, &Terminal::LinkBlockFast(target), 2);
        assert!(patches.iter().any(|p| p.kind == PatchKind::MovImmediateToRcx && p.target == target));
        assert!(patches.iter().any(|p| p.kind == PatchKind::UnconditionalNear && p.target == target));
    }

    #[test]
    fn pop_rsb_hint_has_no_patch_sites() {
        let block = empty_block();
        let mut ra = RegAlloc::new();
        let mut ctx = EmitContext::new(&block, &mut ra);
        let patches = emit_terminal(&mut ctx, &Terminal::PopRSBHint, 0);
        assert!(patches.is_empty());
    }

    #[test]
    fn if_terminal_with_al_skips_condition_evaluation() {
        let block = empty_block();
        let mut ra = RegAlloc::new();
        let mut ctx = EmitContext::new(&block, &mut ra);
        let then = Terminal::ReturnToDispatch;
        let els = Terminal::LinkBlockFast(Loc::new(0x3000, ExecMode::A64, 0));
        let patches = emit_terminal(&mut ctx, &Terminal::if_cond(Cond::Al, then, els), 1);
        assert!(patches.is_empty());
    }
}
