use armjit_ir::LocationDescriptor;

/// Which instruction at `code_offset` needs rewriting when `target` becomes
/// available, and how to rewrite it. Named after the dynarmic emitter's
/// three patch emitters (`EmitPatchJg`/`EmitPatchJmp`/`EmitPatchMovRcx`):
/// a conditional near jump (guest `If` terminal branches), an unconditional
/// near jump (`LinkBlock`/`LinkBlockFast`), and a mov-immediate-to-RCX used
/// to inject the `PopRSBHint` miss target into the runtime's RSB-probe
/// trampoline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    ConditionalNear,
    UnconditionalNear,
    MovImmediateToRcx,
}

/// One rewritable site in a compiled block's code buffer, recorded at
/// compile time so the runtime can relink it once the block it targets
/// becomes available, and unlink it (rewrite back to the dispatcher stub)
/// if that block is later invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchSite {
    pub kind: PatchKind,
    /// Byte offset within the block's code buffer where the patched
    /// instruction itself begins (not its immediate/displacement operand —
    /// `kind` fixes the instruction's encoding, so the runtime knows the
    /// operand's sub-offset from that alone).
    pub code_offset: usize,
    pub target: LocationDescriptor,
}
