/// The per-thread state block emitted code addresses through a pinned base
/// register (R15). Every field offset here is part of the ABI between
/// emitted code and the runtime: `abi::OFFSET_*` constants are generated
/// from this layout and the emitter must never hardcode a literal offset.
///
/// Sized to cover both A32 (16 GPRs, CPSR) and A64 (31 GPRs, PSTATE/NZCV,
/// SP) register files in one shape rather than two JitState variants, since
/// a single `Jit` instance's `ExecMode` can change between A32/Thumb/A64 at
/// block boundaries (interworking) and the dispatcher must not re-point R15
/// on a mode switch.
#[repr(C)]
pub struct JitState {
    /// A64 X0-X30 (A32 uses the low 16 as R0-R15, including a JIT-maintained PC shadow).
    pub gpr: [u64; 31],
    /// A64 SP_EL0 (unused by A32 translation, which keeps SP in `gpr[13]`).
    pub sp: u64,
    pub pc: u64,
    /// A32 CPSR; for A64 only NZCV is architectural, still packed here so
    /// `GetCpsr`/`SetCpsr` stay meaningful if an A64 block falls back to an
    /// A32 interpreter view (exception return, mode switch).
    pub cpsr: u32,
    /// NZCV packed as bits 31-28, matching the guest flag word layout so
    /// `GetNzcv`/`SetNzcv` are a single masked load/store.
    pub nzcv: u32,
    pub fpscr: u32,
    pub halt_requested: u32,
    /// Scratch single-bit condition written by whichever translation produced
    /// a `CheckBit` terminal (A64 `CBZ`/`CBNZ`/`TBZ`/`TBNZ` lowering), read by
    /// the backend's `CheckBit` dispatch instead of re-deriving it from NZCV.
    pub term_bit: u32,
    pub cycles_remaining: i64,
    pub vector: [u128; 32],
    /// Return-stack-buffer prediction ring: `(return_address, location_value)`.
    pub rsb: [(u64, u64); RSB_SIZE],
    pub rsb_next: u32,
    /// Host callee-saved registers (RBX, RBP, R12-R15, plus RSP) saved by
    /// the dispatcher's entry trampoline and restored on exit; emitted code
    /// never touches this directly, only `ReturnToDispatch`'s trampoline.
    pub host_saved: [u64; 6],
}

pub const RSB_SIZE: usize = 8;

impl JitState {
    pub fn new() -> Self {
        JitState {
            gpr: [0; 31],
            sp: 0,
            pc: 0,
            cpsr: 0,
            nzcv: 0,
            fpscr: 0,
            halt_requested: 0,
            term_bit: 0,
            cycles_remaining: 0,
            vector: [0; 32],
            rsb: [(0, 0); RSB_SIZE],
            rsb_next: 0,
            host_saved: [0; 6],
        }
    }
}

impl Default for JitState {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte offsets of `JitState` fields, verified against the real struct
/// layout by `memoffset::offset_of!` in this crate's tests. Emit routines
/// reference these constants exclusively; nothing in `emit.rs` computes an
/// offset by hand.
pub mod abi {
    use super::JitState;
    use memoffset::offset_of;

    pub const GPR: usize = offset_of!(JitState, gpr);
    pub const SP: usize = offset_of!(JitState, sp);
    pub const PC: usize = offset_of!(JitState, pc);
    pub const CPSR: usize = offset_of!(JitState, cpsr);
    pub const NZCV: usize = offset_of!(JitState, nzcv);
    pub const FPSCR: usize = offset_of!(JitState, fpscr);
    pub const HALT_REQUESTED: usize = offset_of!(JitState, halt_requested);
    pub const TERM_BIT: usize = offset_of!(JitState, term_bit);
    pub const CYCLES_REMAINING: usize = offset_of!(JitState, cycles_remaining);
    pub const VECTOR: usize = offset_of!(JitState, vector);
    pub const RSB: usize = offset_of!(JitState, rsb);
    pub const RSB_NEXT: usize = offset_of!(JitState, rsb_next);
    pub const HOST_SAVED: usize = offset_of!(JitState, host_saved);

    pub fn gpr_offset(index: u8) -> usize {
        GPR + index as usize * 8
    }

    pub fn vector_offset(index: u8) -> usize {
        VECTOR + index as usize * 16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpr_is_the_first_field() {
        assert_eq!(abi::GPR, 0);
    }

    #[test]
    fn gpr_offset_is_stride_eight() {
        assert_eq!(abi::gpr_offset(1) - abi::gpr_offset(0), 8);
        assert_eq!(abi::gpr_offset(5), abi::GPR + 40);
    }

    #[test]
    fn vector_offset_is_stride_sixteen() {
        assert_eq!(abi::vector_offset(1) - abi::vector_offset(0), 16);
    }
}
