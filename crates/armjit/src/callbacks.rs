//! The host callback surface a `Jit` is constructed with: guest memory
//! access, the interpreter fallback used for `Step` and `DecodeMiss`
//! recovery, supervisor calls, and timing.

use crate::state::GuestState;

pub const PAGE_BITS: u32 = 12;
pub const PAGE_TABLE_ENTRIES: usize = 1 << (32 - PAGE_BITS);

/// A guest coprocessor handle (A32 only). No coprocessor access is
/// currently emitted by any translator; the slot exists so a `JitConfig`
/// mirrors the source's fixed 16-entry array.
pub trait Coprocessor: Send {}

pub trait UserCallbacks: Send {
    /// Always a 4-byte-aligned fetch. Thumb's 16-bit units are carved out
    /// of the containing aligned word by the bridge between this trait and
    /// `armjit_translate::ReadCode`.
    fn read_code(&mut self, vaddr: u64) -> u32;

    fn read8(&mut self, vaddr: u64) -> u8;
    fn read16(&mut self, vaddr: u64) -> u16;
    fn read32(&mut self, vaddr: u64) -> u32;
    fn read64(&mut self, vaddr: u64) -> u64;
    fn write8(&mut self, vaddr: u64, value: u8);
    fn write16(&mut self, vaddr: u64, value: u16);
    fn write32(&mut self, vaddr: u64, value: u32);
    fn write64(&mut self, vaddr: u64, value: u64);

    /// Conservative `false` is always correct; `true` permits the optimizer
    /// to fold a read at `vaddr` into a compile-time constant.
    fn is_read_only_memory(&mut self, _vaddr: u64) -> bool {
        false
    }

    /// Executes exactly one guest instruction at the state's current PC,
    /// advancing it and any flags/registers the instruction touches.
    fn interpret_one(&mut self, state: &mut GuestState<'_>);

    fn call_svc(&mut self, swi_number: u32);

    fn add_ticks(&mut self, n: u64);
    fn ticks_remaining(&self) -> u64;
}
