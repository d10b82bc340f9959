//! The single host-language entry point: looks up or translates+compiles a
//! block for a guest descriptor, applies patch relinking, and tracks the
//! JIT state the dispatcher trampoline's entry/exit convention reads and
//! writes through `R15`.

use crate::block_cache::{BlockCache, CacheEntry};
use crate::code_buffer::CodeBuffer;
use crate::patch_codec;
use armjit_backend_x64::{compile_block, JitState, PatchKind};
use armjit_ir::{AddrRange, LocationDescriptor};
use armjit_opt::{optimize_block, ReadOnlyMemoryOracle};
use armjit_translate::{translate_a32_block, translate_a64_block, translate_thumb_block, ReadCode};
use armjit_types::ExecMode;
use std::collections::HashMap;

const DEFAULT_CODE_CAPACITY: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
struct LinkSite {
    abs_addr: u64,
    kind: PatchKind,
}

pub struct Dispatcher {
    pub state: Box<JitState>,
    code: CodeBuffer,
    cache: BlockCache,
    /// Inbound jump/near-call patch sites per target location, across every
    /// compiled block currently holding one — used to relink a site once
    /// its target compiles, and to unlink it if the target is invalidated.
    links: HashMap<LocationDescriptor, Vec<LinkSite>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher {
            state: Box::new(JitState::new()),
            code: CodeBuffer::with_capacity(DEFAULT_CODE_CAPACITY),
            cache: BlockCache::new(),
            links: HashMap::new(),
        }
    }

    pub fn code_base(&self) -> u64 {
        self.code.base_ptr() as u64
    }

    /// Entry address for `desc`, translating and compiling it first if it
    /// isn't already cached.
    pub fn resolve(
        &mut self,
        desc: LocationDescriptor,
        read: &mut dyn ReadCode,
        memory: Option<&dyn ReadOnlyMemoryOracle>,
    ) -> u64 {
        if let Some(entry) = self.cache.get(&desc) {
            return entry.entry_address(self.code_base());
        }
        let mut block = match desc.mode() {
            ExecMode::A32 => translate_a32_block(desc, read),
            ExecMode::Thumb => translate_thumb_block(desc, read),
            ExecMode::A64 => translate_a64_block(desc, read),
        };
        optimize_block(&mut block, desc.mode(), memory);

        let rip = self.code.next_address();
        let compiled = compile_block(&block, rip).expect("backend compilation failed");
        let code_offset = self.code.append(&compiled.code);

        self.initialize_patch_sites(code_offset, &compiled.patches);

        // Translators record per-instruction ranges only when they merge
        // interpreter blocks; a block with none still covers
        // `[start, end)` in guest-address space, so fall back to that span
        // rather than leaving the block unreachable by address-range
        // invalidation.
        let addr_ranges = if block.addr_ranges.is_empty() {
            vec![AddrRange { start: desc.pc(), end: block.end_location().pc() }]
        } else {
            block.addr_ranges.clone()
        };

        self.cache.insert(
            desc,
            CacheEntry {
                code_offset,
                code_len: compiled.code.len(),
                patches: compiled.patches,
                addr_ranges,
            },
        );
        self.relink_inbound(desc);
        self.cache.get(&desc).unwrap().entry_address(self.code_base())
    }

    /// Writes each of a freshly compiled block's own jump/mov-rcx patch
    /// sites: to its target's current entry if already compiled, else to
    /// the shared resolve stub — and registers jump/call sites into `links`
    /// so a later compile of the target can relink them.
    fn initialize_patch_sites(&mut self, code_offset: usize, patches: &[armjit_backend_x64::PatchSite]) {
        let base = self.code_base();
        for patch in patches {
            let abs_addr = base + code_offset as u64 + patch.code_offset as u64;
            match patch.kind {
                PatchKind::MovImmediateToRcx => {
                    let bytes = patch_codec::encode(patch.kind, abs_addr, patch.target.value());
                    self.code.patch(code_offset + patch.code_offset, &bytes);
                }
                PatchKind::ConditionalNear | PatchKind::UnconditionalNear => {
                    let dest = self
                        .cache
                        .get(&patch.target)
                        .map(|e| e.entry_address(base))
                        .unwrap_or_else(|| self.code.resolve_stub_address());
                    let bytes = patch_codec::encode(patch.kind, abs_addr, dest);
                    self.code.patch(code_offset + patch.code_offset, &bytes);
                    self.links.entry(patch.target).or_default().push(LinkSite { abs_addr, kind: patch.kind });
                }
            }
        }
    }

    /// Rewrites every other block's jump patch currently targeting `desc`
    /// to point at `desc`'s freshly compiled entry, now that it exists.
    fn relink_inbound(&mut self, desc: LocationDescriptor) {
        let Some(sites) = self.links.get(&desc) else { return };
        let dest = self.cache.get(&desc).unwrap().entry_address(self.code_base());
        for site in sites.clone() {
            let bytes = patch_codec::encode(site.kind, site.abs_addr, dest);
            let offset = (site.abs_addr - self.code_base()) as usize;
            self.code.patch(offset, &bytes);
        }
    }

    /// Rewrites every inbound jump patch targeting `desc` back to the
    /// shared resolve stub, and forgets the registration — used when
    /// `desc`'s block is invalidated.
    fn unlink_inbound(&mut self, desc: &LocationDescriptor) {
        let Some(sites) = self.links.remove(desc) else { return };
        let stub = self.code.resolve_stub_address();
        for site in sites {
            let bytes = patch_codec::encode(site.kind, site.abs_addr, stub);
            let offset = (site.abs_addr - self.code_base()) as usize;
            self.code.patch(offset, &bytes);
        }
    }

    /// Drops a removed block's own outgoing jump/call registrations from
    /// `links` so a later compile of one of its targets doesn't waste a
    /// relink write into now-unreachable code.
    fn forget_outgoing(&mut self, code_offset: usize, patches: &[armjit_backend_x64::PatchSite]) {
        let base = self.code_base();
        for patch in patches {
            if matches!(patch.kind, PatchKind::MovImmediateToRcx) {
                continue;
            }
            let abs_addr = base + code_offset as u64 + patch.code_offset as u64;
            if let Some(sites) = self.links.get_mut(&patch.target) {
                sites.retain(|s| s.abs_addr != abs_addr);
            }
        }
    }

    pub fn invalidate_ranges(&mut self, ranges: &[AddrRange]) {
        for (desc, entry) in self.cache.invalidate_ranges(ranges) {
            self.unlink_inbound(&desc);
            self.forget_outgoing(entry.code_offset, &entry.patches);
        }
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.links.clear();
        self.code.clear();
    }

    pub fn is_cached(&self, desc: &LocationDescriptor) -> bool {
        self.cache.contains(desc)
    }

    pub fn cached_block_count(&self) -> usize {
        self.cache.len()
    }

    /// Enters compiled code at `entry`, pinning `R15` to the JIT state block
    /// for the duration of the call. Every compiled block and the shared
    /// resolve stub return through this convention: `rax` is 0 on a full
    /// return to the dispatcher, or a nonzero packed `LocationDescriptor`
    /// when a patch site that hasn't been relinked yet needs resolving.
    ///
    /// # Safety
    /// `entry` must be a valid address inside this dispatcher's code buffer.
    pub unsafe fn enter_compiled_code(&mut self, entry: u64) -> u64 {
        let state_ptr: *mut JitState = &mut *self.state;
        let result: u64;
        std::arch::asm!(
            "call {entry}",
            entry = in(reg) entry,
            in("r15") state_ptr,
            lateout("rax") result,
            out("rcx") _,
            out("rdx") _,
            out("rsi") _,
            out("rdi") _,
            out("r8") _,
            out("r9") _,
            out("r10") _,
            out("r11") _,
        );
        result
    }

    /// Runs until the guest halts or the cycle budget is exhausted.
    /// `pc`/`mode`/`fpcr_bits` seed the first lookup; subsequent iterations
    /// resolve the packed location the last return handed back in `rax`.
    pub fn run(&mut self, start: LocationDescriptor, read: &mut dyn ReadCode, memory: Option<&dyn ReadOnlyMemoryOracle>) {
        let mut next = self.resolve(start, read, memory);
        while self.state.cycles_remaining > 0 && self.state.halt_requested == 0 {
            let rax = unsafe { self.enter_compiled_code(next) };
            if rax == 0 {
                break;
            }
            let desc = LocationDescriptor::from_raw(rax);
            next = self.resolve(desc, read, memory);
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AllOnes;
    impl ReadCode for AllOnes {
        fn read32(&mut self, _pc: u64) -> u32 {
            0xFFFF_FFFF
        }
        fn read16(&mut self, _pc: u64) -> u16 {
            0xFFFF
        }
    }

    #[test]
    fn resolving_the_same_location_twice_reuses_the_cached_entry() {
        let mut dispatcher = Dispatcher::new();
        let desc = LocationDescriptor::new(0x1000, ExecMode::A64, 0);
        let mut read = AllOnes;
        let a = dispatcher.resolve(desc, &mut read, None);
        let b = dispatcher.resolve(desc, &mut read, None);
        assert_eq!(a, b);
        assert_eq!(dispatcher.cached_block_count(), 1);
    }

    #[test]
    fn invalidate_ranges_evicts_the_cached_block() {
        let mut dispatcher = Dispatcher::new();
        let desc = LocationDescriptor::new(0x1000, ExecMode::A64, 0);
        let mut read = AllOnes;
        dispatcher.resolve(desc, &mut read, None);
        assert!(dispatcher.is_cached(&desc));
        dispatcher.invalidate_ranges(&[AddrRange { start: 0x1000, end: 0x1004 }]);
        assert!(!dispatcher.is_cached(&desc));
    }

    #[test]
    fn clear_cache_empties_everything() {
        let mut dispatcher = Dispatcher::new();
        let desc = LocationDescriptor::new(0x1000, ExecMode::A64, 0);
        let mut read = AllOnes;
        dispatcher.resolve(desc, &mut read, None);
        dispatcher.clear_cache();
        assert_eq!(dispatcher.cached_block_count(), 0);
    }
}
