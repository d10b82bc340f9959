//! A single growable region of executable memory compiled blocks are copied
//! into. Grounded on the mmap-backed arena pattern used for hot-path
//! guest-memory/JIT buffers in comparable emulator crates in this pack
//! (the RISC-V simulator's mmap-based DRAM allocation); here the region
//! holds host machine code rather than guest RAM.
//!
//! No W^X toggling: the region is mapped read/write/exec for its whole
//! lifetime. A hardened embedding would mprotect to RX between patches;
//! that's out of scope here.

use std::ptr::NonNull;

/// `mov rax, rcx; ret` — the shared landing pad an unresolved block-link
/// patch jumps to. RCX carries the packed `LocationDescriptor` the paired
/// `MovImmediateToRcx` site set; moving it to RAX before returning hands it
/// to the dispatcher trampoline, whose contract is "RAX = 0 means done,
/// nonzero RAX is a location to resolve and re-enter".
const RESOLVE_STUB: &[u8] = &[0x48, 0x89, 0xC8, 0xC3];

pub struct CodeBuffer {
    base: NonNull<u8>,
    capacity: usize,
    stub_len: usize,
    len: usize,
}

// SAFETY: `CodeBuffer` owns its mapping exclusively; the runtime serializes
// all mutation through `&mut` access per the single-threaded-per-instance
// execution model.
unsafe impl Send for CodeBuffer {}

impl CodeBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                capacity,
                libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        assert_ne!(ptr, libc::MAP_FAILED, "mmap failed for JIT code buffer");
        let mut buf = CodeBuffer {
            base: NonNull::new(ptr as *mut u8).unwrap(),
            capacity,
            stub_len: RESOLVE_STUB.len(),
            len: 0,
        };
        buf.append(RESOLVE_STUB);
        buf
    }

    /// The fixed address of the shared unresolved-link landing pad, stable
    /// across `clear()` (it lives before the truncation point).
    pub fn resolve_stub_address(&self) -> u64 {
        self.base.as_ptr() as u64
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == self.stub_len
    }

    pub fn base_ptr(&self) -> *const u8 {
        self.base.as_ptr()
    }

    /// Address the next call to `append` would land at, for computing a
    /// block's intended `rip` before it's actually encoded.
    pub fn next_address(&self) -> u64 {
        self.base.as_ptr() as u64 + self.len as u64
    }

    /// Copies `code` to the end of the buffer and returns its start offset.
    /// Panics on overflow: the runtime is expected to `clear` well before
    /// that, per `ClearCache`'s "truncate and start over" semantics.
    pub fn append(&mut self, code: &[u8]) -> usize {
        let offset = self.len;
        assert!(offset + code.len() <= self.capacity, "JIT code buffer exhausted");
        unsafe {
            std::ptr::copy_nonoverlapping(code.as_ptr(), self.base.as_ptr().add(offset), code.len());
        }
        self.len += code.len();
        offset
    }

    /// Overwrites `len` bytes at `offset` in place — how patch sites are
    /// relinked/unlinked without recompiling the surrounding block.
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) {
        assert!(offset + bytes.len() <= self.len);
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.base.as_ptr().add(offset), bytes.len());
        }
    }

    /// `ClearCache`: the buffer is logically emptied (apart from the
    /// permanent resolve stub); nothing is unmapped, so in-flight pointers
    /// into it are merely stale, never dangling.
    pub fn clear(&mut self) {
        self.len = self.stub_len;
    }
}

impl Drop for CodeBuffer {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.capacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_starts_after_the_reserved_resolve_stub() {
        let mut buf = CodeBuffer::with_capacity(4096);
        let stub_len = buf.len();
        let a = buf.append(&[0x90, 0x90]);
        let b = buf.append(&[0xC3]);
        assert_eq!(a, stub_len);
        assert_eq!(b, stub_len + 2);
        assert_eq!(buf.len(), stub_len + 3);
    }

    #[test]
    fn clear_resets_length_to_just_the_stub_without_unmapping() {
        let mut buf = CodeBuffer::with_capacity(4096);
        let stub_len = buf.len();
        buf.append(&[0x90; 16]);
        buf.clear();
        assert_eq!(buf.len(), stub_len);
        assert_eq!(buf.append(&[0xC3]), stub_len);
    }

    #[test]
    fn resolve_stub_address_is_the_buffer_base() {
        let buf = CodeBuffer::with_capacity(4096);
        assert_eq!(buf.resolve_stub_address(), buf.base_ptr() as u64);
    }
}
