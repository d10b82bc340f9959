//! Owns the JIT state layout's backing storage, the executable code buffer,
//! the block cache and its address-range invalidation index, and the
//! dispatcher that ties translation, compilation, and patch relinking
//! together into one re-entrant-safe lookup (`armjit`'s facade crate is the
//! only thing above this that guest-facing callers touch).

pub mod addr_index;
pub mod block_cache;
pub mod code_buffer;
pub mod dispatcher;
pub mod patch_codec;

pub use addr_index::AddrIndex;
pub use block_cache::{BlockCache, CacheEntry};
pub use code_buffer::CodeBuffer;
pub use dispatcher::Dispatcher;
