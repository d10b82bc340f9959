//! Public facade over the translation/optimization/backend/runtime
//! pipeline: `Jit`, the `UserCallbacks` host contract, construction-time
//! `JitConfig`, and the guest register/flag/PC accessors (`GuestState`).
//! Everything below this (`armjit_runtime`, `armjit_backend_x64`, …) is
//! internal plumbing an embedder never names directly.

pub mod callbacks;
pub mod config;
pub mod error;
pub mod jit;
pub mod state;

pub use callbacks::{Coprocessor, UserCallbacks, PAGE_BITS, PAGE_TABLE_ENTRIES};
pub use config::JitConfig;
pub use error::Error;
pub use jit::Jit;
pub use state::GuestState;

pub use armjit_ir::AddrRange;
pub use armjit_types::ExecMode;
