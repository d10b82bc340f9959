//! Typed SSA intermediate representation: basic blocks, the instruction
//! arena, the opaque guest-location key, and the builder API translators use
//! to construct them.

pub mod block;
pub mod emitter;
pub mod inst;
pub mod location;
pub mod terminal;
pub mod value;

pub use block::{AddrRange, Block};
pub use emitter::IREmitter;
pub use inst::{Imm, Inst, ValueId};
pub use location::LocationDescriptor;
pub use terminal::Terminal;
pub use value::{
    Nzcv, ResultAndCarry, ResultAndCarryAndOverflow, ResultAndGE, ResultAndOverflow, U32U64, U1,
    U128, U16, U32, U64, U8,
};
