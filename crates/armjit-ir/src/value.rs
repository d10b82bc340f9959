use crate::inst::ValueId;

macro_rules! typed_value {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub ValueId);

        impl $name {
            pub fn id(self) -> ValueId {
                self.0
            }
        }
    };
}

typed_value!(U1);
typed_value!(U8);
typed_value!(U16);
typed_value!(U32);
typed_value!(U64);
typed_value!(U128);
typed_value!(Nzcv);

/// A value that may be either 32- or 64-bit wide, for builder methods whose
/// guest ISA form exists at both widths (e.g. shifts, arithmetic, extends).
/// The emitter parameterizes by the variant's width rather than duplicating
/// every such method once per width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum U32U64 {
    U32(U32),
    U64(U64),
}

impl U32U64 {
    pub fn id(self) -> ValueId {
        match self {
            U32U64::U32(v) => v.id(),
            U32U64::U64(v) => v.id(),
        }
    }

    pub fn bit_size(self) -> usize {
        match self {
            U32U64::U32(_) => 32,
            U32U64::U64(_) => 64,
        }
    }
}

impl From<U32> for U32U64 {
    fn from(v: U32) -> Self {
        U32U64::U32(v)
    }
}

impl From<U64> for U32U64 {
    fn from(v: U64) -> Self {
        U32U64::U64(v)
    }
}

/// Pairs a primary result with a secondary carry-out consumer value, the
/// representation of dynarmic's `ResultAndCarry<T>` paired-result
/// convention: the carry is a distinct `GetCarryFromOp` consumer instruction
/// rather than a second positional return value, so that an un-consumed
/// carry output costs nothing at emission (codegen only emits the consumer
/// it finds in the producer's use-list).
#[derive(Debug, Clone, Copy)]
pub struct ResultAndCarry<T> {
    pub result: T,
    pub carry: U1,
}

#[derive(Debug, Clone, Copy)]
pub struct ResultAndOverflow<T> {
    pub result: T,
    pub overflow: U1,
}

#[derive(Debug, Clone, Copy)]
pub struct ResultAndCarryAndOverflow<T> {
    pub result: T,
    pub carry: U1,
    pub overflow: U1,
}

#[derive(Debug, Clone, Copy)]
pub struct ResultAndGE<T> {
    pub result: T,
    pub ge: U32,
}
