//! The declarative opcode manifest.
//!
//! One enum plus one metadata function drives the IR builder's static type
//! checking, the optimizer's side-effect/reordering-barrier analysis, and the
//! backend's opcode-to-emit-routine dispatch table. Replicating this table
//! across four layers (as the original frontend/IR/optimizer/backend split
//! tended to) is exactly the drift this manifest exists to prevent.

use crate::Type;

/// The microinstruction vocabulary. Every `Inst` in a `Block` carries exactly
/// one of these as its opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Opcode {
    // -- Immediates (zero-operand producers) --
    ImmU1,
    ImmU8,
    ImmU16,
    ImmU32,
    ImmU64,
    ImmRegRef,

    // -- Guest architectural state accessors --
    GetRegister,
    SetRegister,
    GetExtendedRegister32,
    SetExtendedRegister32,
    GetExtendedRegister64,
    SetExtendedRegister64,
    GetVector,
    SetVector,
    GetCpsr,
    SetCpsr,
    GetNzcv,
    SetNzcv,
    GetPc,
    SetPc,
    GetNFlag,
    SetNFlag,
    GetZFlag,
    SetZFlag,
    GetCFlag,
    SetCFlag,
    GetVFlag,
    SetVFlag,

    // -- Bit-level primitives --
    Pack2x32To1x64,
    LeastSignificantWord,
    MostSignificantWord,
    LeastSignificantHalf,
    LeastSignificantByte,
    MostSignificantBit,
    IsZero,
    TestBit,
    ConditionalSelect,

    // -- Shifts (plain and carry-returning) --
    LogicalShiftLeft,
    LogicalShiftRight,
    ArithmeticShiftRight,
    RotateRight,
    RotateRightExtended,

    // -- Arithmetic --
    AddWithCarry,
    SubWithCarry,
    Add,
    Sub,
    Mul,
    UnsignedMultiplyHigh,
    SignedMultiplyHigh,
    UnsignedDiv,
    SignedDiv,

    // -- Logical --
    And,
    Eor,
    Or,
    Not,

    // -- Extension --
    SignExtendByteToWord,
    SignExtendHalfToWord,
    SignExtendWordToLong,
    ZeroExtendByteToWord,
    ZeroExtendHalfToWord,
    ZeroExtendWordToLong,
    ZeroExtendToQuad,

    // -- Byte-reverse / bit-count --
    ByteReverseWord,
    ByteReverseHalf,
    ByteReverseDual,
    CountLeadingZeros,
    ExtractRegister,

    // -- Saturating arithmetic --
    SignedSaturatedAdd,
    SignedSaturatedSub,
    UnsignedSaturation,
    SignedSaturation,

    // -- Packed (SIMD-within-GPR) arithmetic with GE-flag outputs --
    PackedAddU8,
    PackedAddS8,
    PackedSubU8,
    PackedSubS8,
    PackedAddU16,
    PackedAddS16,
    PackedSubU16,
    PackedSubS16,
    PackedHalvingAddU8,
    PackedHalvingSubU8,
    PackedSaturatedAddU8,
    PackedSaturatedSubU8,
    PackedSelect,

    // -- 128-bit vector ops --
    VectorGetElement,
    VectorAdd8,
    VectorAdd16,
    VectorAdd32,
    VectorAdd64,
    VectorAnd,
    VectorOr,
    VectorEor,
    VectorNot,
    VectorEqual8,
    VectorEqual16,
    VectorEqual32,
    VectorEqual64,
    VectorPairedAdd8,
    VectorPairedAdd16,
    VectorPairedAdd32,
    VectorPairedAdd64,
    VectorLowerBroadcast8,
    VectorLowerBroadcast16,
    VectorLowerBroadcast32,

    // -- Scalar floating point --
    FPAdd32,
    FPAdd64,
    FPSub32,
    FPSub64,
    FPMul32,
    FPMul64,
    FPDiv32,
    FPDiv64,
    FPSqrt32,
    FPSqrt64,
    FPAbs32,
    FPAbs64,
    FPNeg32,
    FPNeg64,

    // -- Pseudo-ops --
    /// Attaches a flags consumer to the unique upstream op producing NZCV.
    NZCVFrom,
    /// Reads the secondary (carry) output of a paired-result producer op.
    GetCarryFromOp,
    /// Reads the secondary (overflow) output of a paired-result producer op.
    GetOverflowFromOp,
    /// Reads the secondary (GE) output of a packed-arithmetic producer op.
    GetGEFromOp,

    // -- Control / external call opcodes --
    PushRSB,
    CallSupervisor,
    ExceptionRaised,
    ReadMemU8,
    ReadMemU16,
    ReadMemU32,
    ReadMemU64,
    WriteMemU8,
    WriteMemU16,
    WriteMemU32,
    WriteMemU64,
}

/// Static metadata for one opcode: its result type, the types its operands
/// must satisfy (verified by both the IR builder and the `Verification`
/// pass), whether it has an externally observable side effect (a reordering
/// barrier for the optimizer), and a relative emission cost used by register
/// allocation heuristics.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    pub result: Type,
    pub operands: &'static [Type],
    pub has_side_effect: bool,
    pub cost: u32,
}

const fn info(result: Type, operands: &'static [Type], has_side_effect: bool, cost: u32) -> OpcodeInfo {
    OpcodeInfo {
        result,
        operands,
        has_side_effect,
        cost,
    }
}

/// Looks up the declared signature and side-effect flag for `op`.
///
/// This is the single source of truth consulted by `armjit-ir`'s builder
/// (static operand-type checks), `armjit-opt`'s `DeadCodeElimination` and
/// reordering-barrier analysis, and `armjit-backend-x64`'s opcode dispatch
/// table construction.
pub fn manifest(op: Opcode) -> OpcodeInfo {
    use Opcode::*;
    use Type::*;

    match op {
        ImmU1 => info(U1, &[], false, 1),
        ImmU8 => info(U8, &[], false, 1),
        ImmU16 => info(U16, &[], false, 1),
        ImmU32 => info(U32, &[], false, 1),
        ImmU64 => info(U64, &[], false, 1),
        ImmRegRef => info(Void, &[], false, 0),

        GetRegister => info(U32, &[], false, 1),
        SetRegister => info(Void, &[U32], true, 1),
        GetExtendedRegister32 => info(U32, &[], false, 1),
        SetExtendedRegister32 => info(Void, &[U32], true, 1),
        GetExtendedRegister64 => info(U64, &[], false, 1),
        SetExtendedRegister64 => info(Void, &[U64], true, 1),
        GetVector => info(U128, &[], false, 1),
        SetVector => info(Void, &[U128], true, 1),
        GetCpsr => info(U32, &[], false, 1),
        SetCpsr => info(Void, &[U32], true, 1),
        GetNzcv => info(Nzcv, &[], false, 1),
        SetNzcv => info(Void, &[Nzcv], true, 1),
        GetPc => info(U64, &[], false, 1),
        SetPc => info(Void, &[U64], true, 1),
        GetNFlag | GetZFlag | GetCFlag | GetVFlag => info(U1, &[], false, 1),
        SetNFlag | SetZFlag | SetCFlag | SetVFlag => info(Void, &[U1], true, 1),

        Pack2x32To1x64 => info(U64, &[U32, U32], false, 1),
        LeastSignificantWord => info(U32, &[U64], false, 1),
        MostSignificantWord => info(U32, &[U64], false, 1),
        LeastSignificantHalf => info(U16, &[U32], false, 1),
        LeastSignificantByte => info(U8, &[U32U64], false, 1),
        MostSignificantBit => info(U1, &[U32], false, 1),
        IsZero => info(U1, &[U32U64], false, 1),
        TestBit => info(U1, &[U32U64, U8], false, 1),
        ConditionalSelect => info(U32U64, &[U1, U32U64, U32U64], false, 1),

        LogicalShiftLeft | LogicalShiftRight | ArithmeticShiftRight | RotateRight => {
            info(U32U64, &[U32U64, U8, U1], false, 1)
        }
        RotateRightExtended => info(U32, &[U32, U1], false, 1),

        AddWithCarry | SubWithCarry => info(U32U64, &[U32U64, U32U64, U1], false, 1),
        Add | Sub | Mul => info(U32U64, &[U32U64, U32U64], false, 1),
        UnsignedMultiplyHigh | SignedMultiplyHigh => info(U32U64, &[U32U64, U32U64], false, 3),
        UnsignedDiv | SignedDiv => info(U32U64, &[U32U64, U32U64], false, 20),

        And | Eor | Or => info(U32U64, &[U32U64, U32U64], false, 1),
        Not => info(U32U64, &[U32U64], false, 1),

        SignExtendByteToWord => info(U32, &[U8], false, 1),
        SignExtendHalfToWord => info(U32, &[U16], false, 1),
        SignExtendWordToLong => info(U64, &[U32], false, 1),
        ZeroExtendByteToWord => info(U32, &[U8], false, 1),
        ZeroExtendHalfToWord => info(U32, &[U16], false, 1),
        ZeroExtendWordToLong => info(U64, &[U32], false, 1),
        ZeroExtendToQuad => info(U128, &[U64], false, 1),

        ByteReverseWord => info(U32, &[U32], false, 1),
        ByteReverseHalf => info(U16, &[U16], false, 1),
        ByteReverseDual => info(U64, &[U64], false, 1),
        CountLeadingZeros => info(U32U64, &[U32U64], false, 2),
        ExtractRegister => info(U32U64, &[U32U64, U32U64, U8], false, 2),

        SignedSaturatedAdd | SignedSaturatedSub => info(U32, &[U32, U32], false, 2),
        UnsignedSaturation | SignedSaturation => info(U32, &[U32], false, 2),

        PackedAddU8 | PackedAddS8 | PackedSubU8 | PackedSubS8 | PackedAddU16 | PackedAddS16
        | PackedSubU16 | PackedSubS16 => info(U32, &[U32, U32], false, 2),
        PackedHalvingAddU8 | PackedHalvingSubU8 | PackedSaturatedAddU8 | PackedSaturatedSubU8 => {
            info(U32, &[U32, U32], false, 2)
        }
        PackedSelect => info(U32, &[U32, U32, U32], false, 1),

        VectorGetElement => info(U64, &[U128], false, 1),
        VectorAdd8 | VectorAdd16 | VectorAdd32 | VectorAdd64 => info(U128, &[U128, U128], false, 2),
        VectorAnd | VectorOr | VectorEor => info(U128, &[U128, U128], false, 1),
        VectorNot => info(U128, &[U128], false, 1),
        VectorEqual8 | VectorEqual16 | VectorEqual32 | VectorEqual64 => {
            info(U128, &[U128, U128], false, 2)
        }
        VectorPairedAdd8 | VectorPairedAdd16 | VectorPairedAdd32 | VectorPairedAdd64 => {
            info(U128, &[U128, U128], false, 3)
        }
        VectorLowerBroadcast8 => info(U128, &[U8], false, 1),
        VectorLowerBroadcast16 => info(U128, &[U16], false, 1),
        VectorLowerBroadcast32 => info(U128, &[U32], false, 1),

        FPAdd32 | FPSub32 | FPMul32 | FPDiv32 => info(U32, &[U32, U32], false, 4),
        FPAdd64 | FPSub64 | FPMul64 | FPDiv64 => info(U64, &[U64, U64], false, 4),
        FPSqrt32 => info(U32, &[U32], false, 6),
        FPSqrt64 => info(U64, &[U64], false, 6),
        FPAbs32 | FPNeg32 => info(U32, &[U32], false, 1),
        FPAbs64 | FPNeg64 => info(U64, &[U64], false, 1),

        NZCVFrom => info(Nzcv, &[Void], false, 0),
        GetCarryFromOp | GetOverflowFromOp | GetGEFromOp => info(U1, &[Void], false, 0),

        PushRSB => info(Void, &[U64], true, 1),
        CallSupervisor => info(Void, &[U32], true, 50),
        ExceptionRaised => info(Void, &[U64, U64], true, 50),
        ReadMemU8 => info(U8, &[U64], true, 10),
        ReadMemU16 => info(U16, &[U64], true, 10),
        ReadMemU32 => info(U32, &[U64], true, 10),
        ReadMemU64 => info(U64, &[U64], true, 10),
        WriteMemU8 => info(Void, &[U64, U8], true, 10),
        WriteMemU16 => info(Void, &[U64, U16], true, 10),
        WriteMemU32 => info(Void, &[U64, U32], true, 10),
        WriteMemU64 => info(Void, &[U64, U64], true, 10),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_effectful_opcodes_never_have_void_operand_placeholder_mismatch() {
        // Pseudo-ops (NZCVFrom/GetCarryFromOp/...) use a `Void` placeholder operand
        // because their true operand is found via use-list search, not positional
        // operand reference; everything else declares real operand types.
        for op in [Opcode::Add, Opcode::WriteMemU32, Opcode::CallSupervisor] {
            let m = manifest(op);
            assert!(!m.operands.contains(&Type::Void));
        }
    }

    #[test]
    fn memory_and_supervisor_ops_are_reordering_barriers() {
        for op in [
            Opcode::ReadMemU32,
            Opcode::WriteMemU32,
            Opcode::CallSupervisor,
            Opcode::SetRegister,
        ] {
            assert!(manifest(op).has_side_effect);
        }
        for op in [Opcode::Add, Opcode::And, Opcode::ImmU32] {
            assert!(!manifest(op).has_side_effect);
        }
    }
}
