use crate::block::Block;
use crate::inst::{Imm, ValueId};
use crate::value::*;
use armjit_types::{Opcode, Type};

/// Convenience wrapper to construct a block's instruction list.
///
/// The translator manipulates IR only through this typed API (§4.2's
/// contract: "it never reads IR node fields directly"); every method here
/// enforces static operand types by construction and appends to the current
/// block's insertion point, which is always the end — this IR never needs
/// mid-block insertion because translation is a single forward pass.
pub struct IREmitter {
    pub block: Block,
}

impl IREmitter {
    pub fn new(block: Block) -> Self {
        IREmitter { block }
    }

    fn push(&mut self, op: Opcode, operands: Vec<ValueId>, imm: Imm, result: Type) -> ValueId {
        self.block.push(op, operands, imm, result)
    }

    // -- Immediates --

    pub fn imm1(&mut self, value: bool) -> U1 {
        U1(self.push(Opcode::ImmU1, vec![], Imm::U1(value), Type::U1))
    }

    pub fn imm8(&mut self, value: u8) -> U8 {
        U8(self.push(Opcode::ImmU8, vec![], Imm::U8(value), Type::U8))
    }

    pub fn imm16(&mut self, value: u16) -> U16 {
        U16(self.push(Opcode::ImmU16, vec![], Imm::U16(value), Type::U16))
    }

    pub fn imm32(&mut self, value: u32) -> U32 {
        U32(self.push(Opcode::ImmU32, vec![], Imm::U32(value), Type::U32))
    }

    pub fn imm64(&mut self, value: u64) -> U64 {
        U64(self.push(Opcode::ImmU64, vec![], Imm::U64(value), Type::U64))
    }

    fn imm_width(&mut self, width: usize, value: u64) -> U32U64 {
        if width == 64 {
            U32U64::U64(self.imm64(value))
        } else {
            U32U64::U32(self.imm32(value as u32))
        }
    }

    // -- Guest architectural state accessors --

    pub fn get_register(&mut self, reg: u8) -> U32 {
        U32(self.push(Opcode::GetRegister, vec![], Imm::RegRef(reg), Type::U32))
    }

    pub fn set_register(&mut self, reg: u8, value: U32) {
        self.push(Opcode::SetRegister, vec![value.id()], Imm::RegRef(reg), Type::Void);
    }

    pub fn get_extended_register(&mut self, reg: u8, width: usize) -> U32U64 {
        if width == 64 {
            U32U64::U64(U64(self.push(
                Opcode::GetExtendedRegister64,
                vec![],
                Imm::RegRef(reg),
                Type::U64,
            )))
        } else {
            U32U64::U32(U32(self.push(
                Opcode::GetExtendedRegister32,
                vec![],
                Imm::RegRef(reg),
                Type::U32,
            )))
        }
    }

    pub fn set_extended_register(&mut self, reg: u8, value: U32U64) {
        match value {
            U32U64::U32(v) => {
                self.push(Opcode::SetExtendedRegister32, vec![v.id()], Imm::RegRef(reg), Type::Void);
            }
            U32U64::U64(v) => {
                self.push(Opcode::SetExtendedRegister64, vec![v.id()], Imm::RegRef(reg), Type::Void);
            }
        }
    }

    pub fn get_vector(&mut self, reg: u8) -> U128 {
        U128(self.push(Opcode::GetVector, vec![], Imm::RegRef(reg), Type::U128))
    }

    pub fn set_vector(&mut self, reg: u8, value: U128) {
        self.push(Opcode::SetVector, vec![value.id()], Imm::RegRef(reg), Type::Void);
    }

    pub fn get_cpsr(&mut self) -> U32 {
        U32(self.push(Opcode::GetCpsr, vec![], Imm::None, Type::U32))
    }

    pub fn set_cpsr(&mut self, value: U32) {
        self.push(Opcode::SetCpsr, vec![value.id()], Imm::None, Type::Void);
    }

    pub fn get_pc(&mut self) -> U64 {
        U64(self.push(Opcode::GetPc, vec![], Imm::None, Type::U64))
    }

    pub fn set_pc(&mut self, value: U64) {
        self.push(Opcode::SetPc, vec![value.id()], Imm::None, Type::Void);
    }

    pub fn get_n_flag(&mut self) -> U1 {
        U1(self.push(Opcode::GetNFlag, vec![], Imm::None, Type::U1))
    }
    pub fn set_n_flag(&mut self, v: U1) {
        self.push(Opcode::SetNFlag, vec![v.id()], Imm::None, Type::Void);
    }
    pub fn get_z_flag(&mut self) -> U1 {
        U1(self.push(Opcode::GetZFlag, vec![], Imm::None, Type::U1))
    }
    pub fn set_z_flag(&mut self, v: U1) {
        self.push(Opcode::SetZFlag, vec![v.id()], Imm::None, Type::Void);
    }
    pub fn get_c_flag(&mut self) -> U1 {
        U1(self.push(Opcode::GetCFlag, vec![], Imm::None, Type::U1))
    }
    pub fn set_c_flag(&mut self, v: U1) {
        self.push(Opcode::SetCFlag, vec![v.id()], Imm::None, Type::Void);
    }
    pub fn get_v_flag(&mut self) -> U1 {
        U1(self.push(Opcode::GetVFlag, vec![], Imm::None, Type::U1))
    }
    pub fn set_v_flag(&mut self, v: U1) {
        self.push(Opcode::SetVFlag, vec![v.id()], Imm::None, Type::Void);
    }

    pub fn get_nzcv(&mut self) -> Nzcv {
        Nzcv(self.push(Opcode::GetNzcv, vec![], Imm::None, Type::Nzcv))
    }
    pub fn set_nzcv(&mut self, v: Nzcv) {
        self.push(Opcode::SetNzcv, vec![v.id()], Imm::None, Type::Void);
    }

    /// This pseudo-instruction may only be attached to instructions whose
    /// opcode declares an NZCV-producing side channel.
    pub fn nzcv_from(&mut self, producer: ValueId) -> Nzcv {
        Nzcv(self.push(Opcode::NZCVFrom, vec![producer], Imm::None, Type::Nzcv))
    }

    // -- Bit-level primitives --

    pub fn pack_2x32_to_1x64(&mut self, lo: U32, hi: U32) -> U64 {
        U64(self.push(Opcode::Pack2x32To1x64, vec![lo.id(), hi.id()], Imm::None, Type::U64))
    }

    pub fn least_significant_word(&mut self, value: U64) -> U32 {
        U32(self.push(Opcode::LeastSignificantWord, vec![value.id()], Imm::None, Type::U32))
    }

    pub fn most_significant_word(&mut self, value: U64) -> ResultAndCarry<U32> {
        let result = U32(self.push(Opcode::MostSignificantWord, vec![value.id()], Imm::None, Type::U32));
        let carry = U1(self.push(Opcode::GetCarryFromOp, vec![result.id()], Imm::None, Type::U1));
        ResultAndCarry { result, carry }
    }

    pub fn least_significant_byte(&mut self, value: U32U64) -> U8 {
        U8(self.push(Opcode::LeastSignificantByte, vec![value.id()], Imm::None, Type::U8))
    }

    pub fn most_significant_bit(&mut self, value: U32) -> U1 {
        U1(self.push(Opcode::MostSignificantBit, vec![value.id()], Imm::None, Type::U1))
    }

    pub fn is_zero(&mut self, value: U32U64) -> U1 {
        U1(self.push(Opcode::IsZero, vec![value.id()], Imm::None, Type::U1))
    }

    pub fn test_bit(&mut self, value: U32U64, bit: U8) -> U1 {
        U1(self.push(Opcode::TestBit, vec![value.id(), bit.id()], Imm::None, Type::U1))
    }

    /// `cond` must already be the evaluated boolean (e.g. from `test_bit` or
    /// an NZCV comparison) — condition codes are resolved by the translator
    /// before reaching the emitter, never carried as IR state themselves.
    pub fn conditional_select(&mut self, cond: U1, a: U32U64, b: U32U64) -> U32U64 {
        debug_assert_eq!(a.bit_size(), b.bit_size());
        let ty = if a.bit_size() == 64 { Type::U64 } else { Type::U32 };
        let id = self.push(Opcode::ConditionalSelect, vec![cond.id(), a.id(), b.id()], Imm::None, ty);
        if ty == Type::U64 {
            U32U64::U64(U64(id))
        } else {
            U32U64::U32(U32(id))
        }
    }

    // -- Shifts --

    fn shift_with_carry(
        &mut self,
        op: Opcode,
        value_in: U32U64,
        shift_amount: U8,
        carry_in: U1,
    ) -> ResultAndCarry<U32U64> {
        let ty = if value_in.bit_size() == 64 { Type::U64 } else { Type::U32 };
        let result_id = self.push(op, vec![value_in.id(), shift_amount.id(), carry_in.id()], Imm::None, ty);
        let carry = U1(self.push(Opcode::GetCarryFromOp, vec![result_id], Imm::None, Type::U1));
        let result = if ty == Type::U64 {
            U32U64::U64(U64(result_id))
        } else {
            U32U64::U32(U32(result_id))
        };
        ResultAndCarry { result, carry }
    }

    pub fn logical_shift_left_c(&mut self, value_in: U32U64, shift: U8, carry_in: U1) -> ResultAndCarry<U32U64> {
        self.shift_with_carry(Opcode::LogicalShiftLeft, value_in, shift, carry_in)
    }

    pub fn logical_shift_right_c(&mut self, value_in: U32U64, shift: U8, carry_in: U1) -> ResultAndCarry<U32U64> {
        self.shift_with_carry(Opcode::LogicalShiftRight, value_in, shift, carry_in)
    }

    pub fn arithmetic_shift_right_c(&mut self, value_in: U32U64, shift: U8, carry_in: U1) -> ResultAndCarry<U32U64> {
        self.shift_with_carry(Opcode::ArithmeticShiftRight, value_in, shift, carry_in)
    }

    pub fn rotate_right_c(&mut self, value_in: U32U64, shift: U8, carry_in: U1) -> ResultAndCarry<U32U64> {
        self.shift_with_carry(Opcode::RotateRight, value_in, shift, carry_in)
    }

    /// Width-polymorphic plain-result shift used when the carry-out is not
    /// consumed: no `GetCarryFromOp` is ever emitted, so the backend never
    /// computes it.
    pub fn logical_shift_left(&mut self, value_in: U32U64, shift: U8) -> U32U64 {
        let carry_in = self.imm1(false);
        self.logical_shift_left_c(value_in, shift, carry_in).result
    }

    pub fn logical_shift_right(&mut self, value_in: U32U64, shift: U8) -> U32U64 {
        let carry_in = self.imm1(false);
        self.logical_shift_right_c(value_in, shift, carry_in).result
    }

    pub fn arithmetic_shift_right(&mut self, value_in: U32U64, shift: U8) -> U32U64 {
        let carry_in = self.imm1(false);
        self.arithmetic_shift_right_c(value_in, shift, carry_in).result
    }

    pub fn rotate_right(&mut self, value_in: U32U64, shift: U8) -> U32U64 {
        let carry_in = self.imm1(false);
        self.rotate_right_c(value_in, shift, carry_in).result
    }

    pub fn rotate_right_extended(&mut self, value_in: U32, carry_in: U1) -> ResultAndCarry<U32> {
        let result = U32(self.push(Opcode::RotateRightExtended, vec![value_in.id(), carry_in.id()], Imm::None, Type::U32));
        let carry = U1(self.push(Opcode::GetCarryFromOp, vec![result.id()], Imm::None, Type::U1));
        ResultAndCarry { result, carry }
    }

    // -- Arithmetic --

    pub fn add_with_carry(&mut self, a: U32U64, b: U32U64, carry_in: U1) -> ResultAndCarryAndOverflow<U32U64> {
        debug_assert_eq!(a.bit_size(), b.bit_size());
        let ty = if a.bit_size() == 64 { Type::U64 } else { Type::U32 };
        let result_id = self.push(Opcode::AddWithCarry, vec![a.id(), b.id(), carry_in.id()], Imm::None, ty);
        let carry = U1(self.push(Opcode::GetCarryFromOp, vec![result_id], Imm::None, Type::U1));
        let overflow = U1(self.push(Opcode::GetOverflowFromOp, vec![result_id], Imm::None, Type::U1));
        let result = if ty == Type::U64 { U32U64::U64(U64(result_id)) } else { U32U64::U32(U32(result_id)) };
        ResultAndCarryAndOverflow { result, carry, overflow }
    }

    pub fn sub_with_carry(&mut self, a: U32U64, b: U32U64, carry_in: U1) -> ResultAndCarryAndOverflow<U32U64> {
        debug_assert_eq!(a.bit_size(), b.bit_size());
        let ty = if a.bit_size() == 64 { Type::U64 } else { Type::U32 };
        let result_id = self.push(Opcode::SubWithCarry, vec![a.id(), b.id(), carry_in.id()], Imm::None, ty);
        let carry = U1(self.push(Opcode::GetCarryFromOp, vec![result_id], Imm::None, Type::U1));
        let overflow = U1(self.push(Opcode::GetOverflowFromOp, vec![result_id], Imm::None, Type::U1));
        let result = if ty == Type::U64 { U32U64::U64(U64(result_id)) } else { U32U64::U32(U32(result_id)) };
        ResultAndCarryAndOverflow { result, carry, overflow }
    }

    pub fn add(&mut self, a: U32U64, b: U32U64) -> U32U64 {
        let carry_in = self.imm1(false);
        self.add_with_carry(a, b, carry_in).result
    }

    pub fn sub(&mut self, a: U32U64, b: U32U64) -> U32U64 {
        let carry_in = self.imm1(true);
        self.sub_with_carry(a, b, carry_in).result
    }

    fn binop(&mut self, op: Opcode, a: U32U64, b: U32U64) -> U32U64 {
        debug_assert_eq!(a.bit_size(), b.bit_size());
        let ty = if a.bit_size() == 64 { Type::U64 } else { Type::U32 };
        let id = self.push(op, vec![a.id(), b.id()], Imm::None, ty);
        if ty == Type::U64 { U32U64::U64(U64(id)) } else { U32U64::U32(U32(id)) }
    }

    pub fn mul(&mut self, a: U32U64, b: U32U64) -> U32U64 {
        self.binop(Opcode::Mul, a, b)
    }
    pub fn unsigned_div(&mut self, a: U32U64, b: U32U64) -> U32U64 {
        self.binop(Opcode::UnsignedDiv, a, b)
    }
    pub fn signed_div(&mut self, a: U32U64, b: U32U64) -> U32U64 {
        self.binop(Opcode::SignedDiv, a, b)
    }
    pub fn and(&mut self, a: U32U64, b: U32U64) -> U32U64 {
        self.binop(Opcode::And, a, b)
    }
    pub fn eor(&mut self, a: U32U64, b: U32U64) -> U32U64 {
        self.binop(Opcode::Eor, a, b)
    }
    pub fn or(&mut self, a: U32U64, b: U32U64) -> U32U64 {
        self.binop(Opcode::Or, a, b)
    }
    pub fn not(&mut self, a: U32U64) -> U32U64 {
        let ty = if a.bit_size() == 64 { Type::U64 } else { Type::U32 };
        let id = self.push(Opcode::Not, vec![a.id()], Imm::None, ty);
        if ty == Type::U64 { U32U64::U64(U64(id)) } else { U32U64::U32(U32(id)) }
    }

    // -- Extension --

    pub fn sign_extend_byte_to_word(&mut self, a: U8) -> U32 {
        U32(self.push(Opcode::SignExtendByteToWord, vec![a.id()], Imm::None, Type::U32))
    }
    pub fn sign_extend_half_to_word(&mut self, a: U16) -> U32 {
        U32(self.push(Opcode::SignExtendHalfToWord, vec![a.id()], Imm::None, Type::U32))
    }
    pub fn sign_extend_word_to_long(&mut self, a: U32) -> U64 {
        U64(self.push(Opcode::SignExtendWordToLong, vec![a.id()], Imm::None, Type::U64))
    }
    pub fn zero_extend_byte_to_word(&mut self, a: U8) -> U32 {
        U32(self.push(Opcode::ZeroExtendByteToWord, vec![a.id()], Imm::None, Type::U32))
    }
    pub fn zero_extend_half_to_word(&mut self, a: U16) -> U32 {
        U32(self.push(Opcode::ZeroExtendHalfToWord, vec![a.id()], Imm::None, Type::U32))
    }
    pub fn zero_extend_word_to_long(&mut self, a: U32) -> U64 {
        U64(self.push(Opcode::ZeroExtendWordToLong, vec![a.id()], Imm::None, Type::U64))
    }
    pub fn zero_extend_to_quad(&mut self, a: U64) -> U128 {
        U128(self.push(Opcode::ZeroExtendToQuad, vec![a.id()], Imm::None, Type::U128))
    }

    // -- Byte-reverse / bit-count / bitfield --

    pub fn byte_reverse_word(&mut self, a: U32) -> U32 {
        U32(self.push(Opcode::ByteReverseWord, vec![a.id()], Imm::None, Type::U32))
    }
    pub fn byte_reverse_half(&mut self, a: U16) -> U16 {
        U16(self.push(Opcode::ByteReverseHalf, vec![a.id()], Imm::None, Type::U16))
    }
    pub fn byte_reverse_dual(&mut self, a: U64) -> U64 {
        U64(self.push(Opcode::ByteReverseDual, vec![a.id()], Imm::None, Type::U64))
    }

    pub fn count_leading_zeros(&mut self, a: U32U64) -> U32U64 {
        let ty = if a.bit_size() == 64 { Type::U64 } else { Type::U32 };
        let id = self.push(Opcode::CountLeadingZeros, vec![a.id()], Imm::None, ty);
        if ty == Type::U64 { U32U64::U64(U64(id)) } else { U32U64::U32(U32(id)) }
    }

    pub fn extract_register(&mut self, a: U32U64, b: U32U64, lsb: U8) -> U32U64 {
        debug_assert_eq!(a.bit_size(), b.bit_size());
        let ty = if a.bit_size() == 64 { Type::U64 } else { Type::U32 };
        let id = self.push(Opcode::ExtractRegister, vec![a.id(), b.id(), lsb.id()], Imm::None, ty);
        if ty == Type::U64 { U32U64::U64(U64(id)) } else { U32U64::U32(U32(id)) }
    }

    // -- Saturating arithmetic --

    pub fn signed_saturated_add(&mut self, a: U32, b: U32) -> ResultAndOverflow<U32> {
        let result = U32(self.push(Opcode::SignedSaturatedAdd, vec![a.id(), b.id()], Imm::None, Type::U32));
        let overflow = U1(self.push(Opcode::GetOverflowFromOp, vec![result.id()], Imm::None, Type::U1));
        ResultAndOverflow { result, overflow }
    }

    pub fn signed_saturated_sub(&mut self, a: U32, b: U32) -> ResultAndOverflow<U32> {
        let result = U32(self.push(Opcode::SignedSaturatedSub, vec![a.id(), b.id()], Imm::None, Type::U32));
        let overflow = U1(self.push(Opcode::GetOverflowFromOp, vec![result.id()], Imm::None, Type::U1));
        ResultAndOverflow { result, overflow }
    }

    pub fn unsigned_saturation(&mut self, a: U32, bit_size_to_saturate_to: u8) -> ResultAndOverflow<U32> {
        let result = U32(self.push(Opcode::UnsignedSaturation, vec![a.id()], Imm::BitCount(bit_size_to_saturate_to), Type::U32));
        let overflow = U1(self.push(Opcode::GetOverflowFromOp, vec![result.id()], Imm::None, Type::U1));
        ResultAndOverflow { result, overflow }
    }

    pub fn signed_saturation(&mut self, a: U32, bit_size_to_saturate_to: u8) -> ResultAndOverflow<U32> {
        let result = U32(self.push(Opcode::SignedSaturation, vec![a.id()], Imm::BitCount(bit_size_to_saturate_to), Type::U32));
        let overflow = U1(self.push(Opcode::GetOverflowFromOp, vec![result.id()], Imm::None, Type::U1));
        ResultAndOverflow { result, overflow }
    }

    // -- Packed (SIMD-within-GPR) arithmetic with GE outputs --

    fn packed_with_ge(&mut self, op: Opcode, a: U32, b: U32) -> ResultAndGE<U32> {
        let result = U32(self.push(op, vec![a.id(), b.id()], Imm::None, Type::U32));
        let ge = U32(self.push(Opcode::GetGEFromOp, vec![result.id()], Imm::None, Type::U32));
        ResultAndGE { result, ge }
    }

    pub fn packed_add_u8(&mut self, a: U32, b: U32) -> ResultAndGE<U32> {
        self.packed_with_ge(Opcode::PackedAddU8, a, b)
    }
    pub fn packed_add_s8(&mut self, a: U32, b: U32) -> ResultAndGE<U32> {
        self.packed_with_ge(Opcode::PackedAddS8, a, b)
    }
    pub fn packed_sub_u8(&mut self, a: U32, b: U32) -> ResultAndGE<U32> {
        self.packed_with_ge(Opcode::PackedSubU8, a, b)
    }
    pub fn packed_sub_s8(&mut self, a: U32, b: U32) -> ResultAndGE<U32> {
        self.packed_with_ge(Opcode::PackedSubS8, a, b)
    }
    pub fn packed_add_u16(&mut self, a: U32, b: U32) -> ResultAndGE<U32> {
        self.packed_with_ge(Opcode::PackedAddU16, a, b)
    }
    pub fn packed_sub_u16(&mut self, a: U32, b: U32) -> ResultAndGE<U32> {
        self.packed_with_ge(Opcode::PackedSubU16, a, b)
    }

    pub fn packed_halving_add_u8(&mut self, a: U32, b: U32) -> U32 {
        U32(self.push(Opcode::PackedHalvingAddU8, vec![a.id(), b.id()], Imm::None, Type::U32))
    }
    pub fn packed_halving_sub_u8(&mut self, a: U32, b: U32) -> U32 {
        U32(self.push(Opcode::PackedHalvingSubU8, vec![a.id(), b.id()], Imm::None, Type::U32))
    }
    pub fn packed_saturated_add_u8(&mut self, a: U32, b: U32) -> U32 {
        U32(self.push(Opcode::PackedSaturatedAddU8, vec![a.id(), b.id()], Imm::None, Type::U32))
    }
    pub fn packed_saturated_sub_u8(&mut self, a: U32, b: U32) -> U32 {
        U32(self.push(Opcode::PackedSaturatedSubU8, vec![a.id(), b.id()], Imm::None, Type::U32))
    }
    pub fn packed_select(&mut self, ge: U32, a: U32, b: U32) -> U32 {
        U32(self.push(Opcode::PackedSelect, vec![ge.id(), a.id(), b.id()], Imm::None, Type::U32))
    }

    // -- 128-bit vector ops --

    pub fn vector_get_element(&mut self, esize: usize, a: U128, index: usize) -> U64 {
        U64(self.push(
            Opcode::VectorGetElement,
            vec![a.id()],
            Imm::U64((esize as u64) << 32 | index as u64),
            Type::U64,
        ))
    }

    fn vector_binop(&mut self, op: Opcode, a: U128, b: U128) -> U128 {
        U128(self.push(op, vec![a.id(), b.id()], Imm::None, Type::U128))
    }

    pub fn vector_add(&mut self, esize: usize, a: U128, b: U128) -> U128 {
        let op = match esize {
            8 => Opcode::VectorAdd8,
            16 => Opcode::VectorAdd16,
            32 => Opcode::VectorAdd32,
            _ => Opcode::VectorAdd64,
        };
        self.vector_binop(op, a, b)
    }

    pub fn vector_and(&mut self, a: U128, b: U128) -> U128 {
        self.vector_binop(Opcode::VectorAnd, a, b)
    }
    pub fn vector_or(&mut self, a: U128, b: U128) -> U128 {
        self.vector_binop(Opcode::VectorOr, a, b)
    }
    pub fn vector_eor(&mut self, a: U128, b: U128) -> U128 {
        self.vector_binop(Opcode::VectorEor, a, b)
    }
    pub fn vector_not(&mut self, a: U128) -> U128 {
        U128(self.push(Opcode::VectorNot, vec![a.id()], Imm::None, Type::U128))
    }

    pub fn vector_equal(&mut self, esize: usize, a: U128, b: U128) -> U128 {
        let op = match esize {
            8 => Opcode::VectorEqual8,
            16 => Opcode::VectorEqual16,
            32 => Opcode::VectorEqual32,
            _ => Opcode::VectorEqual64,
        };
        self.vector_binop(op, a, b)
    }

    pub fn vector_paired_add(&mut self, esize: usize, a: U128, b: U128) -> U128 {
        let op = match esize {
            8 => Opcode::VectorPairedAdd8,
            16 => Opcode::VectorPairedAdd16,
            32 => Opcode::VectorPairedAdd32,
            _ => Opcode::VectorPairedAdd64,
        };
        self.vector_binop(op, a, b)
    }

    pub fn vector_lower_broadcast8(&mut self, a: U8) -> U128 {
        U128(self.push(Opcode::VectorLowerBroadcast8, vec![a.id()], Imm::None, Type::U128))
    }
    pub fn vector_lower_broadcast16(&mut self, a: U16) -> U128 {
        U128(self.push(Opcode::VectorLowerBroadcast16, vec![a.id()], Imm::None, Type::U128))
    }
    pub fn vector_lower_broadcast32(&mut self, a: U32) -> U128 {
        U128(self.push(Opcode::VectorLowerBroadcast32, vec![a.id()], Imm::None, Type::U128))
    }

    // -- Scalar floating point (fpscr-controlled rounding) --

    fn fp_binop(&mut self, op32: Opcode, op64: Opcode, a: U32U64, b: U32U64, fpscr_controlled: bool) -> U32U64 {
        debug_assert_eq!(a.bit_size(), b.bit_size());
        let (op, ty) = if a.bit_size() == 64 { (op64, Type::U64) } else { (op32, Type::U32) };
        let id = self.push(op, vec![a.id(), b.id()], Imm::FpscrControlled(fpscr_controlled), ty);
        if ty == Type::U64 { U32U64::U64(U64(id)) } else { U32U64::U32(U32(id)) }
    }

    pub fn fp_add(&mut self, a: U32U64, b: U32U64, fpscr_controlled: bool) -> U32U64 {
        self.fp_binop(Opcode::FPAdd32, Opcode::FPAdd64, a, b, fpscr_controlled)
    }
    pub fn fp_sub(&mut self, a: U32U64, b: U32U64, fpscr_controlled: bool) -> U32U64 {
        self.fp_binop(Opcode::FPSub32, Opcode::FPSub64, a, b, fpscr_controlled)
    }
    pub fn fp_mul(&mut self, a: U32U64, b: U32U64, fpscr_controlled: bool) -> U32U64 {
        self.fp_binop(Opcode::FPMul32, Opcode::FPMul64, a, b, fpscr_controlled)
    }
    pub fn fp_div(&mut self, a: U32U64, b: U32U64, fpscr_controlled: bool) -> U32U64 {
        self.fp_binop(Opcode::FPDiv32, Opcode::FPDiv64, a, b, fpscr_controlled)
    }

    fn fp_unop(&mut self, op32: Opcode, op64: Opcode, a: U32U64, fpscr_controlled: bool) -> U32U64 {
        let (op, ty) = if a.bit_size() == 64 { (op64, Type::U64) } else { (op32, Type::U32) };
        let id = self.push(op, vec![a.id()], Imm::FpscrControlled(fpscr_controlled), ty);
        if ty == Type::U64 { U32U64::U64(U64(id)) } else { U32U64::U32(U32(id)) }
    }

    pub fn fp_sqrt(&mut self, a: U32U64, fpscr_controlled: bool) -> U32U64 {
        self.fp_unop(Opcode::FPSqrt32, Opcode::FPSqrt64, a, fpscr_controlled)
    }
    pub fn fp_abs(&mut self, a: U32U64) -> U32U64 {
        self.fp_unop(Opcode::FPAbs32, Opcode::FPAbs64, a, false)
    }
    pub fn fp_neg(&mut self, a: U32U64) -> U32U64 {
        self.fp_unop(Opcode::FPNeg32, Opcode::FPNeg64, a, false)
    }

    // -- Control / external calls --

    pub fn push_rsb(&mut self, return_location: crate::location::LocationDescriptor) {
        let target = self.imm64(return_location.value());
        self.push(Opcode::PushRSB, vec![target.id()], Imm::None, Type::Void);
    }

    pub fn call_supervisor(&mut self, swi: U32) {
        self.push(Opcode::CallSupervisor, vec![swi.id()], Imm::None, Type::Void);
    }

    pub fn exception_raised(&mut self, pc: U64, exception: U64) {
        self.push(Opcode::ExceptionRaised, vec![pc.id(), exception.id()], Imm::None, Type::Void);
    }

    pub fn read_mem8(&mut self, vaddr: U64) -> U8 {
        U8(self.push(Opcode::ReadMemU8, vec![vaddr.id()], Imm::None, Type::U8))
    }
    pub fn read_mem16(&mut self, vaddr: U64) -> U16 {
        U16(self.push(Opcode::ReadMemU16, vec![vaddr.id()], Imm::None, Type::U16))
    }
    pub fn read_mem32(&mut self, vaddr: U64) -> U32 {
        U32(self.push(Opcode::ReadMemU32, vec![vaddr.id()], Imm::None, Type::U32))
    }
    pub fn read_mem64(&mut self, vaddr: U64) -> U64 {
        U64(self.push(Opcode::ReadMemU64, vec![vaddr.id()], Imm::None, Type::U64))
    }
    pub fn write_mem8(&mut self, vaddr: U64, value: U8) {
        self.push(Opcode::WriteMemU8, vec![vaddr.id(), value.id()], Imm::None, Type::Void);
    }
    pub fn write_mem16(&mut self, vaddr: U64, value: U16) {
        self.push(Opcode::WriteMemU16, vec![vaddr.id(), value.id()], Imm::None, Type::Void);
    }
    pub fn write_mem32(&mut self, vaddr: U64, value: U32) {
        self.push(Opcode::WriteMemU32, vec![vaddr.id(), value.id()], Imm::None, Type::Void);
    }
    pub fn write_mem64(&mut self, vaddr: U64, value: U64) {
        self.push(Opcode::WriteMemU64, vec![vaddr.id(), value.id()], Imm::None, Type::Void);
    }

    pub fn width(&mut self, width: usize, value: u64) -> U32U64 {
        self.imm_width(width, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationDescriptor;
    use armjit_types::ExecMode;

    fn new_emitter() -> IREmitter {
        IREmitter::new(Block::new(LocationDescriptor::new(0, ExecMode::A64, 0)))
    }

    #[test]
    fn add_does_not_emit_a_carry_consumer() {
        let mut ir = new_emitter();
        let a = ir.imm32(1);
        let b = ir.imm32(2);
        let _sum = ir.add(U32U64::U32(a), U32U64::U32(b));
        // add_with_carry always materializes Get{Carry,Overflow}FromOp, but the
        // convenience `add()` wrapper discards them — they should still be
        // present as dead instructions for DeadCodeElimination to remove later.
        assert!(ir.block.len() >= 4);
    }

    #[test]
    fn logical_shift_left_with_carry_consumer_is_detectable_via_use_list() {
        let mut ir = new_emitter();
        let value = ir.imm32(0x8000_0001);
        let shift = ir.imm8(32);
        let carry_in = ir.imm1(false);
        let r = ir.logical_shift_left_c(U32U64::U32(value), shift, carry_in);
        let producer_id = r.result.id();
        let producer = ir.block.inst(producer_id);
        assert!(producer.uses.contains(&r.carry.id()));
    }
}
