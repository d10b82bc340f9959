use armjit_ir::{Block, Imm, ValueId};
use armjit_types::{Opcode, Type};

/// Resolves `id` through any `replaced_by` chain and, if the result is an
/// `Imm*` producer, returns its numeric payload zero-extended into a `u64`
/// alongside its declared type.
fn const_value(block: &Block, id: ValueId) -> Option<(Type, u64)> {
    let mut id = id;
    loop {
        let inst = block.inst(id);
        if let Some(next) = inst.replaced_by {
            id = next;
            continue;
        }
        let value = match (inst.op, inst.imm) {
            (Opcode::ImmU1, Imm::U1(v)) => v as u64,
            (Opcode::ImmU8, Imm::U8(v)) => v as u64,
            (Opcode::ImmU16, Imm::U16(v)) => v as u64,
            (Opcode::ImmU32, Imm::U32(v)) => v as u64,
            (Opcode::ImmU64, Imm::U64(v)) => v,
            _ => return None,
        };
        return Some((inst.result, value));
    }
}

/// Folds a conservative subset of pure opcodes over constant operands:
/// bitwise/multiply/divide, the zero/sign-extension family, byte reversal,
/// and the bit-query ops. Shifts and `Add`/`Sub`/`AddWithCarry`/
/// `SubWithCarry` are deliberately excluded — their carry/overflow outputs
/// are separate `GetCarryFromOp`/`GetOverflowFromOp` consumers that read
/// host flags off the *original* instruction, so folding the primary result
/// alone would strand those consumers without a producer to read from.
pub fn constant_propagation(block: &mut Block) -> usize {
    let mut folded = 0;
    for idx in 0..block.len() {
        let id = ValueId(idx as u32);
        if !block.inst(id).is_live() {
            continue;
        }
        let op = block.inst(id).op;
        let operands = block.inst(id).operands.clone();
        let ty = block.inst(id).result;

        let result: Option<u64> = match op {
            Opcode::And => binary(block, &operands).map(|(a, b)| a & b),
            Opcode::Eor => binary(block, &operands).map(|(a, b)| a ^ b),
            Opcode::Or => binary(block, &operands).map(|(a, b)| a | b),
            Opcode::Mul => binary(block, &operands).map(|(a, b)| a.wrapping_mul(b)),
            Opcode::UnsignedDiv => binary(block, &operands).and_then(|(a, b)| (b != 0).then(|| a / b)),
            Opcode::Not => const_value(block, operands[0]).map(|(_, a)| !a),
            Opcode::IsZero => const_value(block, operands[0]).map(|(_, a)| (a == 0) as u64),
            Opcode::MostSignificantBit => const_value(block, operands[0]).map(|(_, a)| (a >> 31) & 1),
            Opcode::LeastSignificantByte => const_value(block, operands[0]).map(|(_, a)| a & 0xFF),
            Opcode::ZeroExtendByteToWord | Opcode::ZeroExtendHalfToWord | Opcode::ZeroExtendWordToLong => {
                const_value(block, operands[0]).map(|(_, a)| a)
            }
            Opcode::SignExtendByteToWord => const_value(block, operands[0]).map(|(_, a)| (a as i8) as u64),
            Opcode::SignExtendHalfToWord => const_value(block, operands[0]).map(|(_, a)| (a as i16) as u64),
            Opcode::SignExtendWordToLong => const_value(block, operands[0]).map(|(_, a)| (a as i32) as u64),
            Opcode::ByteReverseWord => const_value(block, operands[0]).map(|(_, a)| (a as u32).swap_bytes() as u64),
            Opcode::ByteReverseHalf => const_value(block, operands[0]).map(|(_, a)| (a as u16).swap_bytes() as u64),
            Opcode::ByteReverseDual => const_value(block, operands[0]).map(|(_, a)| a.swap_bytes()),
            _ => None,
        };

        if let Some(value) = result {
            let new_id = push_imm(block, ty, value);
            block.inst_mut(id).replaced_by = Some(new_id);
            folded += 1;
        }
    }
    folded
}

fn binary(block: &Block, operands: &[ValueId]) -> Option<(u64, u64)> {
    let (_, a) = const_value(block, operands[0])?;
    let (_, b) = const_value(block, operands[1])?;
    Some((a, b))
}

fn push_imm(block: &mut Block, ty: Type, value: u64) -> ValueId {
    match ty {
        Type::U1 => block.push(Opcode::ImmU1, vec![], Imm::U1(value != 0), Type::U1),
        Type::U8 => block.push(Opcode::ImmU8, vec![], Imm::U8(value as u8), Type::U8),
        Type::U16 => block.push(Opcode::ImmU16, vec![], Imm::U16(value as u16), Type::U16),
        Type::U32 => block.push(Opcode::ImmU32, vec![], Imm::U32(value as u32), Type::U32),
        Type::U64 => block.push(Opcode::ImmU64, vec![], Imm::U64(value), Type::U64),
        other => panic!("constant folding produced an unsupported result type {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armjit_ir::LocationDescriptor;
    use armjit_types::ExecMode;

    fn loc() -> LocationDescriptor {
        LocationDescriptor::new(0, ExecMode::A64, 0)
    }

    #[test]
    fn folds_and_of_two_immediates() {
        let mut block = Block::new(loc());
        let a = block.push(Opcode::ImmU32, vec![], Imm::U32(0b1100), Type::U32);
        let b = block.push(Opcode::ImmU32, vec![], Imm::U32(0b1010), Type::U32);
        let and = block.push(Opcode::And, vec![a, b], Imm::None, Type::U32);

        constant_propagation(&mut block);

        let folded = block.inst(and).replaced_by.expect("And should fold");
        assert_eq!(block.inst(folded).imm, Imm::U32(0b1000));
    }

    #[test]
    fn leaves_non_constant_operands_untouched() {
        let mut block = Block::new(loc());
        let reg = block.push(Opcode::GetRegister, vec![], Imm::RegRef(0), Type::U32);
        let imm = block.push(Opcode::ImmU32, vec![], Imm::U32(1), Type::U32);
        let and = block.push(Opcode::And, vec![reg, imm], Imm::None, Type::U32);

        constant_propagation(&mut block);

        assert_eq!(block.inst(and).replaced_by, None);
    }
}
