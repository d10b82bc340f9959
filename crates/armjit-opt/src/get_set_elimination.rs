use armjit_ir::{Block, Imm, ValueId};
use armjit_types::Opcode;
use std::collections::HashMap;

/// A tracked piece of architectural state: which accessor pair targets it,
/// plus a disambiguator (register index, or none for singleton state like
/// the PC or NZCV). Distinct widths of the "same" register (A64's W/X view)
/// are tracked as distinct keys — cross-width aliasing (a 32-bit write
/// zero-extending into the 64-bit register) is not modeled by this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StateKey {
    getter: Opcode,
    index: Option<u8>,
}

struct Accessor {
    getter: Opcode,
    setter: Opcode,
}

fn key_of(op: Opcode, imm: Imm, accessors: &[Accessor]) -> Option<StateKey> {
    let getter = accessors.iter().find(|a| a.getter == op || a.setter == op)?.getter;
    let index = match imm {
        Imm::RegRef(r) => Some(r),
        _ => None,
    };
    Some(StateKey { getter, index })
}

/// Coalesces redundant Get/Set pairs of architectural state within one
/// block: a `Get` right after a `Set` (or another `Get`) of the same state
/// is redirected to the earlier value via `replaced_by`, and a `Set`
/// overwritten by a later `Set` of the same state with no intervening read
/// is tombstoned outright, since its value was never observed.
///
/// Any side-effectful op outside `accessors` (memory access, supervisor
/// call, exception) invalidates every tracked key: this pass does not model
/// which architectural state a callback can or cannot observe mid-block, so
/// it conservatively assumes "any of it".
fn eliminate(block: &mut Block, accessors: &[Accessor]) {
    let mut last_value: HashMap<StateKey, ValueId> = HashMap::new();
    let mut last_setter: HashMap<StateKey, ValueId> = HashMap::new();

    for idx in 0..block.len() {
        let id = ValueId(idx as u32);
        if !block.inst(id).is_live() {
            continue;
        }
        let op = block.inst(id).op;
        let imm = block.inst(id).imm;

        if let Some(key) = key_of(op, imm, accessors) {
            let is_getter = accessors.iter().any(|a| a.getter == op);
            if is_getter {
                if let Some(&value) = last_value.get(&key) {
                    block.inst_mut(id).replaced_by = Some(value);
                } else {
                    last_value.insert(key, id);
                }
            } else {
                let operand = block.inst(id).operands[0];
                if last_value.get(&key) == Some(&operand) {
                    block.inst_mut(id).dead = true;
                } else {
                    if let Some(&prev_setter) = last_setter.get(&key) {
                        block.inst_mut(prev_setter).dead = true;
                    }
                    last_value.insert(key, operand);
                    last_setter.insert(key, id);
                }
            }
            continue;
        }

        if block.inst(id).has_side_effect() {
            last_value.clear();
            last_setter.clear();
        }
    }
}

pub fn a32_get_set_elimination(block: &mut Block) {
    let accessors = [
        Accessor { getter: Opcode::GetRegister, setter: Opcode::SetRegister },
        Accessor { getter: Opcode::GetCpsr, setter: Opcode::SetCpsr },
        Accessor { getter: Opcode::GetPc, setter: Opcode::SetPc },
        Accessor { getter: Opcode::GetNFlag, setter: Opcode::SetNFlag },
        Accessor { getter: Opcode::GetZFlag, setter: Opcode::SetZFlag },
        Accessor { getter: Opcode::GetCFlag, setter: Opcode::SetCFlag },
        Accessor { getter: Opcode::GetVFlag, setter: Opcode::SetVFlag },
    ];
    eliminate(block, &accessors);
}

pub fn a64_get_set_elimination(block: &mut Block) {
    let accessors = [
        Accessor { getter: Opcode::GetExtendedRegister32, setter: Opcode::SetExtendedRegister32 },
        Accessor { getter: Opcode::GetExtendedRegister64, setter: Opcode::SetExtendedRegister64 },
        Accessor { getter: Opcode::GetVector, setter: Opcode::SetVector },
        Accessor { getter: Opcode::GetPc, setter: Opcode::SetPc },
        Accessor { getter: Opcode::GetNzcv, setter: Opcode::SetNzcv },
    ];
    eliminate(block, &accessors);
}

#[cfg(test)]
mod tests {
    use super::*;
    use armjit_ir::LocationDescriptor;
    use armjit_types::{ExecMode, Type};

    fn loc() -> LocationDescriptor {
        LocationDescriptor::new(0, ExecMode::A64, 0)
    }

    #[test]
    fn get_after_set_is_redirected_to_the_set_value() {
        let mut block = Block::new(loc());
        let v = block.push(Opcode::ImmU32, vec![], Imm::U32(7), Type::U32);
        block.push(Opcode::SetRegister, vec![v], Imm::RegRef(0), Type::Void);
        let read = block.push(Opcode::GetRegister, vec![], Imm::RegRef(0), Type::U32);

        a32_get_set_elimination(&mut block);

        assert_eq!(block.inst(read).replaced_by, Some(v));
    }

    #[test]
    fn second_set_with_no_intervening_read_kills_the_first() {
        let mut block = Block::new(loc());
        let v1 = block.push(Opcode::ImmU32, vec![], Imm::U32(1), Type::U32);
        let set1 = block.push(Opcode::SetRegister, vec![v1], Imm::RegRef(2), Type::Void);
        let v2 = block.push(Opcode::ImmU32, vec![], Imm::U32(2), Type::U32);
        block.push(Opcode::SetRegister, vec![v2], Imm::RegRef(2), Type::Void);

        a32_get_set_elimination(&mut block);

        assert!(block.inst(set1).dead);
    }

    #[test]
    fn distinct_registers_are_not_conflated() {
        let mut block = Block::new(loc());
        let v = block.push(Opcode::ImmU32, vec![], Imm::U32(9), Type::U32);
        block.push(Opcode::SetRegister, vec![v], Imm::RegRef(0), Type::Void);
        let read_other = block.push(Opcode::GetRegister, vec![], Imm::RegRef(1), Type::U32);

        a32_get_set_elimination(&mut block);

        assert_eq!(block.inst(read_other).replaced_by, None);
    }

    #[test]
    fn a_memory_write_invalidates_tracked_register_state() {
        let mut block = Block::new(loc());
        let v = block.push(Opcode::ImmU32, vec![], Imm::U32(1), Type::U32);
        block.push(Opcode::SetRegister, vec![v], Imm::RegRef(0), Type::Void);
        let addr = block.push(Opcode::ImmU64, vec![], Imm::U64(0x1000), Type::U64);
        let val = block.push(Opcode::ImmU8, vec![], Imm::U8(0), Type::U8);
        block.push(Opcode::WriteMemU8, vec![addr, val], Imm::None, Type::Void);
        let read = block.push(Opcode::GetRegister, vec![], Imm::RegRef(0), Type::U32);

        a32_get_set_elimination(&mut block);

        assert_eq!(block.inst(read).replaced_by, None);
    }
}
