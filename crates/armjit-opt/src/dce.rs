use armjit_ir::Block;

fn tombstoned(block: &Block, id: armjit_ir::ValueId) -> bool {
    let inst = block.inst(id);
    inst.dead || inst.replaced_by.is_some()
}

/// Deletes instructions with no live readers whose opcode declares no side
/// effect. Runs to a fixpoint: removing one instruction can empty its own
/// operands' use-lists, so a single pass is not enough (e.g. an `Add` whose
/// only reader was itself already dead).
///
/// Use-list entries are never physically removed (`Block::use_lists_consistent`
/// depends on them mirroring `operands` exactly); "no live readers" instead
/// means every entry in `uses` is already tombstoned (`dead` or
/// `replaced_by`-redirected).
pub fn dead_code_elimination(block: &mut Block) -> usize {
    let mut removed = 0;
    loop {
        let mut changed = false;
        for idx in 0..block.len() {
            let id = armjit_ir::ValueId(idx as u32);
            if tombstoned(block, id) {
                continue;
            }
            let inst = block.inst(id);
            if inst.has_side_effect() {
                continue;
            }
            if inst.uses.iter().all(|&u| tombstoned(block, u)) {
                block.inst_mut(id).dead = true;
                removed += 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use armjit_ir::{Imm, LocationDescriptor};
    use armjit_types::{ExecMode, Opcode, Type};

    fn loc() -> LocationDescriptor {
        LocationDescriptor::new(0, ExecMode::A64, 0)
    }

    #[test]
    fn removes_unused_pure_chain_but_keeps_side_effectful_tail() {
        let mut block = Block::new(loc());
        let a = block.push(Opcode::ImmU32, vec![], Imm::U32(1), Type::U32);
        let b = block.push(Opcode::ImmU32, vec![], Imm::U32(2), Type::U32);
        let _unused_sum = block.push(Opcode::Add, vec![a, b], Imm::None, Type::U64);
        let kept = block.push(Opcode::ImmU32, vec![], Imm::U32(3), Type::U32);
        block.push(Opcode::SetRegister, vec![kept], Imm::RegRef(0), Type::Void);

        let removed = dead_code_elimination(&mut block);
        assert!(removed >= 1);
        assert!(block.inst(kept).is_live());
    }
}
