use armjit_ir::{Block, Imm, ValueId};
use armjit_types::{Opcode, Type};

/// The host's view of guest memory regions it has already declared
/// read-only (e.g. mapped ROM, a JIT'd code page) — exactly the kind of
/// region `UserCallbacks::Memory::IsReadOnlyMemory` reports in the facade
/// crate. `ConstantMemoryReads` only ever rewrites a read the oracle
/// confirms is both constant-addressed and backed by immutable memory;
/// anything else is left as a runtime `ReadMem*` op.
pub trait ReadOnlyMemoryOracle {
    fn is_read_only(&self, addr: u64) -> bool;
    fn read8(&self, addr: u64) -> u8;
    fn read16(&self, addr: u64) -> u16;
    fn read32(&self, addr: u64) -> u32;
    fn read64(&self, addr: u64) -> u64;
}

fn const_addr(block: &Block, id: ValueId) -> Option<u64> {
    let mut id = id;
    loop {
        let inst = block.inst(id);
        if let Some(next) = inst.replaced_by {
            id = next;
            continue;
        }
        return match (inst.op, inst.imm) {
            (Opcode::ImmU64, Imm::U64(v)) => Some(v),
            _ => None,
        };
    }
}

/// Rewrites `ReadMemUN` instructions whose address is a known compile-time
/// constant landing inside a host-declared read-only region into an `ImmUN`
/// carrying the value fetched right now. Safe only because the region is
/// read-only: nothing can invalidate the fetched value before this block
/// next executes.
pub fn constant_memory_reads(block: &mut Block, oracle: &dyn ReadOnlyMemoryOracle) -> usize {
    let mut folded = 0;
    for idx in 0..block.len() {
        let id = ValueId(idx as u32);
        if !block.inst(id).is_live() {
            continue;
        }
        let op = block.inst(id).op;
        let addr_operand = match op {
            Opcode::ReadMemU8 | Opcode::ReadMemU16 | Opcode::ReadMemU32 | Opcode::ReadMemU64 => {
                block.inst(id).operands[0]
            }
            _ => continue,
        };
        let Some(addr) = const_addr(block, addr_operand) else { continue };
        if !oracle.is_read_only(addr) {
            continue;
        }

        let new_id = match op {
            Opcode::ReadMemU8 => block.push(Opcode::ImmU8, vec![], Imm::U8(oracle.read8(addr)), Type::U8),
            Opcode::ReadMemU16 => block.push(Opcode::ImmU16, vec![], Imm::U16(oracle.read16(addr)), Type::U16),
            Opcode::ReadMemU32 => block.push(Opcode::ImmU32, vec![], Imm::U32(oracle.read32(addr)), Type::U32),
            Opcode::ReadMemU64 => block.push(Opcode::ImmU64, vec![], Imm::U64(oracle.read64(addr)), Type::U64),
            _ => unreachable!(),
        };
        block.inst_mut(id).replaced_by = Some(new_id);
        folded += 1;
    }
    folded
}

#[cfg(test)]
mod tests {
    use super::*;
    use armjit_ir::LocationDescriptor;
    use armjit_types::ExecMode;
    use std::collections::HashMap;

    struct Rom(HashMap<u64, u8>);
    impl ReadOnlyMemoryOracle for Rom {
        fn is_read_only(&self, _addr: u64) -> bool {
            true
        }
        fn read8(&self, addr: u64) -> u8 {
            self.0[&addr]
        }
        fn read16(&self, addr: u64) -> u16 {
            u16::from_le_bytes([self.0[&addr], self.0[&(addr + 1)]])
        }
        fn read32(&self, _addr: u64) -> u32 {
            unimplemented!()
        }
        fn read64(&self, _addr: u64) -> u64 {
            unimplemented!()
        }
    }

    fn loc() -> LocationDescriptor {
        LocationDescriptor::new(0, ExecMode::A64, 0)
    }

    #[test]
    fn rewrites_a_constant_address_read_from_rom() {
        let mut rom = HashMap::new();
        rom.insert(0x1000, 0x42);
        let oracle = Rom(rom);

        let mut block = Block::new(loc());
        let addr = block.push(Opcode::ImmU64, vec![], Imm::U64(0x1000), Type::U64);
        let read = block.push(Opcode::ReadMemU8, vec![addr], Imm::None, Type::U8);

        let n = constant_memory_reads(&mut block, &oracle);
        assert_eq!(n, 1);
        let folded = block.inst(read).replaced_by.expect("should fold");
        assert_eq!(block.inst(folded).imm, Imm::U8(0x42));
    }

    #[test]
    fn leaves_non_constant_address_reads_alone() {
        struct AllRom;
        impl ReadOnlyMemoryOracle for AllRom {
            fn is_read_only(&self, _: u64) -> bool {
                true
            }
            fn read8(&self, _: u64) -> u8 {
                0
            }
            fn read16(&self, _: u64) -> u16 {
                0
            }
            fn read32(&self, _: u64) -> u32 {
                0
            }
            fn read64(&self, _: u64) -> u64 {
                0
            }
        }
        let mut block = Block::new(loc());
        let addr = block.push(Opcode::GetPc, vec![], Imm::None, Type::U64);
        let read = block.push(Opcode::ReadMemU8, vec![addr], Imm::None, Type::U8);

        let n = constant_memory_reads(&mut block, &AllRom);
        assert_eq!(n, 0);
        assert_eq!(block.inst(read).replaced_by, None);
    }
}
