use crate::inst::{Imm, Inst, ValueId};
use crate::location::LocationDescriptor;
use crate::terminal::Terminal;
use armjit_types::{Opcode, Type};

/// A half-open `[start, end)` guest physical address range touched while
/// translating a block, recorded so the runtime's invalidation index can
/// find this block by guest address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrRange {
    pub start: u64,
    pub end: u64,
}

/// A single-entry, multi-exit (via `terminal` only) straight-line sequence
/// of guest instructions lifted to IR.
///
/// Instructions live in a flat arena (`insts`); operand references and
/// use-list entries are `ValueId` indices into that same arena, so the graph
/// can never contain a dangling pointer or a reference cycle.
#[derive(Debug, Clone)]
pub struct Block {
    pub start_location: LocationDescriptor,
    end_location: LocationDescriptor,
    insts: Vec<Inst>,
    cycle_count: u32,
    terminal: Option<Terminal>,
    pub addr_ranges: Vec<AddrRange>,
}

impl Block {
    pub fn new(start_location: LocationDescriptor) -> Self {
        Block {
            start_location,
            end_location: start_location,
            insts: Vec::new(),
            cycle_count: 0,
            terminal: None,
            addr_ranges: Vec::new(),
        }
    }

    pub fn end_location(&self) -> LocationDescriptor {
        self.end_location
    }

    pub fn set_end_location(&mut self, loc: LocationDescriptor) {
        self.end_location = loc;
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    pub fn add_cycles(&mut self, n: u32) {
        self.cycle_count += n;
    }

    pub fn terminal(&self) -> Option<&Terminal> {
        self.terminal.as_ref()
    }

    pub fn has_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    /// Sets the block's terminal. Per the single-terminal invariant, calling
    /// this twice on the same block is a translator bug.
    pub fn set_terminal(&mut self, terminal: Terminal) {
        debug_assert!(self.terminal.is_none(), "block terminal set twice");
        self.terminal = Some(terminal);
    }

    /// Overwrites an already-set terminal. Unlike `set_terminal`, this is
    /// legal to call on a block that already has one — used by
    /// `MergeInterpretBlocks` to fold a chain of `Interpret` terminals into
    /// a single `InterpretMany`.
    pub fn replace_terminal(&mut self, terminal: Terminal) {
        self.terminal = Some(terminal);
    }

    pub fn record_addr_range(&mut self, start: u64, end: u64) {
        self.addr_ranges.push(AddrRange { start, end });
    }

    pub fn insts(&self) -> &[Inst] {
        &self.insts
    }

    pub fn insts_mut(&mut self) -> &mut [Inst] {
        &mut self.insts
    }

    pub fn inst(&self, id: ValueId) -> &Inst {
        &self.insts[id.index()]
    }

    pub fn inst_mut(&mut self, id: ValueId) -> &mut Inst {
        &mut self.insts[id.index()]
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Appends a new instruction to the end of the block, validating operand
    /// types against the opcode manifest and recording use-list edges for
    /// every operand it references. Returns the new instruction's `ValueId`.
    ///
    /// # Panics
    /// Panics (a `VerificationFailure`-class bug, not a runtime error — see
    /// the error-handling design) if an operand's declared result type does
    /// not match the manifest's expected operand type at that position, or
    /// if an operand references an instruction that is not earlier in this
    /// same block.
    pub fn push(&mut self, op: Opcode, operands: Vec<ValueId>, imm: Imm, result: Type) -> ValueId {
        let new_id = ValueId(self.insts.len() as u32);

        let sig = armjit_types::manifest(op);
        for (i, operand) in operands.iter().enumerate() {
            debug_assert!(
                operand.index() < self.insts.len(),
                "operand {:?} is not earlier in the block (no forward references)",
                operand
            );
            if let Some(expected) = sig.operands.get(i) {
                let actual = self.insts[operand.index()].result;
                let ok = match *expected {
                    Type::Void => true,
                    Type::U32U64 => matches!(actual, Type::U32 | Type::U64),
                    other => actual == other,
                };
                debug_assert!(
                    ok,
                    "operand {} of {:?} has type {:?}, opcode expects {:?}",
                    i, op, actual, expected
                );
            }
        }

        self.insts.push(Inst::new(op, operands.clone(), imm, result));
        for operand in operands {
            self.insts[operand.index()].uses.push(new_id);
        }
        new_id
    }

    /// True iff every use-list entry correctly references an instruction
    /// whose operands include the producer, and vice versa — part of the
    /// `Verification` pass (see `armjit-opt`).
    pub fn use_lists_consistent(&self) -> bool {
        for (producer_idx, producer) in self.insts.iter().enumerate() {
            let producer_id = ValueId(producer_idx as u32);
            for &user_id in &producer.uses {
                let user = &self.insts[user_id.index()];
                if !user.operands.contains(&producer_id) {
                    return false;
                }
            }
        }
        for (user_idx, user) in self.insts.iter().enumerate() {
            let user_id = ValueId(user_idx as u32);
            for &operand_id in &user.operands {
                let producer = &self.insts[operand_id.index()];
                if !producer.uses.contains(&user_id) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armjit_types::ExecMode;

    fn loc(pc: u64) -> LocationDescriptor {
        LocationDescriptor::new(pc, ExecMode::A64, 0)
    }

    #[test]
    fn push_records_reciprocal_use_list_edges() {
        let mut block = Block::new(loc(0));
        let a = block.push(Opcode::ImmU32, vec![], Imm::U32(1), Type::U32);
        let b = block.push(Opcode::ImmU32, vec![], Imm::U32(2), Type::U32);
        let sum = block.push(Opcode::Add, vec![a, b], Imm::None, Type::U64);

        assert_eq!(block.inst(a).uses, vec![sum]);
        assert_eq!(block.inst(b).uses, vec![sum]);
        assert!(block.use_lists_consistent());
    }

    #[test]
    fn terminal_starts_unset_and_can_be_set_once() {
        let mut block = Block::new(loc(0));
        assert!(!block.has_terminal());
        block.set_terminal(Terminal::ReturnToDispatch);
        assert!(block.has_terminal());
    }

    #[test]
    #[should_panic]
    fn setting_terminal_twice_panics_in_debug() {
        let mut block = Block::new(loc(0));
        block.set_terminal(Terminal::ReturnToDispatch);
        block.set_terminal(Terminal::ReturnToDispatch);
    }
}
