use crate::read_code::ReadCode;
use armjit_decode::{decode_a64, A64Visitor};
use armjit_ir::{Block, IREmitter, LocationDescriptor, Terminal, U32U64};
use armjit_types::Cond;

fn reg_at(instr: u32, shift: u32) -> u8 {
    ((instr >> shift) & 0x1F) as u8
}

fn sf(instr: u32) -> bool {
    (instr >> 31) & 1 == 1
}

fn datasize(instr: u32) -> usize {
    if sf(instr) {
        64
    } else {
        32
    }
}

/// Sign-extends the low `bits` bits of `value` into an `i64`.
fn sign_extend(value: u32, bits: u32) -> i64 {
    let shift = 32 - bits;
    ((value << shift) as i32 >> shift) as i64
}

fn esize_from_size(size: u8) -> usize {
    8usize << size
}

/// Translates one A64 basic block starting at `start`, fetching instruction
/// words through `read`. Mirrors the fetch/decode/dispatch/advance loop of
/// the original translator: each iteration reads one instruction, invokes
/// its handler if decoded, and falls back to an interpreter terminal
/// (ending the block) on a decode miss.
pub fn translate_a64_block(start: LocationDescriptor, read: &mut dyn ReadCode) -> Block {
    let mut visitor = A64Translator {
        ir: IREmitter::new(Block::new(start)),
        location: start,
    };

    let mut should_continue = true;
    while should_continue {
        let pc = visitor.location.pc();
        let instr = read.read32(pc);

        should_continue = match decode_a64::<A64Translator>(instr) {
            Some(matcher) => (matcher.handler)(&mut visitor, instr),
            None => {
                tracing::debug!(pc, instr, "A64 decode miss, falling back to interpreter");
                visitor.ir.block.set_terminal(Terminal::Interpret(visitor.location));
                false
            }
        };

        visitor.location = visitor.location.advance_pc(4);
        visitor.ir.block.add_cycles(1);

        if !visitor.ir.block.has_terminal() && !should_continue {
            visitor.ir.block.set_terminal(Terminal::ReturnToDispatch);
        }
    }

    visitor.ir.block.set_end_location(visitor.location);
    visitor.ir.block
}

struct A64Translator {
    ir: IREmitter,
    location: LocationDescriptor,
}

impl A64Translator {
    fn read_x(&mut self, reg: u8, width: usize) -> U32U64 {
        if reg == 31 {
            self.ir.width(width, 0)
        } else {
            self.ir.get_extended_register(reg, width)
        }
    }

    fn write_x(&mut self, reg: u8, width: usize, value: U32U64) {
        if reg != 31 {
            debug_assert_eq!(value.bit_size(), width);
            self.ir.set_extended_register(reg, value);
        }
    }

    fn sanitized_shift_amount(&mut self, amount: U32U64, datasize: usize) -> armjit_ir::U8 {
        let mask = self.ir.width(datasize, (datasize - 1) as u64);
        let masked = self.ir.and(amount, mask);
        self.ir.least_significant_byte(masked)
    }
}

impl A64Visitor for A64Translator {
    fn lslv(&mut self, instr: u32) -> bool {
        let ds = datasize(instr);
        let rm = reg_at(instr, 16);
        let rn = reg_at(instr, 5);
        let rd = reg_at(instr, 0);
        let operand = self.read_x(rn, ds);
        let amount = self.read_x(rm, ds);
        let sanitized = self.sanitized_shift_amount(amount, ds);
        let result = self.ir.logical_shift_left(operand, sanitized);
        self.write_x(rd, ds, result);
        true
    }

    fn lsrv(&mut self, instr: u32) -> bool {
        let ds = datasize(instr);
        let rm = reg_at(instr, 16);
        let rn = reg_at(instr, 5);
        let rd = reg_at(instr, 0);
        let operand = self.read_x(rn, ds);
        let amount = self.read_x(rm, ds);
        let sanitized = self.sanitized_shift_amount(amount, ds);
        let result = self.ir.logical_shift_right(operand, sanitized);
        self.write_x(rd, ds, result);
        true
    }

    fn asrv(&mut self, instr: u32) -> bool {
        let ds = datasize(instr);
        let rm = reg_at(instr, 16);
        let rn = reg_at(instr, 5);
        let rd = reg_at(instr, 0);
        let operand = self.read_x(rn, ds);
        let amount = self.read_x(rm, ds);
        let sanitized = self.sanitized_shift_amount(amount, ds);
        let result = self.ir.arithmetic_shift_right(operand, sanitized);
        self.write_x(rd, ds, result);
        true
    }

    fn rorv(&mut self, instr: u32) -> bool {
        let ds = datasize(instr);
        let rm = reg_at(instr, 16);
        let rn = reg_at(instr, 5);
        let rd = reg_at(instr, 0);
        let operand = self.read_x(rn, ds);
        let amount = self.read_x(rm, ds);
        let sanitized = self.sanitized_shift_amount(amount, ds);
        let result = self.ir.rotate_right(operand, sanitized);
        self.write_x(rd, ds, result);
        true
    }

    fn add_shifted_reg(&mut self, instr: u32) -> bool {
        let ds = datasize(instr);
        let shift_type = (instr >> 22) & 0b11;
        let shift_amount = self.ir.imm8(((instr >> 10) & 0x3F) as u8);
        let rm = reg_at(instr, 16);
        let rn = reg_at(instr, 5);
        let rd = reg_at(instr, 0);

        let operand2 = self.read_x(rm, ds);
        let shifted = match shift_type {
            0b00 => self.ir.logical_shift_left(operand2, shift_amount),
            0b01 => self.ir.logical_shift_right(operand2, shift_amount),
            0b10 => self.ir.arithmetic_shift_right(operand2, shift_amount),
            // 0b11 (ROR) is reserved for this instruction class; treated as
            // LSL, matching how an unused encoding would fall through to
            // the interpreter in a complete decoder.
            _ => self.ir.logical_shift_left(operand2, shift_amount),
        };
        let operand1 = self.read_x(rn, ds);
        let result = self.ir.add(operand1, shifted);
        self.write_x(rd, ds, result);
        true
    }

    fn subs_shifted_reg(&mut self, instr: u32) -> bool {
        let ds = datasize(instr);
        let shift_type = (instr >> 22) & 0b11;
        let shift_amount = self.ir.imm8(((instr >> 10) & 0x3F) as u8);
        let rm = reg_at(instr, 16);
        let rn = reg_at(instr, 5);
        let rd = reg_at(instr, 0);

        let operand2 = self.read_x(rm, ds);
        let shifted = match shift_type {
            0b00 => self.ir.logical_shift_left(operand2, shift_amount),
            0b01 => self.ir.logical_shift_right(operand2, shift_amount),
            0b10 => self.ir.arithmetic_shift_right(operand2, shift_amount),
            _ => self.ir.logical_shift_left(operand2, shift_amount),
        };
        let operand1 = self.read_x(rn, ds);
        let carry_in = self.ir.imm1(true);
        let computed = self.ir.sub_with_carry(operand1, shifted, carry_in);
        let nzcv = self.ir.nzcv_from(computed.result.id());
        self.ir.set_nzcv(nzcv);
        self.write_x(rd, ds, computed.result);
        true
    }

    fn movz(&mut self, instr: u32) -> bool {
        let ds = datasize(instr);
        let rd = reg_at(instr, 0);
        let imm16 = (instr >> 5) & 0xFFFF;
        let value = self.ir.width(ds, imm16 as u64);
        self.write_x(rd, ds, value);
        true
    }

    fn ret(&mut self, instr: u32) -> bool {
        let rn = reg_at(instr, 5);
        let target = self.read_x(rn, 64);
        let target64 = match target {
            U32U64::U64(v) => v,
            U32U64::U32(v) => self.ir.zero_extend_word_to_long(v),
        };
        self.ir.set_pc(target64);
        self.ir.block.set_terminal(Terminal::ReturnToDispatch);
        false
    }

    fn b(&mut self, instr: u32) -> bool {
        let offset = sign_extend(instr & 0x03FF_FFFF, 26) * 4;
        let target = self.location.with_pc(self.location.pc().wrapping_add(offset as u64));
        self.ir.block.set_terminal(Terminal::LinkBlock(target));
        false
    }

    fn b_cond(&mut self, instr: u32) -> bool {
        let offset = sign_extend((instr >> 5) & 0x7FFFF, 19) * 4;
        let target = self.location.with_pc(self.location.pc().wrapping_add(offset as u64));
        let fallthrough = self.location.advance_pc(4);
        let cond = Cond::from_bits((instr & 0xF) as u8);
        self.ir.block.set_terminal(Terminal::if_cond(
            cond,
            Terminal::LinkBlock(target),
            Terminal::LinkBlock(fallthrough),
        ));
        false
    }

    fn svc(&mut self, instr: u32) -> bool {
        let imm16 = self.ir.imm32((instr >> 5) & 0xFFFF);
        let next_pc = self.ir.imm64(self.location.pc() + 4);
        self.ir.set_pc(next_pc);
        // The original source omits pushing a return-stack-buffer entry
        // here (unlike every other call-like terminal); preserved as-is
        // rather than "fixed", since there is a real instruction right
        // after SVC that the RSB would otherwise mispredict into.
        self.ir.call_supervisor(imm16);
        self.ir
            .block
            .set_terminal(Terminal::check_halt(Terminal::PopRSBHint));
        false
    }

    fn add_vector(&mut self, instr: u32) -> bool {
        let size = ((instr >> 22) & 0b11) as u8;
        let esize = esize_from_size(size);
        let vm = reg_at(instr, 16);
        let vn = reg_at(instr, 5);
        let vd = reg_at(instr, 0);

        let op1 = self.ir.get_vector(vn);
        let op2 = self.ir.get_vector(vm);
        let result = self.ir.vector_add(esize, op1, op2);
        self.ir.set_vector(vd, result);
        true
    }

    fn and_asimd(&mut self, instr: u32) -> bool {
        let vm = reg_at(instr, 16);
        let vn = reg_at(instr, 5);
        let vd = reg_at(instr, 0);

        let op1 = self.ir.get_vector(vn);
        let op2 = self.ir.get_vector(vm);
        let result = self.ir.vector_and(op1, op2);
        self.ir.set_vector(vd, result);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armjit_types::ExecMode;

    struct FixedProgram {
        words: Vec<u32>,
        index: usize,
    }

    impl ReadCode for FixedProgram {
        fn read32(&mut self, _pc: u64) -> u32 {
            let w = self.words[self.index];
            self.index += 1;
            w
        }
        fn read16(&mut self, _pc: u64) -> u16 {
            unreachable!("A64 only fetches 32-bit words")
        }
    }

    fn loc(pc: u64) -> LocationDescriptor {
        LocationDescriptor::new(pc, ExecMode::A64, 0)
    }

    #[test]
    fn movz_add_ret_block_has_three_cycles_and_returns_to_dispatch() {
        // MOVZ X0, #5; ADD X0, X0, X0; RET X30
        let movz: u32 = 0b1_10_100101_00_0000000000000101_00000;
        let add: u32 = 0b1_0001011_00_0_00000_000000_00000_00000;
        let ret: u32 = 0b1101011001011111000000_11110_00000;
        let mut program = FixedProgram {
            words: vec![movz, add, ret],
            index: 0,
        };

        let block = translate_a64_block(loc(0x1000), &mut program);
        assert_eq!(block.cycle_count(), 3);
        assert!(matches!(block.terminal(), Some(Terminal::ReturnToDispatch)));
        assert!(block.len() > 0);
    }

    #[test]
    fn decode_miss_sets_interpret_terminal_and_stops_the_block() {
        let mut program = FixedProgram {
            words: vec![0xFFFF_FFFF],
            index: 0,
        };
        let block = translate_a64_block(loc(0x2000), &mut program);
        match block.terminal() {
            Some(Terminal::Interpret(desc)) => assert_eq!(desc.pc(), 0x2000),
            other => panic!("expected Interpret terminal, got {:?}", other),
        }
        assert_eq!(block.cycle_count(), 1);
    }

    #[test]
    fn unconditional_branch_links_to_computed_target() {
        // B with imm26 = 4 (offset = 16 bytes)
        let b_instr: u32 = 0b000101_00000000000000000000000100;
        let mut program = FixedProgram {
            words: vec![b_instr],
            index: 0,
        };
        let block = translate_a64_block(loc(0x4000), &mut program);
        match block.terminal() {
            Some(Terminal::LinkBlock(desc)) => assert_eq!(desc.pc(), 0x4000 + 16),
            other => panic!("expected LinkBlock terminal, got {:?}", other),
        }
    }
}
