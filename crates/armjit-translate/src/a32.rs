use crate::read_code::ReadCode;
use armjit_decode::{decode_a32, A32Visitor};
use armjit_ir::{Block, IREmitter, LocationDescriptor, Terminal};
use armjit_types::Cond;

fn reg_at(instr: u32, shift: u32) -> u8 {
    ((instr >> shift) & 0xF) as u8
}

fn cond_of(instr: u32) -> Cond {
    Cond::from_bits((instr >> 28) as u8 & 0xF)
}

fn sign_extend(value: u32, bits: u32) -> i64 {
    let shift = 32 - bits;
    ((value << shift) as i32 >> shift) as i64
}

/// Translates one A32 basic block. Any instruction whose condition field is
/// not `AL` is punted to the interpreter fallback rather than lowered to a
/// guarded `ConditionalSelect`: evaluating an arbitrary guest condition
/// against NZCV needs IR primitives this representative subset doesn't
/// carry, so conditional execution outside "always" is explicitly out of
/// scope here.
pub fn translate_a32_block(start: LocationDescriptor, read: &mut dyn ReadCode) -> Block {
    let mut visitor = A32Translator {
        ir: IREmitter::new(Block::new(start)),
        location: start,
    };

    let mut should_continue = true;
    while should_continue {
        let pc = visitor.location.pc();
        let instr = read.read32(pc);

        should_continue = match decode_a32::<A32Translator>(instr) {
            Some(matcher) if cond_of(instr) == Cond::Al => (matcher.handler)(&mut visitor, instr),
            _ => {
                tracing::debug!(pc, instr, "A32 decode miss or non-AL condition, falling back to interpreter");
                visitor.ir.block.set_terminal(Terminal::Interpret(visitor.location));
                false
            }
        };

        visitor.location = visitor.location.advance_pc(4);
        visitor.ir.block.add_cycles(1);
    }

    if !visitor.ir.block.has_terminal() {
        visitor.ir.block.set_terminal(Terminal::ReturnToDispatch);
    }
    visitor.ir.block.set_end_location(visitor.location);
    visitor.ir.block
}

struct A32Translator {
    ir: IREmitter,
    location: LocationDescriptor,
}

impl A32Visitor for A32Translator {
    fn mov_reg(&mut self, instr: u32) -> bool {
        let rd = reg_at(instr, 12);
        let rm = reg_at(instr, 0);
        let shift_type = (instr >> 5) & 0b11;
        let shift_amount = self.ir.imm8(((instr >> 7) & 0x1F) as u8);

        let value = self.ir.get_register(rm);
        let value = armjit_ir::U32U64::U32(value);
        let shifted = match shift_type {
            0b00 => self.ir.logical_shift_left(value, shift_amount),
            0b01 => self.ir.logical_shift_right(value, shift_amount),
            0b10 => self.ir.arithmetic_shift_right(value, shift_amount),
            _ => self.ir.rotate_right(value, shift_amount),
        };
        let result = match shifted {
            armjit_ir::U32U64::U32(v) => v,
            armjit_ir::U32U64::U64(_) => unreachable!("32-bit shift never widens"),
        };
        self.ir.set_register(rd, result);
        true
    }

    /// `LSL{S}`/`LSR{S}`/`ASR{S}`/`ROR{S} Rd, Rn, Rm`: the register-specified-
    /// shift-amount form of `MOV Rd, Rn, <type> Rm`. Unlike the immediate-
    /// shift form above, the low byte of `Rm` is a runtime value, so this
    /// goes through the carry-returning shift ops and, when `S` is set,
    /// writes N/Z/C the way the barrel shifter actually leaves them (the
    /// shift itself never touches V).
    fn shift_reg(&mut self, instr: u32) -> bool {
        let rd = reg_at(instr, 12);
        let rn = reg_at(instr, 0);
        let rs = reg_at(instr, 8);
        let shift_type = (instr >> 5) & 0b11;
        let set_flags = (instr >> 20) & 1 == 1;

        let value = armjit_ir::U32U64::U32(self.ir.get_register(rn));
        let amount = self.ir.least_significant_byte(armjit_ir::U32U64::U32(self.ir.get_register(rs)));
        let carry_in = self.ir.get_c_flag();

        let shifted = match shift_type {
            0b00 => self.ir.logical_shift_left_c(value, amount, carry_in),
            0b01 => self.ir.logical_shift_right_c(value, amount, carry_in),
            0b10 => self.ir.arithmetic_shift_right_c(value, amount, carry_in),
            _ => self.ir.rotate_right_c(value, amount, carry_in),
        };
        let result = match shifted.result {
            armjit_ir::U32U64::U32(v) => v,
            armjit_ir::U32U64::U64(_) => unreachable!("32-bit shift never widens"),
        };

        if set_flags {
            let n = self.ir.most_significant_bit(result);
            self.ir.set_n_flag(n);
            let z = self.ir.is_zero(armjit_ir::U32U64::U32(result));
            self.ir.set_z_flag(z);
            self.ir.set_c_flag(shifted.carry);
        }
        self.ir.set_register(rd, result);
        true
    }

    fn add_imm(&mut self, instr: u32) -> bool {
        let rn = reg_at(instr, 16);
        let rd = reg_at(instr, 12);
        let set_flags = (instr >> 20) & 1 == 1;
        // The "modified immediate" rotate-by-even-amount encoding is not
        // unpacked here; imm12 is taken as a plain zero-extended constant,
        // which covers the common small-immediate case this subset targets.
        let imm = self.ir.imm32(instr & 0xFFF);

        let n = armjit_ir::U32U64::U32(self.ir.get_register(rn));
        let imm = armjit_ir::U32U64::U32(imm);
        if set_flags {
            let carry_in = self.ir.imm1(false);
            let computed = self.ir.add_with_carry(n, imm, carry_in);
            let nzcv = self.ir.nzcv_from(computed.result.id());
            self.ir.set_nzcv(nzcv);
            if let armjit_ir::U32U64::U32(v) = computed.result {
                self.ir.set_register(rd, v);
            }
        } else {
            let result = self.ir.add(n, imm);
            if let armjit_ir::U32U64::U32(v) = result {
                self.ir.set_register(rd, v);
            }
        }
        true
    }

    fn sub_imm(&mut self, instr: u32) -> bool {
        let rn = reg_at(instr, 16);
        let rd = reg_at(instr, 12);
        let set_flags = (instr >> 20) & 1 == 1;
        let imm = self.ir.imm32(instr & 0xFFF);

        let n = armjit_ir::U32U64::U32(self.ir.get_register(rn));
        let imm = armjit_ir::U32U64::U32(imm);
        if set_flags {
            let carry_in = self.ir.imm1(true);
            let computed = self.ir.sub_with_carry(n, imm, carry_in);
            let nzcv = self.ir.nzcv_from(computed.result.id());
            self.ir.set_nzcv(nzcv);
            if let armjit_ir::U32U64::U32(v) = computed.result {
                self.ir.set_register(rd, v);
            }
        } else {
            let result = self.ir.sub(n, imm);
            if let armjit_ir::U32U64::U32(v) = result {
                self.ir.set_register(rd, v);
            }
        }
        true
    }

    fn b(&mut self, instr: u32) -> bool {
        let offset = sign_extend(instr & 0x00FF_FFFF, 24) * 4;
        // A32 branches are offset from the instruction's address + 8 (the
        // two-stage pipeline fetch bias baked into the architecture).
        let target = self.location.with_pc(self.location.pc().wrapping_add(8).wrapping_add(offset as u64));
        self.ir.block.set_terminal(Terminal::LinkBlock(target));
        false
    }

    fn bl(&mut self, instr: u32) -> bool {
        let offset = sign_extend(instr & 0x00FF_FFFF, 24) * 4;
        let target = self.location.with_pc(self.location.pc().wrapping_add(8).wrapping_add(offset as u64));
        let link_value = self.ir.imm32((self.location.pc() + 4) as u32);
        self.ir.set_register(14, link_value);
        self.ir.push_rsb(self.location.advance_pc(4));
        self.ir.block.set_terminal(Terminal::LinkBlock(target));
        false
    }

    fn svc(&mut self, instr: u32) -> bool {
        let imm24 = self.ir.imm32(instr & 0x00FF_FFFF);
        let next_pc = self.ir.imm64(self.location.pc() + 4);
        self.ir.set_pc(next_pc);
        self.ir.call_supervisor(imm24);
        self.ir
            .block
            .set_terminal(Terminal::check_halt(Terminal::PopRSBHint));
        false
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
            unreachable!("A32 only fetches 32-bit words")
        }
    }

    fn loc(pc: u64) -> LocationDescriptor {
        LocationDescriptor::new(pc, ExecMode::A32, 0)
    }

    #[test]
    fn unconditional_branch_always_links_with_pipeline_bias() {
        // B #0, cond=AL, offset imm24=0 -> target = pc + 8
        let b_instr: u32 = 0b1110_101_0_000000000000000000000000;
        let mut program = FixedProgram { words: vec![b_instr], index: 0 };
        let block = translate_a32_block(loc(0x8000), &mut program);
        match block.terminal() {
            Some(Terminal::LinkBlock(desc)) => assert_eq!(desc.pc(), 0x8008),
            other => panic!("expected LinkBlock terminal, got {:?}", other),
        }
    }

    #[test]
    fn non_al_condition_falls_back_to_interpreter() {
        // B #0, cond=NE (0001)
        let b_instr: u32 = 0b0001_101_0_000000000000000000000000;
        let mut program = FixedProgram { words: vec![b_instr], index: 0 };
        let block = translate_a32_block(loc(0x8000), &mut program);
        assert!(matches!(block.terminal(), Some(Terminal::Interpret(_))));
    }

    #[test]
    fn svc_sets_pc_and_check_halt_pop_rsb_terminal() {
        let svc_instr: u32 = 0b1110_1111_000000000000000000000000;
        let mut program = FixedProgram { words: vec![svc_instr], index: 0 };
        let block = translate_a32_block(loc(0x1000), &mut program);
        assert!(matches!(
            block.terminal(),
            Some(Terminal::CheckHalt { .. })
        ));
    }

    #[test]
    fn lsls_reg_emits_a_carry_returning_shift_and_sets_the_c_flag() {
        // LSLS R0, R1, R2 then SVC #0 to terminate the block.
        let lsls: u32 =
            (0b1110 << 28) | (0b0001101 << 21) | (1 << 20) | (0b0010 << 8) | (1 << 4) | 0b0001;
        let svc_instr: u32 = 0b1110_1111_000000000000000000000000;
        let mut program = FixedProgram { words: vec![lsls, svc_instr], index: 0 };
        let block = translate_a32_block(loc(0x1000), &mut program);
        assert!(block.insts().iter().any(|inst| inst.op == armjit_types::Opcode::SetCFlag));
        assert!(block.insts().iter().any(|inst| inst.op == armjit_types::Opcode::LogicalShiftLeft));
    }
}
