use crate::matcher::{decode, matcher, Matcher};

/// Representative A32 (32-bit ARM) instruction classes. As with
/// [`crate::a64::A64Visitor`], only a subset of the full ISA is decoded
/// directly; everything else is the interpreter fallback's job.
pub trait A32Visitor {
    fn mov_reg(&mut self, instr: u32) -> bool;
    fn shift_reg(&mut self, instr: u32) -> bool;
    fn add_imm(&mut self, instr: u32) -> bool;
    fn sub_imm(&mut self, instr: u32) -> bool;
    fn b(&mut self, instr: u32) -> bool;
    fn bl(&mut self, instr: u32) -> bool;
    fn svc(&mut self, instr: u32) -> bool;
}

fn table<V: A32Visitor>() -> Vec<Matcher<V>> {
    vec![
        matcher("SVC", "cccc1111iiiiiiiiiiiiiiiiiiiiiiii", |v, i| v.svc(i)),
        matcher("B/BL", "cccc101liiiiiiiiiiiiiiiiiiiiiiii", |v, i| {
            if i & (1 << 24) != 0 {
                v.bl(i)
            } else {
                v.b(i)
            }
        }),
        matcher("ADD (imm)", "cccc0010100snnnnddddiiiiiiiiiiii", |v, i| v.add_imm(i)),
        matcher("SUB (imm)", "cccc0010010snnnnddddiiiiiiiiiiii", |v, i| v.sub_imm(i)),
        matcher("MOV (register)", "cccc0001101s0000ddddiiiiitt0mmmm", |v, i| v.mov_reg(i)),
        // LSL/LSR/ASR/ROR (register): "MOV{S} Rd, Rm, <type> Rs", the
        // register-specified-shift-amount form; `tt` picks the shift kind
        // the same way the immediate-shift MOV above does.
        matcher("MOV (register-shifted register)", "cccc0001101s0000ddddrrrr0tt1mmmm", |v, i| {
            v.shift_reg(i)
        }),
    ]
}

/// Decodes one A32 instruction word.
pub fn decode_a32<V: A32Visitor>(instr: u32) -> Option<Matcher<V>> {
    decode(&table::<V>(), instr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingVisitor {
        called: Vec<&'static str>,
    }

    impl A32Visitor for RecordingVisitor {
        fn mov_reg(&mut self, _: u32) -> bool {
            self.called.push("mov_reg");
            true
        }
        fn shift_reg(&mut self, _: u32) -> bool {
            self.called.push("shift_reg");
            true
        }
        fn add_imm(&mut self, _: u32) -> bool {
            self.called.push("add_imm");
            true
        }
        fn sub_imm(&mut self, _: u32) -> bool {
            self.called.push("sub_imm");
            true
        }
        fn b(&mut self, _: u32) -> bool {
            self.called.push("b");
            false
        }
        fn bl(&mut self, _: u32) -> bool {
            self.called.push("bl");
            true
        }
        fn svc(&mut self, _: u32) -> bool {
            self.called.push("svc");
            false
        }
    }

    #[test]
    fn b_and_bl_share_one_matcher_dispatched_by_link_bit() {
        // B, always (cond=1110), offset 0: 1110 101 0 000000000000000000000000
        let b_instr: u32 = 0b1110_101_0_000000000000000000000000;
        let m = decode_a32::<RecordingVisitor>(b_instr).expect("B should decode");
        let mut visitor = RecordingVisitor::default();
        (m.handler)(&mut visitor, b_instr);
        assert_eq!(visitor.called, vec!["b"]);

        let bl_instr: u32 = 0b1110_101_1_000000000000000000000000;
        let m2 = decode_a32::<RecordingVisitor>(bl_instr).expect("BL should decode");
        let mut visitor2 = RecordingVisitor::default();
        (m2.handler)(&mut visitor2, bl_instr);
        assert_eq!(visitor2.called, vec!["bl"]);
    }

    #[test]
    fn svc_takes_priority_over_b_pattern_space() {
        // cond=1110, SVC #0
        let instr: u32 = 0b1110_1111_000000000000000000000000;
        let m = decode_a32::<RecordingVisitor>(instr).expect("SVC should decode");
        assert_eq!(m.name, "SVC");
    }

    #[test]
    fn shift_reg_decodes_distinctly_from_the_immediate_shift_mov() {
        // LSLS R0, R1, R2: cond=AL, 0001101, S=1, Rn=0000, Rd=0000,
        // Rs=0010, 0, type=00 (LSL), 1, Rm=0001.
        let instr: u32 =
            (0b1110 << 28) | (0b0001101 << 21) | (1 << 20) | (0b0010 << 8) | (1 << 4) | 0b0001;
        let m = decode_a32::<RecordingVisitor>(instr).expect("register-shifted MOV should decode");
        assert_eq!(m.name, "MOV (register-shifted register)");
        let mut visitor = RecordingVisitor::default();
        (m.handler)(&mut visitor, instr);
        assert_eq!(visitor.called, vec!["shift_reg"]);
    }
}
