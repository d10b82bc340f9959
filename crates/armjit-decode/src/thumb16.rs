use crate::matcher::{decode, matcher, Matcher};

/// Representative 16-bit Thumb instruction classes.
pub trait Thumb16Visitor {
    fn movs_imm(&mut self, instr: u16) -> bool;
    fn adds_reg(&mut self, instr: u16) -> bool;
    fn lsls_imm(&mut self, instr: u16) -> bool;
    fn bx(&mut self, instr: u16) -> bool;
}

fn table<V: Thumb16Visitor>() -> Vec<Matcher<V>> {
    vec![
        matcher("BX", "010001110mmmm000", |v, i| v.bx(i as u16)),
        matcher("LSLS (imm)", "00000iiiiimmmddd", |v, i| v.lsls_imm(i as u16)),
        matcher("ADDS (register)", "0001100mmmnnnddd", |v, i| v.adds_reg(i as u16)),
        matcher("MOVS (imm8)", "00100dddiiiiiiii", |v, i| v.movs_imm(i as u16)),
    ]
}

/// Decodes one 16-bit Thumb halfword. Matching reuses the 32-bit `Matcher`
/// machinery by widening the halfword into the low 16 bits of a `u32`; all
/// our bitstrings here are exactly 16 characters so the top 16 bits of the
/// mask are implicitly zero (don't-care).
pub fn decode_thumb16<V: Thumb16Visitor>(half: u16) -> Option<Matcher<V>> {
    decode(&table::<V>(), half as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingVisitor {
        called: Vec<&'static str>,
    }

    impl Thumb16Visitor for RecordingVisitor {
        fn movs_imm(&mut self, _: u16) -> bool {
            self.called.push("movs_imm");
            true
        }
        fn adds_reg(&mut self, _: u16) -> bool {
            self.called.push("adds_reg");
            true
        }
        fn lsls_imm(&mut self, _: u16) -> bool {
            self.called.push("lsls_imm");
            true
        }
        fn bx(&mut self, _: u16) -> bool {
            self.called.push("bx");
            false
        }
    }

    #[test]
    fn decodes_movs_r0_imm() {
        // MOVS R0, #0x12: 00100 000 00010010
        let instr: u16 = 0b00100_000_00010010;
        let m = decode_thumb16::<RecordingVisitor>(instr).expect("MOVS should decode");
        assert_eq!(m.name, "MOVS (imm8)");
    }

    #[test]
    fn decodes_bx_lr() {
        // BX LR: 010001110 1110 000
        let instr: u16 = 0b010001110_1110_000;
        let m = decode_thumb16::<RecordingVisitor>(instr).expect("BX should decode");
        assert_eq!(m.name, "BX");
    }
}
