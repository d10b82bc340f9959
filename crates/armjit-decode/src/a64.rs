use crate::matcher::{decode, matcher, Matcher};

/// One method per supported A64 instruction class. The decode table only
/// ever calls through these, never dynarmic's full several-hundred-entry
/// set — translating the whole A64 ISA is explicitly out of scope; any
/// encoding not listed here falls through `decode_a64` to `None`, which the
/// translator turns into an interpreter-fallback terminal.
pub trait A64Visitor {
    fn lslv(&mut self, instr: u32) -> bool;
    fn lsrv(&mut self, instr: u32) -> bool;
    fn asrv(&mut self, instr: u32) -> bool;
    fn rorv(&mut self, instr: u32) -> bool;
    fn add_shifted_reg(&mut self, instr: u32) -> bool;
    fn subs_shifted_reg(&mut self, instr: u32) -> bool;
    fn movz(&mut self, instr: u32) -> bool;
    fn ret(&mut self, instr: u32) -> bool;
    fn b(&mut self, instr: u32) -> bool;
    fn b_cond(&mut self, instr: u32) -> bool;
    fn svc(&mut self, instr: u32) -> bool;
    fn add_vector(&mut self, instr: u32) -> bool;
    fn and_asimd(&mut self, instr: u32) -> bool;
}

fn table<V: A64Visitor>() -> Vec<Matcher<V>> {
    vec![
        // Most-specific-first: RET/SVC/B.cond/B have no overlap with the
        // data-processing families below, but are listed first as they are
        // the cheapest to identify (longest fixed-bit runs).
        matcher("RET", "1101011001011111000000nnnnn00000", |v, i| v.ret(i)),
        matcher("SVC", "11010100000iiiiiiiiiiiiiiii00001", |v, i| v.svc(i)),
        matcher("B.cond", "01010100iiiiiiiiiiiiiiiiiii0cccc", |v, i| v.b_cond(i)),
        matcher("B", "000101iiiiiiiiiiiiiiiiiiiiiiiiii", |v, i| v.b(i)),
        matcher("MOVZ", "v10100101hhiiiiiiiiiiiiiiiiddddd", |v, i| v.movz(i)),
        matcher("LSLV", "v0011010110mmmmm001000nnnnnddddd", |v, i| v.lslv(i)),
        matcher("LSRV", "v0011010110mmmmm001001nnnnnddddd", |v, i| v.lsrv(i)),
        matcher("ASRV", "v0011010110mmmmm001010nnnnnddddd", |v, i| v.asrv(i)),
        matcher("RORV", "v0011010110mmmmm001011nnnnnddddd", |v, i| v.rorv(i)),
        matcher("ADD (vector)", "0q001110ss1mmmmm100001nnnnnddddd", |v, i| v.add_vector(i)),
        matcher("AND (vector)", "0q001110001mmmmm000111nnnnnddddd", |v, i| v.and_asimd(i)),
        matcher("SUBS (shifted reg)", "v1101011hh0mmmmmiiiiiinnnnnddddd", |v, i| v.subs_shifted_reg(i)),
        matcher("ADD (shifted reg)", "v0001011hh0mmmmmiiiiiinnnnnddddd", |v, i| v.add_shifted_reg(i)),
    ]
}

/// Decodes one A64 instruction word, returning the first matching entry in
/// declaration order. Pure: does not invoke the returned matcher's handler.
pub fn decode_a64<V: A64Visitor>(instr: u32) -> Option<Matcher<V>> {
    decode(&table::<V>(), instr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingVisitor {
        called: Vec<&'static str>,
    }

    impl A64Visitor for RecordingVisitor {
        fn lslv(&mut self, _: u32) -> bool {
            self.called.push("lslv");
            true
        }
        fn lsrv(&mut self, _: u32) -> bool {
            self.called.push("lsrv");
            true
        }
        fn asrv(&mut self, _: u32) -> bool {
            self.called.push("asrv");
            true
        }
        fn rorv(&mut self, _: u32) -> bool {
            self.called.push("rorv");
            true
        }
        fn add_shifted_reg(&mut self, _: u32) -> bool {
            self.called.push("add_shifted_reg");
            true
        }
        fn subs_shifted_reg(&mut self, _: u32) -> bool {
            self.called.push("subs_shifted_reg");
            true
        }
        fn movz(&mut self, _: u32) -> bool {
            self.called.push("movz");
            true
        }
        fn ret(&mut self, _: u32) -> bool {
            self.called.push("ret");
            false
        }
        fn b(&mut self, _: u32) -> bool {
            self.called.push("b");
            false
        }
        fn b_cond(&mut self, _: u32) -> bool {
            self.called.push("b_cond");
            false
        }
        fn svc(&mut self, _: u32) -> bool {
            self.called.push("svc");
            false
        }
        fn add_vector(&mut self, _: u32) -> bool {
            self.called.push("add_vector");
            true
        }
        fn and_asimd(&mut self, _: u32) -> bool {
            self.called.push("and_asimd");
            true
        }
    }

    #[test]
    fn decodes_ret_x30() {
        // RET X30 == 0xD65F03C0
        let m = decode_a64::<RecordingVisitor>(0xD65F03C0).expect("RET should decode");
        assert_eq!(m.name, "RET");
    }

    #[test]
    fn decodes_lslv_64bit() {
        // LSLV X2, X3, X4 (sf=1, Rm=4, Rn=3, Rd=2): 1 0011010110 00100 001000 00011 00010
        let instr: u32 = 0b1_0011010110_00100_001000_00011_00010;
        let m = decode_a64::<RecordingVisitor>(instr).expect("LSLV should decode");
        assert_eq!(m.name, "LSLV");
        let mut visitor = RecordingVisitor::default();
        (m.handler)(&mut visitor, instr);
        assert_eq!(visitor.called, vec!["lslv"]);
    }

    #[test]
    fn decodes_movz() {
        // MOVZ X0, #0x1234 (sf=1, hw=00): 1 10 100101 00 0001001000110100 00000
        let instr: u32 = 0b1_10_100101_00_0001001000110100_00000;
        let m = decode_a64::<RecordingVisitor>(instr).expect("MOVZ should decode");
        assert_eq!(m.name, "MOVZ");
    }

    #[test]
    fn unrecognized_encoding_decodes_to_none() {
        assert!(decode_a64::<RecordingVisitor>(0xFFFF_FFFF).is_none());
    }
}
