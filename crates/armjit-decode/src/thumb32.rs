use crate::matcher::{decode, matcher, Matcher};

/// Representative 32-bit Thumb (Thumb-2) instruction classes. The two
/// entries here mirror the original decoder's own sample table: a
/// long-branch-with-link form and the reserved `UDF` trap.
pub trait Thumb32Visitor {
    fn bl_imm(&mut self, instr: u32) -> bool;
    fn udf(&mut self, instr: u32) -> bool;
}

fn table<V: Thumb32Visitor>() -> Vec<Matcher<V>> {
    vec![
        matcher("BL (imm)", "11110vvvvvvvvvvv11111vvvvvvvvvvv", |v, i| v.bl_imm(i)),
        matcher("UDF", "111101111111----1010------------", |v, i| v.udf(i)),
    ]
}

/// Decodes a 32-bit Thumb-2 instruction word. The translator is responsible
/// for concatenating the two halfwords (first halfword in the high bits)
/// before calling this.
pub fn decode_thumb32<V: Thumb32Visitor>(instr: u32) -> Option<Matcher<V>> {
    decode(&table::<V>(), instr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingVisitor {
        called: Vec<&'static str>,
    }

    impl Thumb32Visitor for RecordingVisitor {
        fn bl_imm(&mut self, _: u32) -> bool {
            self.called.push("bl_imm");
            true
        }
        fn udf(&mut self, _: u32) -> bool {
            self.called.push("udf");
            false
        }
    }

    #[test]
    fn decodes_bl_imm() {
        let instr: u32 = 0b11110_00000000000_11111_00000000000;
        let m = decode_thumb32::<RecordingVisitor>(instr).expect("BL(imm) should decode");
        assert_eq!(m.name, "BL (imm)");
    }

    #[test]
    fn decodes_udf() {
        let instr: u32 = 0b111101111111_0000_1010_000000000000;
        let m = decode_thumb32::<RecordingVisitor>(instr).expect("UDF should decode");
        assert_eq!(m.name, "UDF");
    }
}
