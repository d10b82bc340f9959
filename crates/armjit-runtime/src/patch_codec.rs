//! Raw byte encodings for the three fixed-width instruction forms
//! `armjit_backend_x64::PatchKind` describes, and the relative-target math
//! needed to relink or unlink a site in place.
//!
//! These are hand-encoded rather than round-tripped through `iced_x86`
//! because every form here has a single fixed-width shape (`mov rcx,
//! imm64`; `jmp rel32`; `jg rel32`) known at patch-site-creation time — the
//! same reason real JIT runtimes hand-roll their relink stubs instead of
//! re-invoking a general encoder for a single, always-identical
//! instruction.

use armjit_backend_x64::PatchKind;

pub fn instruction_len(kind: PatchKind) -> usize {
    match kind {
        PatchKind::MovImmediateToRcx => 10,
        PatchKind::UnconditionalNear => 5,
        PatchKind::ConditionalNear => 6,
    }
}

/// Encodes the instruction at host address `instr_addr` so it carries
/// `target` (an absolute address for the two jump kinds, or the raw 64-bit
/// payload for `MovImmediateToRcx`).
pub fn encode(kind: PatchKind, instr_addr: u64, target: u64) -> Vec<u8> {
    match kind {
        PatchKind::MovImmediateToRcx => {
            let mut bytes = vec![0x48, 0xB9];
            bytes.extend_from_slice(&target.to_le_bytes());
            bytes
        }
        PatchKind::UnconditionalNear => {
            let rel = rel32(instr_addr, 5, target);
            let mut bytes = vec![0xE9];
            bytes.extend_from_slice(&rel.to_le_bytes());
            bytes
        }
        PatchKind::ConditionalNear => {
            let rel = rel32(instr_addr, 6, target);
            let mut bytes = vec![0x0F, 0x8F];
            bytes.extend_from_slice(&rel.to_le_bytes());
            bytes
        }
    }
}

fn rel32(instr_addr: u64, instr_len: u64, target: u64) -> i32 {
    let delta = target as i64 - (instr_addr as i64 + instr_len as i64);
    i32::try_from(delta).expect("JIT code buffer exceeds +/-2GiB near-branch range")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mov_rcx_imm64_is_ten_bytes_and_little_endian() {
        let bytes = encode(PatchKind::MovImmediateToRcx, 0, 0x1122_3344_5566_7788);
        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[0..2], &[0x48, 0xB9]);
        assert_eq!(&bytes[2..], &0x1122_3344_5566_7788u64.to_le_bytes());
    }

    #[test]
    fn unconditional_jump_targets_are_relative_to_the_next_instruction() {
        let bytes = encode(PatchKind::UnconditionalNear, 0x1000, 0x1010);
        assert_eq!(bytes[0], 0xE9);
        let rel = i32::from_le_bytes(bytes[1..5].try_into().unwrap());
        assert_eq!(rel, 0x1010 - (0x1000 + 5));
    }

    #[test]
    fn conditional_jump_is_six_bytes_with_0f_8f_opcode() {
        let bytes = encode(PatchKind::ConditionalNear, 0x2000, 0x1000);
        assert_eq!(bytes.len(), 6);
        assert_eq!(&bytes[0..2], &[0x0F, 0x8F]);
    }
}
