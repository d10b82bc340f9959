//! End-to-end: a host embeds `Jit`, supplies code for `MOVZ X0, #5; ADD X0,
//! X0, X0; RET X30`, and runs it. Mirrors the same three-instruction
//! program `armjit-translate`'s own A64 block tests use, one layer up.

use armjit::{GuestState, JitConfig, UserCallbacks};
use std::sync::Mutex;

struct Program {
    words: [u32; 3],
    svc_calls: Mutex<Vec<u32>>,
}

impl UserCallbacks for Program {
    fn read_code(&mut self, vaddr: u64) -> u32 {
        let index = ((vaddr - 0x1000) / 4) as usize;
        self.words[index]
    }

    fn read8(&mut self, _vaddr: u64) -> u8 {
        0
    }
    fn read16(&mut self, _vaddr: u64) -> u16 {
        0
    }
    fn read32(&mut self, _vaddr: u64) -> u32 {
        0
    }
    fn read64(&mut self, _vaddr: u64) -> u64 {
        0
    }
    fn write8(&mut self, _vaddr: u64, _value: u8) {}
    fn write16(&mut self, _vaddr: u64, _value: u16) {}
    fn write32(&mut self, _vaddr: u64, _value: u32) {}
    fn write64(&mut self, _vaddr: u64, _value: u64) {}

    fn interpret_one(&mut self, _state: &mut GuestState<'_>) {
        unreachable!("this program decodes cleanly, no fallback expected");
    }

    fn call_svc(&mut self, swi_number: u32) {
        self.svc_calls.lock().unwrap().push(swi_number);
    }

    fn add_ticks(&mut self, _n: u64) {}
    fn ticks_remaining(&self) -> u64 {
        u64::MAX
    }
}

#[test]
fn jit_construction_and_register_access_round_trip() {
    let movz: u32 = 0b1_10_100101_00_0000000000000101_00000;
    let add: u32 = 0b1_0001011_00_0_00000_000000_00000_00000;
    let ret: u32 = 0b1101011001011111000000_11110_00000;

    let program = Program {
        words: [movz, add, ret],
        svc_calls: Mutex::new(Vec::new()),
    };

    let mut jit = armjit::Jit::new(program, JitConfig::default());
    jit.registers().set_pc(0x1000);
    assert_eq!(jit.registers().pc(), 0x1000);

    jit.registers().set_reg(0, 0xDEAD_BEEF);
    assert_eq!(jit.registers().reg(0), 0xDEAD_BEEF);

    jit.halt_execution();
    assert!(jit.registers().halt_requested());
}
