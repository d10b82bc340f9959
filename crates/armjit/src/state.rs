//! Guest register/flag/PC accessors, over the ABI-stable layout
//! `armjit_backend_x64::JitState` defines. This is the one view of that
//! struct exposed to embedders and to `UserCallbacks::interpret_one`; the
//! raw struct itself stays internal to the backend/runtime crates.

use armjit_backend_x64::JitState;

pub struct GuestState<'a>(pub(crate) &'a mut JitState);

impl<'a> GuestState<'a> {
    pub fn reg(&self, index: u8) -> u64 {
        self.0.gpr[index as usize]
    }

    pub fn set_reg(&mut self, index: u8, value: u64) {
        self.0.gpr[index as usize] = value;
    }

    pub fn sp(&self) -> u64 {
        self.0.sp
    }

    pub fn set_sp(&mut self, value: u64) {
        self.0.sp = value;
    }

    pub fn pc(&self) -> u64 {
        self.0.pc
    }

    pub fn set_pc(&mut self, value: u64) {
        self.0.pc = value;
    }

    pub fn cpsr(&self) -> u32 {
        self.0.cpsr
    }

    pub fn set_cpsr(&mut self, value: u32) {
        self.0.cpsr = value;
    }

    pub fn nzcv(&self) -> u32 {
        self.0.nzcv
    }

    pub fn set_nzcv(&mut self, value: u32) {
        self.0.nzcv = value;
    }

    pub fn fpscr(&self) -> u32 {
        self.0.fpscr
    }

    pub fn set_fpscr(&mut self, value: u32) {
        self.0.fpscr = value;
    }

    pub fn vector(&self, index: u8) -> u128 {
        self.0.vector[index as usize]
    }

    pub fn set_vector(&mut self, index: u8, value: u128) {
        self.0.vector[index as usize] = value;
    }

    pub fn halt_requested(&self) -> bool {
        self.0.halt_requested != 0
    }

    pub fn cycles_remaining(&self) -> i64 {
        self.0.cycles_remaining
    }
}
