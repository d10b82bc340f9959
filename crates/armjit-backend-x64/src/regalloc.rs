use armjit_ir::ValueId;
use armjit_types::Type;
use iced_x86::Register;
use std::collections::HashMap;

/// General-purpose host registers available to the allocator. R15 is pinned
/// to the `JitState` base pointer and RSP is the host stack pointer; neither
/// is ever handed out. RCX is kept in the pool but preferred for
/// `UseRegister` hints since variable-count shifts need their count there.
const GPR_POOL: &[Register] = &[
    Register::RAX,
    Register::RBX,
    Register::RCX,
    Register::RDX,
    Register::RSI,
    Register::RDI,
    Register::R8,
    Register::R9,
    Register::R10,
    Register::R11,
    Register::R12,
    Register::R13,
    Register::R14,
];

const XMM_POOL: &[Register] = &[
    Register::XMM0,
    Register::XMM1,
    Register::XMM2,
    Register::XMM3,
    Register::XMM4,
    Register::XMM5,
    Register::XMM6,
    Register::XMM7,
    Register::XMM8,
    Register::XMM9,
    Register::XMM10,
    Register::XMM11,
    Register::XMM12,
    Register::XMM13,
    Register::XMM14,
    Register::XMM15,
];

fn class_of(ty: Type) -> RegClass {
    match ty {
        Type::U128 => RegClass::Xmm,
        _ => RegClass::Gpr,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegClass {
    Gpr,
    Xmm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostLoc {
    Reg(Register),
    /// An offset (in 8-byte slots from the per-block spill base) into the
    /// stack-allocated spill area.
    Spill(u32),
}

/// Linear-scan allocator over one block's instruction stream. Opcode emit
/// routines never see a raw `Register`: every request goes through
/// `DefRegister`/`UseRegister`/`UseDefRegister`/`ScratchRegister`, and the
/// allocator decides registers vs. spill slots.
pub struct RegAlloc {
    assignment: HashMap<ValueId, HostLoc>,
    gpr_owner: [Option<ValueId>; GPR_POOL.len()],
    xmm_owner: [Option<ValueId>; XMM_POOL.len()],
    spill_watermark: u32,
    spill_high_water_mark: u32,
}

impl RegAlloc {
    pub fn new() -> Self {
        RegAlloc {
            assignment: HashMap::new(),
            gpr_owner: [None; GPR_POOL.len()],
            xmm_owner: [None; XMM_POOL.len()],
            spill_watermark: 0,
            spill_high_water_mark: 0,
        }
    }

    /// Clears all register/spill assignments; called once at the start of
    /// emitting each block.
    pub fn reset(&mut self) {
        self.assignment.clear();
        self.gpr_owner = [None; GPR_POOL.len()];
        self.xmm_owner = [None; XMM_POOL.len()];
        self.spill_watermark = 0;
        self.spill_high_water_mark = 0;
    }

    pub fn spill_slots_used(&self) -> u32 {
        self.spill_high_water_mark
    }

    fn pool(class: RegClass) -> &'static [Register] {
        match class {
            RegClass::Gpr => GPR_POOL,
            RegClass::Xmm => XMM_POOL,
        }
    }

    fn owner_slice(&mut self, class: RegClass) -> &mut [Option<ValueId>] {
        match class {
            RegClass::Gpr => &mut self.gpr_owner,
            RegClass::Xmm => &mut self.xmm_owner,
        }
    }

    fn spill_alloc(&mut self) -> HostLoc {
        let slot = self.spill_watermark;
        self.spill_watermark += 1;
        self.spill_high_water_mark = self.spill_high_water_mark.max(self.spill_watermark);
        HostLoc::Spill(slot)
    }

    /// Picks a free register of `class`, preferring `hint` if it's free,
    /// else spills the oldest assignment in that class to make room.
    fn acquire(&mut self, class: RegClass, hint: Option<Register>) -> Register {
        let pool = Self::pool(class);
        if let Some(hint) = hint {
            let idx = pool.iter().position(|&r| r == hint).expect("hint not in pool");
            if self.owner_slice(class)[idx].is_none() {
                return hint;
            }
        }
        for (idx, owner) in self.owner_slice(class).iter().enumerate() {
            if owner.is_none() {
                return pool[idx];
            }
        }
        // Pressure: evict the lowest-index live assignment. A linear scan
        // register allocator this simple doesn't track live ranges well
        // enough to pick the best victim, only a legal one.
        let victim_idx = 0;
        let victim = self.owner_slice(class)[victim_idx].take().unwrap();
        let spill = self.spill_alloc();
        self.assignment.insert(victim, spill);
        pool[victim_idx]
    }

    /// Allocates a fresh host register to hold `v`'s result. `v` must not
    /// already have an assignment.
    pub fn def_register(&mut self, v: ValueId, ty: Type) -> Register {
        debug_assert!(!self.assignment.contains_key(&v), "DefRegister on already-assigned value");
        let class = class_of(ty);
        let reg = self.acquire(class, None);
        let idx = Self::pool(class).iter().position(|&r| r == reg).unwrap();
        self.owner_slice(class)[idx] = Some(v);
        self.assignment.insert(v, HostLoc::Reg(reg));
        reg
    }

    /// Ensures `v`'s value is resident in a host register, loading it from
    /// its spill slot if necessary, and returns that register. Callers must
    /// not write through it — `v`'s value is still live at later uses.
    pub fn use_register(&mut self, v: ValueId, ty: Type, hint: Option<Register>) -> HostLoc {
        match self.assignment.get(&v) {
            Some(&HostLoc::Reg(r)) => HostLoc::Reg(r),
            Some(&HostLoc::Spill(slot)) => {
                let class = class_of(ty);
                let reg = self.acquire(class, hint);
                let idx = Self::pool(class).iter().position(|&r| r == reg).unwrap();
                self.owner_slice(class)[idx] = Some(v);
                self.assignment.insert(v, HostLoc::Reg(reg));
                HostLoc::Spill(slot) // caller emits a reload from `slot` into `reg`
            }
            None => panic!("UseRegister on a value with no assignment (DCE/ordering bug)"),
        }
    }

    /// Reuses `src`'s register for `dst`'s result (an in-place transform,
    /// e.g. `Not` complementing its operand register directly).
    pub fn use_def_register(&mut self, src: ValueId, dst: ValueId) -> Register {
        let HostLoc::Reg(reg) = self.assignment.remove(&src).expect("UseDefRegister on unassigned src") else {
            panic!("UseDefRegister requires src to already be in a register");
        };
        self.assignment.insert(dst, HostLoc::Reg(reg));
        reg
    }

    /// A register with unspecified contents, valid only until the end of
    /// the current emit routine's scope.
    pub fn scratch_register(&mut self, class_hint: Type) -> Register {
        let class = class_of(class_hint);
        let pool = Self::pool(class);
        for (idx, owner) in self.owner_slice(class).iter().enumerate() {
            if owner.is_none() {
                return pool[idx];
            }
        }
        pool[0]
    }

    /// Unpins hints and decays any scratch-only liveness; called after each
    /// instruction is emitted. This allocator doesn't track per-op scratch
    /// registers separately from the permanent assignment table, so this is
    /// presently a no-op hook kept for parity with the dynarmic interface
    /// and as the seam a smarter allocator would hook into.
    pub fn end_of_alloc_scope(&mut self) {}
}

impl Default for RegAlloc {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn def_register_assigns_distinct_registers() {
        let mut ra = RegAlloc::new();
        let a = ra.def_register(ValueId(0), Type::U32);
        let b = ra.def_register(ValueId(1), Type::U32);
        assert_ne!(a, b);
    }

    #[test]
    fn reset_clears_all_assignments() {
        let mut ra = RegAlloc::new();
        ra.def_register(ValueId(0), Type::U32);
        ra.reset();
        assert_eq!(ra.spill_slots_used(), 0);
    }

    #[test]
    fn gpr_and_xmm_classes_never_alias() {
        let mut ra = RegAlloc::new();
        let gpr = ra.def_register(ValueId(0), Type::U32);
        let xmm = ra.def_register(ValueId(1), Type::U128);
        assert!(GPR_POOL.contains(&gpr));
        assert!(XMM_POOL.contains(&xmm));
    }
}
