//! The public `Jit` handle: owns a `Dispatcher` (translation/compilation/
//! patch-relinking) and the host's `UserCallbacks`, and exposes the
//! guest-facing `Run`/`Step`/`HaltExecution`/`ClearCache`/
//! `InvalidateCacheRanges` surface plus register/flag/PC accessors.

use crate::callbacks::UserCallbacks;
use crate::config::JitConfig;
use crate::error::Error;
use crate::state::GuestState;
use armjit_ir::{AddrRange, LocationDescriptor};
use armjit_opt::ReadOnlyMemoryOracle;
use armjit_runtime::Dispatcher;
use armjit_translate::ReadCode;
use armjit_types::ExecMode;
use std::cell::RefCell;

/// Adapts `UserCallbacks` to the two narrower traits the translation and
/// optimization pipelines actually need. Holds a shared reference to the
/// same `RefCell` rather than taking `&mut C` directly so a code-fetch
/// bridge and a memory-oracle bridge can be alive at once: `ReadCode`
/// requires `&mut self` by convention (it tracks no state of its own here,
/// the mutability is the callback's), while `ReadOnlyMemoryOracle` requires
/// `&self` — both route through the same `RefCell::borrow_mut`.
struct CallbacksBridge<'a, C: UserCallbacks>(&'a RefCell<C>);

impl<'a, C: UserCallbacks> Clone for CallbacksBridge<'a, C> {
    fn clone(&self) -> Self {
        CallbacksBridge(self.0)
    }
}
impl<'a, C: UserCallbacks> Copy for CallbacksBridge<'a, C> {}

impl<'a, C: UserCallbacks> ReadCode for CallbacksBridge<'a, C> {
    fn read32(&mut self, pc: u64) -> u32 {
        self.0.borrow_mut().read_code(pc)
    }

    fn read16(&mut self, pc: u64) -> u16 {
        let word = self.0.borrow_mut().read_code(pc & !0x3);
        if pc & 0x2 == 0 {
            word as u16
        } else {
            (word >> 16) as u16
        }
    }
}

impl<'a, C: UserCallbacks> ReadOnlyMemoryOracle for CallbacksBridge<'a, C> {
    fn is_read_only(&self, addr: u64) -> bool {
        self.0.borrow_mut().is_read_only_memory(addr)
    }
    fn read8(&self, addr: u64) -> u8 {
        self.0.borrow_mut().read8(addr)
    }
    fn read16(&self, addr: u64) -> u16 {
        self.0.borrow_mut().read16(addr)
    }
    fn read32(&self, addr: u64) -> u32 {
        self.0.borrow_mut().read32(addr)
    }
    fn read64(&self, addr: u64) -> u64 {
        self.0.borrow_mut().read64(addr)
    }
}

pub struct Jit<C: UserCallbacks> {
    dispatcher: Dispatcher,
    callbacks: RefCell<C>,
    mode: ExecMode,
    fpcr_bits: u8,
    #[allow(dead_code)]
    config: JitConfig,
}

impl<C: UserCallbacks> Jit<C> {
    pub fn new(callbacks: C, config: JitConfig) -> Self {
        let mut dispatcher = Dispatcher::new();
        dispatcher.state.cycles_remaining = config.initial_cycle_budget;
        Jit {
            dispatcher,
            callbacks: RefCell::new(callbacks),
            mode: ExecMode::A64,
            fpcr_bits: 0,
            config,
        }
    }

    pub fn set_mode(&mut self, mode: ExecMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    fn current_location(&self) -> LocationDescriptor {
        LocationDescriptor::new(self.dispatcher.state.pc, self.mode, self.fpcr_bits)
    }

    pub fn registers(&mut self) -> GuestState<'_> {
        GuestState(&mut self.dispatcher.state)
    }

    /// Executes until the halt flag is observed or `cycle_budget` ticks are
    /// spent, whichever comes first.
    pub fn run(&mut self, cycle_budget: i64) {
        self.dispatcher.state.cycles_remaining = cycle_budget;
        self.dispatcher.state.halt_requested = 0;
        let start = self.current_location();
        let mut code_bridge = CallbacksBridge(&self.callbacks);
        let memory_bridge = CallbacksBridge(&self.callbacks);
        self.dispatcher.run(start, &mut code_bridge, Some(&memory_bridge));
    }

    /// Executes exactly one guest instruction via the interpreter fallback,
    /// bypassing compiled code entirely.
    pub fn step(&mut self) {
        let mut callbacks = self.callbacks.borrow_mut();
        let mut state = GuestState(&mut self.dispatcher.state);
        callbacks.interpret_one(&mut state);
    }

    pub fn halt_execution(&mut self) {
        self.dispatcher.state.halt_requested = 1;
    }

    pub fn clear_cache(&mut self) {
        self.dispatcher.clear_cache();
    }

    pub fn invalidate_cache_ranges(&mut self, ranges: &[AddrRange]) {
        self.dispatcher.invalidate_ranges(ranges);
    }

    /// Reports a host-observed fault the guest can't recover from (e.g. an
    /// unmapped page the page-table/callback path can't resolve). The JIT
    /// itself never constructs this from translation/compilation — those
    /// failures are bugs, not guest-triggerable `Error`s.
    pub fn report_callback_fault(&self, message: impl Into<String>) -> Error {
        Error::Callback(message.into())
    }
}
