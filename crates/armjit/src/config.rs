use crate::callbacks::Coprocessor;

/// Construction-time configuration for a `Jit` instance.
pub struct JitConfig {
    /// Direct-mapped guest page table: one base pointer per `PAGE_BITS`-
    /// sized page, `None` entries fall back to the callback path. Not yet
    /// consulted by emitted code — reaching it requires the external-
    /// callback trampoline wiring, which this pass doesn't build — but the
    /// slot is present so the config record's shape matches the source.
    pub page_table: Option<Box<[Option<std::ptr::NonNull<u8>>]>>,
    /// 16 A32 coprocessor handles. No translator currently emits a
    /// coprocessor access; `None` entries are simply unimplemented.
    pub coprocessors: [Option<Box<dyn Coprocessor>>; 16],
    pub initial_cycle_budget: i64,
}

impl Default for JitConfig {
    fn default() -> Self {
        JitConfig {
            page_table: None,
            coprocessors: Default::default(),
            initial_cycle_budget: 0,
        }
    }
}
