use crate::location::LocationDescriptor;
use armjit_types::Cond;

/// The block-exit decision. Exactly one of these is attached to a `Block`
/// before emission; terminals may nest (`If`/`CheckBit`/`CheckHalt` wrap a
/// sub-terminal), and the backend lowers the tree by a single
/// pattern-match site rather than a virtual-call hierarchy per terminal
/// kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// Return to the dispatcher, which invokes the external interpreter at
    /// `desc` for exactly one guest instruction.
    Interpret(LocationDescriptor),
    /// Plain return to the dispatcher.
    ReturnToDispatch,
    /// If cycles remain, jump to the compiled block for `desc`; else return.
    LinkBlock(LocationDescriptor),
    /// Same as `LinkBlock` but without the cycle-remaining check, for tight
    /// loops that already account for their budget per iteration.
    LinkBlockFast(LocationDescriptor),
    /// Attempt to satisfy control flow from the return-stack-buffer
    /// prediction cache; falls through on a miss.
    PopRSBHint,
    /// Evaluate the guest condition `cond` and dispatch to `then` or `els`.
    If {
        cond: Cond,
        then: Box<Terminal>,
        els: Box<Terminal>,
    },
    /// Dispatch on a runtime boolean stashed in the JIT state.
    CheckBit { then: Box<Terminal>, els: Box<Terminal> },
    /// If the halt-request flag is set, return; else dispatch to `inner`.
    CheckHalt { inner: Box<Terminal> },
    /// Run `count` consecutive guest instructions starting at `start` through
    /// the external interpreter in one dispatcher call, then resume normal
    /// compiled-block lookup at wherever the interpreter left the guest PC.
    /// Produced by `MergeInterpretBlocks` coalescing a run of single-
    /// instruction `Interpret` blocks so the dispatcher doesn't round-trip
    /// through block lookup once per guest instruction in undecodable runs.
    InterpretMany { start: LocationDescriptor, count: u32 },
}

impl Terminal {
    pub fn check_halt(inner: Terminal) -> Terminal {
        Terminal::CheckHalt {
            inner: Box::new(inner),
        }
    }

    pub fn if_cond(cond: Cond, then: Terminal, els: Terminal) -> Terminal {
        Terminal::If {
            cond,
            then: Box::new(then),
            els: Box::new(els),
        }
    }

    pub fn check_bit(then: Terminal, els: Terminal) -> Terminal {
        Terminal::CheckBit {
            then: Box::new(then),
            els: Box::new(els),
        }
    }

    /// Every location descriptor a terminal (including nested sub-terminals)
    /// can transfer control to; used by the dispatcher to find patch sites
    /// that must be relinked when a new block for one of these becomes
    /// available.
    pub fn linked_descriptors(&self) -> Vec<LocationDescriptor> {
        match self {
            Terminal::Interpret(desc) | Terminal::LinkBlock(desc) | Terminal::LinkBlockFast(desc) => {
                vec![*desc]
            }
            Terminal::ReturnToDispatch | Terminal::PopRSBHint | Terminal::InterpretMany { .. } => vec![],
            Terminal::If { then, els, .. } | Terminal::CheckBit { then, els } => {
                let mut v = then.linked_descriptors();
                v.extend(els.linked_descriptors());
                v
            }
            Terminal::CheckHalt { inner } => inner.linked_descriptors(),
        }
    }
}
