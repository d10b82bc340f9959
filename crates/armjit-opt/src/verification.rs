use armjit_ir::{Block, ValueId};
use armjit_types::Type;
use thiserror::Error;

/// A block that failed to pass `verify`. Carried as data rather than just
/// logged since callers decide whether a verification failure is fatal
/// (debug builds) or merely worth a `tracing::warn!` and a fallback to the
/// interpreter (release builds), per `JitConfig::verify_blocks`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("block has no terminal set")]
    MissingTerminal,
    #[error("use-list entries do not mirror operand lists")]
    InconsistentUseLists,
    #[error("instruction {0:?} references operand {1:?}, which is not earlier in the block")]
    ForwardReference(ValueId, ValueId),
    #[error("instruction {id:?} ({op:?}) operand {index} has type {actual:?}, opcode expects {expected:?}")]
    OperandTypeMismatch {
        id: ValueId,
        op: armjit_types::Opcode,
        index: usize,
        actual: Type,
        expected: Type,
    },
}

fn type_matches(expected: Type, actual: Type) -> bool {
    match expected {
        Type::Void => true,
        Type::U32U64 => matches!(actual, Type::U32 | Type::U64),
        other => actual == other,
    }
}

/// Runs every consistency check a translated-and-optimized block must pass
/// before it is handed to the backend: exactly one terminal, reciprocal
/// use-lists, no forward-referencing operands, and every live instruction's
/// operand types matching the opcode manifest's declared signature.
///
/// Dead and replaced instructions are skipped for the type check — their
/// operands may reference instructions reordered or folded away by earlier
/// passes in ways that no longer type-check, and that's fine, since they're
/// never emitted.
pub fn verify(block: &Block) -> Result<(), VerificationError> {
    if !block.has_terminal() {
        return Err(VerificationError::MissingTerminal);
    }
    if !block.use_lists_consistent() {
        return Err(VerificationError::InconsistentUseLists);
    }

    for idx in 0..block.len() {
        let id = ValueId(idx as u32);
        let inst = block.inst(id);

        for &operand in &inst.operands {
            if operand.index() >= idx {
                return Err(VerificationError::ForwardReference(id, operand));
            }
        }

        if !inst.is_live() {
            continue;
        }

        let sig = armjit_types::manifest(inst.op);
        for (index, expected) in sig.operands.iter().enumerate() {
            let Some(&operand) = inst.operands.get(index) else { break };
            let actual = block.inst(operand).result;
            if !type_matches(*expected, actual) {
                return Err(VerificationError::OperandTypeMismatch {
                    id,
                    op: inst.op,
                    index,
                    actual,
                    expected: *expected,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use armjit_ir::{Imm, LocationDescriptor, Terminal};
    use armjit_types::{ExecMode, Opcode};

    fn loc() -> LocationDescriptor {
        LocationDescriptor::new(0, ExecMode::A64, 0)
    }

    #[test]
    fn a_well_formed_block_passes() {
        let mut block = Block::new(loc());
        let a = block.push(Opcode::ImmU32, vec![], Imm::U32(1), Type::U32);
        block.push(Opcode::SetRegister, vec![a], Imm::RegRef(0), Type::Void);
        block.set_terminal(Terminal::ReturnToDispatch);

        assert_eq!(verify(&block), Ok(()));
    }

    #[test]
    fn a_block_with_no_terminal_fails() {
        let block = Block::new(loc());
        assert_eq!(verify(&block), Err(VerificationError::MissingTerminal));
    }
}
