use armjit_ir::{Block, LocationDescriptor, Terminal};

/// Coalesces a run of consecutive single-instruction `Interpret`-terminated
/// blocks into one `InterpretMany`, so the dispatcher doesn't round-trip
/// through block lookup once per guest instruction in an undecodable run
/// (e.g. an unsupported opcode repeated in a tight loop). Two blocks are
/// mergeable when the second's `start_location` is exactly where the
/// first's `Interpret` terminal says execution resumes.
///
/// Only ever called on blocks freshly produced by a single translation
/// call, before any other pass rewrites their terminals; it does not try
/// to merge across blocks already in the cache.
pub fn merge_interpret_blocks(blocks: Vec<Block>) -> Vec<Block> {
    let mut merged: Vec<Block> = Vec::with_capacity(blocks.len());

    for block in blocks {
        if let Some(last) = merged.last_mut() {
            if let Some(start) = interpret_run_start(last, &block) {
                let count = match last.terminal() {
                    Some(Terminal::InterpretMany { count, .. }) => *count + 1,
                    Some(Terminal::Interpret(_)) => 2,
                    _ => unreachable!(),
                };
                last.add_cycles(block.cycle_count());
                last.set_end_location(block.end_location());
                for range in &block.addr_ranges {
                    last.record_addr_range(range.start, range.end);
                }
                overwrite_terminal(last, Terminal::InterpretMany { start, count });
                continue;
            }
        }
        merged.push(block);
    }

    merged
}

fn interpret_run_start(last: &Block, next: &Block) -> Option<LocationDescriptor> {
    match last.terminal() {
        Some(Terminal::Interpret(loc)) if *loc == next.start_location => Some(*loc),
        Some(Terminal::InterpretMany { start, .. }) if last.end_location() == next.start_location => Some(*start),
        _ => None,
    }
}

fn overwrite_terminal(block: &mut Block, terminal: Terminal) {
    block.replace_terminal(terminal);
}

#[cfg(test)]
mod tests {
    use super::*;
    use armjit_types::ExecMode;

    fn loc(pc: u64) -> LocationDescriptor {
        LocationDescriptor::new(pc, ExecMode::A64, 0)
    }

    fn interpret_block(pc: u64, next_pc: u64) -> Block {
        let mut block = Block::new(loc(pc));
        block.add_cycles(1);
        block.set_end_location(loc(next_pc));
        block.set_terminal(Terminal::Interpret(loc(next_pc)));
        block
    }

    #[test]
    fn merges_a_run_of_three_interpret_blocks() {
        let blocks = vec![interpret_block(0, 4), interpret_block(4, 8), interpret_block(8, 12)];

        let merged = merge_interpret_blocks(blocks);

        assert_eq!(merged.len(), 1);
        match merged[0].terminal() {
            Some(Terminal::InterpretMany { start, count }) => {
                assert_eq!(*start, loc(0));
                assert_eq!(*count, 3);
            }
            other => panic!("expected InterpretMany, got {:?}", other),
        }
        assert_eq!(merged[0].cycle_count(), 3);
        assert_eq!(merged[0].end_location(), loc(12));
    }

    #[test]
    fn does_not_merge_non_contiguous_blocks() {
        let blocks = vec![interpret_block(0, 4), interpret_block(100, 104)];

        let merged = merge_interpret_blocks(blocks);

        assert_eq!(merged.len(), 2);
    }
}
