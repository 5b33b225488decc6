//! Unreachable Code Elimination (UCE)
//!
//! Transforms an intermediate representation (_IR_) by removing code that can
//! never be executed based on control flow analysis.

use log::{debug, trace};

use crate::compiler::ir::{CodeList, Instruction, Operand, Toward};
use crate::compiler::opt::CFG;
use crate::compiler::opt::cfg::reachable;

/// Splices every block not reachable from the entry block out of `code`,
/// marking it removed in `cfg`.
///
/// A function whose only `RETURN` was unreachable gets `RETURN #0` appended,
/// outside of every block of `cfg`.
pub fn remove_unreachable(cfg: &mut CFG, code: &mut CodeList) -> bool {
    let reachable = reachable(cfg);
    let mut changed = false;

    for block in &mut cfg.blocks {
        if block.removed || reachable.contains(block.id) {
            continue;
        }

        let ids: Vec<_> = block.instructions(code).collect();

        trace!("removing unreachable block {} ({} instructions)", block.id, ids.len());

        for id in ids {
            code.remove(id, Toward::Next);
        }

        block.removed = true;
        changed = true;
    }

    if changed {
        // Retain only the reachable predecessors.
        for block in &mut cfg.blocks {
            for pred in &mut block.preds {
                if pred.is_some_and(|id| !reachable.contains(id)) {
                    *pred = None;
                }
            }
        }

        ensure_return(code);
    }

    changed
}

/// Appends `RETURN #0` to `code` if it has no `RETURN` left.
fn ensure_return(code: &mut CodeList) {
    if code
        .instructions()
        .any(|inst| matches!(inst, Instruction::Return(_)))
    {
        return;
    }

    debug!("every RETURN was unreachable, appending RETURN #0");

    let tail = code.prev(code.anchor());
    code.insert_after(tail, Instruction::Return(Operand::constant(0)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{Instruction, Operand};

    #[test]
    fn unreachable_blocks_are_spliced_out() {
        let mut code = CodeList::with_body(
            "f",
            [
                Instruction::Goto(1),
                Instruction::Write(Operand::constant(1)),
                Instruction::Label(2),
                Instruction::Write(Operand::constant(2)),
                Instruction::Label(1),
                Instruction::Return(Operand::constant(0)),
                Instruction::Goto(2),
            ],
        );
        let mut cfg = CFG::build(&code);

        assert!(remove_unreachable(&mut cfg, &mut code));

        let dump: Vec<_> = code.instructions().map(ToString::to_string).collect();
        assert_eq!(
            dump,
            ["FUNCTION f :", "GOTO label1", "LABEL label1 :", "RETURN #0"]
        );

        let target = cfg.label_map[&1];
        assert!(cfg.blocks[target].predecessors().all(|id| !cfg.blocks[id].removed));
        assert!(!remove_unreachable(&mut cfg, &mut code));
    }

    #[test]
    fn endless_loop_keeps_a_return() {
        // LABEL 1; WRITE #1; GOTO 1; LABEL 2; RETURN #0
        let mut code = CodeList::with_body(
            "f",
            [
                Instruction::Label(1),
                Instruction::Write(Operand::constant(1)),
                Instruction::Goto(1),
                Instruction::Label(2),
                Instruction::Return(Operand::constant(0)),
            ],
        );
        let mut cfg = CFG::build(&code);

        assert!(remove_unreachable(&mut cfg, &mut code));

        let dump: Vec<_> = code.instructions().map(ToString::to_string).collect();
        assert_eq!(
            dump,
            [
                "FUNCTION f :",
                "LABEL label1 :",
                "WRITE #1",
                "GOTO label1",
                "RETURN #0"
            ]
        );
    }
}
