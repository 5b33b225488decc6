//! Branch and Label Cleanup
//!
//! Transforms an intermediate representation (_IR_) by removing jumps to the
//! immediately following label, merging a conditional jump over an
//! unconditional one into a single inverted conditional jump, and coalescing,
//! threading, or removing labels.

use std::collections::HashSet;

use log::trace;

use crate::compiler::ir::{CodeList, Instruction, Toward};

/// Removes every `GOTO` or `IF` whose target label immediately follows it.
pub fn remove_useless_jumps(code: &mut CodeList) -> bool {
    let mut changed = false;
    let mut cursor = code.cursor();

    while let Some(id) = cursor.advance(code) {
        let next = code.get(code.next(id));

        if let Some(target) = code.get(id).target()
            && *next == Instruction::Label(target)
        {
            trace!("removing jump to the following label{target}");
            cursor.remove(code);
            changed = true;
        }
    }

    changed
}

/// Rewrites `IF c GOTO A; GOTO B; LABEL A` into `IF !c GOTO B; LABEL A`.
pub fn merge_cond_goto(code: &mut CodeList) -> bool {
    let mut changed = false;
    let mut cursor = code.cursor();

    while let Some(id) = cursor.advance(code) {
        let goto = code.next(id);
        let label = code.next(goto);

        let (&Instruction::Goto(other), &Instruction::Label(after)) =
            (code.get(goto), code.get(label))
        else {
            continue;
        };

        if let Instruction::Cond { op, target, .. } = code.get_mut(id)
            && *target == after
        {
            *op = op.inverse();
            *target = other;

            code.remove(goto, Toward::Next);
            changed = true;
        }
    }

    changed
}

/// Redirects every jump to `from` so it targets `to`, returning `true` if any
/// jump was changed.
fn retarget(code: &mut CodeList, from: u32, to: u32) -> bool {
    let ids: Vec<_> = code.ids().collect();
    let mut changed = false;

    for id in ids {
        if let Some(target) = code.get_mut(id).target_mut()
            && *target == from
        {
            *target = to;
            changed = true;
        }
    }

    changed
}

/// Coalesces consecutive labels, threads jumps through a label that only
/// jumps elsewhere, and removes labels nothing jumps to.
pub fn clean_labels(code: &mut CodeList) -> bool {
    let mut changed = false;
    let mut cursor = code.cursor();

    while let Some(id) = cursor.advance(code) {
        let Instruction::Label(this) = *code.get(id) else {
            continue;
        };

        let next = code.next(id);

        match *code.get(next) {
            // LABEL A; LABEL B  ==>  LABEL A
            Instruction::Label(other) => {
                code.remove(next, Toward::Next);
                retarget(code, other, this);
                changed = true;
            }
            // LABEL A; GOTO B  ==>  jumps to A go to B
            Instruction::Goto(other) if other != this => {
                changed |= retarget(code, this, other);
            }
            _ => {}
        }
    }

    let used: HashSet<u32> = code.instructions().filter_map(Instruction::target).collect();

    let mut cursor = code.cursor();

    while let Some(id) = cursor.advance(code) {
        if let Instruction::Label(label) = *code.get(id)
            && !used.contains(&label)
        {
            trace!("removing unreferenced label{label}");
            cursor.remove(code);
            changed = true;
        }
    }

    changed
}

/// Runs [`merge_cond_goto`] and [`clean_labels`] until neither changes
/// anything (or `max_rounds` is reached), returning `true` if the list
/// changed.
pub fn cleanup(code: &mut CodeList, max_rounds: usize) -> bool {
    let mut changed = false;

    for _ in 0..max_rounds {
        let merged = merge_cond_goto(code);
        let cleaned = clean_labels(code);

        if !merged && !cleaned {
            break;
        }

        changed = true;
    }

    changed
}
