//! Dead Code Elimination (DCE)
//!
//! Transforms an intermediate representation (_IR_) by removing assignments to
//! variables and temporaries whose values are never read: a backward scan per
//! function, a scan over def-use chains, and a backward scan per basic block
//! seeded with liveness.

use fixedbitset::FixedBitSet;
use log::trace;

use crate::compiler::ir::{AssignOp, CodeList, Instruction, Operand, SlotSpace, Toward};
use crate::compiler::opt::CFG;
use crate::compiler::opt::analysis::DefUseChains;

/// Returns the destination of an assignment that can be dropped when its
/// result is dead.
///
/// Loads and stores go through memory and are never candidates.
fn removable_dst(inst: &Instruction) -> Option<&Operand> {
    match inst {
        Instruction::Assign { op, dst, .. }
            if dst.is_slot()
                && !matches!(
                    op,
                    AssignOp::Load | AssignOp::Store | AssignOp::StoreIndirect
                ) =>
        {
            Some(dst)
        }
        _ => None,
    }
}

/// Steps `live` backward over `inst`: its definition dies, its uses become
/// live.
fn step_back(live: &mut FixedBitSet, inst: &Instruction, slots: SlotSpace) {
    if let Some(dst) = inst.def().filter(|dst| dst.is_slot()) {
        live.set(slots.slot(dst), false);
    }

    for opr in inst.uses() {
        live.insert(slots.slot(opr));
    }
}

/// Removes dead assignments in one backward scan over the whole function.
///
/// Labels, jumps, and returns are boundaries past which nothing is known, so
/// every slot is considered live there. The scan stops at the `PARAM`
/// prologue.
pub fn remove_dead_local(code: &mut CodeList, slots: SlotSpace) -> bool {
    let mut live = FixedBitSet::with_capacity(slots.len());
    live.insert_range(..);

    let mut changed = false;
    let mut cursor = code.cursor_back();

    while let Some(id) = cursor.advance(code) {
        let inst = code.get(id);

        match inst {
            Instruction::Param(_) => break,
            Instruction::Label(_)
            | Instruction::Goto(_)
            | Instruction::Cond { .. }
            | Instruction::Return(_) => {
                live.insert_range(..);
                continue;
            }
            _ => {}
        }

        if let Some(dst) = removable_dst(inst)
            && !live.contains(slots.slot(dst))
        {
            trace!("removing dead assignment '{inst}'");
            cursor.remove(code);
            changed = true;
            continue;
        }

        step_back(&mut live, inst, slots);
    }

    changed
}

/// Removes every definition of a slot that is never read, except calls,
/// which are kept for their side effects.
pub fn remove_unused_defs(code: &mut CodeList, slots: SlotSpace) -> bool {
    let chains = DefUseChains::build(code, slots);
    let mut changed = false;

    for idx in chains.unused() {
        for &id in chains.defs(idx) {
            if matches!(code.get(id), Instruction::Call { .. }) {
                continue;
            }

            trace!("removing unused definition '{}'", code.get(id));
            code.remove(id, Toward::Next);
            changed = true;
        }
    }

    changed
}

/// Removes dead assignments block by block, starting each backward scan from
/// the slots live on exit from the block.
///
/// Requires liveness to have been computed on `cfg`.
pub fn remove_dead_global(cfg: &CFG, code: &mut CodeList, slots: SlotSpace) -> bool {
    let mut changed = false;

    for block in cfg.blocks.iter().filter(|block| !block.removed) {
        let mut live = block.live_out(cfg);
        live.grow(slots.len());

        let ids: Vec<_> = block.instructions(code).collect();

        for id in ids.into_iter().rev() {
            let inst = code.get(id);

            match inst {
                Instruction::Function(_) | Instruction::Label(_) | Instruction::Param(_) => break,
                Instruction::Goto(_) => continue,
                _ => {}
            }

            if let Some(dst) = removable_dst(inst)
                && !live.contains(slots.slot(dst))
            {
                trace!("removing dead assignment '{inst}' in block {}", block.id);
                code.remove(id, Toward::Next);
                changed = true;
                continue;
            }

            step_back(&mut live, inst, slots);
        }
    }

    changed
}
