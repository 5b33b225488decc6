//! Data Flow Analysis
//!
//! Per-block def/use sets and backward liveness over a control-flow graph
//! (_CFG_), and per-function def-use chains over the instruction list.

use fixedbitset::FixedBitSet;
use log::trace;

use crate::compiler::ir::{CodeId, CodeList, Instruction, Operand, SlotSpace};
use crate::compiler::opt::CFG;

/// Slot read by `inst` as far as block summaries are concerned.
///
/// `PARAM` and `READ` bind their operand rather than read it.
fn block_uses(inst: &Instruction) -> impl Iterator<Item = &Operand> {
    let binds = matches!(inst, Instruction::Param(_) | Instruction::Read(_));
    inst.uses().filter(move |_| !binds)
}

/// Slot written by `inst` as far as block summaries are concerned.
fn block_def(inst: &Instruction) -> Option<&Operand> {
    match inst {
        Instruction::Read(opr) | Instruction::Dec { var: opr, .. } => Some(opr),
        _ => inst.def().filter(|opr| opr.is_slot()),
    }
}

/// Fills in the `defs` and `uses` sets of every block.
///
/// A slot is classified by its first appearance in the block: read first
/// means used, written first means defined. Removed blocks get empty sets.
pub fn block_def_use(cfg: &mut CFG, code: &CodeList, slots: SlotSpace) {
    let len = slots.len();

    for block in &mut cfg.blocks {
        let mut defs = FixedBitSet::with_capacity(len);
        let mut uses = FixedBitSet::with_capacity(len);

        let ids: Vec<_> = if block.removed {
            vec![]
        } else {
            block.instructions(code).collect()
        };

        for id in ids {
            let inst = code.get(id);

            for opr in block_uses(inst) {
                let idx = slots.slot(opr);
                if !defs.contains(idx) {
                    uses.insert(idx);
                }
            }

            if let Some(opr) = block_def(inst) {
                let idx = slots.slot(opr);
                if !uses.contains(idx) {
                    defs.insert(idx);
                }
            }
        }

        block.defs = defs;
        block.uses = uses;
        block.live_in = FixedBitSet::with_capacity(len);
    }
}

/// Performs one pass of the liveness propagation over every block, returning
/// `true` if any live-in set grew.
///
/// A slot becomes live-in to a block when the block neither defines nor uses
/// it and some successor uses it or has it live-in.
pub fn liveness_sweep(cfg: &mut CFG) -> bool {
    let mut changed = false;

    for id in 0..cfg.blocks.len() {
        if cfg.blocks[id].removed {
            continue;
        }

        let mut incoming = cfg.blocks[id].live_out(cfg);

        let block = &mut cfg.blocks[id];
        incoming.difference_with(&block.defs);
        incoming.difference_with(&block.uses);

        if !incoming.is_subset(&block.live_in) {
            block.live_in.union_with(&incoming);
            changed = true;
        }
    }

    changed
}

/// Computes block summaries and iterates the liveness propagation to a fixed
/// point, returning the number of sweeps performed.
pub fn liveness(cfg: &mut CFG, code: &CodeList, slots: SlotSpace) -> usize {
    block_def_use(cfg, code, slots);

    let mut sweeps = 1;
    while liveness_sweep(cfg) {
        sweeps += 1;
    }

    trace!("liveness converged after {sweeps} sweeps over {} blocks", cfg.len());

    sweeps
}

/// For each slot, every instruction that defines it and every instruction that
/// reads it.
///
/// Built from scratch per function for one optimization round; handles are
/// only meaningful until the list is next modified.
#[derive(Debug)]
pub struct DefUseChains {
    defs: Vec<Vec<CodeId>>,
    uses: Vec<Vec<CodeId>>,
}

impl DefUseChains {
    /// Scans the whole of `code` once, recording defining and using sites.
    ///
    /// NOTE: O(n) time complexity.
    #[must_use]
    pub fn build(code: &CodeList, slots: SlotSpace) -> Self {
        let mut chains = Self {
            defs: vec![vec![]; slots.len()],
            uses: vec![vec![]; slots.len()],
        };

        for id in code.ids() {
            let inst = code.get(id);

            if let Some(opr) = inst.def().filter(|opr| opr.is_slot()) {
                chains.defs[slots.slot(opr)].push(id);
            }

            for opr in inst.uses() {
                chains.uses[slots.slot(opr)].push(id);
            }
        }

        chains
    }

    /// Returns the instructions defining slot `idx`.
    #[inline]
    #[must_use]
    pub fn defs(&self, idx: usize) -> &[CodeId] {
        &self.defs[idx]
    }

    /// Returns the instructions reading slot `idx`.
    #[cfg(test)]
    pub fn uses(&self, idx: usize) -> &[CodeId] {
        &self.uses[idx]
    }

    /// Returns the slots that are defined but never read.
    pub fn unused(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.defs.len()).filter(|&idx| !self.defs[idx].is_empty() && self.uses[idx].is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{AssignOp, RelOp};

    const SLOTS: SlotSpace = SlotSpace { vars: 4, temps: 4 };

    fn bits(set: &FixedBitSet) -> Vec<usize> {
        set.ones().collect()
    }

    /// `v1` is read in the loop body, `v2` is only defined before the loop.
    fn loop_code() -> CodeList {
        // 0: FUNCTION; READ v1; v2 := #0
        // 1: LABEL label1; IF v1 <= #0 GOTO label2
        // 2: WRITE v1; v1 := v1 - #1; GOTO label1
        // 3: LABEL label2; RETURN v2
        CodeList::with_body(
            "f",
            [
                Instruction::Read(Operand::var(1)),
                Instruction::copy(Operand::var(2), Operand::constant(0)),
                Instruction::Label(1),
                Instruction::Cond {
                    op: RelOp::Le,
                    lhs: Operand::var(1),
                    rhs: Operand::constant(0),
                    target: 2,
                },
                Instruction::Write(Operand::var(1)),
                Instruction::binary(
                    AssignOp::Sub,
                    Operand::var(1),
                    Operand::var(1),
                    Operand::constant(1),
                ),
                Instruction::Goto(1),
                Instruction::Label(2),
                Instruction::Return(Operand::var(2)),
            ],
        )
    }

    #[test]
    fn block_def_use_first_classification_wins() {
        let code = CodeList::with_body(
            "f",
            [
                Instruction::binary(
                    AssignOp::Add,
                    Operand::var(1),
                    Operand::var(1),
                    Operand::constant(1),
                ),
                Instruction::copy(Operand::temp(1), Operand::constant(2)),
                Instruction::Write(Operand::temp(1)),
                Instruction::Dec {
                    var: Operand::var(3),
                    size: 8,
                },
                Instruction::Return(Operand::constant(0)),
            ],
        );
        let mut cfg = CFG::build(&code);
        block_def_use(&mut cfg, &code, SLOTS);

        let block = &cfg.blocks[0];
        assert_eq!(bits(&block.uses), [1]);
        assert_eq!(bits(&block.defs), [3, SLOTS.slot(&Operand::temp(1))]);
    }

    #[test]
    fn liveness_reaches_loop_header() {
        let code = loop_code();
        let mut cfg = CFG::build(&code);
        let sweeps = liveness(&mut cfg, &code, SLOTS);

        assert!(sweeps >= 2);
        // v2 is neither used nor defined inside the loop, yet needed after it.
        assert_eq!(bits(&cfg.blocks[1].uses), [1]);
        assert_eq!(bits(&cfg.blocks[1].live_in), [2]);
        assert_eq!(bits(&cfg.blocks[2].live_in), [2]);
        assert!(cfg.blocks[0].live_in.is_clear());
        assert_eq!(bits(&cfg.blocks[0].live_out(&cfg)), [1, 2]);
    }

    #[test]
    fn liveness_sets_only_grow() {
        let code = loop_code();
        let mut cfg = CFG::build(&code);
        block_def_use(&mut cfg, &code, SLOTS);

        let mut previous: Vec<_> = cfg.blocks.iter().map(|b| b.live_in.clone()).collect();
        while liveness_sweep(&mut cfg) {
            for (block, before) in cfg.blocks.iter().zip(&previous) {
                assert!(before.is_subset(&block.live_in));
            }
            previous = cfg.blocks.iter().map(|b| b.live_in.clone()).collect();
        }

        assert!(!liveness_sweep(&mut cfg));
    }

    #[test]
    fn def_use_chains_find_unused_slots() {
        let code = CodeList::with_body(
            "f",
            [
                Instruction::copy(Operand::temp(1), Operand::constant(1)),
                Instruction::copy(Operand::var(1), Operand::temp(1)),
                Instruction::copy(Operand::temp(2), Operand::var(1)),
                Instruction::Call {
                    dst: Operand::temp(3),
                    func: "g".into(),
                },
                Instruction::Return(Operand::var(1)),
            ],
        );
        let chains = DefUseChains::build(&code, SLOTS);

        let t = |n| SLOTS.slot(&Operand::temp(n));
        assert_eq!(chains.defs(1).len(), 1);
        assert_eq!(chains.uses(1).len(), 2);
        assert_eq!(chains.uses(t(1)).len(), 1);

        let unused: Vec<_> = chains.unused().collect();
        assert_eq!(unused, [t(2), t(3)]);
    }
}
