use std::collections::HashMap;

use fixedbitset::FixedBitSet;

use crate::compiler::ir::{CodeId, CodeList, Instruction};
use crate::compiler::opt::cfg::iter::PostOrder;

/// Types of instructions that determine a basic block boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockBoundary {
    /// Starts the first block of the function.
    Function,
    /// Starts a new block that may be the target of jumps.
    Label(u32),
    /// Ends the block and jumps unconditionally to a target.
    Jump(u32),
    /// Ends the block and conditionally jumps to a target.
    CondJump(u32),
    /// Ends the block and returns from the function.
    Return,
    /// Does not affect control flow or block boundaries.
    Other,
}

/// Trait for instructions that expose control-flow behavior, used in a
/// control-flow graph.
pub trait CFGInstruction {
    /// Returns the block boundary classification of this instruction.
    #[must_use]
    fn block_boundary(&self) -> BlockBoundary;
}

impl CFGInstruction for Instruction {
    #[inline]
    fn block_boundary(&self) -> BlockBoundary {
        match self {
            Instruction::Function(_) => BlockBoundary::Function,
            Instruction::Label(id) => BlockBoundary::Label(*id),
            Instruction::Goto(target) => BlockBoundary::Jump(*target),
            Instruction::Cond { target, .. } => BlockBoundary::CondJump(*target),
            Instruction::Return(_) => BlockBoundary::Return,
            _ => BlockBoundary::Other,
        }
    }
}

/// Index of a block within its control-flow graph.
pub type BlockId = usize;

/// Maximal straight-line run of instructions, from `first` to `last`
/// inclusive.
#[derive(Debug)]
pub struct Block {
    pub id: BlockId,
    pub first: CodeId,
    pub last: CodeId,
    /// Next block in list order, reached when control falls through.
    pub fall: Option<BlockId>,
    /// Block starting at the label targeted by the final jump.
    pub branch: Option<BlockId>,
    /// Blocks that can execute before (first two recorded).
    pub preds: [Option<BlockId>; 2],
    /// Set when more than two blocks can execute before this one.
    pub extra_preds: bool,
    /// Slots written in the block before any read.
    pub defs: FixedBitSet,
    /// Slots read in the block before any write (upward-exposed uses).
    pub uses: FixedBitSet,
    /// Slots neither defined nor used locally that are live on entry.
    pub live_in: FixedBitSet,
    /// Set once the block's instructions were spliced out of the list.
    pub removed: bool,
}

impl Block {
    fn new(id: BlockId, first: CodeId, last: CodeId) -> Self {
        Self {
            id,
            first,
            last,
            fall: None,
            branch: None,
            preds: [None; 2],
            extra_preds: false,
            defs: FixedBitSet::new(),
            uses: FixedBitSet::new(),
            live_in: FixedBitSet::new(),
            removed: false,
        }
    }

    /// Returns the blocks that can execute after this one.
    #[inline]
    pub fn successors(&self) -> impl Iterator<Item = BlockId> {
        self.fall.into_iter().chain(self.branch)
    }

    /// Returns the recorded predecessors.
    #[inline]
    pub fn predecessors(&self) -> impl Iterator<Item = BlockId> {
        self.preds.into_iter().flatten()
    }

    /// Returns the set of slots live on exit: everything used or live on
    /// entry to a successor.
    #[must_use]
    pub fn live_out(&self, cfg: &CFG) -> FixedBitSet {
        let mut live = FixedBitSet::with_capacity(self.defs.len());

        for succ in self.successors() {
            let succ = &cfg.blocks[succ];
            live.union_with(&succ.uses);
            live.union_with(&succ.live_in);
        }

        live
    }

    /// Returns the handles of the block's instructions, in order.
    pub fn instructions<'c>(&self, code: &'c CodeList) -> impl Iterator<Item = CodeId> + use<'c> {
        let last = self.last;
        let mut at = Some(self.first);

        std::iter::from_fn(move || {
            let current = at?;
            at = (current != last).then(|| code.next(current));
            Some(current)
        })
    }
}

/// Control-Flow Graph (_CFG_) of one function.
///
/// Built from scratch for each global optimization round and discarded
/// afterward; blocks refer into the function's [`CodeList`] by handle.
#[derive(Debug)]
pub struct CFG {
    pub blocks: Vec<Block>,
    /// Maps each label to the block it starts.
    pub label_map: HashMap<u32, BlockId>,
}

impl CFG {
    /// Entry block ID in any control-flow graph (starts at `FUNCTION`).
    pub const ENTRY_ID: BlockId = 0;

    /// Partitions `code` into basic blocks and links them.
    ///
    /// # Panics
    ///
    /// Panics if a jump targets a label that does not exist in `code`.
    #[must_use]
    pub fn build(code: &CodeList) -> Self {
        let mut cfg = Self {
            blocks: vec![],
            label_map: HashMap::new(),
        };

        cfg.partition(code);
        cfg.build_control_flow(code);
        cfg
    }

    /// Returns the number of blocks.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns a post-order, depth-first iterator over the blocks reachable
    /// from the entry block.
    #[inline]
    #[must_use]
    pub fn post_order(&self) -> PostOrder {
        PostOrder::new(self)
    }

    /// Splits the instructions into blocks at every leader: the function head,
    /// every label, and every instruction that follows a jump or return.
    fn partition(&mut self, code: &CodeList) {
        // Start of the block currently being collected.
        let mut start: Option<CodeId> = None;
        let mut prev: Option<CodeId> = None;

        for id in code.ids() {
            let boundary = code.get(id).block_boundary();

            match boundary {
                BlockBoundary::Function | BlockBoundary::Label(_) => {
                    if let (Some(first), Some(last)) = (start, prev) {
                        self.push_block(first, last);
                    }

                    start = Some(id);

                    // The label starts the block that will be pushed next.
                    if let BlockBoundary::Label(label) = boundary {
                        self.label_map.insert(label, self.blocks.len());
                    }
                }
                _ => {
                    start.get_or_insert(id);
                }
            }

            if let BlockBoundary::Jump(_) | BlockBoundary::CondJump(_) | BlockBoundary::Return =
                boundary
                && let Some(first) = start.take()
            {
                self.push_block(first, id);
            }

            prev = Some(id);
        }

        if let (Some(first), Some(last)) = (start, prev) {
            self.push_block(first, last);
        }
    }

    fn push_block(&mut self, first: CodeId, last: CodeId) {
        let id = self.blocks.len();
        self.blocks.push(Block::new(id, first, last));
    }

    /// Links every block to its fall-through and branch successors, then
    /// back-fills predecessor slots.
    fn build_control_flow(&mut self, code: &CodeList) {
        let count = self.blocks.len();

        for id in 0..count {
            let next = (id + 1 < count).then_some(id + 1);
            let last = code.get(self.blocks[id].last).block_boundary();

            let (fall, branch) = match last {
                BlockBoundary::Jump(label) => (None, Some(self.block_of(label))),
                BlockBoundary::CondJump(label) => (next, Some(self.block_of(label))),
                BlockBoundary::Return => (None, None),
                _ => (next, None),
            };

            let block = &mut self.blocks[id];
            block.fall = fall;
            block.branch = branch;
        }

        for from in 0..count {
            let successors: Vec<_> = self.blocks[from].successors().collect();

            for to in successors {
                self.add_pred(to, from);
            }
        }
    }

    fn block_of(&self, label: u32) -> BlockId {
        *self
            .label_map
            .get(&label)
            .unwrap_or_else(|| panic!("jump target label{label} should exist in the function"))
    }

    /// Records `from` as a predecessor of `to`.
    fn add_pred(&mut self, to: BlockId, from: BlockId) {
        let block = &mut self.blocks[to];

        if block.predecessors().any(|id| id == from) {
            return;
        }

        match block.preds.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => *slot = Some(from),
            None => block.extra_preds = true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{Operand, RelOp};

    fn list(codes: Vec<Instruction>) -> CodeList {
        CodeList::with_body("f", codes)
    }

    fn cond(target: u32) -> Instruction {
        Instruction::Cond {
            op: RelOp::Lt,
            lhs: Operand::var(1),
            rhs: Operand::constant(3),
            target,
        }
    }

    #[test]
    fn cfg_straight_line_is_one_block() {
        let code = list(vec![
            Instruction::copy(Operand::var(1), Operand::constant(1)),
            Instruction::Return(Operand::var(1)),
        ]);
        let cfg = CFG::build(&code);

        assert_eq!(cfg.len(), 1);
        assert_eq!(cfg.blocks[0].first, code.anchor());
        assert_eq!(cfg.blocks[0].instructions(&code).count(), 3);
        assert_eq!(cfg.blocks[0].successors().count(), 0);
    }

    #[test]
    fn cfg_if_else_edges() {
        // 0: FUNCTION; IF v1 < #3 GOTO label1
        // 1: GOTO label2
        // 2: LABEL label1; WRITE #1; GOTO label3
        // 3: LABEL label2; WRITE #2
        // 4: LABEL label3; RETURN #0
        let code = list(vec![
            cond(1),
            Instruction::Goto(2),
            Instruction::Label(1),
            Instruction::Write(Operand::constant(1)),
            Instruction::Goto(3),
            Instruction::Label(2),
            Instruction::Write(Operand::constant(2)),
            Instruction::Label(3),
            Instruction::Return(Operand::constant(0)),
        ]);
        let cfg = CFG::build(&code);

        assert_eq!(cfg.len(), 5);
        assert_eq!((cfg.blocks[0].fall, cfg.blocks[0].branch), (Some(1), Some(2)));
        assert_eq!((cfg.blocks[1].fall, cfg.blocks[1].branch), (None, Some(3)));
        assert_eq!((cfg.blocks[2].fall, cfg.blocks[2].branch), (None, Some(4)));
        assert_eq!((cfg.blocks[3].fall, cfg.blocks[3].branch), (Some(4), None));
        assert_eq!((cfg.blocks[4].fall, cfg.blocks[4].branch), (None, None));

        let preds: Vec<_> = cfg.blocks[4].predecessors().collect();
        assert_eq!(preds, [2, 3]);

        for block in &cfg.blocks {
            assert!(block.predecessors().count() <= 2);
            assert!(block.successors().count() <= 2);
            assert!(!block.extra_preds);
        }
    }

    #[test]
    fn cfg_no_fall_through_after_return() {
        let code = list(vec![
            Instruction::Return(Operand::constant(0)),
            Instruction::Write(Operand::constant(1)),
            Instruction::Return(Operand::constant(1)),
        ]);
        let cfg = CFG::build(&code);

        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg.blocks[0].successors().count(), 0);
        assert_eq!(cfg.blocks[1].predecessors().count(), 0);
    }

    #[test]
    fn cfg_third_predecessor_is_flagged() {
        let code = list(vec![
            cond(1),
            cond(1),
            cond(1),
            Instruction::Label(1),
            Instruction::Return(Operand::constant(0)),
        ]);
        let cfg = CFG::build(&code);

        let target = cfg.label_map[&1];
        assert_eq!(cfg.blocks[target].predecessors().count(), 2);
        assert!(cfg.blocks[target].extra_preds);
    }

    #[test]
    #[should_panic(expected = "should exist in the function")]
    fn cfg_missing_label_panics() {
        let code = list(vec![Instruction::Goto(9)]);
        let _ = CFG::build(&code);
    }
}
