use fixedbitset::FixedBitSet;

use crate::compiler::opt::cfg::graph::{BlockId, CFG};

/// Post-order, depth-first iterator, over *reachable* basic blocks in a
/// control-flow graph.
#[derive(Debug)]
pub struct PostOrder {
    post: Vec<BlockId>,
    index: usize,
}

impl PostOrder {
    /// Creates a new `PostOrder` iterator over the blocks reachable from the
    /// entry block.
    #[must_use]
    pub fn new(cfg: &CFG) -> Self {
        let mut post = Vec::with_capacity(cfg.len());

        if !cfg.is_empty() {
            let mut visited = FixedBitSet::with_capacity(cfg.len());
            // Each frame holds a block and the number of successors visited.
            let mut stack = vec![(CFG::ENTRY_ID, 0)];
            visited.insert(CFG::ENTRY_ID);

            while let Some((id, next)) = stack.last_mut() {
                let block = &cfg.blocks[*id];

                if let Some(succ) = block.successors().nth(*next) {
                    *next += 1;

                    if !visited.put(succ) {
                        stack.push((succ, 0));
                    }
                } else {
                    post.push(*id);
                    stack.pop();
                }
            }
        }

        Self { post, index: 0 }
    }
}

impl Iterator for PostOrder {
    type Item = BlockId;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.post.get(self.index)?;
        self.index += 1;
        Some(*result)
    }
}

/// Returns the set of blocks reachable from the entry block.
#[must_use]
pub fn reachable(cfg: &CFG) -> FixedBitSet {
    let mut seen = FixedBitSet::with_capacity(cfg.len());
    seen.extend(cfg.post_order());
    seen
}
