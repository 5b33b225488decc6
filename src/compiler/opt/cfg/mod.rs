//! Control-Flow Graph
//!
//! Control-flow graph of one function in the intermediate representation
//! (_IR_): basic blocks over the function's instruction list and the edges
//! between them, rebuilt for every global optimization round.

pub mod graph;
pub mod iter;

pub use graph::{Block, BlockBoundary, BlockId, CFG, CFGInstruction};
pub use iter::{PostOrder, reachable};
