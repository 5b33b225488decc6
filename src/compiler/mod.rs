//! Middle-end pipeline: syntax tree in, optimized three-address code out.

pub mod interp;
pub mod ir;
pub mod opt;
pub mod session;
pub mod tree;
