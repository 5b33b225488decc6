//! Optimization Passes
//!
//! Passes that transform an intermediate representation (_IR_) in place, each
//! reporting whether it changed anything.

pub mod branch;
pub mod dce;
pub mod fold;
pub mod inline;
pub mod optimize;
pub mod propagate;
pub mod uce;

pub use optimize::optimize_ir;
