//! Compilation Session
//!
//! Owns the state shared by translation and optimization of one compilation
//! unit: the label, variable and temporary counters and the array-shape arena.
//! Indices are handed out monotonically and never reused within a session.

use crate::compiler::ir::operand::{Operand, SlotSpace};
use crate::compiler::ir::shape::ShapeArena;

#[derive(Debug, Default)]
pub struct Session {
    labels: u32,
    vars: u32,
    temps: u32,
    /// Dimension rings of every declared array.
    pub shapes: ShapeArena,
}

impl Session {
    /// Returns a new session with all counters at zero.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh label identifier.
    #[inline]
    pub const fn new_label(&mut self) -> u32 {
        self.labels += 1;
        self.labels
    }

    /// Returns a fresh variable operand.
    #[inline]
    pub fn new_var(&mut self) -> Operand {
        self.vars += 1;
        Operand::var(self.vars)
    }

    /// Returns a fresh temporary operand.
    #[inline]
    pub fn new_temp(&mut self) -> Operand {
        self.temps += 1;
        Operand::temp(self.temps)
    }

    /// Returns the current variable/temporary index space.
    #[inline]
    #[must_use]
    pub const fn slots(&self) -> SlotSpace {
        SlotSpace {
            vars: self.vars,
            temps: self.temps,
        }
    }

    /// Returns the number of labels handed out so far.
    #[inline]
    #[must_use]
    pub const fn label_count(&self) -> u32 {
        self.labels
    }
}
