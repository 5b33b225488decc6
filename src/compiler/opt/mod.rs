//! Compiler Optimization
//!
//! Compiler's optimization logic over the intermediate representation (_IR_):
//! local peephole passes, control-flow and liveness analyses, and function
//! inlining, which aim to reduce redundancy without changing observable
//! behavior.

pub mod analysis;
pub mod cfg;
pub mod passes;

pub use cfg::{Block, CFG};
pub use passes::optimize_ir;

/// Optimization options: which passes run and the limits they respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opts {
    /// Removes useless jumps and merges conditional jumps over gotos.
    pub branch: bool,
    /// Folds constants and simplifies adjacent copies.
    pub fold: bool,
    /// Propagates copies forward within straight-line runs.
    pub propagate: bool,
    /// Removes assignments whose results are never read.
    pub dce: bool,
    /// Runs the control-flow graph round (unreachable code and liveness-based
    /// dead code).
    pub global: bool,
    /// Inlines small non-recursive callees.
    pub inline: bool,
    /// Coalesces, threads and removes labels.
    pub cleanup: bool,
    /// Functions with more blocks than this skip liveness-based dead code
    /// elimination.
    pub block_ceiling: usize,
    /// Maximum instruction count (excluding `PARAM`) of an inlinable callee.
    pub inline_max_lines: usize,
    /// Maximum label count of an inlinable callee.
    pub inline_max_labels: usize,
    /// Upper bound on optimization rounds before giving up on a fixed point.
    pub max_rounds: usize,
}

impl Opts {
    /// Returns options with every pass disabled.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            branch: false,
            fold: false,
            propagate: false,
            dce: false,
            global: false,
            inline: false,
            cleanup: false,
            ..Self::DEFAULT
        }
    }

    /// Returns `true` if at least one pass is enabled.
    #[inline]
    #[must_use]
    pub const fn any_passes_enabled(&self) -> bool {
        self.branch
            || self.fold
            || self.propagate
            || self.dce
            || self.global
            || self.inline
            || self.cleanup
    }

    const DEFAULT: Self = Self {
        branch: true,
        fold: true,
        propagate: true,
        dce: true,
        global: true,
        inline: true,
        cleanup: true,
        block_ceiling: 250,
        inline_max_lines: 150,
        inline_max_labels: 8,
        max_rounds: 10_000,
    };
}

impl Default for Opts {
    /// Every pass enabled, with the standard limits.
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opts_toggles() {
        assert!(Opts::default().any_passes_enabled());
        assert!(!Opts::none().any_passes_enabled());

        let only_fold = Opts {
            fold: true,
            ..Opts::none()
        };
        assert!(only_fold.any_passes_enabled());
        assert_eq!(only_fold.block_ceiling, 250);
    }
}
