//! Optimization Pipeline
//!
//! Executes the optimization passes on an intermediate representation (_IR_)
//! based on user-specified options: local rounds to a fixed point, a single
//! inlining and global round once local rounds stop making progress, then
//! label cleanup and a final local fixed point.

use log::{debug, warn};

use crate::compiler::ir::{CodeList, Program, SlotSpace};
use crate::compiler::opt::analysis::liveness;
use crate::compiler::opt::passes::{branch, dce, fold, inline, propagate, uce};
use crate::compiler::opt::{CFG, Opts};
use crate::compiler::session::Session;

/// Runs the optimization passes enabled by `opts` over every function of
/// `program`.
pub fn optimize_ir(program: &mut Program, session: &mut Session, opts: &Opts) {
    if !opts.any_passes_enabled() {
        return;
    }

    let mut expanded = false;
    let mut rounds = 0;

    loop {
        let mut changed = local_round(program, session.slots(), opts);

        if !changed && !expanded {
            expanded = true;

            if opts.inline && inline::inline_calls(program, session, opts) {
                changed = true;
            }

            if opts.global && global_round(program, session.slots(), opts) {
                changed = true;
            }
        }

        if !changed {
            break;
        }

        rounds += 1;
        if rounds >= opts.max_rounds {
            warn!("optimization did not converge after {rounds} rounds");
            break;
        }
    }

    debug!("main optimization loop finished after {rounds} rounds");

    if opts.cleanup {
        for func in program.functions_mut() {
            branch::cleanup(&mut func.code, opts.max_rounds);
        }
    }

    let slots = session.slots();
    for round in 0..opts.max_rounds {
        if !local_round(program, slots, opts) {
            debug!("final local rounds finished after {round} rounds");
            return;
        }
    }

    warn!(
        "final local rounds did not converge after {} rounds",
        opts.max_rounds
    );
}

/// Runs one round of the local passes over every function.
fn local_round(program: &mut Program, slots: SlotSpace, opts: &Opts) -> bool {
    let mut changed = false;

    for func in program.functions_mut() {
        changed |= local_passes(&mut func.code, slots, opts);
    }

    changed
}

fn local_passes(code: &mut CodeList, slots: SlotSpace, opts: &Opts) -> bool {
    let mut changed = false;

    if opts.branch {
        changed |= branch::remove_useless_jumps(code);
    }

    if opts.fold {
        changed |= fold::fold_adjacent(code);
    }

    if opts.propagate {
        changed |= propagate::propagate(code);
    }

    if opts.dce {
        changed |= dce::remove_dead_local(code, slots);
        changed |= dce::remove_unused_defs(code, slots);
    }

    changed
}

/// Removes unreachable blocks in every function, then, unless some function
/// exceeds the block ceiling, removes dead assignments using liveness.
fn global_round(program: &mut Program, slots: SlotSpace, opts: &Opts) -> bool {
    let mut changed = false;
    let mut graphs = Vec::with_capacity(program.len());

    for func in program.functions_mut() {
        let mut cfg = CFG::build(&func.code);
        changed |= uce::remove_unreachable(&mut cfg, &mut func.code);
        graphs.push(cfg);
    }

    if !opts.dce {
        return changed;
    }

    if let Some(cfg) = graphs.iter().find(|cfg| cfg.len() > opts.block_ceiling) {
        warn!(
            "control-flow graph with {} blocks exceeds the ceiling of {}, skipping liveness-based dead code elimination",
            cfg.len(),
            opts.block_ceiling
        );
        return changed;
    }

    for (func, cfg) in program.functions_mut().zip(&mut graphs) {
        let sweeps = liveness(cfg, &func.code, slots);
        debug!("liveness of '{}' converged after {sweeps} sweeps", func.name);

        changed |= dce::remove_dead_global(cfg, &mut func.code, slots);
    }

    changed
}
