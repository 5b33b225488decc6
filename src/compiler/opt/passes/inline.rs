//! Function Inlining
//!
//! Transforms an intermediate representation (_IR_) by replacing calls to
//! small callees that make no calls themselves with a renamed copy of the
//! callee's body.

use std::collections::HashMap;

use log::{debug, warn};

use crate::compiler::ir::{CodeId, CodeList, Instruction, Operand, OperandKind, Program, Toward};
use crate::compiler::opt::Opts;
use crate::compiler::session::Session;

/// Returns `true` if `code` makes no calls and its size, weighted by its label
/// count, stays within the limits of `opts`.
#[must_use]
pub fn is_inlinable(code: &CodeList, opts: &Opts) -> bool {
    let ceiling = opts.inline_max_lines * opts.inline_max_labels;
    let mut lines = 1;
    let mut labels = 1;

    for inst in code.instructions() {
        match inst {
            Instruction::Call { .. } => return false,
            Instruction::Label(_) => labels += 1,
            _ => {}
        }

        if !matches!(inst, Instruction::Param(_)) {
            lines += 1;
        }

        if lines * labels > ceiling {
            return false;
        }
    }

    true
}

/// Returns the memoized inlining decision for `callee`, deciding it on first
/// request. Unknown callees are never inlined.
fn inlinable(program: &mut Program, callee: &str, opts: &Opts) -> bool {
    if let Some(decision) = program.inline_decision(callee) {
        return decision;
    }

    let Some(func) = program.get(callee) else {
        return false;
    };

    let decision = is_inlinable(&func.code, opts);
    program.set_inline_decision(callee, decision);
    decision
}

/// Inlines every eligible call site in every function, returning `true` if any
/// call was replaced.
pub fn inline_calls(program: &mut Program, session: &mut Session, opts: &Opts) -> bool {
    let mut changed = false;

    for caller in program.names() {
        let sites: Vec<(CodeId, String)> = {
            let code = &program
                .get(&caller)
                .expect("caller should be in the function table")
                .code;

            code.ids()
                .filter_map(|id| match code.get(id) {
                    Instruction::Call { func, .. } => Some((id, func.clone())),
                    _ => None,
                })
                .collect()
        };

        for (site, callee) in sites {
            if !inlinable(program, &callee, opts) {
                continue;
            }

            let body: Vec<_> = program
                .get(&callee)
                .expect("inlinable callee should be in the function table")
                .code
                .instructions()
                .skip(1)
                .cloned()
                .collect();

            let code = &mut program
                .get_mut(&caller)
                .expect("caller should be in the function table")
                .code;

            if inline_site(code, site, body, session) {
                debug!("inlined call to '{callee}' in '{caller}'");
                changed = true;
            } else {
                warn!("call to '{callee}' in '{caller}' does not match its parameters, not inlined");
                program.set_inline_decision(&callee, false);
            }
        }
    }

    changed
}

/// Fresh names for every slot and label of one inlined copy.
#[derive(Debug, Default)]
struct Renamer {
    slots: HashMap<OperandKind, Operand>,
    labels: HashMap<u32, u32>,
}

impl Renamer {
    fn operand(&mut self, opr: &mut Operand, session: &mut Session) {
        if !opr.is_slot() {
            return;
        }

        let fresh = *self.slots.entry(opr.kind).or_insert_with(|| {
            if opr.is_var() {
                session.new_var()
            } else {
                session.new_temp()
            }
        });

        opr.kind = fresh.kind;
    }

    fn label(&mut self, label: &mut u32, session: &mut Session) {
        *label = *self
            .labels
            .entry(*label)
            .or_insert_with(|| session.new_label());
    }

    fn instruction(&mut self, inst: &mut Instruction, session: &mut Session) {
        inst.for_each_operand_mut(|opr| self.operand(opr, session));

        if let Instruction::Label(label) = inst {
            self.label(label, session);
        } else if let Some(target) = inst.target_mut() {
            self.label(target, session);
        }
    }
}

/// Replaces the call at `site` with a renamed copy of `body` (the callee's
/// instructions after `FUNCTION`), returning `false` without changing `code`
/// if the `ARG` count does not match the callee's `PARAM` count.
fn inline_site(
    code: &mut CodeList,
    site: CodeId,
    body: Vec<Instruction>,
    session: &mut Session,
) -> bool {
    let dst = match code.get(site) {
        Instruction::Call { dst, .. } => *dst,
        other => panic!("inline site should be a CALL, got '{other}'"),
    };

    // Nearest `ARG` binds the first `PARAM`.
    let mut args = vec![];
    let mut at = code.prev(site);
    while let Instruction::Arg(opr) = code.get(at) {
        args.push((at, *opr));
        at = code.prev(at);
    }

    let params = body
        .iter()
        .take_while(|inst| matches!(inst, Instruction::Param(_)))
        .count();

    if params != args.len() {
        return false;
    }

    let mut renamer = Renamer::default();
    let ret = session.new_label();
    let mut frag = None;
    let mut bound = args.iter().map(|&(_, opr)| opr);

    for mut inst in body {
        renamer.instruction(&mut inst, session);

        let emitted = match inst {
            Instruction::Param(param) => {
                let arg = bound.next().expect("argument count should match parameters");
                vec![Instruction::copy(param, arg)]
            }
            Instruction::Return(_) if dst.is_empty() => vec![Instruction::Goto(ret)],
            Instruction::Return(value) => {
                vec![Instruction::copy(dst, value), Instruction::Goto(ret)]
            }
            other => vec![other],
        };

        for inst in emitted {
            let id = code.alloc(inst);
            frag = code.concat(frag, Some(id));
        }
    }

    let label = code.alloc(Instruction::Label(ret));
    let frag = code
        .concat(frag, Some(label))
        .expect("inlined fragment should contain its return label");

    code.splice_after(site, frag);
    code.remove(site, Toward::Next);

    for (arg, _) in args {
        code.remove(arg, Toward::Next);
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{AssignOp, Function, RelOp};

    fn add(session: &mut Session) -> Function {
        // int add(int a, int b) { if (a < b) return b; return a + b; }
        let (a, b, t) = (session.new_var(), session.new_var(), session.new_temp());
        let skip = session.new_label();

        let mut func = Function::new("add");
        func.code = CodeList::with_body(
            "add",
            [
                Instruction::Param(a),
                Instruction::Param(b),
                Instruction::Cond {
                    op: RelOp::Ge,
                    lhs: a,
                    rhs: b,
                    target: skip,
                },
                Instruction::Return(b),
                Instruction::Label(skip),
                Instruction::binary(AssignOp::Add, t, a, b),
                Instruction::Return(t),
            ],
        );
        func
    }

    fn main(session: &mut Session) -> Function {
        // write(add(1, x));
        let (x, t) = (session.new_var(), session.new_temp());

        let mut func = Function::new("main");
        func.code = CodeList::with_body(
            "main",
            [
                Instruction::Read(x),
                Instruction::Arg(x),
                Instruction::Arg(Operand::constant(1)),
                Instruction::Call {
                    dst: t,
                    func: "add".into(),
                },
                Instruction::Write(t),
                Instruction::Return(Operand::constant(0)),
            ],
        );
        func
    }

    #[test]
    fn inlinable_respects_calls_and_size() {
        let opts = Opts::default();
        let mut session = Session::new();

        assert!(is_inlinable(&add(&mut session).code, &opts));
        assert!(!is_inlinable(&main(&mut session).code, &opts));

        let tight = Opts {
            inline_max_lines: 2,
            inline_max_labels: 2,
            ..Opts::default()
        };
        assert!(!is_inlinable(&add(&mut session).code, &tight));
    }

    #[test]
    fn call_is_replaced_by_renamed_body() {
        let mut session = Session::new();
        let mut program = Program::new();
        program.insert(main(&mut session));
        program.insert(add(&mut session));

        let before = session.slots();
        let labels = session.label_count();

        assert!(inline_calls(&mut program, &mut session, &Opts::default()));
        assert_eq!(program.inline_decision("add"), Some(true));

        let dump: Vec<_> = program
            .get("main")
            .expect("main is defined")
            .code
            .instructions()
            .map(ToString::to_string)
            .collect();

        // main owns v1/t1 and add owned v2, v3, t2 and label1.
        assert_eq!(
            dump,
            [
                "FUNCTION main :",
                "READ v1",
                "v4 := #1",
                "v5 := v1",
                "IF v4 >= v5 GOTO label3",
                "t1 := v5",
                "GOTO label2",
                "LABEL label3 :",
                "t3 := v4 + v5",
                "t1 := t3",
                "GOTO label2",
                "LABEL label2 :",
                "WRITE t1",
                "RETURN #0"
            ]
        );

        assert!(session.slots().vars > before.vars);
        assert!(session.label_count() > labels);

        let emitted: Vec<_> = program.emitted().map(|f| f.name.as_str()).collect();
        assert_eq!(emitted, ["main"]);
    }

    #[test]
    fn mismatched_arguments_are_not_inlined() {
        let mut session = Session::new();
        let mut program = Program::new();

        let mut main = main(&mut session);
        let anchor = main.code.anchor();
        let read = main.code.next(anchor);
        main.code.remove(main.code.next(read), Toward::Next);

        program.insert(main);
        program.insert(add(&mut session));

        assert!(!inline_calls(&mut program, &mut session, &Opts::default()));
        assert_eq!(program.inline_decision("add"), Some(false));
    }
}
