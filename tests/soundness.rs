//! Optimized programs must behave exactly like their unoptimized translation.

use std::collections::HashSet;

use cmm_mid::ExecError;
use cmm_mid::compiler::interp::{self, Outcome};
use cmm_mid::compiler::ir::{Instruction, OperandKind, Program, RelOp, translate};
use cmm_mid::compiler::opt::analysis::{block_def_use, liveness_sweep};
use cmm_mid::compiler::opt::passes::dce::remove_dead_local;
use cmm_mid::compiler::opt::passes::inline::inline_calls;
use cmm_mid::compiler::opt::{CFG, Opts, optimize_ir};
use cmm_mid::compiler::session::Session;
use cmm_mid::compiler::tree::build::*;
use cmm_mid::compiler::tree::{self, ArithOp, FunDef};

fn lower(funcs: Vec<FunDef>) -> (Program, Session) {
    let mut session = Session::new();
    let program = translate(&tree::Program { funcs }, &mut session).expect("tree should translate");
    (program, session)
}

/// Runs the program before and after optimization, asserting both agree, and
/// returns the optimized program with its outcome.
fn round_trip(funcs: Vec<FunDef>, input: &[i32]) -> (Program, Outcome) {
    round_trip_with(funcs, input, &Opts::default())
}

fn round_trip_with(funcs: Vec<FunDef>, input: &[i32], opts: &Opts) -> (Program, Outcome) {
    let (mut program, mut session) = lower(funcs);
    let before = interp::run(&program, input).expect("unoptimized program should run");

    optimize_ir(&mut program, &mut session, opts);
    let after = interp::run(&program, input).expect("optimized program should run");

    assert_eq!(before, after, "optimized program:\n{program}");
    (program, after)
}

fn instruction_count(program: &Program) -> usize {
    program.emitted().map(|func| func.code.len()).sum()
}

fn add(lhs: tree::Exp, rhs: tree::Exp) -> tree::Exp {
    arith(ArithOp::Add, lhs, rhs)
}

fn mul(lhs: tree::Exp, rhs: tree::Exp) -> tree::Exp {
    arith(ArithOp::Mul, lhs, rhs)
}

fn set(name: &str, value: tree::Exp) -> tree::Stmt {
    expr(assign(id(name), value))
}

fn straight_line() -> Vec<FunDef> {
    // int x = read(); int y = x; int z = y + 0; int w = z * 1 + 2 * 3;
    // write(w); write(x - x); return w;
    vec![func(
        "main",
        vec![],
        vec![
            def("x", &[], Some(read())),
            def("y", &[], Some(id("x"))),
            def("z", &[], Some(add(id("y"), int(0)))),
            def("w", &[], Some(add(mul(id("z"), int(1)), mul(int(2), int(3))))),
        ],
        vec![
            write(id("w")),
            write(arith(ArithOp::Sub, id("x"), id("x"))),
            ret(id("w")),
        ],
    )]
}

fn constant_branch() -> Vec<FunDef> {
    // int a = 3; if (a > 1) write(1); else write(2); return a;
    vec![func(
        "main",
        vec![],
        vec![def("a", &[], Some(int(3)))],
        vec![
            if_else(rel(RelOp::Gt, id("a"), int(1)), write(int(1)), Some(write(int(2)))),
            ret(id("a")),
        ],
    )]
}

fn counted_loop() -> Vec<FunDef> {
    // int i = 0; int s = 0; while (i < 5) { s = s + i; i = i + 1; } write(s); return s;
    vec![func(
        "main",
        vec![],
        vec![def("i", &[], Some(int(0))), def("s", &[], Some(int(0)))],
        vec![
            while_loop(
                rel(RelOp::Lt, id("i"), int(5)),
                block(vec![
                    set("s", add(id("s"), id("i"))),
                    set("i", add(id("i"), int(1))),
                ]),
            ),
            write(id("s")),
            ret(id("s")),
        ],
    )]
}

fn inc() -> FunDef {
    // int inc(int n) { return n + 1; }
    func(
        "inc",
        vec![param("n", &[])],
        vec![],
        vec![ret(add(id("n"), int(1)))],
    )
}

fn small_call() -> Vec<FunDef> {
    // int main() { int x = read(); write(inc(x)); return 0; }
    vec![
        inc(),
        func(
            "main",
            vec![],
            vec![def("x", &[], Some(read()))],
            vec![write(call("inc", vec![id("x")])), ret(int(0))],
        ),
    ]
}

fn array_copy() -> Vec<FunDef> {
    // int a[2][3]; int b[2][3]; int i; int j;
    // i = 0; while (i < 2) { j = 0; while (j < 3) { a[i][j] = i * 3 + j; j = j + 1; } i = i + 1; }
    // b = a; write(b[1][2]); write(b[0][1]); write(b[1][0]); return 0;
    let elem = |name: &str, i: tree::Exp, j: tree::Exp| index(index(id(name), i), j);

    vec![func(
        "main",
        vec![],
        vec![
            def("a", &[2, 3], None),
            def("b", &[2, 3], None),
            def("i", &[], None),
            def("j", &[], None),
        ],
        vec![
            set("i", int(0)),
            while_loop(
                rel(RelOp::Lt, id("i"), int(2)),
                block(vec![
                    set("j", int(0)),
                    while_loop(
                        rel(RelOp::Lt, id("j"), int(3)),
                        block(vec![
                            expr(assign(
                                elem("a", id("i"), id("j")),
                                add(mul(id("i"), int(3)), id("j")),
                            )),
                            set("j", add(id("j"), int(1))),
                        ]),
                    ),
                    set("i", add(id("i"), int(1))),
                ]),
            ),
            set("b", id("a")),
            write(elem("b", int(1), int(2))),
            write(elem("b", int(0), int(1))),
            write(elem("b", int(1), int(0))),
            ret(int(0)),
        ],
    )]
}

fn scenarios() -> Vec<Vec<FunDef>> {
    vec![
        straight_line(),
        constant_branch(),
        counted_loop(),
        small_call(),
        array_copy(),
    ]
}

#[test]
fn straight_line_arithmetic_is_preserved() {
    let (program, outcome) = round_trip(straight_line(), &[4]);

    assert_eq!(outcome.output, [10, 0]);
    assert_eq!(outcome.ret, 10);

    let (unoptimized, _) = lower(straight_line());
    assert!(instruction_count(&program) < instruction_count(&unoptimized));
}

#[test]
fn constant_condition_is_resolved() {
    let (program, outcome) = round_trip(constant_branch(), &[]);

    assert_eq!(outcome, Outcome { output: vec![1], ret: 3 });

    let main = &program.get("main").expect("main is defined").code;
    assert!(main.instructions().all(|inst| !matches!(inst, Instruction::Cond { .. })));
}

#[test]
fn counted_loop_is_preserved() {
    let (_, outcome) = round_trip(counted_loop(), &[]);

    assert_eq!(outcome, Outcome { output: vec![10], ret: 10 });
}

#[test]
fn small_callee_is_inlined() {
    let (program, outcome) = round_trip(small_call(), &[41]);

    assert_eq!(outcome.output, [42]);

    let emitted: Vec<_> = program.emitted().map(|func| func.name.as_str()).collect();
    assert_eq!(emitted, ["main"]);
}

#[test]
fn two_dimensional_array_copy_is_preserved() {
    let (_, outcome) = round_trip(array_copy(), &[]);

    assert_eq!(outcome.output, [5, 1, 3]);
}

#[test]
fn array_elements_sum_to_three() {
    // int a[3]; a[0] = 1; a[1] = 2; a[2] = a[0] + a[1]; write(a[2]);
    let elem = |i| index(id("a"), int(i));
    let funcs = vec![func(
        "main",
        vec![],
        vec![def("a", &[3], None)],
        vec![
            expr(assign(elem(0), int(1))),
            expr(assign(elem(1), int(2))),
            expr(assign(elem(2), add(elem(0), elem(1)))),
            write(elem(2)),
        ],
    )];

    let (program, outcome) = round_trip(funcs, &[]);

    let writes = program
        .functions()
        .flat_map(|func| func.code.instructions())
        .filter(|inst| matches!(inst, Instruction::Write(_)))
        .count();

    assert_eq!(writes, 1);
    assert_eq!(outcome.output, [3]);
}

#[test]
fn endless_loop_keeps_a_return() {
    // int main() { while (1) write(1); return 0; }
    let funcs = vec![func(
        "main",
        vec![],
        vec![],
        vec![while_loop(int(1), write(int(1))), ret(int(0))],
    )];

    let (mut program, mut session) = lower(funcs);
    optimize_ir(&mut program, &mut session, &Opts::default());

    for func in program.functions() {
        assert!(
            func.code
                .instructions()
                .any(|inst| matches!(inst, Instruction::Return(_))),
            "'{}' lost its RETURN:\n{}",
            func.name,
            func.code
        );
    }

    assert_eq!(
        interp::run_with_limit(&program, &[], 1000),
        Err(ExecError::StepLimit(1000))
    );
}

#[test]
fn single_round_still_preserves_behavior() {
    let opts = Opts {
        max_rounds: 1,
        ..Opts::default()
    };

    for funcs in scenarios() {
        round_trip_with(funcs, &[4], &opts);
    }
}

#[test]
fn cfg_edges_are_bounded() {
    for funcs in scenarios() {
        let (program, _) = lower(funcs);

        for func in program.functions() {
            let cfg = CFG::build(&func.code);

            for block in &cfg.blocks {
                assert!(block.successors().count() <= 2);
                assert!(block.predecessors().count() <= 2);
            }
        }
    }
}

#[test]
fn liveness_only_grows_and_terminates() {
    for funcs in scenarios() {
        let (program, session) = lower(funcs);
        let slots = session.slots();

        for func in program.functions() {
            let mut cfg = CFG::build(&func.code);
            block_def_use(&mut cfg, &func.code, slots);

            let bound = cfg.len() * slots.len() + 1;
            let mut sweeps = 0;

            loop {
                let before: Vec<_> = cfg.blocks.iter().map(|b| b.live_in.clone()).collect();
                let changed = liveness_sweep(&mut cfg);

                for (old, block) in before.iter().zip(&cfg.blocks) {
                    assert!(old.is_subset(&block.live_in));
                }

                sweeps += 1;
                assert!(sweeps <= bound, "liveness of '{}' did not converge", func.name);

                if !changed {
                    break;
                }
            }
        }
    }
}

#[test]
fn local_dce_is_idempotent_after_optimization() {
    for funcs in scenarios() {
        let (mut program, mut session) = lower(funcs);
        optimize_ir(&mut program, &mut session, &Opts::default());

        let slots = session.slots();
        for func in program.functions_mut() {
            let dump = func.code.to_string();
            assert!(!remove_dead_local(&mut func.code, slots), "{dump}");
            assert_eq!(func.code.to_string(), dump);
        }
    }
}

#[test]
fn inlined_copies_get_fresh_names() {
    // int main() { int x = read(); write(inc(x)); write(inc(x + 1)); return 0; }
    let funcs = vec![
        inc(),
        func(
            "main",
            vec![],
            vec![def("x", &[], Some(read()))],
            vec![
                write(call("inc", vec![id("x")])),
                write(call("inc", vec![add(id("x"), int(1))])),
                ret(int(0)),
            ],
        ),
    ];

    let (mut program, mut session) = lower(funcs);
    let before = session.slots();
    let labels = session.label_count();

    let callee_temps: HashSet<_> = program
        .get("inc")
        .expect("inc is defined")
        .code
        .instructions()
        .flat_map(|inst| inst.uses().chain(inst.def()))
        .filter(|opr| opr.is_temp())
        .map(|opr| opr.kind)
        .collect();

    assert!(inline_calls(&mut program, &mut session, &Opts::default()));

    let main = &program.get("main").expect("main is defined").code;

    let mut fresh_vars = HashSet::new();
    let mut fresh_temps = HashSet::new();
    let mut seen_labels = HashSet::new();

    for inst in main.instructions() {
        for opr in inst.uses().chain(inst.def()) {
            match opr.kind {
                OperandKind::Var(index) if index > before.vars => {
                    fresh_vars.insert(index);
                }
                OperandKind::Temp(index) if index > before.temps => {
                    fresh_temps.insert(index);
                }
                _ => {}
            }
        }

        if let Instruction::Label(label) = inst {
            assert!(*label > labels);
            assert!(seen_labels.insert(*label), "label{label} defined twice");
        }
    }

    // One parameter and the callee's temporaries, renamed once per copy.
    assert_eq!(fresh_vars.len(), 2);
    assert_eq!(fresh_temps.len(), 2 * callee_temps.len());
    assert_eq!(seen_labels.len(), 2);

    let outcome = interp::run(&program, &[5]).expect("inlined program should run");
    assert_eq!(outcome.output, [6, 7]);
}
