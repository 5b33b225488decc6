//! Value Propagation
//!
//! Transforms an intermediate representation (_IR_) by forwarding the value of
//! a copy, address-of, or arithmetic assignment to its later uses within the
//! same straight-line run, and by folding chains of arithmetic on constants.

use crate::compiler::ir::{AssignOp, CodeId, CodeList, Instruction, Operand};

/// Operand whose value is being forwarded, together with the operands that
/// value was computed from.
#[derive(Debug, Clone, Copy)]
struct Tracked {
    opr: Operand,
    sources: [Operand; 2],
}

impl Tracked {
    /// Returns `true` if writing `dst` invalidates the tracked value.
    fn clobbered_by(&self, dst: &Operand) -> bool {
        *dst == self.opr || self.sources.iter().any(|src| src.is_slot() && src == dst)
    }

    /// Returns the next instruction after `from` that reads the tracked
    /// operand, or `None` if control may enter from elsewhere or the value is
    /// clobbered first.
    fn next_use(&self, code: &CodeList, from: CodeId) -> Option<CodeId> {
        let anchor = code.anchor();
        let mut at = code.next(from);

        while at != anchor {
            match code.get(at) {
                Instruction::Function(_)
                | Instruction::Param(_)
                | Instruction::Label(_)
                | Instruction::Goto(_) => return None,
                Instruction::Dec { .. } => {}
                Instruction::Return(opr) | Instruction::Arg(opr) | Instruction::Write(opr) => {
                    if *opr == self.opr {
                        return Some(at);
                    }
                }
                Instruction::Cond { lhs, rhs, .. } => {
                    if *lhs == self.opr || *rhs == self.opr {
                        return Some(at);
                    }
                }
                // READ overwrites its operand here, even though DCE counts it as a use.
                Instruction::Call { dst, .. } | Instruction::Read(dst) => {
                    if self.clobbered_by(dst) {
                        return None;
                    }
                }
                Instruction::Assign {
                    dst, src1, src2, ..
                } => {
                    // Store destinations are treated as writes as well.
                    if self.clobbered_by(dst) {
                        return None;
                    }
                    if *src1 == self.opr || *src2 == self.opr {
                        return Some(at);
                    }
                }
            }

            at = code.next(at);
        }

        None
    }
}

/// Forwards assigned values to their later uses, returning `true` if any
/// operand was rewritten.
pub fn propagate(code: &mut CodeList) -> bool {
    let mut changed = false;
    let mut cursor = code.cursor();

    while let Some(id) = cursor.advance(code) {
        let Instruction::Assign {
            op,
            dst,
            src1,
            src2,
        } = *code.get(id)
        else {
            continue;
        };

        changed |= match op {
            AssignOp::Copy => propagate_copy(code, id, dst, src1),
            AssignOp::AddrOf if src2.is_empty() => propagate_address(code, id, dst, src1),
            _ if op.is_arith() => propagate_arith(code, id, op, dst, src1, src2),
            _ => false,
        };
    }

    changed
}

/// `x := y; ...; use(x)  ==>  x := y; ...; use(y)`
fn propagate_copy(code: &mut CodeList, at: CodeId, dst: Operand, src: Operand) -> bool {
    let tracked = Tracked {
        opr: dst,
        sources: [src, Operand::EMPTY],
    };

    let mut changed = false;
    let mut from = at;

    while let Some(site) = tracked.next_use(code, from) {
        // Only the first use past a branch or at a return is rewritten.
        let last = matches!(code.get(site), Instruction::Cond { .. } | Instruction::Return(_));

        changed |= replace_use(code.get_mut(site), dst, src);

        if last {
            break;
        }

        from = site;
    }

    changed
}

/// Rewrites reads of `from` in `inst` into reads of `to`, where allowed.
fn replace_use(inst: &mut Instruction, from: Operand, to: Operand) -> bool {
    let mut changed = false;
    let mut swap = |opr: &mut Operand| {
        if *opr == from && to != from {
            *opr = to;
            changed = true;
        }
    };

    match inst {
        Instruction::Return(opr) | Instruction::Arg(opr) | Instruction::Write(opr) => swap(opr),
        Instruction::Cond { lhs, rhs, .. } => {
            swap(lhs);
            swap(rhs);
        }
        Instruction::Assign { op, src1, src2, .. } => {
            // `&x` names storage and `*#k` is not an address.
            let keep_src1 = *op == AssignOp::AddrOf
                || (to.is_const() && matches!(op, AssignOp::Load | AssignOp::StoreIndirect));

            if !keep_src1 {
                swap(src1);
            }
            swap(src2);
        }
        _ => {}
    }

    changed
}

/// `x := &v; ...; y := x [+ w]  ==>  y := &v [+ w]`
fn propagate_address(code: &mut CodeList, at: CodeId, dst: Operand, var: Operand) -> bool {
    let tracked = Tracked {
        opr: dst,
        sources: [var, Operand::EMPTY],
    };

    let mut changed = false;
    let mut from = at;

    while let Some(site) = tracked.next_use(code, from) {
        if let Instruction::Assign { op, src1, src2, .. } = code.get_mut(site) {
            match *op {
                AssignOp::Copy | AssignOp::Add if *src1 == dst => {
                    *op = AssignOp::AddrOf;
                    *src1 = var;
                    changed = true;
                }
                AssignOp::Add if *src2 == dst => {
                    *op = AssignOp::AddrOf;
                    *src2 = *src1;
                    *src1 = var;
                    changed = true;
                }
                _ => {}
            }
        }

        from = site;
    }

    changed
}

/// `t1 := a op b; ...; t2 := t1  ==>  t2 := a op b`, and folds constant
/// chains such as `t1 := a + 1; t2 := t1 + 2  ==>  t2 := #3 + a`.
fn propagate_arith(
    code: &mut CodeList,
    at: CodeId,
    op: AssignOp,
    dst: Operand,
    src1: Operand,
    src2: Operand,
) -> bool {
    let tracked = Tracked {
        opr: dst,
        sources: [src1, src2],
    };

    let mut changed = false;
    let mut from = at;

    while let Some(site) = tracked.next_use(code, from) {
        let Instruction::Assign {
            op: use_op,
            src1: use1,
            src2: use2,
            ..
        } = code.get_mut(site)
        else {
            break;
        };

        if *use_op == AssignOp::Copy {
            *use_op = op;
            *use1 = src1;
            *use2 = src2;
            changed = true;
        } else if let Some((op, a, b)) = fold_chain((op, src1, src2), (*use_op, *use1, *use2)) {
            *use_op = op;
            *use1 = a;
            *use2 = b;
            changed = true;
        }

        from = site;
    }

    changed
}

type Arith = (AssignOp, Operand, Operand);

/// Combines `t1 := first` with a use `t2 := t1 op k` (or `k op t1`) into a
/// single operation on the non-constant operand of `first`.
fn fold_chain(first: Arith, then: Arith) -> Option<Arith> {
    let (op1, a1, a2) = first;
    let (op2, b1, b2) = then;

    // `first` has exactly one constant and `then` has one.
    let (var, k1) = match (a1.as_const(), a2.as_const()) {
        (Some(k), None) => (a2, k),
        (None, Some(k)) => (a1, k),
        _ => return None,
    };
    let (k2, k2_first) = match (b1.as_const(), b2.as_const()) {
        (Some(k), None) => (k, true),
        (None, Some(k)) => (k, false),
        _ => return None,
    };

    let additive = |op: AssignOp| matches!(op, AssignOp::Add | AssignOp::Sub);

    if additive(op1) && additive(op2) {
        // t1 = sign * var + c
        let (mut negate, c) = match (op1, a1.is_const()) {
            (AssignOp::Sub, true) => (true, k1),
            (AssignOp::Sub, false) => (false, k1.wrapping_neg()),
            _ => (false, k1),
        };

        let total = match (op2, k2_first) {
            (AssignOp::Sub, true) => {
                negate = !negate;
                k2.wrapping_sub(c)
            }
            (AssignOp::Sub, false) => c.wrapping_sub(k2),
            _ => c.wrapping_add(k2),
        };

        let op = if negate { AssignOp::Sub } else { AssignOp::Add };
        return Some((op, Operand::constant(total), var));
    }

    if op1 == AssignOp::Mul && op2 == AssignOp::Mul {
        let k = k1.checked_mul(k2)?;
        return Some((AssignOp::Mul, var, Operand::constant(k)));
    }

    None
}
