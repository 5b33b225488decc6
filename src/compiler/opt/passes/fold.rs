//! Adjacent Folding
//!
//! Transforms an intermediate representation (_IR_) by substituting operands
//! defined by the immediately preceding copy or address-of, evaluating
//! conditions and arithmetic on constants, and reducing identity arithmetic to
//! copies.

use log::trace;

use crate::compiler::ir::{AssignOp, CodeList, Instruction, Operand};

/// What the preceding instruction says about the value of one operand.
#[derive(Debug, Clone, Copy)]
enum Prev {
    /// `dst := src`
    Copy { dst: Operand, src: Operand },
    /// `dst := &var`
    AddrOf { dst: Operand, var: Operand },
    Other,
}

impl Prev {
    fn of(inst: &Instruction) -> Self {
        match *inst {
            Instruction::Assign {
                op: AssignOp::Copy,
                dst,
                src1,
                ..
            } => Prev::Copy { dst, src: src1 },
            Instruction::Assign {
                op: AssignOp::AddrOf,
                dst,
                src1,
                src2,
            } if src2.is_empty() => Prev::AddrOf { dst, var: src1 },
            _ => Prev::Other,
        }
    }

    /// Replaces `opr` with the copied source if the preceding copy defined it.
    fn substitute(self, opr: &mut Operand) -> bool {
        match self {
            Prev::Copy { dst, src } if *opr == dst && src != dst => {
                *opr = src;
                true
            }
            _ => false,
        }
    }

    /// Returns the addressed variable if the preceding address-of defined
    /// `opr`.
    fn address(self, opr: Operand) -> Option<Operand> {
        match self {
            Prev::AddrOf { dst, var } if opr == dst => Some(var),
            _ => None,
        }
    }
}

/// Result of folding one instruction.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Unchanged,
    Rewritten,
    Remove,
}

/// Folds every instruction of `code` against its predecessor, returning
/// `true` if anything changed.
pub fn fold_adjacent(code: &mut CodeList) -> bool {
    let mut changed = false;
    let mut cursor = code.cursor();

    while let Some(id) = cursor.advance(code) {
        let prev = Prev::of(code.get(code.prev(id)));

        match fold_instruction(prev, code.get_mut(id)) {
            Outcome::Unchanged => {}
            Outcome::Rewritten => changed = true,
            Outcome::Remove => {
                trace!("removing folded '{}'", code.get(id));
                cursor.remove(code);
                changed = true;
            }
        }
    }

    changed
}

fn fold_instruction(prev: Prev, inst: &mut Instruction) -> Outcome {
    let mut replacement = None;

    let changed = match inst {
        Instruction::Return(opr) | Instruction::Write(opr) | Instruction::Arg(opr) => {
            prev.substitute(opr)
        }
        Instruction::Cond {
            op,
            lhs,
            rhs,
            target,
        } => {
            let (old_lhs, old_rhs) = (*lhs, *rhs);

            prev.substitute(rhs);
            prev.substitute(lhs);

            // Conditions keep variables rather than temporaries.
            if lhs.is_temp() && old_lhs.is_var() {
                *lhs = old_lhs;
            }
            if rhs.is_temp() && old_rhs.is_var() {
                *rhs = old_rhs;
            }

            if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
                if !op.eval(a, b) {
                    return Outcome::Remove;
                }
                replacement = Some(Instruction::Goto(*target));
            }

            *lhs != old_lhs || *rhs != old_rhs
        }
        Instruction::Assign {
            op,
            dst,
            src1,
            src2,
        } => {
            let changed = fold_assign(prev, op, src1, src2);

            if *op == AssignOp::Copy && *dst == *src1 {
                return Outcome::Remove;
            }

            changed
        }
        _ => false,
    };

    if let Some(code) = replacement {
        *inst = code;
        return Outcome::Rewritten;
    }

    if changed {
        Outcome::Rewritten
    } else {
        Outcome::Unchanged
    }
}

fn fold_assign(prev: Prev, op: &mut AssignOp, src1: &mut Operand, src2: &mut Operand) -> bool {
    match *op {
        // t1 := &v; t2 := t1  ==>  t2 := &v
        AssignOp::Copy => {
            if let Some(var) = prev.address(*src1) {
                *op = AssignOp::AddrOf;
                *src1 = var;
                return true;
            }

            prev.substitute(src1)
        }
        _ if op.is_arith() => {
            // t1 := &v; t2 := t1 + t3  ==>  t2 := &v + t3
            if *op == AssignOp::Add {
                if let Some(var) = prev.address(*src1) {
                    *op = AssignOp::AddrOf;
                    *src1 = var;
                    return true;
                }
                if let Some(var) = prev.address(*src2) {
                    *op = AssignOp::AddrOf;
                    *src2 = *src1;
                    *src1 = var;
                    return true;
                }
            }

            let substituted = prev.substitute(src1) | prev.substitute(src2);
            simplify(op, src1, src2) || substituted
        }
        _ => false,
    }
}

/// Reduces self-cancelling, constant and identity arithmetic to a copy.
fn simplify(op: &mut AssignOp, src1: &mut Operand, src2: &mut Operand) -> bool {
    let folded = if *op == AssignOp::Sub && *src1 == *src2 {
        Some(Operand::constant(0))
    } else if let (Some(a), Some(b)) = (src1.as_const(), src2.as_const()) {
        op.eval(a, b).map(Operand::constant)
    } else {
        let (lhs, rhs) = (src1.as_const(), src2.as_const());

        match *op {
            AssignOp::Add if lhs == Some(0) => Some(*src2),
            AssignOp::Add | AssignOp::Sub if rhs == Some(0) => Some(*src1),
            AssignOp::Mul if lhs == Some(1) => Some(*src2),
            AssignOp::Mul | AssignOp::Div if rhs == Some(1) => Some(*src1),
            _ => None,
        }
    };

    let Some(value) = folded else {
        return false;
    };

    *op = AssignOp::Copy;
    *src1 = value;
    *src2 = Operand::EMPTY;
    true
}
