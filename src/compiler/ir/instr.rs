//! Instructions
//!
//! Three-address instructions and their textual rendering.

use std::fmt;

use crate::compiler::ir::operand::Operand;

/// Relational operator of a conditional jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl RelOp {
    /// Returns the operator whose result is the negation of `self`.
    #[inline]
    #[must_use]
    pub const fn inverse(self) -> Self {
        match self {
            RelOp::Eq => RelOp::Ne,
            RelOp::Ne => RelOp::Eq,
            RelOp::Lt => RelOp::Ge,
            RelOp::Le => RelOp::Gt,
            RelOp::Gt => RelOp::Le,
            RelOp::Ge => RelOp::Lt,
        }
    }

    /// Evaluates the comparison on two constants.
    #[inline]
    #[must_use]
    pub const fn eval(self, lhs: i32, rhs: i32) -> bool {
        match self {
            RelOp::Eq => lhs == rhs,
            RelOp::Ne => lhs != rhs,
            RelOp::Lt => lhs < rhs,
            RelOp::Le => lhs <= rhs,
            RelOp::Gt => lhs > rhs,
            RelOp::Ge => lhs >= rhs,
        }
    }
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            RelOp::Eq => "==",
            RelOp::Ne => "!=",
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
        };

        f.write_str(op)
    }
}

/// Operation performed by an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `dst := src1`
    Copy,
    /// `dst := src1 + src2`
    Add,
    /// `dst := src1 - src2`
    Sub,
    /// `dst := src1 * src2`
    Mul,
    /// `dst := src1 / src2`
    Div,
    /// `dst := &src1` or `dst := &src1 + src2`
    AddrOf,
    /// `dst := *src1`
    Load,
    /// `*dst := src1`
    Store,
    /// `*dst := *src1`
    StoreIndirect,
}

impl AssignOp {
    /// Returns `true` for the four arithmetic operators.
    #[inline]
    #[must_use]
    pub const fn is_arith(self) -> bool {
        matches!(
            self,
            AssignOp::Add | AssignOp::Sub | AssignOp::Mul | AssignOp::Div
        )
    }

    /// Returns `true` if the destination operand is read as an address rather
    /// than written.
    #[inline]
    #[must_use]
    pub const fn writes_memory(self) -> bool {
        matches!(self, AssignOp::Store | AssignOp::StoreIndirect)
    }

    /// Evaluates an arithmetic operator on two constants with wrapping
    /// semantics, returning `None` for division by zero (or overflow) and for
    /// non-arithmetic operators.
    #[must_use]
    pub const fn eval(self, lhs: i32, rhs: i32) -> Option<i32> {
        match self {
            AssignOp::Add => Some(lhs.wrapping_add(rhs)),
            AssignOp::Sub => Some(lhs.wrapping_sub(rhs)),
            AssignOp::Mul => Some(lhs.wrapping_mul(rhs)),
            AssignOp::Div => lhs.checked_div(rhs),
            _ => None,
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            AssignOp::Add => "+",
            AssignOp::Sub => "-",
            AssignOp::Mul => "*",
            AssignOp::Div => "/",
            _ => "",
        }
    }
}

/// _IR_ instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Head of a function; anchors its instruction list.
    Function(String),
    /// Jump target.
    Label(u32),
    /// Unconditional jump.
    Goto(u32),
    /// Jumps to `target` if `lhs op rhs` holds, otherwise falls through.
    Cond {
        op: RelOp,
        lhs: Operand,
        rhs: Operand,
        target: u32,
    },
    /// Binds the next incoming argument to a parameter variable.
    Param(Operand),
    /// Pushes an argument for the following call.
    Arg(Operand),
    /// Reserves `size` bytes of storage for an array variable.
    Dec { var: Operand, size: u32 },
    /// Calls `func`, storing its return value in `dst`.
    Call { dst: Operand, func: String },
    Return(Operand),
    /// Reads an integer from input into the operand.
    Read(Operand),
    /// Writes the operand to output.
    Write(Operand),
    Assign {
        op: AssignOp,
        dst: Operand,
        src1: Operand,
        src2: Operand,
    },
}

impl Instruction {
    /// `dst := src`
    #[inline]
    #[must_use]
    pub const fn copy(dst: Operand, src: Operand) -> Self {
        Instruction::Assign {
            op: AssignOp::Copy,
            dst,
            src1: src,
            src2: Operand::EMPTY,
        }
    }

    /// `dst := src1 op src2`
    #[inline]
    #[must_use]
    pub const fn binary(op: AssignOp, dst: Operand, src1: Operand, src2: Operand) -> Self {
        Instruction::Assign { op, dst, src1, src2 }
    }

    /// `dst := &var` or `dst := &var + offset` (when `offset` is not empty).
    ///
    /// # Panics
    ///
    /// Panics if `var` is not a variable, since only variables have storage
    /// that can be addressed.
    #[inline]
    #[must_use]
    pub fn addr_of(dst: Operand, var: Operand, offset: Operand) -> Self {
        assert!(var.is_var(), "address-of must be applied to a variable, got '{var}'");

        Instruction::Assign {
            op: AssignOp::AddrOf,
            dst,
            src1: var,
            src2: offset,
        }
    }

    /// Single-operand assignment such as `Load`, `Store` or `StoreIndirect`.
    #[inline]
    #[must_use]
    pub const fn unary(op: AssignOp, dst: Operand, src: Operand) -> Self {
        Instruction::Assign {
            op,
            dst,
            src1: src,
            src2: Operand::EMPTY,
        }
    }

    /// Returns the operand written by this instruction.
    ///
    /// Stores write memory, not their destination operand, so they define
    /// nothing.
    #[inline]
    #[must_use]
    pub const fn def(&self) -> Option<&Operand> {
        match self {
            Instruction::Assign { op, dst, .. } if !op.writes_memory() => Some(dst),
            Instruction::Call { dst, .. } => Some(dst),
            _ => None,
        }
    }

    /// Returns the storage slots read by this instruction.
    ///
    /// `PARAM` and `READ` report their operand as used so that the slots they
    /// bind are never considered dead.
    pub fn uses(&self) -> impl Iterator<Item = &Operand> {
        let oprs: [Option<&Operand>; 3] = match self {
            Instruction::Cond { lhs, rhs, .. } => [Some(lhs), Some(rhs), None],
            Instruction::Param(opr)
            | Instruction::Read(opr)
            | Instruction::Return(opr)
            | Instruction::Arg(opr)
            | Instruction::Write(opr) => [Some(opr), None, None],
            Instruction::Assign {
                op,
                dst,
                src1,
                src2,
            } => [
                op.writes_memory().then_some(dst),
                Some(src1),
                (src2 != src1).then_some(src2),
            ],
            Instruction::Function(_)
            | Instruction::Label(_)
            | Instruction::Goto(_)
            | Instruction::Dec { .. }
            | Instruction::Call { .. } => [None, None, None],
        };

        oprs.into_iter().flatten().filter(|opr| opr.is_slot())
    }

    /// Visits every operand of the instruction mutably.
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut Operand)) {
        match self {
            Instruction::Cond { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Instruction::Param(opr)
            | Instruction::Arg(opr)
            | Instruction::Return(opr)
            | Instruction::Read(opr)
            | Instruction::Write(opr)
            | Instruction::Dec { var: opr, .. }
            | Instruction::Call { dst: opr, .. } => f(opr),
            Instruction::Assign {
                dst, src1, src2, ..
            } => {
                f(dst);
                f(src1);
                f(src2);
            }
            Instruction::Function(_) | Instruction::Label(_) | Instruction::Goto(_) => {}
        }
    }

    /// Returns the label this instruction may jump to.
    #[inline]
    #[must_use]
    pub const fn target(&self) -> Option<u32> {
        match self {
            Instruction::Goto(target) | Instruction::Cond { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Returns a mutable reference to the jump target, if any.
    #[inline]
    pub const fn target_mut(&mut self) -> Option<&mut u32> {
        match self {
            Instruction::Goto(target) | Instruction::Cond { target, .. } => Some(target),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Function(name) => write!(f, "FUNCTION {name} :"),
            Instruction::Label(id) => write!(f, "LABEL label{id} :"),
            Instruction::Goto(id) => write!(f, "GOTO label{id}"),
            Instruction::Cond {
                op,
                lhs,
                rhs,
                target,
            } => write!(f, "IF {lhs} {op} {rhs} GOTO label{target}"),
            Instruction::Param(opr) => write!(f, "PARAM {opr}"),
            Instruction::Arg(opr) => write!(f, "ARG {opr}"),
            Instruction::Dec { var, size } => write!(f, "DEC {var} {size}"),
            Instruction::Call { dst, func } => write!(f, "{dst} := CALL {func}"),
            Instruction::Return(opr) => write!(f, "RETURN {opr}"),
            Instruction::Read(opr) => write!(f, "READ {opr}"),
            Instruction::Write(opr) => write!(f, "WRITE {opr}"),
            Instruction::Assign {
                op,
                dst,
                src1,
                src2,
            } => match op {
                AssignOp::Copy => write!(f, "{dst} := {src1}"),
                AssignOp::AddrOf if src2.is_empty() => write!(f, "{dst} := &{src1}"),
                AssignOp::AddrOf => write!(f, "{dst} := &{src1} + {src2}"),
                AssignOp::Load => write!(f, "{dst} := *{src1}"),
                AssignOp::Store => write!(f, "*{dst} := {src1}"),
                AssignOp::StoreIndirect => write!(f, "*{dst} := *{src1}"),
                AssignOp::Add | AssignOp::Sub | AssignOp::Mul | AssignOp::Div => {
                    write!(f, "{dst} := {src1} {} {src2}", op.symbol())
                }
            },
        }
    }
}
