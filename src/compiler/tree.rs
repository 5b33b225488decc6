//! Syntax Tree
//!
//! Validated tree handed to translation by the front end. Identifiers are
//! resolved, types are checked, and array declarations carry their dimension
//! sizes outermost first (`int a[2][3]` has `dims == [2, 3]`). Float and record
//! carriers exist only so that translation can reject them.

use crate::compiler::ir::instr::RelOp;

/// Type specifier of a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    Int,
    Float,
    Record(String),
}

/// Translation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub funcs: Vec<FunDef>,
}

/// Function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FunDef {
    pub ret: Specifier,
    pub name: String,
    pub params: Vec<ParamDec>,
    pub body: CompSt,
}

/// Declared name with its array dimensions (empty for scalars).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDec {
    pub name: String,
    pub dims: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDec {
    pub spec: Specifier,
    pub var: VarDec,
}

/// Local definition: one specifier shared by several declarators.
#[derive(Debug, Clone, PartialEq)]
pub struct Def {
    pub spec: Specifier,
    pub decs: Vec<Dec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dec {
    pub var: VarDec,
    pub init: Option<Exp>,
}

/// Compound statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompSt {
    pub defs: Vec<Def>,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Exp(Exp),
    CompSt(CompSt),
    Return(Exp),
    If {
        cond: Exp,
        then: Box<Stmt>,
        els: Option<Box<Stmt>>,
    },
    While {
        cond: Exp,
        body: Box<Stmt>,
    },
}

/// Arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Exp {
    Int(i32),
    Float(f32),
    Id(String),
    /// `lhs = rhs`
    Assign(Box<Exp>, Box<Exp>),
    Arith {
        op: ArithOp,
        lhs: Box<Exp>,
        rhs: Box<Exp>,
    },
    Rel {
        op: RelOp,
        lhs: Box<Exp>,
        rhs: Box<Exp>,
    },
    And(Box<Exp>, Box<Exp>),
    Or(Box<Exp>, Box<Exp>),
    Not(Box<Exp>),
    Neg(Box<Exp>),
    /// Call, including the `read()` and `write(x)` builtins.
    Call { name: String, args: Vec<Exp> },
    /// `base[index]`
    Index { base: Box<Exp>, index: Box<Exp> },
    /// `base.field`
    Field { base: Box<Exp>, field: String },
}

/// Shorthand constructors for building trees by hand.
pub mod build {
    use super::{ArithOp, CompSt, Dec, Def, Exp, FunDef, ParamDec, Specifier, Stmt, VarDec};
    use crate::compiler::ir::instr::RelOp;

    #[must_use]
    pub fn int(value: i32) -> Exp {
        Exp::Int(value)
    }

    #[must_use]
    pub fn id(name: &str) -> Exp {
        Exp::Id(name.to_string())
    }

    #[must_use]
    pub fn assign(lhs: Exp, rhs: Exp) -> Exp {
        Exp::Assign(Box::new(lhs), Box::new(rhs))
    }

    #[must_use]
    pub fn arith(op: ArithOp, lhs: Exp, rhs: Exp) -> Exp {
        Exp::Arith {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    #[must_use]
    pub fn rel(op: RelOp, lhs: Exp, rhs: Exp) -> Exp {
        Exp::Rel {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    #[must_use]
    pub fn index(base: Exp, index: Exp) -> Exp {
        Exp::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    #[must_use]
    pub fn call(name: &str, args: Vec<Exp>) -> Exp {
        Exp::Call {
            name: name.to_string(),
            args,
        }
    }

    #[must_use]
    pub fn read() -> Exp {
        call("read", vec![])
    }

    #[must_use]
    pub fn write(arg: Exp) -> Stmt {
        Stmt::Exp(call("write", vec![arg]))
    }

    #[must_use]
    pub fn expr(exp: Exp) -> Stmt {
        Stmt::Exp(exp)
    }

    #[must_use]
    pub fn ret(exp: Exp) -> Stmt {
        Stmt::Return(exp)
    }

    #[must_use]
    pub fn if_else(cond: Exp, then: Stmt, els: Option<Stmt>) -> Stmt {
        Stmt::If {
            cond,
            then: Box::new(then),
            els: els.map(Box::new),
        }
    }

    #[must_use]
    pub fn while_loop(cond: Exp, body: Stmt) -> Stmt {
        Stmt::While {
            cond,
            body: Box::new(body),
        }
    }

    #[must_use]
    pub fn block(stmts: Vec<Stmt>) -> Stmt {
        Stmt::CompSt(CompSt {
            defs: vec![],
            stmts,
        })
    }

    /// `int name[dims]... = init;`
    #[must_use]
    pub fn def(name: &str, dims: &[u32], init: Option<Exp>) -> Def {
        Def {
            spec: Specifier::Int,
            decs: vec![Dec {
                var: VarDec {
                    name: name.to_string(),
                    dims: dims.to_vec(),
                },
                init,
            }],
        }
    }

    /// `int name[dims]...` parameter.
    #[must_use]
    pub fn param(name: &str, dims: &[u32]) -> ParamDec {
        ParamDec {
            spec: Specifier::Int,
            var: VarDec {
                name: name.to_string(),
                dims: dims.to_vec(),
            },
        }
    }

    /// `int name(params) { defs stmts }`
    #[must_use]
    pub fn func(name: &str, params: Vec<ParamDec>, defs: Vec<Def>, stmts: Vec<Stmt>) -> FunDef {
        FunDef {
            ret: Specifier::Int,
            name: name.to_string(),
            params,
            body: CompSt { defs, stmts },
        }
    }
}
