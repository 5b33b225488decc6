//! Translation
//!
//! Compiler pass that lowers a validated syntax tree into intermediate
//! representation (_IR_) using three-address code (_TAC_), producing one
//! instruction list per function.
//!
//! Code is built as detached fragments in the function's arena and joined in
//! order; a fragment is `None` when an expression produces no instructions
//! (e.g., a constant whose result is discarded).

use std::collections::{HashMap, HashSet};

use crate::compiler::ir::instr::{AssignOp, Instruction, RelOp};
use crate::compiler::ir::list::{CodeId, CodeList};
use crate::compiler::ir::operand::{AddrKind, Operand, OperandKind};
use crate::compiler::ir::program::{Function, Program};
use crate::compiler::ir::shape::{ELEMENT_SIZE, ShapeId};
use crate::compiler::session::Session;
use crate::compiler::tree::{self, ArithOp, CompSt, Def, Dec, Exp, FunDef, Specifier, Stmt, VarDec};
use crate::{Result, TranslateError};

/// Maximum number of arguments accepted in a single call.
pub const MAX_ARGS: usize = 5000;

/// Possibly-empty ring of instructions.
type Frag = Option<CodeId>;

/// Lowers every function of `tree` into _IR_, drawing labels, variables and
/// temporaries from `session`.
///
/// # Errors
///
/// Returns an error if the tree uses float or record types, or passes more
/// than [`MAX_ARGS`] arguments to a function.
pub fn translate(tree: &tree::Program, session: &mut Session) -> Result<Program> {
    let mut program = Program::new();

    for func in &tree.funcs {
        let lowered = FunctionBuilder::new(session).lower(func)?;
        program.insert(lowered);
    }

    Ok(program)
}

/// Rejects the types this middle end cannot represent.
const fn check_spec(spec: &Specifier) -> Result<()> {
    match spec {
        Specifier::Int => Ok(()),
        Specifier::Float => Err(TranslateError::Float),
        Specifier::Record(_) => Err(TranslateError::Record),
    }
}

/// Returns the index of a variable operand.
fn var_index(opr: &Operand) -> u32 {
    match opr.kind {
        OperandKind::Var(index) => index,
        _ => panic!("operand '{opr}' should be a variable"),
    }
}

/// Helper for lowering one function.
struct FunctionBuilder<'s> {
    session: &'s mut Session,
    code: CodeList,
    /// Variable index of every name seen in the function.
    vars: HashMap<String, u32>,
    /// Outermost dimension of every declared array, by variable index.
    arrays: HashMap<u32, ShapeId>,
    /// Variables bound by `PARAM` (arrays among them hold an address).
    params: HashSet<u32>,
}

impl<'s> FunctionBuilder<'s> {
    fn new(session: &'s mut Session) -> Self {
        Self {
            session,
            code: CodeList::new(),
            vars: HashMap::new(),
            arrays: HashMap::new(),
            params: HashSet::new(),
        }
    }

    fn lower(mut self, func: &FunDef) -> Result<Function> {
        check_spec(&func.ret)?;

        let head = self.code.alloc(Instruction::Function(func.name.clone()));
        let mut code = Some(head);

        for param in &func.params {
            check_spec(&param.spec)?;

            let var = self.declare(&param.var);
            self.params.insert(var_index(&var));

            let bind = self.emit(Instruction::Param(var.plain()));
            code = self.join([code, bind]);
        }

        let body = self.compst(&func.body)?;
        code = self.join([code, body]);

        // Falling off the end returns zero.
        if !matches!(self.code.get(self.code.prev(head)), Instruction::Return(_)) {
            let ret = self.emit(Instruction::Return(Operand::constant(0)));
            self.join([code, ret]);
        }

        self.code.set_anchor(head);

        Ok(Function {
            name: func.name.clone(),
            code: self.code,
        })
    }

    #[inline]
    fn emit(&mut self, code: Instruction) -> Frag {
        Some(self.code.alloc(code))
    }

    /// Emits `dst := src1 op src2`, or nothing if the result is discarded.
    fn assign(&mut self, op: AssignOp, dst: Operand, src1: Operand, src2: Operand) -> Frag {
        if dst.is_empty() {
            return None;
        }

        self.emit(Instruction::binary(op, dst.plain(), src1.plain(), src2.plain()))
    }

    fn join<const N: usize>(&mut self, frags: [Frag; N]) -> Frag {
        frags
            .into_iter()
            .fold(None, |code, frag| self.code.concat(code, frag))
    }

    fn label(&mut self, id: u32) -> Frag {
        self.emit(Instruction::Label(id))
    }

    /// Returns the variable bound to `name`, allocating it on first use.
    fn lookup(&mut self, name: &str) -> Operand {
        if let Some(&index) = self.vars.get(name) {
            return Operand::var(index);
        }

        let var = self.session.new_var();
        self.vars.insert(name.to_string(), var_index(&var));
        var
    }

    /// Returns the variable bound to `name`, annotated as a sub-array address
    /// if it was declared as an array.
    fn lookup_array(&mut self, name: &str) -> Operand {
        let var = self.lookup(name);

        match self.arrays.get(&var_index(&var)) {
            Some(&head) => Operand {
                addr: AddrKind::Range,
                shape: Some(head),
                ..var
            },
            None => var,
        }
    }

    /// Declares a scalar or array variable, building its shape ring.
    fn declare(&mut self, dec: &VarDec) -> Operand {
        let var = self.lookup(&dec.name);

        if dec.dims.is_empty() {
            return var;
        }

        let index = var_index(&var);
        let head = self.session.shapes.declare(index, &dec.dims);
        self.arrays.insert(index, head);

        Operand {
            addr: AddrKind::Range,
            shape: Some(head),
            ..var
        }
    }

    #[inline]
    fn is_param_var(&self, opr: &Operand) -> bool {
        matches!(opr.kind, OperandKind::Var(index) if self.params.contains(&index))
    }

    /// Turns an element address into the element's value by emitting a load.
    fn ensure_int(&mut self, opr: &mut Operand) -> Frag {
        if opr.addr != AddrKind::Element {
            return None;
        }

        *opr = opr.plain();
        self.emit(Instruction::unary(AssignOp::Load, *opr, *opr))
    }

    fn compst(&mut self, compst: &CompSt) -> Result<Frag> {
        let mut code = None;

        for def in &compst.defs {
            let part = self.def(def)?;
            code = self.join([code, part]);
        }

        for stmt in &compst.stmts {
            let part = self.stmt(stmt)?;
            code = self.join([code, part]);
        }

        Ok(code)
    }

    fn def(&mut self, def: &Def) -> Result<Frag> {
        check_spec(&def.spec)?;

        let mut code = None;
        for dec in &def.decs {
            let part = self.dec(dec)?;
            code = self.join([code, part]);
        }

        Ok(code)
    }

    fn dec(&mut self, dec: &Dec) -> Result<Frag> {
        if dec.var.dims.is_empty() {
            let mut var = self.lookup(&dec.var.name);

            let Some(init) = &dec.init else {
                return Ok(None);
            };

            let code = self.exp(init, &mut var)?;
            let load = self.ensure_int(&mut var);

            return Ok(self.join([code, load]));
        }

        let var = self.declare(&dec.var);
        let head = var.shape.expect("declared array should have a shape");
        let size = self.session.shapes.byte_size(head);
        let reserve = self.emit(Instruction::Dec {
            var: var.plain(),
            size,
        });

        let Some(init) = &dec.init else {
            return Ok(reserve);
        };

        let mut src = self.session.new_temp();
        let init_code = self.exp(init, &mut src)?;
        let copy = self.array_assign(var, src);

        Ok(self.join([reserve, init_code, copy]))
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<Frag> {
        match stmt {
            Stmt::Exp(exp) => {
                let mut discard = Operand::EMPTY;
                self.exp(exp, &mut discard)
            }
            Stmt::CompSt(compst) => self.compst(compst),
            Stmt::Return(exp) => {
                let mut val = self.session.new_temp();
                let code = self.exp(exp, &mut val)?;
                let load = self.ensure_int(&mut val);
                let ret = self.emit(Instruction::Return(val));

                Ok(self.join([code, load, ret]))
            }
            Stmt::If { cond, then, els } => {
                let t_lbl = self.session.new_label();
                let f_lbl = self.session.new_label();

                let cond = self.cond(cond, t_lbl, f_lbl)?;
                let then = self.stmt(then)?;
                let t_label = self.label(t_lbl);
                let f_label = self.label(f_lbl);

                let Some(els) = els else {
                    return Ok(self.join([cond, t_label, then, f_label]));
                };

                let exit_lbl = self.session.new_label();
                let els = self.stmt(els)?;
                let skip = self.emit(Instruction::Goto(exit_lbl));
                let exit = self.label(exit_lbl);

                Ok(self.join([cond, t_label, then, skip, f_label, els, exit]))
            }
            Stmt::While { cond, body } => {
                let loop_lbl = self.session.new_label();
                let out_lbl = self.session.new_label();

                // The condition is tested before entering and again at the
                // bottom of every iteration.
                let enter = self.cond(cond, loop_lbl, out_lbl)?;
                let again = self.cond(cond, loop_lbl, out_lbl)?;
                let body = self.stmt(body)?;
                let loop_label = self.label(loop_lbl);
                let out_label = self.label(out_lbl);

                Ok(self.join([enter, loop_label, body, again, out_label]))
            }
        }
    }

    /// Lowers `exp`, leaving its value in `dst` (nothing is assigned if `dst`
    /// is empty). `dst` is annotated when the value is an array address.
    fn exp(&mut self, exp: &Exp, dst: &mut Operand) -> Result<Frag> {
        match exp {
            Exp::Int(value) => Ok(self.assign(
                AssignOp::Copy,
                *dst,
                Operand::constant(*value),
                Operand::EMPTY,
            )),
            Exp::Float(_) => Err(TranslateError::Float),
            Exp::Field { .. } => Err(TranslateError::Record),
            Exp::Id(name) => {
                let src = self.lookup_array(name);

                if src.addr != AddrKind::Range {
                    return Ok(self.assign(AssignOp::Copy, *dst, src, Operand::EMPTY));
                }

                dst.shape = src.shape;
                dst.addr = AddrKind::Range;

                Ok(self.array_address(*dst, src))
            }
            Exp::Neg(inner) => {
                let mut val = self.session.new_temp();
                let code = self.exp(inner, &mut val)?;
                let load = self.ensure_int(&mut val);
                let neg = self.assign(AssignOp::Sub, *dst, Operand::constant(0), val);

                Ok(self.join([code, load, neg]))
            }
            Exp::Call { name, args } => {
                if let Some(code) = self.builtin(name, args, dst)? {
                    return Ok(Some(code));
                }

                self.call(name, args, dst)
            }
            Exp::Assign(lhs, rhs) => self.assignment(lhs, rhs, dst),
            Exp::Arith { op, lhs, rhs } => {
                let mut src1 = self.session.new_temp();
                let mut src2 = self.session.new_temp();

                let code1 = self.exp(lhs, &mut src1)?;
                let load1 = self.ensure_int(&mut src1);
                let code2 = self.exp(rhs, &mut src2)?;
                let load2 = self.ensure_int(&mut src2);

                let op = match op {
                    ArithOp::Add => AssignOp::Add,
                    ArithOp::Sub => AssignOp::Sub,
                    ArithOp::Mul => AssignOp::Mul,
                    ArithOp::Div => AssignOp::Div,
                };
                let result = self.assign(op, *dst, src1, src2);

                Ok(self.join([code1, load1, code2, load2, result]))
            }
            Exp::Rel { .. } | Exp::And(..) | Exp::Or(..) | Exp::Not(_) => {
                let t_lbl = self.session.new_label();
                let f_lbl = self.session.new_label();

                let zero = self.assign(AssignOp::Copy, *dst, Operand::constant(0), Operand::EMPTY);
                let cond = self.cond(exp, t_lbl, f_lbl)?;
                let t_label = self.label(t_lbl);
                let one = self.assign(AssignOp::Copy, *dst, Operand::constant(1), Operand::EMPTY);
                let f_label = self.label(f_lbl);

                Ok(self.join([zero, cond, t_label, one, f_label]))
            }
            Exp::Index { base, index } => {
                let mut addr = self.session.new_temp();
                let mut offset = self.session.new_temp();

                let base_code = self.exp(base, &mut addr)?;
                let level = addr
                    .shape
                    .expect("indexed expression should denote an array");
                let index_code = self.exp(index, &mut offset)?;
                let load = self.ensure_int(&mut offset);

                let stride = Operand::constant(self.session.shapes.get(level).stride as i32);
                let scale = self.emit(Instruction::binary(AssignOp::Mul, offset, offset, stride));
                let element = self.assign(AssignOp::Add, *dst, addr, offset);

                if self.session.shapes.is_tail(level) {
                    dst.shape = None;
                    dst.addr = AddrKind::Element;
                } else {
                    dst.shape = Some(self.session.shapes.next(level));
                    dst.addr = AddrKind::Range;
                }

                Ok(self.join([base_code, index_code, load, scale, element]))
            }
        }
    }

    /// Emits `dst := &array` for a local array, or `dst := array` for an array
    /// parameter (which already holds an address).
    fn array_address(&mut self, dst: Operand, array: Operand) -> Frag {
        if dst.is_empty() {
            return None;
        }

        if array.is_var() && !self.is_param_var(&array) {
            self.emit(Instruction::addr_of(dst.plain(), array.plain(), Operand::EMPTY))
        } else {
            self.emit(Instruction::copy(dst.plain(), array.plain()))
        }
    }

    /// Lowers the `read()` and `write(x)` builtins, returning `None` for any
    /// other call.
    fn builtin(&mut self, name: &str, args: &[Exp], dst: &Operand) -> Result<Frag> {
        match (name, args) {
            ("read", []) => {
                let target = if dst.is_empty() {
                    self.session.new_temp()
                } else {
                    dst.plain()
                };

                Ok(self.emit(Instruction::Read(target)))
            }
            ("write", [arg]) => {
                let mut val = self.session.new_temp();
                let code = self.exp(arg, &mut val)?;
                let load = self.ensure_int(&mut val);
                let write = self.emit(Instruction::Write(val));
                let result = self.assign(AssignOp::Copy, *dst, Operand::constant(0), Operand::EMPTY);

                Ok(self.join([code, load, write, result]))
            }
            _ => Ok(None),
        }
    }

    /// Lowers a call: arguments are evaluated last to first and pushed in the
    /// same order, so the `ARG` just before the `CALL` is the first argument.
    fn call(&mut self, name: &str, args: &[Exp], dst: &Operand) -> Result<Frag> {
        if args.len() > MAX_ARGS {
            return Err(TranslateError::TooManyArgs {
                count: args.len(),
                max: MAX_ARGS,
            });
        }

        let mut code = None;
        let mut pushed = Vec::with_capacity(args.len());

        for arg in args.iter().rev() {
            let mut val = self.session.new_temp();
            let part = self.exp(arg, &mut val)?;
            let load = self.ensure_int(&mut val);
            code = self.join([code, part, load]);
            pushed.push(val.plain());
        }

        for val in pushed {
            let arg = self.emit(Instruction::Arg(val));
            code = self.join([code, arg]);
        }

        let dst = if dst.is_empty() {
            self.session.new_temp()
        } else {
            dst.plain()
        };
        let call = self.emit(Instruction::Call {
            dst,
            func: name.to_string(),
        });

        Ok(self.join([code, call]))
    }

    fn assignment(&mut self, lhs: &Exp, rhs: &Exp, dst: &mut Operand) -> Result<Frag> {
        let mut src = self.session.new_temp();
        let get_src = self.exp(rhs, &mut src)?;

        if let Exp::Id(name) = lhs {
            let lvalue = self.lookup_array(name);

            if lvalue.addr == AddrKind::Range {
                let copy = self.array_assign(lvalue, src);

                dst.shape = lvalue.shape;
                dst.addr = AddrKind::Range;
                let result = self.array_address(*dst, lvalue);

                return Ok(self.join([get_src, copy, result]));
            }

            // `READ t; v := t` becomes `READ v`.
            if let Some(read) = get_src
                && self.code.next(read) == read
                && matches!(self.code.get(read), Instruction::Read(_))
            {
                self.code.replace(read, Instruction::Read(lvalue));
                let result = self.assign(AssignOp::Copy, *dst, lvalue, Operand::EMPTY);

                return Ok(self.join([get_src, result]));
            }

            let load = self.ensure_int(&mut src);
            let store = self.emit(Instruction::copy(lvalue, src));
            let result = self.assign(AssignOp::Copy, *dst, lvalue, Operand::EMPTY);

            return Ok(self.join([get_src, load, store, result]));
        }

        let mut laddr = self.session.new_temp();
        let get_laddr = self.exp(lhs, &mut laddr)?;

        let store = match (laddr.addr, src.addr) {
            (AddrKind::Range, AddrKind::Range) => self.array_assign(laddr, src),
            (AddrKind::Element, AddrKind::Value) => {
                self.emit(Instruction::unary(AssignOp::Store, laddr.plain(), src))
            }
            (AddrKind::Element, AddrKind::Element) => self.emit(Instruction::unary(
                AssignOp::StoreIndirect,
                laddr.plain(),
                src.plain(),
            )),
            (target, value) => panic!(
                "assigning a {value:?} operand to a {target:?} target should have been rejected by type checking"
            ),
        };

        dst.shape = laddr.shape;
        dst.addr = laddr.addr;
        let result = self.assign(AssignOp::Copy, *dst, laddr, Operand::EMPTY);

        Ok(self.join([get_src, get_laddr, store, result]))
    }

    /// Lowers `exp` as a branch: jumps to `t_lbl` if it holds, to `f_lbl`
    /// otherwise. `&&`, `||` and `!` short-circuit.
    fn cond(&mut self, exp: &Exp, t_lbl: u32, f_lbl: u32) -> Result<Frag> {
        match exp {
            Exp::Rel { op, lhs, rhs } => {
                let mut t1 = self.session.new_temp();
                let mut t2 = self.session.new_temp();

                let code1 = self.exp(lhs, &mut t1)?;
                let load1 = self.ensure_int(&mut t1);
                let code2 = self.exp(rhs, &mut t2)?;
                let load2 = self.ensure_int(&mut t2);
                let test = self.emit(Instruction::Cond {
                    op: *op,
                    lhs: t1,
                    rhs: t2,
                    target: t_lbl,
                });
                let skip = self.emit(Instruction::Goto(f_lbl));

                Ok(self.join([code1, load1, code2, load2, test, skip]))
            }
            Exp::Not(inner) => self.cond(inner, f_lbl, t_lbl),
            Exp::And(lhs, rhs) => {
                let next = self.session.new_label();
                let code1 = self.cond(lhs, next, f_lbl)?;
                let label = self.label(next);
                let code2 = self.cond(rhs, t_lbl, f_lbl)?;

                Ok(self.join([code1, label, code2]))
            }
            Exp::Or(lhs, rhs) => {
                let next = self.session.new_label();
                let code1 = self.cond(lhs, t_lbl, next)?;
                let label = self.label(next);
                let code2 = self.cond(rhs, t_lbl, f_lbl)?;

                Ok(self.join([code1, label, code2]))
            }
            _ => {
                let mut val = self.session.new_temp();
                let code = self.exp(exp, &mut val)?;
                let load = self.ensure_int(&mut val);
                let test = self.emit(Instruction::Cond {
                    op: RelOp::Ne,
                    lhs: val,
                    rhs: Operand::constant(0),
                    target: t_lbl,
                });
                let skip = self.emit(Instruction::Goto(f_lbl));

                Ok(self.join([code, load, test, skip]))
            }
        }
    }

    /// Copies one array (or sub-array) into another, word by word, until
    /// either extent is exhausted.
    ///
    /// ```text
    /// pd := &dst        ps := src
    /// ed := pd + #size  es := ps + #size
    /// LABEL loop :
    /// IF pd == ed GOTO exit
    /// IF ps == es GOTO exit
    /// *pd := *ps
    /// pd := pd + #4
    /// ps := ps + #4
    /// GOTO loop
    /// LABEL exit :
    /// ```
    fn array_assign(&mut self, dst: Operand, src: Operand) -> Frag {
        if dst.is_empty() {
            return None;
        }

        assert!(
            dst.addr == AddrKind::Range && src.addr == AddrKind::Range,
            "array assignment requires two sub-array addresses"
        );

        let dst_size = self.extent(&dst);
        let src_size = self.extent(&src);

        let ptr_dst = self.session.new_temp();
        let ptr_src = self.session.new_temp();
        let end_dst = self.session.new_temp();
        let end_src = self.session.new_temp();

        let init_dst = self.array_address(ptr_dst, dst);
        let init_src = self.array_address(ptr_src, src);
        let bound_dst = self.emit(Instruction::binary(AssignOp::Add, end_dst, ptr_dst, dst_size));
        let bound_src = self.emit(Instruction::binary(AssignOp::Add, end_src, ptr_src, src_size));

        let loop_lbl = self.session.new_label();
        let exit_lbl = self.session.new_label();
        let width = Operand::constant(ELEMENT_SIZE as i32);

        let head = self.label(loop_lbl);
        let dst_done = self.emit(Instruction::Cond {
            op: RelOp::Eq,
            lhs: ptr_dst,
            rhs: end_dst,
            target: exit_lbl,
        });
        let src_done = self.emit(Instruction::Cond {
            op: RelOp::Eq,
            lhs: ptr_src,
            rhs: end_src,
            target: exit_lbl,
        });
        let copy = self.emit(Instruction::unary(AssignOp::StoreIndirect, ptr_dst, ptr_src));
        let step_dst = self.emit(Instruction::binary(AssignOp::Add, ptr_dst, ptr_dst, width));
        let step_src = self.emit(Instruction::binary(AssignOp::Add, ptr_src, ptr_src, width));
        let back = self.emit(Instruction::Goto(loop_lbl));
        let exit = self.label(exit_lbl);

        self.join([
            init_dst, init_src, bound_dst, bound_src, head, dst_done, src_done, copy, step_dst,
            step_src, back, exit,
        ])
    }

    /// Returns the byte size of the sub-array `opr` points into.
    fn extent(&self, opr: &Operand) -> Operand {
        let level = opr.shape.expect("array operand should carry its shape");
        Operand::constant(self.session.shapes.byte_size(level) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::tree::build::*;

    fn lower(funcs: Vec<FunDef>) -> (Program, Session) {
        let mut session = Session::new();
        let program = translate(&tree::Program { funcs }, &mut session)
            .expect("tree should translate");
        (program, session)
    }

    fn dump(program: &Program, name: &str) -> Vec<String> {
        program
            .get(name)
            .expect("function should exist")
            .code
            .instructions()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn translate_return_constant() {
        let (program, _) = lower(vec![func("main", vec![], vec![], vec![ret(int(0))])]);

        assert_eq!(
            dump(&program, "main"),
            ["FUNCTION main :", "t1 := #0", "RETURN t1"]
        );
    }

    #[test]
    fn translate_appends_missing_return() {
        let (program, _) = lower(vec![func("main", vec![], vec![], vec![write(int(1))])]);

        let code = dump(&program, "main");
        assert_eq!(code.last().map(String::as_str), Some("RETURN #0"));
    }

    #[test]
    fn translate_read_into_variable_directly() {
        let (program, _) = lower(vec![func(
            "main",
            vec![],
            vec![def("x", &[], None)],
            vec![expr(assign(id("x"), read())), write(id("x"))],
        )]);

        assert_eq!(
            dump(&program, "main"),
            [
                "FUNCTION main :",
                "READ v1",
                "t2 := v1",
                "WRITE t2",
                "RETURN #0"
            ]
        );
    }

    #[test]
    fn translate_args_are_pushed_last_first() {
        let (program, _) = lower(vec![
            func(
                "sub",
                vec![param("a", &[]), param("b", &[])],
                vec![],
                vec![ret(arith(ArithOp::Sub, id("a"), id("b")))],
            ),
            func(
                "main",
                vec![],
                vec![],
                vec![write(call("sub", vec![int(7), int(2)]))],
            ),
        ]);

        assert_eq!(
            dump(&program, "sub"),
            [
                "FUNCTION sub :",
                "PARAM v1",
                "PARAM v2",
                "t2 := v1",
                "t3 := v2",
                "t1 := t2 - t3",
                "RETURN t1"
            ]
        );

        let main = dump(&program, "main");
        let args: Vec<_> = main.iter().filter(|line| line.starts_with("ARG")).collect();
        // `2` is evaluated into the first temporary, `7` into the second.
        assert_eq!(args, ["ARG t5", "ARG t6"]);
        assert!(main.contains(&"t5 := #2".to_string()));
        assert!(main.contains(&"t6 := #7".to_string()));
        assert!(main.iter().any(|line| line.ends_with(":= CALL sub")));
    }

    #[test]
    fn translate_two_dimensional_index() {
        let (program, _) = lower(vec![func(
            "main",
            vec![],
            vec![def("a", &[2, 3], None)],
            vec![write(index(index(id("a"), int(1)), int(2)))],
        )]);

        assert_eq!(
            dump(&program, "main"),
            [
                "FUNCTION main :",
                "DEC v1 24",
                "t4 := &v1",
                "t5 := #1",
                "t5 := t5 * #12",
                "t2 := t4 + t5",
                "t3 := #2",
                "t3 := t3 * #4",
                "t1 := t2 + t3",
                "t1 := *t1",
                "WRITE t1",
                "RETURN #0"
            ]
        );
    }

    #[test]
    fn translate_element_store() {
        let (program, _) = lower(vec![func(
            "main",
            vec![],
            vec![def("a", &[3], None)],
            vec![expr(assign(index(id("a"), int(0)), int(5)))],
        )]);

        let code = dump(&program, "main");
        assert!(code.contains(&"*t2 := t1".to_string()), "{code:?}");
    }

    #[test]
    fn translate_array_param_is_not_address_taken() {
        let (program, _) = lower(vec![func(
            "first",
            vec![param("p", &[4])],
            vec![],
            vec![ret(index(id("p"), int(0)))],
        )]);

        let code = dump(&program, "first");
        assert!(code.contains(&"t2 := v1".to_string()), "{code:?}");
        assert!(!code.iter().any(|line| line.contains('&')));
    }

    #[test]
    fn translate_condition_short_circuits() {
        let cond = Exp::And(
            Box::new(rel(RelOp::Lt, id("x"), int(3))),
            Box::new(Exp::Not(Box::new(id("y")))),
        );
        let (program, _) = lower(vec![func(
            "main",
            vec![],
            vec![def("x", &[], Some(int(1))), def("y", &[], Some(int(0)))],
            vec![if_else(cond, write(int(1)), Some(write(int(2))))],
        )]);

        let code = dump(&program, "main");
        let jumps = code
            .iter()
            .filter(|line| line.starts_with("IF") || line.starts_with("GOTO"))
            .count();
        // Two conditional jumps, their two fall-through gotos, and the jump
        // over the else branch.
        assert_eq!(jumps, 5, "{code:?}");
        assert!(code.iter().any(|line| line.contains("!= #0 GOTO")));
    }

    #[test]
    fn translate_rejects_float() {
        let mut session = Session::new();
        let tree = tree::Program {
            funcs: vec![func("main", vec![], vec![], vec![ret(Exp::Float(1.5))])],
        };

        assert_eq!(
            translate(&tree, &mut session).err(),
            Some(TranslateError::Float)
        );
    }

    #[test]
    fn translate_rejects_record() {
        let mut session = Session::new();
        let mut main = func("main", vec![], vec![], vec![]);
        main.body.defs.push(Def {
            spec: Specifier::Record("point".into()),
            decs: vec![],
        });

        assert_eq!(
            translate(&tree::Program { funcs: vec![main] }, &mut session).err(),
            Some(TranslateError::Record)
        );
    }

    #[test]
    fn translate_rejects_too_many_args() {
        let mut session = Session::new();
        let args = vec![int(0); MAX_ARGS + 1];
        let tree = tree::Program {
            funcs: vec![func("main", vec![], vec![], vec![expr(call("f", args))])],
        };

        assert_eq!(
            translate(&tree, &mut session).err(),
            Some(TranslateError::TooManyArgs {
                count: MAX_ARGS + 1,
                max: MAX_ARGS
            })
        );
    }
}
