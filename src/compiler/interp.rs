//! Interpreter
//!
//! Executes an intermediate representation (_IR_) program starting at `main`:
//! integer slots per call frame, a flat word memory addressed by byte offset
//! for arrays, an input queue for `READ` and an output vector for `WRITE`.

use std::collections::{HashMap, VecDeque};

use log::trace;

use crate::compiler::ir::{
    AssignOp, CodeId, CodeList, ELEMENT_SIZE, Instruction, Operand, OperandKind, Program,
};
use crate::{ExecError, Result};

/// Default upper bound on executed instructions.
pub const STEP_LIMIT: usize = 1_000_000;

/// Observable result of running a program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Outcome {
    /// Values written by `WRITE`, in order.
    pub output: Vec<i32>,
    /// Value returned by `main`.
    pub ret: i32,
}

/// Runs `program` from `main`, feeding `READ` from `input`.
///
/// # Errors
///
/// Returns an error if execution reaches an undefined function or label, runs
/// out of input, divides by zero, touches memory outside any array, or
/// exceeds [`STEP_LIMIT`] instructions.
pub fn run(program: &Program, input: &[i32]) -> Result<Outcome, ExecError> {
    run_with_limit(program, input, STEP_LIMIT)
}

/// Same as [`run`], with an explicit step limit.
///
/// # Errors
///
/// See [`run`].
pub fn run_with_limit(program: &Program, input: &[i32], limit: usize) -> Result<Outcome, ExecError> {
    Machine::new(program, input).run(limit)
}

/// Activation record of one call.
#[derive(Debug)]
struct Frame<'p> {
    name: &'p str,
    code: &'p CodeList,
    /// Next instruction to execute.
    pc: CodeId,
    slots: HashMap<OperandKind, i32>,
    /// Arguments passed by the caller; the last pushed binds the first `PARAM`.
    args: Vec<i32>,
    /// Arguments pushed for the next call.
    pending: Vec<i32>,
    /// Caller slot receiving the return value.
    ret_dst: Operand,
}

impl Frame<'_> {
    fn value(&self, opr: &Operand) -> i32 {
        match opr.kind {
            OperandKind::Empty => 0,
            OperandKind::Const(value) => value,
            kind => self.slots.get(&kind).copied().unwrap_or_default(),
        }
    }

    fn set(&mut self, opr: &Operand, value: i32) {
        if opr.is_slot() {
            self.slots.insert(opr.kind, value);
        }
    }
}

#[derive(Debug)]
struct Machine<'p> {
    program: &'p Program,
    input: VecDeque<i32>,
    output: Vec<i32>,
    memory: Vec<i32>,
    labels: HashMap<&'p str, HashMap<u32, CodeId>>,
}

impl<'p> Machine<'p> {
    fn new(program: &'p Program, input: &[i32]) -> Self {
        Self {
            program,
            input: input.iter().copied().collect(),
            output: vec![],
            memory: vec![],
            labels: HashMap::new(),
        }
    }

    fn frame(&self, name: &str, args: Vec<i32>, ret_dst: Operand) -> Result<Frame<'p>, ExecError> {
        let func = self
            .program
            .get(name)
            .ok_or_else(|| ExecError::UnknownFunction(name.to_string()))?;

        Ok(Frame {
            name: &func.name,
            code: &func.code,
            pc: func.code.next(func.code.anchor()),
            slots: HashMap::new(),
            args,
            pending: vec![],
            ret_dst,
        })
    }

    fn label(&mut self, frame: &Frame<'p>, label: u32) -> Result<CodeId, ExecError> {
        let labels = self.labels.entry(frame.name).or_insert_with(|| {
            frame
                .code
                .ids()
                .filter_map(|id| match frame.code.get(id) {
                    Instruction::Label(label) => Some((*label, id)),
                    _ => None,
                })
                .collect()
        });

        labels
            .get(&label)
            .copied()
            .ok_or_else(|| ExecError::MissingLabel {
                func: frame.name.to_string(),
                label,
            })
    }

    /// Converts a byte address into a memory index.
    fn word(&self, addr: i32) -> Result<usize, ExecError> {
        let size = ELEMENT_SIZE as i32;

        if addr < 0 || addr % size != 0 || (addr / size) as usize >= self.memory.len() {
            return Err(ExecError::BadAddress(i64::from(addr)));
        }

        Ok((addr / size) as usize)
    }

    fn run(mut self, limit: usize) -> Result<Outcome, ExecError> {
        let mut stack = vec![self.frame("main", vec![], Operand::EMPTY)?];
        let mut steps = 0;

        while let Some(frame) = stack.last_mut() {
            steps += 1;
            if steps > limit {
                return Err(ExecError::StepLimit(limit));
            }

            let (code, at) = (frame.code, frame.pc);
            let inst = code.get(at);
            frame.pc = code.next(at);

            // Falling off the end returns zero.
            let returned = match inst {
                Instruction::Function(_) => Some(0),
                Instruction::Return(opr) => Some(frame.value(opr)),
                _ => None,
            };

            if let Some(value) = returned {
                let done = stack.pop().expect("returning frame should be on the stack");

                match stack.last_mut() {
                    Some(caller) => caller.set(&done.ret_dst, value),
                    None => {
                        return Ok(Outcome {
                            output: self.output,
                            ret: value,
                        });
                    }
                }

                continue;
            }

            match inst {
                Instruction::Label(_) | Instruction::Function(_) | Instruction::Return(_) => {}
                Instruction::Goto(target) => frame.pc = self.label(frame, *target)?,
                Instruction::Cond {
                    op,
                    lhs,
                    rhs,
                    target,
                } => {
                    if op.eval(frame.value(lhs), frame.value(rhs)) {
                        frame.pc = self.label(frame, *target)?;
                    }
                }
                Instruction::Param(opr) => {
                    let value = frame
                        .args
                        .pop()
                        .ok_or_else(|| ExecError::MissingArgument(frame.name.to_string()))?;
                    frame.set(opr, value);
                }
                Instruction::Arg(opr) => {
                    let value = frame.value(opr);
                    frame.pending.push(value);
                }
                Instruction::Dec { var, size } => {
                    let base = self.memory.len() * ELEMENT_SIZE as usize;
                    let words = size.div_ceil(ELEMENT_SIZE) as usize;

                    self.memory.resize(self.memory.len() + words, 0);
                    frame.set(var, base as i32);
                }
                Instruction::Call { dst, func } => {
                    trace!("calling '{func}' from '{}'", frame.name);

                    let args = std::mem::take(&mut frame.pending);
                    let callee = self.frame(func, args, *dst)?;
                    stack.push(callee);
                }
                Instruction::Read(opr) => {
                    let value = self.input.pop_front().ok_or(ExecError::InputExhausted)?;
                    frame.set(opr, value);
                }
                Instruction::Write(opr) => self.output.push(frame.value(opr)),
                Instruction::Assign {
                    op,
                    dst,
                    src1,
                    src2,
                } => {
                    let (a, b) = (frame.value(src1), frame.value(src2));

                    match op {
                        AssignOp::Copy => frame.set(dst, a),
                        AssignOp::Add => frame.set(dst, a.wrapping_add(b)),
                        AssignOp::Sub => frame.set(dst, a.wrapping_sub(b)),
                        AssignOp::Mul => frame.set(dst, a.wrapping_mul(b)),
                        AssignOp::Div => {
                            if b == 0 {
                                return Err(ExecError::DivisionByZero);
                            }
                            frame.set(dst, a.wrapping_div(b));
                        }
                        // Arrays are bound to their base address by `DEC`.
                        AssignOp::AddrOf => frame.set(dst, a.wrapping_add(b)),
                        AssignOp::Load => {
                            let word = self.word(a)?;
                            frame.set(dst, self.memory[word]);
                        }
                        AssignOp::Store => {
                            let word = self.word(frame.value(dst))?;
                            self.memory[word] = a;
                        }
                        AssignOp::StoreIndirect => {
                            let from = self.word(a)?;
                            let to = self.word(frame.value(dst))?;
                            self.memory[to] = self.memory[from];
                        }
                    }
                }
            }
        }

        unreachable!("execution should end when main returns")
    }
}
