//! Errors reported while translating or executing _IR_.

use thiserror::Error;

/// Feature-rejection errors raised while lowering a syntax tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("cannot translate: code contains variables or parameters of structure type")]
    Record,
    #[error("cannot translate: code contains variables or parameters of float type")]
    Float,
    #[error("cannot translate: code contains too many function arguments ({count} > {max})")]
    TooManyArgs { count: usize, max: usize },
}

/// Runtime errors raised by the _IR_ interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("call to undefined function '{0}'")]
    UnknownFunction(String),
    #[error("jump to undefined label{label} in '{func}'")]
    MissingLabel { func: String, label: u32 },
    #[error("READ with no remaining input")]
    InputExhausted,
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid memory address {0}")]
    BadAddress(i64),
    #[error("step limit of {0} instructions exceeded")]
    StepLimit(usize),
    #[error("PARAM with no pending argument in '{0}'")]
    MissingArgument(String),
}
