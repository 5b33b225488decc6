//! Middle end for a small _C_-like language (integers and integer arrays).
//!
//! Lowers a validated syntax tree into three-address code (_TAC_), then
//! rewrites it in place until a fixed point is reached.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::use_self)]
#![allow(clippy::redundant_else)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::module_name_repetitions)]
#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]

pub mod compiler;
pub mod error;

pub use error::{ExecError, TranslateError};

pub type Result<T, E = TranslateError> = std::result::Result<T, E>;
