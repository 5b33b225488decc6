//! Intermediate Representation
//!
//! Three-address code (_TAC_) model: operands, array shapes, instructions,
//! per-function instruction lists and the function table, plus the pass that
//! lowers a syntax tree into it.

pub mod instr;
pub mod list;
pub mod operand;
pub mod program;
pub mod shape;
pub mod translate;

pub use instr::{AssignOp, Instruction, RelOp};
pub use list::{CodeId, CodeList, Cursor, Toward};
pub use operand::{AddrKind, Operand, OperandKind, SlotSpace};
pub use program::{Function, Program};
pub use shape::{ELEMENT_SIZE, ShapeArena, ShapeId};
pub use translate::translate;
