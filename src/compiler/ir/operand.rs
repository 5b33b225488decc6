//! Operands
//!
//! Values referenced by three-address instructions.

use std::fmt;

use crate::compiler::ir::shape::ShapeId;

/// What an operand denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperandKind {
    /// Absence of an operand (unused source, discarded result).
    #[default]
    Empty,
    /// Signed integer literal.
    Const(i32),
    /// Source-level variable (1-based index).
    Var(u32),
    /// Compiler-generated temporary (1-based index).
    Temp(u32),
}

/// Whether an operand holds an address rather than a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddrKind {
    #[default]
    Value,
    /// Address of a scalar array element.
    Element,
    /// Address of a sub-array that is not fully indexed yet.
    Range,
}

/// _IR_ operand.
///
/// Equality compares only the [`OperandKind`]; address flags and shape are
/// translation-time annotations that do not change which slot is named.
#[derive(Debug, Clone, Copy, Default)]
pub struct Operand {
    pub kind: OperandKind,
    pub addr: AddrKind,
    /// Dimension currently being indexed when the operand is an array address.
    pub shape: Option<ShapeId>,
}

impl PartialEq for Operand {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Operand {}

impl From<OperandKind> for Operand {
    fn from(kind: OperandKind) -> Self {
        Self {
            kind,
            addr: AddrKind::Value,
            shape: None,
        }
    }
}

impl Operand {
    /// The empty operand.
    pub const EMPTY: Operand = Operand {
        kind: OperandKind::Empty,
        addr: AddrKind::Value,
        shape: None,
    };

    #[inline]
    #[must_use]
    pub fn constant(value: i32) -> Self {
        OperandKind::Const(value).into()
    }

    #[inline]
    #[must_use]
    pub fn var(index: u32) -> Self {
        OperandKind::Var(index).into()
    }

    #[inline]
    #[must_use]
    pub fn temp(index: u32) -> Self {
        OperandKind::Temp(index).into()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self.kind, OperandKind::Empty)
    }

    #[inline]
    #[must_use]
    pub const fn is_const(&self) -> bool {
        matches!(self.kind, OperandKind::Const(_))
    }

    #[inline]
    #[must_use]
    pub const fn as_const(&self) -> Option<i32> {
        match self.kind {
            OperandKind::Const(value) => Some(value),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_var(&self) -> bool {
        matches!(self.kind, OperandKind::Var(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_temp(&self) -> bool {
        matches!(self.kind, OperandKind::Temp(_))
    }

    /// Returns `true` if the operand names a storage slot (variable or
    /// temporary).
    #[inline]
    #[must_use]
    pub const fn is_slot(&self) -> bool {
        matches!(self.kind, OperandKind::Var(_) | OperandKind::Temp(_))
    }

    /// Returns the same operand with its address flags cleared.
    #[inline]
    #[must_use]
    pub const fn plain(self) -> Self {
        Self {
            kind: self.kind,
            addr: AddrKind::Value,
            shape: None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OperandKind::Empty => Ok(()),
            OperandKind::Const(value) => write!(f, "#{value}"),
            OperandKind::Var(index) => write!(f, "v{index}"),
            OperandKind::Temp(index) => write!(f, "t{index}"),
        }
    }
}

/// Flat index space over every variable and temporary, used to size
/// per-slot analysis tables.
///
/// Variables occupy `1..=vars`, temporaries follow at `vars + 1..=vars + temps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpace {
    pub vars: u32,
    pub temps: u32,
}

impl SlotSpace {
    /// Returns the table index of `opr`, or `None` for constants and empty
    /// operands.
    #[inline]
    #[must_use]
    pub const fn index(&self, opr: &Operand) -> Option<usize> {
        match opr.kind {
            OperandKind::Var(index) => Some(index as usize),
            OperandKind::Temp(index) => Some((self.vars + index) as usize),
            OperandKind::Const(_) | OperandKind::Empty => None,
        }
    }

    /// Returns the table index of a variable or temporary.
    ///
    /// # Panics
    ///
    /// Panics if `opr` is a constant or empty.
    #[inline]
    #[must_use]
    pub fn slot(&self, opr: &Operand) -> usize {
        self.index(opr)
            .unwrap_or_else(|| panic!("operand '{opr}' should be a variable or temporary"))
    }

    /// Returns the number of table entries needed (index `0` is unused).
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        (self.vars + self.temps + 1) as usize
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.vars + self.temps == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_equality_ignores_annotations() {
        let plain = Operand::var(3);
        let flagged = Operand {
            addr: AddrKind::Range,
            ..Operand::var(3)
        };

        assert_eq!(plain, flagged);
        assert_ne!(Operand::var(3), Operand::temp(3));
        assert_eq!(Operand::constant(-2), Operand::constant(-2));
        assert_ne!(Operand::constant(1), Operand::constant(2));
    }

    #[test]
    fn operand_display() {
        assert_eq!(Operand::constant(5).to_string(), "#5");
        assert_eq!(Operand::var(1).to_string(), "v1");
        assert_eq!(Operand::temp(12).to_string(), "t12");
        assert_eq!(Operand::EMPTY.to_string(), "");
    }

    #[test]
    fn slot_space_offsets_temps_past_vars() {
        let space = SlotSpace { vars: 4, temps: 2 };

        assert_eq!(space.index(&Operand::var(4)), Some(4));
        assert_eq!(space.index(&Operand::temp(1)), Some(5));
        assert_eq!(space.index(&Operand::temp(2)), Some(6));
        assert_eq!(space.index(&Operand::constant(9)), None);
        assert_eq!(space.len(), 7);
    }
}
