//! Function Table
//!
//! Translated functions keyed by name, with their declaration order and the
//! memoized inlining decision for each callee.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::compiler::ir::list::CodeList;

/// _IR_ function: a name and its instruction list.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub code: CodeList,
}

impl Function {
    /// Returns a new function whose list only contains its `FUNCTION` anchor.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            code: CodeList::with_function(name),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// Every function of a compilation unit.
#[derive(Debug, Default)]
pub struct Program {
    functions: BTreeMap<String, Function>,
    /// Function names in declaration order.
    order: Vec<String>,
    /// Memoized "is inlinable" decisions, filled in lazily per callee.
    inlinable: HashMap<String, bool>,
}

impl Program {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `func`, recording its declaration position.
    ///
    /// # Panics
    ///
    /// Panics if a function with the same name was already added.
    pub fn insert(&mut self, func: Function) {
        assert!(
            !self.functions.contains_key(&func.name),
            "function '{}' should only be defined once",
            func.name
        );

        self.order.push(func.name.clone());
        self.functions.insert(func.name.clone(), func);
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    #[inline]
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.get_mut(name)
    }

    /// Returns the functions ordered by name.
    #[inline]
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    /// Returns the functions ordered by name, mutably.
    #[inline]
    pub fn functions_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        self.functions.values_mut()
    }

    /// Returns the function names ordered by name.
    #[inline]
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    /// Returns the memoized inlining decision for `name`, if one was made.
    #[inline]
    #[must_use]
    pub fn inline_decision(&self, name: &str) -> Option<bool> {
        self.inlinable.get(name).copied()
    }

    /// Records the inlining decision for `name`.
    #[inline]
    pub fn set_inline_decision(&mut self, name: &str, inlinable: bool) {
        self.inlinable.insert(name.to_string(), inlinable);
    }

    /// Returns the functions handed to code generation: declaration order,
    /// without callees that were inlined at every call site.
    pub fn emitted(&self) -> impl Iterator<Item = &Function> {
        self.order
            .iter()
            .filter(|name| self.inline_decision(name) != Some(true))
            .filter_map(|name| self.functions.get(name))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, func) in self.emitted().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{func}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::instr::Instruction;
    use crate::compiler::ir::operand::Operand;

    fn func(name: &str) -> Function {
        let mut func = Function::new(name);
        let anchor = func.code.anchor();
        func.code
            .insert_after(anchor, Instruction::Return(Operand::constant(0)));
        func
    }

    #[test]
    fn program_emits_in_declaration_order() {
        let mut program = Program::new();
        program.insert(func("main"));
        program.insert(func("add"));
        program.insert(func("inc"));

        let names: Vec<_> = program.functions().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["add", "inc", "main"]);

        program.set_inline_decision("inc", true);
        program.set_inline_decision("add", false);

        let emitted: Vec<_> = program.emitted().map(|f| f.name.as_str()).collect();
        assert_eq!(emitted, ["main", "add"]);
    }

    #[test]
    fn program_dump() {
        let mut program = Program::new();
        program.insert(func("main"));
        program.insert(func("f"));

        assert_eq!(
            program.to_string(),
            "FUNCTION main :\nRETURN #0\n\nFUNCTION f :\nRETURN #0\n"
        );
    }

    #[test]
    #[should_panic(expected = "only be defined once")]
    fn program_rejects_duplicate_function() {
        let mut program = Program::new();
        program.insert(func("main"));
        program.insert(func("main"));
    }
}
