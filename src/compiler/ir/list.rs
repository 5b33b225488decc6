//! Instruction Lists
//!
//! Arena-backed circular doubly-linked lists of _IR_ instructions. Every node
//! is addressed by a [`CodeId`] handle carrying a generation, so a handle to a
//! removed node can never be dereferenced again: any access through it panics.
//!
//! A [`CodeList`] owns one function's instructions. Detached rings (fragments
//! produced during translation or copied from another function) live in the
//! same arena until they are spliced into the main ring.

use std::fmt;

use crate::compiler::ir::instr::Instruction;

/// Stable handle to a node of a [`CodeList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeId {
    index: u32,
    generation: u32,
}

/// Neighbor to return after removing a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toward {
    Next,
    Prev,
}

#[derive(Debug)]
struct Node {
    code: Instruction,
    prev: CodeId,
    next: CodeId,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Circular instruction list for one function, anchored at its `FUNCTION`
/// instruction.
#[derive(Debug, Default)]
pub struct CodeList {
    slots: Vec<Slot>,
    /// Indices of freed slots available for reuse.
    free: Vec<u32>,
    anchor: Option<CodeId>,
}

impl CodeList {
    /// Returns a new list with no anchor.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new list containing only the `FUNCTION` anchor for `name`.
    #[must_use]
    pub fn with_function(name: &str) -> Self {
        let mut list = Self::new();
        let anchor = list.alloc(Instruction::Function(name.to_string()));
        list.set_anchor(anchor);
        list
    }

    /// Returns a new list for function `name` followed by `body`, in order.
    #[must_use]
    pub fn with_body(name: &str, body: impl IntoIterator<Item = Instruction>) -> Self {
        let mut list = Self::with_function(name);
        let mut at = list.anchor();

        for code in body {
            at = list.insert_after(at, code);
        }

        list
    }

    /// Allocates `code` as a detached ring of one node.
    pub fn alloc(&mut self, code: Instruction) -> CodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            let id = CodeId {
                index,
                generation: slot.generation,
            };

            slot.node = Some(Node {
                code,
                prev: id,
                next: id,
            });

            return id;
        }

        let id = CodeId {
            index: u32::try_from(self.slots.len()).expect("instruction count should fit in u32"),
            generation: 0,
        };

        self.slots.push(Slot {
            generation: 0,
            node: Some(Node {
                code,
                prev: id,
                next: id,
            }),
        });

        id
    }

    /// Designates `id` as the anchor of the list.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a live `FUNCTION` instruction.
    pub fn set_anchor(&mut self, id: CodeId) {
        assert!(
            matches!(self.get(id), Instruction::Function(_)),
            "list anchor must be a FUNCTION instruction"
        );
        self.anchor = Some(id);
    }

    /// Returns the `FUNCTION` anchor of the list.
    ///
    /// # Panics
    ///
    /// Panics if no anchor was set.
    #[inline]
    #[must_use]
    pub fn anchor(&self) -> CodeId {
        self.anchor.expect("instruction list should have a FUNCTION anchor")
    }

    fn node(&self, id: CodeId) -> &Node {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .expect("instruction handle should refer to a live node")
    }

    fn node_mut(&mut self, id: CodeId) -> &mut Node {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .expect("instruction handle should refer to a live node")
    }

    /// Returns `true` if `id` refers to a node that has not been removed.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: CodeId) -> bool {
        self.slots
            .get(id.index as usize)
            .is_some_and(|slot| slot.generation == id.generation && slot.node.is_some())
    }

    /// Returns the instruction at `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was removed.
    #[inline]
    #[must_use]
    pub fn get(&self, id: CodeId) -> &Instruction {
        &self.node(id).code
    }

    /// Returns the instruction at `id` mutably.
    ///
    /// # Panics
    ///
    /// Panics if `id` was removed.
    #[inline]
    pub fn get_mut(&mut self, id: CodeId) -> &mut Instruction {
        &mut self.node_mut(id).code
    }

    /// Replaces the instruction at `id`, keeping its position.
    #[inline]
    pub fn replace(&mut self, id: CodeId, code: Instruction) -> Instruction {
        std::mem::replace(self.get_mut(id), code)
    }

    #[inline]
    #[must_use]
    pub fn next(&self, id: CodeId) -> CodeId {
        self.node(id).next
    }

    #[inline]
    #[must_use]
    pub fn prev(&self, id: CodeId) -> CodeId {
        self.node(id).prev
    }

    /// Inserts the ring starting at `sub` immediately after `at`, preserving
    /// the ring's order.
    ///
    /// NOTE: O(1) time complexity.
    pub fn splice_after(&mut self, at: CodeId, sub: CodeId) {
        let after = self.next(at);
        let sub_last = self.prev(sub);

        self.node_mut(at).next = sub;
        self.node_mut(sub).prev = at;
        self.node_mut(sub_last).next = after;
        self.node_mut(after).prev = sub_last;
    }

    /// Allocates `code` and inserts it immediately after `at`.
    pub fn insert_after(&mut self, at: CodeId, code: Instruction) -> CodeId {
        let id = self.alloc(code);
        self.splice_after(at, id);
        id
    }

    /// Joins two detached rings, returning the head of the result (`a` if
    /// present). Either side may be absent.
    ///
    /// NOTE: O(1) time complexity.
    pub fn concat(&mut self, a: Option<CodeId>, b: Option<CodeId>) -> Option<CodeId> {
        let (a, b) = match (a, b) {
            (Some(a), Some(b)) => (a, b),
            (a, b) => return a.or(b),
        };

        let a_last = self.prev(a);
        let b_last = self.prev(b);

        self.node_mut(a_last).next = b;
        self.node_mut(b).prev = a_last;
        self.node_mut(b_last).next = a;
        self.node_mut(a).prev = b_last;

        Some(a)
    }

    /// Unlinks and frees the node `id`, returning its neighbor in the
    /// requested direction.
    ///
    /// NOTE: O(1) time complexity.
    ///
    /// # Panics
    ///
    /// Panics if `id` is the list anchor or the only node of its ring.
    pub fn remove(&mut self, id: CodeId, toward: Toward) -> CodeId {
        assert!(
            self.anchor != Some(id),
            "the FUNCTION anchor must not be removed from its list"
        );

        let Node { prev, next, .. } = *self.node(id);
        assert!(next != id, "the sole node of a ring must not be removed");

        self.node_mut(prev).next = next;
        self.node_mut(next).prev = prev;

        let slot = &mut self.slots[id.index as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        match toward {
            Toward::Next => next,
            Toward::Prev => prev,
        }
    }

    /// Returns the handles of the ring starting at `start`, in order.
    pub fn ring(&self, start: CodeId) -> impl Iterator<Item = CodeId> + '_ {
        let mut at = Some(start);

        std::iter::from_fn(move || {
            let current = at?;
            let next = self.next(current);
            at = (next != start).then_some(next);
            Some(current)
        })
    }

    /// Returns the handles of the main ring, starting at the anchor.
    #[inline]
    pub fn ids(&self) -> impl Iterator<Item = CodeId> + '_ {
        self.ring(self.anchor())
    }

    /// Returns the instructions of the main ring, starting at the anchor.
    #[inline]
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.ids().map(|id| self.get(id))
    }

    /// Returns the number of instructions in the main ring.
    ///
    /// NOTE: O(n) time complexity.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids().count()
    }

    /// Always `false` once an anchor is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchor.is_none()
    }

    /// Returns a cursor positioned at the anchor, moving forward.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.anchor(), Toward::Next)
    }

    /// Returns a cursor positioned at the anchor, moving backward.
    #[inline]
    #[must_use]
    pub fn cursor_back(&self) -> Cursor {
        Cursor::new(self.anchor(), Toward::Prev)
    }
}

impl fmt::Display for CodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for inst in self.instructions() {
            writeln!(f, "{inst}")?;
        }

        Ok(())
    }
}

/// Traversal position within a [`CodeList`].
///
/// Removing through the cursor repositions it on the neighbor behind the
/// removed node, so the next [`Cursor::advance`] visits the node that followed
/// it. The cursor never holds a handle to a removed node.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    at: CodeId,
    anchor: CodeId,
    dir: Toward,
}

impl Cursor {
    const fn new(anchor: CodeId, dir: Toward) -> Self {
        Self {
            at: anchor,
            anchor,
            dir,
        }
    }

    /// Returns the current position.
    #[inline]
    #[must_use]
    pub const fn at(&self) -> CodeId {
        self.at
    }

    /// Moves one node in the cursor's direction, returning the new position,
    /// or `None` once the traversal is back at the anchor.
    pub fn advance(&mut self, list: &CodeList) -> Option<CodeId> {
        self.at = match self.dir {
            Toward::Next => list.next(self.at),
            Toward::Prev => list.prev(self.at),
        };

        (self.at != self.anchor).then_some(self.at)
    }

    /// Removes the current node; the next call to [`Cursor::advance`] yields
    /// the node that followed it.
    pub fn remove(&mut self, list: &mut CodeList) {
        let behind = match self.dir {
            Toward::Next => Toward::Prev,
            Toward::Prev => Toward::Next,
        };

        self.at = list.remove(self.at, behind);
    }
}
