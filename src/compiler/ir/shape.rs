//! Array Shapes
//!
//! Per-array dimension rings used to lower indexing into explicit address
//! arithmetic. A ring holds one node per dimension; the node an operand points
//! at is the dimension currently being indexed, and stepping to `next` moves
//! one dimension inward until the innermost (tail) node is reached.

use id_arena::{Arena, Id};

/// Byte size of the only scalar type (`int`).
pub const ELEMENT_SIZE: u32 = 4;

/// Handle to a dimension node.
pub type ShapeId = Id<Dim>;

/// One dimension of a declared array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dim {
    /// Index of the variable that owns the ring.
    pub var: u32,
    /// Number of elements in this dimension.
    pub count: u32,
    /// Byte distance between two consecutive elements of this dimension
    /// (product of all inner counts times [`ELEMENT_SIZE`]).
    pub stride: u32,
    is_tail: bool,
    next: ShapeId,
    prev: ShapeId,
}

/// Owns every dimension node allocated during a compilation.
#[derive(Debug, Default)]
pub struct ShapeArena {
    dims: Arena<Dim>,
}

impl ShapeArena {
    /// Returns a new, empty arena.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the ring for an array declared with `counts` (outermost
    /// dimension first), returning its outermost node.
    ///
    /// # Panics
    ///
    /// Panics if `counts` is empty.
    pub fn declare(&mut self, var: u32, counts: &[u32]) -> ShapeId {
        let (&innermost, outer) = counts
            .split_last()
            .expect("array declaration should have at least one dimension");

        let mut head = self.tail(var, innermost);

        for &count in outer.iter().rev() {
            head = self.push_outer(head, count);
        }

        head
    }

    /// Allocates the innermost dimension as a ring of one node.
    fn tail(&mut self, var: u32, count: u32) -> ShapeId {
        let id = self.dims.next_id();

        self.dims.alloc(Dim {
            var,
            count,
            stride: ELEMENT_SIZE,
            is_tail: true,
            next: id,
            prev: id,
        })
    }

    /// Inserts a new dimension in front of `head`, returning the new head.
    ///
    /// The stride of the new node covers one whole element of `head`.
    fn push_outer(&mut self, head: ShapeId, count: u32) -> ShapeId {
        let inner = &self.dims[head];
        let (var, stride, last) = (inner.var, inner.count * inner.stride, inner.prev);

        let id = self.dims.alloc(Dim {
            var,
            count,
            stride,
            is_tail: false,
            next: head,
            prev: last,
        });

        self.dims[last].next = id;
        self.dims[head].prev = id;

        id
    }

    /// Returns the dimension node for `id`.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ShapeId) -> &Dim {
        &self.dims[id]
    }

    /// Returns the next inner dimension (wrapping from the tail to the
    /// outermost node).
    #[inline]
    #[must_use]
    pub fn next(&self, id: ShapeId) -> ShapeId {
        self.dims[id].next
    }

    /// Returns the next outer dimension (wrapping from the outermost node to
    /// the tail).
    #[cfg(test)]
    pub fn prev(&self, id: ShapeId) -> ShapeId {
        self.dims[id].prev
    }

    /// Returns `true` if `id` is the innermost dimension, so indexing it
    /// yields the address of a scalar element.
    #[inline]
    #[must_use]
    pub fn is_tail(&self, id: ShapeId) -> bool {
        self.dims[id].is_tail
    }

    /// Returns the byte size of the sub-array described by `id` and every
    /// dimension inside it.
    #[inline]
    #[must_use]
    pub fn byte_size(&self, id: ShapeId) -> u32 {
        let dim = &self.dims[id];
        dim.count * dim.stride
    }

    /// Returns the nodes of the ring starting at `id`, following `next` until
    /// the ring wraps.
    pub fn ring(&self, id: ShapeId) -> impl Iterator<Item = ShapeId> + '_ {
        let mut at = Some(id);

        std::iter::from_fn(move || {
            let current = at?;
            let next = self.next(current);
            at = (next != id).then_some(next);
            Some(current)
        })
    }
}
