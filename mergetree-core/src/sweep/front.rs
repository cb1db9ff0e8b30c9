//! Pending-vertex fronts.

use std::{cmp::Reverse, collections::BinaryHeap};

/// Vertices awaiting visitation by one growth front, ordered by sweep
/// position so the lowest pending vertex comes out first.
#[derive(Clone, Debug, Default)]
pub(crate) struct PendingFront {
    heap: BinaryHeap<Reverse<(usize, usize)>>,
}

impl PendingFront {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, position: usize, vertex: usize) {
        self.heap.push(Reverse((position, vertex)));
    }

    /// Removes and returns the vertex with the lowest sweep position.
    pub(crate) fn pop(&mut self) -> Option<usize> {
        self.heap.pop().map(|Reverse((_, vertex))| vertex)
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    /// Moves every vertex of `other` into this front.
    pub(crate) fn absorb(&mut self, mut other: Self) {
        if other.heap.len() > self.heap.len() {
            std::mem::swap(&mut self.heap, &mut other.heap);
        }
        self.heap.append(&mut other.heap);
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn pops_in_sweep_order() {
        let mut front = PendingFront::new();
        for (position, vertex) in [(4, 40), (1, 10), (3, 30), (2, 20)] {
            front.push(position, vertex);
        }
        let popped: Vec<usize> = std::iter::from_fn(|| front.pop()).collect();
        assert_eq!(popped, vec![10, 20, 30, 40]);
        assert_eq!(front.pop(), None);
    }

    #[rstest]
    #[case(1, 5)]
    #[case(5, 1)]
    fn absorb_keeps_every_vertex(#[case] left: usize, #[case] right: usize) {
        let mut first = PendingFront::new();
        for position in 0..left {
            first.push(position * 2, position * 2);
        }
        let mut second = PendingFront::new();
        for position in 0..right {
            second.push(position * 2 + 1, position * 2 + 1);
        }
        first.absorb(second);
        assert_eq!(first.len(), left + right);
        let popped: Vec<usize> = std::iter::from_fn(|| first.pop()).collect();
        let mut expected = popped.clone();
        expected.sort_unstable();
        assert_eq!(popped, expected);
    }
}
