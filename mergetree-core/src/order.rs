//! Scalar ordering collaborators.
//!
//! The engine never compares raw scalar values. It consumes a strict total
//! order over vertices through [`ScalarOrder`] and maps it to sweep positions
//! for the chosen [`TreeType`].

use rayon::prelude::*;

use crate::{MergeTreeError, Result, TreeType};

/// Strict total order over the vertices of a mesh.
///
/// Implementations expose the ascending permutation and its inverse; ties are
/// not permitted, so every vertex has a distinct rank.
///
/// # Examples
/// ```
/// use mergetree_core::{ScalarField, ScalarOrder};
///
/// let field = ScalarField::new(vec![2.0, 0.5, 1.0]).expect("values are finite");
/// assert_eq!(field.sorted_vertices(), &[1, 2, 0]);
/// assert_eq!(field.rank(0), Some(2));
/// assert!(field.is_lower(1, 0));
/// ```
pub trait ScalarOrder {
    /// Returns the number of ordered vertices.
    fn len(&self) -> usize;

    /// Returns `true` when no vertex is ordered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the vertices in ascending scalar order.
    fn sorted_vertices(&self) -> &[usize];

    /// Returns the ascending rank of `vertex`, or `None` when it is out of
    /// bounds.
    fn rank(&self, vertex: usize) -> Option<usize>;

    /// Returns `true` when `left` precedes `right` in ascending order.
    fn is_lower(&self, left: usize, right: usize) -> bool {
        matches!(
            (self.rank(left), self.rank(right)),
            (Some(left), Some(right)) if left < right
        )
    }

    /// Returns `true` when `left` follows `right` in ascending order.
    fn is_higher(&self, left: usize, right: usize) -> bool {
        self.is_lower(right, left)
    }
}

/// A scalar field backed by `f64` values.
///
/// Equal values are ordered by vertex id (simulation of simplicity), which
/// makes the order strict.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarField {
    values: Vec<f64>,
    sorted: Vec<usize>,
    ranks: Vec<usize>,
}

impl ScalarField {
    /// Builds the order from per-vertex values.
    ///
    /// # Errors
    /// Returns [`MergeTreeError::NonFiniteScalar`] when a value is NaN or
    /// infinite.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if let Some(vertex) = values.iter().position(|value| !value.is_finite()) {
            return Err(MergeTreeError::NonFiniteScalar { vertex });
        }
        let mut sorted: Vec<usize> = (0..values.len()).collect();
        sorted.par_sort_unstable_by(|&left, &right| {
            values[left]
                .total_cmp(&values[right])
                .then(left.cmp(&right))
        });
        let ranks = invert(&sorted)?;
        Ok(Self {
            values,
            sorted,
            ranks,
        })
    }

    /// Builds the order from an explicit ascending permutation.
    ///
    /// Each vertex's value is its rank.
    ///
    /// # Errors
    /// Returns [`MergeTreeError::InvalidPermutation`] when `sorted` is not a
    /// permutation of `0..sorted.len()`.
    ///
    /// # Examples
    /// ```
    /// use mergetree_core::{ScalarField, ScalarOrder};
    ///
    /// let field = ScalarField::from_permutation(vec![2, 0, 1]).expect("valid permutation");
    /// assert_eq!(field.rank(2), Some(0));
    /// assert_eq!(field.value(1), Some(2.0));
    /// ```
    pub fn from_permutation(sorted: Vec<usize>) -> Result<Self> {
        let ranks = invert(&sorted)?;
        #[expect(
            clippy::cast_precision_loss,
            reason = "ranks stand in for values and only their order matters"
        )]
        let values = ranks.iter().map(|&rank| rank as f64).collect();
        Ok(Self {
            values,
            sorted,
            ranks,
        })
    }

    /// Returns the scalar value of `vertex`.
    #[must_use]
    pub fn value(&self, vertex: usize) -> Option<f64> {
        self.values.get(vertex).copied()
    }

    /// Returns all values indexed by vertex id.
    #[must_use]
    #[rustfmt::skip]
    pub fn values(&self) -> &[f64] { &self.values }
}

impl ScalarOrder for ScalarField {
    fn len(&self) -> usize {
        self.values.len()
    }

    fn sorted_vertices(&self) -> &[usize] {
        &self.sorted
    }

    fn rank(&self, vertex: usize) -> Option<usize> {
        self.ranks.get(vertex).copied()
    }
}

fn invert(sorted: &[usize]) -> Result<Vec<usize>> {
    const UNSEEN: usize = usize::MAX;
    let mut ranks = vec![UNSEEN; sorted.len()];
    for (rank, &vertex) in sorted.iter().enumerate() {
        let slot = ranks
            .get_mut(vertex)
            .ok_or(MergeTreeError::InvalidPermutation {
                reason: "vertex id exceeds the permutation length",
            })?;
        if *slot != UNSEEN {
            return Err(MergeTreeError::InvalidPermutation {
                reason: "vertex appears twice",
            });
        }
        *slot = rank;
    }
    Ok(ranks)
}

/// Sweep positions for one orientation.
///
/// Position 0 is the first vertex the sweep meets (the global minimum for a
/// join tree, the global maximum for a split tree).
#[derive(Clone, Debug)]
pub(crate) struct Sweep {
    positions: Vec<usize>,
    by_position: Vec<usize>,
}

impl Sweep {
    /// Derives sweep positions from `order`, checking that its permutation and
    /// rank lookup agree.
    pub(crate) fn new<O: ScalarOrder + Sync + ?Sized>(order: &O, tree_type: TreeType) -> Result<Self> {
        let sorted = order.sorted_vertices();
        let len = order.len();
        if sorted.len() != len {
            return Err(MergeTreeError::InvalidPermutation {
                reason: "sorted permutation length differs from the vertex count",
            });
        }
        if sorted.par_iter().any(|&vertex| vertex >= len) {
            return Err(MergeTreeError::InvalidPermutation {
                reason: "vertex id exceeds the vertex count",
            });
        }
        let consistent = sorted
            .par_iter()
            .enumerate()
            .all(|(rank, &vertex)| order.rank(vertex) == Some(rank));
        if !consistent {
            return Err(MergeTreeError::InvalidPermutation {
                reason: "rank lookup disagrees with the sorted permutation",
            });
        }

        let by_position: Vec<usize> = match tree_type {
            TreeType::Join => sorted.to_vec(),
            TreeType::Split => sorted.iter().rev().copied().collect(),
        };
        let mut positions = vec![0; len];
        for (position, &vertex) in by_position.iter().enumerate() {
            positions[vertex] = position;
        }
        Ok(Self {
            positions,
            by_position,
        })
    }

    #[rustfmt::skip]
    pub(crate) fn len(&self) -> usize { self.by_position.len() }

    /// Sweep position of an in-bounds vertex.
    #[rustfmt::skip]
    pub(crate) fn position(&self, vertex: usize) -> usize { self.positions[vertex] }

    /// Vertex at an in-bounds sweep position.
    #[rustfmt::skip]
    pub(crate) fn vertex_at(&self, position: usize) -> usize { self.by_position[position] }

    /// The last vertex the sweep meets.
    pub(crate) fn extremum(&self) -> Option<usize> {
        self.by_position.last().copied()
    }

    pub(crate) fn into_positions(self) -> Vec<usize> {
        self.positions
    }
}
