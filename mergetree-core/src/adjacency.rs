//! Mesh adjacency collaborators.

use rayon::prelude::*;

use crate::{MergeTreeError, Result};

/// Neighbour enumeration over the vertices of a mesh.
///
/// # Examples
/// ```
/// use mergetree_core::{Adjacency, AdjacencyGraph};
///
/// let graph = AdjacencyGraph::from_edges(3, [(0, 1), (1, 2)]).expect("edges are in bounds");
/// assert_eq!(graph.neighbour_count(1), 2);
/// assert_eq!(graph.neighbours(1).collect::<Vec<_>>(), vec![0, 2]);
/// ```
pub trait Adjacency {
    /// Returns the number of vertices in the mesh.
    fn vertex_count(&self) -> usize;

    /// Returns the number of neighbours of `vertex`.
    fn neighbour_count(&self, vertex: usize) -> usize;

    /// Returns the `index`-th neighbour of `vertex`.
    fn neighbour(&self, vertex: usize, index: usize) -> Option<usize>;

    /// Iterates over the neighbours of `vertex`.
    fn neighbours(&self, vertex: usize) -> Neighbours<'_, Self>
    where
        Self: Sized,
    {
        Neighbours {
            mesh: self,
            vertex,
            index: 0,
            count: self.neighbour_count(vertex),
        }
    }
}

/// Iterator over the neighbours of one vertex, returned by
/// [`Adjacency::neighbours`].
#[derive(Debug)]
pub struct Neighbours<'a, A> {
    mesh: &'a A,
    vertex: usize,
    index: usize,
    count: usize,
}

impl<A: Adjacency> Iterator for Neighbours<'_, A> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.count {
            let index = self.index;
            self.index += 1;
            if let Some(neighbour) = self.mesh.neighbour(self.vertex, index) {
                return Some(neighbour);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.count - self.index))
    }
}

/// Compressed sparse row adjacency built from an undirected edge list.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AdjacencyGraph {
    offsets: Vec<usize>,
    targets: Vec<usize>,
}

impl AdjacencyGraph {
    /// Builds a graph over `vertex_count` vertices.
    ///
    /// Every edge is stored in both directions. Self-loops and duplicate edges
    /// are dropped, and each neighbour list is sorted by vertex id.
    ///
    /// # Errors
    /// Returns [`MergeTreeError::NeighbourOutOfBounds`] when an edge endpoint
    /// is not below `vertex_count`.
    pub fn from_edges<I>(vertex_count: usize, edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut lists = vec![Vec::new(); vertex_count];
        for (left, right) in edges {
            for (vertex, neighbour) in [(left, right), (right, left)] {
                if vertex >= vertex_count || neighbour >= vertex_count {
                    return Err(MergeTreeError::NeighbourOutOfBounds {
                        vertex,
                        neighbour,
                        vertex_count,
                    });
                }
            }
            if left == right {
                continue;
            }
            lists[left].push(right);
            lists[right].push(left);
        }
        lists.par_iter_mut().for_each(|list| {
            list.sort_unstable();
            list.dedup();
        });

        let mut offsets = Vec::with_capacity(vertex_count + 1);
        offsets.push(0);
        let mut targets = Vec::with_capacity(lists.iter().map(Vec::len).sum());
        for list in lists {
            targets.extend(list);
            offsets.push(targets.len());
        }
        Ok(Self { offsets, targets })
    }

    /// Returns the neighbours of `vertex` as a slice.
    #[must_use]
    pub fn neighbour_slice(&self, vertex: usize) -> &[usize] {
        match (self.offsets.get(vertex), self.offsets.get(vertex + 1)) {
            (Some(&start), Some(&end)) => self.targets.get(start..end).unwrap_or(&[]),
            _ => &[],
        }
    }

    /// Returns the number of undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.targets.len() / 2
    }
}

impl Adjacency for AdjacencyGraph {
    fn vertex_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    fn neighbour_count(&self, vertex: usize) -> usize {
        self.neighbour_slice(vertex).len()
    }

    fn neighbour(&self, vertex: usize, index: usize) -> Option<usize> {
        self.neighbour_slice(vertex).get(index).copied()
    }
}

/// Checks that every neighbour `mesh` reports lies inside the mesh.
pub(crate) fn validate<M: Adjacency + Sync>(mesh: &M) -> Result<()> {
    let vertex_count = mesh.vertex_count();
    (0..vertex_count).into_par_iter().try_for_each(|vertex| {
        match mesh.neighbours(vertex).find(|&neighbour| neighbour >= vertex_count) {
            Some(neighbour) => Err(MergeTreeError::NeighbourOutOfBounds {
                vertex,
                neighbour,
                vertex_count,
            }),
            None => Ok(()),
        }
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn duplicate_edges_and_self_loops_are_dropped() {
        let graph = AdjacencyGraph::from_edges(3, [(0, 1), (1, 0), (2, 2), (1, 2), (0, 1)])
            .expect("edges are in bounds");
        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.neighbour_slice(0), &[1]);
        assert_eq!(graph.neighbour_slice(1), &[0, 2]);
        assert_eq!(graph.neighbour_slice(2), &[1]);
    }

    #[rstest]
    #[case((0, 3), 0, 3)]
    #[case((4, 1), 4, 1)]
    fn out_of_bounds_edges_are_rejected(
        #[case] edge: (usize, usize),
        #[case] vertex: usize,
        #[case] neighbour: usize,
    ) {
        let err = AdjacencyGraph::from_edges(3, [edge]).expect_err("edge is out of bounds");
        assert_eq!(
            err,
            MergeTreeError::NeighbourOutOfBounds {
                vertex,
                neighbour,
                vertex_count: 3,
            }
        );
    }

    #[rstest]
    fn isolated_vertices_have_no_neighbours() {
        let graph = AdjacencyGraph::from_edges(2, std::iter::empty()).expect("no edges");
        assert_eq!(graph.neighbour_count(0), 0);
        assert_eq!(graph.neighbours(1).count(), 0);
        assert_eq!(graph.neighbour(7, 0), None);
    }

    struct Broken;

    impl Adjacency for Broken {
        fn vertex_count(&self) -> usize {
            2
        }

        fn neighbour_count(&self, _vertex: usize) -> usize {
            1
        }

        fn neighbour(&self, vertex: usize, _index: usize) -> Option<usize> {
            Some(vertex + 1)
        }
    }

    #[rstest]
    fn validation_reports_the_first_bad_neighbour() {
        let err = validate(&Broken).expect_err("vertex 1 points outside the mesh");
        assert_eq!(
            err,
            MergeTreeError::NeighbourOutOfBounds {
                vertex: 1,
                neighbour: 2,
                vertex_count: 2,
            }
        );
    }
}
