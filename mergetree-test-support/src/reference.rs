//! Sequential reference sweep.
//!
//! Processes vertices one at a time in sweep order with a plain disjoint-set
//! forest. The result identifies nodes and arcs by mesh vertex so it can be
//! compared with any tree built over the same input.

use std::collections::BTreeSet;

/// Topology computed by [`sweep`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceTree {
    /// Critical vertices.
    pub nodes: BTreeSet<usize>,
    /// Vertices with no earlier neighbour.
    pub leaves: BTreeSet<usize>,
    /// Last vertex of each connected component.
    pub roots: BTreeSet<usize>,
    /// Arcs as `(down vertex, up vertex)`.
    pub arcs: BTreeSet<(usize, usize)>,
    /// For each non-critical vertex, the down vertex of its arc.
    pub arc_of: Vec<Option<usize>>,
}

/// Sweeps `order` (every vertex exactly once) over `neighbours`.
///
/// # Examples
/// ```
/// use mergetree_test_support::{meshes::diamond, reference::sweep};
///
/// let mesh = diamond();
/// let tree = sweep(&mesh.neighbour_lists(), &mesh.ascending());
/// assert_eq!(tree.leaves.len(), 2);
/// assert_eq!(tree.arcs.len(), 3);
/// assert_eq!(tree.arc_of[6], Some(2));
/// ```
#[must_use]
pub fn sweep(neighbours: &[Vec<usize>], order: &[usize]) -> ReferenceTree {
    let vertex_count = neighbours.len();
    let mut forest = Forest::new(vertex_count);
    let mut processed = vec![false; vertex_count];
    // per component root: the node its current arc starts from and the last
    // vertex it absorbed
    let mut head = vec![usize::MAX; vertex_count];
    let mut last = vec![usize::MAX; vertex_count];
    let mut tree = ReferenceTree {
        arc_of: vec![None; vertex_count],
        ..ReferenceTree::default()
    };

    for &vertex in order {
        let mut below: Vec<usize> = neighbours[vertex]
            .iter()
            .filter(|&&neighbour| processed[neighbour])
            .map(|&neighbour| forest.find(neighbour))
            .collect();
        below.sort_unstable();
        below.dedup();

        let start = match below.as_slice() {
            [] => {
                tree.nodes.insert(vertex);
                tree.leaves.insert(vertex);
                vertex
            }
            &[component] => {
                tree.arc_of[vertex] = Some(head[component]);
                head[component]
            }
            components => {
                tree.nodes.insert(vertex);
                for &component in components {
                    tree.arcs.insert((head[component], vertex));
                }
                vertex
            }
        };

        processed[vertex] = true;
        let mut root = vertex;
        for component in below {
            root = forest.union(root, component);
        }
        head[root] = start;
        last[root] = vertex;
    }

    for vertex in 0..vertex_count {
        if forest.find(vertex) != vertex {
            continue;
        }
        let (start, end) = (head[vertex], last[vertex]);
        if start != end {
            tree.arcs.insert((start, end));
            tree.nodes.insert(end);
            tree.arc_of[end] = None;
        }
        tree.roots.insert(end);
    }
    tree
}

struct Forest {
    parents: Vec<usize>,
}

impl Forest {
    fn new(size: usize) -> Self {
        Self {
            parents: (0..size).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parents[node] != node {
            self.parents[node] = self.parents[self.parents[node]];
            node = self.parents[node];
        }
        node
    }

    fn union(&mut self, left: usize, right: usize) -> usize {
        let left = self.find(left);
        let right = self.find(right);
        self.parents[right] = left;
        left
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::meshes::{MeshFixture, path};

    #[rstest]
    fn path_has_one_arc() {
        let mesh = path(5);
        let tree = sweep(&mesh.neighbour_lists(), &mesh.ascending());
        assert_eq!(tree.leaves, BTreeSet::from([0]));
        assert_eq!(tree.roots, BTreeSet::from([4]));
        assert_eq!(tree.arcs, BTreeSet::from([(0, 4)]));
        assert_eq!(tree.arc_of, vec![None, Some(0), Some(0), Some(0), None]);
    }

    #[rstest]
    fn isolated_vertices_are_leaf_and_root() {
        let mesh = MeshFixture {
            vertex_count: 2,
            edges: Vec::new(),
            values: vec![1.0, 0.0],
        };
        let tree = sweep(&mesh.neighbour_lists(), &mesh.ascending());
        assert_eq!(tree.leaves, BTreeSet::from([0, 1]));
        assert_eq!(tree.roots, BTreeSet::from([0, 1]));
        assert!(tree.arcs.is_empty());
    }

    #[rstest]
    fn descending_order_builds_the_split_tree() {
        let mesh = path(4);
        let mut order = mesh.ascending();
        order.reverse();
        let tree = sweep(&mesh.neighbour_lists(), &order);
        assert_eq!(tree.leaves, BTreeSet::from([3]));
        assert_eq!(tree.roots, BTreeSet::from([0]));
        assert_eq!(tree.arcs, BTreeSet::from([(3, 0)]));
    }
}
