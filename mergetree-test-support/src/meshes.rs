//! Mesh fixtures expressed as plain edge lists and scalar values.

use rand::{Rng, SeedableRng, rngs::SmallRng};

/// A mesh and scalar field pair small enough to reason about by hand.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshFixture {
    /// Number of vertices.
    pub vertex_count: usize,
    /// Undirected edges.
    pub edges: Vec<(usize, usize)>,
    /// One scalar value per vertex.
    pub values: Vec<f64>,
}

impl MeshFixture {
    /// Per-vertex neighbour lists built from the edges, sorted and without
    /// self-loops or duplicates.
    #[must_use]
    pub fn neighbour_lists(&self) -> Vec<Vec<usize>> {
        let mut lists = vec![Vec::new(); self.vertex_count];
        for &(left, right) in &self.edges {
            if left != right {
                lists[left].push(right);
                lists[right].push(left);
            }
        }
        for list in &mut lists {
            list.sort_unstable();
            list.dedup();
        }
        lists
    }

    /// Vertices in ascending value order, ties broken by vertex id.
    #[must_use]
    pub fn ascending(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.vertex_count).collect();
        order.sort_by(|&left, &right| {
            self.values[left]
                .total_cmp(&self.values[right])
                .then(left.cmp(&right))
        });
        order
    }
}

/// A path `0 - 1 - ... - n-1` with values `0..n`.
///
/// # Examples
/// ```
/// use mergetree_test_support::meshes::path;
///
/// let mesh = path(5);
/// assert_eq!(mesh.edges.len(), 4);
/// assert_eq!(mesh.values[4], 4.0);
/// ```
#[must_use]
pub fn path(vertex_count: usize) -> MeshFixture {
    MeshFixture {
        vertex_count,
        edges: (1..vertex_count).map(|vertex| (vertex - 1, vertex)).collect(),
        values: (0..vertex_count).map(|vertex| vertex as f64).collect(),
    }
}

/// Two rising branches that merge at one saddle and continue to one maximum.
///
/// Minima 0 and 1 climb through 4 and 5 to the saddle 2, which climbs
/// through 6 to the maximum 3.
#[must_use]
pub fn diamond() -> MeshFixture {
    MeshFixture {
        vertex_count: 7,
        edges: vec![(0, 4), (4, 2), (1, 5), (5, 2), (2, 6), (6, 3)],
        values: vec![0.0, 0.5, 2.0, 3.0, 1.0, 1.5, 2.5],
    }
}

/// Edges of a `width` by `height` grid in row-major vertex order.
///
/// With `triangulated` set each cell also gets its down-right diagonal.
#[must_use]
pub fn grid_edges(width: usize, height: usize, triangulated: bool) -> Vec<(usize, usize)> {
    let mut edges = Vec::new();
    for row in 0..height {
        for column in 0..width {
            let vertex = row * width + column;
            if column + 1 < width {
                edges.push((vertex, vertex + 1));
            }
            if row + 1 < height {
                edges.push((vertex, vertex + width));
                if triangulated && column + 1 < width {
                    edges.push((vertex, vertex + width + 1));
                }
            }
        }
    }
    edges
}

/// A grid with uniformly random values drawn from `seed`.
#[must_use]
pub fn random_grid(seed: u64, width: usize, height: usize, triangulated: bool) -> MeshFixture {
    let mut rng = SmallRng::seed_from_u64(seed);
    let vertex_count = width * height;
    MeshFixture {
        vertex_count,
        edges: grid_edges(width, height, triangulated),
        values: (0..vertex_count).map(|_| rng.gen_range(0.0..1.0)).collect(),
    }
}

/// An Erdős–Rényi style graph with `vertex_count` vertices, roughly
/// `edge_count` random edges and random values; it is usually disconnected.
#[must_use]
pub fn random_graph(seed: u64, vertex_count: usize, edge_count: usize) -> MeshFixture {
    let mut rng = SmallRng::seed_from_u64(seed);
    let edges = if vertex_count == 0 {
        Vec::new()
    } else {
        (0..edge_count)
            .map(|_| (rng.gen_range(0..vertex_count), rng.gen_range(0..vertex_count)))
            .collect()
    };
    MeshFixture {
        vertex_count,
        edges,
        // coarse values force plenty of ties for the id tie-break
        values: (0..vertex_count)
            .map(|_| f64::from(rng.gen_range(0_u8..8)))
            .collect(),
    }
}
