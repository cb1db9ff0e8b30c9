//! The grid field and its neighbourhood.

use mergetree_core::{Adjacency, ScalarField, ScalarOrder};

use crate::errors::GridProviderError;

const QUAD: [(isize, isize); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
// quad neighbours plus the down-right diagonal in both directions
const TRIANGULATED: [(isize, isize); 6] = [(-1, -1), (0, -1), (-1, 0), (1, 0), (0, 1), (1, 1)];

/// How lattice points are connected.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Connectivity {
    /// Four axis-aligned neighbours.
    #[default]
    Quad,
    /// Each cell split along its down-right diagonal, giving six neighbours.
    Triangulated,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Self::Quad => &QUAD,
            Self::Triangulated => &TRIANGULATED,
        }
    }
}

/// A scalar field sampled on a row-major `width` by `height` grid.
///
/// Vertex `row * width + column` holds the value at `(column, row)`.
#[derive(Clone, Debug)]
pub struct GridField {
    name: String,
    width: usize,
    height: usize,
    connectivity: Connectivity,
    field: ScalarField,
}

impl GridField {
    /// Builds a grid from row-major values.
    ///
    /// # Errors
    /// Returns [`GridProviderError::ZeroDimension`] for an empty lattice,
    /// [`GridProviderError::ValueCount`] when `values` does not hold exactly
    /// `width * height` entries and [`GridProviderError::Core`] for
    /// non-finite values.
    ///
    /// # Examples
    /// ```
    /// use mergetree_core::{Adjacency, ScalarOrder};
    /// use mergetree_providers_grid::{Connectivity, GridField};
    ///
    /// let grid = GridField::new("demo", 2, 2, Connectivity::Quad, vec![0.0, 1.0, 2.0, 3.0])
    ///     .expect("grid must build");
    /// assert_eq!(grid.vertex_count(), 4);
    /// assert_eq!(grid.sorted_vertices(), &[0, 1, 2, 3]);
    /// ```
    pub fn new(
        name: impl Into<String>,
        width: usize,
        height: usize,
        connectivity: Connectivity,
        values: Vec<f64>,
    ) -> Result<Self, GridProviderError> {
        if width == 0 || height == 0 {
            return Err(GridProviderError::ZeroDimension { width, height });
        }
        let expected = width
            .checked_mul(height)
            .ok_or(GridProviderError::CapacityOverflow { width, height })?;
        if values.len() != expected {
            return Err(GridProviderError::ValueCount {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            width,
            height,
            connectivity,
            field: ScalarField::new(values)?,
        })
    }

    /// Name used in logs and summaries.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// The underlying scalar order.
    #[must_use]
    pub fn field(&self) -> &ScalarField {
        &self.field
    }

    /// Returns the value at `(column, row)`, or `None` outside the grid.
    #[must_use]
    pub fn value_at(&self, column: usize, row: usize) -> Option<f64> {
        if column >= self.width || row >= self.height {
            return None;
        }
        self.field.value(row * self.width + column)
    }

    fn lattice_neighbours(&self, vertex: usize) -> impl Iterator<Item = usize> + '_ {
        let in_grid = vertex < self.vertex_count();
        let (row, column) = (vertex / self.width, vertex % self.width);
        self.connectivity
            .offsets()
            .iter()
            .filter(move |_| in_grid)
            .filter_map(move |&(dx, dy)| {
                let x = column.checked_add_signed(dx).filter(|&x| x < self.width)?;
                let y = row.checked_add_signed(dy).filter(|&y| y < self.height)?;
                Some(y * self.width + x)
            })
    }
}

impl Adjacency for GridField {
    fn vertex_count(&self) -> usize {
        self.field.len()
    }

    fn neighbour_count(&self, vertex: usize) -> usize {
        self.lattice_neighbours(vertex).count()
    }

    fn neighbour(&self, vertex: usize, index: usize) -> Option<usize> {
        self.lattice_neighbours(vertex).nth(index)
    }
}

impl ScalarOrder for GridField {
    fn len(&self) -> usize {
        self.field.len()
    }

    fn sorted_vertices(&self) -> &[usize] {
        self.field.sorted_vertices()
    }

    fn rank(&self, vertex: usize) -> Option<usize> {
        self.field.rank(vertex)
    }
}
