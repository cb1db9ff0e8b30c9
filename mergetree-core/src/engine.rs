//! Merge-tree construction entry points.

use std::{
    num::NonZeroUsize,
    sync::Arc,
    time::{Duration, Instant},
};

use rayon::ThreadPool;
use tracing::{debug, instrument, warn};

use crate::{
    Adjacency, LeafOrder, MergeTreeError, Result, ScalarOrder, TreeType, adjacency,
    order::Sweep,
    stats::{BuildStats, PhaseOutcome, PhaseTimings},
    sweep::{self, Precomputation, SweepContext, backbone, segmentation},
    tree::{MergeTree, MergeTreeParts},
};

/// Builds join or split trees with a fixed configuration.
///
/// Construct engines with [`crate::MergeTreeBuilder`].
#[derive(Clone, Debug)]
pub struct MergeTreeEngine {
    tree_type: TreeType,
    chunk_count: NonZeroUsize,
    leaf_order: LeafOrder,
    pool: Option<Arc<ThreadPool>>,
}

impl MergeTreeEngine {
    pub(crate) const fn new(
        tree_type: TreeType,
        chunk_count: NonZeroUsize,
        leaf_order: LeafOrder,
        pool: Option<Arc<ThreadPool>>,
    ) -> Self {
        Self {
            tree_type,
            chunk_count,
            leaf_order,
            pool,
        }
    }

    /// Returns the configured orientation.
    #[must_use]
    #[rustfmt::skip]
    pub fn tree_type(&self) -> TreeType { self.tree_type }

    /// Returns the configured chunk count.
    #[must_use]
    #[rustfmt::skip]
    pub fn chunk_count(&self) -> NonZeroUsize { self.chunk_count }

    /// Returns the configured leaf order.
    #[must_use]
    #[rustfmt::skip]
    pub fn leaf_order(&self) -> LeafOrder { self.leaf_order }

    /// Returns the size of the dedicated pool, or `None` for the global pool.
    #[must_use]
    pub fn threads(&self) -> Option<usize> {
        self.pool.as_ref().map(|pool| pool.current_num_threads())
    }

    /// Builds the tree of `order` over `mesh`.
    ///
    /// When `compute_segmentation` is set every arc's region lists its
    /// interior vertices in sweep order.
    ///
    /// # Errors
    /// Returns [`MergeTreeError::EmptyMesh`] for a mesh without vertices,
    /// [`MergeTreeError::VertexCountMismatch`] when `order` and `mesh`
    /// disagree, [`MergeTreeError::InvalidPermutation`] or
    /// [`MergeTreeError::NeighbourOutOfBounds`] for malformed collaborators
    /// and [`MergeTreeError::InvariantViolation`] if construction detects an
    /// inconsistency.
    ///
    /// # Examples
    /// ```
    /// use mergetree_core::{AdjacencyGraph, MergeTreeBuilder, ScalarField};
    ///
    /// // two minima (0 and 4) meeting at vertex 2, maximum at vertex 5
    /// let mesh = AdjacencyGraph::from_edges(6, [(0, 1), (1, 2), (2, 3), (3, 4), (2, 5)])
    ///     .expect("valid edges");
    /// let field = ScalarField::new(vec![0.0, 1.0, 3.0, 2.0, 0.5, 4.0]).expect("finite values");
    /// let engine = MergeTreeBuilder::new().build().expect("valid configuration");
    /// let tree = engine.build(&mesh, &field, true).expect("build succeeds");
    ///
    /// assert_eq!(tree.leaves().len(), 2);
    /// assert_eq!(tree.roots().len(), 1);
    /// assert_eq!(tree.saddles().count(), 1);
    /// assert_eq!(tree.arc_count(), 3);
    /// ```
    pub fn build<M, O>(&self, mesh: &M, order: &O, compute_segmentation: bool) -> Result<MergeTree>
    where
        M: Adjacency + Sync,
        O: ScalarOrder + Sync + ?Sized,
    {
        self.install(|| self.build_inner(mesh, order, None, compute_segmentation))
    }

    /// Builds the tree reusing valences and leaves from
    /// [`Self::precompute`]; the precompute phase is reported as
    /// [`PhaseOutcome::AlreadyDone`].
    ///
    /// # Errors
    /// Returns [`MergeTreeError::PrecomputationMismatch`] when
    /// `precomputation` was made for another orientation or vertex count, and
    /// otherwise the same errors as [`Self::build`].
    pub fn build_with_precomputation<M, O>(
        &self,
        mesh: &M,
        order: &O,
        precomputation: &Precomputation,
        compute_segmentation: bool,
    ) -> Result<MergeTree>
    where
        M: Adjacency + Sync,
        O: ScalarOrder + Sync + ?Sized,
    {
        self.install(|| self.build_inner(mesh, order, Some(precomputation), compute_segmentation))
    }

    /// Counts valences and detects leaves without building a tree.
    ///
    /// # Errors
    /// Returns the validation errors of [`Self::build`].
    ///
    /// # Examples
    /// ```
    /// use mergetree_core::{AdjacencyGraph, MergeTreeBuilder, ScalarField};
    ///
    /// let mesh = AdjacencyGraph::from_edges(3, [(0, 1), (1, 2)]).expect("valid edges");
    /// let field = ScalarField::new(vec![0.0, 2.0, 1.0]).expect("finite values");
    /// let engine = MergeTreeBuilder::new().build().expect("valid configuration");
    /// let precomputation = engine.precompute(&mesh, &field).expect("valid input");
    /// assert_eq!(precomputation.extrema(), &[0, 2]);
    /// assert_eq!(precomputation.valence(1), Some(2));
    /// ```
    pub fn precompute<M, O>(&self, mesh: &M, order: &O) -> Result<Precomputation>
    where
        M: Adjacency + Sync,
        O: ScalarOrder + Sync + ?Sized,
    {
        self.install(|| {
            let sweep = self.prepare(mesh, order)?;
            sweep::precompute(mesh, &sweep, self.tree_type, self.chunk_size(sweep.len()))
        })
    }

    fn install<R: Send>(&self, operation: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(operation),
            None => operation(),
        }
    }

    fn chunk_size(&self, vertex_count: usize) -> usize {
        let chunks = self.chunk_count.get().clamp(1, vertex_count.max(1));
        vertex_count.div_ceil(chunks).max(1)
    }

    fn prepare<M, O>(&self, mesh: &M, order: &O) -> Result<Sweep>
    where
        M: Adjacency + Sync,
        O: ScalarOrder + Sync + ?Sized,
    {
        let vertex_count = mesh.vertex_count();
        if vertex_count == 0 {
            warn!("mesh is empty, returning error");
            return Err(MergeTreeError::EmptyMesh);
        }
        if order.len() != vertex_count {
            return Err(MergeTreeError::VertexCountMismatch {
                mesh: vertex_count,
                order: order.len(),
            });
        }
        Sweep::new(order, self.tree_type)
    }

    #[instrument(
        name = "core.build",
        err,
        skip(self, mesh, order, precomputation),
        fields(
            vertices = mesh.vertex_count(),
            tree_type = %self.tree_type,
            reuse = precomputation.is_some(),
        ),
    )]
    fn build_inner<M, O>(
        &self,
        mesh: &M,
        order: &O,
        precomputation: Option<&Precomputation>,
        compute_segmentation: bool,
    ) -> Result<MergeTree>
    where
        M: Adjacency + Sync,
        O: ScalarOrder + Sync + ?Sized,
    {
        let sweep = self.prepare(mesh, order)?;
        let chunk_size = self.chunk_size(sweep.len());
        let mut timings = PhaseTimings::default();

        let clock = Instant::now();
        let computed;
        let (precomputation, outcome) = match precomputation {
            Some(reused) => {
                reused.check(self.tree_type, sweep.len())?;
                adjacency::validate(mesh)?;
                (reused, PhaseOutcome::AlreadyDone)
            }
            None => {
                computed = sweep::precompute(mesh, &sweep, self.tree_type, chunk_size)?;
                (&computed, PhaseOutcome::Completed)
            }
        };
        timings.precompute = clock.elapsed();

        let mut leaf_vertices = precomputation.extrema().to_vec();
        if self.leaf_order == LeafOrder::SweepOrder {
            leaf_vertices.sort_unstable_by_key(|&vertex| sweep.position(vertex));
        }

        let clock = Instant::now();
        let context = SweepContext::new(mesh, &sweep, precomputation, &leaf_vertices)?;
        let seed = context.launch()?;
        timings.leaves = clock.elapsed();

        let clock = Instant::now();
        let summary = backbone::complete(&context, seed, self.chunk_count.get())?;
        timings.backbone = clock.elapsed();

        let regions = if compute_segmentation {
            let clock = Instant::now();
            let regions = segmentation::build(context.store(), &sweep, chunk_size)?;
            timings.segmentation = Some(clock.elapsed());
            Some(regions)
        } else {
            None
        };

        let stats = BuildStats {
            precompute: outcome,
            leaf_count: leaf_vertices.len(),
            backbone_nodes: summary.nodes,
            backbone_vertices: summary.vertices,
            max_task_depth: context.max_depth(),
            timings,
        };
        let leaves = context.leaves().to_vec();
        let frozen = context.into_store().freeze(regions)?;
        debug!(
            nodes = frozen.nodes.len(),
            arcs = frozen.arcs.len(),
            roots = frozen.roots.len(),
            elapsed_ms = total_millis(&stats.timings),
            "merge tree built"
        );
        #[cfg(feature = "metrics")]
        crate::stats::record(&stats, self.tree_type);

        Ok(MergeTree::from_parts(MergeTreeParts {
            tree_type: self.tree_type,
            nodes: frozen.nodes,
            arcs: frozen.arcs,
            leaves,
            roots: frozen.roots,
            correspondence: frozen.correspondence,
            positions: sweep.into_positions(),
            segmented: compute_segmentation,
            stats,
        }))
    }
}

fn total_millis(timings: &PhaseTimings) -> u128 {
    let total = timings.precompute
        + timings.leaves
        + timings.backbone
        + timings.segmentation.unwrap_or(Duration::ZERO);
    total.as_millis()
}

