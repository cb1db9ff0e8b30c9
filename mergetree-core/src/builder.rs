//! Builder utilities for configuring merge-tree construction.
//!
//! Exposes the tree orientation, the leaf scheduling hint and the validation
//! performed before a [`MergeTreeEngine`] is constructed.

use std::{fmt, num::NonZeroUsize, sync::Arc};

use crate::{Result, engine::MergeTreeEngine, error::MergeTreeError};

/// Default number of contiguous chunks used by the chunked parallel passes.
pub const DEFAULT_CHUNK_COUNT: usize = 64;

/// Orientation of the sweep.
///
/// A join tree tracks sub-level set components and sweeps from the minimum
/// upwards; a split tree tracks super-level set components and sweeps from the
/// maximum downwards.
///
/// # Examples
/// ```
/// use mergetree_core::TreeType;
///
/// assert_eq!(TreeType::default(), TreeType::Join);
/// assert_eq!(TreeType::Split.to_string(), "split");
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum TreeType {
    /// Sweep by ascending scalar value.
    #[default]
    Join,
    /// Sweep by descending scalar value.
    Split,
}

impl TreeType {
    /// Returns the opposite orientation.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Join => Self::Split,
            Self::Split => Self::Join,
        }
    }
}

impl fmt::Display for TreeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Join => "join",
            Self::Split => "split",
        })
    }
}

/// Order in which leaf tasks are submitted to the worker pool.
///
/// The order is a scheduling hint only: it changes which task reaches a saddle
/// last, never the topology of the resulting tree.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LeafOrder {
    /// Submit leaves in sweep order.
    #[default]
    SweepOrder,
    /// Submit leaves in the order precompute discovered them (by vertex id).
    Discovery,
}

/// Configures and constructs [`MergeTreeEngine`] instances.
///
/// # Examples
/// ```
/// use mergetree_core::{LeafOrder, MergeTreeBuilder, TreeType};
///
/// let engine = MergeTreeBuilder::new()
///     .with_tree_type(TreeType::Split)
///     .with_chunk_count(8)
///     .with_leaf_order(LeafOrder::Discovery)
///     .build()
///     .expect("builder configuration is valid");
/// assert_eq!(engine.tree_type(), TreeType::Split);
/// assert_eq!(engine.chunk_count().get(), 8);
/// ```
#[derive(Debug, Clone)]
pub struct MergeTreeBuilder {
    tree_type: TreeType,
    chunk_count: usize,
    leaf_order: LeafOrder,
    threads: Option<usize>,
}

impl Default for MergeTreeBuilder {
    fn default() -> Self {
        Self {
            tree_type: TreeType::Join,
            chunk_count: DEFAULT_CHUNK_COUNT,
            leaf_order: LeafOrder::SweepOrder,
            threads: None,
        }
    }
}

impl MergeTreeBuilder {
    /// Creates a builder populated with default parameters.
    ///
    /// # Examples
    /// ```
    /// use mergetree_core::{MergeTreeBuilder, TreeType};
    ///
    /// let builder = MergeTreeBuilder::new();
    /// assert_eq!(builder.tree_type(), TreeType::Join);
    /// assert_eq!(builder.chunk_count(), 64);
    /// assert_eq!(builder.threads(), None);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the sweep orientation.
    #[must_use]
    pub fn with_tree_type(mut self, tree_type: TreeType) -> Self {
        self.tree_type = tree_type;
        self
    }

    /// Overrides the number of chunks used by the chunked parallel passes.
    ///
    /// The count is clamped to the vertex count at build time.
    #[must_use]
    pub fn with_chunk_count(mut self, chunk_count: usize) -> Self {
        self.chunk_count = chunk_count;
        self
    }

    /// Selects the leaf submission order.
    #[must_use]
    pub fn with_leaf_order(mut self, leaf_order: LeafOrder) -> Self {
        self.leaf_order = leaf_order;
        self
    }

    /// Runs builds on a dedicated pool with `threads` workers instead of the
    /// global rayon pool.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Returns the configured orientation.
    #[must_use]
    #[rustfmt::skip]
    pub fn tree_type(&self) -> TreeType { self.tree_type }

    /// Returns the configured chunk count.
    #[must_use]
    #[rustfmt::skip]
    pub fn chunk_count(&self) -> usize { self.chunk_count }

    /// Returns the configured leaf order.
    #[must_use]
    #[rustfmt::skip]
    pub fn leaf_order(&self) -> LeafOrder { self.leaf_order }

    /// Returns the dedicated pool size, if one was requested.
    #[must_use]
    #[rustfmt::skip]
    pub fn threads(&self) -> Option<usize> { self.threads }

    /// Validates the configuration and constructs a [`MergeTreeEngine`].
    ///
    /// # Errors
    /// Returns [`MergeTreeError::InvalidChunkCount`] when the chunk count is
    /// zero, [`MergeTreeError::InvalidThreadCount`] when a dedicated pool of
    /// zero threads was requested and [`MergeTreeError::ThreadPool`] when the
    /// pool cannot be created.
    ///
    /// # Examples
    /// ```
    /// use mergetree_core::{MergeTreeBuilder, MergeTreeErrorCode};
    ///
    /// let err = MergeTreeBuilder::new()
    ///     .with_chunk_count(0)
    ///     .build()
    ///     .expect_err("zero chunks is rejected");
    /// assert_eq!(err.code(), MergeTreeErrorCode::InvalidChunkCount);
    /// ```
    pub fn build(self) -> Result<MergeTreeEngine> {
        let chunk_count = NonZeroUsize::new(self.chunk_count).ok_or(
            MergeTreeError::InvalidChunkCount {
                got: self.chunk_count,
            },
        )?;

        let pool = match self.threads {
            None => None,
            Some(threads) => {
                let threads = NonZeroUsize::new(threads)
                    .ok_or(MergeTreeError::InvalidThreadCount { got: threads })?;
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads.get())
                    .thread_name(|index| format!("mergetree-worker-{index}"))
                    .build()
                    .map_err(|error| MergeTreeError::ThreadPool {
                        message: Arc::from(error.to_string()),
                    })?;
                Some(Arc::new(pool))
            }
        };

        Ok(MergeTreeEngine::new(
            self.tree_type,
            chunk_count,
            self.leaf_order,
            pool,
        ))
    }
}
