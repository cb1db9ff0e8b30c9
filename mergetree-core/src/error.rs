//! Error types for the merge-tree core library.
//!
//! Defines the error enum exposed by the public API, its stable codes and a
//! convenient result alias.

use std::{fmt, sync::Arc};

use thiserror::Error;

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// Error type produced when configuring an engine, building a tree or editing
/// a built [`crate::MergeTree`].
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum MergeTreeError {
    /// Chunk count must be greater than zero.
    #[error("chunk_count must be at least 1 (got {got})")]
    InvalidChunkCount {
        /// The invalid chunk count supplied by the caller.
        got: usize,
    },
    /// A dedicated pool needs at least one worker thread.
    #[error("thread count must be at least 1 (got {got})")]
    InvalidThreadCount {
        /// The invalid thread count supplied by the caller.
        got: usize,
    },
    /// The mesh has no vertices.
    #[error("mesh contains no vertices")]
    EmptyMesh,
    /// The scalar order and the mesh disagree on the vertex count.
    #[error("scalar order covers {order} vertices but the mesh has {mesh}")]
    VertexCountMismatch {
        /// Vertex count reported by the adjacency provider.
        mesh: usize,
        /// Vertex count reported by the scalar order.
        order: usize,
    },
    /// The adjacency provider returned a neighbour outside the mesh.
    #[error("vertex {vertex} lists neighbour {neighbour} but the mesh has {vertex_count} vertices")]
    NeighbourOutOfBounds {
        /// Vertex whose neighbour list is malformed.
        vertex: usize,
        /// The offending neighbour id.
        neighbour: usize,
        /// Number of vertices in the mesh.
        vertex_count: usize,
    },
    /// A scalar value was NaN or infinite.
    #[error("scalar value of vertex {vertex} is not finite")]
    NonFiniteScalar {
        /// Vertex carrying the non-finite value.
        vertex: usize,
    },
    /// The sorted permutation or its inverse is inconsistent.
    #[error("scalar order is not a valid permutation: {reason}")]
    InvalidPermutation {
        /// Description of the inconsistency.
        reason: &'static str,
    },
    /// A vertex id was outside the mesh.
    #[error("vertex {vertex} is out of bounds for {vertex_count} vertices")]
    VertexOutOfBounds {
        /// The requested vertex.
        vertex: usize,
        /// Number of vertices in the mesh.
        vertex_count: usize,
    },
    /// A node id did not name a node of the tree.
    #[error("node {node} does not exist (the tree has {node_count} nodes)")]
    UnknownNode {
        /// The requested node.
        node: usize,
        /// Number of nodes in the tree.
        node_count: usize,
    },
    /// An arc id did not name an arc of the tree.
    #[error("arc {arc} does not exist (the tree has {arc_count} arcs)")]
    UnknownArc {
        /// The requested arc.
        arc: usize,
        /// Number of arcs in the tree.
        arc_count: usize,
    },
    /// The vertex is not interior to any arc.
    #[error("vertex {vertex} does not lie on an arc")]
    NotOnArc {
        /// The requested vertex.
        vertex: usize,
    },
    /// The vertex already owns a node.
    #[error("vertex {vertex} already owns node {node}")]
    NodeAlreadyExists {
        /// The requested vertex.
        vertex: usize,
        /// The node the vertex already owns.
        node: usize,
    },
    /// The node cannot be removed without breaking the tree.
    #[error("node {node} cannot be deleted: {reason}")]
    CannotDelete {
        /// The node whose removal was refused.
        node: usize,
        /// Why the removal was refused.
        reason: &'static str,
    },
    /// A precomputation was reused with an incompatible build.
    #[error("precomputation does not match this build: {reason}")]
    PrecomputationMismatch {
        /// Which property differed.
        reason: &'static str,
    },
    /// The dedicated worker pool could not be created.
    #[error("failed to build worker pool: {message}")]
    ThreadPool {
        /// Message reported by the pool builder.
        message: Arc<str>,
    },
    /// A mutex guarding shared build state was poisoned.
    #[error("lock for {resource} is poisoned")]
    LockPoisoned {
        /// The resource guarded by the poisoned lock.
        resource: &'static str,
    },
    /// An internal invariant of the construction was violated.
    #[error("merge-tree invariant violated at index {index}: {invariant}")]
    InvariantViolation {
        /// The invariant that failed.
        invariant: &'static str,
        /// Vertex, node or arc index the failure was detected on.
        index: usize,
    },
}

define_error_codes! {
    /// Stable codes describing [`MergeTreeError`] variants.
    enum MergeTreeErrorCode for MergeTreeError {
        /// Chunk count must be greater than zero.
        InvalidChunkCount => InvalidChunkCount { .. } => "MERGE_TREE_INVALID_CHUNK_COUNT",
        /// A dedicated pool needs at least one worker thread.
        InvalidThreadCount => InvalidThreadCount { .. } => "MERGE_TREE_INVALID_THREAD_COUNT",
        /// The mesh has no vertices.
        EmptyMesh => EmptyMesh => "MERGE_TREE_EMPTY_MESH",
        /// The scalar order and the mesh disagree on the vertex count.
        VertexCountMismatch => VertexCountMismatch { .. } => "MERGE_TREE_VERTEX_COUNT_MISMATCH",
        /// The adjacency provider returned a neighbour outside the mesh.
        NeighbourOutOfBounds => NeighbourOutOfBounds { .. } => "MERGE_TREE_NEIGHBOUR_OUT_OF_BOUNDS",
        /// A scalar value was NaN or infinite.
        NonFiniteScalar => NonFiniteScalar { .. } => "MERGE_TREE_NON_FINITE_SCALAR",
        /// The sorted permutation or its inverse is inconsistent.
        InvalidPermutation => InvalidPermutation { .. } => "MERGE_TREE_INVALID_PERMUTATION",
        /// A vertex id was outside the mesh.
        VertexOutOfBounds => VertexOutOfBounds { .. } => "MERGE_TREE_VERTEX_OUT_OF_BOUNDS",
        /// A node id did not name a node of the tree.
        UnknownNode => UnknownNode { .. } => "MERGE_TREE_UNKNOWN_NODE",
        /// An arc id did not name an arc of the tree.
        UnknownArc => UnknownArc { .. } => "MERGE_TREE_UNKNOWN_ARC",
        /// The vertex is not interior to any arc.
        NotOnArc => NotOnArc { .. } => "MERGE_TREE_NOT_ON_ARC",
        /// The vertex already owns a node.
        NodeAlreadyExists => NodeAlreadyExists { .. } => "MERGE_TREE_NODE_ALREADY_EXISTS",
        /// The node cannot be removed without breaking the tree.
        CannotDelete => CannotDelete { .. } => "MERGE_TREE_CANNOT_DELETE",
        /// A precomputation was reused with an incompatible build.
        PrecomputationMismatch => PrecomputationMismatch { .. } => "MERGE_TREE_PRECOMPUTATION_MISMATCH",
        /// The dedicated worker pool could not be created.
        ThreadPool => ThreadPool { .. } => "MERGE_TREE_THREAD_POOL",
        /// A mutex guarding shared build state was poisoned.
        LockPoisoned => LockPoisoned { .. } => "MERGE_TREE_LOCK_POISONED",
        /// An internal invariant of the construction was violated.
        InvariantViolation => InvariantViolation { .. } => "MERGE_TREE_INVARIANT_VIOLATION",
    }
}

/// Convenient result alias for merge-tree operations.
pub type Result<T> = core::result::Result<T, MergeTreeError>;

pub(crate) const fn invariant(invariant: &'static str, index: usize) -> MergeTreeError {
    MergeTreeError::InvariantViolation { invariant, index }
}
