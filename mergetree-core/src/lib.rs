//! Parallel merge-tree construction.
//!
//! Builds the join or split tree of a scalar field over a mesh with a
//! task-parallel sweep: one growth front per local extremum, merged at saddles
//! through a concurrent union-find, followed by a sequential backbone pass and
//! an optional parallel segmentation of every vertex onto the tree's arcs.
//!
//! # Examples
//! ```
//! use mergetree_core::{AdjacencyGraph, MergeTreeBuilder, ScalarField, TreeType};
//!
//! let mesh = AdjacencyGraph::from_edges(5, (0..4).map(|v| (v, v + 1))).expect("valid edges");
//! let field = ScalarField::new(vec![0.0, 1.0, 2.0, 3.0, 4.0]).expect("finite values");
//! let engine = MergeTreeBuilder::new()
//!     .with_tree_type(TreeType::Join)
//!     .build()
//!     .expect("valid configuration");
//! let tree = engine.build(&mesh, &field, true).expect("build succeeds");
//!
//! assert_eq!(tree.leaves().len(), 1);
//! assert_eq!(tree.roots().len(), 1);
//! assert_eq!(tree.arcs()[0].region(), &[1, 2, 3]);
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

mod adjacency;
mod builder;
mod engine;
mod error;
mod order;
mod stats;
mod sweep;
mod tree;

pub use crate::{
    adjacency::{Adjacency, AdjacencyGraph, Neighbours},
    builder::{DEFAULT_CHUNK_COUNT, LeafOrder, MergeTreeBuilder, TreeType},
    engine::MergeTreeEngine,
    error::{MergeTreeError, MergeTreeErrorCode, Result},
    order::{ScalarField, ScalarOrder},
    stats::{BuildStats, HeightStats, PhaseOutcome, PhaseTimings},
    sweep::Precomputation,
    tree::{ArcId, Correspondence, MergeTree, Node, NodeId, SuperArc},
};
