//! Regular 2-D grid provider for the merge-tree engine.
//!
//! Loads a scalar field sampled on a `width` by `height` lattice from a small
//! whitespace-separated text format and exposes it through both
//! [`mergetree_core::Adjacency`] and [`mergetree_core::ScalarOrder`], so one
//! value can be handed to the engine as mesh and order at once.

mod errors;
mod grid;
mod parse;

pub use errors::GridProviderError;
pub use grid::{Connectivity, GridField};
