//! Unit tests for the sweep phases.

use rstest::rstest;

use super::*;
use crate::{AdjacencyGraph, ScalarField};

fn path(values: &[f64]) -> (AdjacencyGraph, ScalarField) {
    let mesh = AdjacencyGraph::from_edges(values.len(), (1..values.len()).map(|v| (v - 1, v)))
        .expect("path edges are in bounds");
    let field = ScalarField::new(values.to_vec()).expect("values are finite");
    (mesh, field)
}

#[rstest]
#[case(TreeType::Join, vec![0, 2, 0, 2, 0], vec![0, 2, 4])]
#[case(TreeType::Split, vec![1, 0, 2, 0, 1], vec![1, 3])]
fn precompute_counts_same_side_neighbours(
    #[case] tree_type: TreeType,
    #[case] valences: Vec<usize>,
    #[case] extrema: Vec<usize>,
) {
    let (mesh, field) = path(&[0.0, 3.0, 1.0, 4.0, 2.0]);
    let sweep = Sweep::new(&field, tree_type).expect("order is consistent");
    for chunk_size in [1, 2, 5] {
        let result = precompute(&mesh, &sweep, tree_type, chunk_size).expect("valid mesh");
        assert_eq!(result.tree_type(), tree_type);
        assert_eq!(result.extrema(), extrema.as_slice());
        let counted: Vec<usize> = (0..5).filter_map(|vertex| result.valence(vertex)).collect();
        assert_eq!(counted, valences);
    }
}

#[rstest]
fn precomputation_rejects_other_orientations() {
    let (mesh, field) = path(&[0.0, 1.0]);
    let sweep = Sweep::new(&field, TreeType::Join).expect("order is consistent");
    let result = precompute(&mesh, &sweep, TreeType::Join, 1).expect("valid mesh");
    assert!(matches!(
        result.check(TreeType::Split, 2),
        Err(MergeTreeError::PrecomputationMismatch { .. })
    ));
    assert!(matches!(
        result.check(TreeType::Join, 3),
        Err(MergeTreeError::PrecomputationMismatch { .. })
    ));
    assert!(result.check(TreeType::Join, 2).is_ok());
}

#[rstest]
fn single_leaf_is_deferred_to_the_backbone() {
    let (mesh, field) = path(&[0.0, 1.0, 2.0]);
    let sweep = Sweep::new(&field, TreeType::Join).expect("order is consistent");
    let result = precompute(&mesh, &sweep, TreeType::Join, 2).expect("valid mesh");
    let context =
        SweepContext::new(&mesh, &sweep, &result, result.extrema()).expect("leaves are valid");
    assert_eq!(context.launch().expect("launch succeeds"), Some(0));
    assert_eq!(context.unresolved_saddles(Some(0)), vec![0]);
    assert_eq!(context.store().arc_count(), 0);
}

#[rstest]
fn leaf_tasks_meet_at_the_saddle() {
    // minima at 0 and 2, saddle at 1, maximum at 3
    let mesh = AdjacencyGraph::from_edges(4, [(0, 1), (1, 2), (1, 3)]).expect("valid edges");
    let field = ScalarField::new(vec![0.0, 2.0, 1.0, 3.0]).expect("values are finite");
    let sweep = Sweep::new(&field, TreeType::Join).expect("order is consistent");
    let result = precompute(&mesh, &sweep, TreeType::Join, 4).expect("valid mesh");
    let context =
        SweepContext::new(&mesh, &sweep, &result, result.extrema()).expect("leaves are valid");
    assert_eq!(context.launch().expect("launch succeeds"), None);
    backbone::complete(&context, None, 4).expect("backbone succeeds");

    let store = context.store();
    let saddle = store.node_of(1).expect("the saddle became a node");
    let root = store.node_of(3).expect("the maximum became a node");
    let frozen = context.into_store().freeze(None).expect("store is consistent");
    assert_eq!(frozen.nodes[saddle.get()].down_arcs().len(), 2);
    assert_eq!(frozen.roots, vec![root]);
    assert_eq!(frozen.arcs.len(), 3);
    assert!(frozen.arcs.iter().all(|arc| arc.up().is_some()));
}

#[rstest]
fn merge_and_close_closes_every_registered_arc() {
    let mesh = AdjacencyGraph::from_edges(3, [(0, 1), (1, 2)]).expect("valid edges");
    let field = ScalarField::new(vec![0.0, 2.0, 1.0]).expect("values are finite");
    let sweep = Sweep::new(&field, TreeType::Join).expect("order is consistent");
    let result = precompute(&mesh, &sweep, TreeType::Join, 3).expect("valid mesh");
    let context =
        SweepContext::new(&mesh, &sweep, &result, result.extrema()).expect("leaves are valid");
    for (component, leaf) in context.leaves().iter().enumerate() {
        let arc = context.store().open_arc(*leaf).expect("leaf exists");
        context
            .components
            .register_arc(ComponentId::new(component), arc)
            .expect("lock is healthy");
    }
    let node = context
        .merge_and_close(1, Some(ComponentId::new(0)), MergeMode::Parallel)
        .expect("both neighbours have owners");
    assert_eq!(context.store().node_of(1), Some(node));
    let merged = context.owner(1).expect("saddle is owned");
    assert_eq!(context.components.find(ComponentId::new(1)), context.components.find(merged));
    assert!(context.components.drain_opened(merged).expect("lock is healthy").is_empty());
}

#[rstest]
fn parallel_merge_rejects_unowned_neighbours() {
    let (mesh, field) = path(&[0.0, 1.0, 2.0]);
    let sweep = Sweep::new(&field, TreeType::Join).expect("order is consistent");
    let result = precompute(&mesh, &sweep, TreeType::Join, 3).expect("valid mesh");
    let context =
        SweepContext::new(&mesh, &sweep, &result, result.extrema()).expect("leaves are valid");
    let err = context
        .merge_and_close(2, None, MergeMode::Parallel)
        .expect_err("vertex 1 has no owner");
    assert!(matches!(err, MergeTreeError::InvariantViolation { index: 1, .. }));
    assert!(context.merge_and_close(2, None, MergeMode::Backbone).is_ok());
}
