//! Hand-checked scenarios for the engine.

mod common;

use mergetree_core::{
    AdjacencyGraph, Correspondence, LeafOrder, MergeTreeBuilder, MergeTreeError, PhaseOutcome,
    ScalarField, ScalarOrder, TreeType,
};
use mergetree_test_support::meshes::{self, MeshFixture};
use rstest::rstest;

use crate::common::{build, describe, expected, load};

#[rstest]
fn path_join_tree_is_a_single_arc() {
    let tree = build(&meshes::path(5), TreeType::Join, 4);
    assert_eq!(tree.leaves().len(), 1);
    assert_eq!(tree.roots().len(), 1);
    assert_eq!(tree.saddles().count(), 0);
    assert_eq!(tree.arc_count(), 1);
    assert_eq!(tree.nodes()[tree.leaves()[0].get()].vertex(), 0);
    assert_eq!(tree.nodes()[tree.roots()[0].get()].vertex(), 4);
    assert_eq!(tree.arcs()[0].region(), &[1, 2, 3]);
    assert_eq!(tree.arcs()[0].seen(), 4);
    assert_eq!(tree.stats().leaf_count, 1);
    assert_eq!(tree.stats().backbone_nodes, 1);
    assert_eq!(tree.stats().backbone_vertices, 3);
}

#[rstest]
fn path_split_tree_runs_downwards() {
    let tree = build(&meshes::path(5), TreeType::Split, 2);
    assert_eq!(tree.nodes()[tree.leaves()[0].get()].vertex(), 4);
    assert_eq!(tree.nodes()[tree.roots()[0].get()].vertex(), 0);
    assert_eq!(tree.arcs()[0].region(), &[3, 2, 1]);
}

#[rstest]
#[case(TreeType::Join)]
#[case(TreeType::Split)]
fn diamond_matches_the_reference(#[case] tree_type: TreeType) {
    let fixture = meshes::diamond();
    let tree = build(&fixture, tree_type, 3);
    assert_eq!(describe(&tree), expected(&fixture, tree_type));
}

#[rstest]
fn diamond_join_tree_shape() {
    let tree = build(&meshes::diamond(), TreeType::Join, 3);
    assert_eq!(tree.leaves().len(), 2);
    assert_eq!(tree.saddles().count(), 1);
    assert_eq!(tree.roots().len(), 1);
    assert_eq!(tree.arc_count(), 3);
}

#[rstest]
fn single_vertex_is_leaf_and_root() {
    let fixture = MeshFixture {
        vertex_count: 1,
        edges: Vec::new(),
        values: vec![7.0],
    };
    let tree = build(&fixture, TreeType::Join, 1);
    assert_eq!(tree.node_count(), 1);
    assert_eq!(tree.arc_count(), 0);
    assert_eq!(tree.leaves(), tree.roots());
    assert!(matches!(tree.correspondence(0), Ok(Correspondence::Node(_))));
}

#[rstest]
#[case(TreeType::Join)]
#[case(TreeType::Split)]
fn disconnected_components_each_get_a_root(#[case] tree_type: TreeType) {
    // a path, a diamond and an isolated vertex side by side
    let diamond = meshes::diamond();
    let mut fixture = meshes::path(4);
    let offset = fixture.vertex_count;
    fixture
        .edges
        .extend(diamond.edges.iter().map(|&(a, b)| (a + offset, b + offset)));
    fixture.values.extend(diamond.values.iter().map(|value| value + 10.0));
    fixture.values.push(-3.0);
    fixture.vertex_count += diamond.vertex_count + 1;

    let tree = build(&fixture, tree_type, 5);
    assert_eq!(tree.roots().len(), 3);
    assert_eq!(describe(&tree), expected(&fixture, tree_type));
}

#[rstest]
fn leaf_order_does_not_change_topology() {
    let fixture = meshes::random_grid(11, 9, 7, true);
    let (mesh, field) = load(&fixture);
    let describe_with = |leaf_order| {
        let tree = MergeTreeBuilder::new()
            .with_leaf_order(leaf_order)
            .build()
            .expect("valid configuration")
            .build(&mesh, &field, true)
            .expect("build succeeds");
        describe(&tree)
    };
    assert_eq!(describe_with(LeafOrder::SweepOrder), describe_with(LeafOrder::Discovery));
}

#[rstest]
fn reused_precomputation_is_reported() {
    let fixture = meshes::random_grid(5, 6, 6, false);
    let (mesh, field) = load(&fixture);
    let engine = MergeTreeBuilder::new().build().expect("valid configuration");
    let precomputation = engine.precompute(&mesh, &field).expect("valid input");

    let fresh = engine.build(&mesh, &field, true).expect("build succeeds");
    let reused = engine
        .build_with_precomputation(&mesh, &field, &precomputation, true)
        .expect("build succeeds");
    assert_eq!(fresh.stats().precompute, PhaseOutcome::Completed);
    assert_eq!(reused.stats().precompute, PhaseOutcome::AlreadyDone);
    assert_eq!(describe(&fresh), describe(&reused));
    assert_eq!(precomputation.extrema().len(), fresh.leaves().len());
}

#[rstest]
fn precomputation_for_another_orientation_is_rejected() {
    let fixture = meshes::diamond();
    let (mesh, field) = load(&fixture);
    let join = MergeTreeBuilder::new().build().expect("valid configuration");
    let split = MergeTreeBuilder::new()
        .with_tree_type(join.tree_type().opposite())
        .build()
        .expect("valid configuration");
    assert_eq!(split.tree_type(), TreeType::Split);
    let precomputation = join.precompute(&mesh, &field).expect("valid input");
    let err = split
        .build_with_precomputation(&mesh, &field, &precomputation, false)
        .expect_err("orientation differs");
    assert!(matches!(err, MergeTreeError::PrecomputationMismatch { .. }));
}

/// An order that trusts whatever permutation it is given.
struct ListedOrder(Vec<usize>);

impl ScalarOrder for ListedOrder {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn sorted_vertices(&self) -> &[usize] {
        &self.0
    }

    fn rank(&self, vertex: usize) -> Option<usize> {
        self.0.iter().position(|&listed| listed == vertex)
    }
}

#[rstest]
#[case(vec![0, 5])]
#[case(vec![2, 0])]
fn permutation_with_foreign_vertices_is_rejected(#[case] sorted: Vec<usize>) {
    let mesh = AdjacencyGraph::from_edges(2, [(0, 1)]).expect("valid edges");
    let engine = MergeTreeBuilder::new().build().expect("valid configuration");
    let err = engine
        .build(&mesh, &ListedOrder(sorted), true)
        .expect_err("vertex ids exceed the mesh");
    assert_eq!(
        err,
        MergeTreeError::InvalidPermutation {
            reason: "vertex id exceeds the vertex count",
        }
    );
}

#[rstest]
fn empty_mesh_is_rejected() {
    let mesh = AdjacencyGraph::from_edges(0, std::iter::empty()).expect("no edges");
    let field = ScalarField::new(Vec::new()).expect("no values");
    let engine = MergeTreeBuilder::new().build().expect("valid configuration");
    assert_eq!(engine.build(&mesh, &field, false).map(|_| ()), Err(MergeTreeError::EmptyMesh));
}

#[rstest]
fn mismatched_vertex_counts_are_rejected() {
    let mesh = AdjacencyGraph::from_edges(3, [(0, 1)]).expect("valid edges");
    let field = ScalarField::new(vec![0.0, 1.0]).expect("finite values");
    let engine = MergeTreeBuilder::new().build().expect("valid configuration");
    assert_eq!(
        engine.build(&mesh, &field, false).map(|_| ()),
        Err(MergeTreeError::VertexCountMismatch { mesh: 3, order: 2 })
    );
}

#[rstest]
fn unsegmented_builds_leave_regions_empty() {
    let fixture = meshes::path(6);
    let (mesh, field) = load(&fixture);
    let tree = MergeTreeBuilder::new()
        .build()
        .expect("valid configuration")
        .build(&mesh, &field, false)
        .expect("build succeeds");
    assert!(!tree.is_segmented());
    assert!(tree.arcs().iter().all(|arc| arc.region().is_empty()));
    assert_eq!(tree.arcs()[0].seen(), 5);
    assert!(tree.stats().timings.segmentation.is_none());
}

#[rstest]
fn dedicated_pool_reports_its_size() {
    let engine = MergeTreeBuilder::new()
        .with_threads(2)
        .build()
        .expect("valid configuration");
    assert_eq!(engine.threads(), Some(2));
    let (mesh, field) = load(&meshes::diamond());
    let tree = engine.build(&mesh, &field, true).expect("build succeeds");
    assert_eq!(tree.roots().len(), 1);
}
