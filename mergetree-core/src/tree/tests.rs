//! Unit tests for the tree read API and edits.

use rstest::{fixture, rstest};

use super::*;
use crate::{AdjacencyGraph, MergeTreeBuilder, MergeTreeErrorCode, ScalarField};

/// Two minima (0 and 1) climbing through 4 and 5 to the saddle 2, then 6 to
/// the maximum 3.
#[fixture]
fn diamond() -> MergeTree {
    let mesh = AdjacencyGraph::from_edges(7, [(0, 4), (4, 2), (1, 5), (5, 2), (2, 6), (6, 3)])
        .expect("edges are in bounds");
    let field = ScalarField::new(vec![0.0, 0.5, 2.0, 3.0, 1.0, 1.5, 2.5]).expect("finite values");
    MergeTreeBuilder::new()
        .with_chunk_count(3)
        .build()
        .expect("valid configuration")
        .build(&mesh, &field, true)
        .expect("build succeeds")
}

fn node_at(tree: &MergeTree, vertex: usize) -> NodeId {
    tree.vertex_node(vertex).expect("vertex is critical")
}

fn arc_between(tree: &MergeTree, down: usize, up: usize) -> &SuperArc {
    let down = node_at(tree, down);
    let up = node_at(tree, up);
    tree.visible_arcs()
        .map(|(_, arc)| arc)
        .find(|arc| arc.down() == down && arc.up() == Some(up))
        .expect("arc exists")
}

#[rstest]
fn diamond_has_the_expected_shape(diamond: MergeTree) {
    assert_eq!(diamond.tree_type(), TreeType::Join);
    assert_eq!(diamond.node_count(), 4);
    assert_eq!(diamond.arc_count(), 3);
    assert_eq!(diamond.saddles().collect::<Vec<_>>(), vec![node_at(&diamond, 2)]);
    assert_eq!(diamond.roots(), &[node_at(&diamond, 3)]);
    assert_eq!(arc_between(&diamond, 0, 2).region(), &[4]);
    assert_eq!(arc_between(&diamond, 1, 2).region(), &[5]);
    assert_eq!(arc_between(&diamond, 2, 3).region(), &[6]);
    assert_eq!(diamond.node(node_at(&diamond, 0)).map(Node::termination), Ok(Some(0)));
}

#[rstest]
fn parent_walks_towards_the_root(diamond: MergeTree) {
    let saddle = node_at(&diamond, 2);
    let root = node_at(&diamond, 3);
    assert_eq!(diamond.parent(node_at(&diamond, 0)), Ok(Some(saddle)));
    assert_eq!(diamond.parent(saddle), Ok(Some(root)));
    assert_eq!(diamond.parent(root), Ok(None));
}

#[rstest]
fn sorted_nodes_follow_the_sweep(diamond: MergeTree) {
    let vertices: Vec<usize> = diamond
        .sorted_nodes()
        .into_iter()
        .map(|node| diamond.nodes()[node.get()].vertex())
        .collect();
    assert_eq!(vertices, vec![0, 1, 2, 3]);
}

#[rstest]
fn height_stats_count_arcs_to_the_root(diamond: MergeTree) {
    let stats = diamond.height_stats().expect("the tree has leaves");
    assert_eq!(stats.max, 2);
    assert!((stats.mean - 2.0).abs() < f64::EPSILON);
}

fn arc_id_between(tree: &MergeTree, down: usize, up: usize) -> ArcId {
    let down = node_at(tree, down);
    let up = node_at(tree, up);
    tree.visible_arcs()
        .find(|(_, arc)| arc.down() == down && arc.up() == Some(up))
        .map(|(id, _)| id)
        .expect("arc exists")
}

/// Minima 0 and 1 meet at 3, minimum 2 joins at 4, and 5 is the maximum.
#[fixture]
fn lopsided() -> MergeTree {
    let mesh = AdjacencyGraph::from_edges(6, [(0, 3), (1, 3), (3, 4), (2, 4), (4, 5)])
        .expect("edges are in bounds");
    let field = ScalarField::new(vec![0.0, 0.5, 0.2, 1.0, 2.0, 3.0]).expect("finite values");
    MergeTreeBuilder::new()
        .build()
        .expect("valid configuration")
        .build(&mesh, &field, true)
        .expect("build succeeds")
}

#[rstest]
fn uniform_heights_have_no_spread(diamond: MergeTree) {
    let stats = diamond.height_stats().expect("the tree has leaves");
    assert!(stats.variance.abs() < f64::EPSILON);
    assert!(stats.std_dev.abs() < f64::EPSILON);
}

#[rstest]
fn uneven_heights_report_their_spread(lopsided: MergeTree) {
    let stats = lopsided.height_stats().expect("the tree has leaves");
    assert_eq!(stats.max, 3);
    assert!((stats.mean - 8.0 / 3.0).abs() < 1e-12);
    assert!((stats.variance - 2.0 / 9.0).abs() < 1e-12);
    assert!((stats.std_dev - (2.0_f64 / 9.0).sqrt()).abs() < 1e-12);
}

#[rstest]
fn arc_depths_count_arcs_below(diamond: MergeTree) {
    let depths = diamond.arc_depths();
    assert_eq!(depths[arc_id_between(&diamond, 0, 2).get()], Some(0));
    assert_eq!(depths[arc_id_between(&diamond, 1, 2).get()], Some(0));
    assert_eq!(depths[arc_id_between(&diamond, 2, 3).get()], Some(1));
}

#[rstest]
fn arc_depths_keep_the_deepest_leaf(lopsided: MergeTree) {
    let depths = lopsided.arc_depths();
    assert_eq!(depths[arc_id_between(&lopsided, 2, 4).get()], Some(0));
    assert_eq!(depths[arc_id_between(&lopsided, 3, 4).get()], Some(1));
    assert_eq!(depths[arc_id_between(&lopsided, 4, 5).get()], Some(2));
}

#[rstest]
fn arc_potentials_accumulate_regions_from_the_root(diamond: MergeTree) {
    let potentials = diamond.arc_potentials();
    assert_eq!(potentials[arc_id_between(&diamond, 2, 3).get()], Some(1));
    assert_eq!(potentials[arc_id_between(&diamond, 0, 2).get()], Some(2));
    assert_eq!(potentials[arc_id_between(&diamond, 1, 2).get()], Some(2));
}

#[rstest]
fn hidden_arcs_have_no_depth_or_potential(mut diamond: MergeTree) {
    let leaf = node_at(&diamond, 0);
    diamond.delete_node(leaf).expect("leaves can be deleted");
    let hidden: Vec<usize> = diamond
        .arcs()
        .iter()
        .enumerate()
        .filter(|(_, arc)| arc.is_hidden())
        .map(|(index, _)| index)
        .collect();
    assert!(!hidden.is_empty());
    let depths = diamond.arc_depths();
    let potentials = diamond.arc_potentials();
    for index in hidden {
        assert_eq!(depths[index], None);
        assert_eq!(potentials[index], None);
    }
}

#[rstest]
#[case(99)]
#[case(7)]
fn out_of_range_queries_fail(diamond: MergeTree, #[case] index: usize) {
    assert_eq!(
        diamond.node(NodeId::new(index)).map_err(|err| err.code()),
        Err(MergeTreeErrorCode::UnknownNode)
    );
    assert_eq!(
        diamond.arc(ArcId::new(index)).map_err(|err| err.code()),
        Err(MergeTreeErrorCode::UnknownArc)
    );
    assert_eq!(
        diamond.correspondence(index).map_err(|err| err.code()),
        Err(MergeTreeErrorCode::VertexOutOfBounds)
    );
}

#[rstest]
fn insert_node_splits_the_region(mut diamond: MergeTree) {
    let lower = diamond.vertex_arc(4).expect("vertex 4 is interior");
    let upper = diamond.insert_node(4).expect("vertex 4 lies on an arc");
    let node = node_at(&diamond, 4);

    assert_eq!(diamond.arc(lower).map(SuperArc::up), Ok(Some(node)));
    assert_eq!(diamond.arc(upper).map(SuperArc::down), Ok(node));
    assert_eq!(diamond.arc(upper).map(SuperArc::up), Ok(Some(node_at(&diamond, 2))));
    assert!(diamond.arc(lower).is_ok_and(|arc| arc.region().is_empty()));
    assert!(diamond.arc(upper).is_ok_and(|arc| arc.region().is_empty()));
    assert_eq!(diamond.node(node).map(Node::termination), Ok(Some(0)));
    assert_eq!(diamond.parent(node_at(&diamond, 0)), Ok(Some(node)));

    let saddle = diamond.node(node_at(&diamond, 2)).expect("saddle exists");
    assert!(saddle.down_arcs().contains(&upper));
    assert!(!saddle.down_arcs().contains(&lower));
}

#[rstest]
fn insert_node_moves_the_upper_part_of_a_long_arc() {
    let mesh = AdjacencyGraph::from_edges(6, (0..5).map(|v| (v, v + 1))).expect("valid edges");
    let field = ScalarField::from_permutation((0..6).collect()).expect("valid permutation");
    for segmentation in [true, false] {
        let mut tree = MergeTreeBuilder::new()
            .build()
            .expect("valid configuration")
            .build(&mesh, &field, segmentation)
            .expect("build succeeds");
        let lower = tree.vertex_arc(2).expect("vertex 2 is interior");
        let upper = tree.insert_node(2).expect("vertex 2 lies on an arc");

        assert_eq!(tree.vertex_arc(1), Some(lower));
        assert_eq!(tree.vertex_arc(3), Some(upper));
        assert_eq!(tree.vertex_arc(4), Some(upper));
        assert_eq!(tree.arc(lower).map(SuperArc::seen), Ok(2));
        assert_eq!(tree.arc(upper).map(SuperArc::seen), Ok(3));
        if segmentation {
            assert_eq!(tree.arc(lower).map(SuperArc::region), Ok(&[1][..]));
            assert_eq!(tree.arc(upper).map(SuperArc::region), Ok(&[3, 4][..]));
        }
    }
}

#[rstest]
#[case(2, MergeTreeErrorCode::NodeAlreadyExists)]
#[case(42, MergeTreeErrorCode::VertexOutOfBounds)]
fn insert_node_rejects_invalid_vertices(
    mut diamond: MergeTree,
    #[case] vertex: usize,
    #[case] code: MergeTreeErrorCode,
) {
    let err = diamond.insert_node(vertex).expect_err("vertex cannot be split");
    assert_eq!(err.code(), code);
}

#[rstest]
fn delete_node_undoes_insert_node(mut diamond: MergeTree) {
    let original = arc_between(&diamond, 2, 3).clone();
    diamond.insert_node(6).expect("vertex 6 lies on an arc");
    let inserted = node_at(&diamond, 6);
    diamond.delete_node(inserted).expect("inserted node is regular");

    let restored = arc_between(&diamond, 2, 3);
    assert_eq!(restored.region(), original.region());
    assert_eq!(restored.seen(), original.seen());
    assert!(diamond.nodes()[inserted.get()].is_detached());
    assert!(matches!(diamond.correspondence(6), Ok(Correspondence::Arc(_))));
    assert_eq!(diamond.visible_arcs().count(), 3);
}

#[rstest]
fn delete_node_refuses_saddles(mut diamond: MergeTree) {
    let saddle = node_at(&diamond, 2);
    let err = diamond.delete_node(saddle).expect_err("saddles join two arcs");
    assert_eq!(err.code(), MergeTreeErrorCode::CannotDelete);
}

#[rstest]
fn deleting_the_root_promotes_the_saddle(mut diamond: MergeTree) {
    let saddle = node_at(&diamond, 2);
    let root = node_at(&diamond, 3);
    diamond.delete_node(root).expect("root has one down arc");
    assert_eq!(diamond.roots(), &[saddle]);
    assert_eq!(diamond.parent(saddle), Ok(None));
    assert_eq!(diamond.correspondence(6), Ok(Correspondence::Unassigned));
    let err = diamond
        .delete_node(root)
        .expect_err("the old root is detached");
    assert_eq!(err.code(), MergeTreeErrorCode::CannotDelete);
}

#[rstest]
fn deleting_a_leaf_drops_its_branch(mut diamond: MergeTree) {
    let leaf = node_at(&diamond, 1);
    diamond.delete_node(leaf).expect("leaf has one up arc");
    assert_eq!(diamond.leaves().len(), 1);
    assert_eq!(diamond.correspondence(5), Ok(Correspondence::Unassigned));
    let saddle = diamond.node(node_at(&diamond, 2)).expect("saddle exists");
    assert_eq!(saddle.down_arcs().len(), 1);
}

#[rstest]
fn finalize_segmentation_restores_sweep_order(mut diamond: MergeTree) {
    diamond.arcs[0].region.reverse();
    diamond.finalize_segmentation();
    for (_, arc) in diamond.visible_arcs() {
        let positions: Vec<usize> = arc.region().iter().map(|&v| diamond.positions[v]).collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }
}

#[rstest]
fn display_lists_nodes_arcs_and_roots(diamond: MergeTree) {
    let rendered = diamond.to_string();
    assert!(rendered.starts_with("join tree: 4 nodes, 3 arcs"));
    assert!(rendered.contains("region 1"));
    assert!(rendered.contains("roots ["));
    assert_eq!(NodeId::new(2).to_string(), "n2");
    assert_eq!(ArcId::new(5).to_string(), "a5");
}
