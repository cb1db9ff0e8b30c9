use std::collections::BTreeSet;

use mergetree_core::{
    AdjacencyGraph, Correspondence, MergeTree, MergeTreeBuilder, ScalarField, TreeType,
};
use mergetree_test_support::{
    meshes::MeshFixture,
    reference::{self, ReferenceTree},
};

#[must_use]
pub fn load(fixture: &MeshFixture) -> (AdjacencyGraph, ScalarField) {
    let mesh = AdjacencyGraph::from_edges(fixture.vertex_count, fixture.edges.iter().copied())
        .expect("fixture edges are in bounds");
    let field = ScalarField::new(fixture.values.clone()).expect("fixture values are finite");
    (mesh, field)
}

pub fn build(fixture: &MeshFixture, tree_type: TreeType, chunk_count: usize) -> MergeTree {
    let (mesh, field) = load(fixture);
    MergeTreeBuilder::new()
        .with_tree_type(tree_type)
        .with_chunk_count(chunk_count)
        .build()
        .expect("valid configuration")
        .build(&mesh, &field, true)
        .expect("build succeeds")
}

/// Expected topology from the sequential sweep.
#[must_use]
pub fn expected(fixture: &MeshFixture, tree_type: TreeType) -> ReferenceTree {
    let mut order = fixture.ascending();
    if tree_type == TreeType::Split {
        order.reverse();
    }
    reference::sweep(&fixture.neighbour_lists(), &order)
}

/// Describes a built tree by mesh vertices so it can be compared with the
/// reference sweep regardless of node and arc numbering.
#[must_use]
pub fn describe(tree: &MergeTree) -> ReferenceTree {
    let vertex_of = |node: mergetree_core::NodeId| tree.nodes()[node.get()].vertex();
    let arcs: BTreeSet<(usize, usize)> = tree
        .visible_arcs()
        .map(|(_, arc)| {
            let up = arc.up().expect("built arcs are closed");
            (vertex_of(arc.down()), vertex_of(up))
        })
        .collect();
    let arc_of = (0..tree.vertex_count())
        .map(|vertex| match tree.correspondence(vertex) {
            Ok(Correspondence::Arc(arc)) => Some(vertex_of(tree.arcs()[arc.get()].down())),
            _ => None,
        })
        .collect();
    ReferenceTree {
        // deleted nodes stay in the arena but no longer own their vertex
        nodes: (0..tree.vertex_count())
            .filter(|&vertex| tree.vertex_node(vertex).is_some())
            .collect(),
        leaves: tree.leaves().iter().map(|&leaf| vertex_of(leaf)).collect(),
        roots: tree.roots().iter().map(|&root| vertex_of(root)).collect(),
        arcs,
        arc_of,
    }
}
