mod common;

use mergetree_core::{MergeTreeBuilder, TreeType};
use mergetree_test_support::{meshes, tracing::RecordingLayer};
use rstest::rstest;
use tracing::Level;

use crate::common::load;

#[rstest]
fn build_records_a_span_per_phase() {
    let (mesh, field) = load(&meshes::diamond());
    let engine = MergeTreeBuilder::new().build().expect("valid configuration");
    let layer = RecordingLayer::default();
    let tree = layer
        .capture(|| engine.build(&mesh, &field, true))
        .expect("build succeeds");
    assert_eq!(tree.roots().len(), 1);

    let names = layer.span_names();
    for phase in [
        "core.build",
        "core.precompute",
        "core.launch",
        "core.backbone",
        "core.segmentation",
    ] {
        assert!(names.iter().any(|name| name == phase), "missing {phase} in {names:?}");
    }
    let build = layer.span("core.build").expect("build span");
    assert_eq!(build.fields.get("vertices").map(String::as_str), Some("7"));
    assert_eq!(build.fields.get("tree_type").map(String::as_str), Some("join"));
}

#[rstest]
fn skipping_segmentation_skips_its_span() {
    let (mesh, field) = load(&meshes::path(4));
    let engine = MergeTreeBuilder::new()
        .with_tree_type(TreeType::Split)
        .build()
        .expect("valid configuration");
    let layer = RecordingLayer::default();
    layer
        .capture(|| engine.build(&mesh, &field, false))
        .expect("build succeeds");
    assert!(layer.span("core.segmentation").is_none());
    assert!(layer.span("core.backbone").is_some());
}

#[rstest]
fn empty_mesh_warns() {
    let mesh = mergetree_core::AdjacencyGraph::from_edges(0, std::iter::empty())
        .expect("no edges");
    let field = mergetree_core::ScalarField::new(Vec::new()).expect("no values");
    let engine = MergeTreeBuilder::new().build().expect("valid configuration");
    let layer = RecordingLayer::default();
    let result = layer.capture(|| engine.build(&mesh, &field, false));
    assert!(result.is_err());
    assert!(
        layer
            .events()
            .iter()
            .any(|event| event.level == Level::WARN
                && event.message() == Some("mesh is empty, returning error"))
    );
}
