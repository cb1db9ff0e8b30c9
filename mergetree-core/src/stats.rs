//! Build statistics reported alongside a [`crate::MergeTree`].

use std::time::Duration;

/// Outcome of the precompute phase.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PhaseOutcome {
    /// Valences and leaves were computed by this build.
    Completed,
    /// A reused [`crate::Precomputation`] made the phase unnecessary.
    AlreadyDone,
}

/// Wall-clock time spent in each build phase.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PhaseTimings {
    /// Valence counting and leaf detection.
    pub precompute: Duration,
    /// The parallel leaf sweep.
    pub leaves: Duration,
    /// Backbone completion, including its chunked assignment pass.
    pub backbone: Duration,
    /// Segmentation build, when requested.
    pub segmentation: Option<Duration>,
}

/// Summary of one build.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BuildStats {
    /// Whether precompute ran or was skipped.
    pub precompute: PhaseOutcome,
    /// Number of leaves (local extrema for the orientation).
    pub leaf_count: usize,
    /// Number of vertices resolved by the sequential backbone.
    pub backbone_nodes: usize,
    /// Number of vertices assigned by the backbone's chunked pass.
    pub backbone_vertices: usize,
    /// Deepest saddle continuation reached by any task.
    pub max_task_depth: usize,
    /// Per-phase timings.
    pub timings: PhaseTimings,
}

/// Leaf-to-root distances measured in arcs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeightStats {
    /// Longest leaf-to-root path.
    pub max: usize,
    /// Mean leaf-to-root path length.
    pub mean: f64,
    /// Population variance of the leaf-to-root path lengths.
    pub variance: f64,
    /// Standard deviation of the leaf-to-root path lengths.
    pub std_dev: f64,
}

#[cfg(feature = "metrics")]
pub(crate) fn record(stats: &BuildStats, tree_type: crate::TreeType) {
    let tree = tree_type.to_string();
    metrics::counter!("mergetree_builds_total", "tree" => tree.clone()).increment(1);
    metrics::histogram!("mergetree_leaves", "tree" => tree.clone())
        .record(stats.leaf_count as f64);
    let phases = [
        ("precompute", Some(stats.timings.precompute)),
        ("leaves", Some(stats.timings.leaves)),
        ("backbone", Some(stats.timings.backbone)),
        ("segmentation", stats.timings.segmentation),
    ];
    for (phase, elapsed) in phases {
        if let Some(elapsed) = elapsed {
            metrics::histogram!("mergetree_phase_seconds", "tree" => tree.clone(), "phase" => phase)
                .record(elapsed.as_secs_f64());
        }
    }
}
