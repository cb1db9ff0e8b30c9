//! Command implementations and argument parsing for the `mergetree` CLI.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use mergetree_core::{
    DEFAULT_CHUNK_COUNT, MergeTree, MergeTreeBuilder, MergeTreeError, MergeTreeErrorCode,
    TreeType,
};
use mergetree_providers_grid::{Connectivity, GridField, GridProviderError};
use serde::Serialize;
use thiserror::Error;
use tracing::{Span, field, info, instrument};

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(name = "mergetree", about = "Build merge trees of scalar fields sampled on grids.")]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Build the join or split tree of a text grid.
    Build(BuildCommand),
}

/// Options accepted by the `build` command.
#[derive(Debug, Args, Clone)]
pub struct BuildCommand {
    /// Path to a grid file: a `<width> <height>` header then row-major values.
    pub path: PathBuf,

    /// Which tree to build.
    #[arg(long, value_enum, default_value_t = TreeArg::Join)]
    pub tree: TreeArg,

    /// How grid points are connected.
    #[arg(long, value_enum, default_value_t = ConnectivityArg::Quad)]
    pub connectivity: ConnectivityArg,

    /// Also assign every regular vertex to its arc.
    #[arg(long)]
    pub segmentation: bool,

    /// Run on a dedicated pool of this many threads instead of the global one.
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub threads: Option<usize>,

    /// Number of chunks the vertex range is split into for parallel passes.
    #[arg(long = "chunks", default_value_t = DEFAULT_CHUNK_COUNT)]
    pub chunk_count: usize,

    /// Output format for the summary.
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Override name for the grid (defaults to the file name).
    #[arg(long)]
    pub name: Option<String>,
}

/// Tree orientation accepted on the command line.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum TreeArg {
    /// Sweep upwards from the minima.
    Join,
    /// Sweep downwards from the maxima.
    Split,
}

impl From<TreeArg> for TreeType {
    fn from(value: TreeArg) -> Self {
        match value {
            TreeArg::Join => Self::Join,
            TreeArg::Split => Self::Split,
        }
    }
}

/// Grid connectivity accepted on the command line.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum ConnectivityArg {
    /// Four axis-aligned neighbours.
    Quad,
    /// Quads split along the down-right diagonal.
    Triangulated,
}

impl From<ConnectivityArg> for Connectivity {
    fn from(value: ConnectivityArg) -> Self {
        match value {
            ConnectivityArg::Quad => Self::Quad,
            ConnectivityArg::Triangulated => Self::Triangulated,
        }
    }
}

/// Summary rendering style.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Plain `key: value` lines followed by one line per arc.
    Human,
    /// A single pretty-printed JSON document.
    Json,
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The grid file could not be opened.
    #[error("failed to open `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// Grid parsing failed.
    #[error(transparent)]
    Grid(#[from] GridProviderError),
    /// Configuring the engine or building the tree failed.
    #[error(transparent)]
    Core(#[from] MergeTreeError),
}

impl CliError {
    /// Stable code of the underlying engine error, when there is one.
    #[must_use]
    pub fn code(&self) -> Option<MergeTreeErrorCode> {
        match self {
            Self::Core(error) | Self::Grid(GridProviderError::Core(error)) => Some(error.code()),
            _ => None,
        }
    }
}

/// Per-phase wall-clock times in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingReport {
    /// Valence counting and leaf detection.
    pub precompute: f64,
    /// Parallel leaf sweep.
    pub leaves: f64,
    /// Backbone completion.
    pub backbone: f64,
    /// Segmentation, when requested.
    pub segmentation: Option<f64>,
}

/// One visible arc, described by grid vertices.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct ArcReport {
    /// Vertex of the lower node in sweep order.
    pub down: usize,
    /// Vertex of the upper node.
    pub up: Option<usize>,
    /// Vertices swept along the arc, counting its down node.
    pub seen: usize,
}

/// Shape of a built tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeReport {
    /// `join` or `split`.
    pub tree_type: String,
    /// Number of grid vertices.
    pub vertices: usize,
    /// Number of nodes.
    pub nodes: usize,
    /// Number of leaves.
    pub leaves: usize,
    /// Number of nodes merging several arcs.
    pub saddles: usize,
    /// Number of roots, one per connected component.
    pub roots: usize,
    /// Whether arc regions were computed.
    pub segmented: bool,
    /// Longest leaf-to-root path in arcs.
    pub max_height: Option<usize>,
    /// Mean leaf-to-root path in arcs.
    pub mean_height: Option<f64>,
    /// Vertices resolved by the sequential backbone.
    pub backbone_nodes: usize,
    /// Deepest saddle continuation reached.
    pub max_task_depth: usize,
    /// Phase timings.
    pub timings_ms: TimingReport,
    /// Visible arcs in arena order.
    pub arcs: Vec<ArcReport>,
}

impl TreeReport {
    /// Summarises `tree`.
    #[must_use]
    pub fn from_tree(tree: &MergeTree) -> Self {
        let vertex_of = |node: mergetree_core::NodeId| {
            tree.node(node).map(mergetree_core::Node::vertex).unwrap_or(usize::MAX)
        };
        let stats = tree.stats();
        let heights = tree.height_stats();
        Self {
            tree_type: tree.tree_type().to_string(),
            vertices: tree.vertex_count(),
            nodes: tree.node_count(),
            leaves: tree.leaves().len(),
            saddles: tree.saddles().count(),
            roots: tree.roots().len(),
            segmented: tree.is_segmented(),
            max_height: heights.map(|heights| heights.max),
            mean_height: heights.map(|heights| heights.mean),
            backbone_nodes: stats.backbone_nodes,
            max_task_depth: stats.max_task_depth,
            timings_ms: TimingReport {
                precompute: millis(stats.timings.precompute),
                leaves: millis(stats.timings.leaves),
                backbone: millis(stats.timings.backbone),
                segmentation: stats.timings.segmentation.map(millis),
            },
            arcs: tree
                .visible_arcs()
                .map(|(_, arc)| ArcReport {
                    down: vertex_of(arc.down()),
                    up: arc.up().map(vertex_of),
                    seen: arc.seen(),
                })
                .collect(),
        }
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

/// Outcome of executing a CLI command.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    /// Name of the loaded grid.
    pub grid: String,
    /// Grid width.
    pub width: usize,
    /// Grid height.
    pub height: usize,
    /// Requested output format.
    #[serde(skip)]
    pub format: OutputFormat,
    /// Shape of the built tree.
    pub tree: TreeReport,
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when loading the grid or building the tree fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use mergetree_cli::cli::{
/// #     BuildCommand, Cli, Command, ConnectivityArg, OutputFormat, TreeArg, run_cli,
/// # };
/// # use tempfile::NamedTempFile;
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let file = NamedTempFile::new()?;
/// std::fs::write(file.path(), "3 1\n0 2 1\n")?;
/// let cli = Cli {
///     command: Command::Build(BuildCommand {
///         path: file.path().to_path_buf(),
///         tree: TreeArg::Join,
///         connectivity: ConnectivityArg::Quad,
///         segmentation: true,
///         threads: None,
///         chunk_count: 4,
///         format: OutputFormat::Human,
///         name: None,
///     }),
/// };
/// let summary = run_cli(cli)?;
/// assert_eq!(summary.tree.leaves, 2);
/// assert_eq!(summary.tree.saddles, 1);
/// # Ok(())
/// # }
/// ```
#[instrument(
    name = "cli.run",
    err,
    skip(cli),
    fields(command = field::Empty),
)]
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    match cli.command {
        Command::Build(build) => {
            Span::current().record("command", field::display("build"));
            run_command(build)
        }
    }
}

#[instrument(
    name = "cli.execute",
    err,
    skip(command),
    fields(
        tree = field::Empty,
        segmentation = command.segmentation,
        threads = field::Empty,
    ),
)]
pub(super) fn run_command(command: BuildCommand) -> Result<ExecutionSummary, CliError> {
    let BuildCommand {
        path,
        tree,
        connectivity,
        segmentation,
        threads,
        chunk_count,
        format,
        name,
    } = command;
    let tree_type = TreeType::from(tree);
    let span = Span::current();
    span.record("tree", field::display(tree_type));
    if let Some(threads) = threads {
        span.record("threads", threads);
    }

    let mut builder = MergeTreeBuilder::new()
        .with_tree_type(tree_type)
        .with_chunk_count(chunk_count);
    if let Some(threads) = threads {
        builder = builder.with_threads(threads);
    }
    let engine = builder.build()?;

    let grid_name = derive_grid_name(&path, name.as_deref());
    let reader = open_grid_reader(&path)?;
    let grid = GridField::try_from_reader(grid_name, reader, connectivity.into())?;
    let built = engine.build(&grid, &grid, segmentation)?;
    let report = TreeReport::from_tree(&built);

    info!(
        grid = grid.name(),
        nodes = report.nodes,
        arcs = report.arcs.len(),
        "command completed"
    );
    Ok(ExecutionSummary {
        grid: grid.name().to_owned(),
        width: grid.width(),
        height: grid.height(),
        format,
        tree: report,
    })
}

#[instrument(name = "cli.open_grid_reader", err, fields(path = field::Empty))]
pub(super) fn open_grid_reader(path: &Path) -> Result<BufReader<File>, CliError> {
    Span::current().record("path", field::display(path.display()));
    let file = File::open(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

pub(super) fn derive_grid_name(path: &Path, override_name: Option<&str>) -> String {
    if let Some(name) = override_name {
        return name.to_owned();
    }

    path.file_stem()
        .and_then(|value| value.to_str())
        .map_or_else(|| "grid".to_owned(), ToOwned::to_owned)
}

/// Renders `summary` to `writer` in its requested format.
///
/// # Errors
/// Returns [`io::Error`] if writing or serialising fails.
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    match summary.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, summary)?;
            writeln!(writer)
        }
        OutputFormat::Human => render_human(summary, writer),
    }
}

fn render_human(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    let tree = &summary.tree;
    writeln!(writer, "grid: {} ({}x{})", summary.grid, summary.width, summary.height)?;
    writeln!(writer, "tree: {}", tree.tree_type)?;
    writeln!(
        writer,
        "nodes: {} (leaves {}, saddles {}, roots {})",
        tree.nodes, tree.leaves, tree.saddles, tree.roots
    )?;
    writeln!(writer, "arcs: {}", tree.arcs.len())?;
    if let (Some(max), Some(mean)) = (tree.max_height, tree.mean_height) {
        writeln!(writer, "height: max {max}, mean {mean:.2}")?;
    }
    for arc in &tree.arcs {
        match arc.up {
            Some(up) => writeln!(writer, "{}\t{}\t{}", arc.down, up, arc.seen)?,
            None => writeln!(writer, "{}\t-\t{}", arc.down, arc.seen)?,
        }
    }
    Ok(())
}
