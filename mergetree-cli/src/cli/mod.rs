//! Command-line interface orchestration for the `mergetree` binary.
//!
//! The CLI offers a single `build` command that loads a text grid, builds its
//! join or split tree and reports the result as text or JSON.

mod commands;

pub use commands::{
    ArcReport, BuildCommand, Cli, CliError, Command, ConnectivityArg, ExecutionSummary,
    OutputFormat, TimingReport, TreeArg, TreeReport, render_summary, run_cli,
};
