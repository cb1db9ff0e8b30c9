//! Support library for the `mergetree` binary.
//!
//! Re-exports the command pipeline and logging set-up so doctests and
//! integration tests can drive the CLI without forking a subprocess.

pub mod cli;
pub mod logging;
