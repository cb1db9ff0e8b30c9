use mergetree_core::MergeTreeError;
use thiserror::Error;

/// Errors raised while loading a grid.
#[derive(Debug, Error)]
pub enum GridProviderError {
    /// The input held no header line.
    #[error("input contains no grid header")]
    EmptyInput,
    /// The header line is not two positive integers.
    #[error("line {line}: expected `<width> <height>` but found `{content}`")]
    InvalidHeader {
        /// One-based line number of the header.
        line: usize,
        /// Raw header text.
        content: String,
    },
    /// One of the dimensions is zero.
    #[error("grid dimensions must be positive (got {width}x{height})")]
    ZeroDimension {
        /// Requested width.
        width: usize,
        /// Requested height.
        height: usize,
    },
    /// The vertex count does not fit in `usize`.
    #[error("grid of {width}x{height} exceeds capacity limits")]
    CapacityOverflow {
        /// Requested width.
        width: usize,
        /// Requested height.
        height: usize,
    },
    /// A token could not be parsed as a number.
    #[error("line {line}: `{token}` is not a number")]
    InvalidValue {
        /// One-based line number holding the token.
        line: usize,
        /// The offending token.
        token: String,
    },
    /// The body held too few or too many values.
    #[error("expected {expected} values but found {actual}")]
    ValueCount {
        /// `width * height`.
        expected: usize,
        /// Number of values read.
        actual: usize,
    },
    /// The values were rejected by the scalar order.
    #[error(transparent)]
    Core(#[from] MergeTreeError),
    /// Reading the input failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
