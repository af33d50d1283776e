use std::ops::RangeInclusive;

use thiserror::Error;

/// Errors raised while resolving arguments or generating a batch of matrices.
///
/// None of these are recoverable within a batch;
/// output slots must not be read after a failed call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// Per-sample values of one argument do not share a length.
    #[error("argument `{name}`: sample {sample} has {actual} values, expected {expected}")]
    ShapeMismatch {
        name: &'static str,
        sample: usize,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported dimensionality {ndim}, expected one of {supported:?}")]
    UnsupportedDimensionality {
        ndim: usize,
        supported: RangeInclusive<usize>,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The input matrices do not have shape `(ndim, ndim + 1)`.
    #[error("input matrices are {rows}x{cols}, expected {ndim}x{}", .ndim + 1)]
    DimensionMismatch { ndim: usize, rows: usize, cols: usize },

    #[error("`{name}` has {actual} samples, batch has {expected}")]
    BatchSizeMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("output buffer has {actual} values, expected {expected}")]
    OutputSize { expected: usize, actual: usize },

    #[error("arguments have not been resolved for this batch")]
    Unresolved,
}

pub type TransformResult<T> = Result<T, TransformError>;
