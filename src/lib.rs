//! Affine transformation matrices for batches of samples in a data-augmentation pipeline.
//!
//! A [TransformOp] wraps one [TransformKind] ([Translation], [Scale], [Rotation] or [Shear]).
//! For each batch, it resolves the kind's [Argument]s from a [Workspace]
//! (constants, or one value sequence per sample),
//! infers the dimensionality, and writes one `ndim x (ndim + 1)` matrix per sample
//! into caller-owned storage,
//! composing with prior transforms if the workspace carries them.
use smallvec::SmallVec;


mod argument;
pub use argument::{ArgSource, Argument, Param};
mod batch;
pub use batch::{MatrixBatch, MatrixBatchBuf};
mod error;
pub use error::{TransformError, TransformResult};
mod matrix;
pub use matrix::AffineMatrix;
#[cfg(feature = "ndarray")]
mod ndarr;
mod op;
pub use op::{TransformOp, TransformOpBuilder};
mod scalar;
pub use scalar::Scalar;
pub mod transforms;
pub use transforms::{Rotation, Scale, Shear, TransformKind, Translation};
mod workspace;
pub use workspace::Workspace;

/// Highest supported dimensionality.
pub const MAX_NDIM: usize = 6;

/// A short vector type alias for convenience,
/// sized to hold any single argument value sequence inline.
type ShortVec<T> = SmallVec<[T; MAX_NDIM]>;
