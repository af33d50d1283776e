//! Per-kind fill rules.
//!
//! Each transform kind owns its arguments, derives the batch's dimensionality from them,
//! and writes its entries into an identity-seeded matrix for each sample.
//! Dispatch over dimensionality and composition with input matrices live in [crate::TransformOp],
//! so adding a kind does not touch either.
use std::{fmt::Debug, ops::RangeInclusive};

use crate::{AffineMatrix, MAX_NDIM, Scalar, TransformResult, Workspace};

mod rotation;
pub use rotation::Rotation;
mod scale;
pub use scale::Scale;
mod shear;
pub use shear::Shear;
mod translation;
pub use translation::Translation;

pub trait TransformKind<T: Scalar>: Debug + Send + Sync {
    /// Resolve this kind's arguments for the batch described by `ws`
    /// and return the number of spatial dimensions of the transform.
    ///
    /// Called once per batch, with a non-empty batch,
    /// before any call to [TransformKind::define].
    fn process_args(&mut self, ws: &Workspace<'_, T>) -> TransformResult<usize>;

    /// Write the matrix for one sample.
    ///
    /// `mat` is the identity on entry.
    /// `M - 1` is the dimensionality returned by the last [TransformKind::process_args],
    /// so implementations may index up to `M - 1` without further checks.
    fn define<const M: usize>(&self, sample: usize, mat: &mut AffineMatrix<T, M>);

    /// Whether every argument is a constant, so that all samples (and batches) get the same matrix.
    fn is_constant(&self) -> bool;

    /// Dimensionalities this kind can build.
    fn supported_ndim(&self) -> RangeInclusive<usize> {
        1..=MAX_NDIM
    }
}

/// Make the linear part of `mat` act about `center` rather than the origin,
/// i.e. add `center - L * center` to the translation column.
pub(crate) fn apply_center<T: Scalar, const M: usize>(mat: &mut AffineMatrix<T, M>, center: &[T]) {
    let ndim = M - 1;
    for r in 0..ndim {
        let mut shift = center[r];
        for (k, c) in center.iter().enumerate().take(ndim) {
            shift = shift - mat[(r, k)] * *c;
        }
        mat[(r, ndim)] += shift;
    }
}
