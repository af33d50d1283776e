//! Flat storage for batches of affine matrices.
//!
//! Each sample is stored as the top `nrows` rows of its homogeneous matrix,
//! row-major, and samples are laid out consecutively.
//! For a well-formed batch of `ndim`-dimensional transforms,
//! `nrows == ndim` and `ncols == ndim + 1`.

use crate::{Scalar, TransformError, TransformResult};

/// Read-only view of a batch of matrices, e.g. the prior transforms to compose with.
#[derive(Debug, Clone, Copy)]
pub struct MatrixBatch<'a, T> {
    data: &'a [T],
    nrows: usize,
    ncols: usize,
}

impl<'a, T: Scalar> MatrixBatch<'a, T> {
    pub fn try_new(data: &'a [T], nrows: usize, ncols: usize) -> TransformResult<Self> {
        let stride = nrows * ncols;
        if stride == 0 {
            return Err(TransformError::InvalidArgument(format!(
                "matrix shape {nrows}x{ncols} is empty"
            )));
        }
        if data.len() % stride != 0 {
            return Err(TransformError::InvalidArgument(format!(
                "matrix batch data length {} is not divisible by {nrows}x{ncols}",
                data.len()
            )));
        }
        Ok(Self { data, nrows, ncols })
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.stride()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    fn stride(&self) -> usize {
        self.nrows * self.ncols
    }

    /// Row-major data for one sample.
    pub fn get(&self, idx: usize) -> Option<&'a [T]> {
        let stride = self.stride();
        self.data.get(idx * stride..(idx + 1) * stride)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [T]> {
        self.data.chunks_exact(self.stride())
    }

    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }
}

/// An owned batch of `ndim x (ndim + 1)` matrices, as produced by [crate::TransformOp::run].
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixBatchBuf<T> {
    data: Vec<T>,
    ndim: usize,
}

impl<T: Scalar> MatrixBatchBuf<T> {
    pub(crate) fn new(data: Vec<T>, ndim: usize) -> Self {
        Self { data, ndim }
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    pub fn len(&self) -> usize {
        match self.ndim {
            0 => 0,
            n => self.data.len() / (n * (n + 1)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `[batch_size, ndim, ndim + 1]`
    pub fn shape(&self) -> [usize; 3] {
        [self.len(), self.ndim, self.ndim + 1]
    }

    pub fn get(&self, idx: usize) -> Option<&[T]> {
        self.view().and_then(|v| v.get(idx))
    }

    /// Borrow as a batch view, e.g. to chain into another operator.
    /// `None` for an empty batch whose dimensionality was never resolved.
    pub fn view(&self) -> Option<MatrixBatch<'_, T>> {
        MatrixBatch::try_new(&self.data, self.ndim, self.ndim + 1).ok()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }
}
