//! Conversions between matrix batches and `ndarray` arrays of shape `[batch, ndim, ndim + 1]`.
use ndarray::{Array3, ArrayView3};

use crate::{MatrixBatch, MatrixBatchBuf, Scalar, TransformError, TransformResult};

impl<'a, T: Scalar> MatrixBatch<'a, T> {
    /// Borrow a standard-layout (C-contiguous) array as a matrix batch.
    pub fn from_array(array: &ArrayView3<'a, T>) -> TransformResult<Self> {
        let (_, nrows, ncols) = array.dim();
        let data = array.to_slice().ok_or_else(|| {
            TransformError::InvalidArgument("matrix array is not in standard layout".into())
        })?;
        Self::try_new(data, nrows, ncols)
    }
}

impl<T: Scalar> MatrixBatchBuf<T> {
    pub fn into_array(self) -> Array3<T> {
        let [len, nrows, ncols] = self.shape();
        Array3::from_shape_vec((len, nrows, ncols), self.into_data())
            .expect("batch data length matches its shape")
    }
}
