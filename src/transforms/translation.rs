use crate::{AffineMatrix, Argument, Param, Scalar, TransformResult, Workspace};

use super::TransformKind;

/// Translate by an offset vector.
///
/// The dimensionality of the transform is the length of the offset.
#[derive(Debug, Clone)]
pub struct Translation<T> {
    offset: Argument<T>,
}

impl<T: Scalar> Translation<T> {
    pub fn new(offset: Param<'_, T>) -> TransformResult<Self> {
        Ok(Self {
            offset: Argument::from_param("offset", offset)?,
        })
    }

    pub fn offset(&self) -> &Argument<T> {
        &self.offset
    }
}

impl<T: Scalar> TransformKind<T> for Translation<T> {
    fn process_args(&mut self, ws: &Workspace<'_, T>) -> TransformResult<usize> {
        self.offset.read(ws)?;
        Ok(self.offset.value_len().unwrap_or_default())
    }

    fn define<const M: usize>(&self, sample: usize, mat: &mut AffineMatrix<T, M>) {
        let ndim = M - 1;
        for (d, o) in self.offset[sample].iter().enumerate().take(ndim) {
            mat[(d, ndim)] = *o;
        }
    }

    fn is_constant(&self) -> bool {
        !self.offset.is_arg_input()
    }
}
