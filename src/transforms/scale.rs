use crate::{
    AffineMatrix, Argument, Param, Scalar, TransformError, TransformResult, Workspace,
};

use super::{TransformKind, apply_center};

/// Scale each axis by a factor, optionally about a center point.
///
/// A single factor is applied to every axis.
/// In that case the dimensionality comes from [Scale::with_ndim],
/// else from the center, else it is 1.
#[derive(Debug, Clone)]
pub struct Scale<T> {
    scale: Argument<T>,
    center: Argument<T>,
    ndim: Option<usize>,
}

impl<T: Scalar> Scale<T> {
    pub fn new(scale: Param<'_, T>) -> TransformResult<Self> {
        Ok(Self {
            scale: Argument::from_param("scale", scale)?,
            center: Argument::absent("center"),
            ndim: None,
        })
    }

    pub fn with_center(mut self, center: Param<'_, T>) -> TransformResult<Self> {
        self.center = Argument::from_param("center", center)?;
        Ok(self)
    }

    /// Fix the dimensionality, for when it cannot be inferred from the arguments.
    pub fn with_ndim(mut self, ndim: usize) -> Self {
        self.ndim = Some(ndim);
        self
    }

    fn resolve_ndim(&self) -> TransformResult<usize> {
        let scale_len = self.scale.value_len().unwrap_or_default();
        let ndim = match (self.ndim, self.center.value_len()) {
            (Some(n), _) => n,
            (None, _) if scale_len > 1 => scale_len,
            (None, Some(c)) => c,
            (None, None) => scale_len,
        };
        if scale_len != 1 && scale_len != ndim {
            return Err(TransformError::ShapeMismatch {
                name: self.scale.name(),
                sample: 0,
                expected: ndim,
                actual: scale_len,
            });
        }
        Ok(ndim)
    }
}

impl<T: Scalar> TransformKind<T> for Scale<T> {
    fn process_args(&mut self, ws: &Workspace<'_, T>) -> TransformResult<usize> {
        self.scale.read(ws)?;
        self.center.read(ws)?;
        let ndim = self.resolve_ndim()?;
        self.center.expect_len(ndim)?;
        Ok(ndim)
    }

    fn define<const M: usize>(&self, sample: usize, mat: &mut AffineMatrix<T, M>) {
        let ndim = M - 1;
        let scale = &self.scale[sample];
        for d in 0..ndim {
            mat[(d, d)] = if scale.len() == 1 { scale[0] } else { scale[d] };
        }
        if let Some(center) = self.center.get(sample) {
            apply_center(mat, center);
        }
    }

    fn is_constant(&self) -> bool {
        !self.scale.is_arg_input() && !self.center.is_arg_input()
    }
}
