use std::ops::RangeInclusive;

use crate::{
    AffineMatrix, Argument, Param, Scalar, TransformError, TransformResult, Workspace,
};

use super::{TransformKind, apply_center};

/// Rotate by an angle in degrees, optionally about a center point.
///
/// Without an axis this is a 2D rotation (counter-clockwise for positive angles).
/// With an axis it is a 3D rotation about that axis, following the right-hand rule.
#[derive(Debug, Clone)]
pub struct Rotation<T> {
    angle: Argument<T>,
    axis: Argument<T>,
    center: Argument<T>,
}

impl<T: Scalar> Rotation<T> {
    pub fn new(angle: Param<'_, T>) -> TransformResult<Self> {
        Ok(Self {
            angle: Argument::from_param("angle", angle)?,
            axis: Argument::absent("axis"),
            center: Argument::absent("center"),
        })
    }

    pub fn with_axis(mut self, axis: Param<'_, T>) -> TransformResult<Self> {
        self.axis = Argument::from_param("axis", axis)?;
        Ok(self)
    }

    pub fn with_center(mut self, center: Param<'_, T>) -> TransformResult<Self> {
        self.center = Argument::from_param("center", center)?;
        Ok(self)
    }

    fn check_axes(&self) -> TransformResult<()> {
        if !self.axis.is_defined() {
            return Ok(());
        }
        let n_distinct = if self.axis.is_arg_input() {
            self.axis.size()
        } else {
            1
        };
        for sample in 0..n_distinct {
            if unit_axis(&self.axis[sample]).is_none() {
                return Err(TransformError::InvalidArgument(format!(
                    "rotation axis for sample {sample} has zero length"
                )));
            }
        }
        Ok(())
    }
}

/// Normalize a 3-vector, or `None` if it has no direction.
///
/// Components are divided by the largest magnitude before squaring,
/// so neither huge nor tiny axes overflow or underflow.
fn unit_axis<T: Scalar>(v: &[T]) -> Option<[T; 3]> {
    let mut max = T::ZERO;
    for x in v.iter() {
        let a = x.abs();
        if a > max {
            max = a;
        }
    }
    if max == T::ZERO || !max.is_finite() {
        return None;
    }

    let scaled = [v[0] / max, v[1] / max, v[2] / max];
    let mut sq = T::ZERO;
    for x in scaled.iter() {
        sq += *x * *x;
    }
    let len = sq.sqrt();
    if !len.is_finite() || len == T::ZERO {
        return None;
    }
    Some([scaled[0] / len, scaled[1] / len, scaled[2] / len])
}

impl<T: Scalar> TransformKind<T> for Rotation<T> {
    fn process_args(&mut self, ws: &Workspace<'_, T>) -> TransformResult<usize> {
        self.angle.read(ws)?;
        self.axis.read(ws)?;
        self.center.read(ws)?;

        self.angle.expect_len(1)?;
        self.axis.expect_len(3)?;
        self.check_axes()?;

        let ndim = if self.axis.is_defined() { 3 } else { 2 };
        self.center.expect_len(ndim)?;
        Ok(ndim)
    }

    fn define<const M: usize>(&self, sample: usize, mat: &mut AffineMatrix<T, M>) {
        let angle = self.angle[sample][0].to_radians();
        let (sin, cos) = (angle.sin(), angle.cos());

        if let Some([x, y, z]) = self.axis.get(sample).and_then(unit_axis) {
            let k = T::ONE - cos;

            mat[(0, 0)] = cos + x * x * k;
            mat[(0, 1)] = x * y * k - z * sin;
            mat[(0, 2)] = x * z * k + y * sin;

            mat[(1, 0)] = y * x * k + z * sin;
            mat[(1, 1)] = cos + y * y * k;
            mat[(1, 2)] = y * z * k - x * sin;

            mat[(2, 0)] = z * x * k - y * sin;
            mat[(2, 1)] = z * y * k + x * sin;
            mat[(2, 2)] = cos + z * z * k;
        } else {
            mat[(0, 0)] = cos;
            mat[(0, 1)] = -sin;
            mat[(1, 0)] = sin;
            mat[(1, 1)] = cos;
        }

        if let Some(center) = self.center.get(sample) {
            apply_center(mat, center);
        }
    }

    fn is_constant(&self) -> bool {
        !self.angle.is_arg_input() && !self.axis.is_arg_input() && !self.center.is_arg_input()
    }

    fn supported_ndim(&self) -> RangeInclusive<usize> {
        2..=3
    }
}
