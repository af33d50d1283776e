use std::ops::RangeInclusive;

use crate::{
    AffineMatrix, Argument, Param, Scalar, TransformError, TransformResult, Workspace,
};

use super::{TransformKind, apply_center};

/// Shear the axes into each other, optionally about a center point.
///
/// Shear values are given either directly as factors, or as angles in degrees
/// (the factor being the tangent of the angle).
/// 2 values `[sx, sy]` give a 2D shear:
///
/// ```text
/// | 1  sx |
/// | sy  1 |
/// ```
///
/// 6 values `[sxy, sxz, syx, syz, szx, szy]` give a 3D shear:
///
/// ```text
/// | 1    sxy  sxz |
/// | syx  1    syz |
/// | szx  szy  1   |
/// ```
#[derive(Debug, Clone)]
pub struct Shear<T> {
    values: Argument<T>,
    in_degrees: bool,
    center: Argument<T>,
}

/// Off-diagonal positions, in the order shear values are given.
const OFF_DIAGONAL_2D: [(usize, usize); 2] = [(0, 1), (1, 0)];
const OFF_DIAGONAL_3D: [(usize, usize); 6] = [(0, 1), (0, 2), (1, 0), (1, 2), (2, 0), (2, 1)];

impl<T: Scalar> Shear<T> {
    pub fn from_factors(shear: Param<'_, T>) -> TransformResult<Self> {
        Ok(Self {
            values: Argument::from_param("shear", shear)?,
            in_degrees: false,
            center: Argument::absent("center"),
        })
    }

    /// Each angle must be strictly between -90 and 90 degrees.
    pub fn from_angles(angles: Param<'_, T>) -> TransformResult<Self> {
        Ok(Self {
            values: Argument::from_param("angles", angles)?,
            in_degrees: true,
            center: Argument::absent("center"),
        })
    }

    pub fn with_center(mut self, center: Param<'_, T>) -> TransformResult<Self> {
        self.center = Argument::from_param("center", center)?;
        Ok(self)
    }

    fn check_angles(&self) -> TransformResult<()> {
        if !self.in_degrees {
            return Ok(());
        }
        let limit = T::from_f64(90.0);
        let n_distinct = if self.values.is_arg_input() {
            self.values.size()
        } else {
            1
        };
        for sample in 0..n_distinct {
            if let Some(a) = self.values[sample].iter().find(|a| a.abs() >= limit) {
                return Err(TransformError::InvalidArgument(format!(
                    "shear angle {a:?} for sample {sample} is outside (-90, 90)"
                )));
            }
        }
        Ok(())
    }

    fn factor(&self, value: T) -> T {
        if self.in_degrees {
            value.to_radians().tan()
        } else {
            value
        }
    }
}

impl<T: Scalar> TransformKind<T> for Shear<T> {
    fn process_args(&mut self, ws: &Workspace<'_, T>) -> TransformResult<usize> {
        self.values.read(ws)?;
        self.center.read(ws)?;

        let ndim = match self.values.value_len().unwrap_or_default() {
            2 => 2,
            6 => 3,
            n => {
                return Err(TransformError::InvalidArgument(format!(
                    "`{}` needs 2 (2D) or 6 (3D) values, got {n}",
                    self.values.name()
                )));
            }
        };
        self.check_angles()?;
        self.center.expect_len(ndim)?;
        Ok(ndim)
    }

    fn define<const M: usize>(&self, sample: usize, mat: &mut AffineMatrix<T, M>) {
        let positions: &[(usize, usize)] = if M == 3 {
            &OFF_DIAGONAL_2D
        } else {
            &OFF_DIAGONAL_3D
        };
        for (&(r, c), v) in positions.iter().zip(self.values[sample].iter()) {
            mat[(r, c)] = self.factor(*v);
        }
        if let Some(center) = self.center.get(sample) {
            apply_center(mat, center);
        }
    }

    fn is_constant(&self) -> bool {
        !self.values.is_arg_input() && !self.center.is_arg_input()
    }

    fn supported_ndim(&self) -> RangeInclusive<usize> {
        2..=3
    }
}
