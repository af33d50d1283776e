use std::ops::{Index, IndexMut, Mul};

use crate::Scalar;

/// A homogeneous `M x M` matrix representing an affine map in `M - 1` dimensions.
///
/// The bottom row is always `[0, ..., 0, 1]`.
/// External storage only ever holds the top `M - 1` rows
/// (see [AffineMatrix::from_rows] and [AffineMatrix::write_rows]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMatrix<T, const M: usize> {
    /// Row-major data.
    data: [[T; M]; M],
}

impl<T: Scalar, const M: usize> Default for AffineMatrix<T, M> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<T, const M: usize> Index<(usize, usize)> for AffineMatrix<T, M> {
    type Output = T;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.data[index.0][index.1]
    }
}

impl<T, const M: usize> IndexMut<(usize, usize)> for AffineMatrix<T, M> {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        &mut self.data[index.0][index.1]
    }
}

impl<T: Scalar, const M: usize> AffineMatrix<T, M> {
    /// Number of spatial dimensions, i.e. one less than the matrix size.
    pub const NDIM: usize = M - 1;

    /// Number of values in the stored (top-rows) representation.
    pub const STORED_LEN: usize = (M - 1) * M;

    pub fn identity() -> Self {
        Self {
            data: std::array::from_fn(|r| {
                std::array::from_fn(|c| if r == c { T::ONE } else { T::ZERO })
            }),
        }
    }

    pub fn ndim(&self) -> usize {
        Self::NDIM
    }

    /// Pure translation by `offset`, which must have `M - 1` values.
    pub fn translation(offset: &[T]) -> Self {
        let mut mat = Self::identity();
        for (d, o) in offset.iter().enumerate().take(Self::NDIM) {
            mat[(d, Self::NDIM)] = *o;
        }
        mat
    }

    /// Read the top `M - 1` rows from row-major data.
    ///
    /// Panics if `rows` is shorter than [AffineMatrix::STORED_LEN].
    pub fn from_rows(rows: &[T]) -> Self {
        let mut mat = Self::identity();
        for (r, row) in rows.chunks_exact(M).take(Self::NDIM).enumerate() {
            mat.data[r].copy_from_slice(row);
        }
        mat
    }

    /// Write the top `M - 1` rows as row-major data.
    ///
    /// Panics if `buf` is shorter than [AffineMatrix::STORED_LEN].
    pub fn write_rows(&self, buf: &mut [T]) {
        for (row, out) in self.data.iter().zip(buf.chunks_exact_mut(M)) {
            out.copy_from_slice(row);
        }
    }

    /// The translation column, i.e. the top `M - 1` entries of the last column.
    pub fn offset(&self) -> impl Iterator<Item = T> + '_ {
        self.data[..Self::NDIM].iter().map(|row| row[Self::NDIM])
    }

    /// Apply the transformation to a point of `M - 1` values.
    /// Writes to a pre-allocated output buffer.
    pub fn transform_into(&self, pt: &[T], buf: &mut [T]) {
        for (row, out) in self.data[..Self::NDIM].iter().zip(buf.iter_mut()) {
            let mut acc = row[Self::NDIM];
            for (m, p) in row.iter().zip(pt.iter()) {
                acc += *m * *p;
            }
            *out = acc;
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Determinant of the linear (top-left `M - 1` square) block.
    pub fn linear_determinant(&self) -> T {
        if Self::NDIM == 0 {
            return T::ONE;
        }
        self.minor(0, 0)
    }

    /// Laplace expansion along row `row`, over the columns not set in `used_cols`.
    fn minor(&self, row: usize, used_cols: u32) -> T {
        if row == Self::NDIM - 1 {
            let col = (0..Self::NDIM)
                .find(|c| used_cols & (1 << c) == 0)
                .unwrap_or(0);
            return self.data[row][col];
        }
        let mut det = T::ZERO;
        let mut negate = false;
        for c in 0..Self::NDIM {
            if used_cols & (1 << c) != 0 {
                continue;
            }
            let term = self.data[row][c] * self.minor(row + 1, used_cols | (1 << c));
            det += if negate { -term } else { term };
            negate = !negate;
        }
        det
    }
}

/// Affine composition: `(a * b)` applies `b` first, then `a`.
impl<T: Scalar, const M: usize> Mul for AffineMatrix<T, M> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        let ndim = Self::NDIM;
        let mut out = Self::identity();
        for r in 0..ndim {
            for c in 0..M {
                // the implicit bottom row of rhs only contributes to the last column
                let mut acc = if c == ndim { self.data[r][ndim] } else { T::ZERO };
                for k in 0..ndim {
                    acc += self.data[r][k] * rhs.data[k][c];
                }
                out.data[r][c] = acc;
            }
        }
        out
    }
}
