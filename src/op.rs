//! The per-batch engine: dimensionality dispatch, per-sample generation and composition.
use crate::{
    AffineMatrix, MAX_NDIM, MatrixBatch, MatrixBatchBuf, Scalar, TransformError, TransformKind,
    TransformResult, Workspace,
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Per-batch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    ArgumentsResolved { batch_size: usize, ndim: usize },
}

/// Generates one affine matrix per sample from a [TransformKind],
/// optionally composed with prior transforms supplied in the workspace.
///
/// Per batch, call [TransformOp::process_args] and then [TransformOp::define_transforms]
/// (or [TransformOp::run], which does both).
#[derive(Debug, Clone)]
pub struct TransformOp<T: Scalar, K: TransformKind<T>> {
    kind: K,
    reverse_order: bool,
    stage: Stage,
    _scalar: std::marker::PhantomData<T>,
}

impl<T: Scalar, K: TransformKind<T>> TransformOp<T, K> {
    pub fn new(kind: K) -> Self {
        Self::builder(kind).build()
    }

    pub fn builder(kind: K) -> TransformOpBuilder<T, K> {
        TransformOpBuilder::new(kind)
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    /// Whether input matrices are applied after, rather than before, this transform.
    pub fn reverse_order(&self) -> bool {
        self.reverse_order
    }

    /// Whether the generated matrix is the same for every sample and every batch,
    /// i.e. all arguments are constants.
    /// Composition with input matrices is not considered.
    pub fn is_constant_transform(&self) -> bool {
        self.kind.is_constant()
    }

    /// Resolved dimensionality for the current batch.
    pub fn ndim(&self) -> Option<usize> {
        match self.stage {
            Stage::ArgumentsResolved { ndim, .. } => Some(ndim),
            Stage::Idle => None,
        }
    }

    /// `[batch_size, ndim, ndim + 1]` for the current batch.
    pub fn output_shape(&self) -> Option<[usize; 3]> {
        match self.stage {
            Stage::ArgumentsResolved { batch_size, ndim } => Some([batch_size, ndim, ndim + 1]),
            Stage::Idle => None,
        }
    }

    /// Number of output values needed for the current batch.
    pub fn output_len(&self) -> Option<usize> {
        self.output_shape().map(|s| s.iter().product())
    }

    /// Resolve arguments for the batch described by `ws`, fixing its dimensionality.
    pub fn process_args(&mut self, ws: &Workspace<'_, T>) -> TransformResult<()> {
        self.stage = Stage::Idle;
        let batch_size = ws.batch_size();
        if batch_size == 0 {
            log::debug!("empty batch, nothing to resolve");
            self.stage = Stage::ArgumentsResolved {
                batch_size,
                ndim: 0,
            };
            return Ok(());
        }

        let ndim = self.kind.process_args(ws)?;
        if ndim == 0 {
            return Err(TransformError::InvalidArgument(
                "an affine transform needs at least one dimension".into(),
            ));
        }
        let supported = self.kind.supported_ndim();
        if ndim > MAX_NDIM || !supported.contains(&ndim) {
            return Err(TransformError::UnsupportedDimensionality { ndim, supported });
        }

        check_input(ws.input(), batch_size, ndim)?;

        log::debug!(
            "resolved {}D transform for {} samples (constant: {})",
            ndim,
            batch_size,
            self.is_constant_transform()
        );
        self.stage = Stage::ArgumentsResolved { batch_size, ndim };
        Ok(())
    }

    /// Fill `out` with the matrices for the batch whose arguments were last resolved.
    ///
    /// `out` holds `batch_size` consecutive row-major `ndim x (ndim + 1)` blocks.
    /// `ws` must carry the same input matrices as were given to [TransformOp::process_args].
    pub fn define_transforms(
        &mut self,
        ws: &Workspace<'_, T>,
        out: &mut [T],
    ) -> TransformResult<()> {
        let Stage::ArgumentsResolved { batch_size, ndim } = self.stage else {
            return Err(TransformError::Unresolved);
        };
        let expected = batch_size * ndim * (ndim + 1);
        if out.len() != expected {
            return Err(TransformError::OutputSize {
                expected,
                actual: out.len(),
            });
        }
        let input = ws.input().copied();
        if batch_size > 0 {
            check_input(input.as_ref(), batch_size, ndim)?;
        }

        match ndim {
            0 => {}
            1 => self.fill::<2>(input, out),
            2 => self.fill::<3>(input, out),
            3 => self.fill::<4>(input, out),
            4 => self.fill::<5>(input, out),
            5 => self.fill::<6>(input, out),
            6 => self.fill::<7>(input, out),
            _ => {
                return Err(TransformError::UnsupportedDimensionality {
                    ndim,
                    supported: self.kind.supported_ndim(),
                });
            }
        }
        self.stage = Stage::Idle;
        Ok(())
    }

    /// Resolve arguments and generate matrices into a newly-allocated batch.
    pub fn run(&mut self, ws: &Workspace<'_, T>) -> TransformResult<MatrixBatchBuf<T>> {
        self.process_args(ws)?;
        let ndim = self.ndim().ok_or(TransformError::Unresolved)?;
        let len = self.output_len().ok_or(TransformError::Unresolved)?;
        let mut data = vec![T::ZERO; len];
        self.define_transforms(ws, &mut data)?;
        Ok(MatrixBatchBuf::new(data, ndim))
    }

    fn generate<const M: usize>(&self, sample: usize) -> AffineMatrix<T, M> {
        let mut mat = AffineMatrix::identity();
        self.kind.define(sample, &mut mat);
        mat
    }

    fn compose<const M: usize>(
        &self,
        generated: AffineMatrix<T, M>,
        prior: &[T],
    ) -> AffineMatrix<T, M> {
        let prior = AffineMatrix::from_rows(prior);
        if self.reverse_order {
            prior * generated
        } else {
            generated * prior
        }
    }

    fn fill<const M: usize>(&self, input: Option<MatrixBatch<'_, T>>, out: &mut [T]) {
        let stride = AffineMatrix::<T, M>::STORED_LEN;

        if input.is_none() && self.kind.is_constant() {
            log::trace!("constant transform, broadcasting one matrix");
            let mat = self.generate::<M>(0);
            for_each_slot(out, stride, |_, slot| mat.write_rows(slot));
            return;
        }

        for_each_slot(out, stride, |idx, slot| {
            let mut mat = self.generate::<M>(idx);
            if let Some(prior) = input.as_ref().and_then(|b| b.get(idx)) {
                mat = self.compose(mat, prior);
            }
            mat.write_rows(slot);
        });
    }
}

fn check_input<T: Scalar>(
    input: Option<&MatrixBatch<'_, T>>,
    batch_size: usize,
    ndim: usize,
) -> TransformResult<()> {
    let Some(input) = input else {
        return Ok(());
    };
    if input.nrows() != ndim || input.ncols() != ndim + 1 {
        return Err(TransformError::DimensionMismatch {
            ndim,
            rows: input.nrows(),
            cols: input.ncols(),
        });
    }
    if input.len() != batch_size {
        return Err(TransformError::BatchSizeMismatch {
            name: "input",
            expected: batch_size,
            actual: input.len(),
        });
    }
    Ok(())
}

/// Run `f` on each sample's output slot, in parallel where enabled.
fn for_each_slot<T, F>(out: &mut [T], stride: usize, f: F)
where
    T: Scalar,
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    #[cfg(feature = "parallel")]
    out.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(idx, slot)| f(idx, slot));

    #[cfg(not(feature = "parallel"))]
    out.chunks_mut(stride)
        .enumerate()
        .for_each(|(idx, slot)| f(idx, slot));
}

pub struct TransformOpBuilder<T: Scalar, K: TransformKind<T>> {
    kind: K,
    reverse_order: bool,
    _scalar: std::marker::PhantomData<T>,
}

impl<T: Scalar, K: TransformKind<T>> TransformOpBuilder<T, K> {
    fn new(kind: K) -> Self {
        Self {
            kind,
            reverse_order: false,
            _scalar: std::marker::PhantomData,
        }
    }

    /// By default input matrices are applied first and this transform after them
    /// (`output = generated * input`).
    /// With `reverse_order`, this transform is applied first (`output = input * generated`).
    pub fn reverse_order(mut self, reverse_order: bool) -> Self {
        self.reverse_order = reverse_order;
        self
    }

    pub fn build(self) -> TransformOp<T, K> {
        TransformOp {
            kind: self.kind,
            reverse_order: self.reverse_order,
            stage: Stage::Idle,
            _scalar: std::marker::PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{homogeneous_rows, init_logger};
    use crate::{Param, Rotation, Scale, Shear, Translation};
    use approx::assert_relative_eq;

    fn translation_op(offset: Param<'_, f64>) -> TransformOp<f64, Translation<f64>> {
        TransformOp::new(Translation::new(offset).unwrap())
    }

    #[test]
    fn test_end_to_end() {
        init_logger();
        let offsets = [vec![1.0, 2.0], vec![3.0, 4.0]];
        let ws = Workspace::new(2).with_arg_input("offset", &offsets);
        let mut op = translation_op(Param::PerSample);
        assert!(!op.is_constant_transform());

        op.process_args(&ws).unwrap();
        assert_eq!(op.ndim(), Some(2));
        assert_eq!(op.output_shape(), Some([2, 2, 3]));

        let mut out = vec![f64::NAN; 12];
        op.define_transforms(&ws, &mut out).unwrap();
        assert_eq!(
            homogeneous_rows(&out, 2),
            vec![
                vec![vec![1.0, 0.0, 1.0], vec![0.0, 1.0, 2.0], vec![0.0, 0.0, 1.0]],
                vec![vec![1.0, 0.0, 3.0], vec![0.0, 1.0, 4.0], vec![0.0, 0.0, 1.0]],
            ]
        );
        assert_eq!(op.ndim(), None);
    }

    #[test]
    fn test_end_to_end_with_input() {
        let offsets = [vec![1.0, 2.0], vec![3.0, 4.0]];
        #[rustfmt::skip]
        let prior = [
            1.0, 0.0, 5.0,
            0.0, 1.0, 5.0,

            1.0, 0.0, 0.0,
            0.0, 1.0, 0.0,
        ];
        let ws = Workspace::new(2)
            .with_arg_input("offset", &offsets)
            .with_input(MatrixBatch::try_new(&prior, 2, 3).unwrap());

        let out = translation_op(Param::PerSample).run(&ws).unwrap();
        assert_eq!(out.shape(), [2, 2, 3]);
        assert_eq!(out.get(0).unwrap(), &[1.0, 0.0, 6.0, 0.0, 1.0, 7.0]);
        assert_eq!(out.get(1).unwrap(), &[1.0, 0.0, 3.0, 0.0, 1.0, 4.0]);
    }

    #[test]
    fn test_block_structure_for_all_dims() {
        for ndim in 1..=MAX_NDIM {
            let offset: Vec<f64> = (0..ndim).map(|d| d as f64 * 1.5 - 2.0).collect();
            let mut op = translation_op(Param::Constant(&offset));
            let out = op.run(&Workspace::new(3)).unwrap();
            assert_eq!(out.shape(), [3, ndim, ndim + 1]);

            for sample in homogeneous_rows(out.as_slice(), ndim) {
                for (r, row) in sample.iter().enumerate() {
                    for (c, v) in row.iter().enumerate() {
                        let expected = if c == ndim && r < ndim {
                            offset[r]
                        } else if r == c {
                            1.0
                        } else {
                            0.0
                        };
                        assert_eq!(*v, expected, "{ndim}D entry ({r}, {c})");
                    }
                }
            }
        }
    }

    #[test]
    fn test_zero_offsets_are_identity() {
        for ndim in 1..=MAX_NDIM {
            let zeros = vec![0.0f32; ndim];
            let ws = Workspace::new(1);
            let mut op = TransformOp::new(Translation::new(Param::Constant(&zeros)).unwrap());
            let out = op.run(&ws).unwrap();
            let view = out.view().unwrap();
            let rows = view.get(0).unwrap();
            for r in 0..ndim {
                for c in 0..=ndim {
                    assert_eq!(rows[r * (ndim + 1) + c], if r == c { 1.0 } else { 0.0 });
                }
            }
        }
    }

    #[test]
    fn test_chained_translations_add() {
        let v1 = [0.5, -1.0, 2.0];
        let v2 = [4.0, 0.25, -3.0];
        let first = translation_op(Param::Constant(&v1))
            .run(&Workspace::new(1))
            .unwrap();
        let ws = Workspace::new(1).with_input(first.view().unwrap());
        let chained = translation_op(Param::Constant(&v2)).run(&ws).unwrap();

        let sum: Vec<f64> = v1.iter().zip(v2.iter()).map(|(a, b)| a + b).collect();
        let direct = translation_op(Param::Constant(&sum))
            .run(&Workspace::new(1))
            .unwrap();
        assert_relative_eq!(chained.as_slice(), direct.as_slice());
    }

    #[test]
    fn test_composition_order() {
        // scale by 2 after / before translating by 1
        #[rustfmt::skip]
        let translate = [
            1.0, 0.0, 1.0,
            0.0, 1.0, 1.0,
        ];
        let ws = Workspace::new(1).with_input(MatrixBatch::try_new(&translate, 2, 3).unwrap());

        let scale = || Scale::new(Param::Constant(&[2.0f64])).unwrap().with_ndim(2);
        let after = TransformOp::new(scale()).run(&ws).unwrap();
        assert_eq!(after.as_slice(), &[2.0, 0.0, 2.0, 0.0, 2.0, 2.0]);

        let mut op = TransformOp::builder(scale()).reverse_order(true).build();
        assert!(op.reverse_order());
        let before = op.run(&ws).unwrap();
        assert_eq!(before.as_slice(), &[2.0, 0.0, 1.0, 0.0, 2.0, 1.0]);
    }

    #[test]
    fn test_broadcast_matches_per_sample() {
        let angle = [33.0];
        let center = [1.0, -2.0];
        let constant = TransformOp::new(
            Rotation::new(Param::Constant(&angle))
                .unwrap()
                .with_center(Param::Constant(&center))
                .unwrap(),
        )
        .run(&Workspace::new(5))
        .unwrap();

        let angles = vec![angle.to_vec(); 5];
        let centers = vec![center.to_vec(); 5];
        let ws = Workspace::new(5)
            .with_arg_input("angle", &angles)
            .with_arg_input("center", &centers);
        let mut per_sample_op = TransformOp::new(
            Rotation::new(Param::PerSample)
                .unwrap()
                .with_center(Param::PerSample)
                .unwrap(),
        );
        assert!(!per_sample_op.is_constant_transform());
        let per_sample = per_sample_op.run(&ws).unwrap();
        assert_eq!(constant, per_sample);
    }

    #[test]
    fn test_many_samples() {
        let n = 1000;
        let offsets: Vec<Vec<f32>> = (0..n).map(|i| vec![i as f32, -(i as f32)]).collect();
        let ws = Workspace::new(n).with_arg_input("offset", &offsets);
        let mut op = TransformOp::new(Translation::new(Param::PerSample).unwrap());
        let out = op.run(&ws).unwrap();
        assert_eq!(out.len(), n);
        for (i, rows) in out.view().unwrap().iter().enumerate() {
            assert_eq!(rows, &[1.0, 0.0, i as f32, 0.0, 1.0, -(i as f32)]);
        }
    }

    #[test]
    fn test_constant_across_batches() {
        let mut op = translation_op(Param::Constant(&[7.0, 8.0]));
        assert!(op.is_constant_transform());
        for batch_size in [1, 4, 100] {
            let out = op.run(&Workspace::new(batch_size)).unwrap();
            assert_eq!(out.len(), batch_size);
            for rows in out.view().unwrap().iter() {
                assert_eq!(rows, &[1.0, 0.0, 7.0, 0.0, 1.0, 8.0]);
            }
        }
    }

    #[test]
    fn test_empty_batch() {
        let mut op = translation_op(Param::PerSample);
        let offsets: [Vec<f64>; 0] = [];
        let ws = Workspace::new(0).with_arg_input("offset", &offsets);
        op.process_args(&ws).unwrap();
        op.define_transforms(&ws, &mut []).unwrap();

        let out = op.run(&ws).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_unequal_per_sample_lengths() {
        let offsets = [vec![1.0, 2.0], vec![1.0, 2.0, 3.0]];
        let ws = Workspace::new(2).with_arg_input("offset", &offsets);
        let mut op = translation_op(Param::PerSample);
        assert!(matches!(
            op.process_args(&ws),
            Err(TransformError::ShapeMismatch { sample: 1, expected: 2, actual: 3, .. })
        ));
        assert_eq!(op.ndim(), None);
    }

    #[test]
    fn test_zero_ndim() {
        let mut op = translation_op(Param::Constant(&[]));
        assert!(matches!(
            op.process_args(&Workspace::new(1)),
            Err(TransformError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unsupported_ndim() {
        let mut op = translation_op(Param::Constant(&[1.0; 7]));
        assert_eq!(
            op.process_args(&Workspace::new(1)),
            Err(TransformError::UnsupportedDimensionality {
                ndim: 7,
                supported: 1..=MAX_NDIM
            })
        );
    }

    #[test]
    fn test_kind_restricts_ndim() {
        let shear = Shear::from_factors(Param::Constant(&[0.5f64, 0.5])).unwrap();
        let mut op = TransformOp::new(shear);
        assert!(op.process_args(&Workspace::new(1)).is_ok());
        assert_eq!(op.kind().supported_ndim(), 2..=3);
    }

    #[test]
    fn test_input_dimension_mismatch() {
        let prior = [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let ws = Workspace::new(1).with_input(MatrixBatch::try_new(&prior, 3, 4).unwrap());
        let mut op = translation_op(Param::Constant(&[1.0, 2.0]));
        assert_eq!(
            op.process_args(&ws),
            Err(TransformError::DimensionMismatch {
                ndim: 2,
                rows: 3,
                cols: 4
            })
        );
    }

    #[test]
    fn test_input_replaced_before_define() {
        let prior_2d = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let prior_3d = [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let resolved =
            Workspace::new(1).with_input(MatrixBatch::try_new(&prior_2d, 2, 3).unwrap());
        let replaced =
            Workspace::new(1).with_input(MatrixBatch::try_new(&prior_3d, 3, 4).unwrap());

        let mut op = translation_op(Param::Constant(&[1.0, 2.0]));
        op.process_args(&resolved).unwrap();
        let mut out = vec![f64::NAN; 6];
        assert_eq!(
            op.define_transforms(&replaced, &mut out),
            Err(TransformError::DimensionMismatch {
                ndim: 2,
                rows: 3,
                cols: 4
            })
        );
        assert!(out.iter().all(|v| v.is_nan()));

        // the failed call leaves the resolved arguments in place
        op.define_transforms(&resolved, &mut out).unwrap();
        assert_eq!(out, vec![1.0, 0.0, 1.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_slots_are_filled_in_sample_order() {
        let mut out = vec![0.0f64; 12];
        for_each_slot(&mut out, 3, |idx, slot| {
            for (c, v) in slot.iter_mut().enumerate() {
                *v = (idx * 10 + c) as f64;
            }
        });
        let expected: Vec<f64> = (0..4)
            .flat_map(|idx| (0..3).map(move |c| (idx * 10 + c) as f64))
            .collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_input_batch_size_mismatch() {
        let prior = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let ws = Workspace::new(2).with_input(MatrixBatch::try_new(&prior, 2, 3).unwrap());
        let mut op = translation_op(Param::Constant(&[1.0, 2.0]));
        assert!(matches!(
            op.process_args(&ws),
            Err(TransformError::BatchSizeMismatch { name: "input", expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_define_requires_resolved_arguments() {
        let mut op = translation_op(Param::Constant(&[1.0]));
        let ws = Workspace::new(1);
        let mut out = vec![0.0; 2];
        assert_eq!(
            op.define_transforms(&ws, &mut out),
            Err(TransformError::Unresolved)
        );

        op.process_args(&ws).unwrap();
        let mut short = vec![0.0; 1];
        assert_eq!(
            op.define_transforms(&ws, &mut short),
            Err(TransformError::OutputSize {
                expected: 2,
                actual: 1
            })
        );
        op.define_transforms(&ws, &mut out).unwrap();
        assert_eq!(out, vec![1.0, 1.0]);

        // resolved state is consumed by a successful call
        assert_eq!(
            op.define_transforms(&ws, &mut out),
            Err(TransformError::Unresolved)
        );
    }
}
