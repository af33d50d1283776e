use std::ops::Index;

use smallvec::ToSmallVec;

use crate::{Scalar, ShortVec, TransformError, TransformResult, Workspace};

/// Where an argument's values come from. Fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgSource<T> {
    /// One sequence shared by every sample.
    Constant(ShortVec<T>),
    /// One sequence per sample, read from the workspace under the argument's name.
    PerSample,
    /// An optional argument which was not given.
    Absent,
}

/// How an argument is supplied when an operator is constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Param<'a, T> {
    Constant(&'a [T]),
    PerSample,
}

/// A named operator argument holding a sequence of floats per sample.
///
/// Values are refreshed once per batch by [Argument::read]
/// and are read-only for the rest of that batch.
#[derive(Debug, Clone)]
pub struct Argument<T> {
    name: &'static str,
    source: ArgSource<T>,
    /// Per-sample values resolved for the current batch; unused in constant mode.
    values: Vec<ShortVec<T>>,
    batch_size: usize,
}

fn check_finite<T: Scalar>(name: &str, values: &[T]) -> TransformResult<()> {
    if let Some(v) = values.iter().find(|v| !v.is_finite()) {
        return Err(TransformError::InvalidArgument(format!(
            "`{name}` contains non-finite value {v:?}"
        )));
    }
    Ok(())
}

impl<T: Scalar> Argument<T> {
    pub fn constant(name: &'static str, values: &[T]) -> TransformResult<Self> {
        check_finite(name, values)?;
        Ok(Self::with_source(name, ArgSource::Constant(values.to_smallvec())))
    }

    pub fn from_param(name: &'static str, param: Param<'_, T>) -> TransformResult<Self> {
        match param {
            Param::Constant(values) => Self::constant(name, values),
            Param::PerSample => Ok(Self::per_sample(name)),
        }
    }

    pub fn per_sample(name: &'static str) -> Self {
        Self::with_source(name, ArgSource::PerSample)
    }

    pub fn absent(name: &'static str) -> Self {
        Self::with_source(name, ArgSource::Absent)
    }

    fn with_source(name: &'static str, source: ArgSource<T>) -> Self {
        Self {
            name,
            source,
            values: Vec::new(),
            batch_size: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn source(&self) -> &ArgSource<T> {
        &self.source
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self.source, ArgSource::Absent)
    }

    /// Whether values are supplied per sample rather than as a constant.
    pub fn is_arg_input(&self) -> bool {
        matches!(self.source, ArgSource::PerSample)
    }

    /// Number of samples resolved for the current batch.
    pub fn size(&self) -> usize {
        self.batch_size
    }

    /// Length of every sample's value sequence,
    /// or `None` if the argument is absent or no samples were resolved.
    pub fn value_len(&self) -> Option<usize> {
        match &self.source {
            ArgSource::Constant(v) => Some(v.len()),
            ArgSource::PerSample => self.values.first().map(|v| v.len()),
            ArgSource::Absent => None,
        }
    }

    /// Resolve values for the batch described by `ws`.
    pub fn read(&mut self, ws: &Workspace<'_, T>) -> TransformResult<()> {
        let batch_size = ws.batch_size();
        self.batch_size = batch_size;
        if !self.is_arg_input() {
            return Ok(());
        }

        let samples = ws.arg_input(self.name).ok_or_else(|| {
            TransformError::InvalidArgument(format!(
                "`{}` is per-sample but no input was supplied",
                self.name
            ))
        })?;
        if samples.len() != batch_size {
            return Err(TransformError::BatchSizeMismatch {
                name: self.name,
                expected: batch_size,
                actual: samples.len(),
            });
        }

        self.values.clear();
        let expected = samples.first().map(|s| s.len()).unwrap_or_default();
        for (sample, values) in samples.iter().enumerate() {
            if values.len() != expected {
                return Err(TransformError::ShapeMismatch {
                    name: self.name,
                    sample,
                    expected,
                    actual: values.len(),
                });
            }
            check_finite(self.name, values)?;
            self.values.push(values.to_smallvec());
        }
        Ok(())
    }

    /// Require every sample to have exactly `len` values.
    /// Absent arguments always pass.
    pub fn expect_len(&self, len: usize) -> TransformResult<()> {
        match self.value_len() {
            Some(actual) if actual != len => Err(TransformError::ShapeMismatch {
                name: self.name,
                sample: 0,
                expected: len,
                actual,
            }),
            _ => Ok(()),
        }
    }

    /// Values for one sample, or `None` if the argument is absent
    /// or `idx` is past the resolved samples of a per-sample argument.
    pub fn get(&self, idx: usize) -> Option<&[T]> {
        match &self.source {
            ArgSource::Constant(v) => Some(v.as_slice()),
            ArgSource::PerSample => self.values.get(idx).map(|v| v.as_slice()),
            ArgSource::Absent => None,
        }
    }
}

/// Panics if the argument is absent or `index` is out of bounds for a per-sample argument.
impl<T: Scalar> Index<usize> for Argument<T> {
    type Output = [T];

    fn index(&self, index: usize) -> &Self::Output {
        match self.get(index) {
            Some(values) => values,
            None if self.is_defined() => panic!(
                "sample {index} out of bounds for argument `{}` with {} samples",
                self.name,
                self.values.len()
            ),
            None => panic!("argument `{}` is not defined", self.name),
        }
    }
}
