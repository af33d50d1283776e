use std::collections::HashMap;

use crate::{MatrixBatch, Scalar};

/// Inputs supplied by the host pipeline for one batch invocation.
///
/// Holds the batch size, any per-sample argument values (keyed by argument name),
/// and optionally a batch of prior transforms to compose with.
#[derive(Debug, Clone)]
pub struct Workspace<'a, T> {
    batch_size: usize,
    arg_inputs: HashMap<&'a str, Vec<&'a [T]>>,
    input: Option<MatrixBatch<'a, T>>,
}

impl<'a, T: Scalar> Workspace<'a, T> {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            arg_inputs: HashMap::new(),
            input: None,
        }
    }

    /// Supply the values of a per-sample argument, one sequence per sample.
    pub fn with_arg_input<S: AsRef<[T]>>(mut self, name: &'a str, samples: &'a [S]) -> Self {
        self.arg_inputs
            .insert(name, samples.iter().map(|s| s.as_ref()).collect());
        self
    }

    /// Supply prior transforms, one per sample.
    pub fn with_input(mut self, input: MatrixBatch<'a, T>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn arg_input(&self, name: &str) -> Option<&[&'a [T]]> {
        self.arg_inputs.get(name).map(|v| v.as_slice())
    }

    pub fn input(&self) -> Option<&MatrixBatch<'a, T>> {
        self.input.as_ref()
    }
}
