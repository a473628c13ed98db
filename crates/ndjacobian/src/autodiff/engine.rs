//! Capabilities the Jacobian assembler needs from a differentiation engine.

use super::backward::{GradOptions, grad};
use super::ops;
use super::tensor::TrackedTensor;
use crate::error::TensorError;

/// A reverse-mode engine plus the tensor plumbing used to assemble
/// Jacobians from its gradients.
///
/// [`TapeEngine`] is the implementation over the crate's own tape; tests use
/// wrappers around it to observe how the assembler drives the engine.
pub trait GradEngine {
    type Tensor: Clone;

    /// Gradient of a single-element `output` with respect to each input.
    fn grad(
        &self,
        output: &Self::Tensor,
        inputs: &[Self::Tensor],
        options: GradOptions,
    ) -> Result<Vec<Option<Self::Tensor>>, TensorError>;

    fn requires_grad(&self, tensor: &Self::Tensor) -> bool;

    fn numel(&self, tensor: &Self::Tensor) -> usize;

    /// Row-major 1-D view of `tensor`.
    fn flatten(&self, tensor: &Self::Tensor) -> Result<Self::Tensor, TensorError>;

    /// Element `index` of a flat tensor, as a single-element tensor that
    /// stays connected to the graph.
    fn select(&self, flat: &Self::Tensor, index: usize) -> Result<Self::Tensor, TensorError>;

    /// Stack equal-length 1-D rows into a matrix.
    fn stack(&self, rows: &[Self::Tensor]) -> Result<Self::Tensor, TensorError>;
}

/// [`GradEngine`] over [`TrackedTensor`] and the thread-local graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct TapeEngine;

impl GradEngine for TapeEngine {
    type Tensor = TrackedTensor;

    fn grad(
        &self,
        output: &TrackedTensor,
        inputs: &[TrackedTensor],
        options: GradOptions,
    ) -> Result<Vec<Option<TrackedTensor>>, TensorError> {
        grad(output, inputs, options)
    }

    fn requires_grad(&self, tensor: &TrackedTensor) -> bool {
        tensor.requires_grad()
    }

    fn numel(&self, tensor: &TrackedTensor) -> usize {
        tensor.len()
    }

    fn flatten(&self, tensor: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
        ops::flatten(tensor)
    }

    fn select(&self, flat: &TrackedTensor, index: usize) -> Result<TrackedTensor, TensorError> {
        ops::select(flat, index)
    }

    fn stack(&self, rows: &[TrackedTensor]) -> Result<TrackedTensor, TensorError> {
        ops::stack(rows)
    }
}
