//! Matrix product and transpose.

use super::{record, tracked_ids};
use crate::autodiff::graph::{GradFn, NodeId};
use crate::autodiff::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::operations;

/// Backward function for `C = A @ B`.
///
/// `dA = dC @ Bᵀ` and `dB = Aᵀ @ dC`.
#[derive(Debug)]
struct MatmulBackward {
    a: TrackedTensor,
    b: TrackedTensor,
}

impl GradFn for MatmulBackward {
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        let mut grads = Vec::new();
        if let Some(id) = self.a.node_id() {
            grads.push((id, matmul(grad_output, &transpose(&self.b)?)?));
        }
        if let Some(id) = self.b.node_id() {
            grads.push((id, matmul(&transpose(&self.a)?, grad_output)?));
        }
        Ok(grads)
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.a.node_id(), self.b.node_id()])
    }

    fn name(&self) -> &'static str {
        "matmul"
    }
}

/// Tracked matrix product of an `[m, k]` and a `[k, n]` matrix.
///
/// # Example
///
/// ```
/// use ndjacobian::autodiff::{TrackedTensor, ops};
/// use ndjacobian::Tensor;
///
/// let a = TrackedTensor::leaf(Tensor::ones(&[2, 3]));
/// let b = TrackedTensor::leaf(Tensor::ones(&[3, 4]));
/// let c = ops::matmul(&a, &b).unwrap();
///
/// assert_eq!(c.shape(), &[2, 4]);
/// assert!(c.requires_grad());
/// ```
pub fn matmul(a: &TrackedTensor, b: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
    let result = operations::matmul(a.tensor(), b.tensor())?;
    Ok(record(result, &[a, b], || MatmulBackward {
        a: a.clone(),
        b: b.clone(),
    }))
}

#[derive(Debug)]
struct TransposeBackward {
    input: NodeId,
}

impl GradFn for TransposeBackward {
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        Ok(vec![(self.input, transpose(grad_output)?)])
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![self.input]
    }

    fn name(&self) -> &'static str {
        "transpose"
    }
}

/// Tracked transpose of a matrix.
pub fn transpose(x: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
    let result = operations::transpose(x.tensor())?;
    Ok(match x.node_id() {
        Some(input) => record(result, &[x], || TransposeBackward { input }),
        None => TrackedTensor::new(result),
    })
}
