//! Element-wise arithmetic.

use super::{record, tracked_ids};
use crate::autodiff::graph::{GradFn, NodeId};
use crate::autodiff::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::operations;

#[derive(Debug)]
struct AddBackward {
    a: Option<NodeId>,
    b: Option<NodeId>,
}

impl GradFn for AddBackward {
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        Ok(tracked_ids(&[self.a, self.b])
            .into_iter()
            .map(|id| (id, grad_output.clone()))
            .collect())
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.a, self.b])
    }

    fn name(&self) -> &'static str {
        "add"
    }
}

/// Tracked element-wise sum of two tensors of equal shape.
///
/// # Example
///
/// ```
/// use ndjacobian::autodiff::{TrackedTensor, ops};
/// use ndjacobian::Tensor;
///
/// let a = TrackedTensor::leaf(Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap());
/// let b = TrackedTensor::new(Tensor::from_vec(vec![3.0, 4.0], &[2]).unwrap());
/// let c = ops::add(&a, &b).unwrap();
/// assert_eq!(c.data(), &[4.0, 6.0]);
/// assert!(c.requires_grad());
/// ```
pub fn add(a: &TrackedTensor, b: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
    let result = operations::add(a.tensor(), b.tensor())?;
    Ok(record(result, &[a, b], || AddBackward {
        a: a.node_id(),
        b: b.node_id(),
    }))
}

#[derive(Debug)]
struct SubBackward {
    a: Option<NodeId>,
    b: Option<NodeId>,
}

impl GradFn for SubBackward {
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        let mut grads = Vec::new();
        if let Some(id) = self.a {
            grads.push((id, grad_output.clone()));
        }
        if let Some(id) = self.b {
            grads.push((id, neg(grad_output)));
        }
        Ok(grads)
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.a, self.b])
    }

    fn name(&self) -> &'static str {
        "sub"
    }
}

/// Tracked element-wise difference `a - b`.
pub fn sub(a: &TrackedTensor, b: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
    let result = operations::sub(a.tensor(), b.tensor())?;
    Ok(record(result, &[a, b], || SubBackward {
        a: a.node_id(),
        b: b.node_id(),
    }))
}

/// Saves both operands with their graph links so that the gradient
/// can itself be differentiated.
#[derive(Debug)]
struct MulBackward {
    a: TrackedTensor,
    b: TrackedTensor,
}

impl GradFn for MulBackward {
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        let mut grads = Vec::new();
        if let Some(id) = self.a.node_id() {
            grads.push((id, mul(grad_output, &self.b)?));
        }
        if let Some(id) = self.b.node_id() {
            grads.push((id, mul(grad_output, &self.a)?));
        }
        Ok(grads)
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.a.node_id(), self.b.node_id()])
    }

    fn name(&self) -> &'static str {
        "mul"
    }
}

/// Tracked element-wise (Hadamard) product.
pub fn mul(a: &TrackedTensor, b: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
    let result = operations::mul(a.tensor(), b.tensor())?;
    Ok(record(result, &[a, b], || MulBackward {
        a: a.clone(),
        b: b.clone(),
    }))
}

#[derive(Debug)]
struct ScaleBackward {
    input: NodeId,
    alpha: f64,
}

impl GradFn for ScaleBackward {
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        Ok(vec![(self.input, scale(grad_output, self.alpha))])
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![self.input]
    }

    fn name(&self) -> &'static str {
        "scale"
    }
}

/// Tracked multiplication by a constant.
pub fn scale(x: &TrackedTensor, alpha: f64) -> TrackedTensor {
    let result = operations::scale(x.tensor(), alpha);
    match x.node_id() {
        Some(input) => record(result, &[x], || ScaleBackward { input, alpha }),
        None => TrackedTensor::new(result),
    }
}

/// Tracked negation.
pub fn neg(x: &TrackedTensor) -> TrackedTensor {
    scale(x, -1.0)
}
