//! Element-wise nonlinearities.

use super::{mul, record};
use crate::autodiff::graph::{GradFn, NodeId};
use crate::autodiff::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::operations;

#[derive(Debug)]
struct ExpBackward {
    input: TrackedTensor,
}

impl GradFn for ExpBackward {
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        let Some(id) = self.input.node_id() else {
            return Ok(Vec::new());
        };
        Ok(vec![(id, mul(grad_output, &exp(&self.input))?)])
    }

    fn inputs(&self) -> Vec<NodeId> {
        self.input.node_id().into_iter().collect()
    }

    fn name(&self) -> &'static str {
        "exp"
    }
}

/// Tracked element-wise exponential.
pub fn exp(x: &TrackedTensor) -> TrackedTensor {
    let result = operations::apply(x.tensor(), f64::exp);
    record(result, &[x], || ExpBackward { input: x.clone() })
}

#[derive(Debug)]
struct LeakyReluBackward {
    input: NodeId,
    /// Local derivative: 1 where the input was positive, `alpha` elsewhere.
    slope: TrackedTensor,
}

impl GradFn for LeakyReluBackward {
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        Ok(vec![(self.input, mul(grad_output, &self.slope)?)])
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![self.input]
    }

    fn name(&self) -> &'static str {
        "leaky_relu"
    }
}

/// Tracked leaky ReLU: `x` for `x > 0`, `alpha * x` otherwise.
///
/// The derivative at `x == 0` is taken to be `alpha`.
///
/// # Example
///
/// ```
/// use ndjacobian::autodiff::{TrackedTensor, ops};
/// use ndjacobian::Tensor;
///
/// let x = TrackedTensor::new(Tensor::from_vec(vec![-2.0, 0.0, 3.0], &[3]).unwrap());
/// assert_eq!(ops::leaky_relu(&x, 0.1).data(), &[-0.2, 0.0, 3.0]);
/// ```
pub fn leaky_relu(x: &TrackedTensor, alpha: f64) -> TrackedTensor {
    let result = operations::apply(x.tensor(), |v| if v > 0.0 { v } else { alpha * v });
    match x.node_id() {
        Some(input) => record(result, &[x], || LeakyReluBackward {
            input,
            slope: TrackedTensor::new(operations::apply(x.tensor(), |v| {
                if v > 0.0 { 1.0 } else { alpha }
            })),
        }),
        None => TrackedTensor::new(result),
    }
}
