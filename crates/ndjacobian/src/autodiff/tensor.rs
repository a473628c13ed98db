//! TrackedTensor - Tensor with gradient tracking for automatic differentiation.

use super::graph::{NodeId, with_graph};
use crate::tensor::DenseTensor;

/// A tensor that tracks gradients for automatic differentiation.
///
/// Wraps a `DenseTensor<f64>` and, when it requires grad, the id of its
/// node in the thread-local computation graph.
///
/// # Example
///
/// ```
/// use ndjacobian::autodiff::TrackedTensor;
/// use ndjacobian::Tensor;
///
/// let a = TrackedTensor::leaf(Tensor::ones(&[2, 3]));
/// assert!(a.requires_grad());
///
/// let b = TrackedTensor::new(Tensor::ones(&[3, 4]));
/// assert!(!b.requires_grad());
/// ```
#[derive(Debug, Clone)]
pub struct TrackedTensor {
    tensor: DenseTensor<f64>,
    /// Node in computation graph (None if not tracking).
    node: Option<NodeId>,
}

impl TrackedTensor {
    /// Create a tracked tensor that does not require gradient.
    pub fn new(tensor: DenseTensor<f64>) -> Self {
        Self { tensor, node: None }
    }

    /// Create a leaf tensor that requires gradient.
    ///
    /// Registers in the thread-local computation graph.
    pub fn leaf(tensor: DenseTensor<f64>) -> Self {
        let node = with_graph(|g| g.create_leaf());
        Self {
            tensor,
            node: Some(node),
        }
    }

    /// Create with explicit requires_grad flag.
    pub fn with_requires_grad(tensor: DenseTensor<f64>, requires_grad: bool) -> Self {
        if requires_grad {
            Self::leaf(tensor)
        } else {
            Self::new(tensor)
        }
    }

    pub(crate) fn from_node(tensor: DenseTensor<f64>, node: NodeId) -> Self {
        Self {
            tensor,
            node: Some(node),
        }
    }

    pub fn tensor(&self) -> &DenseTensor<f64> {
        &self.tensor
    }

    pub fn into_tensor(self) -> DenseTensor<f64> {
        self.tensor
    }

    pub fn node_id(&self) -> Option<NodeId> {
        self.node
    }

    pub fn requires_grad(&self) -> bool {
        self.node.is_some()
    }

    pub fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }

    pub fn ndim(&self) -> usize {
        self.tensor.ndim()
    }

    pub fn len(&self) -> usize {
        self.tensor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensor.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        self.tensor.data()
    }

    /// Detach from computation graph.
    pub fn detach(&self) -> Self {
        Self::new(self.tensor.clone())
    }
}

impl From<DenseTensor<f64>> for TrackedTensor {
    fn from(tensor: DenseTensor<f64>) -> Self {
        Self::new(tensor)
    }
}
