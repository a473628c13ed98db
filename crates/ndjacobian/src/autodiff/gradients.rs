//! Gradient storage container.

use super::graph::NodeId;
use super::ops;
use super::tensor::TrackedTensor;
use crate::error::TensorError;
use std::collections::HashMap;

/// Container for accumulated gradients.
///
/// Stores gradients keyed by NodeId, accumulating with the tracked `add` for
/// nodes with multiple downstream paths so that the sum stays differentiable.
#[derive(Debug, Default)]
pub(crate) struct Gradients {
    grads: HashMap<NodeId, TrackedTensor>,
}

impl Gradients {
    /// Create empty gradient container.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Accumulate gradient for a node.
    ///
    /// If gradient already exists, adds to it (for multiple paths).
    pub(crate) fn accumulate(
        &mut self,
        id: NodeId,
        grad: TrackedTensor,
    ) -> Result<(), TensorError> {
        let total = match self.grads.get(&id) {
            Some(existing) => ops::add(existing, &grad)?,
            None => grad,
        };
        self.grads.insert(id, total);
        Ok(())
    }

    /// Remove and return gradient (for passing to backward functions).
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<TrackedTensor> {
        self.grads.remove(&id)
    }
}
