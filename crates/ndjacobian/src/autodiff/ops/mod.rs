//! Tracked tensor operations with automatic differentiation.
//!
//! Each operator computes its forward value on the plain tensors and, when
//! grad mode is on and some argument requires grad, records a node whose
//! backward function is written in terms of these same operators.

mod arith;
mod linalg;
mod shape;
mod unary;

pub use arith::{add, mul, neg, scale, sub};
pub use linalg::{matmul, transpose};
pub use shape::{concat, expand, flatten, narrow, pad, reshape, select, stack, sum};
pub use unary::{exp, leaky_relu};

use std::rc::Rc;

use super::graph::{GradFn, NodeId, with_graph};
use super::mode::is_grad_enabled;
use super::tensor::TrackedTensor;
use crate::tensor::DenseTensor;

/// Wrap a forward result, recording `make_grad_fn()` as its backward
/// function if any parent requires grad.
pub(crate) fn record<G>(
    result: DenseTensor<f64>,
    parents: &[&TrackedTensor],
    make_grad_fn: impl FnOnce() -> G,
) -> TrackedTensor
where
    G: GradFn + 'static,
{
    if !is_grad_enabled() || !parents.iter().any(|p| p.requires_grad()) {
        return TrackedTensor::new(result);
    }
    let grad_fn: Rc<dyn GradFn> = Rc::new(make_grad_fn());
    let node = with_graph(|g| g.create_node(grad_fn));
    TrackedTensor::from_node(result, node)
}

/// Node ids of the parents that require grad.
pub(crate) fn tracked_ids(ids: &[Option<NodeId>]) -> Vec<NodeId> {
    ids.iter().flatten().copied().collect()
}
