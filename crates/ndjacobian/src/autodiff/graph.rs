//! Computation graph for reverse-mode automatic differentiation.

use super::tensor::TrackedTensor;
use crate::error::TensorError;
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

/// Unique identifier for a node in the computation graph.
///
/// Ids are handed out in creation order, so an op node always has a larger
/// id than every node it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Get the internal index.
    pub fn index(&self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(index: usize) -> Self {
        Self(index)
    }
}

/// Backward function trait.
///
/// Computes the vector-Jacobian product of one recorded operation. The
/// gradient is expressed with tracked operators, so when the pass runs with
/// grad mode on the backward computation is itself recorded and can be
/// differentiated again.
pub trait GradFn: Debug {
    /// Given the gradient of the op's output, return gradients for each
    /// input that requires grad.
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError>;

    /// Input node ids (for the topological walk).
    fn inputs(&self) -> Vec<NodeId>;

    /// Short operator name used in log output.
    fn name(&self) -> &'static str;
}

/// A node in the computation graph.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    /// Backward function (None for leaf nodes and released op nodes).
    grad_fn: Option<Rc<dyn GradFn>>,
    released: bool,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get backward function reference.
    pub fn grad_fn(&self) -> Option<&dyn GradFn> {
        self.grad_fn.as_deref()
    }

    pub(crate) fn grad_fn_rc(&self) -> Option<Rc<dyn GradFn>> {
        self.grad_fn.clone()
    }

    /// Leaf nodes have no backward function and are never released.
    pub fn is_leaf(&self) -> bool {
        self.grad_fn.is_none() && !self.released
    }

    /// True once a backward pass without `retain_graph` went through this node.
    pub fn is_released(&self) -> bool {
        self.released
    }
}

/// Thread-local computation graph.
///
/// Stores the DAG of tensor operations for reverse-mode AD. Each thread has
/// its own independent graph.
#[derive(Default)]
pub struct ComputationGraph {
    nodes: Vec<Node>,
}

impl ComputationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a leaf node (an input that requires grad).
    pub fn create_leaf(&mut self) -> NodeId {
        self.push(None)
    }

    /// Create a computed node with backward function.
    pub fn create_node(&mut self, grad_fn: Rc<dyn GradFn>) -> NodeId {
        self.push(Some(grad_fn))
    }

    fn push(&mut self, grad_fn: Option<Rc<dyn GradFn>>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            grad_fn,
            released: false,
        });
        id
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Drop the backward function of an op node. Leaves are left untouched.
    pub fn release(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id.index()) {
            if node.grad_fn.take().is_some() {
                node.released = true;
                tracing::trace!(node = id.index(), "released backward function");
            }
        }
    }

    /// Clear the graph.
    ///
    /// Tracked tensors created before the call must not be used afterwards;
    /// their node ids are reused.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Debug for ComputationGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputationGraph")
            .field("num_nodes", &self.nodes.len())
            .finish()
    }
}

thread_local! {
    static GRAPH: RefCell<ComputationGraph> = RefCell::new(ComputationGraph::new());
}

/// Access the thread-local computation graph.
///
/// The closure must not call back into anything that records operations;
/// the graph is borrowed mutably for its duration.
pub fn with_graph<R>(f: impl FnOnce(&mut ComputationGraph) -> R) -> R {
    GRAPH.with(|g| f(&mut g.borrow_mut()))
}

/// Clear the thread-local computation graph.
pub fn clear_graph() {
    with_graph(|g| g.clear());
}
