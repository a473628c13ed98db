//! Backward pass execution for reverse-mode automatic differentiation.

use super::gradients::Gradients;
use super::graph::{ComputationGraph, GradFn, NodeId, with_graph};
use super::mode::with_grad_mode;
use super::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::tensor::DenseTensor;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Options for a single gradient pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GradOptions {
    /// Keep backward functions alive so the same graph can be traversed again.
    pub retain_graph: bool,
    /// Record the gradient computation itself, making the returned gradients
    /// differentiable.
    pub create_graph: bool,
    /// Return `None` for inputs unreachable from the output instead of failing.
    pub allow_unused: bool,
}

impl GradOptions {
    pub fn retain_graph(mut self, retain_graph: bool) -> Self {
        self.retain_graph = retain_graph;
        self
    }

    pub fn create_graph(mut self, create_graph: bool) -> Self {
        self.create_graph = create_graph;
        self
    }

    pub fn allow_unused(mut self, allow_unused: bool) -> Self {
        self.allow_unused = allow_unused;
        self
    }
}

type Schedule = Vec<(NodeId, Option<Rc<dyn GradFn>>)>;

/// Gradient of a single-element `output` with respect to each of `inputs`.
///
/// Returns one entry per input, in order. Each gradient has the shape of its
/// input. An input that is unreachable from `output` yields `None` when
/// `allow_unused` is set.
///
/// # Errors
///
/// - `EmptyCollection` if `inputs` is empty
/// - `NonScalarOutput` if `output` has more than one element
/// - `NotTracked` if an input does not require grad
/// - `UnusedInput` for an unreachable input without `allow_unused`
/// - `GraphFreed` if a node on the path was released by an earlier pass
///
/// # Example
///
/// ```
/// use ndjacobian::autodiff::{GradOptions, TrackedTensor, grad, ops};
/// use ndjacobian::Tensor;
///
/// let x = TrackedTensor::leaf(Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap());
/// let loss = ops::sum(&ops::mul(&x, &x).unwrap());
///
/// let grads = grad(&loss, &[x], GradOptions::default()).unwrap();
/// assert_eq!(grads[0].as_ref().unwrap().data(), &[2.0, 4.0]);
/// ```
pub fn grad(
    output: &TrackedTensor,
    inputs: &[TrackedTensor],
    options: GradOptions,
) -> Result<Vec<Option<TrackedTensor>>, TensorError> {
    if inputs.is_empty() {
        return Err(TensorError::EmptyCollection { name: "inputs" });
    }
    if output.len() != 1 {
        return Err(TensorError::NonScalarOutput { len: output.len() });
    }
    let input_ids = inputs
        .iter()
        .enumerate()
        .map(|(index, t)| {
            t.node_id().ok_or(TensorError::NotTracked {
                name: "inputs",
                index,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        inputs = inputs.len(),
        retain_graph = options.retain_graph,
        create_graph = options.create_graph,
        "starting gradient pass"
    );

    // An untracked output depends on nothing.
    let mut found = HashMap::new();
    if let Some(root) = output.node_id() {
        let schedule = with_graph(|g| schedule_from(g, root))?;
        let wanted: HashSet<NodeId> = input_ids.iter().copied().collect();

        let result = with_grad_mode(options.create_graph, || {
            run_schedule(output.shape(), root, &schedule, &wanted)
        });

        if !options.retain_graph {
            with_graph(|g| {
                for (id, _) in &schedule {
                    g.release(*id);
                }
            });
        }
        found = result?;
    }

    input_ids
        .iter()
        .enumerate()
        .map(|(index, id)| match found.get(id) {
            Some(g) => Ok(Some(g.clone())),
            None if options.allow_unused => Ok(None),
            None => Err(TensorError::UnusedInput { index }),
        })
        .collect()
}

/// Nodes reachable from `root`, each consumer ordered before the nodes it
/// was computed from.
///
/// Backward functions are cloned out so the graph is not borrowed while
/// they run.
fn schedule_from(graph: &ComputationGraph, root: NodeId) -> Result<Schedule, TensorError> {
    let mut dag: DiGraph<NodeId, ()> = DiGraph::new();
    let mut index: HashMap<NodeId, NodeIndex> = HashMap::new();
    let mut grad_fns: HashMap<NodeId, Option<Rc<dyn GradFn>>> = HashMap::new();

    index.insert(root, dag.add_node(root));
    let mut stack = vec![root];

    while let Some(id) = stack.pop() {
        let node = graph.get_node(id).ok_or_else(|| {
            TensorError::InvalidOperation(format!(
                "node {} is not in the computation graph",
                id.index()
            ))
        })?;
        if node.is_released() {
            return Err(TensorError::GraphFreed { node: id.index() });
        }

        let grad_fn = node.grad_fn_rc();
        if let Some(f) = &grad_fn {
            let consumer = index[&id];
            for input in f.inputs() {
                let input_idx = match index.get(&input) {
                    Some(&idx) => idx,
                    None => {
                        let idx = dag.add_node(input);
                        index.insert(input, idx);
                        stack.push(input);
                        idx
                    }
                };
                dag.add_edge(consumer, input_idx, ());
            }
        }
        grad_fns.insert(id, grad_fn);
    }

    let sorted = toposort(&dag, None).map_err(|cycle| {
        TensorError::InvalidOperation(format!(
            "cycle in computation graph at node {}",
            dag[cycle.node_id()].index()
        ))
    })?;

    Ok(sorted
        .into_iter()
        .map(|idx| {
            let id = dag[idx];
            (id, grad_fns.remove(&id).flatten())
        })
        .collect())
}

fn run_schedule(
    output_shape: &[usize],
    root: NodeId,
    schedule: &Schedule,
    wanted: &HashSet<NodeId>,
) -> Result<HashMap<NodeId, TrackedTensor>, TensorError> {
    let mut gradients = Gradients::new();
    gradients.accumulate(root, TrackedTensor::new(DenseTensor::ones(output_shape)))?;

    let mut found = HashMap::new();
    for (id, grad_fn) in schedule {
        // No gradient flows into this node from the output.
        let Some(grad_output) = gradients.remove(*id) else {
            continue;
        };
        if wanted.contains(id) {
            found.insert(*id, grad_output.clone());
        }
        if let Some(f) = grad_fn {
            tracing::trace!(node = id.index(), op = f.name(), "backward");
            for (input, g) in f.backward(&grad_output)? {
                gradients.accumulate(input, g)?;
            }
        }
    }
    Ok(found)
}
