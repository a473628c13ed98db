//! Jacobian assembly from reverse-mode gradients.
//!
//! Every output is flattened to `m_o` scalars. For each scalar the engine is
//! asked once for its gradient with respect to all inputs at the same time,
//! which makes one row of each `[m_o, n_j]` block. The engine is therefore
//! invoked `Σ m_o` times and the graph is retained between invocations.
//!
//! ```text
//! outputs (p)           inputs (q)
//!   y_o ──flatten──► select k ──grad──► row k of J[o][0], ..., J[o][q-1]
//! ```

use super::backward::GradOptions;
use super::engine::{GradEngine, TapeEngine};
use super::tensor::TrackedTensor;
use crate::error::TensorError;

/// Values that can be passed as a list of function inputs or returned as a
/// list of function outputs.
pub trait IntoTensorList<T> {
    fn into_tensor_list(self) -> Vec<T>;
}

impl IntoTensorList<TrackedTensor> for TrackedTensor {
    fn into_tensor_list(self) -> Vec<TrackedTensor> {
        vec![self]
    }
}

impl IntoTensorList<TrackedTensor> for &TrackedTensor {
    fn into_tensor_list(self) -> Vec<TrackedTensor> {
        vec![self.clone()]
    }
}

impl<T> IntoTensorList<T> for Vec<T> {
    fn into_tensor_list(self) -> Vec<T> {
        self
    }
}

impl<T: Clone> IntoTensorList<T> for &[T] {
    fn into_tensor_list(self) -> Vec<T> {
        self.to_vec()
    }
}

impl<T, const N: usize> IntoTensorList<T> for [T; N] {
    fn into_tensor_list(self) -> Vec<T> {
        self.into()
    }
}

impl<T> IntoTensorList<T> for (T, T) {
    fn into_tensor_list(self) -> Vec<T> {
        vec![self.0, self.1]
    }
}

impl<T> IntoTensorList<T> for (T, T, T) {
    fn into_tensor_list(self) -> Vec<T> {
        vec![self.0, self.1, self.2]
    }
}

/// Options for [`jacobian`].
///
/// The graph is always retained between the per-entry gradient passes, so
/// there is no `retain_graph` switch here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JacobianOptions {
    /// Make the returned blocks differentiable, for second derivatives.
    pub create_graph: bool,
    /// Report inputs unreachable from an output as `None` blocks instead of
    /// failing.
    pub allow_unused: bool,
}

impl JacobianOptions {
    pub fn create_graph(mut self, create_graph: bool) -> Self {
        self.create_graph = create_graph;
        self
    }

    pub fn allow_unused(mut self, allow_unused: bool) -> Self {
        self.allow_unused = allow_unused;
        self
    }
}

/// Jacobian blocks of `p` outputs with respect to `q` inputs.
///
/// Block `[o][j]` is an `[m_o, n_j]` matrix, where `m_o` and `n_j` are the
/// element counts of output `o` and input `j`, with both flattened in
/// row-major order. A block is `None` when input `j` is unreachable from
/// output `o`.
///
/// The variant follows the number of outputs and inputs: one of each gives
/// `Single`, a single input gives `PerOutput`, a single output gives
/// `PerInput`, anything else `Nested` indexed `[output][input]`.
#[derive(Debug, Clone)]
pub enum Jacobian<T> {
    Single(Option<T>),
    PerOutput(Vec<Option<T>>),
    PerInput(Vec<Option<T>>),
    Nested(Vec<Vec<Option<T>>>),
}

impl<T> Jacobian<T> {
    /// Build from blocks indexed `[output][input]`.
    fn collapse(mut blocks: Vec<Vec<Option<T>>>) -> Self {
        let p = blocks.len();
        let q = blocks.first().map_or(0, Vec::len);
        match (p, q) {
            (1, 1) => Jacobian::Single(blocks.remove(0).remove(0)),
            (_, 1) => Jacobian::PerOutput(blocks.into_iter().flatten().collect()),
            (1, _) => Jacobian::PerInput(blocks.remove(0)),
            _ => Jacobian::Nested(blocks),
        }
    }

    pub fn num_outputs(&self) -> usize {
        match self {
            Jacobian::Single(_) | Jacobian::PerInput(_) => 1,
            Jacobian::PerOutput(blocks) => blocks.len(),
            Jacobian::Nested(blocks) => blocks.len(),
        }
    }

    pub fn num_inputs(&self) -> usize {
        match self {
            Jacobian::Single(_) | Jacobian::PerOutput(_) => 1,
            Jacobian::PerInput(blocks) => blocks.len(),
            Jacobian::Nested(blocks) => blocks.first().map_or(0, Vec::len),
        }
    }

    /// Block for `output` and `input`, whatever the variant.
    ///
    /// Returns `None` both for an unreachable pair and for indices out of
    /// range.
    pub fn block(&self, output: usize, input: usize) -> Option<&T> {
        let slot = match self {
            Jacobian::Single(block) => (output == 0 && input == 0).then_some(block),
            Jacobian::PerOutput(blocks) => blocks.get(output).filter(|_| input == 0),
            Jacobian::PerInput(blocks) => blocks.get(input).filter(|_| output == 0),
            Jacobian::Nested(blocks) => blocks.get(output).and_then(|row| row.get(input)),
        };
        slot.and_then(Option::as_ref)
    }

    pub fn as_single(&self) -> Option<&T> {
        match self {
            Jacobian::Single(block) => block.as_ref(),
            _ => None,
        }
    }

    pub fn into_single(self) -> Option<T> {
        match self {
            Jacobian::Single(block) => block,
            _ => None,
        }
    }

    /// Expand into blocks indexed `[output][input]`.
    pub fn into_nested(self) -> Vec<Vec<Option<T>>> {
        match self {
            Jacobian::Single(block) => vec![vec![block]],
            Jacobian::PerOutput(blocks) => blocks.into_iter().map(|b| vec![b]).collect(),
            Jacobian::PerInput(blocks) => vec![blocks],
            Jacobian::Nested(blocks) => blocks,
        }
    }
}

/// Jacobian of `f` at `inputs` using the thread-local tape.
///
/// `inputs` may be a single [`TrackedTensor`], a `Vec`, a slice, an array or
/// a tuple; `f` may return any of the same.
///
/// # Errors
///
/// - `EmptyCollection` for empty inputs, empty outputs or an output with no
///   elements
/// - `NotTracked` if an input does not require grad
/// - any error raised by `f` or by the gradient passes, unchanged
///
/// # Example
///
/// ```
/// use ndjacobian::autodiff::{JacobianOptions, TrackedTensor, jacobian, ops};
/// use ndjacobian::Tensor;
///
/// let x = TrackedTensor::leaf(Tensor::ones(&[2, 2]));
/// let jac = jacobian(|xs| ops::matmul(&xs[0], &xs[0]), x, JacobianOptions::default()).unwrap();
///
/// let j = jac.into_single().unwrap();
/// assert_eq!(j.shape(), &[4, 4]);
/// assert_eq!(
///     j.data(),
///     &[
///         2.0, 1.0, 1.0, 0.0,
///         1.0, 2.0, 0.0, 1.0,
///         1.0, 0.0, 2.0, 1.0,
///         0.0, 1.0, 1.0, 2.0,
///     ]
/// );
/// ```
pub fn jacobian<F, I, O>(
    f: F,
    inputs: I,
    options: JacobianOptions,
) -> Result<Jacobian<TrackedTensor>, TensorError>
where
    F: FnOnce(&[TrackedTensor]) -> Result<O, TensorError>,
    I: IntoTensorList<TrackedTensor>,
    O: IntoTensorList<TrackedTensor>,
{
    jacobian_with(&TapeEngine, f, inputs, options)
}

/// Jacobian of `f` at `inputs`, driving an arbitrary [`GradEngine`].
pub fn jacobian_with<E, F, I, O>(
    engine: &E,
    f: F,
    inputs: I,
    options: JacobianOptions,
) -> Result<Jacobian<E::Tensor>, TensorError>
where
    E: GradEngine,
    F: FnOnce(&[E::Tensor]) -> Result<O, TensorError>,
    I: IntoTensorList<E::Tensor>,
    O: IntoTensorList<E::Tensor>,
{
    let inputs = inputs.into_tensor_list();
    if inputs.is_empty() {
        return Err(TensorError::EmptyCollection { name: "inputs" });
    }
    if let Some(index) = inputs.iter().position(|t| !engine.requires_grad(t)) {
        return Err(TensorError::NotTracked {
            name: "inputs",
            index,
        });
    }

    let outputs = f(&inputs)?.into_tensor_list();
    if outputs.is_empty() {
        return Err(TensorError::EmptyCollection { name: "outputs" });
    }

    tracing::debug!(
        outputs = outputs.len(),
        inputs = inputs.len(),
        create_graph = options.create_graph,
        allow_unused = options.allow_unused,
        "assembling jacobian"
    );

    let grad_options = GradOptions {
        retain_graph: true,
        create_graph: options.create_graph,
        allow_unused: options.allow_unused,
    };

    let mut blocks = Vec::with_capacity(outputs.len());
    for (o, output) in outputs.iter().enumerate() {
        let flat = engine.flatten(output)?;
        let m = engine.numel(&flat);
        if m == 0 {
            return Err(TensorError::EmptyCollection { name: "rows" });
        }

        // rows[j][k]: gradient of entry k of this output with respect to input j
        let mut rows: Vec<Vec<Option<E::Tensor>>> =
            (0..inputs.len()).map(|_| Vec::with_capacity(m)).collect();
        for k in 0..m {
            let entry = engine.select(&flat, k)?;
            tracing::trace!(output = o, entry = k, "gradient pass");
            let grads = engine.grad(&entry, &inputs, grad_options)?;
            if grads.len() != inputs.len() {
                return Err(TensorError::InvalidOperation(format!(
                    "engine returned {} gradients for {} inputs",
                    grads.len(),
                    inputs.len()
                )));
            }
            for (row, g) in rows.iter_mut().zip(grads) {
                row.push(g.map(|g| engine.flatten(&g)).transpose()?);
            }
        }

        let output_blocks = rows
            .into_iter()
            .enumerate()
            .map(|(j, rows)| stack_block(engine, o, j, rows))
            .collect::<Result<Vec<_>, _>>()?;
        blocks.push(output_blocks);
    }

    Ok(Jacobian::collapse(blocks))
}

/// Stack the rows of one (output, input) pair. The pair has no block when
/// its first row is unreachable.
fn stack_block<E: GradEngine>(
    engine: &E,
    output: usize,
    input: usize,
    rows: Vec<Option<E::Tensor>>,
) -> Result<Option<E::Tensor>, TensorError> {
    let Some(Some(_)) = rows.first() else {
        return Ok(None);
    };
    let rows = rows
        .into_iter()
        .collect::<Option<Vec<E::Tensor>>>()
        .ok_or_else(|| {
            TensorError::InvalidOperation(format!(
                "input {input} is unreachable from some entries of output {output}"
            ))
        })?;
    engine.stack(&rows).map(Some)
}
