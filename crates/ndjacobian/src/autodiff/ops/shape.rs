//! Shape manipulation and reductions.
//!
//! `narrow`/`pad` and `sum`/`expand` are each other's backward, which keeps
//! every gradient expressible with tracked operators.

use super::{record, tracked_ids};
use crate::autodiff::graph::{GradFn, NodeId};
use crate::autodiff::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::operations;
use crate::tensor::DenseTensor;

#[derive(Debug)]
struct ReshapeBackward {
    input: NodeId,
    input_shape: Vec<usize>,
}

impl GradFn for ReshapeBackward {
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        Ok(vec![(self.input, reshape(grad_output, &self.input_shape)?)])
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![self.input]
    }

    fn name(&self) -> &'static str {
        "reshape"
    }
}

/// Tracked reshape. Element order is unchanged.
pub fn reshape(x: &TrackedTensor, shape: &[usize]) -> Result<TrackedTensor, TensorError> {
    let result = x.tensor().reshape(shape)?;
    Ok(match x.node_id() {
        Some(input) => record(result, &[x], || ReshapeBackward {
            input,
            input_shape: x.shape().to_vec(),
        }),
        None => TrackedTensor::new(result),
    })
}

/// Tracked reshape to 1-D in row-major order.
pub fn flatten(x: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
    reshape(x, &[x.len()])
}

#[derive(Debug)]
struct SumBackward {
    input: NodeId,
    input_shape: Vec<usize>,
}

impl GradFn for SumBackward {
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        Ok(vec![(self.input, expand(grad_output, &self.input_shape)?)])
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![self.input]
    }

    fn name(&self) -> &'static str {
        "sum"
    }
}

/// Tracked sum of all elements, returned as a rank-0 tensor.
///
/// # Example
///
/// ```
/// use ndjacobian::autodiff::{TrackedTensor, ops};
/// use ndjacobian::Tensor;
///
/// let x = TrackedTensor::leaf(Tensor::ones(&[2, 3]));
/// let s = ops::sum(&x);
/// assert_eq!(s.shape(), &[] as &[usize]);
/// assert_eq!(s.data(), &[6.0]);
/// ```
pub fn sum(x: &TrackedTensor) -> TrackedTensor {
    let result = DenseTensor::scalar(x.data().iter().sum());
    match x.node_id() {
        Some(input) => record(result, &[x], || SumBackward {
            input,
            input_shape: x.shape().to_vec(),
        }),
        None => TrackedTensor::new(result),
    }
}

#[derive(Debug)]
struct ExpandBackward {
    input: NodeId,
    input_shape: Vec<usize>,
}

impl GradFn for ExpandBackward {
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        Ok(vec![(
            self.input,
            reshape(&sum(grad_output), &self.input_shape)?,
        )])
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![self.input]
    }

    fn name(&self) -> &'static str {
        "expand"
    }
}

/// Tracked broadcast of a single-element tensor to `shape`.
///
/// # Errors
///
/// Returns `ShapeMismatch` if `x` has more than one element.
pub fn expand(x: &TrackedTensor, shape: &[usize]) -> Result<TrackedTensor, TensorError> {
    let value = match x.data() {
        [v] => *v,
        data => {
            return Err(TensorError::ShapeMismatch {
                expected: 1,
                actual: data.len(),
            });
        }
    };
    let result = DenseTensor::full(shape, value);
    Ok(match x.node_id() {
        Some(input) => record(result, &[x], || ExpandBackward {
            input,
            input_shape: x.shape().to_vec(),
        }),
        None => TrackedTensor::new(result),
    })
}

fn require_vector(x: &TrackedTensor) -> Result<(), TensorError> {
    if x.ndim() != 1 {
        return Err(TensorError::RankMismatch {
            expected: 1,
            actual: x.ndim(),
        });
    }
    Ok(())
}

#[derive(Debug)]
struct NarrowBackward {
    input: NodeId,
    offset: usize,
    input_len: usize,
}

impl GradFn for NarrowBackward {
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        Ok(vec![(
            self.input,
            pad(grad_output, self.offset, self.input_len)?,
        )])
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![self.input]
    }

    fn name(&self) -> &'static str {
        "narrow"
    }
}

/// Tracked slice `x[offset..offset + len]` of a 1-D tensor.
///
/// # Errors
///
/// Returns `RankMismatch` for a non 1-D input and `SliceOutOfBounds` if the
/// range does not fit.
pub fn narrow(x: &TrackedTensor, offset: usize, len: usize) -> Result<TrackedTensor, TensorError> {
    require_vector(x)?;
    let end = offset + len;
    if end > x.len() {
        return Err(TensorError::SliceOutOfBounds {
            start: offset,
            end,
            dim: 0,
            size: x.len(),
        });
    }
    let result = DenseTensor::from_vec(x.data()[offset..end].to_vec(), &[len])?;
    Ok(match x.node_id() {
        Some(input) => record(result, &[x], || NarrowBackward {
            input,
            offset,
            input_len: x.len(),
        }),
        None => TrackedTensor::new(result),
    })
}

/// Tracked single-element view `x[index..index + 1]` of a 1-D tensor.
pub fn select(x: &TrackedTensor, index: usize) -> Result<TrackedTensor, TensorError> {
    narrow(x, index, 1)
}

#[derive(Debug)]
struct PadBackward {
    input: NodeId,
    offset: usize,
    input_len: usize,
}

impl GradFn for PadBackward {
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        Ok(vec![(
            self.input,
            narrow(grad_output, self.offset, self.input_len)?,
        )])
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![self.input]
    }

    fn name(&self) -> &'static str {
        "pad"
    }
}

/// Tracked zero padding: place 1-D `x` at `offset` inside a zero vector of
/// length `total`.
pub fn pad(x: &TrackedTensor, offset: usize, total: usize) -> Result<TrackedTensor, TensorError> {
    require_vector(x)?;
    let end = offset + x.len();
    if end > total {
        return Err(TensorError::SliceOutOfBounds {
            start: offset,
            end,
            dim: 0,
            size: total,
        });
    }
    let mut result = DenseTensor::zeros(&[total]);
    result.data_mut()[offset..end].copy_from_slice(x.data());
    Ok(match x.node_id() {
        Some(input) => record(result, &[x], || PadBackward {
            input,
            offset,
            input_len: x.len(),
        }),
        None => TrackedTensor::new(result),
    })
}

#[derive(Debug)]
struct ConcatBackward {
    /// (node, offset, len) for every part; node is None for untracked parts.
    parts: Vec<(Option<NodeId>, usize, usize)>,
}

impl GradFn for ConcatBackward {
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        let mut grads = Vec::new();
        for &(id, offset, len) in &self.parts {
            if let Some(id) = id {
                grads.push((id, narrow(grad_output, offset, len)?));
            }
        }
        Ok(grads)
    }

    fn inputs(&self) -> Vec<NodeId> {
        let ids: Vec<_> = self.parts.iter().map(|&(id, _, _)| id).collect();
        tracked_ids(&ids)
    }

    fn name(&self) -> &'static str {
        "concat"
    }
}

/// Tracked concatenation of 1-D tensors.
pub fn concat(parts: &[TrackedTensor]) -> Result<TrackedTensor, TensorError> {
    let tensors: Vec<&DenseTensor<f64>> = parts.iter().map(|p| p.tensor()).collect();
    let result = operations::concat(&tensors)?;
    let parents: Vec<&TrackedTensor> = parts.iter().collect();
    Ok(record(result, &parents, || {
        let mut offset = 0;
        let parts = parts
            .iter()
            .map(|p| {
                let entry = (p.node_id(), offset, p.len());
                offset += p.len();
                entry
            })
            .collect();
        ConcatBackward { parts }
    }))
}

#[derive(Debug)]
struct StackBackward {
    rows: Vec<Option<NodeId>>,
    row_len: usize,
}

impl GradFn for StackBackward {
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        let flat = flatten(grad_output)?;
        let mut grads = Vec::new();
        for (i, id) in self.rows.iter().enumerate() {
            if let Some(id) = id {
                grads.push((*id, narrow(&flat, i * self.row_len, self.row_len)?));
            }
        }
        Ok(grads)
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&self.rows)
    }

    fn name(&self) -> &'static str {
        "stack"
    }
}

/// Tracked stack of `m` equal-length 1-D rows into an `[m, n]` matrix.
///
/// # Errors
///
/// Returns `EmptyCollection` for no rows, `RankMismatch` for a row that is
/// not 1-D and `ShapeMismatch` for rows of differing length.
pub fn stack(rows: &[TrackedTensor]) -> Result<TrackedTensor, TensorError> {
    let tensors: Vec<&DenseTensor<f64>> = rows.iter().map(|r| r.tensor()).collect();
    let result = operations::stack_rows(&tensors)?;
    let row_len = result.shape()[1];
    let parents: Vec<&TrackedTensor> = rows.iter().collect();
    Ok(record(result, &parents, || StackBackward {
        rows: rows.iter().map(|r| r.node_id()).collect(),
        row_len,
    }))
}
