//! Error types for ndjacobian.

use thiserror::Error;

/// Errors that can occur in tensor operations, gradient passes and
/// Jacobian assembly.
#[derive(Debug, Error)]
pub enum TensorError {
    /// Shape mismatch between data length and expected size.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Index out of bounds.
    #[error("index out of bounds: index {index} is out of range for dimension {dim_size}")]
    IndexOutOfBounds { index: usize, dim_size: usize },

    /// Wrong number of indices provided.
    #[error("wrong number of indices: expected {expected}, got {actual}")]
    WrongNumberOfIndices { expected: usize, actual: usize },

    /// Invalid permutation.
    #[error("invalid permutation {perm:?} for tensor with {ndim} dimensions")]
    InvalidPermutation { perm: Vec<usize>, ndim: usize },

    /// Operation requires specific tensor rank.
    #[error("expected tensor of rank {expected}, got rank {actual}")]
    RankMismatch { expected: usize, actual: usize },

    /// Slice range out of bounds.
    #[error("slice range {start}..{end} out of bounds for dimension {dim} with size {size}")]
    SliceOutOfBounds {
        start: usize,
        end: usize,
        dim: usize,
        size: usize,
    },

    /// An input or output collection was empty.
    #[error("{name} cannot be empty")]
    EmptyCollection { name: &'static str },

    /// A tensor that must take part in differentiation does not require grad.
    #[error("element {index} of {name} does not require grad")]
    NotTracked { name: &'static str, index: usize },

    /// Gradients can only be requested for single-element outputs.
    #[error("gradient requires a single-element output, got {len} elements")]
    NonScalarOutput { len: usize },

    /// An input is unreachable from the output and unused inputs are not allowed.
    #[error("input {index} is unreachable from the output; set allow_unused to get None instead")]
    UnusedInput { index: usize },

    /// The backward function of a node was released by an earlier pass.
    #[error(
        "node {node} was already released by a backward pass; pass retain_graph to differentiate through it again"
    )]
    GraphFreed { node: usize },

    /// Catch-all for invalid graph or tensor states.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}
