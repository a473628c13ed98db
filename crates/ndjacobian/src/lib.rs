//! ndjacobian - full Jacobians by repeated reverse-mode differentiation
//!
//! This crate assembles Jacobian matrices of tensor functions. For every
//! scalar entry of every (flattened) output, one reverse-mode gradient pass
//! produces a row of each `[m_o, n_j]` block.
//!
//! # Architecture
//!
//! ```text
//! Level 1: Jacobian assembly (autodiff::jacobian, autodiff::hessian)
//!     → jacobian, jacobian_with, hessian
//!
//! Level 2: Reverse-mode engine (autodiff)
//!     → TrackedTensor, thread-local graph, grad, tracked ops
//!
//! Level 3: Dense tensors (tensor, operations)
//!     → row-major Tensor<ElT>, element-wise ops, faer GEMM
//! ```
//!
//! # Example
//!
//! ```
//! use ndjacobian::autodiff::{JacobianOptions, TrackedTensor, jacobian, ops};
//! use ndjacobian::{DenseTensor, Tensor};
//!
//! let x: DenseTensor<f64> = Tensor::ones(&[2, 2]);
//! let y: DenseTensor<f64> = Tensor::full(&[2, 2], 2.0);
//! let inputs = vec![TrackedTensor::leaf(x), TrackedTensor::leaf(y)];
//!
//! let jac = jacobian(|xs| ops::matmul(&xs[0], &xs[1]), inputs, JacobianOptions::default()).unwrap();
//! assert_eq!(jac.num_inputs(), 2);
//! assert_eq!(jac.block(0, 0).unwrap().data()[..4], [2.0, 2.0, 0.0, 0.0]);
//! ```

#[cfg(feature = "autodiff")]
pub mod autodiff;
pub mod error;
pub mod operations;
pub mod random;
pub mod scalar;
pub mod storage;
pub mod strides;
pub mod tensor;

pub use error::TensorError;
pub use random::RandomScalar;
pub use scalar::Scalar;
pub use storage::Dense;
pub use tensor::{DenseTensor, Tensor};
