//! Reverse-mode automatic differentiation and Jacobian assembly.
//!
//! This module provides tape-based reverse-mode AD for dense `f64` tensors,
//! following a PyTorch-style API with a thread-local computation graph, and
//! builds full Jacobians on top of it.
//!
//! # Architecture
//!
//! ```text
//! TrackedTensor  ──registers in──►  ComputationGraph (thread_local)
//!        │                                 │
//!        ▼                                 ▼
//!  DenseTensor<f64>                   Vec<Node>
//!                                          │
//!                                          ▼
//!                               Rc<dyn GradFn> (tracked ops)
//!
//! jacobian ──► GradEngine ──► grad ──► toposort (petgraph) ──► Gradients
//! ```
//!
//! # Example
//!
//! ```
//! use ndjacobian::autodiff::{GradOptions, TrackedTensor, clear_graph, grad, ops};
//! use ndjacobian::Tensor;
//!
//! // Clear the graph for a fresh computation
//! clear_graph();
//!
//! let a = TrackedTensor::leaf(Tensor::ones(&[2, 3]));
//! let b = TrackedTensor::leaf(Tensor::ones(&[3, 4]));
//!
//! // loss = sum(A @ B)
//! let loss = ops::sum(&ops::matmul(&a, &b).unwrap());
//!
//! let grads = grad(&loss, &[a, b], GradOptions::default()).unwrap();
//! assert_eq!(grads[0].as_ref().unwrap().data(), &[4.0; 6]);
//! assert_eq!(grads[1].as_ref().unwrap().data(), &[2.0; 12]);
//! ```
//!
//! # Key Types
//!
//! - [`TrackedTensor`]: Tensor with gradient tracking
//! - [`grad`]: Gradient of a single-element output with respect to inputs
//! - [`jacobian`]: Full Jacobian blocks of a tensor function
//! - [`GradEngine`]: Engine capabilities the Jacobian assembler relies on
//!
//! # Design Notes
//!
//! - Thread-local computation graph (no `Arc`, uses `Rc`)
//! - Backward functions are built from tracked ops, so gradients can be
//!   differentiated again with `create_graph`
//! - Gradient accumulation for multiple paths to same node

mod backward;
mod engine;
mod gradients;
mod graph;
mod hessian;
mod jacobian;
mod mode;
pub mod ops;
mod tensor;

pub use backward::{GradOptions, grad};
pub use engine::{GradEngine, TapeEngine};
pub use graph::{ComputationGraph, GradFn, Node, NodeId, clear_graph, with_graph};
pub use hessian::hessian;
pub use jacobian::{IntoTensorList, Jacobian, JacobianOptions, jacobian, jacobian_with};
pub use mode::{is_grad_enabled, no_grad, with_grad_mode};
pub use tensor::TrackedTensor;
