//! Tensor operations on plain (untracked) dense tensors.
//!
//! ```text
//! elementwise   apply / apply_binary / scale / add / sub / mul
//! permutedims   permutedims / transpose
//! matmul        2-D GEMM through faer
//! stack         concat (1-D) / stack_rows (1-D rows → 2-D)
//! ```
//!
//! The tracked counterparts in `autodiff::ops` delegate here for their
//! forward computation.

mod elementwise;
mod matmul;
mod permutedims;
mod stack;

pub use elementwise::{add, apply, apply_binary, mul, scale, sub};
pub use matmul::matmul;
pub use permutedims::{permutedims, transpose};
pub use stack::{concat, stack_rows};
