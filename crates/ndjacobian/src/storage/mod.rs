//! Storage types for tensor data.
//!
//! Only contiguous dense storage is provided; shape and strides live on the
//! `Tensor` wrapper.

mod dense;

pub use dense::Dense;
