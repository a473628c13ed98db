//! Hessian of a scalar function as the Jacobian of its gradient.
//!
//! ```text
//! g(x) = ∇f(x)        reverse pass with create_graph
//! H    = ∂g/∂x        one more reverse pass per entry of g
//! ```

use super::backward::{GradOptions, grad};
use super::jacobian::{JacobianOptions, jacobian};
use super::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::tensor::DenseTensor;

/// Hessian of a single-element `f` at `input`, as an `[n, n]` matrix where
/// `n = input.len()` and entries are indexed in row-major order.
///
/// A gradient that does not depend on `input` (for example when `f` is
/// linear) gives a zero matrix. `options.create_graph` makes the result
/// differentiable; `allow_unused` is ignored.
///
/// # Errors
///
/// - `NotTracked` if `input` does not require grad
/// - `NonScalarOutput` if `f` returns more than one element
/// - any error raised by `f`
///
/// # Example
///
/// ```
/// use ndjacobian::autodiff::{JacobianOptions, TrackedTensor, hessian, ops};
/// use ndjacobian::Tensor;
///
/// let x = TrackedTensor::leaf(Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap());
/// let h = hessian(|x| Ok(ops::sum(&ops::mul(x, x)?)), &x, JacobianOptions::default()).unwrap();
/// assert_eq!(h.data(), &[2.0, 0.0, 0.0, 2.0]);
/// ```
pub fn hessian<F>(
    f: F,
    input: &TrackedTensor,
    options: JacobianOptions,
) -> Result<TrackedTensor, TensorError>
where
    F: FnOnce(&TrackedTensor) -> Result<TrackedTensor, TensorError>,
{
    let n = input.len();
    let shape = input.shape().to_vec();
    let inner = GradOptions::default()
        .retain_graph(true)
        .create_graph(true)
        .allow_unused(true);

    let gradient = |xs: &[TrackedTensor]| -> Result<TrackedTensor, TensorError> {
        let y = f(&xs[0])?;
        let g = grad(&y, xs, inner)?.into_iter().next().flatten();
        Ok(g.unwrap_or_else(|| TrackedTensor::new(DenseTensor::zeros(&shape))))
    };

    let jac = jacobian(gradient, input, options.allow_unused(true))?;
    Ok(jac
        .into_single()
        .unwrap_or_else(|| TrackedTensor::new(DenseTensor::zeros(&[n, n]))))
}
