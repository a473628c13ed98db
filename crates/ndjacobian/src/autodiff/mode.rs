//! Grad-mode switch.
//!
//! Operations record graph nodes only while grad mode is on. A backward pass
//! sets the mode to its `create_graph` flag so that the gradient computation
//! is recorded only when higher-order derivatives are wanted.

use std::cell::Cell;

thread_local! {
    static GRAD_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// Whether tracked operations currently record into the graph.
pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(|g| g.get())
}

/// Restores the previous mode on drop, including during unwinding.
struct ModeGuard {
    previous: bool,
}

impl Drop for ModeGuard {
    fn drop(&mut self) {
        GRAD_ENABLED.with(|g| g.set(self.previous));
    }
}

/// Run `f` with grad mode set to `enabled`, restoring the previous mode after.
pub fn with_grad_mode<R>(enabled: bool, f: impl FnOnce() -> R) -> R {
    let previous = GRAD_ENABLED.with(|g| g.replace(enabled));
    let _guard = ModeGuard { previous };
    f()
}

/// Run `f` without recording any operations.
///
/// # Example
///
/// ```
/// use ndjacobian::autodiff::{TrackedTensor, no_grad, ops};
/// use ndjacobian::Tensor;
///
/// let x = TrackedTensor::leaf(Tensor::ones(&[2]));
/// let y = no_grad(|| ops::mul(&x, &x)).unwrap();
/// assert!(!y.requires_grad());
/// ```
pub fn no_grad<R>(f: impl FnOnce() -> R) -> R {
    with_grad_mode(false, f)
}
