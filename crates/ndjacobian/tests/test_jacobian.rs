//! Integration tests for Jacobian assembly.
//!
//! Known matrices for small matmul problems, numerical Jacobian checks on
//! random inputs, and the way the assembler drives its engine.

#![cfg(feature = "autodiff")]

use approx::assert_relative_eq;
use ndjacobian::autodiff::{
    GradEngine, GradOptions, Jacobian, JacobianOptions, TapeEngine, TrackedTensor, clear_graph,
    grad, jacobian, jacobian_with, no_grad, ops,
};
use ndjacobian::{Tensor, TensorError};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::cell::{Cell, RefCell};

/// Central-difference Jacobian of `f` at `x`, as a row-major `[m, n]` matrix.
fn numerical_jacobian<F>(f: F, x: &[f64], eps: f64) -> Vec<f64>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = x.len();
    let m = f(x).len();
    let mut jac = vec![0.0; m * n];
    let mut x_plus = x.to_vec();
    let mut x_minus = x.to_vec();

    for j in 0..n {
        x_plus[j] = x[j] + eps;
        x_minus[j] = x[j] - eps;

        let f_plus = f(&x_plus);
        let f_minus = f(&x_minus);
        for i in 0..m {
            jac[i * n + j] = (f_plus[i] - f_minus[i]) / (2.0 * eps);
        }

        x_plus[j] = x[j];
        x_minus[j] = x[j];
    }
    jac
}

fn leaf(data: Vec<f64>, shape: &[usize]) -> TrackedTensor {
    TrackedTensor::leaf(Tensor::from_vec(data, shape).unwrap())
}

fn assert_block(jac: &Jacobian<TrackedTensor>, o: usize, j: usize, shape: &[usize], expected: &[f64]) {
    let block = jac.block(o, j).unwrap();
    assert_eq!(block.shape(), shape);
    for (a, e) in block.data().iter().zip(expected) {
        assert_relative_eq!(*a, *e, epsilon = 1e-12);
    }
}

#[test]
fn test_matmul_square_single_input() {
    clear_graph();
    let x = TrackedTensor::leaf(Tensor::ones(&[2, 2]));

    let jac = jacobian(|xs| ops::matmul(&xs[0], &xs[0]), x, JacobianOptions::default()).unwrap();

    assert!(matches!(jac, Jacobian::Single(Some(_))));
    #[rustfmt::skip]
    let expected = [
        2.0, 1.0, 1.0, 0.0,
        1.0, 2.0, 0.0, 1.0,
        1.0, 0.0, 2.0, 1.0,
        0.0, 1.0, 1.0, 2.0,
    ];
    assert_block(&jac, 0, 0, &[4, 4], &expected);
}

#[test]
fn test_matmul_two_inputs() {
    clear_graph();
    let x = TrackedTensor::leaf(Tensor::ones(&[2, 2]));
    let y = TrackedTensor::leaf(Tensor::full(&[2, 2], 2.0));

    let jac = jacobian(
        |xs| ops::matmul(&xs[0], &xs[1]),
        vec![x, y],
        JacobianOptions::default(),
    )
    .unwrap();

    assert!(matches!(jac, Jacobian::PerInput(ref blocks) if blocks.len() == 2));
    #[rustfmt::skip]
    let wrt_x = [
        2.0, 2.0, 0.0, 0.0,
        2.0, 2.0, 0.0, 0.0,
        0.0, 0.0, 2.0, 2.0,
        0.0, 0.0, 2.0, 2.0,
    ];
    #[rustfmt::skip]
    let wrt_y = [
        1.0, 0.0, 1.0, 0.0,
        0.0, 1.0, 0.0, 1.0,
        1.0, 0.0, 1.0, 0.0,
        0.0, 1.0, 0.0, 1.0,
    ];
    assert_block(&jac, 0, 0, &[4, 4], &wrt_x);
    assert_block(&jac, 0, 1, &[4, 4], &wrt_y);
}

#[test]
fn test_two_outputs_with_unreachable_pair() {
    clear_graph();
    let x = TrackedTensor::leaf(Tensor::ones(&[2, 2]));
    let y = TrackedTensor::leaf(Tensor::full(&[2, 2], 2.0));

    let jac = jacobian(
        |xs| Ok((ops::matmul(&xs[0], &xs[1])?, ops::mul(&xs[0], &xs[0])?)),
        (x, y),
        JacobianOptions::default().allow_unused(true),
    )
    .unwrap();

    assert!(matches!(jac, Jacobian::Nested(_)));
    assert_eq!(jac.num_outputs(), 2);
    assert_eq!(jac.num_inputs(), 2);

    #[rustfmt::skip]
    let square_wrt_x = [
        2.0, 0.0, 0.0, 0.0,
        0.0, 2.0, 0.0, 0.0,
        0.0, 0.0, 2.0, 0.0,
        0.0, 0.0, 0.0, 2.0,
    ];
    assert_block(&jac, 1, 0, &[4, 4], &square_wrt_x);

    let nested = jac.into_nested();
    assert!(nested[0][0].is_some());
    assert!(nested[0][1].is_some());
    assert!(nested[1][1].is_none());
}

#[test]
fn test_unreachable_pair_without_allow_unused() {
    clear_graph();
    let x = TrackedTensor::leaf(Tensor::ones(&[2, 2]));
    let y = TrackedTensor::leaf(Tensor::ones(&[2, 2]));

    let result = jacobian(
        |xs| Ok((ops::matmul(&xs[0], &xs[1])?, ops::mul(&xs[0], &xs[0])?)),
        (x, y),
        JacobianOptions::default(),
    );

    assert!(matches!(result, Err(TensorError::UnusedInput { index: 1 })));
}

#[test]
fn test_per_output_collapse() {
    clear_graph();
    let x = leaf(vec![1.0, 2.0, 3.0], &[3]);

    let jac = jacobian(
        |xs| {
            let x = &xs[0];
            Ok(vec![ops::sum(x), ops::exp(x), ops::matmul(&ops::reshape(x, &[3, 1])?, &ops::reshape(x, &[1, 3])?)?])
        },
        x.clone(),
        JacobianOptions::default(),
    )
    .unwrap();

    assert!(matches!(jac, Jacobian::PerOutput(ref blocks) if blocks.len() == 3));
    assert_block(&jac, 0, 0, &[1, 3], &[1.0, 1.0, 1.0]);

    let exp_block = jac.block(1, 0).unwrap();
    assert_eq!(exp_block.shape(), &[3, 3]);
    for i in 0..3 {
        for j in 0..3 {
            let expected = if i == j { x.data()[i].exp() } else { 0.0 };
            assert_relative_eq!(exp_block.data()[i * 3 + j], expected, epsilon = 1e-12);
        }
    }

    // Outer product: d(x_a x_b)/dx_c = δ_ac x_b + x_a δ_bc
    let outer = jac.block(2, 0).unwrap();
    assert_eq!(outer.shape(), &[9, 3]);
    let xs = x.data();
    for a in 0..3 {
        for b in 0..3 {
            for c in 0..3 {
                let mut expected = 0.0;
                if a == c {
                    expected += xs[b];
                }
                if b == c {
                    expected += xs[a];
                }
                assert_relative_eq!(outer.data()[(a * 3 + b) * 3 + c], expected, epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn test_numerical_jacobian_random_inputs() {
    clear_graph();
    let eps = 1e-6;
    let mut rng = StdRng::seed_from_u64(2024);
    let a_init: Tensor<f64> = Tensor::randn_with_rng(&[3, 2], &mut rng);
    let b_init: Tensor<f64> = Tensor::uniform_with_rng(&[2, 4], 0.5, 1.5, &mut rng);

    // f(A, B) = exp(A @ B) - 2 * (A @ B)
    let f = |a: &TrackedTensor, b: &TrackedTensor| -> TrackedTensor {
        let ab = ops::matmul(a, b).unwrap();
        ops::sub(&ops::exp(&ab), &ops::scale(&ab, 2.0)).unwrap()
    };

    let a = TrackedTensor::leaf(a_init.clone());
    let b = TrackedTensor::leaf(b_init.clone());
    let jac = jacobian(|xs| Ok(f(&xs[0], &xs[1])), [a, b], JacobianOptions::default()).unwrap();

    let numerical_a = numerical_jacobian(
        |v| {
            no_grad(|| {
                let a = TrackedTensor::new(Tensor::from_vec(v.to_vec(), &[3, 2]).unwrap());
                f(&a, &TrackedTensor::new(b_init.clone())).data().to_vec()
            })
        },
        a_init.data(),
        eps,
    );
    let numerical_b = numerical_jacobian(
        |v| {
            no_grad(|| {
                let b = TrackedTensor::new(Tensor::from_vec(v.to_vec(), &[2, 4]).unwrap());
                f(&TrackedTensor::new(a_init.clone()), &b).data().to_vec()
            })
        },
        b_init.data(),
        eps,
    );

    let block_a = jac.block(0, 0).unwrap();
    let block_b = jac.block(0, 1).unwrap();
    assert_eq!(block_a.shape(), &[12, 6]);
    assert_eq!(block_b.shape(), &[12, 8]);
    for (g, n) in block_a.data().iter().zip(&numerical_a) {
        assert_relative_eq!(*g, *n, epsilon = 1e-5, max_relative = 1e-5);
    }
    for (g, n) in block_b.data().iter().zip(&numerical_b) {
        assert_relative_eq!(*g, *n, epsilon = 1e-5, max_relative = 1e-5);
    }
}

/// Wraps the tape engine and records every gradient request.
#[derive(Default)]
struct CountingEngine {
    calls: RefCell<Vec<GradOptions>>,
}

impl GradEngine for CountingEngine {
    type Tensor = TrackedTensor;

    fn grad(
        &self,
        output: &TrackedTensor,
        inputs: &[TrackedTensor],
        options: GradOptions,
    ) -> Result<Vec<Option<TrackedTensor>>, TensorError> {
        self.calls.borrow_mut().push(options);
        TapeEngine.grad(output, inputs, options)
    }

    fn requires_grad(&self, tensor: &TrackedTensor) -> bool {
        TapeEngine.requires_grad(tensor)
    }

    fn numel(&self, tensor: &TrackedTensor) -> usize {
        TapeEngine.numel(tensor)
    }

    fn flatten(&self, tensor: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
        TapeEngine.flatten(tensor)
    }

    fn select(&self, flat: &TrackedTensor, index: usize) -> Result<TrackedTensor, TensorError> {
        TapeEngine.select(flat, index)
    }

    fn stack(&self, rows: &[TrackedTensor]) -> Result<TrackedTensor, TensorError> {
        TapeEngine.stack(rows)
    }
}

#[test]
fn test_one_engine_call_per_output_entry() {
    clear_graph();
    let engine = CountingEngine::default();
    let x = leaf(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
    let y = leaf(vec![0.5, -0.5], &[2]);

    // Output sizes 6 and 1, so 7 passes regardless of the two inputs.
    let jac = jacobian_with(
        &engine,
        |xs| Ok((ops::scale(&xs[0], 2.0), ops::sum(&ops::mul(&xs[1], &xs[1])?))),
        vec![x, y],
        JacobianOptions::default().allow_unused(true).create_graph(true),
    )
    .unwrap();

    let calls = engine.calls.borrow();
    assert_eq!(calls.len(), 7);
    assert!(calls.iter().all(|o| o.retain_graph && o.create_graph && o.allow_unused));
    assert_eq!(jac.num_outputs(), 2);
    assert!(jac.block(0, 1).is_none());
    assert!(jac.block(1, 0).is_none());
    assert_block(&jac, 1, 1, &[1, 2], &[1.0, -1.0]);
}

#[test]
fn test_engine_errors_propagate() {
    clear_graph();
    let engine = CountingEngine::default();
    let x = leaf(vec![1.0, 2.0], &[2]);
    let unused = leaf(vec![1.0], &[1]);

    let result = jacobian_with(
        &engine,
        |xs| Ok(ops::exp(&xs[0])),
        vec![x, unused],
        JacobianOptions::default(),
    );

    assert!(matches!(result, Err(TensorError::UnusedInput { index: 1 })));
    // The first failing pass stops the assembly.
    assert_eq!(engine.calls.borrow().len(), 1);
}

/// Drops the gradient of input 0 on the first pass only.
#[derive(Default)]
struct FirstPassBlindEngine {
    passes: Cell<usize>,
}

impl GradEngine for FirstPassBlindEngine {
    type Tensor = TrackedTensor;

    fn grad(
        &self,
        output: &TrackedTensor,
        inputs: &[TrackedTensor],
        options: GradOptions,
    ) -> Result<Vec<Option<TrackedTensor>>, TensorError> {
        let mut grads = TapeEngine.grad(output, inputs, options)?;
        if self.passes.replace(self.passes.get() + 1) == 0 {
            grads[0] = None;
        }
        Ok(grads)
    }

    fn requires_grad(&self, tensor: &TrackedTensor) -> bool {
        TapeEngine.requires_grad(tensor)
    }

    fn numel(&self, tensor: &TrackedTensor) -> usize {
        TapeEngine.numel(tensor)
    }

    fn flatten(&self, tensor: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
        TapeEngine.flatten(tensor)
    }

    fn select(&self, flat: &TrackedTensor, index: usize) -> Result<TrackedTensor, TensorError> {
        TapeEngine.select(flat, index)
    }

    fn stack(&self, rows: &[TrackedTensor]) -> Result<TrackedTensor, TensorError> {
        TapeEngine.stack(rows)
    }
}

#[test]
fn test_unreachable_first_row_drops_block() {
    clear_graph();
    let engine = FirstPassBlindEngine::default();
    let x = leaf(vec![1.0, 2.0, 3.0], &[3]);

    // Rows 1 and 2 are reachable, but the block follows row 0.
    let jac = jacobian_with(
        &engine,
        |xs| Ok(ops::scale(&xs[0], 3.0)),
        x,
        JacobianOptions::default().allow_unused(true),
    )
    .unwrap();

    assert_eq!(engine.passes.get(), 3);
    assert!(matches!(jac, Jacobian::Single(None)));
}

#[test]
fn test_create_graph_blocks_are_differentiable() {
    clear_graph();
    let x = leaf(vec![0.5, -1.5, 2.0], &[3]);

    let jac = jacobian(
        |xs| Ok(ops::mul(&ops::mul(&xs[0], &xs[0])?, &xs[0])?),
        x.clone(),
        JacobianOptions::default().create_graph(true),
    )
    .unwrap();
    let block = jac.into_single().unwrap();
    assert!(block.requires_grad());

    // J = diag(3x²); d(trace J)/dx = 6x
    let trace = ops::sum(&block);
    let grads = grad(&trace, &[x.clone()], GradOptions::default()).unwrap();
    for (g, xi) in grads[0].as_ref().unwrap().data().iter().zip(x.data()) {
        assert_relative_eq!(*g, 6.0 * xi, epsilon = 1e-12);
    }
}

#[test]
fn test_jacobian_of_gradient_is_hessian() {
    clear_graph();
    let x = leaf(vec![1.0, -2.0, 0.5], &[3]);

    let hess = jacobian(
        |xs| {
            let cube = ops::mul(&ops::mul(&xs[0], &xs[0])?, &xs[0])?;
            let options = GradOptions::default().create_graph(true).retain_graph(true);
            let g = grad(&ops::sum(&cube), xs, options)?;
            Ok(g.into_iter().flatten().collect::<Vec<_>>())
        },
        x.clone(),
        JacobianOptions::default(),
    )
    .unwrap()
    .into_single()
    .unwrap();

    assert_eq!(hess.shape(), &[3, 3]);
    for i in 0..3 {
        for j in 0..3 {
            let expected = if i == j { 6.0 * x.data()[i] } else { 0.0 };
            assert_relative_eq!(hess.data()[i * 3 + j], expected, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_graph_freed_after_non_retaining_pass() {
    clear_graph();
    let x = leaf(vec![1.0, 2.0], &[2]);
    let y = ops::exp(&x);

    // Retaining pass (as the assembler does) leaves the graph usable.
    let jac = jacobian(|_| Ok(y.clone()), x.clone(), JacobianOptions::default()).unwrap();
    assert!(jac.as_single().is_some());

    let loss = ops::sum(&y);
    grad(&loss, &[x.clone()], GradOptions::default()).unwrap();

    let again = jacobian(|_| Ok(y.clone()), x, JacobianOptions::default());
    assert!(matches!(again, Err(TensorError::GraphFreed { .. })));
}
