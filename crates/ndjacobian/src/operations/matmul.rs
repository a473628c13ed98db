//! Matrix multiplication through faer's GEMM.

use faer::linalg::matmul::matmul as gemm;
use faer::{Accum, MatMut, MatRef, Par};

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// Multiply two matrices: `a` (m×k) · `b` (k×n).
///
/// # Errors
///
/// Returns `RankMismatch` if either operand is not 2-D and `ShapeMismatch`
/// if the inner dimensions differ.
///
/// # Example
///
/// ```
/// use ndjacobian::Tensor;
/// use ndjacobian::operations::matmul;
///
/// let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
/// let b = Tensor::from_vec(vec![5.0, 6.0, 7.0, 8.0], &[2, 2]).unwrap();
/// let c = matmul(&a, &b).unwrap();
/// assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0]);
/// ```
pub fn matmul<ElT: Scalar>(
    a: &DenseTensor<ElT>,
    b: &DenseTensor<ElT>,
) -> Result<DenseTensor<ElT>, TensorError> {
    for t in [a, b] {
        if t.ndim() != 2 {
            return Err(TensorError::RankMismatch {
                expected: 2,
                actual: t.ndim(),
            });
        }
    }
    let (m, k) = (a.shape()[0], a.shape()[1]);
    let (kb, n) = (b.shape()[0], b.shape()[1]);
    if k != kb {
        return Err(TensorError::ShapeMismatch {
            expected: k,
            actual: kb,
        });
    }

    let mut c = DenseTensor::<ElT>::zeros(&[m, n]);
    if m == 0 || n == 0 || k == 0 {
        return Ok(c);
    }

    // faer is column-major: a row-major (r×c) buffer is the column-major
    // transpose (c×r), so C = A·B is computed as Cᵀ = Bᵀ·Aᵀ.
    let a_t = MatRef::from_column_major_slice(a.data(), k, m);
    let b_t = MatRef::from_column_major_slice(b.data(), n, k);
    let c_t = MatMut::from_column_major_slice_mut(c.data_mut(), n, m);

    gemm(c_t, Accum::Replace, b_t, a_t, ElT::one(), Par::Seq);

    Ok(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_matmul_rectangular() {
        // [2x3] @ [3x2]
        let a = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let b = DenseTensor::from_vec(vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0], &[3, 2]).unwrap();
        let c = matmul(&a, &b).unwrap();

        assert_eq!(c.shape(), &[2, 2]);
        let expected = [58.0, 64.0, 139.0, 154.0];
        for (got, want) in c.data().iter().zip(expected.iter()) {
            assert_relative_eq!(*got, *want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_matmul_vector_shapes() {
        // [1x3] @ [3x1] is a 1x1 inner product
        let a = DenseTensor::from_vec(vec![1.0, 2.0, 3.0], &[1, 3]).unwrap();
        let b = DenseTensor::from_vec(vec![4.0, 5.0, 6.0], &[3, 1]).unwrap();
        let c = matmul(&a, &b).unwrap();
        assert_eq!(c.shape(), &[1, 1]);
        assert_relative_eq!(c.data()[0], 32.0, epsilon = 1e-12);
    }

    #[test]
    fn test_matmul_errors() {
        let a: DenseTensor<f64> = DenseTensor::zeros(&[2, 3]);
        let b: DenseTensor<f64> = DenseTensor::zeros(&[2, 3]);
        assert!(matches!(
            matmul(&a, &b),
            Err(TensorError::ShapeMismatch {
                expected: 3,
                actual: 2
            })
        ));

        let v: DenseTensor<f64> = DenseTensor::zeros(&[3]);
        assert!(matches!(
            matmul(&a, &v),
            Err(TensorError::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_matmul_empty_inner_dimension() {
        let a: DenseTensor<f64> = DenseTensor::zeros(&[2, 0]);
        let b: DenseTensor<f64> = DenseTensor::zeros(&[0, 3]);
        let c = matmul(&a, &b).unwrap();
        assert_eq!(c.shape(), &[2, 3]);
        assert!(c.data().iter().all(|&x| x == 0.0));
    }
}
