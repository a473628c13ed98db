//! Permutation operations for tensors.

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::strides::{cartesian_to_linear, linear_to_cartesian};
use crate::tensor::DenseTensor;

/// Permute the dimensions of a DenseTensor, returning a new DenseTensor.
///
/// `perm[i]` gives the source dimension for the i-th dimension of the result.
///
/// # Errors
///
/// Returns error if `perm` is not a valid permutation of `0..ndim`.
///
/// # Examples
///
/// ```
/// use ndjacobian::DenseTensor;
/// use ndjacobian::operations::permutedims;
///
/// let t: DenseTensor<f64> = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// let t2 = permutedims(&t, &[1, 0]).unwrap();
/// assert_eq!(t2.shape(), &[3, 2]);
/// assert_eq!(t.get(&[1, 0]), t2.get(&[0, 1]));
/// ```
pub fn permutedims<T: Scalar>(
    tensor: &DenseTensor<T>,
    perm: &[usize],
) -> Result<DenseTensor<T>, TensorError> {
    validate_permutation(perm, tensor.ndim())?;

    let new_shape: Vec<usize> = perm.iter().map(|&p| tensor.shape()[p]).collect();
    let mut result = DenseTensor::zeros(&new_shape);
    let new_strides = result.strides().to_vec();

    for (linear_old, &value) in tensor.data().iter().enumerate() {
        let old_indices = linear_to_cartesian(linear_old, tensor.shape());
        let new_indices: Vec<usize> = perm.iter().map(|&p| old_indices[p]).collect();
        result.data_mut()[cartesian_to_linear(&new_indices, &new_strides)] = value;
    }

    Ok(result)
}

/// Transpose a matrix.
///
/// # Errors
///
/// Returns `TensorError::RankMismatch` unless the tensor is 2-D.
pub fn transpose<T: Scalar>(tensor: &DenseTensor<T>) -> Result<DenseTensor<T>, TensorError> {
    if tensor.ndim() != 2 {
        return Err(TensorError::RankMismatch {
            expected: 2,
            actual: tensor.ndim(),
        });
    }
    permutedims(tensor, &[1, 0])
}

/// Validate that perm is a valid permutation of 0..ndim.
fn validate_permutation(perm: &[usize], ndim: usize) -> Result<(), TensorError> {
    let invalid = || TensorError::InvalidPermutation {
        perm: perm.to_vec(),
        ndim,
    };
    if perm.len() != ndim {
        return Err(invalid());
    }

    let mut seen = vec![false; ndim];
    for &p in perm {
        if p >= ndim || seen[p] {
            return Err(invalid());
        }
        seen[p] = true;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permute_3d() {
        let mut src: DenseTensor<f64> = DenseTensor::zeros(&[2, 3, 4]);
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..4 {
                    src.set(&[i, j, k], (i * 100 + j * 10 + k) as f64).unwrap();
                }
            }
        }

        let dest = permutedims(&src, &[2, 0, 1]).unwrap();
        assert_eq!(dest.shape(), &[4, 2, 3]);
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..4 {
                    assert_eq!(src.get(&[i, j, k]), dest.get(&[k, i, j]));
                }
            }
        }
    }

    #[test]
    fn test_invalid_permutation() {
        let t: DenseTensor<f64> = DenseTensor::zeros(&[2, 3]);
        assert!(permutedims(&t, &[0, 0]).is_err());
        assert!(permutedims(&t, &[0]).is_err());
        assert!(permutedims(&t, &[0, 2]).is_err());
    }

    #[test]
    fn test_transpose_requires_matrix() {
        let t: DenseTensor<f64> = DenseTensor::zeros(&[2, 3, 4]);
        assert!(matches!(
            transpose(&t),
            Err(TensorError::RankMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }
}
