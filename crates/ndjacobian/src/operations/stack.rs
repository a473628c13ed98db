//! Concatenation and stacking of 1-D tensors.

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

fn require_vector<ElT: Scalar>(t: &DenseTensor<ElT>) -> Result<(), TensorError> {
    if t.ndim() != 1 {
        return Err(TensorError::RankMismatch {
            expected: 1,
            actual: t.ndim(),
        });
    }
    Ok(())
}

/// Concatenate 1-D tensors end to end.
///
/// # Example
///
/// ```
/// use ndjacobian::Tensor;
/// use ndjacobian::operations::concat;
///
/// let a = Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap();
/// let b = Tensor::from_vec(vec![3.0], &[1]).unwrap();
/// assert_eq!(concat(&[&a, &b]).unwrap().data(), &[1.0, 2.0, 3.0]);
/// ```
pub fn concat<ElT: Scalar>(parts: &[&DenseTensor<ElT>]) -> Result<DenseTensor<ElT>, TensorError> {
    let mut data = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
    for part in parts {
        require_vector(part)?;
        data.extend_from_slice(part.data());
    }
    let len = data.len();
    DenseTensor::from_vec(data, &[len])
}

/// Stack equal-length 1-D rows along a new leading axis.
///
/// `m` rows of length `n` become an `[m, n]` matrix.
///
/// # Errors
///
/// Returns `EmptyCollection` for no rows, `RankMismatch` for a row that is
/// not 1-D and `ShapeMismatch` for rows of differing length.
pub fn stack_rows<ElT: Scalar>(rows: &[&DenseTensor<ElT>]) -> Result<DenseTensor<ElT>, TensorError> {
    let first = rows
        .first()
        .ok_or(TensorError::EmptyCollection { name: "rows" })?;
    require_vector(first)?;
    let n = first.len();
    for row in rows {
        require_vector(row)?;
        if row.len() != n {
            return Err(TensorError::ShapeMismatch {
                expected: n,
                actual: row.len(),
            });
        }
    }
    concat(rows)?.reshape(&[rows.len(), n])
}
