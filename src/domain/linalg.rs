//! Dense linear algebra for the per-action models, backed by nalgebra.

use crate::domain::errors::{OpeError, OpeResult};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1};

fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// Lower-triangular Cholesky factor of a symmetric positive definite matrix.
/// Increasing diagonal jitter is added when the matrix is only semi-definite.
pub fn cholesky(a: &Array2<f64>) -> OpeResult<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(OpeError::shape("cholesky input", "square", format!("{:?}", a.dim())));
    }
    let m = to_dmatrix(a);
    if m.iter().any(|v| !v.is_finite()) {
        return Err(OpeError::Regression {
            reason: "matrix has non-finite entries".to_string(),
        });
    }

    let mut jitter = 0.0;
    for _ in 0..6 {
        let candidate = &m + DMatrix::<f64>::identity(n, n) * jitter;
        if let Some(chol) = candidate.cholesky() {
            let l = chol.l();
            return Ok(Array2::from_shape_fn((n, n), |(i, j)| l[(i, j)]));
        }
        jitter = if jitter == 0.0 { 1e-10 } else { jitter * 100.0 };
    }
    Err(OpeError::Regression {
        reason: "matrix is not positive definite".to_string(),
    })
}

/// Solve `a x = b` through an LU decomposition.
pub fn solve(a: &Array2<f64>, b: &Array1<f64>) -> OpeResult<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return Err(OpeError::shape(
            "linear system",
            format!("({n}, {n}) x {n}"),
            format!("{:?} x {}", a.dim(), b.len()),
        ));
    }

    let rhs = DVector::from_iterator(n, b.iter().copied());
    let sol = to_dmatrix(a)
        .lu()
        .solve(&rhs)
        .filter(|x| x.iter().all(|v| v.is_finite()))
        .ok_or_else(|| OpeError::Regression {
            reason: "singular system".to_string(),
        })?;
    Ok(Array1::from_iter(sol.iter().copied()))
}

/// Sherman–Morrison rank-one update of an inverse: `(A + x x^T)^-1` from `A^-1`.
pub fn sherman_morrison_update(a_inv: &mut Array2<f64>, x: ArrayView1<'_, f64>) {
    let a_inv_x = a_inv.dot(&x);
    let denom = 1.0 + x.dot(&a_inv_x);
    let n = a_inv_x.len();
    for i in 0..n {
        for j in 0..n {
            a_inv[[i, j]] -= a_inv_x[i] * a_inv_x[j] / denom;
        }
    }
}
