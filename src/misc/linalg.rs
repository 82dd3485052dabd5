//! Dense linear algebra helpers on top of nalgebra
use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};

use crate::consts::{CHOLESKY_JITTER, CHOLESKY_MAX_TRIES, PSD_TOL};

/// x xᵀ
#[inline]
pub fn outer_product_self(col: &DVector<f64>) -> DMatrix<f64> {
    col * col.transpose()
}

/// (A + Aᵀ) / 2
#[inline]
pub fn symmetrize(mat: &DMatrix<f64>) -> DMatrix<f64> {
    (mat + mat.transpose()) * 0.5
}

/// Largest absolute entry of `mat`
fn max_abs(mat: &DMatrix<f64>) -> f64 {
    mat.iter().fold(0.0, |acc: f64, x| acc.max(x.abs()))
}

/// Smallest eigenvalue of a symmetric matrix
pub fn min_eigenvalue(mat: &DMatrix<f64>) -> f64 {
    mat.clone()
        .symmetric_eigen()
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min)
}

/// Returns `true` if `mat` is square, finite, symmetric, and positive
/// semi-definite, up to a tolerance relative to its largest entry.
///
/// # Example
///
/// ```
/// use nalgebra::DMatrix;
/// use okde::misc::linalg::is_psd;
///
/// assert!(is_psd(&DMatrix::zeros(2, 2)));
/// assert!(is_psd(&DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0])));
/// assert!(!is_psd(&DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0])));
/// assert!(!is_psd(&DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.0, 1.0])));
/// ```
pub fn is_psd(mat: &DMatrix<f64>) -> bool {
    if !mat.is_square() || mat.iter().any(|x| !x.is_finite()) {
        return false;
    }
    let tol = PSD_TOL * max_abs(mat);
    let n = mat.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            if (mat[(i, j)] - mat[(j, i)]).abs() > tol {
                return false;
            }
        }
    }
    n == 0 || min_eigenvalue(&symmetrize(mat)) >= -tol
}

/// Project a nearly symmetric matrix onto the positive semi-definite cone.
///
/// The matrix is symmetrized; if it has negative eigenvalues they are set to
/// zero. Already PSD matrices are returned symmetrized but otherwise
/// unchanged.
pub fn clamp_psd(mat: &DMatrix<f64>) -> DMatrix<f64> {
    let sym = symmetrize(mat);
    let mut eig = sym.clone().symmetric_eigen();
    if eig.eigenvalues.iter().all(|&v| v >= 0.0) {
        return sym;
    }
    eig.eigenvalues.iter_mut().for_each(|v| *v = v.max(0.0));
    symmetrize(&eig.recompose())
}

/// Cholesky decomposition that retries with a growing diagonal jitter when
/// the matrix is numerically singular.
///
/// Returns `None` if the matrix contains non-finite values or stays
/// indefinite after every retry.
pub fn regularized_cholesky(mat: DMatrix<f64>) -> Option<Cholesky<f64, Dyn>> {
    if mat.iter().any(|x| !x.is_finite()) {
        return None;
    }
    if let Some(chol) = mat.clone().cholesky() {
        return Some(chol);
    }

    let n = mat.nrows();
    let scale = {
        let s = mat.diagonal().iter().map(|x| x.abs()).sum::<f64>() / n as f64;
        if s > 0.0 {
            s
        } else {
            1.0
        }
    };

    let mut jitter = CHOLESKY_JITTER * scale;
    for _ in 0..CHOLESKY_MAX_TRIES {
        let jittered = &mat + DMatrix::<f64>::identity(n, n) * jitter;
        if let Some(chol) = jittered.cholesky() {
            return Some(chol);
        }
        jitter *= 10.0;
    }
    None
}

/// ln |A| from the Cholesky factor of A
#[inline]
pub fn ln_det(chol: &Cholesky<f64, Dyn>) -> f64 {
    2.0 * chol.l_dirty().diagonal().iter().map(|x| x.ln()).sum::<f64>()
}
