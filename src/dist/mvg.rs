#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};
use rand::Rng;
use rand_distr::StandardNormal;
use std::fmt;

use crate::consts::LN_2PI;
use crate::impl_display;
use crate::misc::linalg::{ln_det, regularized_cholesky};
use crate::traits::{HasDensity, Mean, Sampleable, Variance};

/// [Multivariate Gaussian/Normal Distribution](https://en.wikipedia.org/wiki/Multivariate_normal_distribution),
/// 𝒩(μ, Σ).
///
/// The Cholesky factor and log-determinant of Σ are computed once on
/// construction, so repeated density evaluations and divergence computations
/// only cost a triangular solve. Singular (positive semi-definite) covariance
/// matrices are accepted and regularized with a small diagonal jitter.
///
/// # Example
///
/// ```
/// use nalgebra::{DMatrix, DVector};
/// use okde::dist::MvGaussian;
/// use okde::traits::HasDensity;
///
/// let mvg = MvGaussian::new(DVector::zeros(2), DMatrix::identity(2, 2)).unwrap();
/// let x = DVector::from_column_slice(&[0.0, 0.0]);
///
/// let f = mvg.f(&x);
/// assert!((f - 1.0 / (2.0 * std::f64::consts::PI)).abs() < 1E-12);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "serde1", serde(try_from = "MvGaussianParameters"))]
#[cfg_attr(feature = "serde1", serde(into = "MvGaussianParameters"))]
pub struct MvGaussian {
    // Mean vector
    mu: DVector<f64>,
    // Covariance matrix
    cov: DMatrix<f64>,
    cache: MvgCache,
}

#[derive(Debug, Clone)]
struct MvgCache {
    /// Cholesky factor of the (regularized) covariance
    cov_chol: Cholesky<f64, Dyn>,
    /// ln |Σ|
    ln_det: f64,
    /// tr(Σ)
    trace: f64,
}

impl MvgCache {
    fn from_cov(cov: &DMatrix<f64>) -> Option<Self> {
        let cov_chol = regularized_cholesky(cov.clone())?;
        Some(MvgCache {
            ln_det: ln_det(&cov_chol),
            trace: cov.trace(),
            cov_chol,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct MvGaussianParameters {
    pub mu: DVector<f64>,
    pub cov: DMatrix<f64>,
}

impl TryFrom<MvGaussianParameters> for MvGaussian {
    type Error = MvGaussianError;

    fn try_from(params: MvGaussianParameters) -> Result<Self, Self::Error> {
        MvGaussian::new(params.mu, params.cov)
    }
}

impl From<MvGaussian> for MvGaussianParameters {
    fn from(mvg: MvGaussian) -> Self {
        MvGaussianParameters {
            mu: mvg.mu,
            cov: mvg.cov,
        }
    }
}

impl PartialEq for MvGaussian {
    fn eq(&self, other: &MvGaussian) -> bool {
        self.mu == other.mu && self.cov == other.cov
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum MvGaussianError {
    /// The number of dimensions in μ and Σ differ
    MuCovDimensionMismatch { n_mu: usize, n_cov: usize },
    /// Σ is not square
    CovNotSquare { nrows: usize, ncols: usize },
    /// Σ is not positive semi-definite, even after regularization
    CovNotPositiveSemiDefinite,
    /// The requested number of dimensions is zero
    ZeroDimensions,
}

impl MvGaussian {
    /// Create a new multivariate Gaussian distribution
    ///
    /// # Arguments
    /// - mu: k-length mean vector
    /// - cov: k-by-k positive semi-definite covariance matrix
    pub fn new(
        mu: DVector<f64>,
        cov: DMatrix<f64>,
    ) -> Result<Self, MvGaussianError> {
        if !cov.is_square() {
            Err(MvGaussianError::CovNotSquare {
                nrows: cov.nrows(),
                ncols: cov.ncols(),
            })
        } else if mu.len() != cov.nrows() {
            Err(MvGaussianError::MuCovDimensionMismatch {
                n_mu: mu.len(),
                n_cov: cov.nrows(),
            })
        } else if mu.is_empty() {
            Err(MvGaussianError::ZeroDimensions)
        } else {
            let cache = MvgCache::from_cov(&cov)
                .ok_or(MvGaussianError::CovNotPositiveSemiDefinite)?;
            Ok(MvGaussian { mu, cov, cache })
        }
    }

    /// Standard normal 𝒩(0, I) in `dims` dimensions
    pub fn standard(dims: usize) -> Result<Self, MvGaussianError> {
        MvGaussian::new(DVector::zeros(dims), DMatrix::identity(dims, dims))
    }

    /// Get the number of dimensions
    #[inline]
    #[must_use]
    pub fn ndims(&self) -> usize {
        self.mu.len()
    }

    /// Get a reference to the mean
    #[inline]
    #[must_use]
    pub fn mu(&self) -> &DVector<f64> {
        &self.mu
    }

    /// Get a reference to the covariance
    #[inline]
    #[must_use]
    pub fn cov(&self) -> &DMatrix<f64> {
        &self.cov
    }

    /// ln |Σ| of the (regularized) covariance
    #[inline]
    #[must_use]
    pub fn ln_det_cov(&self) -> f64 {
        self.cache.ln_det
    }

    /// tr(Σ)
    #[inline]
    #[must_use]
    pub fn trace_cov(&self) -> f64 {
        self.cache.trace
    }

    /// Squared Mahalanobis distance (x - μ)ᵀ Σ⁻¹ (x - μ)
    pub fn mahalanobis_sq(&self, x: &DVector<f64>) -> f64 {
        let diff = x - &self.mu;
        diff.dot(&self.cache.cov_chol.solve(&diff))
    }

    /// [Bhattacharyya distance](https://en.wikipedia.org/wiki/Bhattacharyya_distance)
    /// between two Gaussians
    ///
    /// D<sub>B</sub> = ⅛ Δᵀ S̄⁻¹ Δ + ½ ln(|S̄| / √(|Σ₁||Σ₂|)), where
    /// S̄ = (Σ₁ + Σ₂) / 2 and Δ = μ₁ - μ₂.
    ///
    /// Returns infinity if the dimensions differ or S̄ cannot be factored.
    ///
    /// # Example
    ///
    /// ```
    /// use nalgebra::{DMatrix, DVector};
    /// use okde::dist::MvGaussian;
    ///
    /// let a = MvGaussian::standard(2).unwrap();
    /// let b = MvGaussian::new(
    ///     DVector::from_column_slice(&[1.0, 1.0]),
    ///     DMatrix::identity(2, 2),
    /// ).unwrap();
    ///
    /// assert!((a.bhattacharyya(&b) - 0.25).abs() < 1E-12);
    /// assert!(a.bhattacharyya(&a).abs() < 1E-12);
    /// ```
    pub fn bhattacharyya(&self, other: &MvGaussian) -> f64 {
        if self.ndims() != other.ndims() {
            return f64::INFINITY;
        }
        let cov_avg = (&self.cov + &other.cov) * 0.5;
        let chol = match regularized_cholesky(cov_avg) {
            Some(chol) => chol,
            None => return f64::INFINITY,
        };
        let diff = &self.mu - &other.mu;
        let maha = diff.dot(&chol.solve(&diff));
        let ln_det_avg = ln_det(&chol);
        let db = 0.125 * maha
            + 0.5 * (ln_det_avg - 0.5 * (self.cache.ln_det + other.cache.ln_det));
        if db.is_nan() {
            return f64::INFINITY;
        }
        // rounding can push identical distributions slightly below zero
        db.max(0.0)
    }

    /// Bhattacharyya coefficient, ∫√(p q) dx ∈ [0, 1]
    #[inline]
    pub fn bhattacharyya_coefficient(&self, other: &MvGaussian) -> f64 {
        (-self.bhattacharyya(other)).exp()
    }
}

impl From<&MvGaussian> for String {
    fn from(mvg: &MvGaussian) -> String {
        format!("N(μ: {}, Σ: {})", mvg.mu, mvg.cov)
    }
}

impl_display!(MvGaussian);

impl HasDensity<DVector<f64>> for MvGaussian {
    fn ln_f(&self, x: &DVector<f64>) -> f64 {
        let d = self.ndims() as f64;
        -0.5 * (d * LN_2PI + self.cache.ln_det + self.mahalanobis_sq(x))
    }
}

impl Sampleable<DVector<f64>> for MvGaussian {
    fn draw<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        let dims = self.ndims();
        let z: DVector<f64> =
            DVector::from_fn(dims, |_, _| rng.sample(StandardNormal));
        &self.mu + self.cache.cov_chol.l() * z
    }
}

impl Mean<DVector<f64>> for MvGaussian {
    fn mean(&self) -> Option<DVector<f64>> {
        Some(self.mu.clone())
    }
}

impl Variance<DMatrix<f64>> for MvGaussian {
    fn variance(&self) -> Option<DMatrix<f64>> {
        Some(self.cov.clone())
    }
}

impl std::error::Error for MvGaussianError {}

impl fmt::Display for MvGaussianError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MuCovDimensionMismatch { n_mu, n_cov } => write!(
                f,
                "Number of dimensions in μ ({n_mu}) and Σ ({n_cov}) must match"
            ),
            Self::CovNotSquare { nrows, ncols } => {
                write!(f, "Σ must be square, got {nrows}x{ncols}")
            }
            Self::CovNotPositiveSemiDefinite => {
                write!(f, "Σ is not positive semi-definite")
            }
            Self::ZeroDimensions => write!(f, "ndims must be >= 1"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    const TOL: f64 = 1E-12;

    fn nonstandard_cov() -> DMatrix<f64> {
        let cov_vals = vec![
            1.017_427_88,
            0.365_866_52,
            -0.656_204_86,
            0.365_866_52,
            1.005_645_53,
            -0.425_972_61,
            -0.656_204_86,
            -0.425_972_61,
            1.272_479_72,
        ];
        DMatrix::from_row_slice(3, 3, &cov_vals)
    }

    crate::test_basic_impls!(MvGaussian::standard(2).unwrap());

    #[test]
    fn new() {
        let mu = DVector::zeros(3);
        let cov = DMatrix::identity(3, 3);
        assert!(MvGaussian::new(mu, cov).is_ok());
    }

    #[test]
    fn new_should_reject_cov_too_big() {
        let mu = DVector::zeros(3);
        let cov = DMatrix::identity(4, 4);
        let mvg = MvGaussian::new(mu, cov);

        assert_eq!(
            mvg,
            Err(MvGaussianError::MuCovDimensionMismatch { n_mu: 3, n_cov: 4 })
        );
    }

    #[test]
    fn new_should_reject_cov_not_square() {
        let mu = DVector::zeros(3);
        let cov = DMatrix::identity(3, 2);
        let mvg = MvGaussian::new(mu, cov);

        assert_eq!(
            mvg,
            Err(MvGaussianError::CovNotSquare { nrows: 3, ncols: 2 })
        );
    }

    #[test]
    fn new_should_reject_negative_definite_cov() {
        let mu = DVector::zeros(2);
        let cov = DMatrix::identity(2, 2) * -1.0;
        assert_eq!(
            MvGaussian::new(mu, cov),
            Err(MvGaussianError::CovNotPositiveSemiDefinite)
        );
    }

    #[test]
    fn new_should_accept_singular_cov() {
        let mu = DVector::zeros(2);
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let mvg = MvGaussian::new(mu, cov).unwrap();
        assert!(mvg.ln_det_cov().is_finite());
    }

    #[test]
    fn ln_f_standard_x_zeros() {
        let mvg = MvGaussian::standard(3).unwrap();
        let x = DVector::<f64>::zeros(3);
        assert::close(mvg.ln_f(&x), -2.756_815_599_614_018, TOL);
    }

    #[test]
    fn ln_f_standard_x_nonzeros() {
        let mvg = MvGaussian::standard(3).unwrap();
        let x = DVector::<f64>::from_column_slice(&[0.5, 3.1, -6.2]);
        assert::close(mvg.ln_f(&x), -26.906_815_599_614_02, TOL);
    }

    #[test]
    fn ln_f_nonstandard_zeros() {
        let mu = DVector::<f64>::from_column_slice(&[0.5, 3.1, -6.2]);
        let mvg = MvGaussian::new(mu, nonstandard_cov()).unwrap();
        let x = DVector::<f64>::zeros(3);
        assert::close(mvg.ln_f(&x), -24.602_370_253_215_66, 1E-8);
    }

    #[test]
    fn ln_f_nonstandard_nonzeros() {
        let mu = DVector::<f64>::from_column_slice(&[0.5, 3.1, -6.2]);
        let mvg = MvGaussian::new(mu, nonstandard_cov()).unwrap();
        let x = DVector::<f64>::from_column_slice(&[0.5, 3.1, -6.2]);
        assert::close(mvg.ln_f(&x), -2.591_535_053_811_229_6, 1E-8);
    }

    #[test]
    fn bhattacharyya_of_scaled_variances() {
        // 1-D: ½ ln(((1 + 4) / 2) / √4)
        let a = MvGaussian::new(
            DVector::zeros(1),
            DMatrix::from_element(1, 1, 1.0),
        )
        .unwrap();
        let b = MvGaussian::new(
            DVector::zeros(1),
            DMatrix::from_element(1, 1, 4.0),
        )
        .unwrap();
        assert::close(a.bhattacharyya(&b), 0.111_571_775_657_104_85, TOL);
        assert::close(a.bhattacharyya(&b), b.bhattacharyya(&a), TOL);
    }

    #[test]
    fn bhattacharyya_of_mismatched_dims_is_infinite() {
        let a = MvGaussian::standard(2).unwrap();
        let b = MvGaussian::standard(3).unwrap();
        assert_eq!(a.bhattacharyya(&b), f64::INFINITY);
    }

    #[test]
    fn bhattacharyya_with_nan_mean_is_infinite() {
        let a = MvGaussian::standard(2).unwrap();
        let b = MvGaussian::new(
            DVector::from_column_slice(&[f64::NAN, 0.0]),
            DMatrix::identity(2, 2),
        )
        .unwrap();
        assert_eq!(a.bhattacharyya(&b), f64::INFINITY);
        assert_eq!(a.bhattacharyya_coefficient(&b), 0.0);
    }

    #[test]
    fn bhattacharyya_coefficient_is_a_probability() {
        let a = MvGaussian::standard(2).unwrap();
        let b = MvGaussian::new(
            DVector::from_column_slice(&[3.0, -1.0]),
            DMatrix::identity(2, 2) * 0.3,
        )
        .unwrap();
        let bc = a.bhattacharyya_coefficient(&b);
        assert!(bc > 0.0 && bc < 1.0);
        assert::close(a.bhattacharyya_coefficient(&a), 1.0, TOL);
    }

    #[test]
    fn draws_have_the_right_mean() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0xABCD);
        let mu = DVector::<f64>::from_column_slice(&[0.5, 3.1, -6.2]);
        let mvg = MvGaussian::new(mu.clone(), nonstandard_cov()).unwrap();

        let n = 20_000;
        let xs = mvg.sample(n, &mut rng);
        let xbar: DVector<f64> =
            xs.iter().fold(DVector::zeros(3), |acc, x| acc + x) / n as f64;

        for i in 0..3 {
            assert::close(xbar[i], mu[i], 0.05);
        }
    }

    #[test]
    fn draws_should_be_finite() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0x1234);
        let mvg = MvGaussian::new(
            DVector::zeros(2),
            DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]),
        )
        .unwrap();
        for x in mvg.sample(100, &mut rng) {
            assert!(x.iter().all(|v| v.is_finite()));
        }
    }

    #[cfg(feature = "serde1")]
    crate::test_serde_params!(MvGaussian::standard(2).unwrap(), MvGaussian);
}
