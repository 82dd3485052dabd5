//! Kernel bandwidth selection
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::DMatrix;

use crate::consts::BANDWIDTH_JITTER;
use crate::misc::linalg::is_psd;
use crate::result::{KdeError, Result};

/// Rule for choosing the kernel bandwidth matrix H.
///
/// The data-driven rules scale the mixture covariance Σ by a factor that
/// shrinks as the effective sample mass N grows.
///
/// # Example
///
/// ```
/// use nalgebra::DMatrix;
/// use okde::Bandwidth;
///
/// let cov = DMatrix::identity(2, 2);
///
/// // (4 / ((d + 2) N))^(2 / (d + 4)) with d = 2 and N = 1000
/// let h = Bandwidth::Silverman.select(&cov, 1000.0).unwrap();
/// assert!((h[(0, 0)] - 0.1).abs() < 1E-6);
///
/// let fixed = Bandwidth::Fixed(DMatrix::identity(2, 2) * 0.5);
/// assert_eq!(fixed.select(&cov, 1000.0).unwrap()[(1, 1)], 0.5);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum Bandwidth {
    /// H = (4 / ((d + 2) N))<sup>2/(d+4)</sup> Σ
    #[default]
    Silverman,
    /// H = N<sup>-2/(d+4)</sup> Σ
    Scott,
    /// A caller-supplied, positive semi-definite H
    Fixed(DMatrix<f64>),
}

impl Bandwidth {
    /// Check that a fixed matrix is square, non-empty, and PSD
    pub fn validate(&self) -> Result<()> {
        match self {
            Bandwidth::Fixed(h) if h.is_empty() || !is_psd(h) => {
                Err(KdeError::InvalidBandwidth)
            }
            _ => Ok(()),
        }
    }

    /// The factor multiplying Σ, for the data-driven rules
    fn scale(&self, dims: usize, n_eff: f64) -> Option<f64> {
        let d = dims as f64;
        match self {
            Bandwidth::Silverman => {
                Some((4.0 / ((d + 2.0) * n_eff)).powf(2.0 / (d + 4.0)))
            }
            Bandwidth::Scott => Some(n_eff.powf(-2.0 / (d + 4.0))),
            Bandwidth::Fixed(_) => None,
        }
    }

    /// Compute H from the mixture covariance `cov` and the effective sample
    /// mass `n_eff`.
    ///
    /// Data-driven rules add a small diagonal jitter so that H is positive
    /// definite even when `cov` is singular.
    pub fn select(&self, cov: &DMatrix<f64>, n_eff: f64) -> Result<DMatrix<f64>> {
        let dims = cov.nrows();
        if !cov.is_square() {
            return Err(KdeError::InvalidCovariance { index: 0 });
        }

        match self {
            Bandwidth::Fixed(h) => {
                if h.nrows() != dims || h.ncols() != dims {
                    Err(KdeError::DimensionMismatch {
                        expected: dims,
                        given: h.nrows(),
                    })
                } else {
                    self.validate()?;
                    Ok(h.clone())
                }
            }
            _ => {
                if !(n_eff.is_finite() && n_eff > 0.0) || dims == 0 {
                    return Err(KdeError::InvalidBandwidth);
                }
                let scale = self
                    .scale(dims, n_eff)
                    .ok_or(KdeError::InvalidBandwidth)?;
                let trace = cov.trace();
                let jitter = if trace > 0.0 {
                    BANDWIDTH_JITTER * trace / dims as f64
                } else {
                    BANDWIDTH_JITTER
                };
                Ok(cov * scale + DMatrix::identity(dims, dims) * jitter)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1E-12;

    crate::test_basic_impls!(Bandwidth::Fixed(DMatrix::identity(2, 2)));

    #[cfg(feature = "serde1")]
    crate::test_serde_params!(Bandwidth::Scott, Bandwidth);

    #[test]
    fn default_is_silverman() {
        assert_eq!(Bandwidth::default(), Bandwidth::Silverman);
    }

    #[test]
    fn silverman_in_one_dimension() {
        // (4 / 3N)^(1/5) for the variance
        let cov = DMatrix::from_row_slice(1, 1, &[2.0]);
        let h = Bandwidth::Silverman.select(&cov, 100.0).unwrap();
        let expected = 2.0 * (4.0_f64 / 300.0).powf(0.4) + 2.0 * BANDWIDTH_JITTER;
        assert::close(h[(0, 0)], expected, TOL);
    }

    #[test]
    fn scott_in_two_dimensions() {
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 1.0]);
        let h = Bandwidth::Scott.select(&cov, 64.0).unwrap();
        // 64^(-1/3) = 1/4
        assert::close(h[(0, 0)], 0.25 + BANDWIDTH_JITTER, TOL);
        assert::close(h[(0, 1)], 0.125, TOL);
        assert::close(h[(1, 1)], 0.25 + BANDWIDTH_JITTER, TOL);
    }

    #[test]
    fn bandwidth_shrinks_with_mass() {
        let cov = DMatrix::identity(3, 3);
        let h_small = Bandwidth::Silverman.select(&cov, 10.0).unwrap();
        let h_large = Bandwidth::Silverman.select(&cov, 1000.0).unwrap();
        assert!(h_large[(0, 0)] < h_small[(0, 0)]);
    }

    #[test]
    fn zero_covariance_gets_absolute_jitter() {
        let h = Bandwidth::Silverman
            .select(&DMatrix::zeros(2, 2), 1.0)
            .unwrap();
        assert_eq!(h, DMatrix::identity(2, 2) * BANDWIDTH_JITTER);
        assert!(h.cholesky().is_some());
    }

    #[test]
    fn singular_covariance_gives_positive_definite_bandwidth() {
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let h = Bandwidth::Silverman.select(&cov, 2.0).unwrap();
        assert!(h.cholesky().is_some());
    }

    #[test]
    fn fixed_bandwidth_is_returned_as_is() {
        let m = DMatrix::from_row_slice(2, 2, &[0.3, 0.1, 0.1, 0.2]);
        let h = Bandwidth::Fixed(m.clone())
            .select(&DMatrix::identity(2, 2), 5.0)
            .unwrap();
        assert_eq!(h, m);
    }

    #[test]
    fn fixed_bandwidth_of_wrong_dimension() {
        let res = Bandwidth::Fixed(DMatrix::identity(3, 3))
            .select(&DMatrix::identity(2, 2), 5.0);
        assert_eq!(
            res,
            Err(KdeError::DimensionMismatch {
                expected: 2,
                given: 3
            })
        );
    }

    #[test]
    fn validate_rejects_indefinite_fixed_bandwidth() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert_eq!(
            Bandwidth::Fixed(m).validate(),
            Err(KdeError::InvalidBandwidth)
        );
        assert_eq!(
            Bandwidth::Fixed(DMatrix::zeros(0, 0)).validate(),
            Err(KdeError::InvalidBandwidth)
        );
        assert!(Bandwidth::Scott.validate().is_ok());
    }

    #[test]
    fn data_driven_rule_rejects_zero_mass() {
        let res = Bandwidth::Scott.select(&DMatrix::identity(2, 2), 0.0);
        assert_eq!(res, Err(KdeError::InvalidBandwidth));
    }
}
