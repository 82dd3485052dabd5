//! Distances between Gaussian kernels used to decide merge eligibility
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::dist::MvGaussian;

/// A symmetric, non-negative distance between two Gaussians
pub trait Divergence {
    /// Distance between `p` and `q`
    fn divergence(&self, p: &MvGaussian, q: &MvGaussian) -> f64;

    /// The largest squared Mahalanobis distance between means,
    /// Δᵀ S̄⁻¹ Δ with S̄ = (Σ<sub>p</sub> + Σ<sub>q</sub>) / 2, that is compatible
    /// with `divergence(p, q) <= threshold`.
    ///
    /// Returns `None` if no such bound exists, in which case every pair must
    /// be checked.
    fn mahalanobis_bound(&self, _threshold: f64) -> Option<f64> {
        None
    }
}

/// [Hellinger distance](https://en.wikipedia.org/wiki/Hellinger_distance),
/// √(1 - BC(p, q)) ∈ [0, 1], where BC is the Bhattacharyya coefficient.
///
/// # Example
///
/// ```
/// use nalgebra::{DMatrix, DVector};
/// use okde::dist::MvGaussian;
/// use okde::compress::{Divergence, Hellinger};
///
/// let p = MvGaussian::standard(1).unwrap();
/// let q = MvGaussian::new(
///     DVector::from_column_slice(&[1.0]),
///     DMatrix::identity(1, 1),
/// ).unwrap();
///
/// // BC = exp(-1/8)
/// let h = Hellinger.divergence(&p, &q);
/// assert!((h - (1.0 - (-0.125_f64).exp()).sqrt()).abs() < 1E-12);
/// assert_eq!(Hellinger.divergence(&p, &p), 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Hellinger;

impl Divergence for Hellinger {
    fn divergence(&self, p: &MvGaussian, q: &MvGaussian) -> f64 {
        (1.0 - p.bhattacharyya_coefficient(q)).max(0.0).sqrt()
    }

    // H ≤ t  ⇔  D_B ≤ -ln(1 - t²), and D_B ≥ ⅛ Δᵀ S̄⁻¹ Δ
    fn mahalanobis_bound(&self, threshold: f64) -> Option<f64> {
        if threshold < 1.0 {
            Some(-8.0 * (1.0 - threshold * threshold).ln())
        } else {
            None
        }
    }
}

/// [Bhattacharyya distance](https://en.wikipedia.org/wiki/Bhattacharyya_distance)
/// D<sub>B</sub> ∈ [0, ∞)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Bhattacharyya;

impl Divergence for Bhattacharyya {
    fn divergence(&self, p: &MvGaussian, q: &MvGaussian) -> f64 {
        p.bhattacharyya(q)
    }

    fn mahalanobis_bound(&self, threshold: f64) -> Option<f64> {
        if threshold.is_finite() {
            Some(8.0 * threshold)
        } else {
            None
        }
    }
}
