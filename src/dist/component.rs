#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::{DMatrix, DVector};

use crate::dist::{MvGaussian, MvGaussianError};
use crate::impl_display;
use crate::misc::linalg::{clamp_psd, is_psd, outer_product_self};
use crate::result::{KdeError, Result};
use crate::traits::{Mean, Variance};

/// A single weighted Gaussian in a mixture: weight, mean, and covariance.
///
/// A zero covariance is a point mass. The covariance stored here is the
/// component's own spread; the kernel bandwidth of the estimator is added
/// only when the component is smoothed for density evaluation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct GaussianComponent {
    weight: f64,
    mean: DVector<f64>,
    cov: DMatrix<f64>,
}

/// Checks one (sample, covariance, weight) triple against the mixture
/// dimension. `index` is reported back in the error.
pub(crate) fn validate_observation(
    index: usize,
    dims: usize,
    mean: &DVector<f64>,
    cov: &DMatrix<f64>,
    weight: f64,
) -> Result<()> {
    if mean.len() != dims {
        Err(KdeError::DimensionMismatch {
            expected: dims,
            given: mean.len(),
        })
    } else if mean.iter().any(|x| !x.is_finite()) {
        Err(KdeError::InvalidSample { index })
    } else if cov.nrows() != dims || cov.ncols() != dims {
        Err(KdeError::DimensionMismatch {
            expected: dims,
            given: if cov.nrows() != dims {
                cov.nrows()
            } else {
                cov.ncols()
            },
        })
    } else if !is_psd(cov) {
        Err(KdeError::InvalidCovariance { index })
    } else if !(weight.is_finite() && weight > 0.0) {
        Err(KdeError::InvalidWeight { index, weight })
    } else {
        Ok(())
    }
}

impl GaussianComponent {
    /// Create a new component
    ///
    /// # Arguments
    /// - weight: positive, finite weight
    /// - mean: finite mean vector
    /// - cov: symmetric positive semi-definite covariance with the same
    ///   dimension as `mean`
    ///
    /// Errors report index 0.
    pub fn new(
        weight: f64,
        mean: DVector<f64>,
        cov: DMatrix<f64>,
    ) -> Result<Self> {
        if mean.is_empty() {
            return Err(KdeError::EmptyInput);
        }
        validate_observation(0, mean.len(), &mean, &cov, weight)?;
        Ok(GaussianComponent {
            weight,
            mean,
            cov: clamp_psd(&cov),
        })
    }

    /// Creates a new component without checking whether the parameters are
    /// valid.
    #[inline]
    #[must_use]
    pub fn new_unchecked(
        weight: f64,
        mean: DVector<f64>,
        cov: DMatrix<f64>,
    ) -> Self {
        GaussianComponent { weight, mean, cov }
    }

    /// A point mass (zero covariance) at `mean`
    pub fn point(weight: f64, mean: DVector<f64>) -> Result<Self> {
        let dims = mean.len();
        GaussianComponent::new(weight, mean, DMatrix::zeros(dims, dims))
    }

    #[inline]
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    #[inline]
    #[must_use]
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    #[inline]
    #[must_use]
    pub fn cov(&self) -> &DMatrix<f64> {
        &self.cov
    }

    #[inline]
    #[must_use]
    pub fn ndims(&self) -> usize {
        self.mean.len()
    }

    #[inline]
    pub(crate) fn scale_weight(&mut self, factor: f64) {
        self.weight *= factor;
    }

    /// Second moment about the origin, Σ + μμᵀ
    pub fn second_moment(&self) -> DMatrix<f64> {
        &self.cov + outer_product_self(&self.mean)
    }

    /// The component's Gaussian convolved with a kernel of covariance
    /// `bandwidth`, 𝒩(μ, Σ + H)
    pub fn smoothed(
        &self,
        bandwidth: &DMatrix<f64>,
    ) -> std::result::Result<MvGaussian, MvGaussianError> {
        MvGaussian::new(self.mean.clone(), &self.cov + bandwidth)
    }

    /// Moment-matched merge of two components
    ///
    /// The result carries the summed weight and reproduces the first two
    /// moments of the weighted pair exactly.
    ///
    /// # Example
    ///
    /// ```
    /// use nalgebra::DVector;
    /// use okde::dist::GaussianComponent;
    ///
    /// let a = GaussianComponent::point(0.5, DVector::from_column_slice(&[0.0])).unwrap();
    /// let b = GaussianComponent::point(0.5, DVector::from_column_slice(&[2.0])).unwrap();
    /// let ab = a.merge(&b);
    ///
    /// assert!((ab.weight() - 1.0).abs() < 1E-12);
    /// assert!((ab.mean()[0] - 1.0).abs() < 1E-12);
    /// assert!((ab.cov()[(0, 0)] - 1.0).abs() < 1E-12);
    /// ```
    #[must_use]
    pub fn merge(&self, other: &GaussianComponent) -> GaussianComponent {
        let weight = self.weight + other.weight;
        // two vanished weights contribute equally
        let (wa, wb) = if weight > 0.0 {
            (self.weight / weight, other.weight / weight)
        } else {
            (0.5, 0.5)
        };
        let mean = &self.mean * wa + &other.mean * wb;

        let da = &self.mean - &mean;
        let db = &other.mean - &mean;
        let cov = (&self.cov + outer_product_self(&da)) * wa
            + (&other.cov + outer_product_self(&db)) * wb;

        GaussianComponent {
            weight,
            mean,
            cov: clamp_psd(&cov),
        }
    }

    /// Moment-matched merge of any number of components
    ///
    /// Returns `None` if `components` is empty.
    pub fn moment_match<'a, I>(components: I) -> Option<GaussianComponent>
    where
        I: IntoIterator<Item = &'a GaussianComponent>,
    {
        let mut iter = components.into_iter();
        let first = iter.next()?.clone();
        Some(iter.fold(first, |acc, cpnt| acc.merge(cpnt)))
    }
}

impl From<&GaussianComponent> for String {
    fn from(cpnt: &GaussianComponent) -> String {
        format!(
            "{} × N(μ: {}, Σ: {})",
            cpnt.weight, cpnt.mean, cpnt.cov
        )
    }
}

impl_display!(GaussianComponent);

impl Mean<DVector<f64>> for GaussianComponent {
    fn mean(&self) -> Option<DVector<f64>> {
        Some(self.mean.clone())
    }
}

impl Variance<DMatrix<f64>> for GaussianComponent {
    fn variance(&self) -> Option<DMatrix<f64>> {
        Some(self.cov.clone())
    }
}
