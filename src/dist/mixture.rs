use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::dist::{GaussianComponent, MvGaussian};
use crate::impl_display;
use crate::misc::linalg::{is_psd, outer_product_self, symmetrize};
use crate::misc::{logsumexp, pflip};
use crate::result::{KdeError, Result};
use crate::traits::{HasDensity, Mean, Sampleable, Variance};

/// Lifecycle of a [`MixtureModel`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MixtureState {
    /// No dimension established and no components
    Uninitialized,
    /// At least one component; the dimension is fixed
    Active,
}

/// A component together with its bandwidth-smoothed kernel 𝒩(μ, Σ + H)
#[derive(Debug, Clone)]
pub(crate) struct SmoothedComponent {
    pub(crate) component: GaussianComponent,
    pub(crate) kernel: MvGaussian,
}

impl SmoothedComponent {
    pub(crate) fn new(
        component: GaussianComponent,
        bandwidth: &DMatrix<f64>,
        index: usize,
    ) -> Result<Self> {
        let kernel = component
            .smoothed(bandwidth)
            .map_err(|_| KdeError::InvalidCovariance { index })?;
        Ok(SmoothedComponent { component, kernel })
    }
}

/// Weighted mixture of Gaussian components, the current density estimate.
///
/// Every component is evaluated through a kernel smoothed by the shared
/// bandwidth matrix H:
///
/// f(x) = Σᵢ wᵢ 𝒩(x; μᵢ, Σᵢ + H)
///
/// The weights sum to one after every public operation. The dimension is
/// fixed by the first component and never changes.
#[derive(Debug, Clone, Default)]
pub struct MixtureModel {
    dims: Option<usize>,
    bandwidth: Option<DMatrix<f64>>,
    entries: Vec<SmoothedComponent>,
}

impl MixtureModel {
    /// Create an empty, uninitialized mixture
    pub fn new() -> Self {
        MixtureModel::default()
    }

    /// Create a mixture from components and a bandwidth matrix.
    ///
    /// Weights are normalized to sum to one.
    ///
    /// # Example
    ///
    /// ```
    /// use nalgebra::{DMatrix, DVector};
    /// use okde::dist::{GaussianComponent, MixtureModel};
    ///
    /// let mm = MixtureModel::from_components(
    ///     vec![
    ///         GaussianComponent::point(1.0, DVector::from_column_slice(&[-1.0])).unwrap(),
    ///         GaussianComponent::point(3.0, DVector::from_column_slice(&[1.0])).unwrap(),
    ///     ],
    ///     DMatrix::identity(1, 1),
    /// ).unwrap();
    ///
    /// assert_eq!(mm.weights(), vec![0.25, 0.75]);
    /// ```
    pub fn from_components(
        components: Vec<GaussianComponent>,
        bandwidth: DMatrix<f64>,
    ) -> Result<Self> {
        let dims = components
            .first()
            .map(GaussianComponent::ndims)
            .ok_or(KdeError::EmptyMixture)?;
        check_bandwidth(dims, &bandwidth)?;

        let entries = components
            .into_iter()
            .enumerate()
            .map(|(ix, cpnt)| {
                if cpnt.ndims() != dims {
                    Err(KdeError::DimensionMismatch {
                        expected: dims,
                        given: cpnt.ndims(),
                    })
                } else if !(cpnt.weight().is_finite() && cpnt.weight() > 0.0) {
                    Err(KdeError::InvalidWeight {
                        index: ix,
                        weight: cpnt.weight(),
                    })
                } else {
                    SmoothedComponent::new(cpnt, &bandwidth, ix)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut mixture = MixtureModel {
            dims: Some(dims),
            bandwidth: Some(bandwidth),
            entries,
        };
        mixture.normalize_weights();
        Ok(mixture)
    }

    /// Current lifecycle state
    #[inline]
    pub fn state(&self) -> MixtureState {
        if self.dims.is_some() && !self.entries.is_empty() {
            MixtureState::Active
        } else {
            MixtureState::Uninitialized
        }
    }

    /// The dimension of the mixture, if established
    #[inline]
    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    /// Number of components
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate the components in order
    pub fn components(&self) -> impl Iterator<Item = &GaussianComponent> + '_ {
        self.entries.iter().map(|entry| &entry.component)
    }

    /// Get the i<sup>th</sup> component
    pub fn component(&self, ix: usize) -> Option<&GaussianComponent> {
        self.entries.get(ix).map(|entry| &entry.component)
    }

    /// Get the bandwidth-smoothed kernel of the i<sup>th</sup> component
    pub fn kernel(&self, ix: usize) -> Option<&MvGaussian> {
        self.entries.get(ix).map(|entry| &entry.kernel)
    }

    /// Component weights, in order
    pub fn weights(&self) -> Vec<f64> {
        self.components().map(GaussianComponent::weight).collect()
    }

    /// Sum of the component weights
    pub fn weight_sum(&self) -> f64 {
        self.components().map(GaussianComponent::weight).sum()
    }

    /// Covariance of the mixture, excluding the kernel bandwidth. Same as
    /// [`Variance::variance`].
    pub fn covariance(&self) -> Option<DMatrix<f64>> {
        self.variance()
    }

    /// The kernel bandwidth matrix H, if set
    #[inline]
    pub fn bandwidth(&self) -> Option<&DMatrix<f64>> {
        self.bandwidth.as_ref()
    }

    /// Replace the bandwidth matrix and rebuild every smoothed kernel.
    ///
    /// On error the mixture is unchanged.
    pub fn set_bandwidth(&mut self, bandwidth: DMatrix<f64>) -> Result<()> {
        let dims = self.dims.unwrap_or_else(|| bandwidth.nrows());
        check_bandwidth(dims, &bandwidth)?;

        let kernels = self
            .entries
            .iter()
            .enumerate()
            .map(|(ix, entry)| {
                entry
                    .component
                    .smoothed(&bandwidth)
                    .map_err(|_| KdeError::InvalidCovariance { index: ix })
            })
            .collect::<Result<Vec<_>>>()?;

        self.entries
            .iter_mut()
            .zip(kernels)
            .for_each(|(entry, kernel)| entry.kernel = kernel);
        self.dims = Some(dims);
        self.bandwidth = Some(bandwidth);
        Ok(())
    }

    /// Fix the dimension. Only valid while uninitialized.
    pub(crate) fn establish_dims(&mut self, dims: usize) {
        debug_assert!(self.dims.is_none() || self.dims == Some(dims));
        self.dims = Some(dims);
    }

    /// Append a component, smoothing it with the current bandwidth (or a
    /// zero bandwidth if none is set yet).
    pub(crate) fn push(&mut self, component: GaussianComponent) -> Result<()> {
        let index = self.entries.len();
        let entry = match &self.bandwidth {
            Some(bandwidth) => {
                SmoothedComponent::new(component, bandwidth, index)?
            }
            None => {
                let d = component.ndims();
                SmoothedComponent::new(component, &DMatrix::zeros(d, d), index)?
            }
        };
        self.entries.push(entry);
        Ok(())
    }

    pub(crate) fn scale_weights(&mut self, factor: f64) {
        self.entries
            .iter_mut()
            .for_each(|entry| entry.component.scale_weight(factor));
    }

    /// Divide every weight by the weight sum
    pub(crate) fn normalize_weights(&mut self) {
        let total = self.weight_sum();
        if total > 0.0 {
            self.scale_weights(total.recip());
        }
    }

    /// Drop components whose weight has underflowed to zero or below the
    /// normal range. Returns how many were dropped.
    pub(crate) fn prune_vanished(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|entry| entry.component.weight().is_normal());
        before - self.entries.len()
    }

    pub(crate) fn take_entries(&mut self) -> Vec<SmoothedComponent> {
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn set_entries(&mut self, entries: Vec<SmoothedComponent>) {
        self.entries = entries;
    }

    fn check_point(&self, x: &DVector<f64>) -> Result<()> {
        match self.dims {
            Some(_) if self.entries.is_empty() => Err(KdeError::EmptyMixture),
            None => Err(KdeError::EmptyMixture),
            Some(dims) if dims != x.len() => Err(KdeError::DimensionMismatch {
                expected: dims,
                given: x.len(),
            }),
            Some(_) => Ok(()),
        }
    }

    /// Density of the mixture at `x`
    ///
    /// # Example
    ///
    /// ```
    /// use nalgebra::{DMatrix, DVector};
    /// use okde::dist::{GaussianComponent, MixtureModel};
    ///
    /// let mm = MixtureModel::from_components(
    ///     vec![GaussianComponent::point(1.0, DVector::zeros(2)).unwrap()],
    ///     DMatrix::identity(2, 2),
    /// ).unwrap();
    ///
    /// let f = mm.f(&DVector::zeros(2)).unwrap();
    /// assert!((f - 1.0 / (2.0 * std::f64::consts::PI)).abs() < 1E-12);
    ///
    /// assert!(mm.f(&DVector::zeros(3)).is_err());
    /// ```
    pub fn f(&self, x: &DVector<f64>) -> Result<f64> {
        self.check_point(x)?;
        Ok(self
            .entries
            .iter()
            .fold(0.0, |acc, entry| {
                acc + entry.component.weight() * entry.kernel.f(x)
            }))
    }

    /// Log density of the mixture at `x`
    pub fn ln_f(&self, x: &DVector<f64>) -> Result<f64> {
        self.check_point(x)?;
        let lfs: Vec<f64> = self
            .entries
            .iter()
            .map(|entry| entry.component.weight().ln() + entry.kernel.ln_f(x))
            .collect();
        Ok(logsumexp(&lfs))
    }

    /// Density at each of `xs`, in order
    pub fn f_many(&self, xs: &[DVector<f64>]) -> Result<Vec<f64>> {
        xs.iter().map(|x| self.f(x)).collect()
    }
}

fn check_bandwidth(dims: usize, bandwidth: &DMatrix<f64>) -> Result<()> {
    if bandwidth.nrows() != dims || bandwidth.ncols() != dims {
        Err(KdeError::DimensionMismatch {
            expected: dims,
            given: if bandwidth.nrows() != dims {
                bandwidth.nrows()
            } else {
                bandwidth.ncols()
            },
        })
    } else if !is_psd(bandwidth) {
        Err(KdeError::InvalidBandwidth)
    } else {
        Ok(())
    }
}

impl From<&MixtureModel> for String {
    fn from(mm: &MixtureModel) -> String {
        match mm.dims {
            Some(dims) => format!("Mixture(k: {}, d: {})", mm.len(), dims),
            None => String::from("Mixture(uninitialized)"),
        }
    }
}

impl_display!(MixtureModel);

impl Mean<DVector<f64>> for MixtureModel {
    fn mean(&self) -> Option<DVector<f64>> {
        let dims = self.dims?;
        let total = self.weight_sum();
        if self.is_empty() || total <= 0.0 {
            return None;
        }
        let sum = self
            .components()
            .fold(DVector::zeros(dims), |acc, cpnt| {
                acc + cpnt.mean() * cpnt.weight()
            });
        Some(sum / total)
    }
}

impl Variance<DMatrix<f64>> for MixtureModel {
    /// Covariance of the mixture (excluding the kernel bandwidth),
    /// Σᵢ wᵢ (Σᵢ + (μᵢ - μ)(μᵢ - μ)ᵀ)
    fn variance(&self) -> Option<DMatrix<f64>> {
        let dims = self.dims?;
        let mean = self.mean()?;
        let total = self.weight_sum();
        let sum = self
            .components()
            .fold(DMatrix::zeros(dims, dims), |acc, cpnt| {
                let diff = cpnt.mean() - &mean;
                acc + (cpnt.cov() + outer_product_self(&diff)) * cpnt.weight()
            });
        Some(symmetrize(&(sum / total)))
    }
}

impl Sampleable<DVector<f64>> for MixtureModel {
    /// Draw from the smoothed density.
    ///
    /// # Panics
    ///
    /// Panics if the mixture is empty.
    fn draw<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        let k: usize = pflip(&self.weights(), 1, rng)[0];
        self.entries[k].kernel.draw(rng)
    }

    fn sample<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<DVector<f64>> {
        pflip(&self.weights(), n, rng)
            .iter()
            .map(|&k| self.entries[k].kernel.draw(rng))
            .collect()
    }
}
