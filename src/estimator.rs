//! The online kernel density estimator
#[cfg(feature = "serde1")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use itertools::izip;
use log::debug;
use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::compress::{CompressionReport, Compressor, Divergence, Hellinger};
use crate::config::OnlineKdeConfig;
use crate::dist::{validate_observation, GaussianComponent, MixtureModel};
use crate::misc::linalg::clamp_psd;
use crate::result::{KdeError, Result};
use crate::traits::{Sampleable, Variance};

/// Online kernel density estimate over D-dimensional real vectors.
///
/// Each update decays the existing mixture by the forgetting factor, folds
/// in the new weighted observations, recomputes the kernel bandwidth, and
/// compresses the mixture before returning.
///
/// # Example
///
/// ```
/// use nalgebra::{DMatrix, DVector};
/// use okde::OnlineKde;
///
/// let mut kde = OnlineKde::new(1.0, 0.02).unwrap();
///
/// let a = DVector::from_column_slice(&[1.0, 2.0]);
/// let b = DVector::from_column_slice(&[3.0, 4.0]);
/// let zero = DMatrix::zeros(2, 2);
///
/// kde.update(&a, &zero, 1.0).unwrap();
/// kde.update(&b, &zero, 1.0).unwrap();
///
/// assert_eq!(kde.len(), 2);
/// assert_eq!(kde.dims(), Some(2));
///
/// let fa = kde.evaluate(&a).unwrap();
/// let fb = kde.evaluate(&b).unwrap();
/// assert!((fa - fb).abs() < 1E-3 * fa);
///
/// let off = DVector::from_column_slice(&[2.0, 2.0]);
/// assert!(kde.evaluate(&off).unwrap() < fa);
/// ```
#[derive(Debug, Clone)]
pub struct OnlineKde<D = Hellinger> {
    config: OnlineKdeConfig,
    compressor: Compressor<D>,
    mixture: MixtureModel,
    effective_mass: f64,
}

impl OnlineKde<Hellinger> {
    /// Create an estimator with the default bandwidth rule and the Hellinger
    /// merge distance
    ///
    /// # Arguments
    /// - forgetting_factor: in (0, 1]; 1 keeps all evidence
    /// - compression_threshold: non-negative merge threshold
    pub fn new(forgetting_factor: f64, compression_threshold: f64) -> Result<Self> {
        OnlineKde::with_config(
            OnlineKdeConfig::default()
                .with_forgetting_factor(forgetting_factor)
                .with_compression_threshold(compression_threshold),
        )
    }

    pub fn with_config(config: OnlineKdeConfig) -> Result<Self> {
        OnlineKde::with_divergence(config, Hellinger)
    }
}

impl<D: Divergence> OnlineKde<D> {
    /// Create an estimator that merges components under a custom divergence
    pub fn with_divergence(config: OnlineKdeConfig, divergence: D) -> Result<Self> {
        config.validate()?;
        let compressor =
            Compressor::with_divergence(config.compression_threshold, divergence)?;
        Ok(OnlineKde {
            config,
            compressor,
            mixture: MixtureModel::new(),
            effective_mass: 0.0,
        })
    }

    #[inline]
    pub fn config(&self) -> &OnlineKdeConfig {
        &self.config
    }

    /// The current mixture
    #[inline]
    pub fn mixture(&self) -> &MixtureModel {
        &self.mixture
    }

    /// Number of mixture components
    #[inline]
    pub fn len(&self) -> usize {
        self.mixture.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mixture.is_empty()
    }

    /// Dimension of the data, if established
    #[inline]
    pub fn dims(&self) -> Option<usize> {
        self.mixture.dims()
    }

    /// Total observation weight after forgetting
    #[inline]
    pub fn effective_mass(&self) -> f64 {
        self.effective_mass
    }

    /// Current kernel bandwidth matrix
    #[inline]
    pub fn bandwidth(&self) -> Option<&DMatrix<f64>> {
        self.mixture.bandwidth()
    }

    /// Add one weighted observation with its own covariance.
    ///
    /// Equivalent to [`update_batch`](OnlineKde::update_batch) with
    /// sequences of length one.
    pub fn update(
        &mut self,
        sample: &DVector<f64>,
        covariance: &DMatrix<f64>,
        weight: f64,
    ) -> Result<CompressionReport> {
        self.update_batch(
            std::slice::from_ref(sample),
            std::slice::from_ref(covariance),
            std::slice::from_ref(&weight),
        )
    }

    /// Add one exact observation with unit weight
    pub fn observe(&mut self, sample: &DVector<f64>) -> Result<CompressionReport> {
        let dims = sample.len();
        self.update(sample, &DMatrix::zeros(dims, dims), 1.0)
    }

    /// Add a batch of weighted observations.
    ///
    /// `samples`, `covariances`, and `weights` are parallel sequences. The
    /// first successful update fixes the dimension of the estimator. All
    /// input is validated before anything changes, so on error the
    /// estimator is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if the sequence lengths differ
    /// - `EmptyInput` if the sequences are empty or a sample has no entries
    /// - `DimensionMismatch` if a sample or covariance has the wrong size
    /// - `InvalidSample`, `InvalidCovariance`, or `InvalidWeight` for bad
    ///   entries, with the index of the first offender
    /// - `MomentOverflow` if the samples are finite but so far apart that
    ///   the mixture covariance overflows `f64` (squared distances beyond
    ///   about 1e308)
    pub fn update_batch(
        &mut self,
        samples: &[DVector<f64>],
        covariances: &[DMatrix<f64>],
        weights: &[f64],
    ) -> Result<CompressionReport> {
        if samples.len() != covariances.len() || samples.len() != weights.len() {
            return Err(KdeError::ShapeMismatch {
                n_samples: samples.len(),
                n_covariances: covariances.len(),
                n_weights: weights.len(),
            });
        }

        let dims = match (self.mixture.dims(), samples.first()) {
            (_, None) => return Err(KdeError::EmptyInput),
            (Some(dims), _) => dims,
            (None, Some(first)) if first.is_empty() => {
                return Err(KdeError::EmptyInput)
            }
            (None, Some(first)) => first.len(),
        };

        for (ix, (sample, cov, &weight)) in
            izip!(samples, covariances, weights).enumerate()
        {
            validate_observation(ix, dims, sample, cov, weight)?;
        }

        let added: f64 = weights.iter().sum();
        let decayed = self.config.forgetting_factor * self.effective_mass;
        let mass = decayed + added;

        // stage the new mixture so that a late failure leaves self untouched
        let mut staged = self.mixture.clone();
        if staged.dims().is_none() {
            staged.establish_dims(dims);
        }
        staged.scale_weights(decayed / mass);
        for (sample, cov, &weight) in izip!(samples, covariances, weights) {
            staged.push(GaussianComponent::new_unchecked(
                weight / mass,
                sample.clone(),
                clamp_psd(cov),
            ))?;
        }
        let pruned = staged.prune_vanished();
        if pruned > 0 {
            debug!("dropped {} components with vanished weight", pruned);
        }
        staged.normalize_weights();

        let cov = staged.variance().ok_or(KdeError::EmptyMixture)?;
        if !cov.iter().all(|v| v.is_finite()) {
            return Err(KdeError::MomentOverflow);
        }
        let bandwidth = self.config.bandwidth.select(&cov, mass)?;
        staged.set_bandwidth(bandwidth)?;

        let report = self.compressor.compress(&mut staged)?;

        self.mixture = staged;
        self.effective_mass = mass;
        debug!(
            "absorbed {} samples; {} components, effective mass {:.3}",
            samples.len(),
            self.mixture.len(),
            self.effective_mass
        );
        Ok(report)
    }

    /// Re-run compression on the current mixture.
    ///
    /// Every update already compresses, so this is a no-op unless the
    /// mixture was built some other way.
    pub fn compress(&mut self) -> Result<CompressionReport> {
        self.compressor.compress(&mut self.mixture)
    }

    /// Density estimate at `point`
    pub fn evaluate(&self, point: &DVector<f64>) -> Result<f64> {
        self.mixture.f(point)
    }

    /// Density estimate at each of `points`, in order
    pub fn evaluate_many(&self, points: &[DVector<f64>]) -> Result<Vec<f64>> {
        self.mixture.f_many(points)
    }

    /// Log density estimate at `point`
    pub fn ln_evaluate(&self, point: &DVector<f64>) -> Result<f64> {
        self.mixture.ln_f(point)
    }
}

impl<D: Divergence> Sampleable<DVector<f64>> for OnlineKde<D> {
    /// Draw from the current density estimate.
    ///
    /// # Panics
    ///
    /// Panics if no data have been observed.
    fn draw<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        self.mixture.draw(rng)
    }

    fn sample<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<DVector<f64>> {
        self.mixture.sample(n, rng)
    }
}

/// Serializable state of an [`OnlineKde`]. Kernel caches and the bandwidth
/// are rebuilt from these on deserialization.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct OnlineKdeParameters {
    pub config: OnlineKdeConfig,
    pub effective_mass: f64,
    pub components: Vec<GaussianComponent>,
}

impl<D: Divergence> From<&OnlineKde<D>> for OnlineKdeParameters {
    fn from(kde: &OnlineKde<D>) -> Self {
        OnlineKdeParameters {
            config: kde.config.clone(),
            effective_mass: kde.effective_mass,
            components: kde.mixture.components().cloned().collect(),
        }
    }
}

impl<D: Divergence + Default> TryFrom<OnlineKdeParameters> for OnlineKde<D> {
    type Error = KdeError;

    fn try_from(params: OnlineKdeParameters) -> Result<Self> {
        let mut kde = OnlineKde::with_divergence(params.config, D::default())?;
        let dims = match params.components.first() {
            Some(first) => first.ndims(),
            None => return Ok(kde),
        };

        let mass = params.effective_mass;
        if !(mass.is_finite() && mass > 0.0) {
            return Err(KdeError::InvalidWeight {
                index: 0,
                weight: mass,
            });
        }
        for (ix, cpnt) in params.components.iter().enumerate() {
            validate_observation(ix, dims, cpnt.mean(), cpnt.cov(), cpnt.weight())?;
        }

        let mut mixture = MixtureModel::from_components(
            params.components,
            DMatrix::zeros(dims, dims),
        )?;
        let cov = mixture.variance().ok_or(KdeError::EmptyMixture)?;
        let bandwidth = kde.config.bandwidth.select(&cov, mass)?;
        mixture.set_bandwidth(bandwidth)?;

        kde.mixture = mixture;
        kde.effective_mass = mass;
        Ok(kde)
    }
}

#[cfg(feature = "serde1")]
impl<D: Divergence> Serialize for OnlineKde<D> {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        OnlineKdeParameters::from(self).serialize(serializer)
    }
}

#[cfg(feature = "serde1")]
impl<'de, D: Divergence + Default> Deserialize<'de> for OnlineKde<D> {
    fn deserialize<De: Deserializer<'de>>(
        deserializer: De,
    ) -> std::result::Result<Self, De::Error> {
        let params = OnlineKdeParameters::deserialize(deserializer)?;
        OnlineKde::try_from(params).map_err(serde::de::Error::custom)
    }
}
