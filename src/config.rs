//! Estimator configuration
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::bandwidth::Bandwidth;
use crate::result::{KdeError, Result};

/// Default merge threshold on the Hellinger distance between kernels
pub const DEFAULT_COMPRESSION_THRESHOLD: f64 = 0.02;

/// Configuration of an [`OnlineKde`](crate::OnlineKde)
///
/// # Example
///
/// ```
/// use okde::{Bandwidth, OnlineKdeConfig};
///
/// let config = OnlineKdeConfig::default()
///     .with_forgetting_factor(0.99)
///     .with_compression_threshold(0.05)
///     .with_bandwidth(Bandwidth::Scott);
///
/// assert!(config.validate().is_ok());
///
/// let bad = OnlineKdeConfig::default().with_forgetting_factor(1.5);
/// assert!(bad.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct OnlineKdeConfig {
    /// Multiplies the mass of the existing mixture before each update.
    /// Must be in (0, 1]; 1 means no forgetting.
    pub forgetting_factor: f64,
    /// Components within this divergence of each other are merged.
    /// Must be non-negative.
    pub compression_threshold: f64,
    /// Rule for the kernel bandwidth
    pub bandwidth: Bandwidth,
}

impl Default for OnlineKdeConfig {
    fn default() -> Self {
        OnlineKdeConfig {
            forgetting_factor: 1.0,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            bandwidth: Bandwidth::default(),
        }
    }
}

impl OnlineKdeConfig {
    #[must_use]
    pub fn with_forgetting_factor(mut self, forgetting_factor: f64) -> Self {
        self.forgetting_factor = forgetting_factor;
        self
    }

    #[must_use]
    pub fn with_compression_threshold(mut self, threshold: f64) -> Self {
        self.compression_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_bandwidth(mut self, bandwidth: Bandwidth) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Check every field
    pub fn validate(&self) -> Result<()> {
        let ff = self.forgetting_factor;
        if !(ff > 0.0 && ff <= 1.0) {
            return Err(KdeError::InvalidForgettingFactor {
                forgetting_factor: ff,
            });
        }
        if !(self.compression_threshold >= 0.0) {
            return Err(KdeError::InvalidCompressionThreshold {
                threshold: self.compression_threshold,
            });
        }
        self.bandwidth.validate()
    }
}
