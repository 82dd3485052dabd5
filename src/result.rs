//! Errors
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use std::fmt;

pub type Result<T> = std::result::Result<T, KdeError>;

/// Errors surfaced by the estimator, the mixture, and the compressor
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum KdeError {
    /// The samples, covariances, and weights sequences differ in length
    ShapeMismatch {
        n_samples: usize,
        n_covariances: usize,
        n_weights: usize,
    },
    /// A vector or matrix does not have the dimension established by the
    /// mixture
    DimensionMismatch { expected: usize, given: usize },
    /// A weight is zero, negative, or not finite
    InvalidWeight { index: usize, weight: f64 },
    /// A covariance matrix is not square, not symmetric, not finite, or not
    /// positive semi-definite
    InvalidCovariance { index: usize },
    /// A sample contains a non-finite entry
    InvalidSample { index: usize },
    /// No samples were supplied, or a sample has zero dimensions
    EmptyInput,
    /// The operation requires at least one mixture component
    EmptyMixture,
    /// The forgetting factor is outside (0, 1]
    InvalidForgettingFactor { forgetting_factor: f64 },
    /// The compression threshold is negative or NaN
    InvalidCompressionThreshold { threshold: f64 },
    /// A fixed bandwidth matrix is not square or not positive semi-definite
    InvalidBandwidth,
    /// The covariance of the mixture is not representable as `f64`. The
    /// samples are finite but spread too far apart.
    MomentOverflow,
}

impl std::error::Error for KdeError {}

impl fmt::Display for KdeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch {
                n_samples,
                n_covariances,
                n_weights,
            } => write!(
                f,
                "got {n_samples} samples, {n_covariances} covariances, and \
                 {n_weights} weights; lengths must match"
            ),
            Self::DimensionMismatch { expected, given } => write!(
                f,
                "expected dimension {expected} but got dimension {given}"
            ),
            Self::InvalidWeight { index, weight } => write!(
                f,
                "weight {index} ({weight}) must be finite and greater than zero"
            ),
            Self::InvalidCovariance { index } => write!(
                f,
                "covariance {index} is not a finite, symmetric, positive \
                 semi-definite matrix"
            ),
            Self::InvalidSample { index } => {
                write!(f, "sample {index} contains non-finite values")
            }
            Self::EmptyInput => write!(f, "input must not be empty"),
            Self::EmptyMixture => write!(f, "the mixture has no components"),
            Self::InvalidForgettingFactor { forgetting_factor } => write!(
                f,
                "forgetting factor ({forgetting_factor}) must be in (0, 1]"
            ),
            Self::InvalidCompressionThreshold { threshold } => write!(
                f,
                "compression threshold ({threshold}) must be non-negative"
            ),
            Self::InvalidBandwidth => write!(
                f,
                "bandwidth must be a square positive semi-definite matrix"
            ),
            Self::MomentOverflow => write!(
                f,
                "the mixture covariance overflowed; samples are too far apart"
            ),
        }
    }
}
