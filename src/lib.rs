//! Online kernel density estimation.
//!
//! An [`OnlineKde`] keeps a weighted mixture of Gaussian components that
//! grows as observations stream in. Old evidence fades by a forgetting
//! factor, every component is smoothed by a bandwidth matrix chosen from the
//! data, and after each update components that are closer than a threshold
//! are merged so that the mixture stays small. Merges preserve the mean and
//! covariance of the mixture.
//!
//! # Example
//!
//! ```
//! use nalgebra::{DMatrix, DVector};
//! use okde::prelude::*;
//!
//! let mut kde = OnlineKde::new(1.0, 0.02).unwrap();
//!
//! let samples: Vec<DVector<f64>> = (0..20)
//!     .map(|i| DVector::from_column_slice(&[i as f64 / 10.0, 0.5]))
//!     .collect();
//! let covariances = vec![DMatrix::zeros(2, 2); samples.len()];
//! let weights = vec![1.0; samples.len()];
//!
//! kde.update_batch(&samples, &covariances, &weights).unwrap();
//! kde.observe(&DVector::from_column_slice(&[1.0, 0.5])).unwrap();
//!
//! let total: f64 = kde.mixture().weights().iter().sum();
//! assert!((total - 1.0).abs() < 1E-9);
//!
//! let f = kde.evaluate(&DVector::from_column_slice(&[1.0, 0.5])).unwrap();
//! assert!(f.is_finite() && f > 0.0);
//! ```
//!
//! # Features
//!
//! - `serde1`: serialization of the configuration, components, and the
//!   estimator state

/// Implements `Display` through `From<&T> for String`
#[macro_export]
macro_rules! impl_display {
    ($kind: ty) => {
        impl ::std::fmt::Display for $kind {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}", String::from(self))
            }
        }
    };
}


pub mod bandwidth;
pub mod compress;
pub mod config;
pub mod consts;
pub mod dist;
pub mod estimator;
pub mod misc;
pub mod prelude;
pub mod result;
pub mod traits;

pub use bandwidth::Bandwidth;
pub use config::OnlineKdeConfig;
pub use estimator::{OnlineKde, OnlineKdeParameters};
pub use result::{KdeError, Result};

#[cfg(doctest)]
doc_comment::doctest!("../README.md", readme);
