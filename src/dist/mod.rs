//! Gaussian kernels, weighted components, and the mixture they form
mod component;
mod mixture;
mod mvg;

pub(crate) use component::validate_observation;
pub(crate) use mixture::SmoothedComponent;

pub use component::GaussianComponent;
pub use mixture::{MixtureModel, MixtureState};
pub use mvg::{MvGaussian, MvGaussianError, MvGaussianParameters};
