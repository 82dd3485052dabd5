//! Re-imports for convenience
#[doc(no_inline)]
pub use crate::bandwidth::Bandwidth;
#[doc(no_inline)]
pub use crate::compress::{
    Bhattacharyya, CompressionReport, Compressor, Divergence, Hellinger,
};
#[doc(no_inline)]
pub use crate::config::OnlineKdeConfig;
#[doc(no_inline)]
pub use crate::dist::{GaussianComponent, MixtureModel, MixtureState, MvGaussian};
#[doc(no_inline)]
pub use crate::estimator::{OnlineKde, OnlineKdeParameters};
#[doc(no_inline)]
pub use crate::result::KdeError;
#[doc(no_inline)]
pub use crate::traits::*;
