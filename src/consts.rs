//! Mathematical and numerical constants

/// ln(2π)
pub const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// Relative diagonal jitter added to data-driven bandwidth matrices so that
/// they stay positive definite when the sample covariance is singular.
pub const BANDWIDTH_JITTER: f64 = 1e-8;

/// Relative jitter used for the first retry of a failed Cholesky
/// decomposition.
pub const CHOLESKY_JITTER: f64 = 1e-12;

/// Maximum number of jittered retries of a failed Cholesky decomposition.
pub const CHOLESKY_MAX_TRIES: usize = 12;

/// Relative tolerance used when checking user-supplied covariance matrices
/// for symmetry and positive semi-definiteness.
pub const PSD_TOL: f64 = 1e-9;

/// Tolerance on the sum of mixture weights
pub const WEIGHT_SUM_TOL: f64 = 1e-9;
