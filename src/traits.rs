//! Trait definitions
use rand::Rng;

/// Has a probability density
pub trait HasDensity<X> {
    /// Natural logarithm of the probability density at `x`
    fn ln_f(&self, x: &X) -> f64;

    /// Probability density at `x`
    fn f(&self, x: &X) -> f64 {
        self.ln_f(x).exp()
    }
}

/// Can be sampled from
pub trait Sampleable<X> {
    /// Single draw
    fn draw<R: Rng>(&self, rng: &mut R) -> X;

    /// Multiple draws
    ///
    /// # Example
    ///
    /// ```
    /// use nalgebra::{DMatrix, DVector};
    /// use okde::dist::MvGaussian;
    /// use okde::traits::Sampleable;
    ///
    /// let mvg = MvGaussian::new(DVector::zeros(2), DMatrix::identity(2, 2)).unwrap();
    /// let mut rng = rand::thread_rng();
    ///
    /// let xs: Vec<DVector<f64>> = mvg.sample(12, &mut rng);
    /// assert_eq!(xs.len(), 12);
    /// ```
    fn sample<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<X> {
        (0..n).map(|_| self.draw(rng)).collect()
    }
}

/// Defines the distribution mean
pub trait Mean<M> {
    /// Returns `None` if the mean is undefined
    fn mean(&self) -> Option<M>;
}

/// Defines the distribution (co)variance
pub trait Variance<V> {
    /// Returns `None` if the variance is undefined
    fn variance(&self) -> Option<V>;
}
