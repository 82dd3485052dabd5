use rand::Rng;
use std::ops::AddAssign;

/// Safely compute `log(sum(exp(xs))`
///
/// Returns negative infinity if every entry is negative infinity.
///
/// # Example
///
/// ```rust
/// # use okde::misc::logsumexp;
/// let xs = [0.2_f64.ln(), 0.3_f64.ln(), 0.5_f64.ln()];
/// assert!(logsumexp(&xs).abs() < 1E-12);
/// assert_eq!(logsumexp(&[f64::NEG_INFINITY; 3]), f64::NEG_INFINITY);
/// ```
///
/// # Panics
///
/// Panics if `xs` is empty.
pub fn logsumexp(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        panic!("Empty container");
    } else if xs.len() == 1 {
        xs[0]
    } else {
        let maxval = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if maxval == f64::NEG_INFINITY {
            return maxval;
        }
        xs.iter().fold(0.0, |acc, x| acc + (x - maxval).exp()).ln() + maxval
    }
}

/// Cumulative sum of `xs`
///
/// # Example
///
/// ```rust
/// # use okde::misc::cumsum;
/// let xs: Vec<i32> = vec![1, 1, 2, 1];
/// assert_eq!(cumsum(&xs), vec![1, 2, 4, 5]);
/// ```
pub fn cumsum<T>(xs: &[T]) -> Vec<T>
where
    T: AddAssign + Copy + Default,
{
    xs.iter()
        .scan(T::default(), |acc, &x| {
            *acc += x;
            Some(*acc)
        })
        .collect()
}

#[inline]
fn binary_search(cws: &[f64], r: f64) -> usize {
    let mut left: usize = 0;
    let mut right: usize = cws.len();
    while left < right {
        let mid = (left + right) / 2;
        if cws[mid] < r {
            left = mid + 1;
        } else {
            right = mid;
        }
    }
    left
}

/// Draw `n` indices in proportion to their `weights`
///
/// Rounding at the top of the cumulative sum falls back to the last index.
///
/// # Panics
///
/// Panics if `weights` is empty.
pub fn pflip(weights: &[f64], n: usize, rng: &mut impl Rng) -> Vec<usize> {
    if weights.is_empty() {
        panic!("Empty container");
    }
    let cws: Vec<f64> = cumsum(weights);
    let scale: f64 = cws[cws.len() - 1];
    let u = rand::distributions::Uniform::new(0.0, 1.0);

    (0..n)
        .map(|_| {
            let r = rng.sample(u) * scale;
            binary_search(&cws, r).min(cws.len() - 1)
        })
        .collect()
}
