//! Greedy, moment-preserving compression of a mixture
//!
//! Pairs of components whose smoothed kernels are within a divergence
//! threshold are merged, closest pair first, until no eligible pair remains.
//! Only the distances involving a freshly merged component are recomputed.
mod divergence;
mod queue;

pub use divergence::{Bhattacharyya, Divergence, Hellinger};

use itertools::Itertools;
use log::{debug, trace};
use nalgebra::DMatrix;

use crate::dist::{MixtureModel, MvGaussian, SmoothedComponent};
use crate::result::{KdeError, Result};
use queue::{Candidate, MergeQueue};

/// Summary of a compression pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionReport {
    /// Number of components before compression
    pub before: usize,
    /// Number of components after compression
    pub after: usize,
    /// Number of pairwise merges performed
    pub merges: usize,
}

impl CompressionReport {
    /// `true` if nothing was merged
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.merges == 0
    }
}

/// Merges mixture components whose divergence is at most `threshold`.
///
/// # Example
///
/// ```
/// use nalgebra::{DMatrix, DVector};
/// use okde::compress::Compressor;
/// use okde::dist::{GaussianComponent, MixtureModel};
///
/// let point = |x: f64| {
///     GaussianComponent::point(1.0, DVector::from_column_slice(&[x])).unwrap()
/// };
///
/// let mut mixture = MixtureModel::from_components(
///     vec![point(0.0), point(0.01), point(10.0)],
///     DMatrix::identity(1, 1),
/// ).unwrap();
///
/// let report = Compressor::new(0.05).unwrap().compress(&mut mixture).unwrap();
///
/// assert_eq!(report.merges, 1);
/// assert_eq!(mixture.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Compressor<D = Hellinger> {
    threshold: f64,
    divergence: D,
}

fn check_threshold(threshold: f64) -> Result<()> {
    // also rejects NaN
    if threshold >= 0.0 {
        Ok(())
    } else {
        Err(KdeError::InvalidCompressionThreshold { threshold })
    }
}

impl Compressor<Hellinger> {
    /// Create a compressor using the Hellinger distance
    pub fn new(threshold: f64) -> Result<Self> {
        Compressor::with_divergence(threshold, Hellinger)
    }
}

impl<D: Divergence> Compressor<D> {
    /// Create a compressor with a custom divergence
    pub fn with_divergence(threshold: f64, divergence: D) -> Result<Self> {
        check_threshold(threshold)?;
        Ok(Compressor {
            threshold,
            divergence,
        })
    }

    #[inline]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    #[inline]
    pub fn divergence(&self) -> &D {
        &self.divergence
    }

    /// Change the merge threshold
    pub fn set_threshold(&mut self, threshold: f64) -> Result<()> {
        check_threshold(threshold)?;
        self.threshold = threshold;
        Ok(())
    }

    /// Distance between two kernels if it is within the threshold
    fn eligible_distance(
        &self,
        p: &MvGaussian,
        q: &MvGaussian,
        bound: Option<f64>,
    ) -> Option<f64> {
        if let Some(bound) = bound {
            // Δᵀ S̄⁻¹ Δ ≥ |Δ|² / tr(S̄)
            let dist_sq = (p.mu() - q.mu()).norm_squared();
            if dist_sq > bound * 0.5 * (p.trace_cov() + q.trace_cov()) {
                return None;
            }
        }
        let distance = self.divergence.divergence(p, q);
        (distance <= self.threshold).then_some(distance)
    }

    fn push_candidate(
        &self,
        queue: &mut MergeQueue,
        slots: &[Option<SmoothedComponent>],
        generations: &[u32],
        (lo, hi): (usize, usize),
        bound: Option<f64>,
    ) {
        if let (Some(p), Some(q)) = (&slots[lo], &slots[hi]) {
            if let Some(distance) =
                self.eligible_distance(&p.kernel, &q.kernel, bound)
            {
                queue.push(Candidate {
                    distance,
                    lo,
                    hi,
                    gen_lo: generations[lo],
                    gen_hi: generations[hi],
                });
            }
        }
    }

    /// Fill the queue with every eligible pair. With a Mahalanobis bound the
    /// pairs are swept along the first coordinate and the sweep stops once
    /// the gap alone rules a pair out.
    fn seed_queue(
        &self,
        queue: &mut MergeQueue,
        slots: &[Option<SmoothedComponent>],
        generations: &[u32],
        bound: Option<f64>,
        max_trace: f64,
    ) {
        let n = slots.len();
        let first_coord =
            |ix: usize| slots[ix].as_ref().map_or(0.0, |e| e.kernel.mu()[0]);

        match bound {
            Some(bound) => {
                let reach = bound * max_trace;
                let order: Vec<usize> = (0..n)
                    .sorted_by(|&a, &b| first_coord(a).total_cmp(&first_coord(b)))
                    .collect();
                for (pos, &i) in order.iter().enumerate() {
                    let xi = first_coord(i);
                    for &j in &order[pos + 1..] {
                        let gap = first_coord(j) - xi;
                        if gap * gap > reach {
                            break;
                        }
                        let pair = (i.min(j), i.max(j));
                        self.push_candidate(queue, slots, generations, pair, Some(bound));
                    }
                }
            }
            None => {
                (0..n).tuple_combinations().for_each(|pair| {
                    self.push_candidate(queue, slots, generations, pair, None)
                });
            }
        }
    }

    /// Merge components until no pair is within the threshold.
    ///
    /// Survivors keep their relative order and a merged component takes the
    /// place of the earlier of its two sources. Weights, the mixture mean,
    /// and the mixture covariance are preserved.
    ///
    /// # Errors
    ///
    /// `EmptyMixture` if the mixture has no components.
    pub fn compress(&self, mixture: &mut MixtureModel) -> Result<CompressionReport> {
        let before = mixture.len();
        let dims = match mixture.dims() {
            Some(dims) if before > 0 => dims,
            _ => return Err(KdeError::EmptyMixture),
        };
        if before == 1 {
            return Ok(CompressionReport {
                before,
                after: before,
                merges: 0,
            });
        }

        let bandwidth = mixture
            .bandwidth()
            .cloned()
            .unwrap_or_else(|| DMatrix::zeros(dims, dims));
        let bound = self.divergence.mahalanobis_bound(self.threshold);

        let mut slots: Vec<Option<SmoothedComponent>> =
            mixture.take_entries().into_iter().map(Some).collect();
        let mut generations = vec![0_u32; before];
        let max_trace = slots
            .iter()
            .flatten()
            .map(|entry| entry.kernel.trace_cov())
            .fold(0.0, f64::max);

        let mut queue = MergeQueue::new();
        self.seed_queue(&mut queue, &slots, &generations, bound, max_trace);

        let mut merges = 0;
        while let Some(best) = queue.pop_live(|c| {
            slots[c.lo].is_some()
                && slots[c.hi].is_some()
                && generations[c.lo] == c.gen_lo
                && generations[c.hi] == c.gen_hi
        }) {
            let (lo, hi) = (best.lo, best.hi);
            let (Some(a), Some(b)) = (slots[lo].take(), slots[hi].take()) else {
                continue;
            };

            trace!(
                "merging components {} and {} at distance {:.4e}",
                lo,
                hi,
                best.distance
            );
            let merged = a.component.merge(&b.component);
            match SmoothedComponent::new(merged, &bandwidth, lo) {
                Ok(entry) => slots[lo] = Some(entry),
                Err(err) => {
                    slots[lo] = Some(a);
                    slots[hi] = Some(b);
                    mixture.set_entries(slots.into_iter().flatten().collect());
                    return Err(err);
                }
            }
            generations[lo] += 1;
            generations[hi] += 1;
            merges += 1;

            for other in 0..slots.len() {
                if other != lo && slots[other].is_some() {
                    let pair = (lo.min(other), lo.max(other));
                    self.push_candidate(&mut queue, &slots, &generations, pair, bound);
                }
            }
        }
        mixture.set_entries(slots.into_iter().flatten().collect());
        let report = CompressionReport {
            before,
            after: mixture.len(),
            merges,
        };
        debug!(
            "compressed mixture from {} to {} components ({} merges)",
            report.before, report.after, report.merges
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bandwidth::Bandwidth;
    use crate::dist::GaussianComponent;
    use crate::traits::{Mean, Variance};
    use nalgebra::{dvector, DVector};
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256Plus;

    const TOL: f64 = 1E-9;

    fn points_1d(xs: &[f64]) -> MixtureModel {
        let components = xs
            .iter()
            .map(|&x| GaussianComponent::point(1.0, dvector![x]).unwrap())
            .collect();
        MixtureModel::from_components(components, DMatrix::identity(1, 1))
            .unwrap()
    }

    fn random_mixture(n: usize, seed: u64) -> MixtureModel {
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        let components = (0..n)
            .map(|_| {
                let x: DVector<f64> = DVector::from_fn(2, |_, _| rng.gen());
                GaussianComponent::point(1.0, x).unwrap()
            })
            .collect();
        let mut mixture =
            MixtureModel::from_components(components, DMatrix::identity(2, 2))
                .unwrap();
        let h = Bandwidth::Silverman
            .select(&mixture.variance().unwrap(), n as f64)
            .unwrap();
        mixture.set_bandwidth(h).unwrap();
        mixture
    }

    /// Same distance, but without a Mahalanobis bound, so every pair is
    /// checked.
    struct Exhaustive;

    impl Divergence for Exhaustive {
        fn divergence(&self, p: &MvGaussian, q: &MvGaussian) -> f64 {
            Hellinger.divergence(p, q)
        }
    }

    #[test]
    fn negative_or_nan_threshold_is_an_error() {
        assert_eq!(
            Compressor::new(-0.1),
            Err(KdeError::InvalidCompressionThreshold { threshold: -0.1 })
        );
        assert!(Compressor::new(f64::NAN).is_err());
        assert!(Compressor::new(f64::INFINITY).is_ok());
    }

    #[test]
    fn empty_mixture_is_an_error() {
        let mut mixture = MixtureModel::new();
        let res = Compressor::new(0.1).unwrap().compress(&mut mixture);
        assert_eq!(res, Err(KdeError::EmptyMixture));
    }

    #[test]
    fn single_component_is_unchanged() {
        let mut mixture = points_1d(&[1.0]);
        let before = mixture.clone();
        let report = Compressor::new(1.0).unwrap().compress(&mut mixture).unwrap();
        assert_eq!(
            report,
            CompressionReport {
                before: 1,
                after: 1,
                merges: 0
            }
        );
        assert_eq!(
            mixture.components().collect::<Vec<_>>(),
            before.components().collect::<Vec<_>>()
        );
    }

    #[test]
    fn zero_threshold_merges_only_duplicates() {
        let mut mixture = points_1d(&[0.0, 3.0, 0.0, 0.5]);
        let report = Compressor::new(0.0).unwrap().compress(&mut mixture).unwrap();

        assert_eq!(report.merges, 1);
        assert_eq!(mixture.len(), 3);
        let first = mixture.component(0).unwrap();
        assert::close(first.weight(), 0.5, TOL);
        assert::close(first.mean()[0], 0.0, TOL);
        assert::close(first.cov()[(0, 0)], 0.0, TOL);
        assert::close(mixture.component(1).unwrap().mean()[0], 3.0, TOL);
        assert::close(mixture.component(2).unwrap().mean()[0], 0.5, TOL);
    }

    #[test]
    fn hellinger_threshold_of_one_merges_everything() {
        let mut mixture = random_mixture(50, 7);
        let mean = mixture.mean().unwrap();
        let cov = mixture.variance().unwrap();

        let report = Compressor::new(1.0).unwrap().compress(&mut mixture).unwrap();
        assert_eq!(report.after, 1);
        assert_eq!(report.merges, 49);

        let only = mixture.component(0).unwrap();
        assert::close(only.weight(), 1.0, TOL);
        for i in 0..2 {
            assert::close(only.mean()[i], mean[i], TOL);
            for j in 0..2 {
                assert::close(only.cov()[(i, j)], cov[(i, j)], TOL);
            }
        }
    }

    #[test]
    fn ties_merge_the_lowest_indices_first() {
        // (0, 1) and (1, 2) are both at D_B = 1/8; merging (0, 1) pushes the
        // merged kernel out of range of the point at 2.
        let mut mixture = points_1d(&[0.0, 1.0, 2.0]);
        let compressor =
            Compressor::with_divergence(0.125, Bhattacharyya).unwrap();
        let report = compressor.compress(&mut mixture).unwrap();

        assert_eq!(report.merges, 1);
        let means: Vec<f64> = mixture.components().map(|c| c.mean()[0]).collect();
        assert::close(means[0], 0.5, TOL);
        assert::close(means[1], 2.0, TOL);
        assert::close(mixture.component(0).unwrap().weight(), 2.0 / 3.0, TOL);
    }

    #[test]
    fn compression_preserves_weight_and_moments() {
        let mut mixture = random_mixture(300, 11);
        let mean = mixture.mean().unwrap();
        let cov = mixture.variance().unwrap();

        let report = Compressor::new(0.3).unwrap().compress(&mut mixture).unwrap();
        assert!(report.merges > 0);
        assert_eq!(report.after, mixture.len());

        assert::close(mixture.weight_sum(), 1.0, TOL);
        let mean_after = mixture.mean().unwrap();
        let cov_after = mixture.variance().unwrap();
        for i in 0..2 {
            assert::close(mean_after[i], mean[i], TOL);
            for j in 0..2 {
                assert::close(cov_after[(i, j)], cov[(i, j)], TOL);
            }
        }
    }

    #[test]
    fn no_eligible_pair_remains() {
        let mut mixture = random_mixture(200, 3);
        let compressor = Compressor::new(0.25).unwrap();
        compressor.compress(&mut mixture).unwrap();

        for i in 0..mixture.len() {
            for j in (i + 1)..mixture.len() {
                let d = Hellinger.divergence(
                    mixture.kernel(i).unwrap(),
                    mixture.kernel(j).unwrap(),
                );
                assert!(d > 0.25);
            }
        }
    }

    #[test]
    fn compress_is_idempotent() {
        let mut mixture = random_mixture(200, 5);
        let compressor = Compressor::new(0.2).unwrap();
        let first = compressor.compress(&mut mixture).unwrap();
        assert!(first.merges > 0);

        let snapshot: Vec<GaussianComponent> = mixture.components().cloned().collect();
        let second = compressor.compress(&mut mixture).unwrap();
        assert!(second.is_noop());
        assert_eq!(mixture.components().cloned().collect::<Vec<_>>(), snapshot);
    }

    #[test]
    fn pruning_does_not_change_the_result() {
        let mut pruned = random_mixture(250, 13);
        let mut exhaustive = pruned.clone();

        let report_pruned =
            Compressor::new(0.15).unwrap().compress(&mut pruned).unwrap();
        let report_exhaustive = Compressor::with_divergence(0.15, Exhaustive)
            .unwrap()
            .compress(&mut exhaustive)
            .unwrap();

        assert_eq!(report_pruned, report_exhaustive);
        assert_eq!(
            pruned.components().collect::<Vec<_>>(),
            exhaustive.components().collect::<Vec<_>>()
        );
    }
}
