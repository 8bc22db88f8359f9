use rand::Rng;
use serde::Serialize;

/// Resamples drawn per bootstrap estimate.
pub const BOOTSTRAP_RESAMPLES: usize = 1000;

/// Mean and population variance of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Biased (population) estimator: `E[X²] - E[X]²`.
    pub variance: f64,
}

impl Summary {
    /// `None` for an empty sample.
    pub fn of(samples: &[f64]) -> Option<Self> {
        Some(Self {
            count: samples.len(),
            mean: mean(samples)?,
            variance: population_variance(samples)?,
        })
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// `E[X²] - E[X]²`, never negative.
pub fn population_variance(samples: &[f64]) -> Option<f64> {
    let m = mean(samples)?;
    let mean_sq = samples.iter().map(|x| x * x).sum::<f64>() / samples.len() as f64;
    Some((mean_sq - m * m).max(0.0))
}

/// Standard deviation of `statistic` over `resamples` bootstrap resamples of
/// `samples` (drawn with replacement, same size as the original).
///
/// Returns 0 for an empty sample or when `resamples` is 0.
pub fn bootstrap_std_error<F, G>(samples: &[f64], resamples: usize, statistic: F, rng: &mut G) -> f64
where
    F: Fn(&[f64]) -> f64,
    G: Rng + ?Sized,
{
    if samples.is_empty() || resamples == 0 {
        return 0.0;
    }

    let n = samples.len();
    let mut resample = vec![0.0; n];
    let estimates: Vec<f64> = (0..resamples)
        .map(|_| {
            for slot in &mut resample {
                *slot = samples[rng.gen_range(0..n)];
            }
            statistic(&resample)
        })
        .collect();

    let centre = estimates.iter().sum::<f64>() / estimates.len() as f64;
    let spread = estimates.iter().map(|e| (e - centre).powi(2)).sum::<f64>() / estimates.len() as f64;
    spread.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn variance_of(s: &[f64]) -> f64 {
        population_variance(s).unwrap_or(0.0)
    }

    #[test]
    fn test_summary_of_known_sample() {
        let s = Summary::of(&[2.0, 4.0, 6.0]).unwrap();
        assert_eq!(s.count, 3);
        assert!((s.mean - 4.0).abs() < 1e-12);
        assert!((s.variance - 8.0 / 3.0).abs() < 1e-12);
        assert!((s.std_dev() - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_sample_has_no_summary() {
        assert!(Summary::of(&[]).is_none());
        assert!(mean(&[]).is_none());
        assert!(population_variance(&[]).is_none());
    }

    #[test]
    fn test_constant_sample_has_zero_variance() {
        assert_eq!(population_variance(&[3.0; 17]), Some(0.0));
    }

    #[test]
    fn test_bootstrap_of_identical_samples_is_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        let samples = [5.0; 20];
        let err = bootstrap_std_error(&samples, BOOTSTRAP_RESAMPLES, variance_of, &mut rng);
        assert_eq!(err, 0.0);
    }

    #[test]
    fn test_bootstrap_of_empty_sample_is_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(bootstrap_std_error(&[], 100, variance_of, &mut rng), 0.0);
    }

    #[test]
    fn test_bootstrap_error_of_mean_matches_theory() {
        // Standard error of the mean is sigma / sqrt(n).
        let mut rng = StdRng::seed_from_u64(7);
        let samples: Vec<f64> = (0..400).map(|i| (i % 2) as f64).collect();
        let err = bootstrap_std_error(&samples, 2000, |s| mean(s).unwrap_or(0.0), &mut rng);
        let expected = 0.5 / 20.0;
        assert!((err - expected).abs() < 0.005, "err = {err}");
    }

    #[test]
    fn test_bootstrap_is_reproducible_with_seed() {
        let samples = [1.0, 4.0, 2.0, 8.0, 5.0];
        let a = bootstrap_std_error(&samples, 500, variance_of, &mut StdRng::seed_from_u64(3));
        let b = bootstrap_std_error(&samples, 500, variance_of, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
        assert!(a > 0.0);
    }
}
