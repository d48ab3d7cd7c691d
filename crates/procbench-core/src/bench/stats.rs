//! Statistics computation for benchmark series.

use serde::{Deserialize, Serialize};

/// Summary of a numeric series.
///
/// `stddev` is the population standard deviation (divides by N).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatistics {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
}

/// Compute mean, min, max and population standard deviation.
///
/// An empty series yields all zeros instead of an error, so that a
/// configuration whose sampler never fired still aggregates cleanly.
#[must_use]
pub fn compute_stats(samples: &[f64]) -> AggregateStatistics {
    if samples.is_empty() {
        return AggregateStatistics::default();
    }

    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

    AggregateStatistics {
        // Clamp guards against rounding pushing the mean outside [min, max].
        mean: mean.clamp(min, max),
        min,
        max,
        stddev: variance.sqrt(),
    }
}

/// Compute statistics over one field of a slice of records.
pub fn stats_of<T>(records: &[T], field: impl Fn(&T) -> f64) -> AggregateStatistics {
    let values: Vec<f64> = records.iter().map(field).collect();
    compute_stats(&values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_compute_stats_empty_is_zero() {
        let stats = compute_stats(&[]);
        assert_eq!(
            stats,
            AggregateStatistics {
                mean: 0.0,
                min: 0.0,
                max: 0.0,
                stddev: 0.0,
            }
        );
    }

    #[test]
    fn test_compute_stats_constant_series() {
        let stats = compute_stats(&[4.25, 4.25, 4.25]);
        assert!(approx(stats.mean, 4.25));
        assert!(approx(stats.min, 4.25));
        assert!(approx(stats.max, 4.25));
        assert!(approx(stats.stddev, 0.0));
    }

    #[test]
    fn test_compute_stats_population_stddev() {
        // Classic example: population stddev is exactly 2.
        let stats = compute_stats(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!(approx(stats.mean, 5.0));
        assert!(approx(stats.min, 2.0));
        assert!(approx(stats.max, 9.0));
        assert!(approx(stats.stddev, 2.0));
    }

    #[test]
    fn test_compute_stats_single_sample() {
        let stats = compute_stats(&[0.37]);
        assert!(approx(stats.mean, 0.37));
        assert!(approx(stats.min, 0.37));
        assert!(approx(stats.max, 0.37));
        assert!(approx(stats.stddev, 0.0));
    }

    #[test]
    fn test_compute_stats_unsorted_input() {
        let stats = compute_stats(&[500.0, 100.0, 300.0, 200.0, 400.0]);
        assert!(approx(stats.min, 100.0));
        assert!(approx(stats.max, 500.0));
        assert!(approx(stats.mean, 300.0));
    }

    #[test]
    fn test_compute_stats_ordering_holds() {
        let series: [&[f64]; 4] = [
            &[1.0, 2.0, 3.0],
            &[0.1, 0.1, 0.2, 10.0],
            &[-5.0, 5.0],
            &[1e-9, 3e-9, 2e-9, 1e-9],
        ];

        for values in series {
            let stats = compute_stats(values);
            assert!(stats.min <= stats.mean, "min > mean for {values:?}");
            assert!(stats.mean <= stats.max, "mean > max for {values:?}");
            assert!(stats.stddev >= 0.0, "negative stddev for {values:?}");
        }
    }

    #[test]
    fn test_stats_of_field() {
        struct Row {
            latency: f64,
        }
        let rows = [Row { latency: 1.0 }, Row { latency: 3.0 }];
        let stats = stats_of(&rows, |r| r.latency);
        assert!(approx(stats.mean, 2.0));
        assert!(approx(stats.stddev, 1.0));
    }
}
