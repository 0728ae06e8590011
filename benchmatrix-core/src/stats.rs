//! Central-tendency estimators and the improve/regress decision rule

use crate::capture::SampleSet;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Fraction trimmed from each end by [`Estimator::TrimmedMean`]
pub const TRIM_FRACTION: f64 = 0.10;

/// Relative change below which a difference is never reported
pub const DEFAULT_THRESHOLD: f64 = 0.05;

/// Estimator applied uniformly to baseline and variant samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Estimator {
    #[default]
    Median,
    Mean,
    TrimmedMean,
}

impl Estimator {
    #[must_use]
    pub fn estimate(self, samples: &SampleSet) -> f64 {
        let values = samples.samples();
        match self {
            Self::Median => median(values),
            Self::Mean => mean(values),
            Self::TrimmedMean => {
                let sorted = sorted(values);
                let cut = (sorted.len() as f64 * TRIM_FRACTION).floor() as usize;
                mean(&sorted[cut..sorted.len() - cut])
            }
        }
    }
}

impl fmt::Display for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Median => write!(f, "median"),
            Self::Mean => write!(f, "mean"),
            Self::TrimmedMean => write!(f, "trimmed-mean"),
        }
    }
}

impl FromStr for Estimator {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "median" => Ok(Self::Median),
            "mean" => Ok(Self::Mean),
            "trimmed-mean" => Ok(Self::TrimmedMean),
            other => Err(format!(
                "unknown estimator '{other}' (expected median, mean or trimmed-mean)"
            )),
        }
    }
}

/// Outcome of comparing one variant against the baseline for one case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Improved,
    Regressed,
    Inconclusive,
    NotMeasured,
}

impl Verdict {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Improved => "improved",
            Self::Regressed => "regressed",
            Self::Inconclusive => "inconclusive",
            Self::NotMeasured => "not measured",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "improved" => Ok(Self::Improved),
            "regressed" => Ok(Self::Regressed),
            "inconclusive" => Ok(Self::Inconclusive),
            "not measured" => Ok(Self::NotMeasured),
            other => Err(format!("unknown verdict '{other}'")),
        }
    }
}

/// Decision parameters shared by every comparison in a report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonPolicy {
    pub estimator: Estimator,
    /// Minimum |relative change| before a difference counts
    pub threshold: f64,
    /// Also require the two sample spreads to be disjoint
    pub dispersion_check: bool,
}

impl Default for ComparisonPolicy {
    fn default() -> Self {
        Self {
            estimator: Estimator::Median,
            threshold: DEFAULT_THRESHOLD,
            dispersion_check: true,
        }
    }
}

impl ComparisonPolicy {
    /// Changes inside `[-threshold, +threshold]` are inconclusive, as are
    /// changes whose sample spreads overlap when the dispersion check is on.
    #[must_use]
    pub fn classify(&self, relative_change: f64, baseline: &SampleSet, variant: &SampleSet) -> Verdict {
        if !relative_change.is_finite() || relative_change.abs() <= self.threshold {
            return Verdict::Inconclusive;
        }
        if self.dispersion_check && spreads_overlap(spread(baseline), spread(variant)) {
            return Verdict::Inconclusive;
        }
        if relative_change < 0.0 {
            Verdict::Improved
        } else {
            Verdict::Regressed
        }
    }
}

/// `(variant - baseline) / baseline`; NaN when the baseline estimate is zero
#[must_use]
pub fn relative_change(baseline_estimate: f64, variant_estimate: f64) -> f64 {
    if baseline_estimate == 0.0 {
        return f64::NAN;
    }
    (variant_estimate - baseline_estimate) / baseline_estimate
}

/// `[min, max]` of a sample set
#[must_use]
pub fn spread(samples: &SampleSet) -> (f64, f64) {
    samples
        .samples()
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(*s), hi.max(*s))
        })
}

fn spreads_overlap(a: (f64, f64), b: (f64, f64)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

fn median(values: &[f64]) -> f64 {
    let sorted = sorted(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[f64]) -> SampleSet {
        SampleSet::new(values.to_vec()).unwrap()
    }

    #[test]
    fn estimators() {
        let samples = set(&[5.0, 1.0, 3.0, 100.0, 2.0, 4.0, 3.0, 2.0, 4.0, 1.0]);
        assert!((Estimator::Median.estimate(&samples) - 3.0).abs() < 1e-9);
        assert!((Estimator::Mean.estimate(&samples) - 12.5).abs() < 1e-9);
        // 10% trimmed from each end drops the 1.0 and the 100.0 outlier
        assert!((Estimator::TrimmedMean.estimate(&samples) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn twenty_percent_faster_is_improved() {
        let policy = ComparisonPolicy::default();
        let baseline = set(&[99.0, 100.0, 101.0]);
        let variant = set(&[79.0, 80.0, 81.0]);
        let change = relative_change(
            policy.estimator.estimate(&baseline),
            policy.estimator.estimate(&variant),
        );
        assert!((change + 0.20).abs() < 1e-12);
        assert_eq!(policy.classify(change, &baseline, &variant), Verdict::Improved);
    }

    #[test]
    fn small_change_is_inconclusive() {
        let policy = ComparisonPolicy::default();
        let baseline = set(&[100.0]);
        let variant = set(&[100.5]);
        let change = relative_change(100.0, 100.5);
        assert_eq!(policy.classify(change, &baseline, &variant), Verdict::Inconclusive);
    }

    #[test]
    fn overlapping_spreads_are_inconclusive() {
        let policy = ComparisonPolicy::default();
        let baseline = set(&[80.0, 100.0, 130.0]);
        let variant = set(&[90.0, 120.0, 150.0]);
        assert_eq!(policy.classify(0.20, &baseline, &variant), Verdict::Inconclusive);

        let lenient = ComparisonPolicy {
            dispersion_check: false,
            ..policy
        };
        assert_eq!(lenient.classify(0.20, &baseline, &variant), Verdict::Regressed);
    }

    #[test]
    fn zero_baseline_is_inconclusive() {
        assert!(relative_change(0.0, 5.0).is_nan());
        let policy = ComparisonPolicy::default();
        assert_eq!(
            policy.classify(f64::NAN, &set(&[0.0]), &set(&[5.0])),
            Verdict::Inconclusive
        );
    }

    #[test]
    fn verdict_labels_parse_back() {
        for verdict in [
            Verdict::Improved,
            Verdict::Regressed,
            Verdict::Inconclusive,
            Verdict::NotMeasured,
        ] {
            assert_eq!(verdict.label().parse::<Verdict>().unwrap(), verdict);
        }
    }
}
