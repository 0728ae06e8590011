//! Case-by-case comparison of every variant against the baseline

use crate::capture::{self, ParsedCapture, RawCapture};
use crate::environment::EnvironmentSnapshot;
use crate::error::{MatrixError, MatrixResult};
use crate::registry::Variant;
use crate::stats::{ComparisonPolicy, Verdict, relative_change};
use serde::{Deserialize, Serialize};

/// One (case, variant) cell of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub case: String,
    pub variant: String,
    pub baseline_estimate_ns: f64,
    pub variant_estimate_ns: Option<f64>,
    pub relative_change: Option<f64>,
    pub verdict: Verdict,
}

/// Aggregate cost of doing one second of baseline work per case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    pub variant: String,
    /// Seconds needed, summed over the cases every variant measured
    pub normalized_total: f64,
    /// `(total - baseline_total) / baseline_total`
    pub relative_to_baseline: f64,
}

/// Sole externally consumed output of a matrix run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub suite: String,
    pub environment: EnvironmentSnapshot,
    pub policy: ComparisonPolicy,
    /// Variant names in registry order, baseline first
    pub variants: Vec<String>,
    /// Grouped by case (baseline order), then by variant (registry order)
    pub rows: Vec<ComparisonRecord>,
    pub summaries: Vec<VariantSummary>,
    /// Number of cases contributing to the summaries
    pub common_cases: usize,
}

impl ComparisonReport {
    /// Rows for one case, in variant order
    pub fn rows_for_case<'a>(&'a self, case: &'a str) -> impl Iterator<Item = &'a ComparisonRecord> {
        self.rows.iter().filter(move |row| row.case == case)
    }

    #[must_use]
    pub fn count(&self, verdict: Verdict) -> usize {
        self.rows.iter().filter(|row| row.verdict == verdict).count()
    }
}

/// Compares captures under a single [`ComparisonPolicy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ComparisonEngine {
    policy: ComparisonPolicy,
}

impl ComparisonEngine {
    #[must_use]
    pub const fn new(policy: ComparisonPolicy) -> Self {
        Self { policy }
    }

    /// Compare `others` (registry order, baseline excluded) against `baseline`.
    ///
    /// An unparsable baseline is fatal. An unparsable variant capture, or a
    /// case missing from one, yields `NotMeasured` rows instead.
    pub fn compare(
        &self,
        suite: &str,
        environment: &EnvironmentSnapshot,
        baseline: (&Variant, &RawCapture),
        others: &[(Variant, RawCapture)],
    ) -> MatrixResult<ComparisonReport> {
        let (baseline_variant, baseline_capture) = baseline;
        let baseline_cases = capture::parse(baseline_capture).map_err(|err| {
            MatrixError::BaselineUnparsable {
                variant: baseline_variant.name.clone(),
                reason: err.to_string(),
            }
        })?;

        let parsed_others: Vec<(&str, Option<ParsedCapture>)> = others
            .iter()
            .map(|(variant, raw)| {
                let parsed = match capture::parse(raw) {
                    Ok(parsed) => Some(parsed),
                    Err(err) => {
                        tracing::warn!(variant = %variant.name, error = %err, "Capture unparsable, marking cases not measured");
                        None
                    }
                };
                (variant.name.as_str(), parsed)
            })
            .collect();

        let estimator = self.policy.estimator;
        let mut rows = Vec::with_capacity(baseline_cases.len() * (others.len() + 1));

        for case in baseline_cases.case_names() {
            let Some(baseline_samples) = baseline_cases.get(case) else {
                continue;
            };
            let baseline_estimate = estimator.estimate(baseline_samples);

            rows.push(ComparisonRecord {
                case: case.to_string(),
                variant: baseline_variant.name.clone(),
                baseline_estimate_ns: baseline_estimate,
                variant_estimate_ns: Some(baseline_estimate),
                relative_change: Some(0.0),
                verdict: Verdict::Inconclusive,
            });

            for (variant, parsed) in &parsed_others {
                let samples = parsed.as_ref().and_then(|p| p.get(case));
                let record = match samples {
                    Some(samples) => {
                        let estimate = estimator.estimate(samples);
                        let change = relative_change(baseline_estimate, estimate);
                        ComparisonRecord {
                            case: case.to_string(),
                            variant: (*variant).to_string(),
                            baseline_estimate_ns: baseline_estimate,
                            variant_estimate_ns: Some(estimate),
                            relative_change: change.is_finite().then_some(change),
                            verdict: self.policy.classify(change, baseline_samples, samples),
                        }
                    }
                    None => {
                        tracing::debug!(case, variant, "Case not measured");
                        ComparisonRecord {
                            case: case.to_string(),
                            variant: (*variant).to_string(),
                            baseline_estimate_ns: baseline_estimate,
                            variant_estimate_ns: None,
                            relative_change: None,
                            verdict: Verdict::NotMeasured,
                        }
                    }
                };
                rows.push(record);
            }
        }

        let mut variants = Vec::with_capacity(others.len() + 1);
        variants.push(baseline_variant.name.clone());
        variants.extend(others.iter().map(|(variant, _)| variant.name.clone()));

        let (summaries, common_cases) = summarize(&variants, &rows);

        Ok(ComparisonReport {
            suite: suite.to_string(),
            environment: environment.clone(),
            policy: self.policy,
            variants,
            rows,
            summaries,
            common_cases,
        })
    }
}

/// Normalized totals over the cases that every variant measured
fn summarize(variants: &[String], rows: &[ComparisonRecord]) -> (Vec<VariantSummary>, usize) {
    let mut totals = vec![0.0; variants.len()];
    let mut common_cases = 0;

    for case_rows in rows.chunks(variants.len()) {
        let ratios: Option<Vec<f64>> = case_rows
            .iter()
            .map(|row| {
                row.variant_estimate_ns
                    .filter(|_| row.baseline_estimate_ns > 0.0)
                    .map(|estimate| estimate / row.baseline_estimate_ns)
            })
            .collect();
        if let Some(ratios) = ratios {
            common_cases += 1;
            for (total, ratio) in totals.iter_mut().zip(ratios) {
                *total += ratio;
            }
        }
    }

    let baseline_total = totals.first().copied().unwrap_or(0.0);
    let summaries = variants
        .iter()
        .zip(totals)
        .map(|(variant, total)| VariantSummary {
            variant: variant.clone(),
            normalized_total: total,
            relative_to_baseline: if baseline_total > 0.0 {
                (total - baseline_total) / baseline_total
            } else {
                0.0
            },
        })
        .collect();
    (summaries, common_cases)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> EnvironmentSnapshot {
        EnvironmentSnapshot::new("cpu", "linux", Some(8), "abc", Some(true))
    }

    fn line(case: &str, est: f64) -> String {
        format!(
            "{case} time: [{:.3} ns {:.3} ns {:.3} ns]\n",
            est * 0.99,
            est,
            est * 1.01
        )
    }

    #[test]
    fn classifies_and_orders_rows() {
        let baseline = RawCapture::new(format!("{}{}", line("parse_small", 100.0), line("parse_large", 1000.0)).into_bytes());
        let faster = RawCapture::new(format!("{}{}", line("parse_large", 1000.0), line("parse_small", 80.0)).into_bytes());
        let same = RawCapture::new(format!("{}{}", line("parse_small", 100.5), line("parse_large", 1300.0)).into_bytes());

        let report = ComparisonEngine::default()
            .compare(
                "bench",
                &env(),
                (&Variant::baseline(), &baseline),
                &[
                    (Variant::new("mimalloc"), faster),
                    (Variant::new("smalloc"), same),
                ],
            )
            .unwrap();

        let order: Vec<(&str, &str)> = report
            .rows
            .iter()
            .map(|r| (r.case.as_str(), r.variant.as_str()))
            .collect();
        assert_eq!(
            order,
            [
                ("parse_small", "default"),
                ("parse_small", "mimalloc"),
                ("parse_small", "smalloc"),
                ("parse_large", "default"),
                ("parse_large", "mimalloc"),
                ("parse_large", "smalloc"),
            ]
        );
        assert_eq!(report.rows[1].verdict, Verdict::Improved);
        assert!((report.rows[1].relative_change.unwrap() + 0.20).abs() < 1e-9);
        assert_eq!(report.rows[2].verdict, Verdict::Inconclusive);
        assert_eq!(report.rows[4].verdict, Verdict::Inconclusive);
        assert_eq!(report.rows[5].verdict, Verdict::Regressed);
        assert_eq!(report.common_cases, 2);
    }

    #[test]
    fn missing_case_is_reported_not_measured() {
        let baseline = RawCapture::new(format!("{}{}", line("a", 10.0), line("b", 20.0)).into_bytes());
        let partial = RawCapture::new(line("a", 10.0).into_bytes());

        let report = ComparisonEngine::default()
            .compare(
                "bench",
                &env(),
                (&Variant::baseline(), &baseline),
                &[(Variant::new("rpmalloc"), partial)],
            )
            .unwrap();

        let missing: Vec<_> = report.rows_for_case("b").collect();
        assert_eq!(missing.len(), 2);
        assert_eq!(missing[1].verdict, Verdict::NotMeasured);
        assert_eq!(missing[1].variant_estimate_ns, None);
        // Only "a" is measured everywhere
        assert_eq!(report.common_cases, 1);
    }

    #[test]
    fn unparsable_variant_marks_every_case_not_measured() {
        let baseline = RawCapture::new(format!("{}{}", line("a", 10.0), line("b", 20.0)).into_bytes());
        let broken = RawCapture::from("thread 'main' panicked");

        let report = ComparisonEngine::default()
            .compare(
                "bench",
                &env(),
                (&Variant::baseline(), &baseline),
                &[(Variant::new("jemalloc"), broken)],
            )
            .unwrap();
        assert_eq!(report.count(Verdict::NotMeasured), 2);
    }

    #[test]
    fn unparsable_baseline_is_fatal() {
        let err = ComparisonEngine::default()
            .compare(
                "bench",
                &env(),
                (&Variant::baseline(), &RawCapture::from("nothing here")),
                &[(Variant::new("mimalloc"), RawCapture::new(line("a", 1.0).into_bytes()))],
            )
            .unwrap_err();
        assert!(matches!(err, MatrixError::BaselineUnparsable { .. }));
    }

    #[test]
    fn summaries_normalize_to_baseline_work() {
        let baseline = RawCapture::new(format!("{}{}", line("a", 100.0), line("b", 10.0)).into_bytes());
        let variant = RawCapture::new(format!("{}{}", line("a", 50.0), line("b", 20.0)).into_bytes());
        let report = ComparisonEngine::default()
            .compare(
                "bench",
                &env(),
                (&Variant::baseline(), &baseline),
                &[(Variant::new("mimalloc"), variant)],
            )
            .unwrap();

        assert!((report.summaries[0].normalized_total - 2.0).abs() < 1e-9);
        // 0.5 + 2.0 seconds for two seconds of baseline work
        assert!((report.summaries[1].normalized_total - 2.5).abs() < 1e-9);
        assert!((report.summaries[1].relative_to_baseline - 0.25).abs() < 1e-9);
    }
}
