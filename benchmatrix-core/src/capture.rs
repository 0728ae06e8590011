//! Raw suite output and the timing samples recovered from it
//!
//! Two sample-emission formats are recognised:
//!
//! - Criterion: `<case>  time:   [<lo> <unit> <estimate> <unit> <hi> <unit>]`,
//!   where long case names push `time:` onto the next line
//! - libtest bencher: `test <case> ... bench:  1,234 ns/iter (+/- 56)`
//!
//! Both report a central value and a spread, which become a three-sample set
//! `[low, central, high]`.

use crate::error::{MatrixError, MatrixResult};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static CRITERION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(\S+)\s+time:\s+\[([\d.]+)\s*(\S+)\s+([\d.]+)\s*(\S+)\s+([\d.]+)\s*(\S+?)\]",
    )
    .unwrap_or_else(|err| unreachable!("criterion pattern is valid: {err}"))
});

static BENCHER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^test\s+(\S+)\s+\.\.\.\s+bench:\s+([\d,.]+)\s+ns/iter\s+\(\+/-\s+([\d,.]+)\)")
        .unwrap_or_else(|err| unreachable!("bencher pattern is valid: {err}"))
});

/// Verbatim combined output of one suite run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCapture {
    bytes: Vec<u8>,
}

impl RawCapture {
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<&str> for RawCapture {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes().to_vec())
    }
}

/// Duration samples in nanoseconds for one (variant, case) pair
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    samples_ns: Vec<f64>,
}

impl SampleSet {
    /// Samples must be finite and non-negative
    pub fn new(samples_ns: Vec<f64>) -> MatrixResult<Self> {
        if samples_ns.is_empty() {
            return Err(MatrixError::CaptureParse("empty sample set".to_string()));
        }
        if let Some(bad) = samples_ns.iter().find(|s| !s.is_finite() || **s < 0.0) {
            return Err(MatrixError::CaptureParse(format!(
                "invalid duration sample {bad}"
            )));
        }
        Ok(Self { samples_ns })
    }

    #[must_use]
    pub fn samples(&self) -> &[f64] {
        &self.samples_ns
    }
}

/// Case name → samples, in order of first appearance
#[derive(Debug, Clone, Default)]
pub struct ParsedCapture {
    order: Vec<String>,
    cases: HashMap<String, SampleSet>,
}

impl ParsedCapture {
    fn insert(&mut self, case: &str, samples: SampleSet) {
        if self.cases.insert(case.to_string(), samples).is_none() {
            self.order.push(case.to_string());
        }
    }

    /// Case names in order of first appearance
    pub fn case_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    #[must_use]
    pub fn get(&self, case: &str) -> Option<&SampleSet> {
        self.cases.get(case)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Recover every benchmark case from a capture.
///
/// Fails when no case is recognised or a time unit is unknown.
pub fn parse(capture: &RawCapture) -> MatrixResult<ParsedCapture> {
    let text = String::from_utf8_lossy(capture.as_bytes());
    let mut matches: Vec<(usize, String, SampleSet)> = Vec::new();

    for caps in CRITERION_LINE.captures_iter(&text) {
        let position = caps.get(0).map_or(0, |m| m.start());
        let mut samples = Vec::with_capacity(3);
        for (value, unit) in [(2, 3), (4, 5), (6, 7)] {
            samples.push(to_nanos(&caps[value], &caps[unit])?);
        }
        matches.push((position, caps[1].to_string(), SampleSet::new(samples)?));
    }

    for caps in BENCHER_LINE.captures_iter(&text) {
        let position = caps.get(0).map_or(0, |m| m.start());
        let central = parse_number(&caps[2])?;
        let deviation = parse_number(&caps[3])?;
        let samples = vec![(central - deviation).max(0.0), central, central + deviation];
        matches.push((position, caps[1].to_string(), SampleSet::new(samples)?));
    }

    if matches.is_empty() {
        return Err(MatrixError::CaptureParse(
            "no benchmark timings found".to_string(),
        ));
    }

    matches.sort_by_key(|(position, _, _)| *position);
    let mut parsed = ParsedCapture::default();
    for (_, case, samples) in matches {
        parsed.insert(&case, samples);
    }
    Ok(parsed)
}

/// Convert a value with a Criterion time unit into nanoseconds
pub fn to_nanos(value: &str, unit: &str) -> MatrixResult<f64> {
    let value = parse_number(value)?;
    let multiplier = match unit {
        "ns" => 1.0,
        // Criterion prints U+00B5; some terminals/encoders substitute U+03BC
        "µs" | "μs" | "us" => 1_000.0,
        "ms" => 1_000_000.0,
        "s" => 1_000_000_000.0,
        other => {
            return Err(MatrixError::CaptureParse(format!(
                "unknown time unit '{other}'"
            )));
        }
    };
    Ok(value * multiplier)
}

fn parse_number(raw: &str) -> MatrixResult<f64> {
    raw.replace(',', "")
        .parse::<f64>()
        .map_err(|err| MatrixError::CaptureParse(format!("invalid number '{raw}': {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRITERION: &str = "\
Benchmarking parse_small
Benchmarking parse_small: Warming up for 3.0000 s
parse_small             time:   [99.512 ns 100.00 ns 100.61 ns]
                        change: [-1.2% +0.3% +1.9%] (p = 0.71 > 0.05)
Found 3 outliers among 100 measurements (3.00%)
canada/simd_json::to_tape_with_a_very_long_name
                        time:   [4.1203 ms 4.1500 ms 4.1822 ms]
twitter                 time:   [72.101 µs 72.624 µs 73.002 µs]
";

    #[test]
    fn parses_criterion_output_in_order() {
        let parsed = parse(&RawCapture::from(CRITERION)).unwrap();
        let names: Vec<_> = parsed.case_names().collect();
        assert_eq!(
            names,
            [
                "parse_small",
                "canada/simd_json::to_tape_with_a_very_long_name",
                "twitter"
            ]
        );
        let small = parsed.get("parse_small").unwrap().samples();
        assert!((small[1] - 100.0).abs() < 1e-9);
        let twitter = parsed.get("twitter").unwrap().samples();
        assert!((twitter[1] - 72_624.0).abs() < 1e-6);
        let canada = parsed
            .get("canada/simd_json::to_tape_with_a_very_long_name")
            .unwrap()
            .samples();
        assert!((canada[0] - 4_120_300.0).abs() < 1e-3);
    }

    #[test]
    fn parses_bencher_output() {
        let text = "running 2 tests\n\
test bench_alloc ... bench:       1,234 ns/iter (+/- 56)\n\
test bench_free  ... bench:          98 ns/iter (+/- 3)\n";
        let parsed = parse(&RawCapture::from(text)).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(
            parsed.get("bench_alloc").unwrap().samples(),
            &[1178.0, 1234.0, 1290.0]
        );
    }

    #[test]
    fn repeated_case_keeps_position_and_latest_samples() {
        let text = "a time: [1 ns 2 ns 3 ns]\nb time: [1 ns 2 ns 3 ns]\na time: [4 ns 5 ns 6 ns]\n";
        let parsed = parse(&RawCapture::from(text)).unwrap();
        assert_eq!(parsed.case_names().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(parsed.get("a").unwrap().samples(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn rejects_captures_without_timings() {
        let err = parse(&RawCapture::from("error: could not compile")).unwrap_err();
        assert!(err.to_string().contains("no benchmark timings"));
    }

    #[test]
    fn rejects_unknown_units() {
        let err = parse(&RawCapture::from("x time: [1 ks 2 ks 3 ks]")).unwrap_err();
        assert!(err.to_string().contains("unknown time unit"));
    }

    #[test]
    fn unit_conversion() {
        assert_eq!(to_nanos("1.5", "us").unwrap(), 1_500.0);
        assert_eq!(to_nanos("2", "ms").unwrap(), 2_000_000.0);
        assert_eq!(to_nanos("1", "s").unwrap(), 1_000_000_000.0);
        assert_eq!(to_nanos("3", "μs").unwrap(), 3_000.0);
    }
}
