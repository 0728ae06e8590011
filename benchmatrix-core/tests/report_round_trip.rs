//! Rendered reports can be read back without losing the comparison table

use benchmatrix_core::report::{parse_table, render_json, render_text};
use benchmatrix_core::{ComparisonEngine, EnvironmentSnapshot, RawCapture, Variant, Verdict};

const BASELINE: &str = "\
Benchmarking parse
parse                   time:   [72.100 µs 72.624 µs 73.190 µs]
serialize/large
                        time:   [151.02 ms 151.08 ms 151.20 ms]
test tiny ... bench:       1,250 ns/iter (+/- 30)
";

const FASTER: &str = "\
parse                   time:   [55.000 µs 56.000 µs 57.000 µs]
serialize/large         time:   [150.90 ms 151.00 ms 151.10 ms]
";

#[test]
fn table_round_trip_preserves_order_changes_and_verdicts() {
    let env = EnvironmentSnapshot::new("AMD Ryzen 9 7950X", "Ubuntu 24.04", Some(32), "deadbeef", Some(false));
    let report = ComparisonEngine::default()
        .compare(
            "simd-json",
            &env,
            (&Variant::baseline(), &RawCapture::from(BASELINE)),
            &[
                (Variant::new("mimalloc"), RawCapture::from(FASTER)),
                (Variant::new("smalloc"), RawCapture::from("garbage")),
            ],
        )
        .unwrap();

    let text = render_text(&report).unwrap();
    assert!(text.contains("Git status: Uncommitted changes"));

    let parsed = parse_table(&text).unwrap();
    assert_eq!(parsed.len(), report.rows.len());
    for (row, record) in parsed.iter().zip(&report.rows) {
        assert_eq!(row.case, record.case);
        assert_eq!(row.variant, record.variant);
        assert_eq!(row.verdict, record.verdict);
        match (row.change_percent, record.relative_change) {
            (Some(percent), Some(ratio)) => assert!((percent - ratio * 100.0).abs() <= 0.05 + 1e-9),
            (None, None) => {}
            other => panic!("change mismatch for {}/{}: {other:?}", row.case, row.variant),
        }
    }

    let tiny: Vec<_> = parsed.iter().filter(|row| row.case == "tiny").collect();
    assert_eq!(tiny.len(), 3);
    assert_eq!(tiny[1].verdict, Verdict::NotMeasured);
    assert_eq!(
        parsed.iter().find(|row| row.case == "parse" && row.variant == "mimalloc").map(|row| row.verdict),
        Some(Verdict::Improved)
    );
}

#[test]
fn json_report_carries_rows_and_environment() {
    let env = EnvironmentSnapshot::new("cpu", "os", None, "abc", None);
    let report = ComparisonEngine::default()
        .compare(
            "bench",
            &env,
            (&Variant::baseline(), &RawCapture::from(BASELINE)),
            &[(Variant::new("mimalloc"), RawCapture::from(FASTER))],
        )
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&render_json(&report).unwrap()).unwrap();
    assert_eq!(value["suite"], "bench");
    assert!(value["generated_at"].is_string());
    assert_eq!(value["rows"].as_array().unwrap().len(), report.rows.len());
}
