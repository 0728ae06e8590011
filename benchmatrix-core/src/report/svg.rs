//! Bar chart of each variant's normalized total relative to the baseline

use crate::compare::ComparisonReport;
use std::fmt::Write;

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 500.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 120.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 40.0;
const COLORS: [&str; 7] = [
    "#4285f4", "#ea4335", "#fbbc04", "#34a853", "#9333ea", "#ff6b9d", "#00bcd4",
];
const STYLE: &str = r#"  <style>
    .bar { stroke: none; }
    .axis { stroke: #333; stroke-width: 1; }
    .grid { stroke: #ddd; stroke-width: 0.5; }
    .label { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Arial, sans-serif; font-size: 12px; fill: #333; }
    .value { font-family: monospace; font-size: 11px; fill: #999; }
    .title { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Arial, sans-serif; font-size: 16px; font-weight: 600; fill: #333; }
    .metadata { font-family: monospace; font-size: 10px; fill: #666; }
  </style>
"#;

/// Render the chart. Output depends only on the report contents.
#[must_use]
pub fn render(report: &ComparisonReport) -> String {
    let chart_width = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let chart_height = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let axis_y = MARGIN_TOP + chart_height;

    let baseline_total = report
        .summaries
        .first()
        .map_or(0.0, |summary| summary.normalized_total);
    let percentages: Vec<f64> = report
        .summaries
        .iter()
        .map(|summary| {
            if baseline_total > 0.0 {
                summary.normalized_total / baseline_total * 100.0
            } else {
                0.0
            }
        })
        .collect();
    let scale_max = percentages.iter().copied().fold(100.0_f64, f64::max) * 1.1;

    let slot_width = chart_width / report.summaries.len().max(1) as f64;
    let padding = slot_width * 0.2;
    let bar_width = slot_width - padding;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    );
    svg.push_str(STYLE);
    let _ = writeln!(
        svg,
        r#"  <text x="{}" y="30" class="title" text-anchor="middle">{} by variant: time (lower is better)</text>"#,
        WIDTH / 2.0,
        escape(&report.suite)
    );
    let _ = writeln!(
        svg,
        r#"  <line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{axis_y}" class="axis"/>"#
    );
    let _ = writeln!(
        svg,
        r#"  <line x1="{MARGIN_LEFT}" y1="{axis_y}" x2="{}" y2="{axis_y}" class="axis"/>"#,
        MARGIN_LEFT + chart_width
    );

    let mut grid = 0.0;
    while grid <= scale_max {
        let y = MARGIN_TOP + chart_height * (1.0 - grid / scale_max);
        let _ = writeln!(
            svg,
            r#"  <line x1="{MARGIN_LEFT}" y1="{y}" x2="{}" y2="{y}" class="grid"/>"#,
            MARGIN_LEFT + chart_width,
            y = fixed(y)
        );
        let _ = writeln!(
            svg,
            r#"  <text x="{}" y="{}" class="label" text-anchor="end">{grid:.0}%</text>"#,
            MARGIN_LEFT - 10.0,
            fixed(y + 4.0)
        );
        grid += 20.0;
    }

    for (index, (summary, pct)) in report.summaries.iter().zip(&percentages).enumerate() {
        let x = MARGIN_LEFT + index as f64 * slot_width + padding / 2.0;
        let bar_height = pct / scale_max * chart_height;
        let y = axis_y - bar_height;
        let center = fixed(x + bar_width / 2.0);
        let label = if index == 0 {
            "100% (baseline)".to_string()
        } else {
            format!("{pct:.0}%")
        };

        let _ = writeln!(
            svg,
            r#"  <rect x="{}" y="{}" width="{}" height="{}" class="bar" fill="{}"/>"#,
            fixed(x),
            fixed(y),
            fixed(bar_width),
            fixed(bar_height),
            COLORS[index % COLORS.len()]
        );
        let _ = writeln!(
            svg,
            r#"  <text x="{center}" y="{}" class="value" text-anchor="middle">{label}</text>"#,
            fixed(y - 5.0)
        );
        let _ = writeln!(
            svg,
            r#"  <text x="{center}" y="{}" class="label" text-anchor="middle">{}</text>"#,
            axis_y + 20.0,
            escape(&summary.variant)
        );
    }

    let env = &report.environment;
    let commit: String = env.commit_id().chars().take(12).collect();
    let metadata = [
        format!("Commit: {commit}"),
        format!("Git status: {}", env.git_status_label()),
        format!("CPU: {}", env.processor_label()),
        format!("OS: {}", env.os_label()),
        format!("Cases compared: {}", report.common_cases),
    ];
    for (i, line) in metadata.iter().enumerate() {
        let _ = writeln!(
            svg,
            r#"  <text x="{}" y="{}" class="metadata" text-anchor="middle">{}</text>"#,
            WIDTH / 2.0,
            axis_y + 50.0 + i as f64 * 15.0,
            escape(line)
        );
    }

    svg.push_str("</svg>\n");
    svg
}

/// Two decimals keep the output stable across platforms
fn fixed(value: f64) -> String {
    format!("{value:.2}")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RawCapture;
    use crate::compare::ComparisonEngine;
    use crate::environment::EnvironmentSnapshot;
    use crate::registry::Variant;

    fn report() -> ComparisonReport {
        let env = EnvironmentSnapshot::new("Ryzen <7>", "linux", Some(16), "0123456789abcdef", Some(true));
        ComparisonEngine::default()
            .compare(
                "simd-json",
                &env,
                (&Variant::baseline(), &RawCapture::from("a time: [9 ns 10 ns 11 ns]\n")),
                &[(Variant::new("mimalloc"), RawCapture::from("a time: [7 ns 8 ns 9 ns]\n"))],
            )
            .unwrap()
    }

    #[test]
    fn renders_one_bar_per_variant_with_metadata() {
        let svg = render(&report());
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<rect").count(), 2);
        assert!(svg.contains("100% (baseline)"));
        assert!(svg.contains(">80%<"));
        assert!(svg.contains("Commit: 0123456789ab"));
        assert!(svg.contains("Ryzen &lt;7&gt;"));
    }

    #[test]
    fn grid_is_labelled_every_twenty_percent() {
        let svg = render(&report());
        // Scale tops out at 110%, so gridlines run from 0% to 100%
        assert_eq!(svg.matches(r#"class="grid""#).count(), 6);
        for label in [">0%<", ">20%<", ">60%<", ">100%<"] {
            assert!(svg.contains(label), "missing grid label {label}");
        }
        assert!(!svg.contains(">120%<"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let report = report();
        assert_eq!(render(&report), render(&report));
    }
}
