//! Text rendering of latency reports.

use super::analyze::{BucketStats, LatencyReport, Summary};
use std::fmt::Write as _;

/// Printed in place of any statistic of a bucket with no measured samples.
pub const NO_DATA: &str = "-";

/// Render one report block.
pub fn render(report: &LatencyReport) -> String {
    let mut out = String::new();

    render_header(&mut out, report);
    render_counts(&mut out, report);
    render_response_times(&mut out, report);
    render_throughput(&mut out, report);

    out
}

fn render_header(out: &mut String, report: &LatencyReport) {
    writeln!(
        out,
        "---- Global Information for {} --------------------------------------------------------",
        report.label
    )
    .unwrap();
    writeln!(out, "> Unit of measurement: {}", report.unit).unwrap();
}

fn render_counts(out: &mut String, report: &LatencyReport) {
    writeln!(
        out,
        "> Request count: {} (OK={} KO={})",
        report.total_requests(),
        report.ok.count,
        report.ko.count
    )
    .unwrap();
}

fn render_response_times(out: &mut String, report: &LatencyReport) {
    let lines: [(&str, fn(&Summary) -> f64); 8] = [
        ("Min response time", |s| s.min),
        ("Max response time", |s| s.max),
        ("Mean response time", |s| s.mean),
        ("Std deviation", |s| s.std_dev),
        ("Response time 50th percentile", |s| s.p50),
        ("Response time 75th percentile", |s| s.p75),
        ("Response time 95th percentile", |s| s.p95),
        ("Response time 99th percentile", |s| s.p99),
    ];

    for (label, field) in lines {
        writeln!(
            out,
            "> {label}: {} (OK={} KO={})",
            format_stat(&report.all, field),
            format_stat(&report.ok, field),
            format_stat(&report.ko, field),
        )
        .unwrap();
    }
}

fn render_throughput(out: &mut String, report: &LatencyReport) {
    writeln!(out, "> Mean requests/sec: {:.4}", report.requests_per_sec).unwrap();
}

fn format_stat(stats: &BucketStats, field: fn(&Summary) -> f64) -> String {
    match &stats.summary {
        Some(summary) => format!("{:.2}", field(summary)),
        None => NO_DATA.to_string(),
    }
}
