//! Report rendering
//!
//! Markdown tables show millions of messages per second with two decimals,
//! producers down the side and consumers across the top. JSON is the full
//! serialized report.

use crate::bench::{BenchmarkResult, SweepReport, ThroughputMatrix};
use crate::core::config::OutputFormat;
use crate::core::Result;
use std::fmt::Write;

/// Render a sweep in the requested format
pub fn render(report: &SweepReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(render_markdown(&report.matrix)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

/// Render a single pair result in the requested format
pub fn render_pair(result: &BenchmarkResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => {
            let mut out = String::new();
            out.push_str("| Producer | Consumer | Seconds | M msg/s |\n");
            out.push_str("| --- | --- | --- | --- |\n");
            let _ = writeln!(
                out,
                "| {} | {} | {:.3} | {:.2} |",
                result.producer,
                result.consumer,
                result.elapsed.as_secs_f64(),
                result.mmps()
            );
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
    }
}

/// Markdown table of the matrix in millions of messages per second
pub fn render_markdown(matrix: &ThroughputMatrix) -> String {
    let n = matrix.size();
    let mut out = String::new();

    out.push_str("| CoreA \\ CoreB -> |");
    for consumer in 0..n {
        let _ = write!(out, " {} |", consumer);
    }
    out.push('\n');

    out.push_str("| --- |");
    for _ in 0..n {
        out.push_str(" --- |");
    }
    out.push('\n');

    for (producer, row) in matrix.rows().enumerate() {
        let _ = write!(out, "| {} |", producer);
        for cell in row {
            match cell {
                Some(throughput) => {
                    let _ = write!(out, " {:.2} |", throughput * 1e-6);
                }
                None => out.push_str(" n/a |"),
            }
        }
        out.push('\n');
    }

    out
}
