//! Reporting and output generation
//!
//! Global invariants enforced:
//! - Deterministic output ordering
//! - Byte-for-byte identical output across runs

use crate::function::{Function, FunctionError};
use serde::{Deserialize, Serialize};

/// Metrics of one function, flattened for output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FunctionMetricsReport {
    pub file: String,
    pub signature: String,
    pub start_line: u32,
    pub end_line: u32,
    pub gross_loc: u32,
    pub net_loc: u32,
    pub lofc: u64,
    pub loac: usize,
    pub feature_constants: usize,
    pub distinct_feature_constants: usize,
    pub feature_locations: usize,
    pub negations: usize,
    pub nesting_sum: u64,
    pub max_nesting_depth: u32,
}

impl FunctionMetricsReport {
    /// Build a report from a function whose metrics have been recomputed
    pub fn new(function: &Function) -> Result<Self, FunctionError> {
        Ok(FunctionMetricsReport {
            file: function.file().to_string(),
            signature: function.signature().to_string(),
            start_line: function.start_line(),
            end_line: function.end_line(),
            gross_loc: function.gross_line_count(),
            net_loc: function.net_line_count()?,
            lofc: function.lines_of_feature_code(),
            loac: function.lines_of_annotated_code(),
            feature_constants: function.feature_constant_count(),
            distinct_feature_constants: function.distinct_feature_constant_count(),
            feature_locations: function.feature_location_count(),
            negations: function.negation_count(),
            nesting_sum: function.nesting_sum(),
            max_nesting_depth: function.max_nesting_depth(),
        })
    }
}

/// Sort reports deterministically
pub fn sort_reports(mut reports: Vec<FunctionMetricsReport>) -> Vec<FunctionMetricsReport> {
    reports.sort_by(|a, b| {
        // 1. File path ascending
        a.file
            .cmp(&b.file)
            // 2. Start line ascending
            .then_with(|| a.start_line.cmp(&b.start_line))
            // 3. Signature ascending
            .then_with(|| a.signature.cmp(&b.signature))
    });
    reports
}

/// Render reports as text output
pub fn render_text(reports: &[FunctionMetricsReport]) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{:<24} {:<6} {:>5} {:>5} {:>5} {:>5} {:>4} {:>4} {:>4} {:>4} {:>4} {}\n",
        "FILE", "LINE", "LOC", "NLOC", "LOFC", "LOAC", "FC", "DFC", "NEG", "NS", "ND", "FUNCTION"
    ));

    for report in reports {
        output.push_str(&format!(
            "{:<24} {:<6} {:>5} {:>5} {:>5} {:>5} {:>4} {:>4} {:>4} {:>4} {:>4} {}\n",
            truncate_or_pad(&report.file, 24),
            report.start_line,
            report.gross_loc,
            report.net_loc,
            report.lofc,
            report.loac,
            report.feature_constants,
            report.distinct_feature_constants,
            report.negations,
            report.nesting_sum,
            report.max_nesting_depth,
            report.signature
        ));
    }

    output
}

/// Render reports as JSON output
pub fn render_json(reports: &[FunctionMetricsReport]) -> String {
    serde_json::to_string_pretty(reports).unwrap_or_else(|_| "[]".to_string())
}

/// Truncate or pad string to fixed width
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}
