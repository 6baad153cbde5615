//! Decides which DMS report a header row belongs to.

use crate::header::header_line;
use crate::model::ReportType;
use crate::schema::Rule;

/// First matching rule wins; no match is `Unknown`. Total over all inputs.
pub fn classify(header: &[String], rules: &[Rule]) -> ReportType {
    classify_line(&header_line(header), rules)
}

/// Classify an already lowercased header line.
pub fn classify_line(line: &str, rules: &[Rule]) -> ReportType {
    rules
        .iter()
        .find(|rule| rule.matches(line))
        .map(|rule| rule.report)
        .unwrap_or(ReportType::Unknown)
}
