use super::{OutputFormatter, RunStats};
use crate::converter::{FileReport, Outcome};
use serde::{Deserialize, Serialize};

/// JSON output formatter
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self
    }
}

/// JSON representation of a run
#[derive(Debug, Serialize, Deserialize)]
struct JsonOutput {
    /// Statistics about the run
    stats: JsonStats,
    /// Results for each file
    files: Vec<JsonFileResult>,
}

/// JSON representation of run statistics
#[derive(Debug, Serialize, Deserialize)]
struct JsonStats {
    total_files: usize,
    transformed: usize,
    copied: usize,
    lines_in: usize,
    lines_out: usize,
}

impl From<&RunStats> for JsonStats {
    fn from(stats: &RunStats) -> Self {
        Self {
            total_files: stats.total_files,
            transformed: stats.transformed,
            copied: stats.copied,
            lines_in: stats.lines_in,
            lines_out: stats.lines_out,
        }
    }
}

/// JSON representation of the result for a single file
#[derive(Debug, Serialize, Deserialize)]
struct JsonFileResult {
    input: String,
    output: String,
    outcome: Outcome,
}

impl From<&FileReport> for JsonFileResult {
    fn from(report: &FileReport) -> Self {
        Self {
            input: report.input.display().to_string(),
            output: report.output.display().to_string(),
            outcome: report.outcome.clone(),
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_results(&self, reports: &[FileReport]) -> String {
        let stats = RunStats::from_results(reports);

        let json_output = JsonOutput {
            stats: JsonStats::from(&stats),
            files: reports.iter().map(JsonFileResult::from).collect(),
        };

        serde_json::to_string_pretty(&json_output)
            .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize JSON: {e}"}}"#))
    }
}
