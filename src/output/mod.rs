pub mod human;
pub mod json;

use crate::converter::{FileReport, Outcome};

/// Output format for run reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON format for machine processing
    Json,
}

/// Trait for formatting the reports of a run
pub trait OutputFormatter {
    /// Format the per-file reports for output
    fn format_results(&self, reports: &[FileReport]) -> String;
}

/// Get the appropriate formatter for the given format
pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human => Box::new(human::HumanFormatter::new()),
        OutputFormat::Json => Box::new(json::JsonFormatter::new()),
    }
}

/// Statistics about a run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total_files: usize,
    pub transformed: usize,
    pub copied: usize,
    pub lines_in: usize,
    pub lines_out: usize,
}

impl RunStats {
    /// Calculate statistics from file reports
    pub fn from_results(reports: &[FileReport]) -> Self {
        let mut stats = Self {
            total_files: reports.len(),
            ..Self::default()
        };

        for report in reports {
            match &report.outcome {
                Outcome::Transformed { lines_in, lines_out } => {
                    stats.transformed += 1;
                    stats.lines_in += lines_in;
                    stats.lines_out += lines_out;
                }
                Outcome::Copied { .. } => stats.copied += 1,
            }
        }

        stats
    }

    /// Lines dropped by remove-comments mode
    pub fn lines_removed(&self) -> usize {
        self.lines_in.saturating_sub(self.lines_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Human);
    }

    #[test]
    fn test_run_stats_empty() {
        let stats = RunStats::from_results(&[]);
        assert_eq!(stats, RunStats::default());
        assert_eq!(stats.lines_removed(), 0);
    }

    #[test]
    fn test_run_stats_counts() {
        let reports = vec![
            FileReport::new("a", "out/a", Outcome::Transformed { lines_in: 10, lines_out: 7 }),
            FileReport::new("b", "out/b", Outcome::Transformed { lines_in: 4, lines_out: 4 }),
            FileReport::new("c.png", "out/c.png", Outcome::Copied { reason: "binary".to_string() }),
        ];

        let stats = RunStats::from_results(&reports);

        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.transformed, 2);
        assert_eq!(stats.copied, 1);
        assert_eq!(stats.lines_in, 14);
        assert_eq!(stats.lines_out, 11);
        assert_eq!(stats.lines_removed(), 3);
    }
}
