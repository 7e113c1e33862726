use super::{OutputFormatter, RunStats};
use crate::converter::{FileReport, Outcome};
use std::io::IsTerminal;
use std::path::Path;

/// Human-readable output formatter
#[derive(Debug, Default)]
pub struct HumanFormatter {
    use_colors: bool,
}

impl HumanFormatter {
    /// Create a new human formatter
    pub fn new() -> Self {
        Self {
            use_colors: Self::should_use_colors(),
        }
    }

    /// Create a new human formatter with explicit color setting
    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Determine if colors should be used based on environment
    fn should_use_colors() -> bool {
        std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err()
    }

    /// Format a file path with appropriate color
    fn format_path(&self, path: &Path) -> String {
        if self.use_colors {
            format!("\x1b[1m{}\x1b[0m", path.display()) // Bold
        } else {
            path.display().to_string()
        }
    }

    fn format_copied(&self, reason: &str) -> String {
        if self.use_colors {
            format!("\x1b[33mcopied\x1b[0m \x1b[90m({})\x1b[0m", reason) // Yellow, gray
        } else {
            format!("copied ({})", reason)
        }
    }

    /// Format statistics summary
    fn format_stats(&self, stats: &RunStats) -> String {
        let plural = |n: usize| if n == 1 { "" } else { "s" };
        let mut summary = format!(
            "Preprocessed {} file{}",
            stats.total_files,
            plural(stats.total_files)
        );

        let mut parts = vec![format!("{} transformed", stats.transformed)];
        if stats.copied > 0 {
            parts.push(format!("{} copied verbatim", stats.copied));
        }
        if stats.lines_removed() > 0 {
            let removed = stats.lines_removed();
            parts.push(format!("{} line{} removed", removed, plural(removed)));
        }
        summary.push_str(&format!(" ({})", parts.join(", ")));

        if self.use_colors {
            format!("\x1b[32m{}\x1b[0m", summary) // Green
        } else {
            summary
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_results(&self, reports: &[FileReport]) -> String {
        let mut output = Vec::new();
        let stats = RunStats::from_results(reports);

        // Only fallbacks are worth a line of their own
        for report in reports {
            if let Outcome::Copied { reason } = &report.outcome {
                output.push(format!("{}: {}", self.format_path(&report.input), self.format_copied(reason)));
            }
        }

        output.push(self.format_stats(&stats));
        output.join("\n")
    }
}
