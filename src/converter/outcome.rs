use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What happened to a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Outcome {
    /// Directives were resolved and the result written
    Transformed { lines_in: usize, lines_out: usize },
    /// The file could not be read or written as text and was copied verbatim
    Copied { reason: String },
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Transformed { lines_in, lines_out } if lines_in == lines_out => {
                write!(f, "transformed ({} lines)", lines_in)
            }
            Outcome::Transformed { lines_in, lines_out } => {
                write!(f, "transformed ({} -> {} lines)", lines_in, lines_out)
            }
            Outcome::Copied { reason } => write!(f, "copied ({})", reason),
        }
    }
}

/// Result of converting one input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub outcome: Outcome,
}

impl FileReport {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, outcome: Outcome) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            outcome,
        }
    }

    pub fn is_copied(&self) -> bool {
        matches!(self.outcome, Outcome::Copied { .. })
    }
}
