use clap::{Parser, Subcommand};
use preproc::output::OutputFormat;
use std::path::PathBuf;

/// Command-line interface for the preprocessor
#[derive(Parser)]
#[command(
    name = "preproc",
    about = "Comment-based conditional compilation for text source files",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    /// Set variables (format: name=value)
    #[arg(long = "var", global = true, help = "Set variables (format: name=value, comma-separated)")]
    pub vars: Vec<String>,

    /// Add remap rules (format: pattern=replacement)
    #[arg(long, global = true, help = "Append a remap rule (format: pattern=replacement)")]
    pub remap: Vec<String>,

    /// Drop directives and disabled code instead of commenting it out
    #[arg(long, global = true, help = "Drop directives and disabled code instead of commenting it out")]
    pub remove_comments: bool,

    /// Output format
    #[arg(short = 'f', long, global = true, value_enum, default_value = "human", help = "Report format")]
    pub format: OutputFormat,

    /// Suppress the report
    #[arg(short, long, global = true, help = "Do not print a report")]
    pub quiet: bool,

    /// Show configuration and exit
    #[arg(long, help = "Show effective configuration and exit")]
    pub show_config: bool,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Preprocess source trees into a target directory
    Process {
        /// Source files or directories
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        /// Directory the preprocessed tree is written to (cleared first)
        #[arg(short, long)]
        target: PathBuf,
    },
    /// Preprocess files in place
    Apply {
        /// Files or directories to rewrite
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Preprocess a single file
    Convert {
        /// Input file, or `-` for stdin
        input: PathBuf,
        /// Output file; the result goes to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// File name used for keyword lookup and error messages
        #[arg(long)]
        name: Option<String>,
    },
}

impl Cli {
    /// Parse variable assignments from comma-separated `name=value` strings
    pub fn get_vars(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .flat_map(|s| s.split(','))
            .filter_map(split_assignment)
            .collect()
    }

    /// Parse remap rules; only the first `=` separates pattern from replacement
    pub fn get_remaps(&self) -> Vec<(String, String)> {
        self.remap.iter().map(String::as_str).filter_map(split_assignment).collect()
    }
}

fn split_assignment(s: &str) -> Option<(String, String)> {
    let (key, value) = s.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

// Provide a default implementation for testing
#[cfg(test)]
impl Default for Cli {
    fn default() -> Self {
        Self {
            command: None,
            config: None,
            vars: Vec::new(),
            remap: Vec::new(),
            remove_comments: false,
            format: OutputFormat::default(),
            quiet: false,
            show_config: false,
            verbose: false,
        }
    }
}
