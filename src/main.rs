use clap::Parser;
use eyre::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

mod cli;

use cli::{Cli, Commands};
use preproc::config::Config;
use preproc::converter::{Converter, FileReport, Outcome};
use preproc::output::get_formatter;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    // Load configuration
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Apply CLI overrides to configuration
    apply_cli_overrides(&mut config, &cli);
    config.validate().context("Invalid configuration")?;

    if cli.show_config {
        return show_config(&config);
    }

    log_config(&config);

    let Some(command) = &cli.command else {
        return Err(eyre::eyre!("No command given; try `preproc --help`"));
    };

    let converter = Converter::new(&config)?;

    let reports = match command {
        Commands::Process { sources, target } => converter
            .process_paths(sources.as_slice(), target)
            .context("Preprocessing failed")?,
        Commands::Apply { paths } => converter.apply_paths(paths.as_slice()).context("Preprocessing failed")?,
        Commands::Convert { input, output, name } => {
            match convert_single(&converter, input, output.as_deref(), name.as_deref())? {
                Some(report) => vec![report],
                // The converted text went to stdout; no report
                None => return Ok(()),
            }
        }
    };

    if !cli.quiet {
        let formatter = get_formatter(cli.format);
        println!("{}", formatter.format_results(&reports));
    }

    Ok(())
}

/// Install the stderr log subscriber; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Apply CLI overrides to the configuration
fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    for (name, value) in cli.get_vars() {
        config.vars.insert(name, value);
    }

    for (pattern, replacement) in cli.get_remaps() {
        config.remap.insert(pattern, replacement);
    }

    if cli.remove_comments {
        config.remove_comments = Some(true);
    }
}

/// Record the settings a run uses at debug level
fn log_config(config: &Config) {
    for (name, value) in config.vars.iter() {
        debug!("var {} = {}", name, value);
    }
    for (extension, keywords) in config.keywords.iter() {
        debug!("keywords for .{}: {} / {}", extension, keywords.if_, keywords.eval);
    }
    debug!(
        "{} remap rule(s), remove-comments {}",
        config.remap.len(),
        config.remove_comments()
    );
}

/// Show the effective configuration
fn show_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;

    println!("Effective configuration:");
    println!("{}", yaml);

    Ok(())
}

/// Convert one file, or stdin when `input` is `-`.
///
/// Returns a report when a file was written; `None` when the result went to
/// stdout.
fn convert_single(
    converter: &Converter,
    input: &Path,
    output: Option<&Path>,
    name: Option<&str>,
) -> Result<Option<FileReport>> {
    let from_stdin = input == Path::new("-");

    if let (false, Some(output)) = (from_stdin, output) {
        let file_name = name.or_else(|| input_name(input));
        return converter.convert_file_named(input, output, file_name).map(Some);
    }

    let content = if from_stdin {
        io::read_to_string(io::stdin()).context("Failed to read stdin")?
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))?
    };

    let file_name = name.or_else(|| input_name(input));
    let lines: Vec<&str> = content.lines().collect();
    let converted = converter.convert_lines(&lines, file_name)?;

    match output {
        Some(output) => {
            converter.write_output(output, &converted)?;
            Ok(Some(FileReport::new(
                input,
                output,
                Outcome::Transformed {
                    lines_in: lines.len(),
                    lines_out: converted.len(),
                },
            )))
        }
        None => {
            let text = render(&converted);
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes()).context("Failed to write stdout")?;
            stdout.flush().context("Failed to write stdout")?;
            Ok(None)
        }
    }
}

fn input_name(input: &Path) -> Option<&str> {
    if input == Path::new("-") {
        return None;
    }
    input.file_name().and_then(|n| n.to_str())
}

fn render(lines: &[String]) -> String {
    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_apply_cli_overrides() {
        let mut config = Config::default();
        config.vars.insert("mc", "1165");
        let cli = Cli {
            vars: vec!["mc=1204,fabric=1".to_string()],
            remap: vec!["a=b".to_string()],
            remove_comments: true,
            ..Default::default()
        };

        apply_cli_overrides(&mut config, &cli);

        assert_eq!(config.vars.get("mc"), Some("1204"));
        assert_eq!(config.vars.get("fabric"), Some("1"));
        assert_eq!(config.remap.iter().collect::<Vec<_>>(), vec![("a", "b")]);
        assert!(config.remove_comments());
    }

    #[test]
    fn test_apply_cli_overrides_appends_remap() {
        let mut config = Config::default();
        config.remap.insert("x", "y");
        let cli = Cli {
            remap: vec!["p=q".to_string()],
            ..Default::default()
        };

        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config.remap.iter().collect::<Vec<_>>(), vec![("x", "y"), ("p", "q")]);
    }

    #[test]
    fn test_log_config_without_subscriber() {
        let mut config = Config::default();
        config.vars.insert("mc", 1204);
        config.keywords.register(
            "json",
            preproc::preprocessor::Keywords::new("#if", "#elseif", "#else", "#endif", "#$$"),
        );
        config.remap.insert("a", "b");
        log_config(&config);
    }

    #[test]
    fn test_render() {
        assert_eq!(render(&[]), "");
        assert_eq!(render(&["a".to_string(), "".to_string()]), "a\n\n");
    }

    #[test]
    fn test_input_name() {
        assert_eq!(input_name(Path::new("-")), None);
        assert_eq!(input_name(Path::new("src/A.java")), Some("A.java"));
    }

    #[test]
    fn test_convert_single_with_name_override() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let input = dir.path().join("data.in");
        fs::write(&input, "#if zero\nx\n#endif\n").expect("Failed to write input");
        let output = dir.path().join("data.out");

        let mut config = Config::default();
        config.vars.insert("zero", 0);
        config.keywords.register(
            "json",
            preproc::preprocessor::Keywords::new("#if", "#elseif", "#else", "#endif", "#$$"),
        );
        let converter = Converter::new(&config).expect("Failed to create converter");

        let report = convert_single(&converter, &input, Some(&output), Some("x.json"))
            .expect("conversion failed")
            .expect("expected a report");

        assert!(!report.is_copied());
        assert_eq!(
            fs::read_to_string(&output).expect("Failed to read output"),
            "#if zero\n#$$ x\n#endif\n"
        );
    }
}
