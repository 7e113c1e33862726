use super::{FileReport, Outcome};
use crate::config::Config;
use crate::preprocessor::{KeywordRegistry, ParseError, Preprocessor, Variables};
use crate::remap::Remapper;
use eyre::{Context, Result};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Converts files: resolves directives, then applies the remap table.
///
/// A converter only holds read-only settings, so one instance can be shared
/// by all worker threads of a batch.
#[derive(Debug, Clone)]
pub struct Converter {
    vars: Variables,
    keywords: KeywordRegistry,
    remove_comments: bool,
    remapper: Remapper,
}

impl Converter {
    /// Create a converter from a configuration
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            vars: config.vars.clone(),
            keywords: config.keywords.clone(),
            remove_comments: config.remove_comments(),
            remapper: Remapper::new(&config.remap)?,
        })
    }

    fn preprocessor(&self) -> Preprocessor<'_> {
        Preprocessor::new(&self.vars, &self.keywords).with_remove_comments(self.remove_comments)
    }

    /// Convert lines in memory; `file_name` selects keywords and is used in errors
    pub fn convert_lines<S: AsRef<str>>(&self, lines: &[S], file_name: Option<&str>) -> Result<Vec<String>, ParseError> {
        let lines = self.preprocessor().convert_source(lines, file_name)?;
        if self.remapper.is_empty() {
            return Ok(lines);
        }
        Ok(self.remapper.convert_source(&lines))
    }

    /// Write converted lines to `output`, creating parent directories.
    ///
    /// The file is replaced only once every line has been written.
    pub fn write_output(&self, output: &Path, lines: &[String]) -> Result<()> {
        write_lines(None, output, lines).with_context(|| format!("Failed to write {}", output.display()))
    }

    /// Convert a single file into `output`.
    ///
    /// Directive errors are returned. If the file cannot be read or written
    /// as text it is copied to `output` unchanged instead.
    pub fn convert_file(&self, input: &Path, output: &Path) -> Result<FileReport> {
        self.convert_file_named(input, output, input.file_name().and_then(|n| n.to_str()))
    }

    /// Like [`Converter::convert_file`], with `file_name` standing in for the
    /// input's own name
    pub fn convert_file_named(&self, input: &Path, output: &Path, file_name: Option<&str>) -> Result<FileReport> {
        let content = match fs::read_to_string(input) {
            Ok(content) => content,
            Err(e) => return self.copy_verbatim(input, output, e),
        };

        let lines: Vec<&str> = content.lines().collect();
        let converted = self.convert_lines(&lines, file_name)?;

        if let Err(e) = write_lines(Some(input), output, &converted) {
            return self.copy_verbatim(input, output, e);
        }

        debug!("Converted {} -> {}", input.display(), output.display());
        Ok(FileReport::new(
            input,
            output,
            Outcome::Transformed {
                lines_in: lines.len(),
                lines_out: converted.len(),
            },
        ))
    }

    fn copy_verbatim(&self, input: &Path, output: &Path, cause: io::Error) -> Result<FileReport> {
        warn!("Copying {} unchanged: {}", input.display(), cause);

        if !is_same_file(input, output) {
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
            fs::copy(input, output)
                .with_context(|| format!("Failed to copy {} to {}", input.display(), output.display()))?;
        }

        Ok(FileReport::new(input, output, Outcome::Copied { reason: cause.to_string() }))
    }

    /// Convert every file under `sources` into `target`, keeping relative paths.
    ///
    /// The target directory is cleared first. When several sources contain the
    /// same relative path, the earliest source wins.
    pub fn process_paths<P: AsRef<Path>>(&self, sources: &[P], target: &Path) -> Result<Vec<FileReport>> {
        if sources.is_empty() {
            return Err(eyre::eyre!("No sources defined"));
        }

        for source in sources {
            let source = source.as_ref();
            if !source.exists() {
                return Err(eyre::eyre!("Path does not exist: {}", source.display()));
            }
            if is_within(source, target) {
                return Err(eyre::eyre!(
                    "Target {} must not contain source {}",
                    target.display(),
                    source.display()
                ));
            }
        }

        if target.exists() {
            fs::remove_dir_all(target)
                .with_context(|| format!("Failed to clear target directory {}", target.display()))?;
        }

        let mut seen = HashSet::new();
        let mut jobs = Vec::new();
        for source in sources {
            for (input, relative) in collect_files(source.as_ref())? {
                if seen.insert(relative.clone()) {
                    jobs.push((input, target.join(relative)));
                }
            }
        }

        let reports = self.convert_files_parallel(&jobs)?;
        write_summary(sources, target, reports.len())?;

        info!(
            "Preprocessed {} files into {} ({} copied verbatim)",
            reports.len(),
            target.display(),
            reports.iter().filter(|r| r.is_copied()).count()
        );
        Ok(reports)
    }

    /// Convert every file under `paths` in place
    pub fn apply_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<FileReport>> {
        let mut jobs = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                return Err(eyre::eyre!("Path does not exist: {}", path.display()));
            }
            for (input, _) in collect_files(path)? {
                jobs.push((input.clone(), input));
            }
        }

        let reports = self.convert_files_parallel(&jobs)?;
        info!("Applied preprocessing to {} files", reports.len());
        Ok(reports)
    }

    /// Convert input/output pairs in parallel
    pub fn convert_files_parallel(&self, jobs: &[(PathBuf, PathBuf)]) -> Result<Vec<FileReport>> {
        jobs.par_iter()
            .map(|(input, output)| self.convert_file(input, output))
            .collect()
    }
}

/// Regular files under `root` with their path relative to it.
///
/// A plain file is returned with its own name as the relative path.
fn collect_files(root: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    if root.is_file() {
        let name = root
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| eyre::eyre!("Invalid source file: {}", root.display()))?;
        return Ok(vec![(root.to_path_buf(), name)]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root)?.to_path_buf();
        files.push((entry.path().to_path_buf(), relative));
    }
    Ok(files)
}

/// Write lines with `\n` terminators, replacing `output` only once everything
/// has been written. Permissions are copied from `input` when given.
fn write_lines(input: Option<&Path>, output: &Path, lines: &[String]) -> io::Result<()> {
    let dir = match output.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(&mut tmp);
        for line in lines {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }

    if let Some(Ok(metadata)) = input.map(fs::metadata) {
        fs::set_permissions(tmp.path(), metadata.permissions())?;
    }

    tmp.persist(output).map_err(|e| e.error)?;
    Ok(())
}

/// Record what a batch did next to its target directory
fn write_summary<P: AsRef<Path>>(sources: &[P], target: &Path, total: usize) -> Result<()> {
    let Some(name) = target.file_name() else {
        return Ok(());
    };
    let parent = target.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut summary_name = name.to_os_string();
    summary_name.push(".txt");
    let summary = parent.join(summary_name);

    let sources: Vec<String> = sources.iter().map(|s| s.as_ref().display().to_string()).collect();
    let content = format!(
        "Target: {}\nSources: [{}]\nTotal Files: {}\n",
        target.display(),
        sources.join(", "),
        total
    );

    fs::create_dir_all(parent).with_context(|| format!("Failed to create directory {}", parent.display()))?;
    fs::write(&summary, content).with_context(|| format!("Failed to write summary {}", summary.display()))?;
    Ok(())
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Whether `path` is `dir` or lies beneath it
fn is_within(path: &Path, dir: &Path) -> bool {
    match (fs::canonicalize(path), fs::canonicalize(dir)) {
        (Ok(path), Ok(dir)) => path.starts_with(dir),
        _ => false,
    }
}
