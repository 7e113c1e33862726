use crate::preprocessor::{KeywordRegistry, Variables};
use crate::remap::{RemapTable, Remapper};
use eyre::{Context, ContextCompat, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How many `extends` hops are followed before giving up
const MAX_EXTENDS_DEPTH: usize = 16;

/// Preprocessor configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Base configuration to extend from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Drop directive lines and unselected code instead of commenting it out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_comments: Option<bool>,
    /// Variables available to directive conditions
    pub vars: Variables,
    /// Custom keywords per file extension
    pub keywords: KeywordRegistry,
    /// Ordered regex replacements applied to every output line
    pub remap: RemapTable,
}

impl Config {
    /// Load configuration from a file path
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => path.clone(),
            None => Self::default_config_path()?,
        };

        if config_file.exists() {
            Self::load_file(&config_file, 0)
        } else if config_path.is_some() {
            Err(eyre::eyre!("Config file not found: {}", config_file.display()))
        } else {
            Ok(Self::default())
        }
    }

    fn load_file(config_file: &Path, depth: usize) -> Result<Self> {
        if depth > MAX_EXTENDS_DEPTH {
            return Err(eyre::eyre!(
                "Config extends chain is deeper than {} at {}",
                MAX_EXTENDS_DEPTH,
                config_file.display()
            ));
        }

        let content = fs::read_to_string(config_file)
            .with_context(|| format!("Failed to read config file: {}", config_file.display()))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_file.display()))?;

        // Handle extends
        if let Some(base_name) = config.extends.take() {
            let base_config = Self::load_base_config(&base_name, config_file, depth)?;
            config = config.merge_with_base(base_config);
        }

        Ok(config)
    }

    /// Load a base configuration by name or path
    fn load_base_config(base_name: &str, current_config_path: &Path, depth: usize) -> Result<Self> {
        if base_name == "default" {
            return Ok(Self::default());
        }

        let base_path = if Path::new(base_name).is_absolute() {
            PathBuf::from(base_name)
        } else {
            current_config_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(base_name)
        };

        if base_path.exists() {
            Self::load_file(&base_path, depth + 1)
        } else {
            Err(eyre::eyre!("Base configuration '{}' not found", base_name))
        }
    }

    /// Merge this configuration over a base configuration
    fn merge_with_base(self, base: Self) -> Self {
        let mut merged = base;

        merged.vars.extend(self.vars);
        merged.keywords.extend(self.keywords);
        merged.remap.extend(self.remap);
        merged.remove_comments = self.remove_comments.or(merged.remove_comments);
        merged.extends = None;

        merged
    }

    /// Get the default configuration file path
    fn default_config_path() -> Result<PathBuf> {
        // Look for config files in order of preference
        let candidates = [".preproc.yaml", ".preproc.yml", "preproc.yaml", "preproc.yml"];

        for candidate in candidates {
            let candidate = PathBuf::from(candidate);
            if candidate.exists() {
                return Ok(candidate);
            }
        }

        // If no config file found, return default location
        let config_dir = dirs::config_local_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .context("Could not determine config directory")?;

        Ok(config_dir.join("preproc").join("config.yaml"))
    }

    /// Whether directives and unselected code are dropped; off unless set
    pub fn remove_comments(&self) -> bool {
        self.remove_comments.unwrap_or(false)
    }

    /// Check keywords and remap patterns before any file is touched
    pub fn validate(&self) -> Result<()> {
        self.keywords.validate()?;
        Remapper::new(&self.remap)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::Keywords;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).expect("Failed to write config");
        path
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.remove_comments());
        assert!(config.vars.is_empty());
        assert!(config.keywords.is_empty());
        assert!(config.remap.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_full_config() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = write_config(
            &dir,
            "preproc.yaml",
            r##"
remove-comments: true
vars:
  mc: 1204
  fabric: true
keywords:
  json:
    if: "#if"
    elseif: "#elseif"
    else: "#else"
    endif: "#endif"
    eval: "#$$"
remap:
  "net\\.old": "net.new"
  "Foo": "Bar"
"##,
        );

        let config = Config::load(Some(&path)).expect("Failed to load config");
        assert!(config.remove_comments());
        assert_eq!(config.vars.get("mc"), Some("1204"));
        assert_eq!(config.vars.get("fabric"), Some("true"));
        assert_eq!(
            config.keywords.for_file(Some("a.json")),
            &Keywords::new("#if", "#elseif", "#else", "#endif", "#$$")
        );
        let remap: Vec<(&str, &str)> = config.remap.iter().collect();
        assert_eq!(remap, vec![(r"net\.old", "net.new"), ("Foo", "Bar")]);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("nope.yaml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_invalid_yaml() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = write_config(&dir, "bad.yaml", "vars: [unclosed");
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_extends_merges_over_base() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        write_config(
            &dir,
            "base.yaml",
            "vars:\n  a: 1\n  b: 2\nremap:\n  x: y\n  p: q\n",
        );
        let path = write_config(
            &dir,
            "child.yaml",
            "extends: base.yaml\nvars:\n  b: 3\nremap:\n  p: r\n  m: n\n",
        );

        let config = Config::load(Some(&path)).expect("Failed to load config");
        assert_eq!(config.extends, None);
        assert_eq!(config.vars.get("a"), Some("1"));
        assert_eq!(config.vars.get("b"), Some("3"));
        let remap: Vec<(&str, &str)> = config.remap.iter().collect();
        assert_eq!(remap, vec![("x", "y"), ("p", "r"), ("m", "n")]);
    }

    #[test]
    fn test_extends_child_can_turn_remove_comments_off() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        write_config(&dir, "base.yaml", "remove-comments: true\n");
        let path = write_config(&dir, "child.yaml", "extends: base.yaml\nremove-comments: false\n");

        let config = Config::load(Some(&path)).expect("Failed to load config");
        assert_eq!(config.remove_comments, Some(false));
        assert!(!config.remove_comments());
    }

    #[test]
    fn test_extends_inherits_remove_comments_when_unset() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        write_config(&dir, "base.yaml", "remove-comments: true\n");
        let path = write_config(&dir, "child.yaml", "extends: base.yaml\nvars:\n  a: 1\n");

        let config = Config::load(Some(&path)).expect("Failed to load config");
        assert!(config.remove_comments());
    }

    #[test]
    fn test_extends_missing_base() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = write_config(&dir, "child.yaml", "extends: missing.yaml\n");
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_extends_cycle_is_bounded() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        write_config(&dir, "a.yaml", "extends: b.yaml\n");
        let path = write_config(&dir, "b.yaml", "extends: a.yaml\n");
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("deeper than"));
    }

    #[test]
    fn test_validate_rejects_bad_remap() {
        let mut config = Config::default();
        config.remap.insert("[", "x");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_shadowing_keywords() {
        let mut config = Config::default();
        config
            .keywords
            .register("txt", Keywords::new("#", "#elseif", "#else", "#endif", "#$$"));
        assert!(config.validate().is_err());
    }
}
