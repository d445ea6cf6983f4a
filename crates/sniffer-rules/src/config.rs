//! Configuration file support for sniffer
//!
//! Loads `.sniffer.toml` from a directory or its parents, or from an explicit
//! path, and turns it into a configured [`SniffRegistry`].

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::fix::DEFAULT_MAX_PASSES;
use crate::registry::SniffRegistry;
use crate::sniff::{ConfigValue, SniffError};

pub const CONFIG_FILE_NAME: &str = ".sniffer.toml";

/// Errors that can occur while loading or applying configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unknown sniff `{0}`")]
    UnknownSniff(String),

    #[error("Sniff `{sniff}`: {source}")]
    Sniff {
        sniff: String,
        #[source]
        source: SniffError,
    },

    #[error("Unsupported value for `{sniff}.{option}`: only booleans, strings, integers and string arrays are allowed")]
    UnsupportedValue { sniff: String, option: String },

    #[error("Invalid exclude pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Configuration file structure
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RulesetConfig {
    pub run: RunConfig,
    pub paths: PathsConfig,
    /// Option tables keyed by sniff code
    pub sniffs: BTreeMap<String, toml::Table>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Fix pass cap
    pub max_fix_passes: Option<usize>,
    /// If set, only these sniffs will run
    pub enabled: Option<Vec<String>>,
    /// Sniffs to exclude (applied after enabled)
    pub disabled: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Glob patterns to exclude from processing
    pub exclude: Vec<String>,
}

impl RulesetConfig {
    /// Load config searching from the given directory upward
    pub fn load_from(start_dir: &Path) -> Result<Option<(RulesetConfig, PathBuf)>, ConfigError> {
        let mut current = Some(start_dir);

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                let config = Self::load_path(&config_path)?;
                return Ok(Some((config, config_path)));
            }
            current = dir.parent();
        }

        Ok(None)
    }

    /// Load config from a specific path
    pub fn load_path(path: &Path) -> Result<RulesetConfig, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn max_fix_passes(&self) -> usize {
        self.run.max_fix_passes.unwrap_or(DEFAULT_MAX_PASSES)
    }

    /// Compute the effective set of enabled sniffs
    pub fn effective_sniffs(&self, all_sniffs: &[&str]) -> Result<HashSet<String>, ConfigError> {
        let known: HashSet<&str> = all_sniffs.iter().copied().collect();
        let named = self
            .run
            .enabled
            .iter()
            .flatten()
            .chain(&self.run.disabled)
            .chain(self.sniffs.keys());
        for name in named {
            if !known.contains(name.as_str()) {
                return Err(ConfigError::UnknownSniff(name.clone()));
            }
        }

        let mut sniffs: HashSet<String> = match &self.run.enabled {
            Some(enabled) => enabled.iter().cloned().collect(),
            None => all_sniffs.iter().map(|s| s.to_string()).collect(),
        };
        for disabled in &self.run.disabled {
            sniffs.remove(disabled);
        }
        Ok(sniffs)
    }

    /// Built-in registry restricted to the enabled sniffs, with options applied
    pub fn build_registry(&self) -> Result<SniffRegistry, ConfigError> {
        let mut registry = SniffRegistry::builtin();
        let enabled = self.effective_sniffs(&registry.codes())?;
        registry.retain(|code| enabled.contains(code));

        for (sniff, options) in &self.sniffs {
            if !registry.contains(sniff) {
                // Options for a disabled sniff are accepted and ignored
                continue;
            }
            for (option, value) in options {
                let value = config_value(value).ok_or_else(|| ConfigError::UnsupportedValue {
                    sniff: sniff.clone(),
                    option: option.clone(),
                })?;
                registry.configure(sniff, option, &value)?;
            }
        }

        Ok(registry)
    }

    /// Compiled exclude patterns
    pub fn exclude_patterns(&self) -> Result<Vec<glob::Pattern>, ConfigError> {
        self.paths
            .exclude
            .iter()
            .map(|pattern| {
                glob::Pattern::new(pattern).map_err(|source| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect()
    }
}

/// Check if a path matches any exclude pattern, by full path or file name
pub fn is_excluded(patterns: &[glob::Pattern], path: &Path) -> bool {
    let path_str = path.to_string_lossy();
    patterns.iter().any(|pattern| {
        pattern.matches(&path_str)
            || path
                .file_name()
                .is_some_and(|name| pattern.matches(&name.to_string_lossy()))
            || path
                .components()
                .any(|c| pattern.matches(&c.as_os_str().to_string_lossy()))
    })
}

fn config_value(value: &toml::Value) -> Option<ConfigValue> {
    match value {
        toml::Value::Boolean(b) => Some(ConfigValue::Bool(*b)),
        toml::Value::String(s) => Some(ConfigValue::String(s.clone())),
        toml::Value::Integer(i) => Some(ConfigValue::Number(*i)),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(ConfigValue::Array),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_config(dir: &Path, content: &str) {
        fs::write(dir.join(CONFIG_FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_load_basic_config() {
        let temp = TempDir::new().unwrap();
        create_config(
            temp.path(),
            r#"
[run]
max_fix_passes = 7
enabled = ["Types.PropertyType", "Naming.GlobalQualification"]
disabled = ["Types.PropertyType"]

[paths]
exclude = ["vendor", "*.generated.php"]

[sniffs."Naming.GlobalQualification"]
known_functions = ["strlen", "count"]
allow_imported = false
"#,
        );

        let (config, path) = RulesetConfig::load_from(temp.path()).unwrap().unwrap();
        assert_eq!(path, temp.path().join(CONFIG_FILE_NAME));
        assert_eq!(config.max_fix_passes(), 7);

        let registry = config.build_registry().unwrap();
        assert_eq!(registry.codes(), vec!["Naming.GlobalQualification"]);

        let patterns = config.exclude_patterns().unwrap();
        assert!(is_excluded(&patterns, Path::new("src/vendor/lib.php")));
        assert!(is_excluded(&patterns, Path::new("src/a.generated.php")));
        assert!(!is_excluded(&patterns, Path::new("src/a.php")));
    }

    #[test]
    fn test_load_from_parent_directory() {
        let temp = TempDir::new().unwrap();
        create_config(temp.path(), "");
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let (config, path) = RulesetConfig::load_from(&nested).unwrap().unwrap();
        assert_eq!(path, temp.path().join(CONFIG_FILE_NAME));
        assert!(config.run.enabled.is_none());
        assert_eq!(config.max_fix_passes(), DEFAULT_MAX_PASSES);
        assert_eq!(config.build_registry().unwrap().len(), SniffRegistry::builtin().len());
    }

    #[test]
    fn test_unknown_sniff_is_rejected() {
        let config: RulesetConfig = toml::from_str("[run]\ndisabled = [\"Nope.Nothing\"]\n").unwrap();
        assert!(matches!(config.build_registry(), Err(ConfigError::UnknownSniff(_))));
    }

    #[test]
    fn test_invalid_option_values() {
        let config: RulesetConfig =
            toml::from_str("[sniffs.\"Types.PropertyType\"]\nvalidate_types = \"yes\"\n").unwrap();
        assert!(matches!(config.build_registry(), Err(ConfigError::Sniff { .. })));

        let config: RulesetConfig =
            toml::from_str("[sniffs.\"Types.PropertyType\"]\nvalidate_types = 1.5\n").unwrap();
        assert!(matches!(
            config.build_registry(),
            Err(ConfigError::UnsupportedValue { .. })
        ));

        let config: RulesetConfig = toml::from_str(
            "[sniffs.\"Naming.GlobalQualification\"]\nfunction_patterns = [\"(unclosed\"]\n",
        )
        .unwrap();
        assert!(matches!(config.build_registry(), Err(ConfigError::Sniff { .. })));
    }

    #[test]
    fn test_parse_error_reports_path() {
        let temp = TempDir::new().unwrap();
        create_config(temp.path(), "[run\n");
        let err = RulesetConfig::load_path(&temp.path().join(CONFIG_FILE_NAME)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_missing_config() {
        let temp = TempDir::new().unwrap();
        let found = RulesetConfig::load_from(temp.path()).unwrap();
        // A config further up the real filesystem may exist; only check the temp dir itself
        if let Some((_, path)) = found {
            assert!(!path.starts_with(temp.path()));
        }
    }
}
