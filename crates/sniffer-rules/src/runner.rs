//! Per-file check and fix driving
//!
//! A [`Runner`] holds a configured registry as a read-only template. Every
//! rayon worker forks its own registry from it, so sniff state is never
//! shared between files processed in parallel.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use sniffer_core::{PhpTokenizer, TokenStore, Tokenize};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::{is_excluded, ConfigError, RulesetConfig};
use crate::fix::{fix, FixStatus, DEFAULT_MAX_PASSES};
use crate::logging::{self, RunEvent};
use crate::registry::{SniffFailure, SniffRegistry};
use crate::sink::{Diagnostic, Severity};
use crate::sniff::FileIdentity;

/// Errors that abort processing of one file
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What to do with each file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Check,
    /// Fix, writing changed files back when `write` is set
    Fix { write: bool },
}

/// Fix outcome attached to a [`FileReport`]
#[derive(Debug, Clone, Serialize)]
pub struct FixOutcome {
    pub status: FixStatus,
    pub passes: usize,
    pub edits_applied: usize,
    pub conflicts: usize,
    pub changed: bool,
    #[serde(skip)]
    pub source: String,
}

/// Result of processing one file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    /// Check diagnostics, or the diagnostics remaining after a fix
    pub diagnostics: Vec<Diagnostic>,
    pub failures: Vec<SniffFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<FixOutcome>,
}

impl FileReport {
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }
}

/// Result of processing a set of paths
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub files: Vec<FileReport>,
    #[serde(serialize_with = "serialize_errors")]
    pub errors: Vec<RunError>,
}

fn serialize_errors<S: serde::Serializer>(errors: &[RunError], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(errors.iter().map(|e| e.to_string()))
}

impl RunSummary {
    pub fn diagnostic_count(&self) -> usize {
        self.files.iter().map(|f| f.diagnostics.len()).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.files.iter().map(|f| f.failures.len()).sum()
    }

    /// Files a fix left without converging
    pub fn unconverged(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| f.fix.as_ref().is_some_and(|fix| !fix.status.is_converged()))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Drives checks and fixes over sources and paths
pub struct Runner {
    registry: SniffRegistry,
    max_fix_passes: usize,
    exclude: Vec<glob::Pattern>,
    tokenizer: Arc<dyn Tokenize>,
}

impl Runner {
    /// Runner over `registry` with the bundled tokenizer and default pass cap
    pub fn new(registry: SniffRegistry) -> Self {
        Self {
            registry,
            max_fix_passes: DEFAULT_MAX_PASSES,
            exclude: Vec::new(),
            tokenizer: Arc::new(PhpTokenizer),
        }
    }

    /// Runner configured from a loaded config file
    pub fn from_config(config: &RulesetConfig, config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let registry = config.build_registry()?;
        if let Some(path) = config_path {
            logging::record(RunEvent::ConfigLoaded { path, sniffs: registry.len() });
        }
        Ok(Self {
            registry,
            max_fix_passes: config.max_fix_passes(),
            exclude: config.exclude_patterns()?,
            tokenizer: Arc::new(PhpTokenizer),
        })
    }

    pub fn with_max_fix_passes(mut self, max_fix_passes: usize) -> Self {
        self.max_fix_passes = max_fix_passes;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenize>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn registry(&self) -> &SniffRegistry {
        &self.registry
    }

    /// Check one in-memory source
    pub fn check_source(&self, path: &Path, source: &str) -> FileReport {
        self.check_with(&mut self.registry.fork(), path, source)
    }

    /// Fix one in-memory source
    pub fn fix_source(&self, path: &Path, source: &str) -> FileReport {
        self.fix_with(&mut self.registry.fork(), path, source)
    }

    fn check_with(&self, registry: &mut SniffRegistry, path: &Path, source: &str) -> FileReport {
        let store = TokenStore::tokenize(self.tokenizer.as_ref(), source);
        logging::record(RunEvent::FileStarted { path, tokens: store.len() });
        let report = registry.run_pass(&store, &FileIdentity::new(path), None);
        FileReport {
            path: path.to_path_buf(),
            diagnostics: report.diagnostics,
            failures: report.failures,
            fix: None,
        }
    }

    fn fix_with(&self, registry: &mut SniffRegistry, path: &Path, source: &str) -> FileReport {
        let report = fix(
            registry,
            &FileIdentity::new(path),
            source,
            self.tokenizer.as_ref(),
            self.max_fix_passes,
        );
        let changed = report.changed(source);
        FileReport {
            path: path.to_path_buf(),
            diagnostics: report.remaining,
            failures: report.failures,
            fix: Some(FixOutcome {
                status: report.status,
                passes: report.passes,
                edits_applied: report.edits_applied,
                conflicts: report.conflicts,
                changed,
                source: report.source,
            }),
        }
    }

    /// PHP files under `paths`, minus excluded ones, in a stable order
    pub fn collect_files(&self, paths: &[&Path]) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for path in paths {
            if path.is_file() {
                files.push(path.to_path_buf());
            } else if path.is_dir() {
                for entry in WalkDir::new(path)
                    .follow_links(true)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                {
                    let entry_path = entry.path();
                    if entry_path.is_file()
                        && entry_path.extension().is_some_and(|e| e == "php")
                        && !is_excluded(&self.exclude, entry_path)
                    {
                        files.push(entry_path.to_path_buf());
                    }
                }
            }
        }

        files
    }

    /// Process every PHP file under `paths` in parallel
    pub fn process_paths(&self, paths: &[&Path], mode: Mode) -> RunSummary {
        let files = self.collect_files(paths);

        let results: Vec<Result<FileReport, RunError>> = files
            .par_iter()
            .map_init(
                || self.registry.fork(),
                |registry, path| self.process_file(registry, path, mode),
            )
            .collect();

        let mut summary = RunSummary::default();
        for result in results {
            match result {
                Ok(report) => summary.files.push(report),
                Err(error) => {
                    logging::record(RunEvent::FileFailed { error: error.to_string() });
                    summary.errors.push(error);
                }
            }
        }

        logging::record(RunEvent::RunFinished {
            files: summary.files.len(),
            diagnostics: summary.diagnostic_count(),
            failures: summary.failure_count(),
        });
        summary
    }

    fn process_file(
        &self,
        registry: &mut SniffRegistry,
        path: &Path,
        mode: Mode,
    ) -> Result<FileReport, RunError> {
        let source = fs::read_to_string(path).map_err(|source| RunError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match mode {
            Mode::Check => Ok(self.check_with(registry, path, &source)),
            Mode::Fix { write } => {
                let report = self.fix_with(registry, path, &source);
                if let Some(outcome) = report.fix.as_ref().filter(|f| write && f.changed) {
                    fs::write(path, &outcome.source).map_err(|source| RunError::Write {
                        path: path.to_path_buf(),
                        source,
                    })?;
                }
                Ok(report)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const UNTYPED: &str = "<?php\nclass C {\n    /** @var int */\n    public $x;\n}\n";

    fn runner() -> Runner {
        let mut registry = SniffRegistry::builtin();
        registry.retain(|code| code == "Types.PropertyType");
        Runner::new(registry)
    }

    #[test]
    fn test_check_source() {
        let report = runner().check_source(Path::new("a.php"), UNTYPED);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.diagnostics[0].line, 4);
        assert!(report.fix.is_none());
    }

    #[test]
    fn test_fix_source() {
        let report = runner().fix_source(Path::new("a.php"), UNTYPED);
        let fix = report.fix.unwrap();
        assert_eq!(fix.status, FixStatus::Converged);
        assert!(fix.changed);
        assert!(fix.source.contains("public int $x;"));
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_process_paths_writes_fixes() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("vendor")).unwrap();
        fs::write(src.join("a.php"), UNTYPED).unwrap();
        fs::write(src.join("b.php"), "<?php\nclass D {\n    public int $y;\n}\n").unwrap();
        fs::write(src.join("vendor").join("c.php"), UNTYPED).unwrap();
        fs::write(src.join("notes.txt"), UNTYPED).unwrap();

        let config: RulesetConfig = toml::from_str(
            "[run]\nenabled = [\"Types.PropertyType\"]\n[paths]\nexclude = [\"vendor\"]\n",
        )
        .unwrap();
        let runner = Runner::from_config(&config, None).unwrap();

        let files = runner.collect_files(&[src.as_path()]);
        assert_eq!(files, vec![src.join("a.php"), src.join("b.php")]);

        let summary = runner.process_paths(&[src.as_path()], Mode::Check);
        assert_eq!(summary.files.len(), 2);
        assert_eq!(summary.diagnostic_count(), 1);

        let summary = runner.process_paths(&[src.as_path()], Mode::Fix { write: true });
        assert!(summary.errors.is_empty());
        assert_eq!(summary.unconverged().count(), 0);
        assert_eq!(summary.diagnostic_count(), 0);
        assert!(fs::read_to_string(src.join("a.php")).unwrap().contains("public int $x;"));
        assert_eq!(fs::read_to_string(src.join("vendor").join("c.php")).unwrap(), UNTYPED);

        let json = summary.to_json().unwrap();
        assert!(json.contains("\"status\": \"converged\""));
    }

    #[test]
    fn test_dry_run_leaves_files() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.php");
        fs::write(&file, UNTYPED).unwrap();

        let summary = runner().process_paths(&[file.as_path()], Mode::Fix { write: false });
        assert!(summary.files[0].fix.as_ref().unwrap().changed);
        assert_eq!(fs::read_to_string(&file).unwrap(), UNTYPED);
    }

    #[test]
    fn test_unreadable_file_is_reported() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.php");
        fs::write(&file, [0xff, 0xfe, 0x00]).unwrap();

        let summary = runner().process_paths(&[file.as_path()], Mode::Check);
        assert!(summary.files.is_empty());
        assert!(matches!(summary.errors[0], RunError::Read { .. }));
    }
}
