//! Run log for sniffer
//!
//! Records the events of a run (config loading, files, fix passes, contained
//! sniff failures, edit conflicts) for debugging. Every function is a no-op
//! until [`init_logger`] has been called.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};

use crate::fix::FixStatus;

/// Global logger instance
static LOGGER: Mutex<Option<RunLogger>> = Mutex::new(None);

/// Something worth recording during a run
#[derive(Debug, Clone)]
pub enum RunEvent<'a> {
    ConfigLoaded { path: &'a Path, sniffs: usize },
    FileStarted { path: &'a Path, tokens: usize },
    PassStarted { path: &'a Path, pass: usize },
    SniffFailed { path: &'a Path, sniff: &'a str, position: usize, error: String },
    /// A replacement rejected because its token was already replaced
    EditConflict { path: &'a Path, sniff: &'a str, position: usize },
    ChangesetRolledBack { path: &'a Path, sniff: &'a str },
    EditsRejected { path: &'a Path, error: String },
    FixFinished { path: &'a Path, status: FixStatus, passes: usize, remaining: usize },
    FileFailed { error: String },
    RunFinished { files: usize, diagnostics: usize, failures: usize },
}

impl RunEvent<'_> {
    /// Events that open a new block in the log
    fn banner(&self) -> Option<&'static str> {
        match self {
            RunEvent::ConfigLoaded { .. } => Some("CONFIGURATION"),
            RunEvent::RunFinished { .. } => Some("RUN COMPLETE"),
            _ => None,
        }
    }

    fn is_problem(&self) -> bool {
        matches!(
            self,
            RunEvent::SniffFailed { .. }
                | RunEvent::EditConflict { .. }
                | RunEvent::ChangesetRolledBack { .. }
                | RunEvent::EditsRejected { .. }
                | RunEvent::FileFailed { .. }
        )
    }
}

impl fmt::Display for RunEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::ConfigLoaded { path, sniffs } => {
                write!(f, "config {} enables {} sniffs", path.display(), sniffs)
            }
            RunEvent::FileStarted { path, tokens } => {
                write!(f, "[{}] {} tokens", path.display(), tokens)
            }
            RunEvent::PassStarted { path, pass } => write!(f, "[{}] fix pass {}", path.display(), pass),
            RunEvent::SniffFailed { path, sniff, position, error } => write!(
                f,
                "SNIFF FAILED: {} in {} at token {}: {}",
                sniff,
                path.display(),
                position,
                error
            ),
            RunEvent::EditConflict { path, sniff, position } => write!(
                f,
                "CONFLICT: {} in {} proposed a second replacement for token {}",
                sniff,
                path.display(),
                position
            ),
            RunEvent::ChangesetRolledBack { path, sniff } => write!(
                f,
                "ROLLBACK: {} left a changeset open in {}",
                sniff,
                path.display()
            ),
            RunEvent::EditsRejected { path, error } => {
                write!(f, "[{}] failed to apply edits: {}", path.display(), error)
            }
            RunEvent::FixFinished { path, status, passes, remaining } => write!(
                f,
                "[{}] fix {} after {} passes, {} remaining",
                path.display(),
                status,
                passes,
                remaining
            ),
            RunEvent::FileFailed { error } => write!(f, "FILE FAILED: {}", error),
            RunEvent::RunFinished { files, diagnostics, failures } => write!(
                f,
                "{} files, {} diagnostics, {} sniff failures",
                files, diagnostics, failures
            ),
        }
    }
}

/// Logger for sniff runs
pub struct RunLogger {
    file: File,
    path: PathBuf,
    started: DateTime<Local>,
    problems: usize,
}

impl RunLogger {
    /// Create a new logger writing to the specified path
    pub fn new(log_path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_path)?;

        Ok(Self {
            file,
            path: log_path.to_path_buf(),
            started: Local::now(),
            problems: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Failures, conflicts and rollbacks recorded so far
    pub fn problems(&self) -> usize {
        self.problems
    }

    /// Write a log message
    pub fn log(&mut self, message: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let _ = writeln!(self.file, "[{}] {}", timestamp, message);
        let _ = self.file.flush();
    }

    pub fn record(&mut self, event: &RunEvent<'_>) {
        if event.is_problem() {
            self.problems += 1;
        }
        if let Some(title) = event.banner() {
            self.log(&"=".repeat(60));
            self.log(title);
        }
        self.log(&event.to_string());
        if let RunEvent::RunFinished { .. } = event {
            let elapsed = Local::now() - self.started;
            self.log(&format!(
                "{} problems logged in {} ms",
                self.problems,
                elapsed.num_milliseconds()
            ));
        }
    }
}

/// Initialize the global logger
pub fn init_logger(log_path: Option<&Path>) -> std::io::Result<PathBuf> {
    let path = log_path.map(|p| p.to_path_buf()).unwrap_or_else(|| {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        PathBuf::from(format!("/tmp/sniffer-{}.log", timestamp))
    });

    let logger = RunLogger::new(&path)?;

    if let Ok(mut guard) = LOGGER.lock() {
        *guard = Some(logger);
    }

    Ok(path)
}

/// Stop logging and close the log file
pub fn shutdown_logger() {
    if let Ok(mut guard) = LOGGER.lock() {
        *guard = None;
    }
}

/// Record a run event with the global logger
pub fn record(event: RunEvent<'_>) {
    if let Ok(mut guard) = LOGGER.lock() {
        if let Some(ref mut logger) = *guard {
            logger.record(&event);
        }
    }
}

/// Log a free-form message to the global logger
pub fn log(message: &str) {
    if let Ok(mut guard) = LOGGER.lock() {
        if let Some(ref mut logger) = *guard {
            logger.log(message);
        }
    }
}

/// Check if logging is enabled
pub fn is_enabled() -> bool {
    if let Ok(guard) = LOGGER.lock() {
        guard.is_some()
    } else {
        false
    }
}
