//! The sniff contract
//!
//! A sniff declares the token kinds it wants to see and is invoked once per
//! matching position. Sniffs are created once per run; per-file bookkeeping
//! lives in instance fields that are cleared by [`Sniff::reset`] whenever the
//! file under analysis changes.

use std::path::{Path, PathBuf};

use sniffer_core::{EditError, TokenKind};
use thiserror::Error;

use crate::context::SniffContext;

/// Errors raised by a sniff, either while processing a token or while being
/// configured
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SniffError {
    #[error("unexpected token structure at position {position}: {reason}")]
    UnexpectedStructure { position: usize, reason: String },

    #[error("unknown option `{0}`")]
    UnknownOption(String),

    #[error("invalid value for option `{name}`: {reason}")]
    InvalidOption { name: String, reason: String },

    #[error(transparent)]
    Edit(#[from] EditError),
}

impl SniffError {
    pub fn unexpected(position: usize, reason: impl Into<String>) -> Self {
        Self::UnexpectedStructure {
            position,
            reason: reason.into(),
        }
    }

    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Identity of the file being analysed
///
/// The revision is bumped for every fix pass over the same path, so sniffs
/// that key state on the file see every pass as a fresh file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub path: PathBuf,
    pub revision: u32,
}

impl FileIdentity {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            revision: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identity of the next fix pass over the same file
    pub fn next_revision(&self) -> Self {
        Self {
            path: self.path.clone(),
            revision: self.revision + 1,
        }
    }
}

/// Configuration value for sniff options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Bool(bool),
    String(String),
    Number(i64),
    Array(Vec<String>),
}

impl ConfigValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Bool(_) => "bool",
            ConfigValue::String(_) => "string",
            ConfigValue::Number(_) => "number",
            ConfigValue::Array(_) => "array",
        }
    }

    /// Boolean value of option `name`
    pub fn expect_bool(&self, name: &str) -> Result<bool, SniffError> {
        match self {
            ConfigValue::Bool(b) => Ok(*b),
            other => Err(SniffError::invalid(
                name,
                format!("expected bool, found {}", other.type_name()),
            )),
        }
    }

    /// String list value of option `name`; a single string is a one-item list
    pub fn expect_array(&self, name: &str) -> Result<Vec<String>, SniffError> {
        match self {
            ConfigValue::Array(items) => Ok(items.clone()),
            ConfigValue::String(s) => Ok(vec![s.clone()]),
            other => Err(SniffError::invalid(
                name,
                format!("expected array, found {}", other.type_name()),
            )),
        }
    }
}

/// A configurable option of a sniff
#[derive(Debug, Clone)]
pub struct SniffOption {
    pub name: &'static str,
    pub description: &'static str,
    pub option_type: OptionType,
    pub default: Option<ConfigValue>,
}

/// Type of a sniff option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionType {
    Bool,
    String,
    Number,
    StringArray,
}

/// A sniff
pub trait Sniff: Send + Sync {
    /// Dotted sniff name, e.g. `Types.PropertyType`
    fn code(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// Token kinds this sniff is invoked on
    fn register(&self) -> &'static [TokenKind];

    /// Inspect the token at `position`
    ///
    /// An `Err` is contained by the dispatcher: it is logged and recorded in
    /// the pass report, and the pass continues.
    fn process(&mut self, ctx: &mut SniffContext<'_>, position: usize) -> Result<(), SniffError>;

    /// Clear per-file state; called before the first token of every file
    /// (and of every fix pass)
    fn reset(&mut self, _file: &FileIdentity) {}

    /// Configurable options with their defaults
    fn options(&self) -> Vec<SniffOption> {
        vec![]
    }

    /// Set option `name`
    fn configure(&mut self, name: &str, _value: &ConfigValue) -> Result<(), SniffError> {
        Err(SniffError::UnknownOption(name.to_string()))
    }

    /// A fresh instance with the same configuration and no per-file state
    fn fork(&self) -> Box<dyn Sniff>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_identity_revisions_differ() {
        let first = FileIdentity::new("a.php");
        let second = first.next_revision();
        assert_ne!(first, second);
        assert_eq!(first.path(), second.path());
        assert_eq!(second.revision, 1);
    }

    #[test]
    fn test_config_value_conversions() {
        assert_eq!(ConfigValue::Bool(true).expect_bool("x"), Ok(true));
        assert!(matches!(
            ConfigValue::Number(1).expect_bool("x"),
            Err(SniffError::InvalidOption { .. })
        ));
        assert_eq!(
            ConfigValue::String("a".into()).expect_array("x"),
            Ok(vec!["a".to_string()])
        );
        assert!(ConfigValue::Bool(false).expect_array("x").is_err());
    }
}
