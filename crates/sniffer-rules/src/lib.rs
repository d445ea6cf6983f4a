//! sniffer-rules: sniff contract, dispatcher, diagnostics and fixing
//!
//! This crate provides:
//! - `Sniff`: the contract every sniff implements
//! - `SniffRegistry`: registration-order dispatch of sniffs over a token store
//! - `DiagnosticSink`: `(line, code)` deduplicating diagnostic collector
//! - `fix()`: the fix convergence loop
//! - `Runner`: parallel check/fix over files with a `.sniffer.toml` config
//!
//! Built-in sniffs:
//! - Types.PropertyType: class properties without a native type
//! - Types.ParameterType: parameters without a native type
//! - Types.ReturnType: functions without a native return type
//! - Naming.GlobalQualification: unqualified global names in namespaced code
//! - Calls.ClosureHookCallback: closures registered as hook callbacks
//! - Calls.RestRoutePermission: REST routes without `permission_callback`
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use sniffer_rules::{Runner, SniffRegistry};
//!
//! let runner = Runner::new(SniffRegistry::builtin());
//! let report = runner.check_source(Path::new("a.php"), "<?php class C { public $x; }");
//! for diagnostic in &report.diagnostics {
//!     println!("{}:{} {} {}", diagnostic.line, diagnostic.column, diagnostic.code, diagnostic.message);
//! }
//! ```

pub mod config;
pub mod context;
pub mod docblock;
pub mod fix;
pub mod logging;
pub mod registry;
pub mod runner;
pub mod sink;
pub mod sniff;
pub mod sniffs;

pub use config::{ConfigError, RulesetConfig};
pub use context::SniffContext;
pub use docblock::{native_type, DocBlock, TypeSlot};
pub use fix::{fix, FixReport, FixStatus, DEFAULT_MAX_PASSES};
pub use registry::{PassReport, SniffFailure, SniffInfo, SniffRegistry};
pub use runner::{FileReport, FixOutcome, Mode, RunError, RunSummary, Runner};
pub use sink::{Diagnostic, DiagnosticSink, Severity};
pub use sniff::{ConfigValue, FileIdentity, OptionType, Sniff, SniffError, SniffOption};
