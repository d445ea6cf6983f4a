//! Sniff registry and token dispatcher
//!
//! The registry owns the sniff instances of one worker and maps every token
//! kind to the sniffs listening for it. A pass walks the token store once and
//! invokes the listeners of each token in registration order.

use std::collections::HashMap;

use serde::Serialize;
use sniffer_core::{Fixer, TokenKind, TokenStore};

use crate::config::ConfigError;
use crate::context::SniffContext;
use crate::logging::{self, RunEvent};
use crate::sink::{Diagnostic, DiagnosticSink};
use crate::sniff::{ConfigValue, FileIdentity, Sniff, SniffOption};

/// Information about a registered sniff
#[derive(Debug, Clone)]
pub struct SniffInfo {
    pub code: &'static str,
    pub description: &'static str,
    pub options: Vec<SniffOption>,
}

/// A sniff error contained by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SniffFailure {
    pub sniff: String,
    pub position: usize,
    pub line: usize,
    pub message: String,
}

/// Outcome of one pass of all sniffs over one token store
#[derive(Debug, Default)]
pub struct PassReport {
    /// Diagnostics ordered by line, column, then report order
    pub diagnostics: Vec<Diagnostic>,
    pub failures: Vec<SniffFailure>,
    /// Reports dropped by deduplication
    pub suppressed: usize,
}

/// Registry of the sniffs used by one worker
pub struct SniffRegistry {
    sniffs: Vec<Box<dyn Sniff>>,
    by_code: HashMap<&'static str, usize>,
    listeners: HashMap<TokenKind, Vec<usize>>,
    current_file: Option<FileIdentity>,
}

impl SniffRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sniffs: Vec::new(),
            by_code: HashMap::new(),
            listeners: HashMap::new(),
            current_file: None,
        }
    }

    /// Create a registry with every built-in sniff
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for sniff in crate::sniffs::builtin() {
            registry.register(sniff);
        }
        registry
    }

    /// Register a sniff; a sniff with the same code is replaced in place
    pub fn register(&mut self, sniff: Box<dyn Sniff>) {
        match self.by_code.get(sniff.code()) {
            Some(&idx) => self.sniffs[idx] = sniff,
            None => {
                self.by_code.insert(sniff.code(), self.sniffs.len());
                self.sniffs.push(sniff);
            }
        }
        self.rebuild_listeners();
    }

    /// Keep only the sniffs whose code satisfies `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.sniffs.retain(|s| keep(s.code()));
        self.by_code = self
            .sniffs
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.code(), idx))
            .collect();
        self.rebuild_listeners();
    }

    fn rebuild_listeners(&mut self) {
        self.listeners.clear();
        for (idx, sniff) in self.sniffs.iter().enumerate() {
            for &kind in sniff.register() {
                let listeners = self.listeners.entry(kind).or_default();
                if !listeners.contains(&idx) {
                    listeners.push(idx);
                }
            }
        }
        self.current_file = None;
    }

    pub fn get(&self, code: &str) -> Option<&dyn Sniff> {
        self.by_code.get(code).map(|&idx| self.sniffs[idx].as_ref())
    }

    pub fn contains(&self, code: &str) -> bool {
        self.by_code.contains_key(code)
    }

    /// Set option `option` of sniff `code`
    pub fn configure(
        &mut self,
        code: &str,
        option: &str,
        value: &ConfigValue,
    ) -> Result<(), ConfigError> {
        let &idx = self
            .by_code
            .get(code)
            .ok_or_else(|| ConfigError::UnknownSniff(code.to_string()))?;
        self.sniffs[idx]
            .configure(option, value)
            .map_err(|source| ConfigError::Sniff {
                sniff: code.to_string(),
                source,
            })
    }

    /// Codes of all registered sniffs in registration order
    pub fn codes(&self) -> Vec<&'static str> {
        self.sniffs.iter().map(|s| s.code()).collect()
    }

    /// Get information about all sniffs
    pub fn list(&self) -> Vec<SniffInfo> {
        self.sniffs
            .iter()
            .map(|s| SniffInfo {
                code: s.code(),
                description: s.description(),
                options: s.options(),
            })
            .collect()
    }

    /// Number of registered sniffs
    pub fn len(&self) -> usize {
        self.sniffs.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.sniffs.is_empty()
    }

    /// A registry with the same sniffs and options and fresh per-file state,
    /// for use by another worker
    pub fn fork(&self) -> Self {
        let mut registry = Self::new();
        for sniff in &self.sniffs {
            registry.register(sniff.fork());
        }
        registry
    }

    /// Run every sniff over `store`. Edits are proposed to `fixer` when given.
    pub fn run_pass(
        &mut self,
        store: &TokenStore,
        file: &FileIdentity,
        mut fixer: Option<&mut Fixer>,
    ) -> PassReport {
        if self.current_file.as_ref() != Some(file) {
            for sniff in &mut self.sniffs {
                sniff.reset(file);
            }
            self.current_file = Some(file.clone());
        }

        if let Some(fixer) = fixer.as_deref_mut() {
            fixer.start_pass(store);
        }

        let mut sink = DiagnosticSink::new();
        let mut failures = Vec::new();
        let mut ctx = SniffContext::new(store, file, &mut sink, fixer);

        for token in store.tokens() {
            let Some(listeners) = self.listeners.get(&token.kind) else {
                continue;
            };
            for &idx in listeners {
                let sniff = &mut self.sniffs[idx];
                ctx.enter(sniff.code());
                if let Err(error) = sniff.process(&mut ctx, token.index) {
                    let message = error.to_string();
                    logging::record(RunEvent::SniffFailed {
                        path: file.path(),
                        sniff: sniff.code(),
                        position: token.index,
                        error: message.clone(),
                    });
                    failures.push(SniffFailure {
                        sniff: sniff.code().to_string(),
                        position: token.index,
                        line: token.line,
                        message,
                    });
                }
                if ctx.close_dangling_changeset() {
                    logging::record(RunEvent::ChangesetRolledBack { path: file.path(), sniff: sniff.code() });
                }
            }
        }

        let suppressed = sink.suppressed();
        PassReport {
            diagnostics: sink.into_sorted(),
            failures,
            suppressed,
        }
    }
}

impl Default for SniffRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sniff::SniffError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Flags every variable once per file, counting resets
    struct Recorder {
        resets: Arc<AtomicUsize>,
        seen: Vec<String>,
    }

    impl Sniff for Recorder {
        fn code(&self) -> &'static str {
            "Test.Recorder"
        }

        fn description(&self) -> &'static str {
            "records variables"
        }

        fn register(&self) -> &'static [TokenKind] {
            &[TokenKind::Variable]
        }

        fn process(&mut self, ctx: &mut SniffContext<'_>, position: usize) -> Result<(), SniffError> {
            let name = ctx.store().content(position).to_string();
            if !self.seen.contains(&name) {
                ctx.add_warning(position, "Seen", "First use of %s", &[&name]);
                self.seen.push(name);
            }
            Ok(())
        }

        fn reset(&mut self, _file: &FileIdentity) {
            self.resets.fetch_add(1, Ordering::SeqCst);
            self.seen.clear();
        }

        fn fork(&self) -> Box<dyn Sniff> {
            Box::new(Recorder {
                resets: self.resets.clone(),
                seen: Vec::new(),
            })
        }
    }

    /// Fails on every token it sees
    struct Broken;

    impl Sniff for Broken {
        fn code(&self) -> &'static str {
            "Test.Broken"
        }

        fn description(&self) -> &'static str {
            "always fails"
        }

        fn register(&self) -> &'static [TokenKind] {
            &[TokenKind::Variable]
        }

        fn process(&mut self, ctx: &mut SniffContext<'_>, position: usize) -> Result<(), SniffError> {
            ctx.begin_changeset()?;
            ctx.replace_token(position, "$broken");
            Err(SniffError::unexpected(position, "cannot handle this"))
        }

        fn fork(&self) -> Box<dyn Sniff> {
            Box::new(Broken)
        }
    }

    fn recorder(resets: &Arc<AtomicUsize>) -> Box<dyn Sniff> {
        Box::new(Recorder {
            resets: resets.clone(),
            seen: Vec::new(),
        })
    }

    #[test]
    fn test_builtin_registry_has_sniffs() {
        let registry = SniffRegistry::builtin();
        assert!(!registry.is_empty());
        assert!(registry.contains("Types.PropertyType"));
        assert!(registry.contains("Calls.RestRoutePermission"));
        assert_eq!(registry.list().len(), registry.len());
    }

    #[test]
    fn test_reset_on_file_change() {
        let resets = Arc::new(AtomicUsize::new(0));
        let mut registry = SniffRegistry::new();
        registry.register(recorder(&resets));

        let store = TokenStore::from_source("<?php $a; $a;");
        let first = FileIdentity::new("a.php");
        let second = FileIdentity::new("b.php");

        let report = registry.run_pass(&store, &first, None);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].code, "Test.Recorder.Seen");
        assert_eq!(report.diagnostics[0].message, "First use of $a");

        registry.run_pass(&store, &first, None);
        assert_eq!(resets.load(Ordering::SeqCst), 1);

        let report = registry.run_pass(&store, &second, None);
        assert_eq!(resets.load(Ordering::SeqCst), 2);
        assert_eq!(report.diagnostics.len(), 1);
    }

    #[test]
    fn test_failure_is_contained() {
        let resets = Arc::new(AtomicUsize::new(0));
        let mut registry = SniffRegistry::new();
        registry.register(Box::new(Broken));
        registry.register(recorder(&resets));

        let store = TokenStore::from_source("<?php\n$a;\n$b;\n");
        let mut fixer = Fixer::new();
        let report = registry.run_pass(&store, &FileIdentity::new("a.php"), Some(&mut fixer));

        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].sniff, "Test.Broken");
        assert_eq!(report.diagnostics.len(), 2);
        assert!(fixer.is_empty());
    }

    #[test]
    fn test_fork_shares_options_not_state() {
        let resets = Arc::new(AtomicUsize::new(0));
        let mut registry = SniffRegistry::new();
        registry.register(recorder(&resets));
        let store = TokenStore::from_source("<?php $a;");
        registry.run_pass(&store, &FileIdentity::new("a.php"), None);

        let mut forked = registry.fork();
        assert_eq!(forked.codes(), vec!["Test.Recorder"]);
        let report = forked.run_pass(&store, &FileIdentity::new("a.php"), None);
        assert_eq!(report.diagnostics.len(), 1);
    }

    #[test]
    fn test_retain_and_configure_errors() {
        let mut registry = SniffRegistry::builtin();
        registry.retain(|code| code.starts_with("Types."));
        assert!(!registry.contains("Calls.ClosureHookCallback"));

        assert!(matches!(
            registry.configure("Calls.ClosureHookCallback", "hook_functions", &ConfigValue::Bool(true)),
            Err(ConfigError::UnknownSniff(_))
        ));
        assert!(matches!(
            registry.configure("Types.PropertyType", "no_such_option", &ConfigValue::Bool(true)),
            Err(ConfigError::Sniff { .. })
        ));
        assert!(registry
            .configure("Types.PropertyType", "validate_types", &ConfigValue::Bool(true))
            .is_ok());
    }
}
