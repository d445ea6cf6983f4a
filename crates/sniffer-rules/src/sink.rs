//! Deduplicating diagnostic collector

use std::collections::HashSet;

use serde::Serialize;
use sniffer_core::TokenStore;

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error - must be fixed
    Error,
    /// Warning - should be reviewed
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single reported problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Token position in the pass that reported it
    pub position: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
    pub severity: Severity,
    /// Fully qualified code, e.g. `Types.PropertyType.MissingPropertyType`
    pub code: String,
    pub message: String,
    pub fixable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    line: usize,
    code: String,
    discriminator: Option<usize>,
}

/// Collects diagnostics for one pass over one file
///
/// At most one diagnostic per `(line, code)` is kept; the first report wins.
/// A reporter that needs several findings of one code on a line widens the
/// key with a discriminator.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    seen: HashSet<DedupKey>,
    suppressed: usize,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic at token `position`. `%s` placeholders in
    /// `message` are filled from `args` in order.
    ///
    /// Returns whether the diagnostic was recorded.
    #[allow(clippy::too_many_arguments)]
    pub fn report(
        &mut self,
        store: &TokenStore,
        position: usize,
        code: &str,
        severity: Severity,
        message: &str,
        args: &[&str],
        fixable: bool,
    ) -> bool {
        self.record(store, position, code, None, severity, message, args, fixable)
    }

    /// Like [`report`](Self::report) with `discriminator` added to the dedup key
    #[allow(clippy::too_many_arguments)]
    pub fn report_keyed(
        &mut self,
        store: &TokenStore,
        position: usize,
        code: &str,
        discriminator: usize,
        severity: Severity,
        message: &str,
        args: &[&str],
        fixable: bool,
    ) -> bool {
        self.record(
            store,
            position,
            code,
            Some(discriminator),
            severity,
            message,
            args,
            fixable,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &mut self,
        store: &TokenStore,
        position: usize,
        code: &str,
        discriminator: Option<usize>,
        severity: Severity,
        message: &str,
        args: &[&str],
        fixable: bool,
    ) -> bool {
        let Some(token) = store.get(position) else {
            return false;
        };

        let key = DedupKey {
            line: token.line,
            code: code.to_string(),
            discriminator,
        };
        if !self.seen.insert(key) {
            self.suppressed += 1;
            return false;
        }

        self.diagnostics.push(Diagnostic {
            position,
            line: token.line,
            column: token.column,
            severity,
            code: code.to_string(),
            message: format_message(message, args),
            fixable,
        });
        true
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

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

    pub fn fixable_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.fixable).count()
    }

    /// Reports dropped by deduplication
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    /// Diagnostics ordered by line, then column, then report order
    pub fn into_sorted(self) -> Vec<Diagnostic> {
        let mut diagnostics = self.diagnostics;
        diagnostics.sort_by_key(|d| (d.line, d.column));
        diagnostics
    }
}

/// Substitute `%s` placeholders with `args`; `%%` is a literal percent sign.
/// Missing arguments leave the placeholder in place.
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                match args.next() {
                    Some(arg) => out.push_str(arg),
                    None => out.push_str("%s"),
                }
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TokenStore {
        TokenStore::from_source("<?php\n$a = $b;\n$c;\n")
    }

    fn position(store: &TokenStore, content: &str) -> usize {
        store
            .tokens()
            .iter()
            .position(|t| t.content == content)
            .unwrap()
    }

    #[test]
    fn test_same_code_same_line_reported_once() {
        let store = store();
        let mut sink = DiagnosticSink::new();
        let a = position(&store, "$a");
        let b = position(&store, "$b");

        assert!(sink.report(&store, a, "X.Y.Code", Severity::Error, "first", &[], false));
        assert!(!sink.report(&store, b, "X.Y.Code", Severity::Warning, "second", &[], true));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.suppressed(), 1);
        assert_eq!(sink.diagnostics()[0].message, "first");
    }

    #[test]
    fn test_different_codes_or_lines_are_kept() {
        let store = store();
        let mut sink = DiagnosticSink::new();
        let a = position(&store, "$a");
        let c = position(&store, "$c");

        assert!(sink.report(&store, a, "X.Y.One", Severity::Error, "m", &[], false));
        assert!(sink.report(&store, a, "X.Y.Two", Severity::Warning, "m", &[], false));
        assert!(sink.report(&store, c, "X.Y.One", Severity::Error, "m", &[], false));
        assert_eq!(sink.len(), 3);
        assert_eq!(sink.error_count(), 2);
        assert_eq!(sink.warning_count(), 1);
    }

    #[test]
    fn test_discriminator_widens_key() {
        let store = store();
        let mut sink = DiagnosticSink::new();
        let a = position(&store, "$a");
        let b = position(&store, "$b");

        assert!(sink.report_keyed(&store, a, "X.Y.Code", a, Severity::Error, "m", &[], false));
        assert!(sink.report_keyed(&store, b, "X.Y.Code", b, Severity::Error, "m", &[], false));
        assert!(!sink.report_keyed(&store, b, "X.Y.Code", b, Severity::Error, "m", &[], false));
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_out_of_range_position_is_dropped() {
        let store = store();
        let mut sink = DiagnosticSink::new();
        assert!(!sink.report(&store, 999, "X.Y.Code", Severity::Error, "m", &[], false));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_sorted_by_position_then_insertion() {
        let store = store();
        let mut sink = DiagnosticSink::new();
        let a = position(&store, "$a");
        let c = position(&store, "$c");

        sink.report(&store, c, "X.Y.Late", Severity::Error, "c", &[], false);
        sink.report(&store, a, "X.Y.Two", Severity::Error, "a2", &[], true);
        sink.report(&store, a, "X.Y.One", Severity::Error, "a1", &[], false);

        assert_eq!(sink.fixable_count(), 1);
        let sorted = sink.into_sorted();
        let messages: Vec<&str> = sorted.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["a2", "a1", "c"]);
    }

    #[test]
    fn test_format_message() {
        assert_eq!(format_message("Missing type for %s in %s", &["$x", "C"]), "Missing type for $x in C");
        assert_eq!(format_message("100%% of %s", &["it"]), "100% of it");
        assert_eq!(format_message("%s and %s", &["one"]), "one and %s");
        assert_eq!(format_message("50% off", &[]), "50% off");
    }

    #[test]
    fn test_serializes_to_json() {
        let store = store();
        let mut sink = DiagnosticSink::new();
        sink.report(&store, position(&store, "$a"), "X.Y.Code", Severity::Warning, "m", &[], false);
        let json = serde_json::to_string(&sink.diagnostics()[0]).unwrap();
        assert!(json.contains("\"severity\":\"warning\""));
        assert!(json.contains("\"line\":2"));
    }
}
