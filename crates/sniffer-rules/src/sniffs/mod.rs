//! Built-in sniffs
//!
//! - `types`: missing native property, parameter and return types
//! - `naming`: unqualified global names in namespaced code
//! - `calls`: call-pattern checks on hook and REST route registration

pub mod calls;
pub mod naming;
pub mod types;

use crate::sniff::Sniff;

/// Every built-in sniff with default options, in dispatch order
pub fn builtin() -> Vec<Box<dyn Sniff>> {
    vec![
        Box::new(types::PropertyTypeSniff::default()),
        Box::new(types::ParameterTypeSniff::default()),
        Box::new(types::ReturnTypeSniff::default()),
        Box::new(naming::GlobalQualificationSniff::default()),
        Box::new(calls::ClosureHookCallbackSniff::default()),
        Box::new(calls::RestRoutePermissionSniff::default()),
    ]
}

#[cfg(test)]
pub(crate) mod test_support {
    use sniffer_core::{PhpTokenizer, TokenStore};

    use crate::fix::{fix, FixReport, DEFAULT_MAX_PASSES};
    use crate::registry::SniffRegistry;
    use crate::sink::Diagnostic;
    use crate::sniff::{FileIdentity, Sniff};

    fn registry(sniff: Box<dyn Sniff>) -> SniffRegistry {
        let mut registry = SniffRegistry::new();
        registry.register(sniff);
        registry
    }

    /// Diagnostics of one check pass
    pub fn check_php(sniff: Box<dyn Sniff>, source: &str) -> Vec<Diagnostic> {
        let store = TokenStore::from_source(source);
        let report = registry(sniff).run_pass(&store, &FileIdentity::new("test.php"), None);
        assert!(report.failures.is_empty(), "sniff failed: {:?}", report.failures);
        report.diagnostics
    }

    /// Full fix run
    pub fn fix_php(sniff: Box<dyn Sniff>, source: &str) -> FixReport {
        fix(
            &mut registry(sniff),
            &FileIdentity::new("test.php"),
            source,
            &PhpTokenizer,
            DEFAULT_MAX_PASSES,
        )
    }

    /// Fixed text; asserts the run converged and fixing again changes nothing
    pub fn transform(sniff: Box<dyn Sniff>, source: &str) -> String {
        let again = sniff.fork();
        let report = fix_php(sniff, source);
        assert!(report.status.is_converged(), "fix did not converge: {:?}", report.status);
        let second = fix_php(again, &report.source);
        assert_eq!(second.source, report.source, "fix is not idempotent");
        report.source
    }

    /// Short codes (after the sniff name) of `diagnostics`
    pub fn codes(diagnostics: &[Diagnostic]) -> Vec<&str> {
        diagnostics
            .iter()
            .map(|d| d.code.rsplit('.').next().unwrap_or(""))
            .collect()
    }
}
