//! Sniff: Functions must declare a native return type
//!
//! When the `@return` tag maps to a native type, `: type` is added after the
//! parameter list. Constructors, destructors and `__clone` are skipped, as are
//! closures and arrow functions unless `skip_closures` is turned off.
//!
//! Example:
//! ```php
//! // Before
//! /** @return integer[] */
//! function ids() {}
//!
//! // After
//! /** @return integer[] */
//! function ids(): array {}
//! ```

use sniffer_core::TokenKind;

use super::declaration_start;
use crate::context::SniffContext;
use crate::docblock::{native_type, DocBlock, TypeSlot};
use crate::sniff::{ConfigValue, OptionType, Sniff, SniffError, SniffOption};

const NO_RETURN_TYPE: &[&str] = &["__construct", "__destruct", "__clone"];

#[derive(Debug, Clone)]
struct ReturnTypeOptions {
    skip_closures: bool,
}

impl Default for ReturnTypeOptions {
    fn default() -> Self {
        Self {
            skip_closures: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReturnTypeSniff {
    options: ReturnTypeOptions,
}

impl Sniff for ReturnTypeSniff {
    fn code(&self) -> &'static str {
        "Types.ReturnType"
    }

    fn description(&self) -> &'static str {
        "Functions must declare a native return type"
    }

    fn register(&self) -> &'static [TokenKind] {
        &[TokenKind::Function, TokenKind::Closure, TokenKind::Fn]
    }

    fn process(&mut self, ctx: &mut SniffContext<'_>, position: usize) -> Result<(), SniffError> {
        let store = ctx.store();
        let Some(kind) = store.kind(position) else {
            return Ok(());
        };

        let (anchor, label) = match kind {
            TokenKind::Function => {
                let Some(name) = store.declaration_name(position) else {
                    return Ok(());
                };
                let label = store.content(name);
                if NO_RETURN_TYPE.iter().any(|n| n.eq_ignore_ascii_case(label)) {
                    return Ok(());
                }
                (name, format!("Function {}()", label))
            }
            _ if self.options.skip_closures => return Ok(()),
            _ => (position, "Closure".to_string()),
        };

        let Some(mut closer) = store.get(position).and_then(|t| t.parenthesis_closer) else {
            return Ok(());
        };
        let mut next = store.next_non_empty(closer);
        if kind == TokenKind::Closure && next.is_some_and(|n| store.kind(n) == Some(TokenKind::Use)) {
            let Some(use_closer) = next.and_then(|n| store.parenthesis_closer(n)) else {
                return Err(SniffError::unexpected(position, "closure `use` without a parameter list"));
            };
            closer = use_closer;
            next = store.next_non_empty(closer);
        }
        if next.is_some_and(|n| store.kind(n) == Some(TokenKind::Colon)) {
            return Ok(());
        }

        let doc_type = DocBlock::for_declaration(store, declaration_start(store, position))
            .and_then(|doc| doc.return_type().and_then(|t| native_type(t, TypeSlot::Return)));

        match doc_type {
            Some(ty) => {
                if ctx.add_fixable_error(
                    anchor,
                    "MissingReturnType",
                    "%s has no native return type; @return declares %s",
                    &[label.as_str(), ty.as_str()],
                ) {
                    ctx.add_content(closer, format!(": {}", ty));
                }
            }
            None => {
                ctx.add_error(
                    anchor,
                    "MissingReturnType",
                    "%s has no native return type",
                    &[label.as_str()],
                );
            }
        }
        Ok(())
    }

    fn options(&self) -> Vec<SniffOption> {
        vec![SniffOption {
            name: "skip_closures",
            description: "Do not check closures and arrow functions",
            option_type: OptionType::Bool,
            default: Some(ConfigValue::Bool(true)),
        }]
    }

    fn configure(&mut self, name: &str, value: &ConfigValue) -> Result<(), SniffError> {
        match name {
            "skip_closures" => self.options.skip_closures = value.expect_bool(name)?,
            _ => return Err(SniffError::UnknownOption(name.to_string())),
        }
        Ok(())
    }

    fn fork(&self) -> Box<dyn Sniff> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sniffs::test_support::{check_php, codes, fix_php, transform};

    fn sniff() -> Box<dyn Sniff> {
        Box::new(ReturnTypeSniff::default())
    }

    fn with_closures() -> Box<dyn Sniff> {
        let mut sniff = ReturnTypeSniff::default();
        sniff
            .configure("skip_closures", &ConfigValue::Bool(false))
            .unwrap();
        Box::new(sniff)
    }

    // ==================== Detection ====================

    #[test]
    fn test_missing_return_type() {
        let source = "<?php\nfunction f() {}\nfunction g(): int { return 1; }\n";
        let diagnostics = check_php(sniff(), source);
        assert_eq!(codes(&diagnostics), vec!["MissingReturnType"]);
        assert_eq!(diagnostics[0].message, "Function f() has no native return type");
        assert_eq!(diagnostics[0].column, 10);
    }

    #[test]
    fn test_magic_methods_are_skipped() {
        let source = r#"<?php
class C {
    public function __construct() {}
    public function __destruct() {}
    public function __CLONE() {}
    abstract public function run();
}
"#;
        let diagnostics = check_php(sniff(), source);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 6);
    }

    #[test]
    fn test_closures_are_skipped_by_default() {
        let source = "<?php\n$f = function ($a) use ($b) {};\n$g = fn($x) => $x;\n";
        assert!(check_php(sniff(), source).is_empty());
        assert_eq!(check_php(with_closures(), source).len(), 2);

        let typed = "<?php\n$f = function ($a) use ($b): int { return 1; };\n$g = fn($x): int => $x;\n";
        assert!(check_php(with_closures(), typed).is_empty());
    }

    #[test]
    fn test_option_validation() {
        let mut sniff = ReturnTypeSniff::default();
        assert!(matches!(
            sniff.configure("skip_closures", &ConfigValue::String("no".into())),
            Err(SniffError::InvalidOption { .. })
        ));
        assert!(matches!(
            sniff.configure("nope", &ConfigValue::Bool(true)),
            Err(SniffError::UnknownOption(_))
        ));
    }

    // ==================== Fixing ====================

    #[test]
    fn test_fix_from_return_tag() {
        let source = r#"<?php
/** @return integer[] */
function ids() {}

class C {
    /**
     * @return $this
     */
    public function self() { return $this; }

    /** @return void */
    abstract protected function run();
}
"#;
        let expected = r#"<?php
/** @return integer[] */
function ids(): array {}

class C {
    /**
     * @return $this
     */
    public function self(): static { return $this; }

    /** @return void */
    abstract protected function run(): void;
}
"#;
        assert_eq!(transform(sniff(), source), expected);
    }

    #[test]
    fn test_fix_closure_after_use_clause() {
        let source = "<?php\n/** @return bool */\n$f = function ($a) use (&$b) { return true; };\n";
        // A doc comment before an assignment does not document the closure
        assert_eq!(fix_php(with_closures(), source).source, source);

        let source = "<?php\n$f = /** @return bool */ function ($a) use (&$b) { return true; };\n";
        assert_eq!(
            transform(with_closures(), source),
            "<?php\n$f = /** @return bool */ function ($a) use (&$b): bool { return true; };\n"
        );
    }

    #[test]
    fn test_unmappable_return_remains() {
        let source = "<?php\n/** @return int|string */\nfunction f() {}\n";
        let report = fix_php(sniff(), source);
        assert_eq!(report.source, source);
        assert_eq!(report.remaining_count(), 1);
    }
}
