//! Sniff: Class properties must declare a native type
//!
//! When the property's `@var` tag maps to a native type, the type is inserted.
//!
//! Example:
//! ```php
//! // Before
//! class User {
//!     /** @var integer */
//!     public $id;
//! }
//!
//! // After
//! class User {
//!     /** @var integer */
//!     public int $id;
//! }
//! ```

use sniffer_core::{TokenKind, TokenStore};

use super::{defaults_to_null, nullable_for_default, same_type, TYPE_TOKENS};
use crate::context::SniffContext;
use crate::docblock::{native_type, DocBlock, TypeSlot};
use crate::sniff::{ConfigValue, OptionType, Sniff, SniffError, SniffOption};

#[derive(Debug, Clone, Default)]
struct PropertyTypeOptions {
    validate_types: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PropertyTypeSniff {
    options: PropertyTypeOptions,
}

/// Where the backward scan from a variable currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropertyScan {
    /// Just left the variable
    Variable,
    /// Inside a type declaration
    Type,
    /// Inside the modifier list
    Modifiers,
}

/// A property declaration found by [`scan_property`]
#[derive(Debug, PartialEq, Eq)]
struct PropertyDeclaration {
    /// First modifier
    start: usize,
    /// First variable of the declaration
    leader: usize,
    /// First and last token of the native type, if declared
    native: Option<(usize, usize)>,
}

/// First variable of the comma-separated declaration that ends before `from`
fn leading_variable(store: &TokenStore, from: usize) -> Option<usize> {
    let mut leader = None;
    let mut i = from;
    while let Some(prev) = store.previous_non_empty(i) {
        match store.kind(prev) {
            Some(TokenKind::Semicolon | TokenKind::OpenCurlyBracket | TokenKind::CloseCurlyBracket) => break,
            Some(TokenKind::CloseParenthesis | TokenKind::CloseSquareBracket) => {
                i = store.get(prev).and_then(|t| t.matching_opener)?;
                continue;
            }
            Some(TokenKind::Variable) => leader = Some(prev),
            _ => {}
        }
        i = prev;
    }
    leader
}

/// Every variable declared by the statement led by `leader`
fn declarators(store: &TokenStore, leader: usize) -> Vec<usize> {
    let end = store.end_of_statement(leader).unwrap_or(leader);
    (leader..=end)
        .filter(|&i| store.kind(i) == Some(TokenKind::Variable))
        .collect()
}

/// Scan back from `variable` over an optional type and a modifier list.
/// A later variable of `public $a, $b;` resolves to the declaration of the
/// first one. `None` when the variable is not part of a property declaration.
fn scan_property(store: &TokenStore, variable: usize) -> Option<PropertyDeclaration> {
    let mut state = PropertyScan::Variable;
    let mut type_bounds: Option<(usize, usize)> = None;
    let mut start = None;
    let mut i = variable;

    loop {
        let prev = store.previous_non_empty(i);
        let kind = prev.and_then(|p| store.kind(p));
        let is_modifier = kind.is_some_and(TokenKind::is_modifier);
        let is_type = kind.is_some_and(|k| TYPE_TOKENS.contains(&k));

        state = match (state, prev) {
            (_, Some(p)) if is_modifier => {
                start = Some(p);
                PropertyScan::Modifiers
            }
            (PropertyScan::Variable | PropertyScan::Type, Some(p)) if is_type => {
                type_bounds = Some(match type_bounds {
                    Some((_, end)) => (p, end),
                    None => (p, p),
                });
                PropertyScan::Type
            }
            (PropertyScan::Modifiers, _) => break,
            (PropertyScan::Variable, Some(p)) if kind == Some(TokenKind::Comma) => {
                let leader = leading_variable(store, p).filter(|&l| l < variable)?;
                return scan_property(store, leader);
            }
            _ => return None,
        };
        i = prev?;
    }

    Some(PropertyDeclaration {
        start: start?,
        leader: variable,
        native: type_bounds,
    })
}

impl PropertyTypeSniff {
    fn check(&self, ctx: &mut SniffContext<'_>, variable: usize) -> Result<(), SniffError> {
        let store = ctx.store();
        let Some(class) = store.innermost_condition(variable, TokenKind::OO_SCOPES) else {
            return Ok(());
        };
        if !store.is_top_level_of(variable, class) {
            return Ok(());
        }
        let in_parens = store
            .get(variable)
            .is_some_and(|t| !t.nested_parentheses.is_empty());
        if in_parens {
            // Promoted constructor parameters belong to the parameter sniff
            return Ok(());
        }
        let Some(declaration) = scan_property(store, variable) else {
            return Ok(());
        };

        let name = store.content(variable);
        let doc_type = DocBlock::for_declaration(store, declaration.start)
            .and_then(|doc| doc.var_type().and_then(|t| native_type(t, TypeSlot::Property)));

        match declaration.native {
            None => match doc_type {
                Some(ty) => {
                    let null_default = declarators(store, declaration.leader)
                        .into_iter()
                        .any(|v| defaults_to_null(store, v));
                    let ty = nullable_for_default(ty, null_default);
                    let recorded = ctx.add_fixable_error(
                        variable,
                        "MissingPropertyType",
                        "Property %s has no native type; @var declares %s",
                        &[name, ty.as_str()],
                    );
                    // One type in front of the first variable covers the whole declaration
                    if recorded && variable == declaration.leader {
                        ctx.add_content_before(variable, format!("{} ", ty));
                    }
                }
                None => {
                    ctx.add_error(
                        variable,
                        "MissingPropertyType",
                        "Property %s has no native type",
                        &[name],
                    );
                }
            },
            Some((start, end)) if self.options.validate_types => {
                let declared = store.significant_content_between(start, end);
                let comparable = native_type(&declared, TypeSlot::Property);
                if let (Some(declared_ty), Some(doc_ty)) = (comparable, doc_type) {
                    if !same_type(&declared_ty, &doc_ty) {
                        ctx.add_warning(
                            variable,
                            "PropertyTypeMismatch",
                            "Property %s is declared as %s but @var declares %s",
                            &[name, declared.as_str(), doc_ty.as_str()],
                        );
                    }
                }
            }
            Some(_) => {}
        }
        Ok(())
    }
}

impl Sniff for PropertyTypeSniff {
    fn code(&self) -> &'static str {
        "Types.PropertyType"
    }

    fn description(&self) -> &'static str {
        "Class properties must declare a native type"
    }

    fn register(&self) -> &'static [TokenKind] {
        &[TokenKind::Variable]
    }

    fn process(&mut self, ctx: &mut SniffContext<'_>, position: usize) -> Result<(), SniffError> {
        self.check(ctx, position)
    }

    fn options(&self) -> Vec<SniffOption> {
        vec![SniffOption {
            name: "validate_types",
            description: "Warn when a declared type disagrees with the @var tag",
            option_type: OptionType::Bool,
            default: Some(ConfigValue::Bool(false)),
        }]
    }

    fn configure(&mut self, name: &str, value: &ConfigValue) -> Result<(), SniffError> {
        match name {
            "validate_types" => self.options.validate_types = value.expect_bool(name)?,
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
    use crate::sink::Severity;
    use crate::sniffs::test_support::{check_php, codes, fix_php, transform};

    fn sniff() -> Box<dyn Sniff> {
        Box::new(PropertyTypeSniff::default())
    }

    fn validating() -> Box<dyn Sniff> {
        let mut sniff = PropertyTypeSniff::default();
        sniff
            .configure("validate_types", &ConfigValue::Bool(true))
            .unwrap();
        Box::new(sniff)
    }

    // ==================== Detection ====================

    #[test]
    fn test_untyped_property_without_doc() {
        let source = "<?php\nclass C {\n    public $x;\n}\n";
        let diagnostics = check_php(sniff(), source);
        assert_eq!(codes(&diagnostics), vec!["MissingPropertyType"]);
        assert_eq!(diagnostics[0].line, 3);
        assert_eq!(diagnostics[0].column, 12);
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert!(!diagnostics[0].fixable);
        assert_eq!(diagnostics[0].message, "Property $x has no native type");
    }

    #[test]
    fn test_typed_properties_pass() {
        let source = r#"<?php
class C {
    public int $a;
    protected ?string $b = null;
    private static array $c = [];
    public readonly \Foo\Bar $d;
    public int|string $e;
    public (A&B)|null $f;
}
"#;
        assert!(check_php(sniff(), source).is_empty());
    }

    #[test]
    fn test_modifier_forms() {
        let source = r#"<?php
trait T {
    var $a;
    static $b;
    protected static $c;
    public readonly $d;
}
"#;
        assert_eq!(check_php(sniff(), source).len(), 4);
    }

    #[test]
    fn test_non_properties_are_ignored() {
        let source = r#"<?php
$top = 1;
function f($param) { $local = 1; }
class C {
    public function m($arg) {
        static $counter = 0;
        $x = function () use ($arg) { return $arg; };
        { $orphan = 1; }
    }
    public function __construct(private $promoted) {}
}
"#;
        assert!(check_php(sniff(), source).is_empty());
    }

    #[test]
    fn test_multi_property_reported_per_line() {
        let source = "<?php\nclass C {\n    public $a, $b;\n}\n";
        let diagnostics = check_php(sniff(), source);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "Property $a has no native type");

        let source = "<?php\nclass C {\n    public $a,\n        $b = [1, 2],\n        $c;\n}\n";
        let diagnostics = check_php(sniff(), source);
        let lines: Vec<usize> = diagnostics.iter().map(|d| d.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert_eq!(diagnostics[2].message, "Property $c has no native type");
    }

    #[test]
    fn test_multi_property_fixed_once() {
        let source = "<?php\nclass C {\n    /** @var int */\n    private static $a = 1,\n        $b = null;\n}\n";
        let diagnostics = check_php(sniff(), source);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.fixable));
        assert_eq!(
            transform(sniff(), source),
            "<?php\nclass C {\n    /** @var int */\n    private static ?int $a = 1,\n        $b = null;\n}\n"
        );
    }

    #[test]
    fn test_anonymous_class_properties() {
        let source = "<?php\nclass C {\n    public $x;\n    public function m() {\n        return new class {\n            public $y;\n        };\n    }\n}\n";
        let diagnostics = check_php(sniff(), source);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].line, 3);
        assert_eq!(diagnostics[1].line, 6);
    }

    // ==================== Fixing ====================

    #[test]
    fn test_fix_from_var_tag() {
        let source = "<?php\nclass C {\n    /** @var integer */\n    public $x;\n}\n";
        let diagnostics = check_php(sniff(), source);
        assert!(diagnostics[0].fixable);
        assert_eq!(
            transform(sniff(), source),
            "<?php\nclass C {\n    /** @var integer */\n    public int $x;\n}\n"
        );
    }

    #[test]
    fn test_fix_nullable_and_arrays() {
        let source = r#"<?php
class C {
    /**
     * @var string|null
     */
    protected $a;

    /** @var Foo[] */
    private static $b = [];

    /** @var int */
    #[Deprecated]
    public $c = null;
}
"#;
        let expected = r#"<?php
class C {
    /**
     * @var string|null
     */
    protected ?string $a;

    /** @var Foo[] */
    private static array $b = [];

    /** @var int */
    #[Deprecated]
    public ?int $c = null;
}
"#;
        assert_eq!(transform(sniff(), source), expected);
    }

    #[test]
    fn test_ambiguous_doc_is_not_fixed() {
        let source = "<?php\nclass C {\n    /** @var int|string */\n    public $x;\n}\n";
        let report = fix_php(sniff(), source);
        assert_eq!(report.source, source);
        assert_eq!(report.remaining_count(), 1);
        assert!(!report.remaining[0].fixable);
    }

    #[test]
    fn test_unfixable_property_remains_after_fix() {
        let source = "<?php class C { public $x; }";
        let report = fix_php(sniff(), source);
        assert!(report.status.is_converged());
        assert_eq!(report.source, source);
        assert_eq!(report.remaining_count(), 1);
    }

    // ==================== Validation ====================

    #[test]
    fn test_validate_types_reports_mismatch() {
        let source = "<?php\nclass C {\n    /** @var int */\n    public string $x;\n    /** @var int|null */\n    public ?int $y;\n    /** @var \\Foo */\n    public foo $z;\n}\n";
        assert!(check_php(sniff(), source).is_empty());

        let diagnostics = check_php(validating(), source);
        assert_eq!(codes(&diagnostics), vec!["PropertyTypeMismatch"]);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert_eq!(
            diagnostics[0].message,
            "Property $x is declared as string but @var declares int"
        );
    }

    #[test]
    fn test_scan_property_states() {
        let store = TokenStore::from_source("<?php class C { public static ?int $x; }");
        let variable = store
            .tokens()
            .iter()
            .position(|t| t.kind == TokenKind::Variable)
            .unwrap();
        let declaration = scan_property(&store, variable).unwrap();
        assert_eq!(store.content(declaration.start), "public");
        let (start, end) = declaration.native.unwrap();
        assert_eq!(store.content_between(start, end), "?int");
    }
}
