//! Sniff: Global names used in namespaced code must be fully qualified
//!
//! Inside a namespace, an unqualified `strlen()` is first looked up in the
//! current namespace, which defeats compile-time optimisation of built-in
//! functions. Configured functions, constants and classes are reported and
//! rewritten with a leading `\`.
//!
//! Example:
//! ```php
//! // Before
//! namespace App;
//! $n = strlen($s) + count($items);
//!
//! // After
//! namespace App;
//! $n = \strlen($s) + \count($items);
//! ```

use std::collections::HashSet;

use regex::Regex;
use sniffer_core::{TokenKind, TokenStore};

use crate::context::SniffContext;
use crate::sniff::{ConfigValue, FileIdentity, OptionType, Sniff, SniffError, SniffOption};

/// Functions the PHP compiler replaces with opcodes when fully qualified
const OPTIMIZED_FUNCTIONS: &[&str] = &[
    "array_key_exists",
    "array_slice",
    "boolval",
    "call_user_func",
    "call_user_func_array",
    "chr",
    "constant",
    "count",
    "defined",
    "dirname",
    "doubleval",
    "extension_loaded",
    "floatval",
    "func_get_args",
    "func_num_args",
    "function_exists",
    "get_called_class",
    "get_class",
    "gettype",
    "in_array",
    "ini_get",
    "intval",
    "is_array",
    "is_bool",
    "is_callable",
    "is_double",
    "is_float",
    "is_int",
    "is_integer",
    "is_long",
    "is_null",
    "is_object",
    "is_resource",
    "is_scalar",
    "is_string",
    "ord",
    "sizeof",
    "strlen",
    "strval",
];

/// Tokens after which a name is a member, a declaration or part of an import
const NON_REFERENCE_CONTEXT: &[TokenKind] = &[
    TokenKind::ObjectOperator,
    TokenKind::NullsafeObjectOperator,
    TokenKind::DoubleColon,
    TokenKind::Function,
    TokenKind::Const,
    TokenKind::Class,
    TokenKind::Interface,
    TokenKind::Trait,
    TokenKind::Enum,
    TokenKind::Namespace,
    TokenKind::Use,
    TokenKind::As,
    TokenKind::Insteadof,
    TokenKind::Goto,
    TokenKind::NsSeparator,
];

/// Tokens that can continue a type declaration around a name
const TYPE_PARTS: &[TokenKind] = &[
    TokenKind::String,
    TokenKind::NameQualified,
    TokenKind::NameFullyQualified,
    TokenKind::NameRelative,
    TokenKind::Array,
    TokenKind::Null,
    TokenKind::False,
    TokenKind::True,
    TokenKind::SelfKeyword,
    TokenKind::Parent,
    TokenKind::Static,
    TokenKind::Nullable,
    TokenKind::BitwiseOr,
    TokenKind::BitwiseAnd,
];

/// True when the token at `i` can be part of a type. Parentheses count only
/// as the unowned grouping of a DNF type.
fn is_type_part(store: &TokenStore, i: usize) -> bool {
    match store.get(i) {
        Some(t) if matches!(t.kind, TokenKind::OpenParenthesis | TokenKind::CloseParenthesis) => {
            t.parenthesis_owner.is_none()
        }
        Some(t) => TYPE_PARTS.contains(&t.kind),
        None => false,
    }
}

/// True when the type that `position` starts or continues is followed by the
/// declared variable, as in `Foo|Bar &...$x`
fn precedes_variable(store: &TokenStore, position: usize) -> bool {
    let mut i = position;
    while let Some(next) = store.next_non_empty(i) {
        if !is_type_part(store, next) {
            return matches!(store.kind(next), Some(TokenKind::Variable | TokenKind::Ellipsis));
        }
        i = next;
    }
    false
}

/// True when `position` is part of a return type, `function f(): ?Foo`
fn in_return_type(store: &TokenStore, position: usize) -> bool {
    let mut i = position;
    loop {
        let Some(prev) = store.previous_non_empty(i) else {
            return false;
        };
        if is_type_part(store, prev) {
            i = prev;
            continue;
        }
        if store.kind(prev) != Some(TokenKind::Colon) {
            return false;
        }
        return store
            .previous_non_empty(prev)
            .and_then(|p| store.get(p))
            .filter(|t| t.kind == TokenKind::CloseParenthesis)
            .and_then(|t| t.parenthesis_owner)
            .and_then(|owner| store.kind(owner))
            .is_some_and(|k| {
                matches!(k, TokenKind::Function | TokenKind::Closure | TokenKind::Fn | TokenKind::Use)
            });
    }
}

/// True when the name at `position` sits in a parameter, property, catch or
/// return type declaration
fn in_type_declaration(store: &TokenStore, position: usize) -> bool {
    let Some(token) = store.get(position) else {
        return false;
    };
    let owner_kinds: Vec<TokenKind> = token
        .nested_parentheses
        .iter()
        .filter_map(|&open| store.get(open).and_then(|o| o.parenthesis_owner))
        .filter_map(|owner| store.kind(owner))
        .collect();
    if owner_kinds.last() == Some(&TokenKind::Catch) {
        return true;
    }
    let in_parameters = owner_kinds
        .iter()
        .any(|k| matches!(k, TokenKind::Function | TokenKind::Closure | TokenKind::Fn));
    let in_property = token.nested_parentheses.is_empty()
        && store
            .innermost_condition(position, TokenKind::OO_SCOPES)
            .is_some_and(|class| store.is_top_level_of(position, class));

    ((in_parameters || in_property) && precedes_variable(store, position))
        || in_return_type(store, position)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameKind {
    Function,
    Constant,
    Class,
}

#[derive(Debug, Clone)]
struct GlobalQualificationOptions {
    /// Lowercase
    known_functions: HashSet<String>,
    known_constants: HashSet<String>,
    /// Lowercase
    known_classes: HashSet<String>,
    function_patterns: Vec<Regex>,
    allow_imported: bool,
}

impl Default for GlobalQualificationOptions {
    fn default() -> Self {
        Self {
            known_functions: OPTIMIZED_FUNCTIONS.iter().map(|f| f.to_string()).collect(),
            known_constants: HashSet::new(),
            known_classes: HashSet::new(),
            function_patterns: Vec::new(),
            allow_imported: true,
        }
    }
}

/// What the current file has declared so far
#[derive(Debug, Default)]
struct FileState {
    namespaced: bool,
    /// Lowercase
    imported_functions: HashSet<String>,
    imported_constants: HashSet<String>,
    /// Lowercase
    imported_classes: HashSet<String>,
    /// Token ranges of import statements
    imports: Vec<(usize, usize)>,
}

#[derive(Debug, Default)]
pub struct GlobalQualificationSniff {
    options: GlobalQualificationOptions,
    state: FileState,
}

impl GlobalQualificationSniff {
    fn record_namespace(&mut self, store: &TokenStore, position: usize) {
        let declares = store
            .next_non_empty(position)
            .and_then(|n| store.kind(n))
            .is_some_and(|k| matches!(k, TokenKind::String | TokenKind::NameQualified));
        if declares {
            self.state.namespaced = true;
        }
    }

    /// Record the names imported by the `use` statement at `position`
    fn record_imports(&mut self, store: &TokenStore, position: usize) {
        let closure_use = store
            .previous_non_empty(position)
            .is_some_and(|p| store.kind(p) == Some(TokenKind::CloseParenthesis));
        if closure_use
            || store.has_condition(position, TokenKind::OO_SCOPES)
            || store.has_condition(position, TokenKind::FUNCTION_SCOPES)
        {
            return;
        }
        let Some(end) = store.end_of_statement(position) else {
            return;
        };
        self.state.imports.push((position, end));

        let statement_kind = match store.next_non_empty(position).and_then(|n| store.kind(n)) {
            Some(TokenKind::Function) => NameKind::Function,
            Some(TokenKind::Const) => NameKind::Constant,
            _ => NameKind::Class,
        };
        let mut kind = statement_kind;
        let mut name: Option<&str> = None;
        let mut alias: Option<&str> = None;

        for i in position + 1..=end {
            match store.kind(i) {
                Some(TokenKind::Function) => kind = NameKind::Function,
                Some(TokenKind::Const) => kind = NameKind::Constant,
                Some(TokenKind::String | TokenKind::NameQualified | TokenKind::NameFullyQualified) => {
                    let after_as = store
                        .previous_non_empty(i)
                        .is_some_and(|p| store.kind(p) == Some(TokenKind::As));
                    if after_as {
                        alias = Some(store.content(i));
                    } else {
                        name = Some(store.content(i));
                    }
                }
                // Group prefix, `use Foo\{A, B}`
                Some(TokenKind::OpenCurlyBracket) => name = None,
                Some(TokenKind::Comma | TokenKind::CloseCurlyBracket | TokenKind::Semicolon) => {
                    if let Some(imported) = alias.or(name) {
                        let short = imported.rsplit('\\').next().unwrap_or(imported);
                        self.import(kind, short);
                    }
                    kind = statement_kind;
                    name = None;
                    alias = None;
                }
                _ => {}
            }
        }
    }

    fn import(&mut self, kind: NameKind, name: &str) {
        match kind {
            NameKind::Function => self.state.imported_functions.insert(name.to_ascii_lowercase()),
            NameKind::Constant => self.state.imported_constants.insert(name.to_string()),
            NameKind::Class => self.state.imported_classes.insert(name.to_ascii_lowercase()),
        };
    }

    fn classify(store: &TokenStore, position: usize) -> Option<NameKind> {
        let prev = store.previous_non_empty(position).and_then(|p| store.kind(p));
        let next = store.next_non_empty(position).and_then(|n| store.kind(n));

        if prev.is_some_and(|k| NON_REFERENCE_CONTEXT.contains(&k)) {
            return None;
        }
        // Enum case names; `case FOO:` in a switch is still a reference
        let enum_case = prev == Some(TokenKind::Case)
            && store
                .innermost_condition(position, &[TokenKind::Enum])
                .is_some_and(|e| store.is_top_level_of(position, e));
        if enum_case {
            return None;
        }
        // Named argument or goto label
        let label_position = matches!(
            prev,
            Some(
                TokenKind::OpenParenthesis
                    | TokenKind::Comma
                    | TokenKind::Semicolon
                    | TokenKind::OpenCurlyBracket
                    | TokenKind::CloseCurlyBracket
            )
        );
        if next == Some(TokenKind::Colon) && label_position {
            return None;
        }

        let class_context = matches!(
            prev,
            Some(TokenKind::New | TokenKind::Extends | TokenKind::Implements | TokenKind::Instanceof)
        ) || next == Some(TokenKind::DoubleColon)
            || in_type_declaration(store, position);

        Some(if class_context {
            NameKind::Class
        } else if next == Some(TokenKind::OpenParenthesis) {
            NameKind::Function
        } else {
            NameKind::Constant
        })
    }

    fn must_qualify(&self, kind: NameKind, name: &str) -> bool {
        let options = &self.options;
        let state = &self.state;
        match kind {
            NameKind::Function => {
                let lower = name.to_ascii_lowercase();
                let known = options.known_functions.contains(&lower)
                    || options.function_patterns.iter().any(|p| p.is_match(name));
                known && !(options.allow_imported && state.imported_functions.contains(&lower))
            }
            NameKind::Constant => {
                options.known_constants.contains(name)
                    && !(options.allow_imported && state.imported_constants.contains(name))
            }
            NameKind::Class => {
                let lower = name.to_ascii_lowercase();
                options.known_classes.contains(&lower)
                    && !(options.allow_imported && state.imported_classes.contains(&lower))
            }
        }
    }

    fn check_name(&self, ctx: &mut SniffContext<'_>, position: usize) {
        let store = ctx.store();
        if !self.state.namespaced {
            return;
        }
        if self
            .state
            .imports
            .iter()
            .any(|&(start, end)| (start..=end).contains(&position))
        {
            return;
        }
        let Some(kind) = Self::classify(store, position) else {
            return;
        };
        let name = store.content(position);
        if !self.must_qualify(kind, name) {
            return;
        }

        let (code, message) = match kind {
            NameKind::Function => (
                "UnqualifiedFunction",
                "Function %s() should be referenced via a fully qualified name",
            ),
            NameKind::Constant => (
                "UnqualifiedConstant",
                "Constant %s should be referenced via a fully qualified name",
            ),
            NameKind::Class => (
                "UnqualifiedClass",
                "Class %s should be referenced via a fully qualified name",
            ),
        };
        if ctx.add_fixable_error(position, code, message, &[name]) {
            ctx.replace_token(position, format!("\\{}", name));
        }
    }
}

fn name_set(value: &ConfigValue, option: &str, lowercase: bool) -> Result<HashSet<String>, SniffError> {
    Ok(value
        .expect_array(option)?
        .into_iter()
        .map(|name| {
            let name = name.trim_start_matches('\\');
            if lowercase {
                name.to_ascii_lowercase()
            } else {
                name.to_string()
            }
        })
        .collect())
}

impl Sniff for GlobalQualificationSniff {
    fn code(&self) -> &'static str {
        "Naming.GlobalQualification"
    }

    fn description(&self) -> &'static str {
        "Global functions, constants and classes must be fully qualified in namespaced code"
    }

    fn register(&self) -> &'static [TokenKind] {
        &[TokenKind::Namespace, TokenKind::Use, TokenKind::String]
    }

    fn process(&mut self, ctx: &mut SniffContext<'_>, position: usize) -> Result<(), SniffError> {
        let store = ctx.store();
        match store.kind(position) {
            Some(TokenKind::Namespace) => self.record_namespace(store, position),
            Some(TokenKind::Use) => self.record_imports(store, position),
            Some(TokenKind::String) => self.check_name(ctx, position),
            _ => {}
        }
        Ok(())
    }

    fn reset(&mut self, _file: &FileIdentity) {
        self.state = FileState::default();
    }

    fn options(&self) -> Vec<SniffOption> {
        vec![
            SniffOption {
                name: "known_functions",
                description: "Functions that must be fully qualified",
                option_type: OptionType::StringArray,
                default: Some(ConfigValue::Array(
                    OPTIMIZED_FUNCTIONS.iter().map(|f| f.to_string()).collect(),
                )),
            },
            SniffOption {
                name: "known_constants",
                description: "Constants that must be fully qualified",
                option_type: OptionType::StringArray,
                default: Some(ConfigValue::Array(vec![])),
            },
            SniffOption {
                name: "known_classes",
                description: "Classes that must be fully qualified",
                option_type: OptionType::StringArray,
                default: Some(ConfigValue::Array(vec![])),
            },
            SniffOption {
                name: "function_patterns",
                description: "Regular expressions matching further functions to qualify",
                option_type: OptionType::StringArray,
                default: Some(ConfigValue::Array(vec![])),
            },
            SniffOption {
                name: "allow_imported",
                description: "Accept names imported with a `use` statement",
                option_type: OptionType::Bool,
                default: Some(ConfigValue::Bool(true)),
            },
        ]
    }

    fn configure(&mut self, name: &str, value: &ConfigValue) -> Result<(), SniffError> {
        let options = &mut self.options;
        match name {
            "known_functions" => options.known_functions = name_set(value, name, true)?,
            "known_constants" => options.known_constants = name_set(value, name, false)?,
            "known_classes" => options.known_classes = name_set(value, name, true)?,
            "function_patterns" => {
                options.function_patterns = value
                    .expect_array(name)?
                    .iter()
                    .map(|pattern| {
                        Regex::new(pattern).map_err(|e| SniffError::invalid(name, e.to_string()))
                    })
                    .collect::<Result<_, _>>()?;
            }
            "allow_imported" => options.allow_imported = value.expect_bool(name)?,
            _ => return Err(SniffError::UnknownOption(name.to_string())),
        }
        Ok(())
    }

    fn fork(&self) -> Box<dyn Sniff> {
        Box::new(Self {
            options: self.options.clone(),
            state: FileState::default(),
        })
    }
}
