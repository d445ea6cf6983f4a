//! Type completeness sniffs
//!
//! Each sniff reports a declaration without a native type and, when the doc
//! comment names a type that maps unambiguously to a native one, inserts it.

mod parameter_type;
mod property_type;
mod return_type;

pub use parameter_type::ParameterTypeSniff;
pub use property_type::PropertyTypeSniff;
pub use return_type::ReturnTypeSniff;

use sniffer_core::{TokenKind, TokenStore};

/// Tokens that can make up a native type declaration
const TYPE_TOKENS: &[TokenKind] = &[
    TokenKind::String,
    TokenKind::NameQualified,
    TokenKind::NameFullyQualified,
    TokenKind::NameRelative,
    TokenKind::Array,
    TokenKind::SelfKeyword,
    TokenKind::Parent,
    TokenKind::Null,
    TokenKind::False,
    TokenKind::True,
    TokenKind::Nullable,
    TokenKind::BitwiseOr,
    TokenKind::BitwiseAnd,
    TokenKind::OpenParenthesis,
    TokenKind::CloseParenthesis,
];

/// First token of the declaration whose keyword is at `keyword`, stepping
/// back over modifiers such as `public static`
fn declaration_start(store: &TokenStore, keyword: usize) -> usize {
    let mut start = keyword;
    while let Some(prev) = store.previous_non_empty(start) {
        if !store.kind(prev).is_some_and(TokenKind::is_modifier) {
            break;
        }
        start = prev;
    }
    start
}

/// True when the variable at `variable` has a `= null` default
fn defaults_to_null(store: &TokenStore, variable: usize) -> bool {
    store
        .next_non_empty(variable)
        .filter(|&eq| store.kind(eq) == Some(TokenKind::Equal))
        .and_then(|eq| store.next_non_empty(eq))
        .is_some_and(|value| store.kind(value) == Some(TokenKind::Null))
}

/// `ty` made nullable when the declaration defaults to `null`
fn nullable_for_default(ty: String, null_default: bool) -> String {
    if null_default && !ty.starts_with('?') && !matches!(ty.as_str(), "mixed" | "null") {
        format!("?{}", ty)
    } else {
        ty
    }
}

/// Case- and leading-backslash-insensitive type comparison
fn same_type(a: &str, b: &str) -> bool {
    fn normalize(ty: &str) -> String {
        let (nullable, rest) = match ty.strip_prefix('?') {
            Some(rest) => ("?", rest),
            None => ("", ty),
        };
        format!("{}{}", nullable, rest.trim_start_matches('\\')).to_ascii_lowercase()
    }
    normalize(a) == normalize(b)
}
