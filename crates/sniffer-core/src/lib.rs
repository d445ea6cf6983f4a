//! sniffer-core: token-stream substrate for PHP sniffs
//!
//! This crate provides:
//! - `Tokenize` / `PhpTokenizer`: the tokenizer boundary and the bundled PHP lexer
//! - `TokenStore`: an immutable token array with structural links
//! - Query functions on `TokenStore` (scans, scope and statement accessors,
//!   call arguments, array items)
//! - `Fixer`: a position-keyed edit accumulator with atomic changesets
//! - `apply_edits()`: single-pass application of byte-span edits

mod arguments;
mod edit;
mod fixer;
mod query;
mod tokenizer;
mod tokens;

pub use arguments::{argument, Argument, ArrayItem};
pub use edit::{apply_edits, Edit, EditError};
pub use fixer::{FixEdit, FixOperation, Fixer};
pub use query::Direction;
pub use tokenizer::{PhpTokenizer, Tokenize};
pub use tokens::{RawToken, Token, TokenKind, TokenStore};
