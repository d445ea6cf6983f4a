//! Token store with structural annotations
//!
//! The store is built once per analysis pass from the raw tokens produced by a
//! [`Tokenize`](crate::Tokenize) implementation. Every structural link is
//! computed in a single linear pass and never mutated afterwards; a fix pass
//! that changes the source builds an entirely new store.

use std::fmt;

/// Lexical kind of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Markup
    OpenTag,
    OpenTagWithEcho,
    CloseTag,
    InlineHtml,

    // Trivia
    Whitespace,
    Comment,
    DocCommentOpenTag,
    DocCommentCloseTag,
    DocCommentStar,
    DocCommentWhitespace,
    DocCommentTag,
    DocCommentString,

    // Names and literals
    Variable,
    String,
    NameQualified,
    NameFullyQualified,
    NameRelative,
    ConstantEncapsedString,
    DoubleQuotedString,
    Heredoc,
    Nowdoc,
    Backtick,
    LNumber,
    DNumber,
    Cast,

    // Keywords
    Abstract,
    Array,
    As,
    Break,
    Case,
    Catch,
    Class,
    Clone,
    Const,
    Continue,
    Declare,
    Default,
    Do,
    Echo,
    Else,
    Elseif,
    Empty,
    Enum,
    Eval,
    Exit,
    Extends,
    False,
    Final,
    Finally,
    Fn,
    For,
    Foreach,
    Function,
    Closure,
    Global,
    Goto,
    If,
    Implements,
    Include,
    Instanceof,
    Insteadof,
    Interface,
    Isset,
    List,
    LogicalOperator,
    Match,
    Namespace,
    New,
    Null,
    Parent,
    Print,
    Private,
    Protected,
    Public,
    Readonly,
    Return,
    SelfKeyword,
    Static,
    Switch,
    Throw,
    Trait,
    True,
    Try,
    Unset,
    Use,
    Var,
    While,
    Yield,

    // Delimiters
    OpenParenthesis,
    CloseParenthesis,
    OpenSquareBracket,
    CloseSquareBracket,
    OpenCurlyBracket,
    CloseCurlyBracket,
    Attribute,

    // Punctuation and operators
    Semicolon,
    Comma,
    Colon,
    DoubleArrow,
    ObjectOperator,
    NullsafeObjectOperator,
    DoubleColon,
    Ellipsis,
    Equal,
    InlineThen,
    Nullable,
    BitwiseAnd,
    BitwiseOr,
    BooleanNot,
    NsSeparator,
    Operator,
    Unknown,
}

impl TokenKind {
    /// Kinds that carry no meaning for rules: whitespace, comments and every
    /// doc comment sub-token.
    pub const EMPTY: &'static [TokenKind] = &[
        TokenKind::Whitespace,
        TokenKind::Comment,
        TokenKind::DocCommentOpenTag,
        TokenKind::DocCommentCloseTag,
        TokenKind::DocCommentStar,
        TokenKind::DocCommentWhitespace,
        TokenKind::DocCommentTag,
        TokenKind::DocCommentString,
    ];

    /// Keywords that open a block scope when followed by `{`
    pub const SCOPE_OWNERS: &'static [TokenKind] = &[
        TokenKind::Class,
        TokenKind::Interface,
        TokenKind::Trait,
        TokenKind::Enum,
        TokenKind::Function,
        TokenKind::Closure,
        TokenKind::If,
        TokenKind::Elseif,
        TokenKind::Else,
        TokenKind::While,
        TokenKind::For,
        TokenKind::Foreach,
        TokenKind::Switch,
        TokenKind::Do,
        TokenKind::Try,
        TokenKind::Catch,
        TokenKind::Finally,
        TokenKind::Namespace,
        TokenKind::Match,
        TokenKind::Declare,
    ];

    /// Class-like scopes
    pub const OO_SCOPES: &'static [TokenKind] = &[
        TokenKind::Class,
        TokenKind::Interface,
        TokenKind::Trait,
        TokenKind::Enum,
    ];

    /// Function-like scopes
    pub const FUNCTION_SCOPES: &'static [TokenKind] = &[TokenKind::Function, TokenKind::Closure];

    /// Tokens that can name something
    pub const NAMES: &'static [TokenKind] = &[
        TokenKind::String,
        TokenKind::NameQualified,
        TokenKind::NameFullyQualified,
        TokenKind::NameRelative,
    ];

    /// Property and method modifiers
    pub const MODIFIERS: &'static [TokenKind] = &[
        TokenKind::Public,
        TokenKind::Protected,
        TokenKind::Private,
        TokenKind::Var,
        TokenKind::Static,
        TokenKind::Readonly,
        TokenKind::Final,
        TokenKind::Abstract,
    ];

    pub fn is_empty(self) -> bool {
        Self::EMPTY.contains(&self)
    }

    pub fn is_scope_owner(self) -> bool {
        Self::SCOPE_OWNERS.contains(&self)
    }

    pub fn is_name(self) -> bool {
        Self::NAMES.contains(&self)
    }

    pub fn is_modifier(self) -> bool {
        Self::MODIFIERS.contains(&self)
    }

    /// Control structures whose alternative syntax uses `:` instead of `{`
    fn has_alternative_syntax(self) -> bool {
        matches!(
            self,
            TokenKind::If
                | TokenKind::Elseif
                | TokenKind::Else
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Foreach
                | TokenKind::Switch
                | TokenKind::Declare
        )
    }

    /// Keywords that own the parenthesis following them
    fn owns_parenthesis(self) -> bool {
        matches!(
            self,
            TokenKind::If
                | TokenKind::Elseif
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Foreach
                | TokenKind::Switch
                | TokenKind::Catch
                | TokenKind::Closure
                | TokenKind::Fn
                | TokenKind::Array
                | TokenKind::List
                | TokenKind::Isset
                | TokenKind::Empty
                | TokenKind::Unset
                | TokenKind::Exit
                | TokenKind::Eval
                | TokenKind::Declare
                | TokenKind::Match
                | TokenKind::Use
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A token as produced by the tokenizer collaborator, before annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    pub kind: TokenKind,
    pub content: String,
}

impl RawToken {
    pub fn new(kind: TokenKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }
}

/// An annotated token
///
/// Links are `None` when the structure could not be determined, e.g. for an
/// unbalanced delimiter. Consumers treat `None` as "don't know".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub index: usize,
    pub kind: TokenKind,
    pub content: String,
    /// 1-based line of the first character
    pub line: usize,
    /// 1-based column (in characters) of the first character
    pub column: usize,
    /// Byte offset into the source
    pub offset: usize,

    /// Partner of a paired delimiter (parentheses, brackets, braces, doc comments)
    pub matching_opener: Option<usize>,
    pub matching_closer: Option<usize>,
    /// Keyword owning a parenthesis pair (set on both parentheses)
    pub parenthesis_owner: Option<usize>,
    /// Parentheses owned by this keyword
    pub parenthesis_opener: Option<usize>,
    pub parenthesis_closer: Option<usize>,
    /// Scope owner of a brace pair (set on both braces)
    pub scope_condition: Option<usize>,
    /// Body bounds, set on the owner and on both braces
    pub scope_opener: Option<usize>,
    pub scope_closer: Option<usize>,
    /// Scope owners enclosing this token, outermost first. Scope braces carry
    /// their own owner.
    pub conditions: Vec<usize>,
    /// Openers of the parentheses enclosing this token, outermost first
    pub nested_parentheses: Vec<usize>,
    /// Innermost `{` enclosing this token, owned or orphan. For braces this is
    /// the brace enclosing the pair.
    pub enclosing_brace: Option<usize>,
}

impl Token {
    fn new(index: usize, raw: RawToken, line: usize, column: usize, offset: usize) -> Self {
        Self {
            index,
            kind: raw.kind,
            content: raw.content,
            line,
            column,
            offset,
            matching_opener: None,
            matching_closer: None,
            parenthesis_owner: None,
            parenthesis_opener: None,
            parenthesis_closer: None,
            scope_condition: None,
            scope_opener: None,
            scope_closer: None,
            conditions: Vec::new(),
            nested_parentheses: Vec::new(),
            enclosing_brace: None,
        }
    }

    /// Byte offset one past the last byte of this token
    pub fn end_offset(&self) -> usize {
        self.offset + self.content.len()
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    pub fn is_any(&self, kinds: &[TokenKind]) -> bool {
        kinds.contains(&self.kind)
    }
}

/// Immutable, indexed token sequence for one analysis pass
#[derive(Debug, Clone)]
pub struct TokenStore {
    tokens: Vec<Token>,
}

impl TokenStore {
    /// Tokenize `source` with the given collaborator and annotate the result
    pub fn tokenize(tokenizer: &dyn crate::Tokenize, source: &str) -> Self {
        Self::from_raw(tokenizer.tokenize(source))
    }

    /// Tokenize PHP source with the bundled tokenizer
    pub fn from_source(source: &str) -> Self {
        Self::tokenize(&crate::PhpTokenizer, source)
    }

    /// Compute positions and structural links for raw tokens
    pub fn from_raw(raw: Vec<RawToken>) -> Self {
        let mut tokens = Vec::with_capacity(raw.len());
        let (mut line, mut column, mut offset) = (1, 1, 0);

        for raw in raw {
            if raw.content.is_empty() {
                continue;
            }
            let index = tokens.len();
            let (next_line, next_column) = advance(line, column, &raw.content);
            let len = raw.content.len();
            tokens.push(Token::new(index, raw, line, column, offset));
            line = next_line;
            column = next_column;
            offset += len;
        }

        let mut store = Self { tokens };
        Annotator::default().run(&mut store.tokens);
        store
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    pub fn kind(&self, index: usize) -> Option<TokenKind> {
        self.tokens.get(index).map(|t| t.kind)
    }

    /// Content of a token, empty when out of range
    pub fn content(&self, index: usize) -> &str {
        self.tokens.get(index).map_or("", |t| t.content.as_str())
    }

    pub fn line(&self, index: usize) -> Option<usize> {
        self.tokens.get(index).map(|t| t.line)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Rebuild the source text; tokenization is lossless
    pub fn source(&self) -> String {
        self.tokens.iter().map(|t| t.content.as_str()).collect()
    }
}

fn advance(mut line: usize, mut column: usize, content: &str) -> (usize, usize) {
    for ch in content.chars() {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

/// A scope keyword waiting for its `{`
#[derive(Debug, Clone, Copy)]
struct Pending {
    owner: usize,
    paren_depth: usize,
    brace_depth: usize,
    alternative_syntax: bool,
}

/// Single pass structural annotation
#[derive(Debug, Default)]
struct Annotator {
    parens: Vec<usize>,
    squares: Vec<usize>,
    curlies: Vec<usize>,
    conditions: Vec<usize>,
    pending: Vec<Pending>,
    doc_comment: Option<usize>,
    last_significant: Option<usize>,
}

impl Annotator {
    fn run(mut self, tokens: &mut [Token]) {
        for i in 0..tokens.len() {
            let kind = tokens[i].kind;
            match kind {
                TokenKind::OpenParenthesis => {
                    self.snapshot(tokens, i);
                    let owner = self.parenthesis_owner(tokens);
                    tokens[i].parenthesis_owner = owner;
                    self.parens.push(i);
                }
                TokenKind::CloseParenthesis => {
                    if let Some(opener) = self.parens.pop() {
                        self.abandon_after(tokens, opener);
                        link(tokens, opener, i);
                        let owner = tokens[opener].parenthesis_owner;
                        tokens[i].parenthesis_owner = owner;
                        if let Some(owner) = owner {
                            tokens[owner].parenthesis_opener = Some(opener);
                            tokens[owner].parenthesis_closer = Some(i);
                        }
                    }
                    self.drop_pending_deeper();
                    self.snapshot(tokens, i);
                }
                TokenKind::OpenSquareBracket | TokenKind::Attribute => {
                    self.snapshot(tokens, i);
                    self.squares.push(i);
                }
                TokenKind::CloseSquareBracket => {
                    if let Some(opener) = self.squares.pop() {
                        self.abandon_after(tokens, opener);
                        link(tokens, opener, i);
                    }
                    self.snapshot(tokens, i);
                }
                TokenKind::OpenCurlyBracket => {
                    self.snapshot(tokens, i);
                    let owner = self.adopt_pending();
                    self.curlies.push(i);
                    if let Some(owner) = owner {
                        tokens[owner].scope_opener = Some(i);
                        tokens[i].scope_condition = Some(owner);
                        tokens[i].scope_opener = Some(i);
                        self.conditions.push(owner);
                        tokens[i].conditions.push(owner);
                    }
                }
                TokenKind::CloseCurlyBracket => {
                    let conditions = self.conditions.clone();
                    if let Some(opener) = self.curlies.pop() {
                        self.abandon_after(tokens, opener);
                        link(tokens, opener, i);
                        if let Some(owner) = tokens[opener].scope_condition {
                            tokens[owner].scope_closer = Some(i);
                            tokens[opener].scope_closer = Some(i);
                            tokens[i].scope_condition = Some(owner);
                            tokens[i].scope_opener = Some(opener);
                            tokens[i].scope_closer = Some(i);
                            self.pop_condition(owner);
                        }
                    }
                    let depth = self.curlies.len();
                    self.pending.retain(|p| p.brace_depth <= depth);
                    self.snapshot(tokens, i);
                    tokens[i].conditions = conditions;
                }
                TokenKind::Semicolon => {
                    self.snapshot(tokens, i);
                    let (parens, braces) = (self.parens.len(), self.curlies.len());
                    self.pending
                        .retain(|p| !(p.paren_depth >= parens && p.brace_depth >= braces));
                }
                TokenKind::Colon => {
                    self.snapshot(tokens, i);
                    let (parens, braces) = (self.parens.len(), self.curlies.len());
                    self.pending.retain(|p| {
                        !(p.alternative_syntax && p.paren_depth == parens && p.brace_depth == braces)
                    });
                }
                TokenKind::DocCommentOpenTag => {
                    self.snapshot(tokens, i);
                    self.doc_comment = Some(i);
                }
                TokenKind::DocCommentCloseTag => {
                    self.snapshot(tokens, i);
                    if let Some(opener) = self.doc_comment.take() {
                        link(tokens, opener, i);
                    }
                }
                _ if kind.is_scope_owner() => {
                    self.snapshot(tokens, i);
                    let pending = Pending {
                        owner: i,
                        paren_depth: self.parens.len(),
                        brace_depth: self.curlies.len(),
                        alternative_syntax: kind.has_alternative_syntax(),
                    };
                    // A later keyword at the same depth supersedes, as in `else if`
                    self.pending.retain(|p| {
                        !(p.paren_depth == pending.paren_depth
                            && p.brace_depth == pending.brace_depth)
                    });
                    self.pending.push(pending);
                }
                _ => self.snapshot(tokens, i),
            }

            if !kind.is_empty() {
                self.last_significant = Some(i);
            }
        }
    }

    fn snapshot(&self, tokens: &mut [Token], i: usize) {
        let token = &mut tokens[i];
        token.conditions = self.conditions.clone();
        token.nested_parentheses = self.parens.clone();
        token.enclosing_brace = self.curlies.last().copied();
    }

    /// Owner of a `(` about to be pushed, from the previous significant token
    fn parenthesis_owner(&self, tokens: &[Token]) -> Option<usize> {
        let prev = self.last_significant?;
        if tokens[prev].kind.owns_parenthesis() {
            return Some(prev);
        }
        // Named function declaration: `function name(`
        if tokens[prev].kind == TokenKind::String {
            let before = (0..prev).rev().find(|&j| !tokens[j].kind.is_empty())?;
            let before = if tokens[before].kind == TokenKind::BitwiseAnd {
                (0..before).rev().find(|&j| !tokens[j].kind.is_empty())?
            } else {
                before
            };
            if tokens[before].kind == TokenKind::Function {
                return Some(before);
            }
        }
        None
    }

    fn adopt_pending(&mut self) -> Option<usize> {
        let (parens, braces) = (self.parens.len(), self.curlies.len());
        self.pending
            .retain(|p| p.paren_depth <= parens && p.brace_depth <= braces);
        match self.pending.last() {
            Some(p) if p.paren_depth == parens && p.brace_depth == braces => {
                self.pending.pop().map(|p| p.owner)
            }
            _ => None,
        }
    }

    fn drop_pending_deeper(&mut self) {
        let parens = self.parens.len();
        self.pending.retain(|p| p.paren_depth <= parens);
    }

    fn pop_condition(&mut self, owner: usize) {
        if let Some(pos) = self.conditions.iter().rposition(|&c| c == owner) {
            self.conditions.truncate(pos);
        }
    }

    /// Drop delimiters of other kinds opened after `opener` that are still
    /// open; they stay unlinked so that links never cross.
    fn abandon_after(&mut self, tokens: &[Token], opener: usize) {
        while self.parens.last().is_some_and(|&p| p > opener) {
            self.parens.pop();
        }
        while self.squares.last().is_some_and(|&p| p > opener) {
            self.squares.pop();
        }
        while let Some(&brace) = self.curlies.last() {
            if brace <= opener {
                break;
            }
            self.curlies.pop();
            if let Some(owner) = tokens[brace].scope_condition {
                self.pop_condition(owner);
            }
        }
    }
}

fn link(tokens: &mut [Token], opener: usize, closer: usize) {
    tokens[opener].matching_closer = Some(closer);
    tokens[closer].matching_opener = Some(opener);
}
