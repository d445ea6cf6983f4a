//! PHP tokenizer
//!
//! A lossless, tolerant lexer: the concatenated token contents always equal
//! the input, and malformed input (unterminated strings or comments, stray
//! bytes) never fails. Unterminated constructs run to the end of the input.

use crate::tokens::{RawToken, TokenKind};

/// Tokenizer collaborator: maps source text to a raw token sequence
pub trait Tokenize: Send + Sync {
    fn tokenize(&self, source: &str) -> Vec<RawToken>;
}

/// The bundled PHP tokenizer
#[derive(Debug, Clone, Copy, Default)]
pub struct PhpTokenizer;

impl Tokenize for PhpTokenizer {
    fn tokenize(&self, source: &str) -> Vec<RawToken> {
        let mut lexer = Lexer::new(source);
        lexer.run();
        let mut tokens = lexer.tokens;
        retype(&mut tokens);
        tokens
    }
}

const OPERATORS: &[(&str, TokenKind)] = &[
    ("<<=", TokenKind::Operator),
    (">>=", TokenKind::Operator),
    ("**=", TokenKind::Operator),
    ("...", TokenKind::Ellipsis),
    ("<=>", TokenKind::Operator),
    ("===", TokenKind::Operator),
    ("!==", TokenKind::Operator),
    ("??=", TokenKind::Operator),
    ("?->", TokenKind::NullsafeObjectOperator),
    ("<<", TokenKind::Operator),
    (">>", TokenKind::Operator),
    ("**", TokenKind::Operator),
    ("++", TokenKind::Operator),
    ("--", TokenKind::Operator),
    ("->", TokenKind::ObjectOperator),
    ("=>", TokenKind::DoubleArrow),
    ("::", TokenKind::DoubleColon),
    ("==", TokenKind::Operator),
    ("!=", TokenKind::Operator),
    ("<>", TokenKind::Operator),
    ("<=", TokenKind::Operator),
    (">=", TokenKind::Operator),
    ("&&", TokenKind::Operator),
    ("||", TokenKind::Operator),
    ("??", TokenKind::Operator),
    ("+=", TokenKind::Operator),
    ("-=", TokenKind::Operator),
    ("*=", TokenKind::Operator),
    ("/=", TokenKind::Operator),
    (".=", TokenKind::Operator),
    ("%=", TokenKind::Operator),
    ("&=", TokenKind::Operator),
    ("|=", TokenKind::Operator),
    ("^=", TokenKind::Operator),
    ("(", TokenKind::OpenParenthesis),
    (")", TokenKind::CloseParenthesis),
    ("[", TokenKind::OpenSquareBracket),
    ("]", TokenKind::CloseSquareBracket),
    ("{", TokenKind::OpenCurlyBracket),
    ("}", TokenKind::CloseCurlyBracket),
    (";", TokenKind::Semicolon),
    (",", TokenKind::Comma),
    (":", TokenKind::Colon),
    ("=", TokenKind::Equal),
    ("?", TokenKind::InlineThen),
    ("&", TokenKind::BitwiseAnd),
    ("|", TokenKind::BitwiseOr),
    ("!", TokenKind::BooleanNot),
    ("\\", TokenKind::NsSeparator),
    ("+", TokenKind::Operator),
    ("-", TokenKind::Operator),
    ("*", TokenKind::Operator),
    ("/", TokenKind::Operator),
    ("%", TokenKind::Operator),
    (".", TokenKind::Operator),
    ("<", TokenKind::Operator),
    (">", TokenKind::Operator),
    ("^", TokenKind::Operator),
    ("~", TokenKind::Operator),
    ("@", TokenKind::Operator),
    ("$", TokenKind::Operator),
];

const CAST_TYPES: &[&str] = &[
    "int", "integer", "bool", "boolean", "float", "double", "real", "string", "binary", "array",
    "object", "unset",
];

fn keyword(lower: &str) -> Option<TokenKind> {
    let kind = match lower {
        "abstract" => TokenKind::Abstract,
        "and" | "or" | "xor" => TokenKind::LogicalOperator,
        "array" => TokenKind::Array,
        "as" => TokenKind::As,
        "break" => TokenKind::Break,
        "case" => TokenKind::Case,
        "catch" => TokenKind::Catch,
        "class" => TokenKind::Class,
        "clone" => TokenKind::Clone,
        "const" => TokenKind::Const,
        "continue" => TokenKind::Continue,
        "declare" => TokenKind::Declare,
        "default" => TokenKind::Default,
        "die" | "exit" => TokenKind::Exit,
        "do" => TokenKind::Do,
        "echo" => TokenKind::Echo,
        "else" => TokenKind::Else,
        "elseif" => TokenKind::Elseif,
        "empty" => TokenKind::Empty,
        "enum" => TokenKind::Enum,
        "eval" => TokenKind::Eval,
        "extends" => TokenKind::Extends,
        "false" => TokenKind::False,
        "final" => TokenKind::Final,
        "finally" => TokenKind::Finally,
        "fn" => TokenKind::Fn,
        "for" => TokenKind::For,
        "foreach" => TokenKind::Foreach,
        "function" => TokenKind::Function,
        "global" => TokenKind::Global,
        "goto" => TokenKind::Goto,
        "if" => TokenKind::If,
        "implements" => TokenKind::Implements,
        "include" | "include_once" | "require" | "require_once" => TokenKind::Include,
        "instanceof" => TokenKind::Instanceof,
        "insteadof" => TokenKind::Insteadof,
        "interface" => TokenKind::Interface,
        "isset" => TokenKind::Isset,
        "list" => TokenKind::List,
        "match" => TokenKind::Match,
        "namespace" => TokenKind::Namespace,
        "new" => TokenKind::New,
        "null" => TokenKind::Null,
        "parent" => TokenKind::Parent,
        "print" => TokenKind::Print,
        "private" => TokenKind::Private,
        "protected" => TokenKind::Protected,
        "public" => TokenKind::Public,
        "readonly" => TokenKind::Readonly,
        "return" => TokenKind::Return,
        "self" => TokenKind::SelfKeyword,
        "static" => TokenKind::Static,
        "switch" => TokenKind::Switch,
        "throw" => TokenKind::Throw,
        "trait" => TokenKind::Trait,
        "true" => TokenKind::True,
        "try" => TokenKind::Try,
        "unset" => TokenKind::Unset,
        "use" => TokenKind::Use,
        "var" => TokenKind::Var,
        "while" => TokenKind::While,
        "yield" => TokenKind::Yield,
        _ => return None,
    };
    Some(kind)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii()
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<RawToken>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn emit(&mut self, kind: TokenKind, len: usize) {
        let end = (self.pos + len).min(self.src.len());
        self.tokens.push(RawToken::new(kind, &self.src[self.pos..end]));
        self.pos = end;
    }

    /// Length of the prefix of `rest()` whose chars satisfy `pred`
    fn span_while(&self, from: usize, pred: impl Fn(char) -> bool) -> usize {
        let rest = &self.rest()[from..];
        rest.char_indices()
            .find(|&(_, c)| !pred(c))
            .map_or(rest.len(), |(i, _)| i)
            + from
    }

    fn run(&mut self) {
        while self.pos < self.src.len() {
            self.lex_html();
            self.lex_php();
        }
    }

    /// Inline HTML up to and including the next open tag
    fn lex_html(&mut self) {
        let rest = self.rest();
        let Some(start) = rest.find("<?") else {
            self.emit(TokenKind::InlineHtml, rest.len());
            return;
        };
        if start > 0 {
            self.emit(TokenKind::InlineHtml, start);
        }

        let rest = self.rest();
        if rest.starts_with("<?=") {
            self.emit(TokenKind::OpenTagWithEcho, 3);
            return;
        }
        let mut len = 2;
        if rest.as_bytes().get(2..5).is_some_and(|b| b.eq_ignore_ascii_case(b"php")) {
            len = 5;
        }
        // The open tag swallows a single following whitespace character
        match rest[len..].chars().next() {
            Some('\r') if rest[len..].starts_with("\r\n") => len += 2,
            Some(c @ (' ' | '\t' | '\n' | '\r')) => len += c.len_utf8(),
            _ => {}
        }
        self.emit(TokenKind::OpenTag, len);
    }

    /// PHP code until a close tag or end of input
    fn lex_php(&mut self) {
        while let Some(c) = self.peek() {
            let rest = self.rest();
            if rest.starts_with("?>") {
                let mut len = 2;
                if rest[2..].starts_with("\r\n") {
                    len += 2;
                } else if rest[2..].starts_with('\n') {
                    len += 1;
                }
                self.emit(TokenKind::CloseTag, len);
                return;
            }

            match c {
                c if c.is_whitespace() => {
                    let len = self.span_while(0, char::is_whitespace);
                    self.emit(TokenKind::Whitespace, len);
                }
                '#' if rest.starts_with("#[") => self.emit(TokenKind::Attribute, 2),
                '#' => self.line_comment(),
                '/' if rest.starts_with("//") => self.line_comment(),
                '/' if rest.starts_with("/**") && !rest.starts_with("/**/") => {
                    self.doc_comment()
                }
                '/' if rest.starts_with("/*") => {
                    let len = rest[2..].find("*/").map_or(rest.len(), |i| i + 4);
                    self.emit(TokenKind::Comment, len);
                }
                '$' if self.peek_at(1).is_some_and(is_ident_start) => {
                    let len = self.span_while(1, is_ident_char);
                    self.emit(TokenKind::Variable, len);
                }
                '\\' if self.peek_at(1).is_some_and(is_ident_start) => self.name(),
                c if is_ident_start(c) => self.name(),
                c if c.is_ascii_digit() => self.number(),
                '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.number(),
                '\'' => {
                    let len = quoted_len(rest, '\'');
                    self.emit(TokenKind::ConstantEncapsedString, len);
                }
                '"' => {
                    let len = quoted_len(rest, '"');
                    let kind = if interpolates(&rest[..len]) {
                        TokenKind::DoubleQuotedString
                    } else {
                        TokenKind::ConstantEncapsedString
                    };
                    self.emit(kind, len);
                }
                '`' => {
                    let len = quoted_len(rest, '`');
                    self.emit(TokenKind::Backtick, len);
                }
                '<' if rest.starts_with("<<<") => self.heredoc(),
                '(' => match cast_len(rest) {
                    Some(len) => self.emit(TokenKind::Cast, len),
                    None => self.emit(TokenKind::OpenParenthesis, 1),
                },
                _ => self.operator(),
            }
        }
    }

    fn line_comment(&mut self) {
        let rest = self.rest();
        let mut len = rest.len();
        for (i, c) in rest.char_indices() {
            if c == '\n' || c == '\r' || rest[i..].starts_with("?>") {
                len = i;
                break;
            }
        }
        self.emit(TokenKind::Comment, len);
    }

    fn doc_comment(&mut self) {
        let rest = self.rest();
        let end = rest[3..].find("*/").map(|i| i + 3);
        let body_end = end.unwrap_or(rest.len());
        self.emit(TokenKind::DocCommentOpenTag, 3);

        let body_start = self.pos;
        let body_end = body_start + body_end - 3;
        while self.pos < body_end {
            let rest = &self.src[self.pos..body_end];
            let Some(c) = rest.chars().next() else { break };
            if c.is_whitespace() {
                let len = rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len());
                self.emit(TokenKind::DocCommentWhitespace, len);
            } else if c == '*' && self.at_line_start(body_start) {
                let len = rest.find(|c: char| c != '*').unwrap_or(rest.len());
                self.emit(TokenKind::DocCommentStar, len);
            } else if c == '@' && rest[1..].starts_with(|c: char| is_ident_start(c) || c == '\\') {
                let len = rest[1..]
                    .find(|c: char| c.is_whitespace())
                    .map_or(rest.len(), |i| i + 1);
                self.emit(TokenKind::DocCommentTag, len);
            } else {
                let len = rest.find(['\n', '\r']).unwrap_or(rest.len());
                let line = &rest[..len];
                let trimmed = line.trim_end().len();
                self.emit(TokenKind::DocCommentString, trimmed.max(1));
            }
        }

        if end.is_some() {
            self.emit(TokenKind::DocCommentCloseTag, 2);
        }
    }

    /// True when only whitespace separates `pos` from the previous newline
    /// (or from the start of the doc comment body)
    fn at_line_start(&self, body_start: usize) -> bool {
        let before = &self.src[body_start..self.pos];
        match before.rfind('\n') {
            Some(i) => before[i + 1..].chars().all(char::is_whitespace),
            None => before.chars().all(char::is_whitespace),
        }
    }

    fn name(&mut self) {
        let rest = self.rest();
        let mut len = 0;
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if is_ident_char(c) {
                len = i + c.len_utf8();
            } else if c == '\\' && chars.peek().is_some_and(|&(_, n)| is_ident_start(n)) {
                len = i + 1;
            } else {
                break;
            }
        }
        let text = &rest[..len];
        let kind = if text.starts_with('\\') {
            TokenKind::NameFullyQualified
        } else if text.len() > 10
            && text.as_bytes()[..10].eq_ignore_ascii_case(b"namespace\\")
        {
            TokenKind::NameRelative
        } else if text.contains('\\') {
            TokenKind::NameQualified
        } else {
            keyword(&text.to_ascii_lowercase()).unwrap_or(TokenKind::String)
        };
        self.emit(kind, len);
    }

    fn number(&mut self) {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let lower = rest.get(..2).map(|p| p.to_ascii_lowercase());
        if matches!(lower.as_deref(), Some("0x" | "0b" | "0o")) {
            let len = self.span_while(2, |c| c.is_ascii_hexdigit() || c == '_');
            self.emit(TokenKind::LNumber, len);
            return;
        }

        let mut len = self.span_while(0, |c| c.is_ascii_digit() || c == '_');
        let mut float = false;
        if bytes.get(len) == Some(&b'.') && bytes.get(len + 1).map_or(true, |b| b.is_ascii_digit()) {
            float = true;
            len = self.span_while(len + 1, |c| c.is_ascii_digit() || c == '_');
        }
        if matches!(bytes.get(len), Some(b'e' | b'E')) {
            let mut exp = len + 1;
            if matches!(bytes.get(exp), Some(b'+' | b'-')) {
                exp += 1;
            }
            if bytes.get(exp).is_some_and(|b| b.is_ascii_digit()) {
                float = true;
                len = self.span_while(exp, |c| c.is_ascii_digit());
            }
        }
        let kind = if float { TokenKind::DNumber } else { TokenKind::LNumber };
        self.emit(kind, len);
    }

    fn heredoc(&mut self) {
        let rest = self.rest();
        let header_ws = rest[3..]
            .find(|c: char| c != ' ' && c != '\t')
            .map_or(rest.len(), |i| i + 3);
        let after = &rest[header_ws..];
        let (nowdoc, quote) = match after.chars().next() {
            Some('\'') => (true, 1),
            Some('"') => (false, 1),
            _ => (false, 0),
        };
        let label_len = after[quote..]
            .find(|c: char| !is_ident_char(c))
            .unwrap_or(after.len() - quote);
        if label_len == 0 {
            self.emit(TokenKind::Operator, 2);
            return;
        }
        let label = &after[quote..quote + label_len];
        let header_end = header_ws + quote * 2 + label_len;

        // Closing label: first line whose trimmed start begins with the label
        // followed by a non-identifier character
        let mut len = rest.len();
        let mut line_start = rest
            .get(header_end..)
            .and_then(|r| r.find('\n'))
            .map(|i| header_end + i + 1);
        while let Some(start) = line_start {
            let line = &rest[start..];
            let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
            let candidate = &line[indent..];
            if candidate.starts_with(label)
                && !candidate[label.len()..].starts_with(is_ident_char)
            {
                len = start + indent + label.len();
                break;
            }
            line_start = line.find('\n').map(|i| start + i + 1);
        }

        let kind = if nowdoc { TokenKind::Nowdoc } else { TokenKind::Heredoc };
        self.emit(kind, len);
    }

    fn operator(&mut self) {
        let rest = self.rest();
        for (text, kind) in OPERATORS {
            if rest.starts_with(text) {
                self.emit(*kind, text.len());
                return;
            }
        }
        let len = rest.chars().next().map_or(1, char::len_utf8);
        self.emit(TokenKind::Unknown, len);
    }
}

/// Length of a quoted literal starting at `rest[0]`, honouring backslash
/// escapes; unterminated literals run to the end
fn quoted_len(rest: &str, quote: char) -> usize {
    let mut escaped = false;
    for (i, c) in rest.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return i + 1;
        }
    }
    rest.len()
}

fn interpolates(literal: &str) -> bool {
    let bytes = literal.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'$' if bytes.get(i + 1).is_some_and(|&b| b.is_ascii_alphabetic() || b == b'_' || b == b'{') => {
                return true
            }
            b'{' if bytes.get(i + 1) == Some(&b'$') => return true,
            _ => {}
        }
        i += 1;
    }
    false
}

fn cast_len(rest: &str) -> Option<usize> {
    let inner = &rest[1..];
    let lead = inner.len() - inner.trim_start_matches([' ', '\t']).len();
    let word_len = inner[lead..]
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(inner.len() - lead);
    let word = inner[lead..lead + word_len].to_ascii_lowercase();
    if !CAST_TYPES.contains(&word.as_str()) {
        return None;
    }
    let after = &inner[lead + word_len..];
    let trail = after.len() - after.trim_start_matches([' ', '\t']).len();
    after[trail..]
        .starts_with(')')
        .then_some(1 + lead + word_len + trail + 1)
}

/// Context-dependent kinds that need a look at the neighbours
fn retype(tokens: &mut [RawToken]) {
    let significant: Vec<usize> = (0..tokens.len())
        .filter(|&i| !tokens[i].kind.is_empty())
        .collect();

    for (n, &i) in significant.iter().enumerate() {
        let prev = n.checked_sub(1).map(|p| tokens[significant[p]].kind);
        let next = significant.get(n + 1).map(|&j| tokens[j].kind);
        let after_next = significant.get(n + 2).map(|&j| tokens[j].kind);
        let kind = tokens[i].kind;

        // Member names are never keywords: `$a->class`, `A::list`, `function list()`
        let member = matches!(
            prev,
            Some(
                TokenKind::ObjectOperator
                    | TokenKind::NullsafeObjectOperator
                    | TokenKind::DoubleColon
                    | TokenKind::Function
                    | TokenKind::Const
            )
        ) || (prev == Some(TokenKind::BitwiseAnd)
            && n >= 2
            && tokens[significant[n - 2]].kind == TokenKind::Function);
        if member && kind != TokenKind::String && keyword(&tokens[i].content.to_ascii_lowercase()).is_some() {
            tokens[i].kind = TokenKind::String;
            continue;
        }

        match kind {
            TokenKind::Function => {
                let anonymous = next == Some(TokenKind::OpenParenthesis)
                    || (next == Some(TokenKind::BitwiseAnd)
                        && after_next == Some(TokenKind::OpenParenthesis));
                if anonymous {
                    tokens[i].kind = TokenKind::Closure;
                }
            }
            TokenKind::Enum => {
                if next != Some(TokenKind::String) {
                    tokens[i].kind = TokenKind::String;
                }
            }
            TokenKind::InlineThen => {
                let before_type = matches!(
                    next,
                    Some(
                        TokenKind::String
                            | TokenKind::NameQualified
                            | TokenKind::NameFullyQualified
                            | TokenKind::NameRelative
                            | TokenKind::Array
                            | TokenKind::SelfKeyword
                            | TokenKind::Parent
                            | TokenKind::Static
                            | TokenKind::Null
                    )
                );
                let type_position = matches!(
                    prev,
                    Some(
                        TokenKind::OpenParenthesis
                            | TokenKind::Comma
                            | TokenKind::Colon
                            | TokenKind::Public
                            | TokenKind::Protected
                            | TokenKind::Private
                            | TokenKind::Var
                            | TokenKind::Static
                            | TokenKind::Readonly
                            | TokenKind::Const
                            | TokenKind::Final
                            | TokenKind::Abstract
                    )
                ) && !(prev == Some(TokenKind::Colon) && is_ternary_colon(tokens, &significant, n));
                if before_type && type_position {
                    tokens[i].kind = TokenKind::Nullable;
                }
            }
            _ => {}
        }
    }
}

/// A `:` preceded by `)` is a return type colon; anything else is treated as
/// part of a ternary or a label
fn is_ternary_colon(tokens: &[RawToken], significant: &[usize], n: usize) -> bool {
    n < 2 || tokens[significant[n - 2]].kind != TokenKind::CloseParenthesis
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<(TokenKind, String)> {
        PhpTokenizer
            .tokenize(source)
            .into_iter()
            .map(|t| (t.kind, t.content))
            .collect()
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .into_iter()
            .map(|(k, _)| k)
            .filter(|k| !k.is_empty())
            .collect()
    }

    fn assert_lossless(source: &str) {
        let joined: String = PhpTokenizer
            .tokenize(source)
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(joined, source);
    }

    #[test]
    fn test_open_tag_and_html() {
        let tokens = lex("<h1>Hi</h1>\n<?php echo 1; ?>\n<p>");
        assert_eq!(tokens[0], (TokenKind::InlineHtml, "<h1>Hi</h1>\n".to_string()));
        assert_eq!(tokens[1], (TokenKind::OpenTag, "<?php ".to_string()));
        assert!(tokens.iter().any(|t| t == &(TokenKind::CloseTag, "?>\n".to_string())));
        assert_eq!(tokens.last().unwrap(), &(TokenKind::InlineHtml, "<p>".to_string()));
    }

    #[test]
    fn test_names_and_keywords() {
        assert_eq!(
            kinds("<?php \\Foo\\bar(); Foo\\Bar::class; namespace\\baz; strlen($a);"),
            vec![
                TokenKind::OpenTag,
                TokenKind::NameFullyQualified,
                TokenKind::OpenParenthesis,
                TokenKind::CloseParenthesis,
                TokenKind::Semicolon,
                TokenKind::NameQualified,
                TokenKind::DoubleColon,
                TokenKind::String,
                TokenKind::Semicolon,
                TokenKind::NameRelative,
                TokenKind::Semicolon,
                TokenKind::String,
                TokenKind::OpenParenthesis,
                TokenKind::Variable,
                TokenKind::CloseParenthesis,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn test_closure_and_member_names() {
        let tokens = kinds("<?php function list() {} $f = function () {}; $o->class;");
        assert_eq!(tokens[1], TokenKind::Function);
        assert_eq!(tokens[2], TokenKind::String);
        assert!(tokens.contains(&TokenKind::Closure));
        assert_eq!(tokens[tokens.len() - 2], TokenKind::String);
    }

    #[test]
    fn test_nullable_vs_ternary() {
        let tokens = kinds("<?php function f(?int $a): ?Foo { return $a ? B : C; }");
        assert_eq!(tokens.iter().filter(|k| **k == TokenKind::Nullable).count(), 2);
        assert_eq!(tokens.iter().filter(|k| **k == TokenKind::InlineThen).count(), 1);
    }

    #[test]
    fn test_doc_comment_sub_tokens() {
        let tokens = lex("<?php\n/**\n * Summary\n * @var int|null $x\n */\n");
        let kinds: Vec<_> = tokens.iter().map(|(k, _)| *k).collect();
        assert!(kinds.contains(&TokenKind::DocCommentOpenTag));
        assert!(kinds.contains(&TokenKind::DocCommentCloseTag));
        assert!(tokens.contains(&(TokenKind::DocCommentTag, "@var".to_string())));
        assert!(tokens.contains(&(TokenKind::DocCommentString, "int|null $x".to_string())));
        assert!(tokens.contains(&(TokenKind::DocCommentString, "Summary".to_string())));
        assert_eq!(tokens.iter().filter(|(k, _)| *k == TokenKind::DocCommentStar).count(), 2);
    }

    #[test]
    fn test_strings_numbers_casts() {
        let tokens = lex("<?php 'a\\'b' \"x $y\" \"plain\" 0x1F 1.5e3 (int) $z ( string )$w");
        let kinds: Vec<_> = tokens.iter().map(|(k, _)| *k).filter(|k| !k.is_empty()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::OpenTag,
                TokenKind::ConstantEncapsedString,
                TokenKind::DoubleQuotedString,
                TokenKind::ConstantEncapsedString,
                TokenKind::LNumber,
                TokenKind::DNumber,
                TokenKind::Cast,
                TokenKind::Variable,
                TokenKind::Cast,
                TokenKind::Variable,
            ]
        );
    }

    #[test]
    fn test_heredoc() {
        let source = "<?php\n$a = <<<EOT\nline {$x}\n  EOT;\n$b = <<<'NOW'\nraw\nNOW;\n";
        let tokens = lex(source);
        assert!(tokens.contains(&(TokenKind::Heredoc, "<<<EOT\nline {$x}\n  EOT".to_string())));
        assert!(tokens.contains(&(TokenKind::Nowdoc, "<<<'NOW'\nraw\nNOW".to_string())));
        assert_lossless(source);
    }

    #[test]
    fn test_non_ascii_names() {
        let tokens = lex("<?php function aaaaaaaaaébc() {} namespace\\Über\\f(); <?é");
        assert!(tokens.contains(&(TokenKind::String, "aaaaaaaaaébc".to_string())));
        assert!(tokens.contains(&(TokenKind::NameRelative, "namespace\\Über\\f".to_string())));
    }

    #[test]
    fn test_malformed_input_is_lossless() {
        for source in [
            "<?php 'unterminated",
            "<?php /* open comment",
            "<?php /** open doc",
            "<?php $a = \"x",
            "<?php <<<",
            "<?php ¤ § ( [ {",
            "<?php \\",
            "no tags at all",
            "<?php $a = 1 ?>",
            "<?php\nfunction aaaaaaaaaébc() {}\n",
            "<?php namespacé\\x(); namespace\\é();",
            "<?é€ $a;",
            "<?€",
            "<?php $a = <<<\"é\nx\né;",
        ] {
            assert_lossless(source);
        }
    }
}
