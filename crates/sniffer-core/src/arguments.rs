//! Call argument and array item splitting

use crate::query::Direction;
use crate::tokens::{TokenKind, TokenStore};

/// One argument of a call, bounded by its first and last significant tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub start: usize,
    pub end: usize,
    /// Parameter name for the `name: value` form
    pub name: Option<String>,
}

/// One item of an array literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayItem {
    pub start: usize,
    pub end: usize,
    /// First and last significant token of the key, for `key => value`
    pub key: Option<(usize, usize)>,
    pub value_start: usize,
}

/// Argument at 1-based `position`, or the named argument `name`
///
/// Positional lookup only sees arguments before the first named one.
pub fn argument<'a>(args: &'a [Argument], position: usize, name: &str) -> Option<&'a Argument> {
    if let Some(named) = args.iter().find(|a| a.name.as_deref() == Some(name)) {
        return Some(named);
    }
    let index = position.checked_sub(1)?;
    args.get(index).filter(|a| a.name.is_none())
}

impl TokenStore {
    /// Arguments of the call whose `(` is at `open_paren`
    pub fn call_arguments(&self, open_paren: usize) -> Vec<Argument> {
        if self.kind(open_paren) != Some(TokenKind::OpenParenthesis) {
            return Vec::new();
        }
        let Some(close) = self.parenthesis_closer(open_paren) else {
            return Vec::new();
        };

        self.split_top_level(open_paren, close)
            .into_iter()
            .map(|(start, end)| self.named_argument(start, end))
            .collect()
    }

    fn named_argument(&self, start: usize, end: usize) -> Argument {
        let is_label = self
            .get(start)
            .is_some_and(|t| t.content.chars().all(|c| c == '_' || c.is_alphanumeric()))
            && !matches!(self.kind(start), Some(TokenKind::LNumber | TokenKind::DNumber));
        if is_label {
            if let Some(colon) = self.next_non_empty(start).filter(|&c| c < end) {
                if self.kind(colon) == Some(TokenKind::Colon) {
                    if let Some(value) = self.next_non_empty(colon).filter(|&v| v <= end) {
                        return Argument {
                            start: value,
                            end,
                            name: Some(self.content(start).to_string()),
                        };
                    }
                }
            }
        }
        Argument {
            start,
            end,
            name: None,
        }
    }

    /// Opener and closer of the array literal at `position`: a short `[...]`,
    /// or `array(...)` given either the keyword or its parenthesis
    pub fn array_bounds(&self, position: usize) -> Option<(usize, usize)> {
        let token = self.get(position)?;
        match token.kind {
            TokenKind::OpenSquareBracket => Some((position, token.matching_closer?)),
            TokenKind::Array => Some((token.parenthesis_opener?, token.parenthesis_closer?)),
            TokenKind::OpenParenthesis => {
                let owner = token.parenthesis_owner?;
                (self.kind(owner) == Some(TokenKind::Array))
                    .then_some((position, token.matching_closer?))
            }
            _ => None,
        }
    }

    /// Items of the array literal at `opener`
    pub fn array_items(&self, opener: usize) -> Vec<ArrayItem> {
        let Some((open, close)) = self.array_bounds(opener) else {
            return Vec::new();
        };

        self.split_top_level(open, close)
            .into_iter()
            .map(|(start, end)| {
                match self.find_top_level(TokenKind::DoubleArrow, start, end) {
                    Some(arrow) => {
                        let key_end = self.previous_non_empty(arrow).filter(|&k| k >= start);
                        let value = self.next_non_empty(arrow).filter(|&v| v <= end);
                        ArrayItem {
                            start,
                            end,
                            key: key_end.map(|k| (start, k)),
                            value_start: value.unwrap_or(end),
                        }
                    }
                    None => ArrayItem {
                        start,
                        end,
                        key: None,
                        value_start: start,
                    },
                }
            })
            .collect()
    }

    /// Key of `item` as a plain string, when it is a single literal token
    pub fn literal_key(&self, item: &ArrayItem) -> Option<String> {
        let (start, end) = item.key?;
        if start != end {
            return None;
        }
        let content = self.content(start);
        match self.kind(start)? {
            TokenKind::ConstantEncapsedString => unquote(content),
            TokenKind::LNumber => Some(content.to_string()),
            _ => None,
        }
    }

    /// Significant bounds of the comma separated segments strictly between
    /// `open` and `close`. Nested pairs are skipped, empty segments dropped.
    fn split_top_level(&self, open: usize, close: usize) -> Vec<(usize, usize)> {
        let mut segments = Vec::new();
        let mut segment_start = open + 1;
        let mut i = open + 1;

        while i < close {
            let Some(token) = self.get(i) else { break };
            match token.kind {
                TokenKind::Comma => {
                    self.push_segment(&mut segments, segment_start, i);
                    segment_start = i + 1;
                }
                TokenKind::OpenParenthesis
                | TokenKind::OpenSquareBracket
                | TokenKind::Attribute
                | TokenKind::OpenCurlyBracket => {
                    if let Some(closer) = token.matching_closer.filter(|&c| c < close) {
                        i = closer;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        self.push_segment(&mut segments, segment_start, close);
        segments
    }

    fn push_segment(&self, segments: &mut Vec<(usize, usize)>, from: usize, to: usize) {
        let Some(start) = self.find_next(TokenKind::EMPTY, from, Some(to), true) else {
            return;
        };
        if let Some(end) = self.skip_insignificant(to - 1, Direction::Backward) {
            if end >= start {
                segments.push((start, end));
            }
        }
    }

    /// First `kind` token in `start..=end` outside nested pairs
    fn find_top_level(&self, kind: TokenKind, start: usize, end: usize) -> Option<usize> {
        let mut i = start;
        while i <= end {
            let token = self.get(i)?;
            if token.kind == kind {
                return Some(i);
            }
            if let Some(closer) = token.matching_closer.filter(|&c| c > i) {
                i = closer;
            }
            i += 1;
        }
        None
    }
}

fn unquote(literal: &str) -> Option<String> {
    let quote = literal.chars().next()?;
    if !matches!(quote, '\'' | '"') || literal.len() < 2 || !literal.ends_with(quote) {
        return None;
    }
    Some(literal[1..literal.len() - 1].to_string())
}
