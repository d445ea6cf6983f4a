//! Query engine over a [`TokenStore`]
//!
//! Every function is total: an out-of-range position or a missing structure
//! yields `None`, never a panic. Range bounds are exclusive of `to`.

use crate::tokens::{TokenKind, TokenStore};

/// Scan direction for [`TokenStore::skip_insignificant`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl TokenStore {
    /// Smallest index in `from..to` whose kind is in `kinds` (or not in
    /// `kinds` when `negate` is set)
    pub fn find_next(
        &self,
        kinds: &[TokenKind],
        from: usize,
        to: Option<usize>,
        negate: bool,
    ) -> Option<usize> {
        let end = to.unwrap_or(self.len()).min(self.len());
        (from..end).find(|&i| kinds.contains(&self.tokens()[i].kind) != negate)
    }

    /// Largest index in `to+1..=from` (down to the start of the file when `to`
    /// is `None`) whose kind is in `kinds`, or not in it when `negate` is set
    pub fn find_previous(
        &self,
        kinds: &[TokenKind],
        from: usize,
        to: Option<usize>,
        negate: bool,
    ) -> Option<usize> {
        if from >= self.len() {
            return None;
        }
        let lower = to.map_or(0, |t| t + 1);
        (lower..=from)
            .rev()
            .find(|&i| kinds.contains(&self.tokens()[i].kind) != negate)
    }

    /// Next token of one of `kinds` whose content equals `content`
    pub fn find_next_with_content(
        &self,
        kinds: &[TokenKind],
        content: &str,
        from: usize,
        to: Option<usize>,
    ) -> Option<usize> {
        let end = to.unwrap_or(self.len()).min(self.len());
        (from..end).find(|&i| {
            let token = &self.tokens()[i];
            kinds.contains(&token.kind) && token.content == content
        })
    }

    /// Previous token of one of `kinds` whose content equals `content`
    pub fn find_previous_with_content(
        &self,
        kinds: &[TokenKind],
        content: &str,
        from: usize,
        to: Option<usize>,
    ) -> Option<usize> {
        if from >= self.len() {
            return None;
        }
        let lower = to.map_or(0, |t| t + 1);
        (lower..=from).rev().find(|&i| {
            let token = &self.tokens()[i];
            kinds.contains(&token.kind) && token.content == content
        })
    }

    /// Like [`find_next`](Self::find_next) but gives up at the end of the
    /// current statement
    pub fn find_next_local(&self, kinds: &[TokenKind], from: usize) -> Option<usize> {
        let end = self.end_of_statement(from)?;
        self.find_next(kinds, from, Some(end + 1), false)
    }

    /// First token at or after (before) `from` that is not whitespace or a
    /// comment
    pub fn skip_insignificant(&self, from: usize, direction: Direction) -> Option<usize> {
        match direction {
            Direction::Forward => self.find_next(TokenKind::EMPTY, from, None, true),
            Direction::Backward => self.find_previous(TokenKind::EMPTY, from, None, true),
        }
    }

    /// First significant token after `position`
    pub fn next_non_empty(&self, position: usize) -> Option<usize> {
        self.skip_insignificant(position.checked_add(1)?, Direction::Forward)
    }

    /// Last significant token before `position`
    pub fn previous_non_empty(&self, position: usize) -> Option<usize> {
        self.skip_insignificant(position.checked_sub(1)?, Direction::Backward)
    }

    /// Closer of the parenthesis at `position`, or of the parenthesis owned by
    /// the keyword at `position`
    pub fn parenthesis_closer(&self, position: usize) -> Option<usize> {
        let token = self.get(position)?;
        match token.kind {
            TokenKind::OpenParenthesis => token.matching_closer,
            _ => token.parenthesis_closer,
        }
    }

    /// Closer of the `[`, `#[` or `{` at `position`
    pub fn bracket_closer(&self, position: usize) -> Option<usize> {
        let token = self.get(position)?;
        match token.kind {
            TokenKind::OpenSquareBracket | TokenKind::Attribute | TokenKind::OpenCurlyBracket => {
                token.matching_closer
            }
            _ => None,
        }
    }

    /// Scope owners enclosing `position`, outermost first
    pub fn enclosing_conditions(&self, position: usize) -> &[usize] {
        self.get(position).map_or(&[], |t| t.conditions.as_slice())
    }

    pub fn has_condition(&self, position: usize, kinds: &[TokenKind]) -> bool {
        self.innermost_condition(position, kinds).is_some()
    }

    /// Innermost enclosing scope owner of one of `kinds`
    pub fn innermost_condition(&self, position: usize, kinds: &[TokenKind]) -> Option<usize> {
        self.enclosing_conditions(position)
            .iter()
            .rev()
            .copied()
            .find(|&c| self.kind(c).is_some_and(|k| kinds.contains(&k)))
    }

    /// True when `position` sits directly in the body of `owner`: `owner` is
    /// the innermost condition and no orphan brace intervenes
    pub fn is_top_level_of(&self, position: usize, owner: usize) -> bool {
        let Some(token) = self.get(position) else {
            return false;
        };
        let Some(opener) = self.get(owner).and_then(|o| o.scope_opener) else {
            return false;
        };
        token.conditions.last() == Some(&owner) && token.enclosing_brace == Some(opener)
    }

    /// True when the innermost `{` around `position` belongs to no recognised
    /// scope keyword
    pub fn in_orphan_block(&self, position: usize) -> bool {
        self.get(position)
            .and_then(|t| t.enclosing_brace)
            .and_then(|b| self.get(b))
            .is_some_and(|brace| brace.scope_condition.is_none())
    }

    /// Name token of a class-like or function declaration
    pub fn declaration_name(&self, owner: usize) -> Option<usize> {
        let kind = self.kind(owner)?;
        if !TokenKind::OO_SCOPES.contains(&kind) && kind != TokenKind::Function {
            return None;
        }
        let mut next = self.next_non_empty(owner)?;
        if self.kind(next) == Some(TokenKind::BitwiseAnd) {
            next = self.next_non_empty(next)?;
        }
        (self.kind(next) == Some(TokenKind::String)).then_some(next)
    }

    /// Token ending the statement containing `position`: a `;`, a close tag,
    /// or the closer of the block the statement opens. Nested parentheses,
    /// brackets and closures are skipped.
    pub fn end_of_statement(&self, position: usize) -> Option<usize> {
        let mut i = position;
        while let Some(token) = self.get(i) {
            match token.kind {
                TokenKind::Semicolon | TokenKind::CloseTag => return Some(i),
                TokenKind::CloseParenthesis
                | TokenKind::CloseSquareBracket
                | TokenKind::CloseCurlyBracket => {
                    // Nested pairs are jumped over, so this closes an enclosing construct
                    if i == position {
                        return Some(i);
                    }
                    return self
                        .previous_non_empty(i)
                        .filter(|&p| p >= position)
                        .or(Some(position));
                }
                TokenKind::OpenParenthesis
                | TokenKind::OpenSquareBracket
                | TokenKind::Attribute
                | TokenKind::OpenCurlyBracket => {
                    let closer = token.matching_closer?;
                    let block_owner = token
                        .scope_condition
                        .and_then(|o| self.kind(o))
                        .filter(|k| !matches!(k, TokenKind::Closure | TokenKind::Match));
                    if block_owner.is_some() {
                        return Some(closer);
                    }
                    i = closer;
                }
                _ => {}
            }
            i += 1;
        }
        None
    }

    /// First significant token of the statement containing `position`
    pub fn start_of_statement(&self, position: usize) -> Option<usize> {
        let mut i = position.checked_sub(1)?;
        loop {
            let token = self.get(i)?;
            match token.kind {
                TokenKind::Semicolon
                | TokenKind::OpenTag
                | TokenKind::OpenCurlyBracket
                | TokenKind::CloseCurlyBracket
                | TokenKind::OpenParenthesis
                | TokenKind::OpenSquareBracket
                | TokenKind::Comma => break,
                TokenKind::CloseParenthesis | TokenKind::CloseSquareBracket => {
                    i = token.matching_opener?;
                }
                _ => {}
            }
            if i == 0 {
                return self.skip_insignificant(0, Direction::Forward);
            }
            i -= 1;
        }
        self.skip_insignificant(i + 1, Direction::Forward)
            .filter(|&s| s <= position)
    }

    /// Concatenated content of `start..=end`
    pub fn content_between(&self, start: usize, end: usize) -> String {
        let end = end.min(self.len().saturating_sub(1));
        if start > end || self.is_empty() {
            return String::new();
        }
        self.tokens()[start..=end]
            .iter()
            .map(|t| t.content.as_str())
            .collect()
    }

    /// Concatenated content of `start..=end` without whitespace and comments
    pub fn significant_content_between(&self, start: usize, end: usize) -> String {
        let end = end.min(self.len().saturating_sub(1));
        if start > end || self.is_empty() {
            return String::new();
        }
        self.tokens()[start..=end]
            .iter()
            .filter(|t| !t.kind.is_empty())
            .map(|t| t.content.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(source: &str) -> TokenStore {
        TokenStore::from_source(source)
    }

    fn find(store: &TokenStore, content: &str) -> usize {
        store
            .tokens()
            .iter()
            .position(|t| t.content == content)
            .unwrap_or_else(|| panic!("no `{}`", content))
    }

    #[test]
    fn test_find_next_and_previous() {
        let store = store("<?php $a = foo($b); $c;");
        let a = find(&store, "$a");
        let c = find(&store, "$c");

        assert_eq!(store.find_next(&[TokenKind::Variable], a + 1, None, false), Some(find(&store, "$b")));
        assert_eq!(store.find_next(&[TokenKind::Variable], a + 1, Some(find(&store, "$b")), false), None);
        assert_eq!(store.find_previous(&[TokenKind::Variable], c - 1, None, false), Some(find(&store, "$b")));
        assert_eq!(store.find_previous(&[TokenKind::Variable], c - 1, Some(find(&store, "$b")), false), None);
        assert_eq!(
            store.find_next(&[TokenKind::Whitespace], a + 1, None, true),
            Some(find(&store, "="))
        );
    }

    #[test]
    fn test_out_of_range_is_not_found() {
        let store = store("<?php $a;");
        assert_eq!(store.find_next(&[TokenKind::Variable], 100, None, false), None);
        assert_eq!(store.find_previous(&[TokenKind::Variable], 100, None, false), None);
        assert_eq!(store.next_non_empty(100), None);
        assert_eq!(store.previous_non_empty(0), None);
        assert_eq!(store.parenthesis_closer(100), None);
        assert_eq!(store.end_of_statement(100), None);
        assert!(store.enclosing_conditions(100).is_empty());
        assert!(!store.in_orphan_block(100));
        assert_eq!(store.content_between(5, 2), "");
    }

    #[test]
    fn test_skip_insignificant() {
        let store = store("<?php $a /* c */ // d\n /** e */ = 1;");
        let a = find(&store, "$a");
        let eq = store.next_non_empty(a).unwrap();
        assert_eq!(store.content(eq), "=");
        assert_eq!(store.previous_non_empty(eq), Some(a));
    }

    #[test]
    fn test_with_content() {
        let store = store("<?php foo(); bar(); foo();");
        let first = store.find_next_with_content(&[TokenKind::String], "foo", 0, None).unwrap();
        let second = store
            .find_next_with_content(&[TokenKind::String], "foo", first + 1, None)
            .unwrap();
        assert!(second > first);
        assert_eq!(
            store.find_previous_with_content(&[TokenKind::String], "bar", second, None),
            Some(find(&store, "bar"))
        );
    }

    #[test]
    fn test_end_and_start_of_statement() {
        let store = store("<?php\n$x = array_map(function ($v) { return $v; }, $list);\n$y = 2;\n");
        let x = find(&store, "$x");
        let end = store.end_of_statement(x).unwrap();
        assert_eq!(store.content(end), ";");
        assert_eq!(store.next_non_empty(end), Some(find(&store, "$y")));

        let list = find(&store, "$list");
        assert_eq!(store.start_of_statement(list), Some(list));

        let y = find(&store, "$y");
        assert_eq!(store.start_of_statement(y + 2), Some(y));
        assert_eq!(store.find_next_local(&[TokenKind::LNumber], x), None);
    }

    #[test]
    fn test_statement_ending_in_block() {
        let store = store("<?php if ($a) { b(); } $c;");
        let if_kw = find(&store, "if");
        let end = store.end_of_statement(if_kw).unwrap();
        assert_eq!(store.content(end), "}");
    }

    #[test]
    fn test_declaration_name() {
        let store = store("<?php class Foo {} function &bar() {} $f = function () {};");
        assert_eq!(store.content(store.declaration_name(find(&store, "class")).unwrap()), "Foo");
        assert_eq!(store.content(store.declaration_name(find(&store, "function")).unwrap()), "bar");
        let closure = store
            .tokens()
            .iter()
            .position(|t| t.kind == TokenKind::Closure)
            .unwrap();
        assert_eq!(store.declaration_name(closure), None);
    }

    #[test]
    fn test_orphan_detection_two_levels_deep() {
        let store = store(
            "<?php\nclass C {\n    public $top;\n    {\n        {\n            $deep;\n        }\n    }\n}\n",
        );
        let class = find(&store, "class");
        let top = find(&store, "$top");
        let deep = find(&store, "$deep");

        assert!(store.is_top_level_of(top, class));
        assert!(!store.in_orphan_block(top));

        assert!(!store.is_top_level_of(deep, class));
        assert!(store.in_orphan_block(deep));
        assert_eq!(store.innermost_condition(deep, TokenKind::OO_SCOPES), Some(class));
    }

    #[test]
    fn test_named_scope_inside_orphan_is_not_orphan() {
        let store = store("<?php\n{\n    function f() {\n        $v;\n    }\n}\n");
        let function = find(&store, "function");
        let v = find(&store, "$v");
        assert!(store.is_top_level_of(v, function));
        assert!(!store.in_orphan_block(v));
    }
}
