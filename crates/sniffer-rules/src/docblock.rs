//! Doc comment tags and doc-type to native-type mapping

use sniffer_core::{TokenKind, TokenStore};

/// A `@tag body` line of a doc comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocTag {
    /// Position of the tag token
    pub position: usize,
    /// Tag name including `@`
    pub name: String,
    /// Text following the tag on the same line
    pub body: String,
}

/// Parsed doc comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocBlock {
    pub opener: usize,
    pub closer: usize,
    pub tags: Vec<DocTag>,
}

impl DocBlock {
    /// The doc comment attached to the declaration starting at `start`,
    /// looking back over whitespace, plain comments and attributes
    pub fn for_declaration(store: &TokenStore, start: usize) -> Option<Self> {
        let mut i = start.checked_sub(1)?;
        loop {
            let token = store.get(i)?;
            match token.kind {
                TokenKind::Whitespace | TokenKind::Comment => {}
                TokenKind::CloseSquareBracket => {
                    let opener = token.matching_opener?;
                    if store.kind(opener) != Some(TokenKind::Attribute) {
                        return None;
                    }
                    i = opener;
                }
                TokenKind::DocCommentCloseTag => {
                    let opener = token.matching_opener?;
                    return Some(Self::parse(store, opener, i));
                }
                _ => return None,
            }
            i = i.checked_sub(1)?;
        }
    }

    fn parse(store: &TokenStore, opener: usize, closer: usize) -> Self {
        let mut tags = Vec::new();
        for i in opener + 1..closer {
            if store.kind(i) != Some(TokenKind::DocCommentTag) {
                continue;
            }
            let mut body = String::new();
            let mut j = i + 1;
            while j < closer {
                match store.kind(j) {
                    Some(TokenKind::DocCommentWhitespace) if !store.content(j).contains('\n') => {}
                    Some(TokenKind::DocCommentString) => {
                        body = store.content(j).to_string();
                        break;
                    }
                    _ => break,
                }
                j += 1;
            }
            tags.push(DocTag {
                position: i,
                name: store.content(i).to_string(),
                body,
            });
        }
        Self {
            opener,
            closer,
            tags,
        }
    }

    pub fn tags<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DocTag> + 'a {
        self.tags.iter().filter(move |t| t.name == name)
    }

    /// Type of the first `@var` tag
    pub fn var_type(&self) -> Option<&str> {
        self.tags("@var").find_map(|t| split_type(&t.body).map(|(ty, _)| ty))
    }

    /// Type of the first `@return` tag
    pub fn return_type(&self) -> Option<&str> {
        self.tags("@return").find_map(|t| split_type(&t.body).map(|(ty, _)| ty))
    }

    /// Type documented for parameter `variable` (with its `$`)
    pub fn param_type(&self, variable: &str) -> Option<&str> {
        self.tags("@param").find_map(|t| {
            let (ty, rest) = split_type(&t.body)?;
            let name = rest.split_whitespace().next()?;
            let name = name.trim_start_matches('&').trim_start_matches("...");
            (name == variable).then_some(ty)
        })
    }
}

/// Split a tag body into its leading type expression and the remainder.
/// Whitespace nested inside `<>`, `{}` or `()` belongs to the type.
fn split_type(body: &str) -> Option<(&str, &str)> {
    let body = body.trim_start();
    let mut depth = 0usize;
    let mut end = body.len();
    for (i, c) in body.char_indices() {
        match c {
            '<' | '{' | '(' => depth += 1,
            '>' | '}' | ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    let ty = &body[..end];
    if ty.is_empty() || (ty.starts_with('$') && ty != "$this") {
        return None;
    }
    Some((ty, &body[end..]))
}

/// Where a native type is going to be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSlot {
    Property,
    Parameter,
    Return,
}

/// Native declaration for a doc type, when the mapping is unambiguous
///
/// Scalar aliases are normalised, typed arrays collapse to `array`, and a
/// two-member union with `null` becomes a nullable type. Anything else maps
/// to `None`.
pub fn native_type(doc: &str, slot: TypeSlot) -> Option<String> {
    let doc = doc.trim();
    if let Some(inner) = doc.strip_prefix('?') {
        let ty = native_member(inner, slot)?;
        return nullable(&ty);
    }

    let mut members: Vec<String> = Vec::new();
    for member in split_union(doc)? {
        let ty = native_member(member, slot)?;
        if !members.contains(&ty) {
            members.push(ty);
        }
    }

    match members.as_slice() {
        [single] if single != "null" => Some(single.clone()),
        [a, b] if a == "null" => nullable(b),
        [a, b] if b == "null" => nullable(a),
        _ => None,
    }
}

fn nullable(ty: &str) -> Option<String> {
    match ty {
        "null" | "mixed" | "void" | "never" => None,
        _ => Some(format!("?{}", ty)),
    }
}

/// Top-level `|` members; `None` for intersections and malformed input
fn split_union(doc: &str) -> Option<Vec<&str>> {
    let mut members = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in doc.char_indices() {
        match c {
            '<' | '{' | '(' => depth += 1,
            '>' | '}' | ')' => depth = depth.checked_sub(1)?,
            '|' if depth == 0 => {
                members.push(&doc[start..i]);
                start = i + 1;
            }
            '&' if depth == 0 => return None,
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    members.push(&doc[start..]);
    Some(members)
}

fn native_member(member: &str, slot: TypeSlot) -> Option<String> {
    let member = member.trim();
    if member.is_empty() {
        return None;
    }
    if member.ends_with("[]") {
        return Some("array".to_string());
    }
    if let Some(open) = member.find('<') {
        let base = member[..open].to_ascii_lowercase();
        return matches!(base.as_str(), "array" | "list" | "non-empty-array" | "non-empty-list")
            .then(|| "array".to_string());
    }

    let lower = member.to_ascii_lowercase();
    let scalar = match lower.as_str() {
        "int" | "integer" => "int",
        "bool" | "boolean" => "bool",
        "float" | "double" => "float",
        "string" | "non-empty-string" | "class-string" => "string",
        "array" | "list" | "non-empty-array" | "non-empty-list" => "array",
        "iterable" => "iterable",
        "object" => "object",
        "mixed" => "mixed",
        "null" => "null",
        "self" => "self",
        "callable" if slot != TypeSlot::Property => "callable",
        "static" | "$this" if slot == TypeSlot::Return => "static",
        "void" if slot == TypeSlot::Return => "void",
        "never" if slot == TypeSlot::Return => "never",
        "false" | "true" | "resource" | "callable" | "static" | "$this" | "void" | "never" => {
            return None
        }
        _ => return class_name(member),
    };
    Some(scalar.to_string())
}

fn class_name(member: &str) -> Option<String> {
    let valid = member
        .trim_start_matches('\\')
        .split('\\')
        .all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c == '_' || c.is_ascii_alphabetic() || !c.is_ascii())
                && chars.all(|c| c == '_' || c.is_ascii_alphanumeric() || !c.is_ascii())
        });
    valid.then(|| member.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(source: &str) -> (TokenStore, DocBlock) {
        let store = TokenStore::from_source(source);
        let target = store
            .tokens()
            .iter()
            .position(|t| matches!(t.kind, TokenKind::Public | TokenKind::Function))
            .unwrap();
        let block = DocBlock::for_declaration(&store, target).unwrap();
        (store, block)
    }

    #[test]
    fn test_tags_are_collected() {
        let (_, block) = doc(
            "<?php\n/**\n * Does things.\n *\n * @param int $a first\n * @param array<string, int> $b\n * @return void\n */\nfunction f($a, $b) {}\n",
        );
        assert_eq!(block.tags.len(), 3);
        assert_eq!(block.param_type("$a"), Some("int"));
        assert_eq!(block.param_type("$b"), Some("array<string, int>"));
        assert_eq!(block.param_type("$c"), None);
        assert_eq!(block.return_type(), Some("void"));
    }

    #[test]
    fn test_return_this() {
        let (_, block) = doc("<?php\n/** @return $this */\nfunction f() {}\n");
        assert_eq!(block.return_type(), Some("$this"));
    }

    #[test]
    fn test_single_line_var() {
        let (_, block) = doc("<?php class C {\n    /** @var int|null */\n    public $x;\n}\n");
        assert_eq!(block.var_type(), Some("int|null"));
    }

    #[test]
    fn test_doc_before_attribute() {
        let (_, block) = doc("<?php class C {\n    /** @var string */\n    #[Attr(1)]\n    public $x;\n}\n");
        assert_eq!(block.var_type(), Some("string"));
    }

    #[test]
    fn test_no_doc_when_code_intervenes() {
        let store = TokenStore::from_source("<?php\n/** @var int */\n$a = 1;\nfunction f() {}\n");
        let function = store
            .tokens()
            .iter()
            .position(|t| t.kind == TokenKind::Function)
            .unwrap();
        assert_eq!(DocBlock::for_declaration(&store, function), None);
    }

    #[test]
    fn test_variadic_and_reference_params() {
        let (_, block) = doc("<?php\n/**\n * @param string ...$rest\n * @param int &$out\n */\nfunction f(&$out, ...$rest) {}\n");
        assert_eq!(block.param_type("$rest"), Some("string"));
        assert_eq!(block.param_type("$out"), Some("int"));
    }

    #[test]
    fn test_native_type_mapping() {
        use TypeSlot::*;
        assert_eq!(native_type("integer", Property).as_deref(), Some("int"));
        assert_eq!(native_type("boolean", Parameter).as_deref(), Some("bool"));
        assert_eq!(native_type("double", Return).as_deref(), Some("float"));
        assert_eq!(native_type("string[]", Property).as_deref(), Some("array"));
        assert_eq!(native_type("array<int, Foo>", Property).as_deref(), Some("array"));
        assert_eq!(native_type("list<int>", Property).as_deref(), Some("array"));
        assert_eq!(native_type("\\Foo\\Bar", Property).as_deref(), Some("\\Foo\\Bar"));
        assert_eq!(native_type("int|null", Property).as_deref(), Some("?int"));
        assert_eq!(native_type("null|Foo", Parameter).as_deref(), Some("?Foo"));
        assert_eq!(native_type("?string", Return).as_deref(), Some("?string"));
        assert_eq!(native_type("int[]|array", Property).as_deref(), Some("array"));
    }

    #[test]
    fn test_ambiguous_types_do_not_map() {
        use TypeSlot::*;
        assert_eq!(native_type("int|string", Property), None);
        assert_eq!(native_type("int|string|null", Property), None);
        assert_eq!(native_type("A&B", Parameter), None);
        assert_eq!(native_type("null", Property), None);
        assert_eq!(native_type("mixed|null", Property), None);
        assert_eq!(native_type("callable", Property), None);
        assert_eq!(native_type("resource", Parameter), None);
        assert_eq!(native_type("array{a: int}", Property), None);
        assert_eq!(native_type("Foo<Bar>", Property), None);
        assert_eq!(native_type("void", Parameter), None);
    }

    #[test]
    fn test_return_only_types() {
        assert_eq!(native_type("void", TypeSlot::Return).as_deref(), Some("void"));
        assert_eq!(native_type("$this", TypeSlot::Return).as_deref(), Some("static"));
        assert_eq!(native_type("callable", TypeSlot::Parameter).as_deref(), Some("callable"));
    }
}
