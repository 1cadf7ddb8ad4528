//! Element kinds for syntax tree nodes.

use std::fmt;

/// The kind of a syntax tree node.
///
/// Composite kinds carry ordered children; leaf kinds carry token text.
/// Reader conditionals are distinguished from plain lists because their
/// children alternate between dialect tag keywords and forms, and the
/// splicing variant injects the selected branch's children inline.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    /// Synthetic root holding the unit's top-level forms.
    Root,
    /// `(...)`
    List,
    /// `[...]`
    Vector,
    /// `{...}`
    Map,
    /// `#{...}`
    Set,
    /// `'form` — single child, the quoted form.
    Quote,
    /// `^meta form` — children are the metadata argument then the target.
    Meta,
    /// `#?(...)` — non-splicing reader conditional.
    ReaderCond,
    /// `#?@(...)` — splicing reader conditional.
    ReaderCondSplicing,
    /// A symbol token, possibly qualified (`ns/name`).
    Symbol,
    /// A keyword token, stored with its leading `:`.
    Keyword,
    /// A string literal.
    String,
    /// A numeric literal.
    Number,
}

impl SyntaxKind {
    /// Leaf kinds carry token text and never have children.
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            SyntaxKind::Symbol | SyntaxKind::Keyword | SyntaxKind::String | SyntaxKind::Number
        )
    }

    /// Kinds that open a delimited form with ordered children.
    pub fn is_form(self) -> bool {
        matches!(
            self,
            SyntaxKind::List
                | SyntaxKind::Vector
                | SyntaxKind::Map
                | SyntaxKind::Set
                | SyntaxKind::ReaderCond
                | SyntaxKind::ReaderCondSplicing
        )
    }

    /// Reader-conditional kinds (both variants).
    pub fn is_reader_cond(self) -> bool {
        matches!(self, SyntaxKind::ReaderCond | SyntaxKind::ReaderCondSplicing)
    }
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyntaxKind::Root => "root",
            SyntaxKind::List => "list",
            SyntaxKind::Vector => "vector",
            SyntaxKind::Map => "map",
            SyntaxKind::Set => "set",
            SyntaxKind::Quote => "quote",
            SyntaxKind::Meta => "meta",
            SyntaxKind::ReaderCond => "reader-cond",
            SyntaxKind::ReaderCondSplicing => "reader-cond-splicing",
            SyntaxKind::Symbol => "symbol",
            SyntaxKind::Keyword => "keyword",
            SyntaxKind::String => "string",
            SyntaxKind::Number => "number",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classes() {
        assert!(SyntaxKind::Symbol.is_leaf());
        assert!(!SyntaxKind::List.is_leaf());
        assert!(SyntaxKind::List.is_form());
        assert!(SyntaxKind::ReaderCondSplicing.is_reader_cond());
        assert!(!SyntaxKind::Quote.is_form());
    }
}
