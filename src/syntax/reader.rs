//! A small s-expression reader.
//!
//! Production hosts are expected to bring their own (incremental) parser and
//! feed the engine through [`TreeBuilder`]. This reader covers the subset of
//! the surface syntax the engine cares about — lists, vectors, maps, sets,
//! quotes, metadata, reader conditionals, and the leaf tokens — and is what
//! the tests and simple hosts use to build trees.

use logos::Logos;

use crate::base::{TextRange, TextSize};
use super::kind::SyntaxKind;
use super::tree::{SyntaxTree, TreeBuilder};

/// Errors produced while reading source text into a tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("unexpected closing delimiter at offset {0}")]
    UnexpectedClose(u32),
    #[error("unclosed delimiter opened at offset {0}")]
    UnclosedDelimiter(u32),
    #[error("unreadable token at offset {0}")]
    BadToken(u32),
    #[error("dangling reader macro at offset {0}")]
    DanglingMacro(u32),
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[\s,]+")]
#[logos(skip r";[^\n]*")]
enum Tok {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("#{")]
    SetOpen,
    #[token("#?(")]
    CondOpen,
    #[token("#?@(")]
    CondSpliceOpen,
    #[token("'")]
    Quote,
    #[token("^")]
    Meta,
    #[regex(r#""([^"\\]|\\.)*""#)]
    Str,
    #[regex(r"[+-]?[0-9][0-9a-fA-FxXrRnN./]*", priority = 3)]
    Num,
    #[regex(r#":[^\s,()\[\]{}"';]+"#)]
    Kw,
    #[regex(r#"[^\s,:()\[\]{}"';@^#0-9][^\s,()\[\]{}"';]*"#, priority = 2)]
    Sym,
}

impl Tok {
    fn open_kind(self) -> Option<SyntaxKind> {
        match self {
            Tok::LParen => Some(SyntaxKind::List),
            Tok::LBracket => Some(SyntaxKind::Vector),
            Tok::LBrace => Some(SyntaxKind::Map),
            Tok::SetOpen => Some(SyntaxKind::Set),
            Tok::CondOpen => Some(SyntaxKind::ReaderCond),
            Tok::CondSpliceOpen => Some(SyntaxKind::ReaderCondSplicing),
            _ => None,
        }
    }

    fn close_of(self) -> Option<Tok> {
        match self {
            Tok::LParen | Tok::CondOpen | Tok::CondSpliceOpen => Some(Tok::RParen),
            Tok::LBracket => Some(Tok::RBracket),
            Tok::LBrace | Tok::SetOpen => Some(Tok::RBrace),
            _ => None,
        }
    }

    fn leaf_kind(self) -> Option<SyntaxKind> {
        match self {
            Tok::Sym => Some(SyntaxKind::Symbol),
            Tok::Kw => Some(SyntaxKind::Keyword),
            Tok::Str => Some(SyntaxKind::String),
            Tok::Num => Some(SyntaxKind::Number),
            _ => None,
        }
    }
}

struct Reader<'t> {
    builder: TreeBuilder,
    tokens: Vec<(Tok, TextRange)>,
    pos: usize,
    _text: &'t str,
}

impl<'t> Reader<'t> {
    fn new(text: &'t str) -> Result<Self, ReadError> {
        let mut tokens = Vec::new();
        let mut lex = Tok::lexer(text);
        while let Some(tok) = lex.next() {
            let span = lex.span();
            let range = TextRange::new(
                TextSize::from(span.start as u32),
                TextSize::from(span.end as u32),
            );
            match tok {
                Ok(tok) => tokens.push((tok, range)),
                Err(()) => return Err(ReadError::BadToken(span.start as u32)),
            }
        }
        Ok(Self {
            builder: TreeBuilder::new(text),
            tokens,
            pos: 0,
            _text: text,
        })
    }

    fn peek(&self) -> Option<Tok> {
        self.tokens.get(self.pos).map(|&(t, _)| t)
    }

    fn bump(&mut self) -> Option<(Tok, TextRange)> {
        let t = self.tokens.get(self.pos).copied();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    /// Read one form. Assumes at least one token is available.
    fn form(&mut self) -> Result<(), ReadError> {
        let (tok, range) = self.bump().expect("form called with no tokens left");

        if let Some(kind) = tok.leaf_kind() {
            self.builder.token(kind, range);
            return Ok(());
        }

        if let Some(kind) = tok.open_kind() {
            let close = tok.close_of().expect("open token has a close token");
            self.builder.start_node(kind, range.start());
            loop {
                match self.peek() {
                    Some(t) if t == close => {
                        let (_, close_range) = self.bump().expect("peeked token exists");
                        self.builder.finish_node(close_range.end());
                        return Ok(());
                    }
                    Some(Tok::RParen) | Some(Tok::RBracket) | Some(Tok::RBrace) => {
                        return Err(ReadError::UnexpectedClose(u32::from(
                            self.tokens[self.pos].1.start(),
                        )));
                    }
                    Some(_) => self.form()?,
                    None => return Err(ReadError::UnclosedDelimiter(u32::from(range.start()))),
                }
            }
        }

        match tok {
            Tok::Quote => {
                if self.peek().is_none() {
                    return Err(ReadError::DanglingMacro(u32::from(range.start())));
                }
                self.builder.start_node(SyntaxKind::Quote, range.start());
                self.form()?;
                let end = self.last_end();
                self.builder.finish_node(end);
                Ok(())
            }
            Tok::Meta => {
                // ^arg target — two forms
                self.builder.start_node(SyntaxKind::Meta, range.start());
                for _ in 0..2 {
                    if self.peek().is_none() {
                        return Err(ReadError::DanglingMacro(u32::from(range.start())));
                    }
                    self.form()?;
                }
                let end = self.last_end();
                self.builder.finish_node(end);
                Ok(())
            }
            Tok::RParen | Tok::RBracket | Tok::RBrace => {
                Err(ReadError::UnexpectedClose(u32::from(range.start())))
            }
            _ => unreachable!("leaf and open tokens handled above"),
        }
    }

    fn last_end(&self) -> TextSize {
        self.tokens[self.pos - 1].1.end()
    }

    fn run(mut self) -> Result<SyntaxTree, ReadError> {
        while self.peek().is_some() {
            self.form()?;
        }
        Ok(self.builder.finish())
    }
}

/// Read source text into a [`SyntaxTree`].
pub fn read(text: &str) -> Result<SyntaxTree, ReadError> {
    Reader::new(text)?.run()
}
