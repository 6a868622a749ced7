//! Builds a [`BlockTree`] from lexemes.
//!
//! Lines are split at newlines, pipe tokens and terminators. A `{` scans
//! ahead to its matching `}` by depth and the span between is built
//! recursively into a nested tree. Empty plain lines are dropped; pipe and
//! terminator lines are always kept.

use logos::Span;
use thiserror::Error;

use crate::ast::{BlockTree, Element, Line};
use crate::lexer::{self, LexError, Lexeme, Spanned};
use crate::route::{RouteError, parse_route};

/// Errors from turning source text into a tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{} at {}..{}", .0.token, .0.span.start, .0.span.end)]
    Lex(Spanned<LexError>),
    #[error("unmatched '}}' at {}", .0.start)]
    UnmatchedClose(Span),
    #[error("unclosed '{{' at {}", .0.start)]
    UnclosedBlock(Span),
    #[error("{source} at {}", .span.start)]
    Route {
        span: Span,
        #[source]
        source: RouteError,
    },
}

impl ParseError {
    /// True when the input ended early: more lines could complete it.
    pub fn is_incomplete(&self) -> bool {
        match self {
            ParseError::Lex(e) => e.token.is_incomplete(),
            ParseError::UnclosedBlock(_) => true,
            _ => false,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            ParseError::Lex(e) => e.span.clone(),
            ParseError::UnmatchedClose(span) | ParseError::UnclosedBlock(span) => span.clone(),
            ParseError::Route { span, .. } => span.clone(),
        }
    }
}

/// Lex and build in one step.
pub fn parse(source: &str) -> Result<BlockTree, ParseError> {
    let lexemes = lexer::tokenize(source).map_err(|e| match e.token {
        LexError::UnmatchedClose => ParseError::UnmatchedClose(e.span),
        _ => ParseError::Lex(e),
    })?;
    build(&lexemes)
}

/// Build a tree from a complete lexeme sequence.
pub fn build(lexemes: &[Spanned<Lexeme>]) -> Result<BlockTree, ParseError> {
    Builder { lexemes }.build(0, lexemes.len())
}

struct Builder<'a> {
    lexemes: &'a [Spanned<Lexeme>],
}

impl Builder<'_> {
    fn build(&self, start: usize, end: usize) -> Result<BlockTree, ParseError> {
        let mut lines = Vec::new();
        let mut current = Vec::new();
        let mut pos = start;

        while pos < end {
            let lexeme = &self.lexemes[pos];
            match &lexeme.token {
                Lexeme::Word(word) => current.push(Element::Word(word.clone())),
                Lexeme::Open => {
                    let close = self.matching_close(pos, end)?;
                    let inner = self.build(pos + 1, close)?;
                    current.push(Element::Block(inner));
                    pos = close;
                }
                Lexeme::Close => return Err(ParseError::UnmatchedClose(lexeme.span.clone())),
                Lexeme::Route(text) => {
                    end_line(&mut lines, &mut current);
                    let pipe = parse_route(text).map_err(|source| ParseError::Route {
                        span: lexeme.span.clone(),
                        source,
                    })?;
                    lines.push(Line::Pipe(pipe));
                }
                Lexeme::Terminator => {
                    end_line(&mut lines, &mut current);
                    lines.push(Line::Terminator);
                }
                Lexeme::Newline => end_line(&mut lines, &mut current),
            }
            pos += 1;
        }

        end_line(&mut lines, &mut current);
        Ok(BlockTree { lines })
    }

    /// Index of the `}` closing the `{` at `open`.
    fn matching_close(&self, open: usize, end: usize) -> Result<usize, ParseError> {
        let mut depth = 0usize;
        for pos in open..end {
            match self.lexemes[pos].token {
                Lexeme::Open => depth += 1,
                Lexeme::Close => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(pos);
                    }
                }
                _ => {}
            }
        }
        Err(ParseError::UnclosedBlock(self.lexemes[open].span.clone()))
    }
}

fn end_line(lines: &mut Vec<Line>, current: &mut Vec<Element>) {
    if !current.is_empty() {
        lines.push(Line::Plain(std::mem::take(current)));
    }
}
