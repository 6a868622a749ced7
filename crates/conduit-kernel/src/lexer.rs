//! Lexer for conduit command text.
//!
//! Source text is first cut into fragments by logos (escapes, quoted strings,
//! comments, braces, whitespace, bare text). A small fold over those
//! fragments then assembles words, tracking brace depth and whether a word
//! contained quoted or escaped characters.
//!
//! # Rules
//!
//! - `\x` puts `x` into the current word literally
//! - `#` comments run through the end of the line, newline included
//! - `"..."` is always one word, even when empty
//! - `{` and `}` end the current word and are lexemes of their own
//! - `;` is a terminator at depth 0 and an ordinary character inside braces
//! - whitespace ends a word; a newline is also a lexeme
//! - a bare word starting with `|` or `>` is a pipe route
//!
//! CRLF counts as a single newline everywhere.

use std::collections::VecDeque;
use std::fmt;

use logos::{Logos, Span};
use thiserror::Error;

/// A lexeme with its byte span in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(token: T, span: Span) -> Self {
        Self { token, span }
    }
}

/// Lexer error types.
#[derive(Debug, Clone, PartialEq, Eq, Default, Error)]
pub enum LexError {
    #[default]
    #[error("unexpected character")]
    UnexpectedCharacter,
    #[error("unterminated string")]
    UnterminatedString,
    #[error("backslash at end of input")]
    DanglingEscape,
    #[error("unmatched '}}'")]
    UnmatchedClose,
}

impl LexError {
    /// True when more input could turn this into a valid command.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, LexError::UnterminatedString | LexError::DanglingEscape)
    }
}

/// Lexemes handed to the tree builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lexeme {
    /// A plain word.
    Word(String),
    /// A pipe-route token such as `|`, `|.2>`, `>build`.
    Route(String),
    /// `{`
    Open,
    /// `}`
    Close,
    Newline,
    /// `;` at brace depth 0.
    Terminator,
}

impl fmt::Display for Lexeme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lexeme::Word(w) => write!(f, "{w:?}"),
            Lexeme::Route(r) => write!(f, "route {r}"),
            Lexeme::Open => write!(f, "{{"),
            Lexeme::Close => write!(f, "}}"),
            Lexeme::Newline => write!(f, "newline"),
            Lexeme::Terminator => write!(f, ";"),
        }
    }
}

/// Raw fragments recognised by logos.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexError)]
enum Fragment {
    #[regex(r"\\[\s\S]", lex_escape)]
    #[regex(r"\\\r\n", |_| "\n".to_string())]
    Escaped(String),

    #[regex(r#""([^"\\]|\\[\s\S])*""#, lex_quoted)]
    Quoted(String),

    #[regex(r"#[^\n]*\n?", allow_greedy = true)]
    Comment,

    #[token("{")]
    Open,

    #[token("}")]
    Close,

    #[token(";")]
    Semi,

    #[regex(r"\r?\n")]
    Newline,

    #[regex(r"[^\S\n]+")]
    Space,

    #[regex(r#"[^\s{}";#\\]+"#, |lex| lex.slice().to_string(), allow_greedy = true)]
    Text(String),
}

fn lex_escape(lex: &mut logos::Lexer<Fragment>) -> String {
    lex.slice()[1..].to_string()
}

/// Strip the quotes, resolve `\x` to `x`, fold CRLF to LF.
fn lex_quoted(lex: &mut logos::Lexer<Fragment>) -> String {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    if next == '\r' && chars.peek() == Some(&'\n') {
                        continue;
                    }
                    out.push(next);
                }
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            other => out.push(other),
        }
    }
    out
}

/// Lazy lexeme iterator over one source string.
///
/// Stops after the first error.
pub struct Lexer<'src> {
    fragments: logos::Lexer<'src, Fragment>,
    pending: VecDeque<Spanned<Lexeme>>,
    word: String,
    word_span: Option<Span>,
    /// The current word holds quoted or escaped characters.
    verbatim: bool,
    depth: usize,
    finished: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            fragments: Fragment::lexer(source),
            pending: VecDeque::new(),
            word: String::new(),
            word_span: None,
            verbatim: false,
            depth: 0,
            finished: false,
        }
    }

    fn extend_word(&mut self, text: &str, span: Span, verbatim: bool) {
        self.word.push_str(text);
        self.verbatim |= verbatim;
        self.word_span = Some(match self.word_span.take() {
            Some(existing) => existing.start..span.end,
            None => span,
        });
    }

    /// End the current word. Empty bare words vanish; empty quoted ones stay.
    fn flush(&mut self, at: usize) {
        let span = self.word_span.take().unwrap_or(at..at);
        let word = std::mem::take(&mut self.word);
        let verbatim = std::mem::replace(&mut self.verbatim, false);
        if word.is_empty() && !verbatim {
            return;
        }
        let lexeme = if !verbatim && (word.starts_with('|') || word.starts_with('>')) {
            Lexeme::Route(word)
        } else {
            Lexeme::Word(word)
        };
        self.pending.push_back(Spanned::new(lexeme, span));
    }

    fn emit(&mut self, lexeme: Lexeme, span: Span) {
        self.flush(span.start);
        self.pending.push_back(Spanned::new(lexeme, span));
    }

    fn fail(&mut self, error: LexError, span: Span) -> Option<Result<Spanned<Lexeme>, Spanned<LexError>>> {
        self.finished = true;
        self.pending.clear();
        Some(Err(Spanned::new(error, span)))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Spanned<Lexeme>, Spanned<LexError>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(lexeme) = self.pending.pop_front() {
                return Some(Ok(lexeme));
            }
            if self.finished {
                return None;
            }

            let Some(result) = self.fragments.next() else {
                self.finished = true;
                let end = self.fragments.source().len();
                self.flush(end);
                continue;
            };
            let span = self.fragments.span();

            let fragment = match result {
                Ok(fragment) => fragment,
                Err(_) => {
                    let slice = self.fragments.slice();
                    let error = if slice.starts_with('"') {
                        LexError::UnterminatedString
                    } else if slice.starts_with('\\') {
                        LexError::DanglingEscape
                    } else {
                        LexError::UnexpectedCharacter
                    };
                    return self.fail(error, span);
                }
            };

            match fragment {
                Fragment::Escaped(text) => self.extend_word(&text, span, true),
                Fragment::Text(text) => self.extend_word(&text, span, false),
                Fragment::Quoted(text) => {
                    self.extend_word(&text, span.clone(), true);
                    self.flush(span.end);
                }
                Fragment::Comment | Fragment::Space => self.flush(span.start),
                Fragment::Newline => self.emit(Lexeme::Newline, span),
                Fragment::Semi if self.depth == 0 => self.emit(Lexeme::Terminator, span),
                Fragment::Semi => self.extend_word(";", span, false),
                Fragment::Open => {
                    self.depth += 1;
                    self.emit(Lexeme::Open, span);
                }
                Fragment::Close => {
                    if self.depth == 0 {
                        return self.fail(LexError::UnmatchedClose, span);
                    }
                    self.depth -= 1;
                    self.emit(Lexeme::Close, span);
                }
            }
        }
    }
}

/// Tokenize source text into a vector of spanned lexemes.
pub fn tokenize(source: &str) -> Result<Vec<Spanned<Lexeme>>, Spanned<LexError>> {
    Lexer::new(source).collect()
}
