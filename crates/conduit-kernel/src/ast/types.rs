//! AST type definitions.

use std::fmt;

/// A standard stream number as it appears in a pipe route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Fd {
    Stdin = 0,
    Stdout = 1,
    Stderr = 2,
}

impl Fd {
    pub const ALL: [Fd; 3] = [Fd::Stdin, Fd::Stdout, Fd::Stderr];

    pub fn from_number(n: u32) -> Option<Fd> {
        match n {
            0 => Some(Fd::Stdin),
            1 => Some(Fd::Stdout),
            2 => Some(Fd::Stderr),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// How a route endpoint names its statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Index {
    /// Relative to the position of the pipe token.
    Offset(i64),
    /// A statement label, anywhere in the same block.
    Label(String),
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::Offset(n) if *n > 0 => write!(f, "+{n}"),
            Index::Offset(n) => write!(f, "{n}"),
            Index::Label(label) => write!(f, "{label}"),
        }
    }
}

/// One side of a route: a statement and one of its streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub index: Index,
    pub fd: Fd,
}

impl Endpoint {
    pub fn new(index: Index, fd: Fd) -> Self {
        Self { index, fd }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.index, self.fd)
    }
}

/// One comma-separated element of a pipe token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// Stream `from` feeds stream `to`.
    Connect { from: Endpoint, to: Endpoint },
    /// Stream `from` is drained and discarded.
    Cork { from: Endpoint },
}

impl Route {
    pub fn source(&self) -> &Endpoint {
        match self {
            Route::Connect { from, .. } | Route::Cork { from } => from,
        }
    }

    pub fn destination(&self) -> Option<&Endpoint> {
        match self {
            Route::Connect { to, .. } => Some(to),
            Route::Cork { .. } => None,
        }
    }

    pub fn is_corked(&self) -> bool {
        matches!(self, Route::Cork { .. })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Connect { from, to } => write!(f, "{from}>{to}"),
            Route::Cork { from } => write!(f, "{from}>"),
        }
    }
}

/// A parsed pipe token. Keeps the token text for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeDescriptor {
    pub text: String,
    pub routes: Vec<Route>,
}

/// A sequence of lines; the top level of a command or the body of `{ ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockTree {
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Words and nested blocks forming one statement.
    Plain(Vec<Element>),
    /// A pipe token between statements.
    Pipe(PipeDescriptor),
    /// `;`
    Terminator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Word(String),
    Block(BlockTree),
}

impl BlockTree {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Characters that would change meaning if a word were written bare.
fn needs_quotes(word: &str) -> bool {
    word.is_empty()
        || word.starts_with('|')
        || word.starts_with('>')
        || word
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '{' | '}' | '"' | ';' | '#' | '\\'))
}

fn write_word(f: &mut fmt::Formatter<'_>, word: &str) -> fmt::Result {
    if !needs_quotes(word) {
        return f.write_str(word);
    }
    f.write_str("\"")?;
    for c in word.chars() {
        if matches!(c, '"' | '\\') {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    f.write_str("\"")
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Word(word) => write_word(f, word),
            Element::Block(tree) if tree.is_empty() => f.write_str("{ }"),
            Element::Block(tree) => write!(f, "{{ {tree} }}"),
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Plain(elements) => {
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{element}")?;
                }
                Ok(())
            }
            Line::Pipe(pipe) => f.write_str(&pipe.text),
            Line::Terminator => f.write_str(";"),
        }
    }
}

/// Re-serializes to source text that parses back to an equal tree.
impl fmt::Display for BlockTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut previous: Option<&Line> = None;
        for line in &self.lines {
            match (previous, line) {
                (None, _) => {}
                (Some(Line::Plain(_)), Line::Plain(_)) => f.write_str("\n")?,
                _ => f.write_str(" ")?,
            }
            write!(f, "{line}")?;
            previous = Some(line);
        }
        Ok(())
    }
}
