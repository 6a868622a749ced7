//! Statement graph resolution.
//!
//! [`separate`] flattens a [`BlockTree`] into statements and turns every pipe
//! route into an edge between two concrete statements.
//!
//! ```text
//! echo hi | grep h        #0 echo hi   dest: [1 -> #1.0]   root
//!                         #1 grep h                        (fed by #0)
//! ```
//!
//! Offsets are fixed against the statement count at the pipe token. Labels
//! are looked up once the whole block is known, so a route may name a
//! statement before or after it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::ast::{BlockTree, Element, Fd, Index, Line, Route};

/// Index of a statement within its [`StatementGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatementId(pub usize);

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where offsets count from.
///
/// A source offset resolves to `count + source + offset` and a destination
/// offset to `count + destination + offset`, where `count` is the number of
/// statements before the pipe token. The defaults make `|` mean "previous
/// statement to next statement".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteAnchors {
    pub source: i64,
    pub destination: i64,
}

impl Default for RouteAnchors {
    fn default() -> Self {
        Self {
            source: 0,
            destination: -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unknown label `{label}` in `{token}`")]
    UnknownLabel { label: String, token: String },
    #[error("label `{0}` is used twice")]
    DuplicateLabel(String),
    #[error("`{token}` points at statement {position}, but there are {count}")]
    OffsetOutOfRange {
        token: String,
        position: i64,
        count: usize,
    },
    #[error("label `{0}` has no command")]
    EmptyLabelledStatement(String),
    #[error("statement {0} can never start: nothing outside its pipe cycle feeds it")]
    Unreachable(StatementId),
    #[error("statement {0} is fed from both sides of a `;`")]
    CrossesBarrier(StatementId),
}

/// A resolved argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Word(String),
    Block(Arc<StatementGraph>),
}

/// A resolved outgoing stream of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Route {
        from_fd: Fd,
        to_fd: Fd,
        target: StatementId,
    },
    Cork {
        from_fd: Fd,
    },
}

impl Edge {
    pub fn from_fd(&self) -> Fd {
        match self {
            Edge::Route { from_fd, .. } | Edge::Cork { from_fd } => *from_fd,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub args: Vec<Arg>,
    pub label: Option<String>,
    /// Not the target of any route; reads the block's own stdin.
    pub is_root: bool,
    pub dest: Vec<Edge>,
}

impl Statement {
    /// The statement's first word, for logs.
    pub fn name(&self) -> &str {
        match self.args.first() {
            Some(Arg::Word(word)) => word,
            Some(Arg::Block(_)) => "{...}",
            None => "",
        }
    }

    /// Whether some edge uses `fd` as its source.
    pub fn routes_from(&self, fd: Fd) -> bool {
        self.dest.iter().any(|edge| edge.from_fd() == fd)
    }
}

/// One step of a block's top-level sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Start a root statement and everything its routes reach.
    Run(StatementId),
    /// `;`: wait for the last started group; stop if it failed.
    Barrier,
}

/// Statements of one block plus the order to start them in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatementGraph {
    statements: Vec<Statement>,
    sequence: Vec<Step>,
}

impl StatementGraph {
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn statement(&self, id: StatementId) -> &Statement {
        &self.statements[id.0]
    }

    pub fn sequence(&self) -> &[Step] {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn roots(&self) -> impl Iterator<Item = StatementId> + '_ {
        self.sequence.iter().filter_map(|step| match step {
            Step::Run(id) => Some(*id),
            Step::Barrier => None,
        })
    }

    /// `start` and every statement its routes reach, in discovery order.
    pub fn reachable(&self, start: StatementId) -> Vec<StatementId> {
        let mut seen = vec![false; self.statements.len()];
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.0], true) {
                continue;
            }
            order.push(id);
            for edge in self.statements[id.0].dest.iter().rev() {
                if let Edge::Route { target, .. } = edge {
                    stack.push(*target);
                }
            }
        }
        order
    }
}

/// A route waiting for label resolution.
struct PendingRoute {
    token: String,
    /// Statements created before the pipe token.
    count: usize,
    route: Route,
}

/// Resolve a tree into a statement graph, using `anchors` for offsets.
///
/// Nested blocks are resolved too, so any error anywhere in the command
/// surfaces before execution starts.
pub fn separate(tree: &BlockTree, anchors: RouteAnchors) -> Result<StatementGraph, ResolveError> {
    let mut statements: Vec<Statement> = Vec::new();
    let mut order = Vec::new();
    let mut pending = Vec::new();
    let mut labels: HashMap<String, StatementId> = HashMap::new();

    for line in &tree.lines {
        match line {
            Line::Plain(elements) => {
                let id = StatementId(statements.len());
                let statement = statement_from(elements, anchors)?;
                if let Some(label) = &statement.label
                    && labels.insert(label.clone(), id).is_some()
                {
                    return Err(ResolveError::DuplicateLabel(label.clone()));
                }
                statements.push(statement);
                order.push(Step::Run(id));
            }
            Line::Pipe(pipe) => {
                pending.extend(pipe.routes.iter().map(|route| PendingRoute {
                    token: pipe.text.clone(),
                    count: statements.len(),
                    route: route.clone(),
                }));
            }
            Line::Terminator => order.push(Step::Barrier),
        }
    }

    let lookup = |index: &Index, count: usize, anchor: i64, token: &str| {
        match index {
            Index::Label(label) => labels.get(label).copied().ok_or_else(|| ResolveError::UnknownLabel {
                label: label.clone(),
                token: token.to_string(),
            }),
            Index::Offset(offset) => {
                let position = (count as i64).saturating_add(anchor).saturating_add(*offset);
                if position < 0 || position >= statements.len() as i64 {
                    return Err(ResolveError::OffsetOutOfRange {
                        token: token.to_string(),
                        position,
                        count: statements.len(),
                    });
                }
                Ok(StatementId(position as usize))
            }
        }
    };

    let mut edges = Vec::with_capacity(pending.len());
    for PendingRoute { token, count, route } in &pending {
        let source = route.source();
        let from = lookup(&source.index, *count, anchors.source, token)?;
        let edge = match route.destination() {
            Some(to) => Edge::Route {
                from_fd: source.fd,
                to_fd: to.fd,
                target: lookup(&to.index, *count, anchors.destination, token)?,
            },
            None => Edge::Cork { from_fd: source.fd },
        };
        edges.push((from, edge));
    }

    for (from, edge) in edges {
        if let Edge::Route { target, .. } = edge {
            statements[target.0].is_root = false;
        }
        statements[from.0].dest.push(edge);
    }

    let graph = StatementGraph {
        sequence: order
            .into_iter()
            .filter(|step| match step {
                Step::Run(id) => statements[id.0].is_root,
                Step::Barrier => true,
            })
            .collect(),
        statements,
    };

    // Everything feeding a statement starts between the same two barriers.
    let mut run_of: Vec<Option<usize>> = vec![None; graph.len()];
    let mut run = 0;
    for step in graph.sequence() {
        match *step {
            Step::Barrier => run += 1,
            Step::Run(root) => {
                for id in graph.reachable(root) {
                    match run_of[id.0] {
                        Some(earlier) if earlier != run => return Err(ResolveError::CrossesBarrier(id)),
                        _ => run_of[id.0] = Some(run),
                    }
                }
            }
        }
    }
    if let Some(stranded) = run_of.iter().position(Option::is_none) {
        return Err(ResolveError::Unreachable(StatementId(stranded)));
    }

    Ok(graph)
}

fn statement_from(elements: &[Element], anchors: RouteAnchors) -> Result<Statement, ResolveError> {
    let mut elements = elements;
    let mut label = None;
    if let Some((Element::Word(first), rest)) = elements.split_first()
        && let Some(name) = first.strip_suffix(':')
        && !name.is_empty()
    {
        if rest.is_empty() {
            return Err(ResolveError::EmptyLabelledStatement(name.to_string()));
        }
        label = Some(name.to_string());
        elements = rest;
    }

    let args = elements
        .iter()
        .map(|element| match element {
            Element::Word(word) => Ok(Arg::Word(word.clone())),
            Element::Block(tree) => separate(tree, anchors).map(|g| Arg::Block(Arc::new(g))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Statement {
        args,
        label,
        is_root: true,
        dest: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn resolve(source: &str) -> Result<StatementGraph, ResolveError> {
        separate(&parse(source).expect("parse failed"), RouteAnchors::default())
    }

    #[test]
    fn default_pipe_links_neighbours() {
        let graph = resolve("echo hi | grep h").unwrap();
        assert_eq!(graph.len(), 2);
        assert!(graph.statement(StatementId(0)).is_root);
        assert!(!graph.statement(StatementId(1)).is_root);
        assert_eq!(
            graph.statement(StatementId(0)).dest,
            vec![Edge::Route {
                from_fd: Fd::Stdout,
                to_fd: Fd::Stdin,
                target: StatementId(1)
            }]
        );
        assert_eq!(graph.sequence(), &[Step::Run(StatementId(0))]);
    }

    #[test]
    fn reachable_follows_routes() {
        let graph = resolve("a | b | c").unwrap();
        assert_eq!(
            graph.reachable(StatementId(0)),
            vec![StatementId(0), StatementId(1), StatementId(2)]
        );
    }

    #[test]
    fn custom_anchors_shift_offsets() {
        let tree = parse("a |.1>0 b").unwrap();
        let anchors = RouteAnchors {
            source: 0,
            destination: 0,
        };
        let graph = separate(&tree, anchors).unwrap();
        assert_eq!(
            graph.statement(StatementId(0)).dest,
            vec![Edge::Route {
                from_fd: Fd::Stdout,
                to_fd: Fd::Stdin,
                target: StatementId(1)
            }]
        );
    }

    #[test]
    fn offset_past_the_end_fails() {
        let err = resolve("a |").unwrap_err();
        assert_eq!(
            err,
            ResolveError::OffsetOutOfRange {
                token: "|".into(),
                position: 1,
                count: 1
            }
        );
    }

    #[test]
    fn label_only_line_fails() {
        assert_eq!(
            resolve("build:").unwrap_err(),
            ResolveError::EmptyLabelledStatement("build".into())
        );
    }

    #[test]
    fn nested_block_errors_surface() {
        assert!(matches!(
            resolve("echo { x |nope }").unwrap_err(),
            ResolveError::UnknownLabel { .. }
        ));
    }
}
