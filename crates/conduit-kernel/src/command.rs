//! Parse entry point: source text to a runnable [`Command`].

use std::sync::Arc;

use thiserror::Error;

use crate::ast::BlockTree;
use crate::graph::{ResolveError, RouteAnchors, StatementGraph, separate};
use crate::kernel::Env;
use crate::parser::{ParseError, parse};
use crate::scheduler::{Engine, Running};

/// Anything that stops source text from becoming a command.
///
/// Nothing has been started when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl CommandError {
    /// More input (an open block or string) could still complete the command.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, CommandError::Parse(e) if e.is_incomplete())
    }
}

/// A parsed and resolved command, ready to run any number of times.
#[derive(Debug, Clone)]
pub struct Command {
    source: String,
    tree: BlockTree,
    graph: Arc<StatementGraph>,
}

impl Command {
    pub fn from_source(source: &str) -> Result<Self, CommandError> {
        Self::from_source_with(source, RouteAnchors::default())
    }

    pub fn from_source_with(source: &str, anchors: RouteAnchors) -> Result<Self, CommandError> {
        let tree = parse(source)?;
        let graph = separate(&tree, anchors)?;
        Ok(Self {
            source: source.to_string(),
            tree,
            graph: Arc::new(graph),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &BlockTree {
        &self.tree
    }

    pub fn graph(&self) -> &StatementGraph {
        &self.graph
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Start the command on `engine`.
    pub fn run(&self, engine: &Engine, env: Env) -> Running {
        engine.run(&self.graph, env)
    }
}
