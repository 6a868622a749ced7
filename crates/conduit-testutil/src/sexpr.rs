//! S-expression formatter for conduit trees and statement graphs.
//!
//! Compact, one-line renderings that make snapshot tests readable:
//!
//! ```text
//! echo hi | grep h
//!   tree:  (block (cmd echo hi) (pipe -1.1>+1.0) (cmd grep h))
//!   graph: (graph (#0 root echo hi (1 -> #1.0)) (#1 grep h) (seq #0))
//! ```

use conduit_kernel::ast::{BlockTree, Element, Line, Route};
use conduit_kernel::graph::{Arg, Edge, Statement, StatementGraph, Step};

/// Format a block tree as an S-expression.
pub fn format_tree(tree: &BlockTree) -> String {
    let mut parts = vec!["(block".to_string()];
    parts.extend(tree.lines.iter().map(format_line));
    format!("{})", parts.join(" "))
}

fn format_line(line: &Line) -> String {
    match line {
        Line::Plain(elements) => {
            let mut parts = vec!["(cmd".to_string()];
            parts.extend(elements.iter().map(format_element));
            format!("{})", parts.join(" "))
        }
        Line::Pipe(pipe) => {
            let routes: Vec<String> = pipe.routes.iter().map(format_route).collect();
            format!("(pipe {})", routes.join(" "))
        }
        Line::Terminator => "(;)".to_string(),
    }
}

fn format_element(element: &Element) -> String {
    match element {
        Element::Word(word) => format_word(word),
        Element::Block(tree) => format_tree(tree),
    }
}

fn format_route(route: &Route) -> String {
    match route {
        Route::Connect { from, to } => format!("{from}>{to}"),
        Route::Cork { from } => format!("{from}>cork"),
    }
}

/// Words with spaces or parens are quoted so the output stays unambiguous.
fn format_word(word: &str) -> String {
    if word.is_empty() || word.chars().any(|c| c.is_whitespace() || c == '(' || c == ')' || c == '"') {
        format!("{word:?}")
    } else {
        word.to_string()
    }
}

/// Format a resolved statement graph as an S-expression.
pub fn format_graph(graph: &StatementGraph) -> String {
    let mut parts = vec!["(graph".to_string()];
    parts.extend(
        graph
            .statements()
            .iter()
            .enumerate()
            .map(|(i, s)| format_statement(i, s)),
    );
    let seq: Vec<String> = graph
        .sequence()
        .iter()
        .map(|step| match step {
            Step::Run(id) => id.to_string(),
            Step::Barrier => ";".to_string(),
        })
        .collect();
    parts.push(if seq.is_empty() {
        "(seq)".to_string()
    } else {
        format!("(seq {})", seq.join(" "))
    });
    format!("{})", parts.join(" "))
}

fn format_statement(index: usize, statement: &Statement) -> String {
    let mut parts = vec![format!("(#{index}")];
    if statement.is_root {
        parts.push("root".to_string());
    }
    if let Some(label) = &statement.label {
        parts.push(format!("{label}:"));
    }
    parts.extend(statement.args.iter().map(|arg| match arg {
        Arg::Word(word) => format_word(word),
        Arg::Block(inner) => format_graph(inner),
    }));
    parts.extend(statement.dest.iter().map(|edge| match edge {
        Edge::Route { from_fd, to_fd, target } => format!("({from_fd} -> {target}.{to_fd})"),
        Edge::Cork { from_fd } => format!("({from_fd} -> cork)"),
    }));
    format!("{})", parts.join(" "))
}
