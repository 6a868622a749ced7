//! Test helpers shared by conduit crates.

pub mod sexpr;

pub use sexpr::{format_graph, format_tree};
