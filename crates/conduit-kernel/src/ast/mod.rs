//! Syntax tree for conduit commands: lines, blocks and pipe routes.

mod types;

pub use types::*;
