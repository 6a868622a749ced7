//! conduit-kernel: the core of the conduit command language.
//!
//! This crate provides:
//!
//! - **Lexer**: Splits source text into words, braces, routes and terminators (logos)
//! - **Parser**: Builds the nested block tree from lexemes
//! - **Routes**: Parses pipe-route tokens like `|build.2>test.0` (chumsky)
//! - **Graph**: Resolves routes and labels into a statement graph
//! - **Scheduler**: Byte channels and the engine that runs a graph
//! - **Dispatch**: The evaluator chain that picks a runner per statement
//! - **Process**: Executable lookup and OS process bridging
//! - **Tools**: In-process builtins (`true`, `false`, `echo`, `cat`, `pwd`, `env`)

pub mod ast;
pub mod command;
pub mod dispatch;
pub mod graph;
pub mod kernel;
pub mod lexer;
pub mod parser;
pub mod process;
pub mod route;
pub mod scheduler;
pub mod tools;

pub use command::{Command, CommandError};
pub use dispatch::{Dispatcher, EngineError, Evaluation, Evaluator};
pub use graph::{RouteAnchors, StatementGraph};
pub use kernel::{Env, Kernel, KernelConfig, process_env};
pub use scheduler::{ByteChannel, Engine, Running};
