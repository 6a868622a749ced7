//! Built-in tools for conduit.
//!
//! Tools run in-process as tokio tasks on byte channels, the same interface
//! a spawned process gets. Two registries feed the evaluator chain:
//!
//! ```text
//! structures ── true, false
//! library ───── echo, cat, pwd, env
//! ```

mod builtin;
mod registry;
mod traits;

pub use builtin::{library, structures};
pub use registry::{ToolEvaluator, ToolRegistry};
pub use traits::{Tool, ToolIo};
