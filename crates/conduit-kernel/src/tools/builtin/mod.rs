//! Built-in tools.

mod cat;
mod echo;
mod env;
mod pwd;
mod true_false;

use super::ToolRegistry;

/// Language structures: tried before anything else.
pub fn structures() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(true_false::True);
    registry.register(true_false::False);
    registry
}

/// Library functions: tried before spawning a process.
pub fn library() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(cat::Cat);
    registry.register(echo::Echo);
    registry.register(env::PrintEnv);
    registry.register(pwd::Pwd);
    registry
}
