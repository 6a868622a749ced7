//! Tool lookup by name, and the evaluator that starts registered tools.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Tool, ToolIo};
use crate::dispatch::{EngineError, Evaluation, Evaluator};
use crate::kernel::Env;
use crate::scheduler::Running;

/// Named tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool of the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Evaluator over a [`ToolRegistry`].
#[derive(Debug, Clone)]
pub struct ToolEvaluator {
    name: &'static str,
    registry: Arc<ToolRegistry>,
}

impl ToolEvaluator {
    pub fn new(name: &'static str, registry: ToolRegistry) -> Self {
        Self {
            name,
            registry: Arc::new(registry),
        }
    }
}

#[async_trait]
impl Evaluator for ToolEvaluator {
    fn name(&self) -> &str {
        self.name
    }

    async fn try_eval(&self, argv: &[String], env: &Env) -> Result<Evaluation, EngineError> {
        let Some(tool) = argv.first().and_then(|name| self.registry.get(name)) else {
            return Ok(Evaluation::NoMatch);
        };
        let args = argv[1..].to_vec();
        let env = env.clone();
        Ok(Evaluation::Started(Running::spawn(
            move |stdin, stdout, stderr| async move {
                let io = ToolIo { stdin, stdout, stderr };
                tool.execute(&args, &io, &env).await
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{library, structures};

    #[test]
    fn names_are_sorted() {
        let lib = library();
        let names: Vec<&str> = lib.names().collect();
        assert_eq!(names, vec!["cat", "echo", "env", "pwd"]);
    }

    #[tokio::test]
    async fn unknown_names_are_declined() {
        let evaluator = ToolEvaluator::new("structures", structures());
        let argv = vec!["echo".to_string()];
        let result = evaluator.try_eval(&argv, &Env::new()).await.unwrap();
        assert!(matches!(result, Evaluation::NoMatch));
    }

    #[tokio::test]
    async fn tools_get_argv_without_their_name() {
        let evaluator = ToolEvaluator::new("library", library());
        let argv = vec!["echo".to_string(), "a".to_string(), "b".to_string()];
        let Evaluation::Started(running) = evaluator.try_eval(&argv, &Env::new()).await.unwrap() else {
            panic!("echo should start");
        };
        assert!(running.exit().await);
        assert_eq!(running.stdout.collect().await, b"a b\n");
    }
}
