//! Runner selection: the evaluator chain.
//!
//! Each statement's resolved argv is offered to a list of evaluators in
//! order. The first one that starts something wins; `NoMatch` and errors
//! both fall through to the next.
//!
//! ```text
//! argv ──▶ structures (true, false)
//!              │ NoMatch
//!              ▼
//!          library (echo, cat, pwd, env)
//!              │ NoMatch
//!              ▼
//!          process (search path lookup, spawn)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::kernel::Env;
use crate::scheduler::Running;

/// Why a statement could not be started.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}: command not found")]
    NotFound(String),
    #[error("{}: permission denied", .0.display())]
    NotExecutable(PathBuf),
    #[error("{}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("empty command")]
    EmptyCommand,
}

/// Outcome of offering argv to one evaluator.
#[derive(Debug)]
pub enum Evaluation {
    Started(Running),
    NoMatch,
}

/// One link of the runner chain.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Start `argv` if this evaluator handles it.
    async fn try_eval(&self, argv: &[String], env: &Env) -> Result<Evaluation, EngineError>;
}

/// Ordered evaluator chain.
#[derive(Clone, Default)]
pub struct Dispatcher {
    evaluators: Vec<Arc<dyn Evaluator>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an evaluator; it is tried after the ones already present.
    pub fn with(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluators.push(Arc::new(evaluator));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.evaluators.iter().map(|e| e.name()).collect()
    }

    /// Start `argv` with the first evaluator that accepts it.
    ///
    /// When nothing starts, the last evaluator error is returned, or
    /// `NotFound` if every evaluator declined.
    pub async fn dispatch(&self, argv: &[String], env: &Env) -> Result<Running, EngineError> {
        let Some(name) = argv.first() else {
            return Err(EngineError::EmptyCommand);
        };

        let mut last_error = None;
        for evaluator in &self.evaluators {
            match evaluator.try_eval(argv, env).await {
                Ok(Evaluation::Started(running)) => {
                    tracing::debug!(command = %name, evaluator = evaluator.name(), "started");
                    return Ok(running);
                }
                Ok(Evaluation::NoMatch) => {}
                Err(e) => {
                    tracing::debug!(command = %name, evaluator = evaluator.name(), error = %e, "evaluator failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| EngineError::NotFound(name.clone())))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
