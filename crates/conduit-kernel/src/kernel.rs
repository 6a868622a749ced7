//! The Kernel: configuration plus an engine with the standard evaluator chain.
//!
//! ```text
//! source ──▶ Command::from_source ──▶ Command ──▶ Engine::run ──▶ Running
//!                 (lex, tree, graph)                (channels, tasks)
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::command::{Command, CommandError};
use crate::dispatch::Dispatcher;
use crate::graph::RouteAnchors;
use crate::process::ProcessEvaluator;
use crate::scheduler::{Engine, Running};
use crate::tools::{ToolEvaluator, library, structures};

/// Environment handed to every runner. `PWD` is the working directory.
pub type Env = BTreeMap<String, String>;

/// The current process environment, with `PWD` set to the real working
/// directory.
pub fn process_env() -> Env {
    let mut env: Env = std::env::vars().collect();
    if let Ok(cwd) = std::env::current_dir() {
        env.insert("PWD".to_string(), cwd.display().to_string());
    }
    env
}

/// Configuration for a kernel instance.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Name of this kernel (for identification in logs).
    pub name: String,

    /// Directories searched for executables, in order.
    pub search_path: Vec<PathBuf>,

    /// How pipe offsets are counted.
    pub anchors: RouteAnchors,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            search_path: Vec::new(),
            anchors: RouteAnchors::default(),
        }
    }
}

impl KernelConfig {
    /// Create a config with the given name and no search path.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Config whose search path comes from `PATH`.
    pub fn from_env() -> Self {
        let search_path = std::env::var_os("PATH")
            .map(|path| std::env::split_paths(&path).collect())
            .unwrap_or_default();
        Self {
            search_path,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_search_path<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_path = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_anchors(mut self, anchors: RouteAnchors) -> Self {
        self.anchors = anchors;
        self
    }
}

/// Parses and runs commands.
#[derive(Debug, Clone)]
pub struct Kernel {
    config: KernelConfig,
    engine: Engine,
}

impl Kernel {
    /// Kernel with the standard chain: structures, library, processes.
    pub fn new(config: KernelConfig) -> Self {
        let dispatcher = Self::standard_dispatcher(&config);
        Self::with_dispatcher(config, dispatcher)
    }

    /// Kernel with a caller-supplied evaluator chain.
    pub fn with_dispatcher(config: KernelConfig, dispatcher: Dispatcher) -> Self {
        tracing::debug!(kernel = %config.name, chain = ?dispatcher, "kernel created");
        Self {
            config,
            engine: Engine::new(dispatcher),
        }
    }

    pub fn standard_dispatcher(config: &KernelConfig) -> Dispatcher {
        Dispatcher::new()
            .with(ToolEvaluator::new("structures", structures()))
            .with(ToolEvaluator::new("library", library()))
            .with(ProcessEvaluator::new(config.search_path.clone()))
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Parse `source` with this kernel's offset anchors.
    pub fn parse(&self, source: &str) -> Result<Command, CommandError> {
        Command::from_source_with(source, self.config.anchors)
    }

    /// Parse and start `source`. Must be called inside a tokio runtime.
    pub fn execute(&self, source: &str, env: Env) -> Result<Running, CommandError> {
        Ok(self.parse(source)?.run(&self.engine, env))
    }
}
