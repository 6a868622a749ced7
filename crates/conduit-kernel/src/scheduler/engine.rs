//! Statement graph execution.
//!
//! `Engine::run` wires every channel of a block up front, then hands the
//! top-level sequence to a driver task:
//!
//! ```text
//!  block stdin ──split──▶ root stdin
//!  stmt.fd ──split──join──▶ target.fd      (one per route edge)
//!  stmt.fd ──split──▶ discard              (corks)
//!  stmt.stdout / stmt.stderr ──join──▶ block stdout / stderr  (unrouted fds)
//!
//!  driver:  Run(root)  start root + everything it reaches, don't wait
//!           Barrier    wait for the last started group; stop if it failed
//! ```
//!
//! A statement's stdout and stderr are held open by placeholder feeds until
//! its runner is attached, so downstream readers never see an early close.
//! Statements that never start release their placeholders and close stdin.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use tracing::Instrument;

use super::channel::{ByteChannel, Feed};
use super::running::Running;
use super::state::StatementState;
use crate::ast::Fd;
use crate::dispatch::{Dispatcher, EngineError};
use crate::graph::{Arg, Edge, Statement, StatementGraph, StatementId, Step};
use crate::kernel::Env;

/// Runs statement graphs with a fixed evaluator chain. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Engine {
    dispatcher: Arc<Dispatcher>,
}

/// The three channels the rest of the block sees for one statement.
#[derive(Clone)]
struct StatementIo {
    stdin: ByteChannel,
    stdout: ByteChannel,
    stderr: ByteChannel,
}

impl StatementIo {
    fn new() -> Self {
        Self {
            stdin: ByteChannel::new(),
            stdout: ByteChannel::new(),
            stderr: ByteChannel::new(),
        }
    }

    fn channel(&self, fd: Fd) -> &ByteChannel {
        match fd {
            Fd::Stdin => &self.stdin,
            Fd::Stdout => &self.stdout,
            Fd::Stderr => &self.stderr,
        }
    }
}

/// What a statement's runner gets attached to.
struct Wiring {
    /// The runner's input: `stdin` itself, or a split of it when stdin is
    /// also routed elsewhere.
    input: ByteChannel,
    stdout_hold: Feed,
    stderr_hold: Feed,
}

impl Wiring {
    /// Give up without starting: release placeholders, refuse input.
    fn abandon(self) {
        self.input.close();
    }
}

type ExitFuture = Shared<BoxFuture<'static, bool>>;

impl Engine {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Start a block. Must be called inside a tokio runtime.
    ///
    /// Returns immediately; the block's statements start on background tasks.
    #[tracing::instrument(level = "debug", skip_all, fields(statements = graph.len()))]
    pub fn run(&self, graph: &Arc<StatementGraph>, env: Env) -> Running {
        let block = StatementIo::new();
        let out_hold = block.stdout.feed();
        let err_hold = block.stderr.feed();

        let ios: Vec<StatementIo> = (0..graph.len()).map(|_| StatementIo::new()).collect();
        let wirings = wire(graph, &block, &ios);

        drop(out_hold);
        drop(err_hold);

        let driver = Driver {
            engine: self.clone(),
            graph: Arc::clone(graph),
            ios,
            wirings,
            env,
        };
        let handle = tokio::spawn(driver.drive().in_current_span());

        Running::new(block.stdin, block.stdout, block.stderr, async move {
            handle.await.unwrap_or(false)
        })
    }

    /// Pick and start the runner for one statement.
    async fn start(&self, statement: &Statement, io: &StatementIo, env: &Env) -> Result<Running, EngineError> {
        if let [Arg::Block(inner)] = statement.args.as_slice() {
            return Ok(self.run(inner, env.clone()));
        }

        let mut argv = Vec::with_capacity(statement.args.len());
        for arg in &statement.args {
            match arg {
                Arg::Word(word) => argv.push(word.clone()),
                Arg::Block(inner) => argv.push(self.substitute(inner, io, env).await),
            }
        }
        self.dispatcher.dispatch(&argv, env).await
    }

    /// Run a block with closed stdin and return everything it printed.
    async fn substitute(&self, graph: &Arc<StatementGraph>, io: &StatementIo, env: &Env) -> String {
        let sub = self.run(graph, env.clone());
        sub.stdin.close();
        io.stderr.join(sub.stderr.clone());

        let captured = sub.stdout.collect().await;
        if !sub.exit().await {
            tracing::debug!("substituted block failed; using its output anyway");
        }
        String::from_utf8_lossy(&captured).into_owned()
    }
}

/// Connect every channel of the block before anything starts.
fn wire(graph: &StatementGraph, block: &StatementIo, ios: &[StatementIo]) -> Vec<Option<Wiring>> {
    let statements = graph.statements();

    let wirings = statements
        .iter()
        .zip(ios)
        .map(|(statement, io)| {
            let input = if statement.routes_from(Fd::Stdin) {
                io.stdin.split()
            } else {
                io.stdin.clone()
            };
            Some(Wiring {
                input,
                stdout_hold: io.stdout.feed(),
                stderr_hold: io.stderr.feed(),
            })
        })
        .collect();

    let mut stdin_routes = vec![0usize; statements.len()];
    for statement in statements {
        for edge in &statement.dest {
            if let Edge::Route { to_fd: Fd::Stdin, target, .. } = edge {
                stdin_routes[target.0] += 1;
            }
        }
    }

    for (index, (statement, io)) in statements.iter().zip(ios).enumerate() {
        let stdin_corked = statement
            .dest
            .iter()
            .any(|edge| matches!(edge, Edge::Cork { from_fd: Fd::Stdin }));

        if stdin_corked || (!statement.is_root && stdin_routes[index] == 0) {
            io.stdin.close();
        } else if statement.is_root {
            io.stdin.join(block.stdin.split());
        }

        for edge in &statement.dest {
            match *edge {
                Edge::Route { from_fd, to_fd, target } => {
                    let source = io.channel(from_fd).split();
                    ios[target.0].channel(to_fd).join(source);
                    tracing::trace!(from = index, from_fd = %from_fd, to = target.0, to_fd = %to_fd, "route");
                }
                Edge::Cork { from_fd: Fd::Stdin } => {}
                Edge::Cork { from_fd } => {
                    io.channel(from_fd).split().discard();
                }
            }
        }

        for fd in [Fd::Stdout, Fd::Stderr] {
            if !statement.routes_from(fd) {
                block.channel(fd).join(io.channel(fd).clone());
            }
        }
    }

    wirings
}

/// Walks the top-level sequence of one block.
struct Driver {
    engine: Engine,
    graph: Arc<StatementGraph>,
    ios: Vec<StatementIo>,
    wirings: Vec<Option<Wiring>>,
    env: Env,
}

impl Driver {
    async fn drive(mut self) -> bool {
        let mut started: Vec<ExitFuture> = Vec::new();
        let mut group: Vec<ExitFuture> = Vec::new();
        let mut stopped = false;

        let graph = Arc::clone(&self.graph);
        for step in graph.sequence() {
            match *step {
                Step::Run(root) => {
                    group.clear();
                    for id in graph.reachable(root) {
                        if let Some(exit) = self.launch(id) {
                            group.push(exit.clone());
                            started.push(exit);
                        }
                    }
                }
                Step::Barrier => {
                    let results = join_all(group.iter().cloned()).await;
                    if results.contains(&false) {
                        stopped = true;
                        break;
                    }
                }
            }
        }

        let mut untried = 0;
        for wiring in self.wirings.iter_mut().filter_map(Option::take) {
            wiring.abandon();
            untried += 1;
        }
        if untried > 0 {
            tracing::debug!(untried, stopped, "statements left unstarted");
        }

        let results = join_all(started).await;
        results.iter().all(|ok| *ok) && untried == 0
    }

    /// Start statement `id` unless it already started. Returns its exit.
    fn launch(&mut self, id: StatementId) -> Option<ExitFuture> {
        let wiring = self.wirings[id.0].take()?;
        let engine = self.engine.clone();
        let graph = Arc::clone(&self.graph);
        let io = self.ios[id.0].clone();
        let env = self.env.clone();

        let handle = tokio::spawn(
            async move {
                let statement = graph.statement(id);
                run_statement(&engine, statement, io, wiring, &env).await
            }
            .instrument(tracing::debug_span!("statement", id = id.0)),
        );
        Some(async move { handle.await.unwrap_or(false) }.boxed().shared())
    }
}

fn transition(state: &mut StatementState, next: StatementState, name: &str) {
    match state.advance(next) {
        Ok(()) => tracing::debug!(name, state = %state, "statement"),
        Err(e) => tracing::warn!(name, error = %e, "bad statement transition"),
    }
}

async fn run_statement(engine: &Engine, statement: &Statement, io: StatementIo, wiring: Wiring, env: &Env) -> bool {
    let name = statement.name();
    let mut state = StatementState::Pending;
    transition(&mut state, StatementState::Spawning, name);

    match engine.start(statement, &io, env).await {
        Ok(running) => {
            transition(&mut state, StatementState::Running, name);
            let Wiring {
                input,
                stdout_hold,
                stderr_hold,
            } = wiring;
            running.stdin.join(input.clone());
            io.stdout.join(running.stdout.clone());
            io.stderr.join(running.stderr.clone());
            drop(stdout_hold);
            drop(stderr_hold);

            let success = running.exit().await;
            input.close();
            transition(&mut state, StatementState::Exited { success }, name);
            success
        }
        Err(e) => {
            let _ = wiring.stderr_hold.write(format!("conduit: {e}\n"));
            wiring.abandon();
            transition(&mut state, StatementState::Exited { success: false }, name);
            false
        }
    }
}
