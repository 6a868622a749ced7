//! conduit REPL: interactive front-end for the conduit kernel.
//!
//! Handles:
//! - Meta-commands: `/help`, `/quit`, `/tree`
//! - Continuation lines while a block or string is still open
//! - Streaming a command's output to the terminal as it is produced
//! - Command history via rustyline

pub mod cli;

use std::path::PathBuf;

use anyhow::{Context, Result};
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use tokio::io::AsyncWrite;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

use conduit_kernel::{ByteChannel, Kernel, Running, process_env};

/// Shown instead of the prompt while a command is incomplete.
pub const CONTINUATION_PROMPT: &str = "... ";

/// REPL settings.
#[derive(Debug, Clone)]
pub struct ReplConfig {
    /// Prompt template; `{cwd}` is replaced by the working directory.
    pub prompt: String,
    /// Where history is loaded from and saved to. `None` disables it.
    pub history_path: Option<PathBuf>,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: "{cwd}: ".to_string(),
            history_path: default_history_path(),
        }
    }
}

impl ReplConfig {
    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = prompt.to_string();
        self
    }

    pub fn with_history_path(mut self, path: Option<PathBuf>) -> Self {
        self.history_path = path;
        self
    }

    pub fn render_prompt(&self, cwd: &str) -> String {
        self.prompt.replace("{cwd}", cwd)
    }
}

/// `<data dir>/conduit/history.txt`, if the platform has a data dir.
pub fn default_history_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.data_dir().join("conduit").join("history.txt"))
}

/// What the loop should do after a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Handled; nothing to print.
    Done,
    /// Informational text for stdout.
    Message(String),
    /// An error for stderr.
    Error(String),
    /// The command so far is incomplete; read another line.
    NeedMore,
    Exit,
}

/// REPL state.
pub struct Repl {
    kernel: Kernel,
    runtime: Runtime,
    config: ReplConfig,
    show_tree: bool,
    pending: String,
    last_ok: bool,
}

impl Repl {
    pub fn new(kernel: Kernel, config: ReplConfig) -> Result<Self> {
        let runtime = Runtime::new().context("Failed to create tokio runtime")?;
        Ok(Self {
            kernel,
            runtime,
            config,
            show_tree: false,
            pending: String::new(),
            last_ok: true,
        })
    }

    /// Whether the most recent command succeeded.
    pub fn last_ok(&self) -> bool {
        self.last_ok
    }

    /// The prompt for the next line.
    pub fn prompt(&self) -> String {
        if !self.pending.is_empty() {
            return CONTINUATION_PROMPT.to_string();
        }
        let cwd = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        self.config.render_prompt(&cwd)
    }

    /// Drop a partially entered command.
    pub fn cancel(&mut self) {
        self.pending.clear();
    }

    /// Process one line of input.
    pub fn process_line(&mut self, line: &str) -> Reply {
        let trimmed = line.trim();

        if self.pending.is_empty() {
            if trimmed.starts_with('/') {
                return self.handle_meta_command(trimmed);
            }
            if trimmed.is_empty() {
                return Reply::Done;
            }
        } else {
            self.pending.push('\n');
        }
        self.pending.push_str(line);

        let command = match self.kernel.parse(&self.pending) {
            Ok(command) => command,
            Err(e) if e.is_incomplete() => return Reply::NeedMore,
            Err(e) => {
                self.pending.clear();
                self.last_ok = false;
                return Reply::Error(format!("conduit: {e}"));
            }
        };
        self.pending.clear();

        if self.show_tree {
            return Reply::Message(format!("{:#?}", command.tree()));
        }
        if command.is_empty() {
            return Reply::Done;
        }

        let engine = self.kernel.engine();
        self.last_ok = self.runtime.block_on(async {
            let running = command.run(engine, process_env());
            running.stdin.close();
            drain(&running, &mut tokio::io::stdout(), &mut tokio::io::stderr()).await
        });
        Reply::Done
    }

    fn handle_meta_command(&mut self, cmd: &str) -> Reply {
        let command = cmd.split_whitespace().next().unwrap_or("");

        match command {
            "/quit" | "/q" | "/exit" => Reply::Exit,
            "/help" | "/h" | "/?" => Reply::Message(HELP_TEXT.to_string()),
            "/tree" => {
                self.show_tree = !self.show_tree;
                Reply::Message(format!("Tree mode: {}", if self.show_tree { "ON" } else { "OFF" }))
            }
            _ => Reply::Error(format!("Unknown command: {command}\nType /help for available commands.")),
        }
    }

    /// Run the interactive loop until `/quit` or end of input.
    pub fn run(mut self) -> Result<()> {
        println!("conduit v{}", env!("CARGO_PKG_VERSION"));
        println!("Type /help for commands, /quit to exit.");

        let mut rl: Editor<(), DefaultHistory> = Editor::new().context("Failed to create editor")?;

        if let Some(path) = &self.config.history_path
            && let Err(e) = rl.load_history(path)
        {
            let is_not_found = matches!(&e, ReadlineError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound);
            if !is_not_found {
                tracing::warn!("Failed to load history: {}", e);
            }
        }

        loop {
            match rl.readline(&self.prompt()) {
                Ok(line) => {
                    if !line.trim().is_empty()
                        && let Err(e) = rl.add_history_entry(line.as_str())
                    {
                        tracing::warn!("Failed to add history entry: {}", e);
                    }

                    match self.process_line(&line) {
                        Reply::Done | Reply::NeedMore => {}
                        Reply::Message(text) => println!("{text}"),
                        Reply::Error(text) => eprintln!("{text}"),
                        Reply::Exit => break,
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    self.cancel();
                }
                Err(ReadlineError::Eof) => {
                    println!("^D");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {err}");
                    break;
                }
            }
        }

        save_history(&mut rl, &self.config.history_path);
        Ok(())
    }
}

/// Copy a running block's output into `out` and `err` until both close,
/// then return its exit status.
///
/// If a writer fails, that channel is closed so the block's writers see a
/// broken pipe instead of buffering forever.
pub async fn drain<O, E>(running: &Running, out: &mut O, err: &mut E) -> bool
where
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let (out_result, err_result) = tokio::join!(
        running.stdout.pump_into(out),
        running.stderr.pump_into(err)
    );
    if let Err(e) = out_result {
        tracing::debug!(error = %e, "stdout closed early");
        running.stdout.close();
    }
    if let Err(e) = err_result {
        tracing::debug!(error = %e, "stderr closed early");
        running.stderr.close();
    }
    running.exit().await
}

/// Copy this process's stdin into `channel` on a background task, closing
/// the channel at EOF.
pub fn forward_stdin(channel: &ByteChannel) -> JoinHandle<()> {
    let channel = channel.clone();
    tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        if let Err(e) = channel.pump_from(&mut stdin).await {
            tracing::debug!(error = %e, "stopped forwarding stdin");
        }
        channel.close();
    })
}

const HELP_TEXT: &str = r#"conduit REPL

Meta Commands:
  /help, /?         Show this help
  /quit, /q         Exit the REPL
  /tree             Toggle printing the parsed tree instead of running

Built-in Tools:
  true, false       Succeed or fail
  echo [args...]    Print arguments
  cat [files...]    Copy files (or stdin) to stdout
  pwd               Print working directory
  env               Print the environment

Anything else is looked up in PATH and run as a process.

Language:
  a; b              Run b only if a succeeded
  a | b             a's stdout into b's stdin
  a |.2 b           a's stderr into b's stdin
  a |.2> b          discard a's stderr
  a |>+1,>+2 b      a's stdout into both of the next two statements
  x: a |x.2>y.0 y: b   route between labelled statements
  echo {pwd}        substitute a block's output as a word
  { a | b } | c     a block used as one statement

Inside braces `;` is an ordinary character. Lines ending inside an open `{` or string continue on the next line.
"#;

/// Save REPL history to disk.
fn save_history(rl: &mut Editor<(), DefaultHistory>, history_path: &Option<PathBuf>) {
    if let Some(path) = history_path {
        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            tracing::warn!("Failed to create history directory: {}", e);
        }
        if let Err(e) = rl.save_history(path) {
            tracing::warn!("Failed to save history: {}", e);
        }
    }
}
