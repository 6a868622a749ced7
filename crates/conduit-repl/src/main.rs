//! conduit CLI entry point.
//!
//! Usage:
//!   conduit                    # Interactive prompt
//!   conduit -c <command>       # Run a command and exit
//!   conduit < script           # Run stdin as a script

use std::env;
use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use conduit_kernel::{Kernel, KernelConfig, process_env};
use conduit_repl::cli::{self, Action, Options};
use conduit_repl::{Repl, ReplConfig, drain, forward_stdin};

fn main() -> ExitCode {
    let action = match cli::parse_args(env::args().skip(1)) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("conduit: {e}");
            eprintln!("Run 'conduit --help' for usage.");
            return ExitCode::from(2);
        }
    };

    match action {
        Action::Help => {
            print!("{}", cli::usage());
            ExitCode::SUCCESS
        }
        Action::Version => {
            println!(
                "conduit {} ({} {})",
                env!("CARGO_PKG_VERSION"),
                env!("CONDUIT_GIT_REVISION"),
                env!("CONDUIT_BUILD_DATE")
            );
            ExitCode::SUCCESS
        }
        Action::Run(options) => {
            init_tracing(options.log_level);
            match run(options) {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("Error: {e:?}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// Logs go to stderr. `RUST_LOG` wins over `--log-level`.
fn init_tracing(level: Level) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(options: Options) -> Result<ExitCode> {
    let kernel = Kernel::new(KernelConfig::from_env().with_name("conduit"));

    if let Some(command) = options.command {
        return run_source(&kernel, &command, true);
    }

    if !std::io::stdin().is_terminal() {
        let source = std::io::read_to_string(std::io::stdin()).context("Failed to read script from stdin")?;
        return run_source(&kernel, &source, false);
    }

    Repl::new(kernel, ReplConfig::default())?.run()?;
    Ok(ExitCode::SUCCESS)
}

/// Run one command to completion, streaming its output.
fn run_source(kernel: &Kernel, source: &str, with_stdin: bool) -> Result<ExitCode> {
    let command = match kernel.parse(source) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("conduit: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let runtime = Runtime::new().context("Failed to create tokio runtime")?;
    let ok = runtime.block_on(async {
        let running = command.run(kernel.engine(), process_env());
        if with_stdin {
            forward_stdin(&running.stdin);
        } else {
            running.stdin.close();
        }
        drain(&running, &mut tokio::io::stdout(), &mut tokio::io::stderr()).await
    });
    // A stdin read may still be blocked; don't wait for it.
    runtime.shutdown_background();

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
