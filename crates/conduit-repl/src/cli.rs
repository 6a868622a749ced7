//! Command-line arguments for the `conduit` binary.

use std::str::FromStr;

use anyhow::{Context, Result, bail};
use tracing::Level;

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Help,
    Version,
    Run(Options),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Used when `RUST_LOG` is unset.
    pub log_level: Level,
    /// `-c`: run this and exit instead of reading a script or prompting.
    pub command: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            log_level: Level::WARN,
            command: None,
        }
    }
}

/// Parse arguments, not including the program name.
pub fn parse_args<I>(args: I) -> Result<Action>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Action::Help),
            "-V" | "--version" => return Ok(Action::Version),
            "-c" | "--command" => {
                let command = args.next().with_context(|| format!("{arg} requires a command argument"))?;
                options.command = Some(command);
            }
            "--log-level" => {
                let level = args.next().context("--log-level requires a level")?;
                options.log_level = parse_level(&level)?;
            }
            other => {
                if let Some(level) = other.strip_prefix("--log-level=") {
                    options.log_level = parse_level(level)?;
                } else if let Some(command) = other.strip_prefix("--command=") {
                    options.command = Some(command.to_string());
                } else {
                    bail!("unknown option: {other}");
                }
            }
        }
    }

    Ok(Action::Run(options))
}

fn parse_level(value: &str) -> Result<Level> {
    Level::from_str(value).map_err(|_| anyhow::anyhow!("invalid log level `{value}` (expected error, warn, info, debug or trace)"))
}

pub fn usage() -> String {
    format!(
        r#"conduit v{}

Usage:
  conduit                      Interactive prompt (or run stdin as a script)
  conduit -c <command>         Run one command, forwarding stdin to it

Options:
  -c, --command <command>      Run a command string and exit
      --log-level <level>      error, warn, info, debug or trace (default: warn)
  -h, --help                   Show this help
  -V, --version                Show version

RUST_LOG overrides --log-level when set.

Examples:
  conduit -c 'echo hi | grep h'
  conduit -c 'make |.2>+1 grep -i error' < /dev/null
  echo 'ls; pwd' | conduit
"#,
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[rstest]
    #[case::short(&["-h"])]
    #[case::long(&["--help"])]
    #[case::after_other_flags(&["--log-level", "debug", "-h"])]
    fn help(#[case] words: &[&str]) {
        assert_eq!(parse_args(args(words)).unwrap(), Action::Help);
    }

    #[test]
    fn defaults() {
        assert_eq!(parse_args(args(&[])).unwrap(), Action::Run(Options::default()));
    }

    #[rstest]
    #[case::short(&["-c", "echo hi"])]
    #[case::long(&["--command", "echo hi"])]
    #[case::equals(&["--command=echo hi"])]
    fn command(#[case] words: &[&str]) {
        let Action::Run(options) = parse_args(args(words)).unwrap() else {
            panic!("expected run");
        };
        assert_eq!(options.command.as_deref(), Some("echo hi"));
    }

    #[rstest]
    #[case::separate(&["--log-level", "debug"], Level::DEBUG)]
    #[case::equals(&["--log-level=trace"], Level::TRACE)]
    #[case::upper(&["--log-level", "ERROR"], Level::ERROR)]
    fn log_level(#[case] words: &[&str], #[case] expected: Level) {
        let Action::Run(options) = parse_args(args(words)).unwrap() else {
            panic!("expected run");
        };
        assert_eq!(options.log_level, expected);
    }

    #[rstest]
    #[case::missing_command(&["-c"])]
    #[case::missing_level(&["--log-level"])]
    #[case::bad_level(&["--log-level", "loud"])]
    #[case::unknown(&["--frobnicate"])]
    #[case::positional(&["script.cdt"])]
    fn rejected(#[case] words: &[&str]) {
        assert!(parse_args(args(words)).is_err());
    }
}
