//! Process adapter: executable lookup and OS process spawning.
//!
//! A spawned child gets fresh pipes for all three standard streams, each
//! bridged to a [`ByteChannel`]:
//!
//! ```text
//!   stdin channel ──pump──▶ child stdin     (closed when the channel closes)
//!   child stdout  ──pump──▶ stdout channel  (closed at EOF)
//!   child stderr  ──pump──▶ stderr channel  (closed at EOF)
//! ```
//!
//! When the child exits and its output is drained, all three channels close
//! and `exit()` resolves to whether the exit status was zero.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::dispatch::{EngineError, Evaluation, Evaluator};
use crate::kernel::Env;
use crate::scheduler::{ByteChannel, Running};

/// Find the executable for `hint`.
///
/// A hint containing `/` is a path, relative ones resolved against `cwd`.
/// Anything else is looked up in each `search_path` directory in order.
pub fn locate(hint: &str, search_path: &[PathBuf], cwd: Option<&Path>) -> Result<PathBuf, EngineError> {
    if hint.contains('/') {
        let path = Path::new(hint);
        let path = match cwd {
            Some(cwd) if path.is_relative() => cwd.join(path),
            _ => path.to_path_buf(),
        };
        if !path.is_file() {
            return Err(EngineError::NotFound(hint.to_string()));
        }
        if !is_executable(&path) {
            return Err(EngineError::NotExecutable(path));
        }
        return Ok(path);
    }

    search_path
        .iter()
        .map(|dir| dir.join(hint))
        .find(|candidate| candidate.is_file() && is_executable(candidate))
        .ok_or_else(|| EngineError::NotFound(hint.to_string()))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

/// Spawn `program` with `argv[1..]` as arguments and exactly `env` as its
/// environment. `PWD`, when set, is the working directory.
#[tracing::instrument(level = "debug", skip(argv, env), fields(argv0 = argv.first().map(String::as_str)))]
pub fn spawn(program: &Path, argv: &[String], env: &Env) -> Result<Running, EngineError> {
    let mut cmd = Command::new(program);
    cmd.args(argv.iter().skip(1))
        .env_clear()
        .envs(env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(pwd) = env.get("PWD") {
        cmd.current_dir(pwd);
    }

    let mut child = cmd.spawn().map_err(|source| EngineError::Spawn {
        program: program.to_path_buf(),
        source,
    })?;

    let stdin = ByteChannel::new();
    let stdout = ByteChannel::new();
    let stderr = ByteChannel::new();

    let stdin_task = child.stdin.take().map(|mut pipe| {
        let channel = stdin.clone();
        tokio::spawn(async move {
            if let Err(e) = channel.pump_into(&mut pipe).await {
                tracing::trace!(error = %e, "child stopped reading stdin");
                channel.close();
            }
        })
    });

    let output_tasks: Vec<_> = [
        (child.stdout.take().map(|p| Box::new(p) as Box<dyn tokio::io::AsyncRead + Send + Unpin>), stdout.clone()),
        (child.stderr.take().map(|p| Box::new(p) as Box<dyn tokio::io::AsyncRead + Send + Unpin>), stderr.clone()),
    ]
    .into_iter()
    .map(|(pipe, channel)| {
        tokio::spawn(async move {
            if let Some(mut pipe) = pipe
                && let Err(e) = channel.pump_from(&mut pipe).await
            {
                tracing::trace!(channel = channel.id(), error = %e, "output pump stopped");
            }
            channel.close();
        })
    })
    .collect();

    let program = program.display().to_string();
    let channels = (stdin.clone(), stdout.clone(), stderr.clone());
    let waiter = tokio::spawn(async move {
        let status = child.wait().await;
        for task in output_tasks {
            let _ = task.await;
        }
        channels.0.close();
        channels.1.close();
        channels.2.close();
        if let Some(task) = stdin_task {
            let _ = task.await;
        }

        match status {
            Ok(status) => {
                tracing::debug!(%program, code = ?status.code(), "process exited");
                status.success()
            }
            Err(e) => {
                tracing::warn!(%program, error = %e, "wait failed");
                false
            }
        }
    });

    Ok(Running::new(stdin, stdout, stderr, async move {
        waiter.await.unwrap_or(false)
    }))
}

/// Last link of the chain: run argv as an OS process.
#[derive(Debug, Clone)]
pub struct ProcessEvaluator {
    search_path: Vec<PathBuf>,
}

impl ProcessEvaluator {
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        Self { search_path }
    }
}

#[async_trait]
impl Evaluator for ProcessEvaluator {
    fn name(&self) -> &str {
        "process"
    }

    async fn try_eval(&self, argv: &[String], env: &Env) -> Result<Evaluation, EngineError> {
        let Some(hint) = argv.first() else {
            return Ok(Evaluation::NoMatch);
        };
        let cwd = env.get("PWD").map(Path::new);
        let program = locate(hint, &self.search_path, cwd)?;
        spawn(&program, argv, env).map(Evaluation::Started)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn system_path() -> Vec<PathBuf> {
        vec![PathBuf::from("/bin"), PathBuf::from("/usr/bin")]
    }

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn locate_searches_in_order() {
        let found = locate("sh", &system_path(), None).unwrap();
        assert!(found.ends_with("sh"));
    }

    #[test]
    fn locate_reports_missing() {
        let err = locate("definitely-not-a-real-command", &system_path(), None).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn locate_rejects_non_executable_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.txt");
        std::fs::write(&file, "not a program").unwrap();

        let err = locate("./data.txt", &[], Some(dir.path())).unwrap_err();
        assert!(matches!(err, EngineError::NotExecutable(_)));
    }

    #[tokio::test]
    async fn spawn_bridges_stdin_to_stdout() {
        let cat = locate("cat", &system_path(), None).unwrap();
        let running = spawn(&cat, &argv(&["cat"]), &Env::new()).unwrap();

        running.stdin.write("round trip\n").unwrap();
        running.stdin.close();

        let out = timeout(Duration::from_secs(5), running.stdout.collect())
            .await
            .expect("cat should finish");
        assert_eq!(out, b"round trip\n");
        assert!(running.exit().await);
    }

    #[tokio::test]
    async fn nonzero_exit_is_false_not_error() {
        let sh = locate("sh", &system_path(), None).unwrap();
        let running = spawn(&sh, &argv(&["sh", "-c", "echo oops >&2; exit 3"]), &Env::new()).unwrap();
        running.stdin.close();

        assert!(!running.exit().await);
        assert_eq!(running.stderr.collect().await, b"oops\n");
        assert!(running.stdout.is_closed());
    }

    #[tokio::test]
    async fn env_is_exactly_what_was_given() {
        let sh = locate("sh", &system_path(), None).unwrap();
        let mut env = Env::new();
        env.insert("GREETING".into(), "hello".into());
        let running = spawn(&sh, &argv(&["sh", "-c", "echo $GREETING; echo ${HOME:-unset}"]), &env).unwrap();
        running.stdin.close();

        assert_eq!(running.stdout.collect().await, b"hello\nunset\n");
        assert!(running.exit().await);
    }

    #[tokio::test]
    async fn spawn_failure_is_distinct() {
        let err = spawn(Path::new("/nonexistent/binary"), &argv(&["x"]), &Env::new()).unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
    }
}
