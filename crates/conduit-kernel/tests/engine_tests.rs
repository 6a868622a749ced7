//! End-to-end execution tests: source text in, bytes and exit status out.
//!
//! These use real processes from `PATH` (`sh`, `grep`, `tr`, `sort`, ...),
//! so they only run on unix.

#![cfg(unix)]

use std::time::Duration;

use conduit_kernel::graph::{ResolveError, StatementId};
use conduit_kernel::{CommandError, Env, Kernel, KernelConfig, process_env};
use tokio::time::timeout;

struct Outcome {
    ok: bool,
    stdout: String,
    stderr: String,
}

async fn run_with(source: &str, input: Option<&str>, env: Env) -> Outcome {
    let kernel = Kernel::new(KernelConfig::from_env().with_name("engine-tests"));
    let running = kernel
        .execute(source, env)
        .unwrap_or_else(|e| panic!("{source:?} failed to parse: {e}"));

    if let Some(input) = input {
        running.stdin.write(input).expect("block stdin open");
    }
    running.stdin.close();

    let (stdout, stderr, ok) = timeout(Duration::from_secs(10), async {
        tokio::join!(running.stdout.collect(), running.stderr.collect(), running.exit())
    })
    .await
    .unwrap_or_else(|_| panic!("{source:?} did not finish"));

    Outcome {
        ok,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    }
}

async fn run(source: &str) -> Outcome {
    run_with(source, None, process_env()).await
}

// =============================================================================
// Pipes
// =============================================================================

#[tokio::test]
async fn builtin_into_process() {
    let out = run("echo hi | grep h").await;
    assert!(out.ok, "stderr: {}", out.stderr);
    assert_eq!(out.stdout, "hi\n");
}

#[tokio::test]
async fn corked_stderr_is_dropped() {
    let out = run(r#"sh -c "echo err >&2; echo out" |.2>"#).await;
    assert!(out.ok);
    assert_eq!(out.stdout, "out\n");
    assert_eq!(out.stderr, "");
}

#[tokio::test]
async fn labelled_stderr_route() {
    let out = run(r#"build: sh -c "echo warn >&2" |build.2>check.0 check: tr a-z A-Z"#).await;
    assert!(out.ok, "stderr: {}", out.stderr);
    assert_eq!(out.stdout, "WARN\n");
    assert_eq!(out.stderr, "");
}

#[tokio::test]
async fn fan_out_copies_to_every_target() {
    let out = run("echo x |>+1,>+2 cat\ncat").await;
    assert!(out.ok);
    assert_eq!(out.stdout, "x\nx\n");
}

#[tokio::test]
async fn stdin_can_be_teed_to_another_statement() {
    let out = run_with("cat |.0>+1,.1> tr a-z A-Z", Some("abc"), process_env()).await;
    assert!(out.ok, "stderr: {}", out.stderr);
    assert_eq!(out.stdout, "ABC");
}

#[tokio::test]
async fn early_reader_exit_stops_the_writer() {
    let out = run("yes | head -n 1").await;
    assert_eq!(out.stdout, "y\n");
}

#[tokio::test]
async fn fan_in_from_two_roots() {
    let out = run("echo a |>+2\necho b |>+1\nsort").await;
    assert!(out.ok, "stderr: {}", out.stderr);
    assert_eq!(out.stdout, "a\nb\n");
}

// =============================================================================
// Sequencing
// =============================================================================

#[tokio::test]
async fn statements_without_terminators_run_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let mut env = process_env();
    env.insert("PWD".into(), dir.path().display().to_string());

    // The first statement only finishes once the second has run.
    let source = "sh -c \"while [ ! -e flag ]; do sleep 0.1; done; echo waited\"\ntouch flag";
    let out = run_with(source, None, env).await;
    assert!(out.ok, "stderr: {}", out.stderr);
    assert_eq!(out.stdout, "waited\n");
}

#[tokio::test]
async fn routes_across_a_terminator_are_rejected() {
    let kernel = Kernel::new(KernelConfig::from_env());
    let Err(err) = kernel.execute("x: echo a |x>z ; echo b |>z z: cat", process_env()) else {
        panic!("should not start");
    };
    assert_eq!(
        err,
        CommandError::Resolve(ResolveError::CrossesBarrier(StatementId(2)))
    );
}

#[tokio::test]
async fn failed_barrier_stops_the_block() {
    let out = run("false ; echo never").await;
    assert!(!out.ok);
    assert_eq!(out.stdout, "");
}

#[tokio::test]
async fn passed_barrier_continues() {
    let out = run("true; echo ran").await;
    assert!(out.ok);
    assert_eq!(out.stdout, "ran\n");
}

#[tokio::test]
async fn nonzero_exit_fails_the_block() {
    let out = run(r#"sh -c "exit 3""#).await;
    assert!(!out.ok);
}

#[tokio::test]
async fn empty_command_succeeds() {
    let out = run("").await;
    assert!(out.ok);
    assert_eq!(out.stdout, "");
}

#[tokio::test]
async fn missing_command_does_not_stop_siblings() {
    let out = run("definitely-not-a-command-xyz\necho still").await;
    assert!(!out.ok);
    assert_eq!(out.stdout, "still\n");
    assert!(out.stderr.contains("command not found"), "{}", out.stderr);
}

// =============================================================================
// Blocks
// =============================================================================

#[tokio::test]
async fn substitution_keeps_trailing_newline() {
    let out = run("echo {echo inner}").await;
    assert!(out.ok);
    assert_eq!(out.stdout, "inner\n\n");
}

#[tokio::test]
async fn block_output_pipes_onward() {
    let out = run("{\necho b\necho a\n} | sort").await;
    assert!(out.ok, "stderr: {}", out.stderr);
    assert_eq!(out.stdout, "a\nb\n");
}

#[tokio::test]
async fn block_reads_routed_stdin() {
    let out = run("echo hi | { tr a-z A-Z }").await;
    assert!(out.ok);
    assert_eq!(out.stdout, "HI\n");
}

// =============================================================================
// Block stdin and environment
// =============================================================================

#[tokio::test]
async fn block_stdin_reaches_root() {
    let out = run_with("cat", Some("fed\n"), process_env()).await;
    assert!(out.ok);
    assert_eq!(out.stdout, "fed\n");
}

#[tokio::test]
async fn block_stdin_reaches_every_root() {
    let out = run_with("cat\ncat", Some("fed\n"), process_env()).await;
    assert!(out.ok);
    assert_eq!(out.stdout, "fed\nfed\n");
}

#[tokio::test]
async fn pwd_comes_from_env() {
    let dir = tempfile::tempdir().unwrap();
    let mut env = process_env();
    env.insert("PWD".into(), dir.path().display().to_string());

    let out = run_with("pwd", None, env).await;
    assert!(out.ok);
    assert_eq!(out.stdout, format!("{}\n", dir.path().display()));
}

#[tokio::test]
async fn processes_start_in_pwd() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "").unwrap();
    let mut env = process_env();
    env.insert("PWD".into(), dir.path().display().to_string());

    let out = run_with("ls", None, env).await;
    assert!(out.ok, "stderr: {}", out.stderr);
    assert_eq!(out.stdout, "marker.txt\n");
}
