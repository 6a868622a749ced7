//! Handle to anything started by the engine: a process, a builtin or a block.

use std::future::Future;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use super::channel::ByteChannel;

/// A started runner.
///
/// The three channels belong to the runner: the caller writes `stdin` and
/// reads `stdout`/`stderr`. `exit()` can be awaited any number of times.
#[derive(Clone)]
pub struct Running {
    pub stdin: ByteChannel,
    pub stdout: ByteChannel,
    pub stderr: ByteChannel,
    exit: Shared<BoxFuture<'static, bool>>,
}

impl Running {
    pub fn new<F>(stdin: ByteChannel, stdout: ByteChannel, stderr: ByteChannel, exit: F) -> Self
    where
        F: Future<Output = bool> + Send + 'static,
    {
        Self {
            stdin,
            stdout,
            stderr,
            exit: exit.boxed().shared(),
        }
    }

    /// Spawn `body` with fresh channels and close all three when it returns.
    pub fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(ByteChannel, ByteChannel, ByteChannel) -> Fut,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let (stdin, stdout, stderr) = (ByteChannel::new(), ByteChannel::new(), ByteChannel::new());
        let work = body(stdin.clone(), stdout.clone(), stderr.clone());
        let channels = (stdin.clone(), stdout.clone(), stderr.clone());
        let handle = tokio::spawn(async move {
            let ok = work.await;
            channels.0.close();
            channels.1.close();
            channels.2.close();
            ok
        });
        Self::new(stdin, stdout, stderr, async move { handle.await.unwrap_or(false) })
    }

    /// Resolves once the runner has finished; true iff it succeeded.
    pub async fn exit(&self) -> bool {
        self.exit.clone().await
    }
}

impl std::fmt::Debug for Running {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Running")
            .field("stdin", &self.stdin)
            .field("stdout", &self.stdout)
            .field("stderr", &self.stderr)
            .finish_non_exhaustive()
    }
}
