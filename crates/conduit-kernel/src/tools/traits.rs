//! Core tool traits and types.

use async_trait::async_trait;

use crate::kernel::Env;
use crate::scheduler::ByteChannel;

/// Streams handed to a running tool.
#[derive(Debug, Clone)]
pub struct ToolIo {
    pub stdin: ByteChannel,
    pub stdout: ByteChannel,
    pub stderr: ByteChannel,
}

impl ToolIo {
    /// Write to stdout. False when nobody is reading any more.
    pub fn out(&self, text: impl Into<Vec<u8>>) -> bool {
        self.stdout.write(text).is_ok()
    }

    /// Write to stderr, ignoring a closed channel.
    pub fn err(&self, text: impl Into<Vec<u8>>) {
        let _ = self.stderr.write(text);
    }
}

/// An in-process command.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The word that invokes this tool.
    fn name(&self) -> &str;

    /// Run with `args` (argv without the tool name). Returns success.
    ///
    /// The channels are closed by the caller after this returns.
    async fn execute(&self, args: &[String], io: &ToolIo, env: &Env) -> bool;
}
