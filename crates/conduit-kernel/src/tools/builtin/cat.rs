//! cat: Concatenate files, or copy stdin.

use std::path::Path;

use async_trait::async_trait;

use crate::kernel::Env;
use crate::tools::{Tool, ToolIo};

/// Copies each named file to stdout; with no files, copies stdin.
pub struct Cat;

#[async_trait]
impl Tool for Cat {
    fn name(&self) -> &str {
        "cat"
    }

    async fn execute(&self, args: &[String], io: &ToolIo, env: &Env) -> bool {
        if args.is_empty() {
            while let Some(chunk) = io.stdin.read().await {
                if !io.out(chunk) {
                    io.stdin.close();
                    return false;
                }
            }
            return true;
        }

        let base = env.get("PWD").map(Path::new);
        let mut ok = true;
        for arg in args {
            let path = match base {
                Some(base) => base.join(arg),
                None => Path::new(arg).to_path_buf(),
            };
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    if !io.out(bytes) {
                        return false;
                    }
                }
                Err(e) => {
                    io.err(format!("cat: {arg}: {e}\n"));
                    ok = false;
                }
            }
        }
        ok
    }
}
