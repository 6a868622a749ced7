//! true/false: constant exit status.

use async_trait::async_trait;

use crate::kernel::Env;
use crate::tools::{Tool, ToolIo};

/// Always succeeds.
pub struct True;

#[async_trait]
impl Tool for True {
    fn name(&self) -> &str {
        "true"
    }

    async fn execute(&self, _args: &[String], _io: &ToolIo, _env: &Env) -> bool {
        true
    }
}

/// Always fails.
pub struct False;

#[async_trait]
impl Tool for False {
    fn name(&self) -> &str {
        "false"
    }

    async fn execute(&self, _args: &[String], _io: &ToolIo, _env: &Env) -> bool {
        false
    }
}
