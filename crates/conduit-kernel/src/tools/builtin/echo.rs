//! echo: Print arguments to stdout.

use async_trait::async_trait;

use crate::kernel::Env;
use crate::tools::{Tool, ToolIo};

/// Prints its arguments separated by spaces, then a newline.
pub struct Echo;

#[async_trait]
impl Tool for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    async fn execute(&self, args: &[String], io: &ToolIo, _env: &Env) -> bool {
        let mut line = args.join(" ");
        line.push('\n');
        io.out(line)
    }
}
