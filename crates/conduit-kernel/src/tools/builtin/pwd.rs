//! pwd: Print working directory.

use async_trait::async_trait;

use crate::kernel::Env;
use crate::tools::{Tool, ToolIo};

/// Prints `PWD` from the environment, or the process directory without one.
pub struct Pwd;

#[async_trait]
impl Tool for Pwd {
    fn name(&self) -> &str {
        "pwd"
    }

    async fn execute(&self, _args: &[String], io: &ToolIo, env: &Env) -> bool {
        let dir = match env.get("PWD") {
            Some(pwd) => pwd.clone(),
            None => match std::env::current_dir() {
                Ok(dir) => dir.display().to_string(),
                Err(e) => {
                    io.err(format!("pwd: {e}\n"));
                    return false;
                }
            },
        };
        io.out(format!("{dir}\n"))
    }
}
