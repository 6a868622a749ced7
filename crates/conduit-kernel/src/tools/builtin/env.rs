//! env: Print the environment.

use async_trait::async_trait;

use crate::kernel::Env;
use crate::tools::{Tool, ToolIo};

/// Prints `KEY=VALUE` lines in key order.
pub struct PrintEnv;

#[async_trait]
impl Tool for PrintEnv {
    fn name(&self) -> &str {
        "env"
    }

    async fn execute(&self, _args: &[String], io: &ToolIo, env: &Env) -> bool {
        let listing: String = env.iter().map(|(k, v)| format!("{k}={v}\n")).collect();
        io.out(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::testing::run_tool;

    #[tokio::test]
    async fn sorted_listing() {
        let mut env = Env::new();
        env.insert("ZED".into(), "last".into());
        env.insert("ALPHA".into(), "first".into());
        let out = run_tool(&PrintEnv, &[], "", &env).await;
        assert_eq!(out.stdout, "ALPHA=first\nZED=last\n");
    }
}
