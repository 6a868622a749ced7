//! Stamps the `conduit` binary with a git revision and build date for `--version`.

use std::process::Command;

fn main() {
    if std::path::Path::new("../../.git").exists() {
        println!("cargo::rerun-if-changed=../../.git/HEAD");
    }

    let revision = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let built_on = chrono::Utc::now().format("%Y-%m-%d").to_string();

    println!("cargo:rustc-env=CONDUIT_GIT_REVISION={revision}");
    println!("cargo:rustc-env=CONDUIT_BUILD_DATE={built_on}");
}
