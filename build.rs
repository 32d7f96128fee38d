use chrono::Utc;
use std::env;
use std::path::Path;
use std::process::Command;

/// Short hash of the checked-out revision, or "unknown" outside a git checkout
fn short_git_hash() -> String {
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|hash| hash.trim().to_string())
        .filter(|hash| !hash.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    let out_dir = env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo");
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());

    let generated = format!(
        "pub const BUILD_TIME: &str = {:?};\npub const GIT_HASH: &str = {:?};\npub const BUILD_TARGET: &str = {:?};\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        short_git_hash(),
        target,
    );
    std::fs::write(Path::new(&out_dir).join("version.rs"), generated)
        .expect("failed to write version.rs");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
