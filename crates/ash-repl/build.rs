//! Build script for ash-repl: stamps `--version` with the git hash and date.

use std::process::Command;

fn git_short_hash() -> Option<String> {
    let out = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())?;
    Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// Build date, pinned by `SOURCE_DATE_EPOCH` for reproducible builds.
fn build_date() -> String {
    let pinned = std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0));
    pinned.unwrap_or_else(chrono::Utc::now).format("%Y-%m-%d").to_string()
}

fn main() {
    println!("cargo::rerun-if-env-changed=SOURCE_DATE_EPOCH");
    if std::path::Path::new("../../.git").exists() {
        println!("cargo::rerun-if-changed=../../.git/HEAD");
    }

    let hash = git_short_hash().unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=ASH_GIT_HASH={hash}");
    println!("cargo:rustc-env=ASH_BUILD_DATE={}", build_date());
}
