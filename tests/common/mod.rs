#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Result type for ali command execution
pub struct AliCommandResult {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

/// Path to the ali binary cargo built for this test run
pub fn get_ali_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ali"))
}

/// Run ali with `home` as both `$HOME` and the root of every ali path
pub fn run_ali_command(args: &[&str], home: &TempDir) -> AliCommandResult {
    let mut cmd = Command::new(get_ali_binary_path());
    cmd.args(args);
    cmd.env("HOME", home.path());
    cmd.env("SHELL", "/bin/bash");
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("ALI_LOG_STDERR");
    cmd.env_remove("RUST_LOG");

    let output = cmd.output().expect("Failed to run ali command");
    AliCommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        success: output.status.success(),
        code: output.status.code(),
    }
}

pub fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

pub fn manifest_path(home: &TempDir) -> PathBuf {
    home.path().join(".config").join("ali").join("ali.yml")
}

/// Source `$HOME/.bashrc` in bash, with ali on `PATH`, then run `script`
pub fn run_in_shell(script: &str, home: &TempDir) -> AliCommandResult {
    let bin_dir = get_ali_binary_path()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let path = format!("{}:{}", bin_dir.display(), std::env::var("PATH").unwrap_or_default());

    let mut cmd = Command::new("bash");
    cmd.arg("-c").arg(format!("source \"$HOME/.bashrc\"\n{}", script));
    cmd.env("HOME", home.path());
    cmd.env("PATH", path);
    cmd.env("SHELL", "/bin/bash");
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("ALI_LOG_STDERR");
    cmd.env_remove("RUST_LOG");

    let output = cmd.output().expect("Failed to run bash");
    AliCommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        success: output.status.success(),
        code: output.status.code(),
    }
}
