//! CLI smoke tests: verify basic binary behavior.

use std::process::Command;
use tempfile::TempDir;

fn cli_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_entelgia"))
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Expected usage info in --help output");
    assert!(stdout.contains("--mock"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("entelgia"), "Expected crate name in --version output");
}

#[test]
fn test_mock_session_runs_offline() {
    let dir = TempDir::new().unwrap();
    let output = cli_bin()
        .current_dir(dir.path())
        .env("ENTELGIA_DATA_DIR", dir.path().join("data"))
        .env("MEMORY_SECRET_KEY", "smoke-test-key")
        .env_remove("ENTELGIA_MAX_TURNS")
        .args(["--config", "missing.toml", "--mock", "--turns", "3", "--seed", "1"])
        .output()
        .expect("failed to run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Socrates"));
    assert!(stdout.contains("Session over: 3 turns"));
    assert!(dir.path().join("data").join("entelgia_memory.sqlite").exists());
}
