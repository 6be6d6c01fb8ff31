//! CLI tests for the `crew` binary.
//!
//! Spawns the binary in a temp dir and verifies exit codes and the files
//! `init` leaves behind.

use std::process::Command;

use crew::exit_codes;
use crew::io::config::load_config;

fn crew(dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_crew"));
    cmd.current_dir(dir);
    cmd
}

#[test]
fn init_writes_default_config() {
    let temp = tempfile::tempdir().expect("tempdir");

    let status = crew(temp.path()).arg("init").status().expect("crew init");

    assert_eq!(status.code(), Some(exit_codes::OK));
    let config_path = temp.path().join(".crew/config.toml");
    let cfg = load_config(&config_path).expect("load");
    assert_eq!(cfg.workflow.max_node_executions, 100);
    assert!(temp.path().join(".crew/events").is_dir());
}

#[test]
fn init_twice_without_force_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    crew(temp.path()).arg("init").status().expect("crew init");

    let output = crew(temp.path()).arg("init").output().expect("crew init");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));
}

#[test]
fn exec_empty_command_is_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = crew(temp.path())
        .args(["exec", ""])
        .output()
        .expect("crew exec");

    assert_eq!(output.status.code(), Some(exit_codes::COMMAND_FAILED));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Error: empty command."));
}

#[cfg(unix)]
#[test]
fn exec_allowed_command_succeeds() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = crew(temp.path())
        .args(["exec", "echo hi"])
        .output()
        .expect("crew exec");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Command executed successfully."));
    assert!(stdout.contains("hi"));
}

#[cfg(unix)]
#[test]
fn verbose_flag_enables_debug_diagnostics() {
    let temp = tempfile::tempdir().expect("tempdir");

    let quiet = crew(temp.path())
        .env_remove("RUST_LOG")
        .args(["exec", "echo hi"])
        .output()
        .expect("crew exec");
    let loud = crew(temp.path())
        .env_remove("RUST_LOG")
        .args(["-vv", "exec", "echo hi"])
        .output()
        .expect("crew exec -vv");

    assert_eq!(loud.status.code(), Some(exit_codes::OK));
    assert!(!String::from_utf8_lossy(&quiet.stderr).contains("DEBUG"));
    assert!(String::from_utf8_lossy(&loud.stderr).contains("DEBUG"));
}

#[test]
fn invalid_config_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config_path = temp.path().join("bad.toml");
    std::fs::write(&config_path, "[workflow]\nmax_node_executions = 0\n").expect("write");

    let status = crew(temp.path())
        .arg("--config")
        .arg(&config_path)
        .args(["exec", "ls"])
        .status()
        .expect("crew exec");

    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

#[test]
fn history_of_unknown_run_is_empty() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = crew(temp.path())
        .args(["history", "run-missing", "--json"])
        .output()
        .expect("crew history");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(output.stdout.is_empty());
}
