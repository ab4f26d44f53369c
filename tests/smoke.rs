//! Runs the console binary end to end against the bundled config and demo script.

use std::{path::PathBuf, process::Command};

fn repo_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

fn console() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mdcommand"));
    cmd.arg("--config").arg(repo_path("config/commands.toml"));
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[test]
fn bundled_grammar_validates() {
    let out = console().arg("--validate").output().expect("binary runs");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout.contains("command grammar ok"), "stdout: {stdout}");
}

#[test]
fn demo_script_replays_deterministically() {
    let run = || {
        let out = console()
            .arg("--script")
            .arg(repo_path("demos/morning.json"))
            .output()
            .expect("binary runs");
        assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
        String::from_utf8_lossy(&out.stdout).into_owned()
    };
    let first = run();
    assert!(first.contains("Running function demo:morning (3 commands)"), "{first}");
    assert!(first.contains("Time set to tick 1000"), "{first}");
    assert!(first.contains("Set own game mode to Creative Mode"), "{first}");
    assert!(first.contains("Test passed, count: 1"), "{first}");
    assert_eq!(first, run());
}

#[test]
fn broken_scripts_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("broken.json");
    std::fs::write(
        &script,
        r#"{"steps": [{"tick": 3, "command": "say a"}, {"tick": 1, "command": "say b"}]}"#,
    )
    .unwrap();
    let out = console().arg("--script").arg(&script).output().expect("binary runs");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("sorted by tick"));
}

#[test]
fn unknown_script_executors_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("ghost.json");
    std::fs::write(
        &script,
        r#"{"steps": [{"tick": 0, "command": "say boo", "as": "Herobrine"}]}"#,
    )
    .unwrap();
    let out = console().arg("--script").arg(&script).output().expect("binary runs");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Herobrine"));
}
