use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_halo_muon_cli"))
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("halo_muon_cli_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn simulate(dir: &Path, events: usize) -> PathBuf {
    let out = dir.join("events.jsonl");
    let output = cli()
        .args([
            "simulate",
            "--events",
            &events.to_string(),
            "--seed",
            "9",
            &path_arg(&out),
        ])
        .output()
        .expect("failed to run halo_muon_cli simulate");
    assert!(output.status.success(), "simulate exited with {:?}", output.status.code());
    out
}

fn json_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8(stdout.to_vec())
        .expect("stdout UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("JSON line"))
        .collect()
}

#[test]
fn select_runs_passes_and_writes_tables() {
    let dir = temp_dir("select");
    let events = simulate(&dir, 800);
    let store = dir.join("store");
    let accepted = dir.join("accepted.jsonl");

    let output = cli()
        .args([
            "select",
            &path_arg(&events),
            "--store",
            &path_arg(&store),
            "--passes",
            "2",
            "--workers",
            "3",
            "--accepted-out",
            &path_arg(&accepted),
        ])
        .output()
        .expect("failed to run halo_muon_cli select");
    assert!(
        output.status.success(),
        "select exited with {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );

    let lines = json_lines(&output.stdout);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["pass"], 0);
    assert_eq!(lines[1]["pass"], 1);
    assert_eq!(lines[1]["summary"]["event_count"][0], 800);
    assert!(store.join("selection_pass_0000.json").exists());
    assert!(store.join("selection_pass_0001.json").exists());

    let accepted_count = std::fs::read_to_string(&accepted)
        .expect("accepted events file")
        .lines()
        .count() as u64;
    assert_eq!(
        Some(accepted_count),
        lines[1]["summary"]["accepted_events"].as_u64()
    );

    // A further run continues at pass 2, --restart goes back to pass 0
    let output = cli()
        .args(["select", &path_arg(&events), "--store", &path_arg(&store)])
        .output()
        .expect("failed to run continued select");
    assert!(output.status.success());
    assert_eq!(json_lines(&output.stdout)[0]["pass"], 2);

    let output = cli()
        .args([
            "select",
            &path_arg(&events),
            "--store",
            &path_arg(&store),
            "--restart",
        ])
        .output()
        .expect("failed to run restarted select");
    assert!(output.status.success());
    assert_eq!(json_lines(&output.stdout)[0]["pass"], 0);
    assert!(!store.join("selection_pass_0002.json").exists());

    let output = cli()
        .args(["summary", "--store", &path_arg(&store)])
        .output()
        .expect("failed to run summary");
    assert!(output.status.success());
    assert_eq!(json_lines(&output.stdout)[0]["pass"], 0);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn select_without_random_events_fails() {
    let dir = temp_dir("no_random");
    let events = dir.join("events.jsonl");
    std::fs::write(&events, "").expect("write empty events file");

    let output = cli()
        .args([
            "select",
            &path_arg(&events),
            "--store",
            &path_arg(&dir.join("store")),
        ])
        .output()
        .expect("failed to run select");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NoRandomEvents"), "stderr: {stderr}");
    assert!(!dir.join("store").join("selection_pass_0000.json").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn summary_of_missing_pass_fails() {
    let dir = temp_dir("missing_pass");
    let output = cli()
        .args(["summary", "--store", &path_arg(&dir), "--pass", "4"])
        .output()
        .expect("failed to run summary");
    assert_eq!(output.status.code(), Some(1));
    let _ = std::fs::remove_dir_all(&dir);
}
