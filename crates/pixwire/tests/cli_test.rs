//! Integration tests for the `pixwire` CLI binary.
//!
//! Argument parsing, completions, error exit codes, and full editing
//! sessions against a diagram file. No diagram server is needed.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `pixwire` binary with env isolation.
///
/// Clears all `PIXWIRE_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn pixwire_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("pixwire");
    cmd.env("HOME", "/tmp/pixwire-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/pixwire-cli-test-nonexistent")
        .env_remove("PIXWIRE_PROFILE")
        .env_remove("PIXWIRE_SERVER")
        .env_remove("PIXWIRE_FILE")
        .env_remove("PIXWIRE_OUTPUT")
        .env_remove("PIXWIRE_INSECURE")
        .env_remove("PIXWIRE_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Run a command against `file`, asserting success, and return stdout.
fn run_ok(file: &Path, args: &[&str]) -> String {
    let output = pixwire_cmd()
        .arg("--file")
        .arg(file)
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "pixwire {args:?} failed:\n{}",
        combined_output(&output)
    );
    String::from_utf8(output.stdout).unwrap().trim().to_owned()
}

/// Run a command against `file` and return its exit code.
fn run_code(file: &Path, args: &[&str]) -> Option<i32> {
    let output = pixwire_cmd()
        .arg("--file")
        .arg(file)
        .args(args)
        .write_stdin("")
        .output()
        .unwrap();
    output.status.code()
}

fn json(file: &Path, args: &[&str]) -> Value {
    let mut full = vec!["-o", "json"];
    full.extend_from_slice(args);
    serde_json::from_str(&run_ok(file, &full)).unwrap()
}

/// A controller feeding one board whose first port feeds one receiver.
struct Rig {
    controller: String,
    board: String,
    board_ports: Vec<String>,
    receiver: String,
    receiver_port: String,
}

fn build_rig(file: &Path) -> Rig {
    let controller = run_ok(
        file,
        &["-o", "plain", "add", "controller", "Garage", "--port", "Out1:680"],
    );
    let board = run_ok(file, &["-o", "plain", "add", "board", "DB1"]);
    let receiver = run_ok(
        file,
        &["-o", "plain", "add", "receiver", "Rx1", "--port", "A:400", "--port", "B:400"],
    );
    let board_ports: Vec<String> = run_ok(file, &["-o", "plain", "list", "board-ports"])
        .lines()
        .map(str::to_owned)
        .collect();
    let receivers = json(file, &["list", "receivers"]);
    let receiver_port = receivers[0]["ports"][0]["id"].as_str().unwrap().to_owned();

    run_ok(
        file,
        &["connect", &format!("{controller}:controller-output"), &format!("{board}:diff-board-input")],
    );
    run_ok(
        file,
        &["connect", &format!("{board}:diff-board-output"), &format!("{}:diff-port-input", board_ports[0])],
    );
    run_ok(
        file,
        &["connect", &format!("{}:diff-port-output", board_ports[0]), &format!("{receiver}:receiver-input")],
    );

    Rig {
        controller,
        board,
        board_ports,
        receiver,
        receiver_port,
    }
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = pixwire_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    pixwire_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("connect")
            .and(predicate::str::contains("utilization"))
            .and(predicate::str::contains("validate")),
    );
}

#[test]
fn test_version_flag() {
    pixwire_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pixwire"));
}

#[test]
fn test_invalid_subcommand() {
    pixwire_cmd().arg("frobnicate").assert().code(2);
}

#[test]
fn test_file_and_server_conflict() {
    pixwire_cmd()
        .args(["--file", "a.json", "--server", "http://localhost:3001", "show"])
        .assert()
        .code(2);
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions() {
    for shell in ["bash", "zsh", "fish"] {
        pixwire_cmd()
            .args(["completions", shell])
            .assert()
            .success()
            .stdout(predicate::str::is_empty().not());
    }
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_prints_toml_location() {
    pixwire_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_unknown_profile_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("diagram.json");
    pixwire_cmd()
        .args(["--profile", "nope", "--file"])
        .arg(&file)
        .arg("show")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("nope"));
}

// ── Targets ─────────────────────────────────────────────────────────

#[test]
fn test_show_without_target_is_connection_error() {
    pixwire_cmd().arg("show").assert().code(7);
}

#[test]
fn test_watch_rejects_file_mode() {
    pixwire_cmd()
        .args(["--file", "diagram.json", "watch"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("fresh.json");
    assert_eq!(run_ok(&file, &["-o", "plain", "list", "controllers"]), "");
    assert!(!file.exists(), "read-only commands must not create the file");
}

// ── Editing sessions ────────────────────────────────────────────────

#[test]
fn test_wiring_session_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("diagram.json");
    let rig = build_rig(&file);

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(saved["connections"].as_array().unwrap().len(), 3);
    assert_eq!(saved["differentialPorts"].as_array().unwrap().len(), 4);
    assert_eq!(rig.board_ports.len(), 4);

    let wires = run_ok(&file, &["-o", "plain", "list", "wires"]);
    assert_eq!(wires.lines().count(), 3);

    let tree = run_ok(&file, &["--color", "never", "show"]);
    assert!(tree.contains("Garage"));
    assert!(tree.contains("DB1"));
    assert!(tree.contains("Rx1"));

    let controllers = json(&file, &["list", "controllers"]);
    assert_eq!(controllers[0]["id"], rig.controller.as_str());
    assert_eq!(controllers[0]["type"], "Falcon");
}

#[test]
fn test_second_feed_into_receiver_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("diagram.json");
    let rig = build_rig(&file);

    let code = run_code(
        &file,
        &[
            "connect",
            &format!("{}:diff-port-output", rig.board_ports[1]),
            &format!("{}:receiver-input", rig.receiver),
        ],
    );
    assert_eq!(code, Some(6));
    assert_eq!(run_ok(&file, &["-o", "plain", "list", "wires"]).lines().count(), 3);
}

#[test]
fn test_wrong_handle_pair_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("diagram.json");
    let rig = build_rig(&file);

    let code = run_code(
        &file,
        &[
            "connect",
            &format!("{}:controller-output", rig.controller),
            &format!("{}:receiver-input", rig.receiver),
        ],
    );
    assert_eq!(code, Some(9));
}

#[test]
fn test_slot_utilization_reflects_models() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("diagram.json");
    let rig = build_rig(&file);
    let dp = &rig.board_ports[0];

    run_ok(
        &file,
        &["add", "model", "Arch", "--pixels", "120", "--port", &rig.receiver_port],
    );
    run_ok(&file, &["capacity", dp, "1", "340"]);

    let report = json(&file, &["utilization", dp]);
    assert_eq!(report["kind"], "differential-port");
    assert_eq!(report["slots"][0]["current"], 120);
    assert_eq!(report["slots"][0]["max"], 340);
    assert_eq!(report["slots"][1]["current"], 0);

    let entries = json(&file, &["utilization"]);
    let board = entries
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["id"] == rig.board.as_str())
        .unwrap();
    assert_eq!(board["kind"], "board");
    assert_eq!(board["current"], 120);
}

#[test]
fn test_over_capacity_is_reported_by_validate() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("diagram.json");
    let rig = build_rig(&file);

    run_ok(
        &file,
        &["add", "model", "Mega Tree", "--pixels", "900", "--port", &rig.receiver_port],
    );

    let over = json(&file, &["utilization", "--over"]);
    assert!(
        over.as_array()
            .unwrap()
            .iter()
            .any(|e| e["id"] == rig.receiver.as_str()),
        "receiver should be listed over capacity: {over}"
    );

    pixwire_cmd()
        .arg("--file")
        .arg(&file)
        .args(["--color", "never", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("receiver Rx1 port A is over capacity (900/400)"));
}

#[test]
fn test_rejections_map_to_exit_codes() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("diagram.json");
    let rig = build_rig(&file);

    assert_eq!(run_code(&file, &["capacity", &rig.receiver, "1", "-1"]), Some(9));
    assert_eq!(run_code(&file, &["disconnect", "no-such-wire"]), Some(4));
    assert_eq!(run_code(&file, &["rename", "no-such-entity", "X"]), Some(4));
}

#[test]
fn test_delete_requires_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("diagram.json");
    let rig = build_rig(&file);

    assert_eq!(run_code(&file, &["delete", &rig.board]), Some(2));
    assert!(std::fs::read_to_string(&file).unwrap().contains(&rig.board));

    run_ok(&file, &["-y", "delete", &rig.board]);
    let saved = std::fs::read_to_string(&file).unwrap();
    assert!(!saved.contains(&rig.board));
    // Every wire touched the board or one of its ports.
    assert_eq!(run_ok(&file, &["-o", "plain", "list", "wires"]), "");
    assert_eq!(run_ok(&file, &["-o", "plain", "list", "receivers"]), rig.receiver);
}

#[test]
fn test_snap_connects_within_radius() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("diagram.json");
    let rig = build_rig(&file);
    let dp = &rig.board_ports[1];
    let rx2 = run_ok(&file, &["-o", "plain", "add", "receiver", "Rx2", "--port", "A:400"]);

    let miss = run_ok(
        &file,
        &[
            "snap",
            &format!("{dp}:diff-port-output"),
            "--at",
            "500,500",
            "--anchor",
            &format!("{rx2}:receiver-input@108,103"),
            "--radius",
            "15",
        ],
    );
    assert!(miss.contains("No compatible handle"));

    run_ok(
        &file,
        &[
            "snap",
            &format!("{dp}:diff-port-output"),
            "--at",
            "105,102",
            "--anchor",
            &format!("{rx2}:receiver-input@108,103"),
            "--radius",
            "15",
        ],
    );
    assert_eq!(run_ok(&file, &["-o", "plain", "list", "wires"]).lines().count(), 4);
}
