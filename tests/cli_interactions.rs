//! CLI options interaction tests
//!
//! These run the compiled binary and check exit codes, error messages and
//! the JSON report of a short loopback run.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::net::UdpSocket;
use std::process::Command;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const ENV_VARS: [&str; 9] = [
    "TARGET_IP",
    "TARGET_PORT",
    "TEST_DURATION",
    "THREAD_COUNT",
    "PACKET_SIZE",
    "ENABLE_COLOR",
    "SHUTDOWN_TIMEOUT_SECONDS",
    "SAMPLE_INTERVAL_MS",
    "LOG_FILE",
];

/// Helper function to create a test command isolated from any local .env
fn create_test_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("udp-traffic-tester").unwrap();
    cmd.current_dir(dir.path());
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Loopback receiver that counts datagrams until it goes quiet
fn spawn_receiver() -> (u16, thread::JoinHandle<u64>) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let port = socket.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let mut buf = [0u8; 2048];
        let mut received = 0u64;
        while socket.recv_from(&mut buf).is_ok() {
            received += 1;
        }
        received
    });
    (port, handle)
}

#[test]
fn test_help_lists_options() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--ip"))
        .stdout(predicate::str::contains("--duration"))
        .stdout(predicate::str::contains("--packet-size"))
        .stdout(predicate::str::contains("--skip-preflight"));
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_target_exits_with_config_error() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--duration", "1", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Target IP is required"));
}

#[test]
fn test_missing_duration_exits_with_config_error() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--ip", "127.0.0.1", "--no-color"])
        .assert()
        .code(1);
}

#[test]
fn test_out_of_range_values_are_rejected() {
    let dir = TempDir::new().unwrap();

    create_test_cmd(&dir)
        .args(["--ip", "127.0.0.1", "--duration", "1", "--threads", "0", "--no-color"])
        .assert()
        .code(1);

    create_test_cmd(&dir)
        .args(["--ip", "127.0.0.1", "--duration", "1", "--packet-size", "70000", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("65507"));

    create_test_cmd(&dir)
        .args(["--ip", "127.0.0.1", "--port", "0", "--duration", "1", "--no-color"])
        .assert()
        .code(1);

    // Rejected by the argument parser itself
    create_test_cmd(&dir)
        .args(["--ip", "127.0.0.1", "--duration", "0"])
        .assert()
        .failure();
}

#[test]
fn test_env_file_supplies_target() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".env"), "TARGET_IP=127.0.0.1\nTHREAD_COUNT=0\n").unwrap();

    // The .env target is picked up, and its bad thread count is reported
    create_test_cmd(&dir)
        .args(["--duration", "1", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Target IP is required").not());
}

#[test]
fn test_unresolvable_target_exits_with_network_code() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--ip", "no-such-host.invalid", "--duration", "1", "--skip-preflight", "--no-color"])
        .assert()
        .code(2);
}

#[test]
fn test_json_loopback_run() {
    let dir = TempDir::new().unwrap();
    let (port, receiver) = spawn_receiver();

    let output = create_test_cmd(&dir)
        .args([
            "--ip",
            "127.0.0.1",
            "--port",
            &port.to_string(),
            "--duration",
            "1",
            "--threads",
            "2",
            "--packet-size",
            "256",
            "--sample-interval",
            "250",
            "--json",
            "--skip-preflight",
        ])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    let sent = report["packets_sent"].as_u64().unwrap();
    let successes = report["successes"].as_u64().unwrap();
    let failures = report["failures"].as_u64().unwrap();

    assert!(sent > 0);
    assert_eq!(sent, successes + failures);
    assert_eq!(report["bytes_sent"].as_u64().unwrap(), successes * 256);
    assert_eq!(report["configured_workers"], 2);
    assert_eq!(report["cancelled"], false);
    assert_eq!(report["target"], format!("127.0.0.1:{}", port));

    assert!(receiver.join().unwrap() > 0);
}

#[test]
fn test_json_verbose_keeps_stdout_clean() {
    let dir = TempDir::new().unwrap();
    let (port, _receiver) = spawn_receiver();

    let output = create_test_cmd(&dir)
        .args([
            "--ip",
            "127.0.0.1",
            "--port",
            &port.to_string(),
            "--duration",
            "1",
            "--threads",
            "1",
            "--packet-size",
            "64",
            "--json",
            "--verbose",
            "--skip-preflight",
        ])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    // Log lines go to stderr; stdout is exactly one JSON document
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["configured_workers"], 1);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Run completed"), "stderr: {}", stderr);
}

#[test]
fn test_log_file_records_run() {
    let dir = TempDir::new().unwrap();
    let (port, _receiver) = spawn_receiver();
    let log_path = dir.path().join("run.log");

    create_test_cmd(&dir)
        .args([
            "--ip",
            "127.0.0.1",
            "--port",
            &port.to_string(),
            "--duration",
            "1",
            "--threads",
            "1",
            "--packet-size",
            "64",
            "--json",
            "--skip-preflight",
            "--log-file",
        ])
        .arg(&log_path)
        .assert()
        .success();

    let content = fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("[ENGINE] Run completed"), "log: {}", content);
    assert!(content.contains("Runner state"));
}

#[test]
fn test_unwritable_log_file_exits_with_io_code() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args([
            "--ip",
            "127.0.0.1",
            "--duration",
            "1",
            "--skip-preflight",
            "--no-color",
            "--log-file",
            "no-such-dir/run.log",
        ])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("Failed to open log file"));
}

#[test]
fn test_table_output_run() {
    let dir = TempDir::new().unwrap();
    let (port, _receiver) = spawn_receiver();

    create_test_cmd(&dir)
        .args([
            "--ip",
            "127.0.0.1",
            "--port",
            &port.to_string(),
            "--duration",
            "1",
            "--threads",
            "1",
            "--packet-size",
            "64",
            "--no-color",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("UDP Traffic Test Results"))
        .stdout(predicate::str::contains("Packets sent"));
}
