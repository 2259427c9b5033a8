use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Fast sim config; course state lands in the temp dir.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let state = dir.path().join("course_state.bin");
    let toml = format!(
        r#"
[actuators]
rollout_delay_ms = 0
clear_column_delay_ms = 20

[storage]
course_state_path = "{}"
"#,
        state.display().to_string().replace('\\', "/")
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn course_hex(mode: u8, pos: u8) -> String {
    let mut s = format!("{mode:02x}");
    for _ in 0..45 {
        s.push_str(&format!("{pos:02x}"));
    }
    s
}

#[rstest]
#[case(vec!["--help"], 0, "Usage:", "stdout")]
#[case(vec!["self-check"], 0, "self-check ok", "stdout")]
#[case(vec!["decode", "--hex", &*course_hex(0, 90).leak()], 0, "row 8:  90  90  90  90  90", "stdout")]
#[case(vec!["decode", "--kind", "dispense", "--hex", "04"], 0, "dispense 4 ball(s)", "stdout")]
#[case(vec!["decode", "--kind", "settings", "--hex", "01"], 0, "auto-dispense on", "stdout")]
#[case(vec!["decode", "--hex", "00"], 4, "request body was rejected", "stderr")]
#[case(vec!["decode", "--hex", &*course_hex(1, 0).leak()], 4, "mode", "stderr")]
#[case(vec!["decode", "--kind", "dispense", "--hex", "0b"], 4, "rejected", "stderr")]
#[case(vec!["decode", "--hex", "zz"], 4, "hex digit", "stderr")]
#[case(vec![], 2, "Usage:", "stderr")]
#[case(vec!["run", "--fill", "nope"], 2, "invalid value", "stderr")]
fn cli_table_cases(
    #[case] args: Vec<&str>,
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("putt").unwrap();
    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg);
    for a in &args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
#[case("[actuators]\nrollout_groups = 4\n", "rollout_groups")]
#[case("[actuators]\nchip_addresses = [0x40, 0x40, 0x41]\n", "duplicate")]
#[case("[scheduler]\ncontrol_period_ms = 0\n", "scheduler")]
#[case("[motors]\nplayer_chip = 0x70\n", "motors.player_chip")]
#[case("[actuators\n", "invalid configuration")]
fn bad_config_exits_with_config_code(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, toml).unwrap();

    Command::cargo_bin("putt")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains(needle));
}

#[test]
fn missing_config_file_means_defaults() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("putt")
        .unwrap()
        .current_dir(dir.path())
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::contains("0x40, 0x41, 0x42"))
        .stdout(predicate::str::contains("no saved course yet"));
}

#[test]
fn empty_saved_course_fails_self_check() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    fs::write(dir.path().join("course_state.bin"), b"").unwrap();

    Command::cargo_bin("putt")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("storage"));
}

#[test]
fn corrupt_saved_course_fails_self_check() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    fs::write(dir.path().join("course_state.bin"), [1u8, 2, 3]).unwrap();

    Command::cargo_bin("putt")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("storage"));
}

#[test]
fn text_run_prints_summary_and_stats() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    Command::cargo_bin("putt")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--duration-ms", "200", "--stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("balls hit: 0, in hole: 0"))
        // Fresh storage: nothing to restore.
        .stdout(predicate::str::contains("errors: storage"))
        .stdout(predicate::str::contains("task control"));
}
