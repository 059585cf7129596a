use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn dslx_fuzz(home: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("dslx-fuzz").unwrap();
    cmd.env("DSLX_FUZZ_HOME", home).env_remove("RUST_LOG");
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn test_generate_prints_program() {
    let home = TempDir::new().unwrap();
    dslx_fuzz(home.path())
        .args(["generate", "--seed", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fn main("))
        .stdout(predicate::str::contains("// fingerprint: "));
}

#[test]
fn test_generate_is_deterministic() {
    let home = TempDir::new().unwrap();
    let run = || {
        dslx_fuzz(home.path())
            .args(["generate", "--seed", "99", "--calls-per-sample", "3"])
            .output()
            .unwrap()
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn test_generate_json_then_replay() {
    let home = TempDir::new().unwrap();
    let output = dslx_fuzz(home.path())
        .args(["--json", "generate", "--seed", "4", "--calls-per-sample", "2"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["args_batch"].as_array().unwrap().len(), 2);
    assert!(json["program"]["functions"].is_array());

    let sample_path = home.path().join("sample.json");
    std::fs::write(&sample_path, &output.stdout).unwrap();
    dslx_fuzz(home.path())
        .arg("replay")
        .arg(&sample_path)
        .arg("--codegen")
        .assert()
        .success()
        .stdout(predicate::str::contains("Outcome: match"))
        .stdout(predicate::str::contains("codegen:"));
}

#[test]
fn test_run_reports_json() {
    let home = TempDir::new().unwrap();
    let artifacts = home.path().join("out");
    let output = dslx_fuzz(home.path())
        .args([
            "--json",
            "run",
            "--seed",
            "0",
            "--sample-count",
            "3",
            "--calls-per-sample",
            "2",
            "--codegen",
            "--disallow-divide",
        ])
        .arg("--artifact-dir")
        .arg(&artifacts)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report = stdout_json(&output);
    assert_eq!(report["samples_run"], 3);
    assert_eq!(report["samples_failed"], 0);
    assert_eq!(report["seed"], 0);
}

#[test]
fn test_run_with_shards() {
    let home = TempDir::new().unwrap();
    let output = dslx_fuzz(home.path())
        .args([
            "--json",
            "run",
            "--seed",
            "20",
            "--sample-count",
            "2",
            "--shards",
            "2",
            "--parallel-backends",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_json(&output)["samples_run"], 4);
}

#[test]
fn test_run_human_output() {
    let home = TempDir::new().unwrap();
    dslx_fuzz(home.path())
        .args(["run", "--seed", "3", "--sample-count", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Passed:"))
        .stdout(predicate::str::contains("seed: 3"));
}

#[test]
fn test_options_file_is_loaded() {
    let home = TempDir::new().unwrap();
    let options = home.path().join("options.json");
    std::fs::write(
        &options,
        r#"{"max_depth": 2, "short_samples": true, "binop_allowlist": ["add", "sub", "eq"]}"#,
    )
    .unwrap();
    dslx_fuzz(home.path())
        .args(["generate", "--seed", "5"])
        .arg("--options-file")
        .arg(&options)
        .assert()
        .success()
        .stdout(predicate::str::contains(" * ").not());
}

#[test]
fn test_invalid_options_file_fails() {
    let home = TempDir::new().unwrap();
    let options = home.path().join("options.json");
    std::fs::write(&options, r#"{"max_width_bits_types": 0}"#).unwrap();
    dslx_fuzz(home.path())
        .args(["run", "--sample-count", "1"])
        .arg("--options-file")
        .arg(&options)
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_width_bits_types"));
}

#[test]
fn test_zero_calls_rejected() {
    let home = TempDir::new().unwrap();
    dslx_fuzz(home.path())
        .args(["run", "--calls-per-sample", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--calls-per-sample"));
}

#[test]
fn test_sanity_passes() {
    let home = TempDir::new().unwrap();
    dslx_fuzz(home.path())
        .args(["sanity", "--seed", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Mismatches:"));
}

#[test]
fn test_replay_missing_path_fails() {
    let home = TempDir::new().unwrap();
    dslx_fuzz(home.path())
        .arg("replay")
        .arg(home.path().join("does-not-exist"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("sample.json").or(predicate::str::contains("does-not-exist")));
}

#[test]
fn test_excessive_depth_rejected() {
    let home = TempDir::new().unwrap();
    dslx_fuzz(home.path())
        .args(["generate", "--seed", "3", "--max-depth", "64"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_depth 64 exceeds"));
}
