// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! CLI end-to-end tests
//!
//! Drive the `pipewright` binary against pipelines in temporary directories.

#![cfg(unix)]

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::{tempdir, TempDir};

#[allow(deprecated)]
fn pipewright_cmd() -> Command {
    let mut cmd = Command::cargo_bin("pipewright").unwrap();
    cmd.env("NO_COLOR", "1").env_remove("PIPEWRIGHT_LOG");
    cmd
}

fn project(yaml: &str) -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("pipeline.yml"), yaml).unwrap();
    dir
}

fn report_files(dir: &Path) -> Vec<String> {
    match fs::read_dir(dir.join("reports")) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

const PASSING: &str = r#"
name: demo
parallel_steps:
  - step: lint
    command: "true"
pipeline:
  - step: build
    commands:
      - echo building
      - echo built
cleanup:
  - step: tidy
    command: echo tidy
"#;

const FAILING: &str = r#"
name: broken
pipeline:
  - step: build
    command: "false"
  - step: deploy
    command: echo deploying
cleanup:
  - step: tidy
    command: echo tidy
"#;

#[test]
fn test_cli_help_flag() {
    pipewright_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("pipewright"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_no_args_shows_usage() {
    pipewright_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_run_success_writes_report() {
    let dir = project(PASSING);

    pipewright_cmd()
        .arg("-C")
        .arg(dir.path())
        .args(["run", "--parallel"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline completed successfully"))
        .stdout(predicate::str::contains("build"));

    let reports = report_files(dir.path());
    assert_eq!(reports.len(), 1);
    assert!(reports[0].starts_with("pipeline_report_"));
}

#[test]
fn test_run_failure_exits_nonzero_and_runs_cleanup() {
    let dir = project(FAILING);

    pipewright_cmd()
        .arg("-C")
        .arg(dir.path())
        .arg("run")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Pipeline completed with errors"))
        .stdout(predicate::str::contains("tidy"))
        .stdout(predicate::str::contains("deploy").not());
}

#[test]
fn test_run_log_level_mirrors_events_to_log() {
    let dir = project(PASSING);

    pipewright_cmd()
        .arg("-C")
        .arg(dir.path())
        .args(["run", "--log-level", "info"])
        .assert()
        .success()
        .stderr(predicate::str::contains("step_success"))
        .stderr(predicate::str::contains("pipeline_finished"));

    pipewright_cmd()
        .arg("-C")
        .arg(dir.path())
        .arg("run")
        .assert()
        .success()
        .stderr(predicate::str::contains("step_success").not());
}

#[test]
fn test_run_with_env_override() {
    let dir = project(
        r#"
pipeline:
  - step: check-env
    command: test "$APP_ENV" = ci
"#,
    );

    pipewright_cmd()
        .arg("-C")
        .arg(dir.path())
        .args(["run", "-e", "APP_ENV=ci"])
        .assert()
        .success();

    pipewright_cmd()
        .arg("-C")
        .arg(dir.path())
        .args(["run", "-e", "APP_ENV=prod"])
        .assert()
        .failure();
}

#[test]
fn test_run_rejects_malformed_env() {
    let dir = project(PASSING);

    pipewright_cmd()
        .arg("-C")
        .arg(dir.path())
        .args(["run", "-e", "NOVALUE"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid environment variable"));

    assert!(report_files(dir.path()).is_empty());
}

#[test]
fn test_run_missing_pipeline() {
    let dir = tempdir().unwrap();

    pipewright_cmd()
        .arg("-C")
        .arg(dir.path())
        .args(["run", "-p", "missing.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Pipeline file not found"));
}

#[test]
fn test_validate_valid_pipeline() {
    let dir = project(PASSING);

    pipewright_cmd()
        .arg("-C")
        .arg(dir.path())
        .args(["validate", "pipeline.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid"));
}

#[test]
fn test_validate_pipeline_without_steps() {
    let dir = project("name: empty\ncleanup:\n  - step: tidy\n    command: echo tidy\n");

    pipewright_cmd()
        .arg("-C")
        .arg(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("no steps defined"));
}

#[test]
fn test_history_after_runs() {
    let dir = project(PASSING);

    pipewright_cmd()
        .arg("-C")
        .arg(dir.path())
        .arg("run")
        .assert()
        .success();

    pipewright_cmd()
        .arg("-C")
        .arg(dir.path())
        .args(["history", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_runs\": 1"))
        .stdout(predicate::str::contains("\"success_rate\": 100.0"));
}

#[test]
fn test_history_without_reports() {
    let dir = tempdir().unwrap();

    pipewright_cmd()
        .arg("-C")
        .arg(dir.path())
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No runs recorded"));
}
