use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;

use anyhow::Result;

use super::report::{check_log_paths, write_check_logs};
use super::{
    CheckLogs, CommandOutput, CommandRunner, ProcessCommandRunner, evaluate, harvest_doctor_kpi,
    link_baseline, run_pipeline, scan_key_values, summary_lines,
};
use crate::config::PipelineConfig;
use crate::error::reason_code;
use crate::ledger;
use crate::model::{CheckSpec, CheckStatus, RunReport, RunResult};

const HEALTHY_DOCTOR: &str = "doctor v2\nDOCTOR_OK=1\nTARGET_SET=linux-x64,macos-arm64\nBASELINE_SHA=abc123\nTOOLCHAIN_VERSION=1.84.0\nTARGET_WARNINGS=12\nTARGET_WARNING_DELTA=-1\nP0_OPEN=0\n";

#[derive(Default)]
struct FakeCommandRunner {
    outputs: HashMap<String, CommandOutput>,
    calls: RefCell<Vec<String>>,
}

impl FakeCommandRunner {
    fn with(mut self, id: &str, exit_code: i32, stdout: &str) -> Self {
        self.outputs.insert(
            id.to_string(),
            CommandOutput {
                exit_code,
                stdout: stdout.to_string(),
                stderr: String::new(),
                duration_ms: 5,
                timed_out: false,
            },
        );
        self
    }

    fn timing_out(mut self, id: &str) -> Self {
        self.outputs.insert(
            id.to_string(),
            CommandOutput {
                exit_code: 124,
                timed_out: true,
                duration_ms: 1_000,
                ..CommandOutput::default()
            },
        );
        self
    }
}

impl CommandRunner for FakeCommandRunner {
    fn run(&self, spec: &CheckSpec, _timeout: Duration, logs: &CheckLogs) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(spec.id.clone());
        let output = self.outputs.get(&spec.id).cloned().unwrap_or_default();
        write_check_logs(logs, &output.stdout, &output.stderr)?;
        Ok(output)
    }
}

fn fixture_config(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::new(
        root.join("artifacts"),
        root.join("waivers.json"),
        root.join("ledger.json"),
    );
    config.checks = vec![
        CheckSpec {
            id: "CHECK_01_TESTS".to_string(),
            command: vec!["tests".to_string()],
        },
        CheckSpec {
            id: "CHECK_02_DOCTOR".to_string(),
            command: vec!["doctor".to_string()],
        },
        CheckSpec {
            id: "CHECK_03_GUARD".to_string(),
            command: vec!["guard".to_string()],
        },
    ];
    config
}

fn bootstrap_ledger(config: &PipelineConfig, baseline_sha: &str) {
    ledger::bootstrap(&config.ledger_path, baseline_sha, "HO", Utc::now())
        .expect("bootstrap should succeed");
}

fn write_waiver(config: &PipelineConfig, gate_id: &str, ttl: &str) {
    let registry = json!({
        "schemaVersion": 1,
        "waivers": [{
            "gateId": gate_id,
            "reason": "tracked in REL-42",
            "owner": "release-team",
            "ttl": ttl
        }]
    });
    std::fs::write(
        &config.waiver_registry_path,
        serde_json::to_vec_pretty(&registry).unwrap(),
    )
    .expect("write waivers");
}

fn healthy_runner() -> FakeCommandRunner {
    FakeCommandRunner::default()
        .with("CHECK_01_TESTS", 0, "ok\n")
        .with("CHECK_02_DOCTOR", 0, HEALTHY_DOCTOR)
        .with("CHECK_03_GUARD", 0, "")
}

#[test]
fn healthy_run_passes_and_writes_both_reports() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = fixture_config(dir.path());
    bootstrap_ledger(&config, "abc123");

    let runner = healthy_runner();
    let outcome = run_pipeline(&config, &runner).expect("run should complete");

    assert!(outcome.is_pass());
    assert_eq!(
        *runner.calls.borrow(),
        vec!["CHECK_01_TESTS", "CHECK_02_DOCTOR", "CHECK_03_GUARD"]
    );
    assert_eq!(outcome.report.kpi.baseline_match, 1);
    assert_eq!(outcome.report.kpi.target_warning_delta, -1);
    assert!(outcome.report.summary.gate_failures.is_empty());

    let run_raw = std::fs::read(&outcome.persisted.run_path).expect("run report");
    let latest_raw = std::fs::read(&outcome.persisted.latest_path).expect("latest report");
    assert_eq!(run_raw, latest_raw);
    let parsed: RunReport = serde_json::from_slice(&run_raw).expect("report parses");
    assert_eq!(parsed.summary.result, RunResult::Pass);
    assert_eq!(parsed.checks.len(), 3);

    let doctor_log =
        std::fs::read_to_string(&parsed.checks[1].stdout_path).expect("doctor stdout log");
    assert_eq!(doctor_log, HEALTHY_DOCTOR);
}

#[test]
fn active_waiver_upgrades_failure_and_expired_one_does_not() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = fixture_config(dir.path());
    bootstrap_ledger(&config, "abc123");

    let future = (Utc::now() + ChronoDuration::hours(1)).to_rfc3339();
    write_waiver(&config, "CHECK_03_GUARD", &future);
    let runner = healthy_runner().with("CHECK_03_GUARD", 2, "");
    let outcome = run_pipeline(&config, &runner).expect("run with active waiver");
    let guard = &outcome.report.checks[2];
    assert_eq!(guard.status, CheckStatus::Waived);
    assert_eq!(
        guard.waiver.as_ref().map(|waiver| waiver.owner.as_str()),
        Some("release-team")
    );
    assert!(outcome.is_pass());
    assert_eq!(outcome.report.summary.waived_checks, vec!["CHECK_03_GUARD"]);

    config.artifacts_root = dir.path().join("artifacts-expired");
    let past = (Utc::now() - ChronoDuration::hours(1)).to_rfc3339();
    write_waiver(&config, "CHECK_03_GUARD", &past);
    let runner = healthy_runner().with("CHECK_03_GUARD", 2, "");
    let outcome = run_pipeline(&config, &runner).expect("run with expired waiver");
    assert_eq!(outcome.report.checks[2].status, CheckStatus::Fail);
    assert!(!outcome.is_pass());
    assert_eq!(outcome.report.summary.failed_checks, vec!["CHECK_03_GUARD"]);
    assert_eq!(outcome.report.waivers.expired_or_invalid.len(), 1);
    assert!(outcome.report.waivers.active.is_empty());
}

#[test]
fn passing_check_is_never_waived() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = fixture_config(dir.path());
    bootstrap_ledger(&config, "abc123");
    let future = (Utc::now() + ChronoDuration::hours(1)).to_rfc3339();
    write_waiver(&config, "CHECK_01_TESTS", &future);

    let outcome = run_pipeline(&config, &healthy_runner()).expect("run");
    assert_eq!(outcome.report.checks[0].status, CheckStatus::Pass);
    assert!(outcome.report.checks[0].waiver.is_none());
}

#[test]
fn timed_out_check_fails_but_can_be_waived() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = fixture_config(dir.path());
    bootstrap_ledger(&config, "abc123");

    let runner = healthy_runner().timing_out("CHECK_01_TESTS");
    let outcome = run_pipeline(&config, &runner).expect("run");
    assert_eq!(outcome.report.checks[0].status, CheckStatus::Fail);
    assert!(outcome.report.checks[0].timed_out);
    assert_eq!(outcome.report.summary.timed_out_checks, vec!["CHECK_01_TESTS"]);
    assert_eq!(runner.calls.borrow().len(), 3, "later checks still run");

    config.artifacts_root = dir.path().join("artifacts-waived");
    let future = (Utc::now() + ChronoDuration::hours(1)).to_rfc3339();
    write_waiver(&config, "CHECK_01_TESTS", &future);
    let runner = healthy_runner().timing_out("CHECK_01_TESTS");
    let outcome = run_pipeline(&config, &runner).expect("run");
    assert_eq!(outcome.report.checks[0].status, CheckStatus::Waived);
    assert!(outcome.is_pass());
}

#[test]
fn baseline_mismatch_fails_gate_even_when_checks_pass() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = fixture_config(dir.path());
    bootstrap_ledger(&config, "fff999");

    let outcome = run_pipeline(&config, &healthy_runner()).expect("run");
    assert!(outcome.report.summary.failed_checks.is_empty());
    assert_eq!(outcome.report.kpi.baseline_match, 0);
    assert_eq!(outcome.report.kpi.ledger_baseline_sha, "fff999");
    assert_eq!(outcome.report.summary.result, RunResult::Fail);
    assert_eq!(
        outcome.report.summary.gate_failures,
        vec!["BASELINE_MISMATCH"]
    );
}

#[test]
fn malformed_waiver_registry_aborts_before_checks() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = fixture_config(dir.path());
    bootstrap_ledger(&config, "abc123");
    std::fs::write(&config.waiver_registry_path, b"{\"waivers\": [").expect("write");

    let runner = healthy_runner();
    let err = run_pipeline(&config, &runner).expect_err("registry is malformed");
    assert_eq!(reason_code(&err), "WAIVER_REGISTRY_INVALID");
    assert!(runner.calls.borrow().is_empty());
    assert!(!config.artifacts_root.join("runs").exists());
}

#[test]
fn malformed_ledger_aborts_before_checks() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = fixture_config(dir.path());
    std::fs::write(&config.ledger_path, b"not json").expect("write");

    let runner = healthy_runner();
    let err = run_pipeline(&config, &runner).expect_err("ledger is malformed");
    assert_eq!(reason_code(&err), "LEDGER_JSON_INVALID");
    assert!(runner.calls.borrow().is_empty());
}

#[test]
fn key_value_scanner_keeps_first_occurrence() {
    let text = "noise line\nDOCTOR_OK=1\n  TARGET_SET = x\nDOCTOR_OK=0\nUNRELATED=5\nTARGET_SET=a,b\n";
    let values = scan_key_values(text, &["DOCTOR_OK", "TARGET_SET"]).expect("scan");
    assert_eq!(values.get("DOCTOR_OK").map(String::as_str), Some("1"));
    assert_eq!(values.get("TARGET_SET").map(String::as_str), Some("a,b"));
    assert!(!values.contains_key("UNRELATED"));
}

#[test]
fn missing_kpis_default_and_fail_the_verdict() {
    let mut kpi = harvest_doctor_kpi("DOCTOR_OK=true\nTARGET_WARNINGS=lots\n").expect("harvest");
    assert_eq!(kpi.doctor_ok, 1);
    assert_eq!(kpi.target_warnings, 0);
    assert_eq!(kpi.target_warning_delta_present, 0);
    link_baseline(&mut kpi, None);
    assert_eq!(kpi.baseline_match, 0);

    let summary = evaluate(&[], &kpi);
    assert_eq!(summary.result, RunResult::Fail);
    assert_eq!(
        summary.gate_failures,
        vec![
            "TARGET_SET_EMPTY",
            "BASELINE_MISMATCH",
            "TOOLCHAIN_VERSION_MISSING",
            "WARNING_DELTA_MISSING"
        ]
    );

    let mut kpi = harvest_doctor_kpi(&HEALTHY_DOCTOR.replace("DELTA=-1", "DELTA=3"))
        .expect("harvest");
    link_baseline(&mut kpi, Some("abc123"));
    let summary = evaluate(&[], &kpi);
    assert_eq!(summary.gate_failures, vec!["WARNING_DELTA_POSITIVE"]);
}

#[test]
fn summary_lines_end_with_result_and_reason() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = fixture_config(dir.path());
    bootstrap_ledger(&config, "abc123");
    let runner = healthy_runner().with("CHECK_01_TESTS", 1, "");

    let outcome = run_pipeline(&config, &runner).expect("run");
    let lines = summary_lines(&outcome.report, &outcome.persisted);
    assert!(lines.contains(&"CHECK_01_TESTS=FAIL".to_string()));
    assert!(lines.contains(&"FAILED_CHECKS=CHECK_01_TESTS".to_string()));
    assert_eq!(
        &lines[lines.len() - 2..],
        &["RESULT=FAIL".to_string(), "FAIL_REASON=CHECKS_FAILED".to_string()]
    );
}

#[cfg(unix)]
#[test]
fn process_runner_captures_output_and_enforces_timeout() {
    let dir = tempfile::tempdir().expect("temp dir");
    let runner = ProcessCommandRunner;
    let spec = CheckSpec {
        id: "SHELL".to_string(),
        command: vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo DOCTOR_OK=1; echo oops >&2; exit 3".to_string(),
        ],
    };
    let logs = check_log_paths(dir.path(), &spec.id);
    let output = runner
        .run(&spec, Duration::from_secs(30), &logs)
        .expect("run shell");
    assert_eq!(output.exit_code, 3);
    assert_eq!(output.stdout, "DOCTOR_OK=1\n");
    assert_eq!(output.stderr, "oops\n");
    assert!(!output.timed_out);
    assert_eq!(
        std::fs::read_to_string(&logs.stdout).expect("stdout log"),
        "DOCTOR_OK=1\n"
    );

    let missing = CheckSpec {
        id: "MISSING".to_string(),
        command: vec!["definitely-not-a-real-binary-7f3a".to_string()],
    };
    let logs = check_log_paths(dir.path(), &missing.id);
    let output = runner
        .run(&missing, Duration::from_secs(1), &logs)
        .expect("spawn failure is an outcome");
    assert_eq!(output.exit_code, 127);
    assert!(output.stderr.contains("failed to spawn"));
    assert!(
        std::fs::read_to_string(&logs.stderr)
            .expect("stderr log")
            .contains("failed to spawn")
    );
}

#[cfg(unix)]
#[test]
fn timeout_kills_processes_started_by_the_check() {
    let dir = tempfile::tempdir().expect("temp dir");
    let spec = CheckSpec {
        id: "SLOW".to_string(),
        command: vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo start; sleep 6; echo done".to_string(),
        ],
    };
    let logs = check_log_paths(dir.path(), &spec.id);

    let wall = std::time::Instant::now();
    let output = ProcessCommandRunner
        .run(&spec, Duration::from_millis(300), &logs)
        .expect("run slow check");
    let elapsed = wall.elapsed();

    assert!(output.timed_out);
    assert_eq!(output.exit_code, 124);
    assert!(elapsed < Duration::from_secs(3), "timeout not bounded: {elapsed:?}");
    assert_eq!(output.stdout, "start\n");
}
