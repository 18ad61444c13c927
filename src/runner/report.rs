use super::*;

pub const RUN_RESULT_FILE: &str = "run_result.json";

#[derive(Debug, Clone)]
pub struct PersistedReport {
    pub run_path: PathBuf,
    pub latest_path: PathBuf,
}

pub fn latest_report_path(artifacts_root: &Path) -> PathBuf {
    artifacts_root.join("latest").join(RUN_RESULT_FILE)
}

/// Creates `<artifacts>/runs/<run_id>`; an existing directory is never reused.
pub fn create_run_directory(artifacts_root: &Path, run_id: &str) -> Result<PathBuf> {
    let runs_root = artifacts_root.join("runs");
    ensure_directory(&runs_root)?;

    let run_dir = runs_root.join(run_id);
    match fs::create_dir(&run_dir) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(FailReason::RunIdCollision(run_id.to_string()))
                .with_context(|| format!("run directory exists: {}", run_dir.display()));
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to create run directory {}", run_dir.display()));
        }
    }
    ensure_directory(&run_dir.join("logs"))?;
    Ok(run_dir)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckLogs {
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

pub fn check_log_paths(logs_dir: &Path, check_id: &str) -> CheckLogs {
    let stem = sanitize_file_component(check_id);
    CheckLogs {
        stdout: logs_dir.join(format!("{stem}.stdout.log")),
        stderr: logs_dir.join(format!("{stem}.stderr.log")),
    }
}

pub fn write_check_logs(logs: &CheckLogs, stdout: &str, stderr: &str) -> Result<()> {
    write_atomic(&logs.stdout, stdout.as_bytes())?;
    write_atomic(&logs.stderr, stderr.as_bytes())?;
    Ok(())
}

/// Writes the immutable per-run report, then overwrites the latest pointer with
/// identical content.
pub fn persist_report(
    artifacts_root: &Path,
    run_dir: &Path,
    report: &RunReport,
) -> Result<PersistedReport> {
    let run_path = run_dir.join(RUN_RESULT_FILE);
    if run_path.exists() {
        return Err(FailReason::RunIdCollision(report.run_id.clone()))
            .with_context(|| format!("run report already exists: {}", run_path.display()));
    }
    write_json_pretty(&run_path, report)?;

    let latest_path = latest_report_path(artifacts_root);
    write_json_pretty(&latest_path, report)?;

    info!(
        run_path = %run_path.display(),
        latest_path = %latest_path.display(),
        result = report.summary.result.as_str(),
        "run report written"
    );
    Ok(PersistedReport {
        run_path,
        latest_path,
    })
}

/// Flat `KEY=VALUE` lines for downstream automation.
pub fn summary_lines(report: &RunReport, persisted: &PersistedReport) -> Vec<String> {
    let summary = &report.summary;
    let mut lines = vec![format!("RUN_ID={}", report.run_id)];
    for check in &report.checks {
        lines.push(format!("{}={}", check.id, check.status.as_str()));
    }
    lines.push(format!("FAILED_CHECKS={}", summary.failed_checks.join(",")));
    lines.push(format!("WAIVED_CHECKS={}", summary.waived_checks.join(",")));
    lines.push(format!("TIMED_OUT_CHECKS={}", summary.timed_out_checks.join(",")));
    lines.push(format!("DOCTOR_OK={}", report.kpi.doctor_ok));
    lines.push(format!("TARGET_SET={}", report.kpi.target_set));
    lines.push(format!("BASELINE_SHA={}", report.kpi.baseline_sha));
    lines.push(format!("LEDGER_BASELINE_SHA={}", report.kpi.ledger_baseline_sha));
    lines.push(format!("BASELINE_MATCH={}", report.kpi.baseline_match));
    lines.push(format!("TOOLCHAIN_VERSION={}", report.kpi.toolchain_version));
    lines.push(format!("TARGET_WARNING_DELTA={}", report.kpi.target_warning_delta));
    lines.push(format!("ACTIVE_WAIVERS={}", report.waivers.active.len()));
    lines.push(format!(
        "EXPIRED_WAIVERS={}",
        report.waivers.expired_or_invalid.len()
    ));
    lines.push(format!("REPORT_PATH={}", persisted.run_path.display()));
    lines.push(format!("LATEST_PATH={}", persisted.latest_path.display()));
    lines.push(format!("RESULT={}", summary.result.as_str()));
    if let Some(reason) = summary.gate_failures.first() {
        lines.push(format!("FAIL_REASON={reason}"));
    }
    lines
}
