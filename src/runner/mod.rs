use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::FailReason;
use crate::ledger::{self, waiver_is_active};
use crate::model::{
    CheckOutcome, CheckStatus, InactiveWaiver, RUN_REPORT_SCHEMA_VERSION, RunKpi,
    RunReport, RunResult, RunSummary, WAIVER_REGISTRY_SCHEMA_VERSION, WaiverRecord,
    WaiverRegistry, WaiverSummary,
};
use crate::util::{
    ensure_directory, sanitize_file_component, utc_compact_string, utc_string, write_atomic,
    write_json_pretty,
};

mod exec;
mod kpi;
mod report;
mod verdict;
mod waivers;
#[cfg(test)]
mod tests;

pub use self::exec::{CommandOutput, CommandRunner, ProcessCommandRunner};
pub use self::kpi::{harvest_doctor_kpi, link_baseline, scan_key_values};
pub use self::report::{CheckLogs, PersistedReport, latest_report_path, summary_lines};
pub use self::verdict::evaluate;
pub use self::waivers::{apply_waiver, classify_waivers, load_waiver_registry};

use self::report::{check_log_paths, create_run_directory, persist_report};

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    pub persisted: PersistedReport,
}

impl RunOutcome {
    pub fn is_pass(&self) -> bool {
        self.report.summary.result == RunResult::Pass
    }
}

/// Runs every configured check in order, then writes the report. Configuration
/// and external JSON are validated before the first check starts.
pub fn run_pipeline(config: &PipelineConfig, runner: &dyn CommandRunner) -> Result<RunOutcome> {
    config.validate()?;

    let started = Utc::now();
    let registry = load_waiver_registry(&config.waiver_registry_path)?;
    let ledger = ledger::load(&config.ledger_path)?;
    if let Err(violation) = ledger::validate(&ledger, started) {
        warn!(reason = %violation, "ledger does not validate; baseline linkage still read from first entry");
    }

    let waivers = classify_waivers(&registry, started);
    let run_id = sanitize_file_component(&utc_compact_string(started));
    let run_dir = create_run_directory(&config.artifacts_root, &run_id)?;
    let logs_dir = run_dir.join("logs");

    info!(
        run_id = %run_id,
        checks = config.checks.len(),
        active_waivers = waivers.active.len(),
        expired_waivers = waivers.expired_or_invalid.len(),
        "release gate run started"
    );

    let mut checks = Vec::with_capacity(config.checks.len());
    let mut doctor_stdout = String::new();
    for spec in &config.checks {
        let check_started = Utc::now();
        info!(check = %spec.id, command = %spec.command.join(" "), "check started");
        let logs = check_log_paths(&logs_dir, &spec.id);
        let output = runner
            .run(spec, config.timeout(), &logs)
            .with_context(|| format!("failed to capture output of {}", spec.id))?;
        let (status, waiver) =
            apply_waiver(&spec.id, output.exit_code, output.timed_out, &waivers);

        info!(
            check = %spec.id,
            status = status.as_str(),
            exit_code = output.exit_code,
            duration_ms = output.duration_ms,
            timed_out = output.timed_out,
            "check finished"
        );

        if spec.id == config.kpi_source_check_id {
            doctor_stdout = output.stdout;
        }
        checks.push(CheckOutcome {
            id: spec.id.clone(),
            command: spec.command.clone(),
            exit_code: output.exit_code,
            status,
            started_at: utc_string(check_started),
            duration_ms: output.duration_ms,
            timed_out: output.timed_out,
            stdout_path: logs.stdout.display().to_string(),
            stderr_path: logs.stderr.display().to_string(),
            waiver,
        });
    }

    let mut kpi = harvest_doctor_kpi(&doctor_stdout)?;
    link_baseline(&mut kpi, ledger.first_baseline_sha());
    let summary = evaluate(&checks, &kpi);

    let report = RunReport {
        schema_version: RUN_REPORT_SCHEMA_VERSION,
        run_id,
        started_at: utc_string(started),
        finished_at: utc_string(Utc::now()),
        checks,
        kpi,
        waivers,
        summary,
    };
    let persisted = persist_report(&config.artifacts_root, &run_dir, &report)?;

    info!(
        run_id = %report.run_id,
        result = report.summary.result.as_str(),
        failed = report.summary.failed_checks.len(),
        waived = report.summary.waived_checks.len(),
        "release gate run finished"
    );

    Ok(RunOutcome { report, persisted })
}
