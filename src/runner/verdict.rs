use super::*;

pub const GATE_CHECKS_FAILED: &str = "CHECKS_FAILED";
pub const GATE_DOCTOR_NOT_OK: &str = "DOCTOR_NOT_OK";
pub const GATE_TARGET_SET_EMPTY: &str = "TARGET_SET_EMPTY";
pub const GATE_BASELINE_MISMATCH: &str = "BASELINE_MISMATCH";
pub const GATE_TOOLCHAIN_VERSION_MISSING: &str = "TOOLCHAIN_VERSION_MISSING";
pub const GATE_WARNING_DELTA_MISSING: &str = "WARNING_DELTA_MISSING";
pub const GATE_WARNING_DELTA_POSITIVE: &str = "WARNING_DELTA_POSITIVE";

fn ids_with(checks: &[CheckOutcome], keep: impl Fn(&CheckOutcome) -> bool) -> Vec<String> {
    checks
        .iter()
        .filter(|check| keep(*check))
        .map(|check| check.id.clone())
        .collect()
}

/// Aggregates check outcomes and parsed KPIs into the release verdict. Operates
/// only on already-harvested values.
pub fn evaluate(checks: &[CheckOutcome], kpi: &RunKpi) -> RunSummary {
    let failed_checks = ids_with(checks, |check| check.status == CheckStatus::Fail);
    let waived_checks = ids_with(checks, |check| check.status == CheckStatus::Waived);
    let timed_out_checks = ids_with(checks, |check| check.timed_out);

    let mut gate_failures = Vec::new();
    if !failed_checks.is_empty() {
        gate_failures.push(GATE_CHECKS_FAILED.to_string());
    }
    if kpi.doctor_ok != 1 {
        gate_failures.push(GATE_DOCTOR_NOT_OK.to_string());
    }
    if kpi.target_set.trim().is_empty() {
        gate_failures.push(GATE_TARGET_SET_EMPTY.to_string());
    }
    if kpi.baseline_match != 1 {
        gate_failures.push(GATE_BASELINE_MISMATCH.to_string());
    }
    if kpi.toolchain_version.trim().is_empty() {
        gate_failures.push(GATE_TOOLCHAIN_VERSION_MISSING.to_string());
    }
    if kpi.target_warning_delta_present != 1 {
        gate_failures.push(GATE_WARNING_DELTA_MISSING.to_string());
    } else if kpi.target_warning_delta > 0 {
        gate_failures.push(GATE_WARNING_DELTA_POSITIVE.to_string());
    }

    RunSummary {
        result: if gate_failures.is_empty() {
            RunResult::Pass
        } else {
            RunResult::Fail
        },
        failed_checks,
        waived_checks,
        timed_out_checks,
        gate_failures,
        doctor_ok: kpi.doctor_ok,
        target_set: kpi.target_set.clone(),
        baseline_match: kpi.baseline_match,
        toolchain_version: kpi.toolchain_version.clone(),
        target_warning_delta: kpi.target_warning_delta,
    }
}
