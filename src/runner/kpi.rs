use super::*;

pub const KEY_DOCTOR_OK: &str = "DOCTOR_OK";
pub const KEY_TARGET_SET: &str = "TARGET_SET";
pub const KEY_BASELINE_SHA: &str = "BASELINE_SHA";
pub const KEY_TOOLCHAIN_VERSION: &str = "TOOLCHAIN_VERSION";
pub const KEY_TARGET_WARNINGS: &str = "TARGET_WARNINGS";
pub const KEY_TARGET_WARNING_DELTA: &str = "TARGET_WARNING_DELTA";
pub const KEY_P0_OPEN: &str = "P0_OPEN";

pub const DOCTOR_KPI_KEYS: [&str; 7] = [
    KEY_DOCTOR_OK,
    KEY_TARGET_SET,
    KEY_BASELINE_SHA,
    KEY_TOOLCHAIN_VERSION,
    KEY_TARGET_WARNINGS,
    KEY_TARGET_WARNING_DELTA,
    KEY_P0_OPEN,
];

/// Scans `KEY=VALUE` lines and keeps the first value seen for each recognized key.
pub fn scan_key_values(text: &str, keys: &[&str]) -> Result<HashMap<String, String>> {
    let pattern =
        Regex::new(r"^([A-Z0-9_]+)=(.*)$").context("failed to compile KEY=VALUE regex")?;

    let mut values = HashMap::new();
    for line in text.lines() {
        let Some(captures) = pattern.captures(line.trim()) else {
            continue;
        };
        let key = &captures[1];
        if !keys.contains(&key) || values.contains_key(key) {
            continue;
        }
        values.insert(key.to_string(), captures[2].trim().to_string());
    }
    Ok(values)
}

fn int_value(values: &HashMap<String, String>, key: &str) -> Option<i64> {
    let raw = values.get(key)?;
    match raw.to_ascii_lowercase().as_str() {
        "true" => Some(1),
        "false" => Some(0),
        other => other.parse::<i64>().ok(),
    }
}

fn text_value(values: &HashMap<String, String>, key: &str) -> String {
    values.get(key).cloned().unwrap_or_default()
}

/// Builds the report KPIs from the diagnostic gate's stdout. Absent or
/// unparseable numbers default to 0; the delta keeps a presence flag because the
/// verdict requires it to exist.
pub fn harvest_doctor_kpi(doctor_stdout: &str) -> Result<RunKpi> {
    let values = scan_key_values(doctor_stdout, &DOCTOR_KPI_KEYS)?;
    let delta = int_value(&values, KEY_TARGET_WARNING_DELTA);

    Ok(RunKpi {
        doctor_ok: int_value(&values, KEY_DOCTOR_OK).unwrap_or(0),
        target_set: text_value(&values, KEY_TARGET_SET),
        baseline_sha: text_value(&values, KEY_BASELINE_SHA),
        toolchain_version: text_value(&values, KEY_TOOLCHAIN_VERSION),
        target_warnings: int_value(&values, KEY_TARGET_WARNINGS).unwrap_or(0),
        target_warning_delta: delta.unwrap_or(0),
        target_warning_delta_present: i64::from(delta.is_some()),
        p0_open: int_value(&values, KEY_P0_OPEN).unwrap_or(0),
        ..RunKpi::default()
    })
}

/// Records the ledger's genesis baseline next to the harvested one.
pub fn link_baseline(kpi: &mut RunKpi, ledger_baseline_sha: Option<&str>) {
    let ledger_baseline_sha = ledger_baseline_sha.unwrap_or_default().trim();
    kpi.ledger_baseline_sha = ledger_baseline_sha.to_string();
    let harvested = kpi.baseline_sha.trim();
    kpi.baseline_match =
        i64::from(!harvested.is_empty() && harvested == ledger_baseline_sha);
}
