use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::error::FailReason;
use crate::model::CheckSpec;

pub const DEFAULT_ARTIFACTS_ROOT: &str = ".artifacts/release-gate";
pub const DEFAULT_WAIVERS_PATH: &str = "release/waivers.json";
pub const DEFAULT_LEDGER_PATH: &str = "release/ledger.json";
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_KPI_SOURCE_CHECK_ID: &str = "CHECK_02_DOCTOR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub checks: Vec<CheckSpec>,
    pub kpi_source_check_id: String,
    pub artifacts_root: PathBuf,
    pub waiver_registry_path: PathBuf,
    pub ledger_path: PathBuf,
    pub timeout_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PipelineOverlay {
    checks: Option<Vec<CheckSpec>>,
    kpi_source_check_id: Option<String>,
    timeout_ms: Option<u64>,
}

fn check(id: &str, script: &str) -> CheckSpec {
    CheckSpec {
        id: id.to_string(),
        command: vec!["sh".to_string(), script.to_string()],
    }
}

pub fn default_checks() -> Vec<CheckSpec> {
    vec![
        check("CHECK_01_TESTS", "scripts/run-tests.sh"),
        check(DEFAULT_KPI_SOURCE_CHECK_ID, "scripts/doctor.sh"),
        check("CHECK_03_GUARD_LICENSES", "scripts/guard-licenses.sh"),
        check("CHECK_04_GUARD_SECRETS", "scripts/guard-secrets.sh"),
        check("CHECK_05_GUARD_SCHEMAS", "scripts/guard-schemas.sh"),
    ]
}

impl PipelineConfig {
    pub fn new(artifacts_root: PathBuf, waiver_registry_path: PathBuf, ledger_path: PathBuf) -> Self {
        Self {
            checks: default_checks(),
            kpi_source_check_id: DEFAULT_KPI_SOURCE_CHECK_ID.to_string(),
            artifacts_root,
            waiver_registry_path,
            ledger_path,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Applies a JSON overlay that may replace the check battery, the KPI source
    /// check and the per-check timeout.
    pub fn with_overlay_file(mut self, path: &Path) -> Result<Self> {
        let raw = fs::read(path)
            .with_context(|| format!("failed to read pipeline config {}", path.display()))?;
        let overlay: PipelineOverlay = serde_json::from_slice(&raw)
            .map_err(|err| FailReason::ConfigInvalid(format!("parse:{}", err.line())))
            .with_context(|| format!("failed to parse pipeline config {}", path.display()))?;

        if let Some(checks) = overlay.checks {
            self.checks = checks;
        }
        if let Some(kpi_source_check_id) = overlay.kpi_source_check_id {
            self.kpi_source_check_id = kpi_source_check_id;
        }
        if let Some(timeout_ms) = overlay.timeout_ms {
            self.timeout_ms = timeout_ms;
        }

        info!(
            path = %path.display(),
            checks = self.checks.len(),
            kpi_source = %self.kpi_source_check_id,
            timeout_ms = self.timeout_ms,
            "pipeline config overlay applied"
        );
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), FailReason> {
        if self.checks.is_empty() {
            return Err(FailReason::ConfigInvalid("NO_CHECKS".to_string()));
        }
        let mut seen = HashSet::new();
        for spec in &self.checks {
            if spec.id.trim().is_empty() {
                return Err(FailReason::ConfigInvalid("CHECK_ID_EMPTY".to_string()));
            }
            if !seen.insert(spec.id.as_str()) {
                return Err(FailReason::ConfigInvalid(format!(
                    "CHECK_ID_DUPLICATE:{}",
                    spec.id
                )));
            }
            if spec.command.first().map(|program| program.trim().is_empty()).unwrap_or(true) {
                return Err(FailReason::ConfigInvalid(format!(
                    "CHECK_COMMAND_EMPTY:{}",
                    spec.id
                )));
            }
        }
        if !seen.contains(self.kpi_source_check_id.as_str()) {
            return Err(FailReason::ConfigInvalid(format!(
                "KPI_SOURCE_UNKNOWN:{}",
                self.kpi_source_check_id
            )));
        }
        if self.timeout_ms == 0 {
            return Err(FailReason::ConfigInvalid("TIMEOUT_ZERO".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
