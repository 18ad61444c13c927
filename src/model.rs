use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const LEDGER_SCHEMA_VERSION: u32 = 2;
pub const RUN_REPORT_SCHEMA_VERSION: u32 = 1;
pub const WAIVER_REGISTRY_SCHEMA_VERSION: u32 = 1;
pub const GENESIS_HASH: &str = "GENESIS";
pub const GENERATED_BY: &str = "release-gate/ledger-v2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub id: String,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Fail,
    Waived,
}

impl CheckStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Waived => "WAIVED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    pub id: String,
    pub command: Vec<String>,
    pub exit_code: i32,
    pub status: CheckStatus,
    pub started_at: String,
    pub duration_ms: u64,
    pub timed_out: bool,
    pub stdout_path: String,
    pub stderr_path: String,
    pub waiver: Option<WaiverRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaiverRecord {
    #[serde(default)]
    pub gate_id: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub ttl: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaiverRegistry {
    pub schema_version: u32,
    #[serde(default)]
    pub waivers: Vec<WaiverRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InactiveWaiver {
    pub gate_id: String,
    pub ttl: String,
    pub owner: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaiverSummary {
    pub active: Vec<WaiverRecord>,
    pub expired_or_invalid: Vec<InactiveWaiver>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunKpi {
    pub doctor_ok: i64,
    pub target_set: String,
    pub baseline_sha: String,
    pub ledger_baseline_sha: String,
    pub baseline_match: i64,
    pub toolchain_version: String,
    pub target_warnings: i64,
    pub target_warning_delta: i64,
    pub target_warning_delta_present: i64,
    pub p0_open: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunResult {
    Pass,
    Fail,
}

impl RunResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub result: RunResult,
    pub failed_checks: Vec<String>,
    #[serde(default)]
    pub waived_checks: Vec<String>,
    #[serde(default)]
    pub timed_out_checks: Vec<String>,
    #[serde(default)]
    pub gate_failures: Vec<String>,
    #[serde(default)]
    pub doctor_ok: i64,
    #[serde(default)]
    pub target_set: String,
    #[serde(default)]
    pub baseline_match: i64,
    #[serde(default)]
    pub toolchain_version: String,
    #[serde(default)]
    pub target_warning_delta: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub schema_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub checks: Vec<CheckOutcome>,
    pub kpi: RunKpi,
    pub waivers: WaiverSummary,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoSignoff {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "APPROVED")]
    Approved,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl HoSignoff {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::NotApplicable => "N/A",
        }
    }
}

impl FromStr for HoSignoff {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "N/A" => Ok(Self::NotApplicable),
            other => Err(format!("unsupported hoSignoff value: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Baseline,
    Exit,
    Rollback,
    Waiver,
    Signoff,
    Close,
}

impl EntryType {
    pub const ALL: [EntryType; 6] = [
        Self::Baseline,
        Self::Exit,
        Self::Rollback,
        Self::Waiver,
        Self::Signoff,
        Self::Close,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Exit => "exit",
            Self::Rollback => "rollback",
            Self::Waiver => "waiver",
            Self::Signoff => "signoff",
            Self::Close => "close",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == value.trim())
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields that only exist for some entry types. The `entryType` tag lives here so
/// a `close` entry cannot be built without its close fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entryType", rename_all = "lowercase")]
pub enum EntryBody {
    Baseline,
    #[serde(rename_all = "camelCase")]
    Exit { p0_id: String, rule_id: String },
    Rollback,
    Waiver,
    #[serde(rename_all = "camelCase")]
    Signoff { ref_entry_id: String },
    #[serde(rename_all = "camelCase")]
    Close {
        contour: String,
        p0_count: u64,
        product_step: String,
        ref_report: String,
    },
}

impl EntryBody {
    pub fn entry_type(&self) -> EntryType {
        match self {
            Self::Baseline => EntryType::Baseline,
            Self::Exit { .. } => EntryType::Exit,
            Self::Rollback => EntryType::Rollback,
            Self::Waiver => EntryType::Waiver,
            Self::Signoff { .. } => EntryType::Signoff,
            Self::Close { .. } => EntryType::Close,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryKpi {
    pub doctor_ok: i64,
    pub p0_open: i64,
    pub target_warnings: i64,
    pub target_warning_delta: i64,
}

impl From<&RunKpi> for EntryKpi {
    fn from(kpi: &RunKpi) -> Self {
        Self {
            doctor_ok: kpi.doctor_ok,
            p0_open: kpi.p0_open,
            target_warnings: kpi.target_warnings,
            target_warning_delta: kpi.target_warning_delta,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryProof {
    pub run_result_path: String,
    pub run_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    #[serde(default)]
    pub entry_id: String,
    #[serde(flatten)]
    pub body: EntryBody,
    pub timestamp: String,
    pub action: String,
    pub baseline_sha: String,
    pub owner: String,
    pub ho_signoff: HoSignoff,
    pub kpi: EntryKpi,
    pub waivers: Vec<WaiverRecord>,
    pub proof: EntryProof,
    pub prev_hash: String,
    pub entry_hash: String,
    pub generated_by: String,
}

impl LedgerEntry {
    pub fn entry_type(&self) -> EntryType {
        self.body.entry_type()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    pub schema_version: u32,
    pub append_only: bool,
    pub entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn empty() -> Self {
        Self {
            schema_version: LEDGER_SCHEMA_VERSION,
            append_only: true,
            entries: Vec::new(),
        }
    }

    pub fn first_baseline_sha(&self) -> Option<&str> {
        self.entries.first().map(|entry| entry.baseline_sha.as_str())
    }

    pub fn contains_entry(&self, entry_id: &str) -> bool {
        self.entries.iter().any(|entry| entry.entry_id.trim() == entry_id)
    }
}
