use super::*;

#[derive(Debug, Clone, Default)]
pub struct RecordRequest {
    pub entry_type: String,
    pub owner: String,
    pub action: Option<String>,
    pub ho_signoff: Option<String>,
    pub run_result_path: PathBuf,
    pub p0_id: Option<String>,
    pub rule_id: Option<String>,
    pub ref_entry_id: Option<String>,
    pub contour: Option<String>,
    pub p0_count: Option<i64>,
    pub product_step: Option<String>,
    pub ref_report: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub entry: LedgerEntry,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub enum BootstrapOutcome {
    Created { entry: LedgerEntry },
    Skipped { entry_count: usize },
}

/// Creates the ledger with its genesis `baseline` entry. An existing non-empty
/// ledger is validated in place and left untouched.
pub fn bootstrap(
    path: &Path,
    baseline_sha: &str,
    owner: &str,
    now: DateTime<Utc>,
) -> Result<BootstrapOutcome> {
    let baseline_sha = baseline_sha.trim();
    let owner = owner.trim();
    if baseline_sha.is_empty() {
        return Err(FailReason::ArgRequired("--baseline-sha".to_string()).into());
    }
    if owner.is_empty() {
        return Err(FailReason::ArgRequired("--owner".to_string()).into());
    }

    let mut ledger = load(path)?;
    validate(&ledger, now).map_err(FailReason::LedgerInvalid)?;
    if !ledger.entries.is_empty() {
        info!(
            path = %path.display(),
            entries = ledger.entries.len(),
            "ledger already bootstrapped; skipping"
        );
        return Ok(BootstrapOutcome::Skipped {
            entry_count: ledger.entries.len(),
        });
    }

    let entry = LedgerEntry {
        entry_id: String::new(),
        body: EntryBody::Baseline,
        timestamp: utc_string(now),
        action: "bootstrap".to_string(),
        baseline_sha: baseline_sha.to_string(),
        owner: owner.to_string(),
        ho_signoff: HoSignoff::NotApplicable,
        kpi: EntryKpi::default(),
        waivers: Vec::new(),
        proof: EntryProof::default(),
        prev_hash: String::new(),
        entry_hash: String::new(),
        generated_by: GENERATED_BY.to_string(),
    };

    let entry = seal_and_push(&mut ledger, entry);
    validate(&ledger, now).map_err(FailReason::LedgerInvalidAfterRecord)?;
    persist(path, &mut ledger)?;
    info!(entry_id = %entry.entry_id, baseline_sha, "ledger bootstrapped");

    Ok(BootstrapOutcome::Created { entry })
}

/// Appends one entry derived from a run report. The on-disk chain is validated
/// before the append and the extended chain again before it is written.
pub fn record(path: &Path, request: &RecordRequest, now: DateTime<Utc>) -> Result<RecordOutcome> {
    let entry_type = EntryType::parse(&request.entry_type).ok_or(FailReason::EntryTypeInvalid)?;
    let owner = request.owner.trim();
    if owner.is_empty() {
        return Err(FailReason::ArgRequired("--owner".to_string()).into());
    }
    let explicit_signoff = match request.ho_signoff.as_deref() {
        Some(value) => Some(
            value
                .parse::<HoSignoff>()
                .map_err(|_| FailReason::HoSignoffInvalid)?,
        ),
        None => None,
    };
    let body = build_body(entry_type, request)?;

    let report = load_run_report(&request.run_result_path)?;

    let mut ledger = load(path)?;
    validate(&ledger, now).map_err(FailReason::LedgerInvalid)?;

    let baseline_sha = ledger
        .first_baseline_sha()
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| report.kpi.baseline_sha.clone());

    let entry = LedgerEntry {
        entry_id: String::new(),
        body,
        timestamp: utc_string(now),
        action: request
            .action
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(entry_type.as_str())
            .to_string(),
        baseline_sha,
        owner: owner.to_string(),
        ho_signoff: resolve_ho_signoff(entry_type, explicit_signoff),
        kpi: EntryKpi::from(&report.kpi),
        waivers: report.waivers.active.clone(),
        proof: EntryProof {
            run_result_path: request.run_result_path.display().to_string(),
            run_status: report.summary.result.as_str().to_string(),
        },
        prev_hash: String::new(),
        entry_hash: String::new(),
        generated_by: GENERATED_BY.to_string(),
    };

    let entry = seal_and_push(&mut ledger, entry);
    if let Err(violation) = validate(&ledger, now) {
        warn!(entry_id = %entry.entry_id, reason = %violation, "appended ledger failed validation; not written");
        return Err(FailReason::LedgerInvalidAfterRecord(violation).into());
    }
    persist(path, &mut ledger)?;

    info!(
        entry_id = %entry.entry_id,
        entry_type = %entry.entry_type(),
        entry_hash = %entry.entry_hash,
        "ledger entry recorded"
    );

    Ok(RecordOutcome {
        entry_count: ledger.entries.len(),
        entry,
    })
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn build_body(entry_type: EntryType, request: &RecordRequest) -> Result<EntryBody, FailReason> {
    let body = match entry_type {
        EntryType::Baseline => EntryBody::Baseline,
        EntryType::Rollback => EntryBody::Rollback,
        EntryType::Waiver => EntryBody::Waiver,
        EntryType::Exit => {
            match (
                non_empty(request.p0_id.as_ref()),
                non_empty(request.rule_id.as_ref()),
            ) {
                (Some(p0_id), Some(rule_id)) => EntryBody::Exit { p0_id, rule_id },
                _ => return Err(FailReason::ExitRequiresP0AndRule),
            }
        }
        EntryType::Signoff => EntryBody::Signoff {
            ref_entry_id: non_empty(request.ref_entry_id.as_ref())
                .ok_or(FailReason::SignoffRequiresRef)?,
        },
        EntryType::Close => {
            let contour =
                non_empty(request.contour.as_ref()).ok_or(FailReason::CloseRequires("CONTOUR"))?;
            let p0_count = request
                .p0_count
                .and_then(|count| u64::try_from(count).ok())
                .ok_or(FailReason::CloseRequires("P0_COUNT"))?;
            let product_step = non_empty(request.product_step.as_ref())
                .ok_or(FailReason::CloseRequires("PRODUCT_STEP"))?;
            let ref_report = non_empty(request.ref_report.as_ref())
                .ok_or(FailReason::CloseRequires("REF_REPORT"))?;
            EntryBody::Close {
                contour,
                p0_count,
                product_step,
                ref_report,
            }
        }
    };
    Ok(body)
}

fn resolve_ho_signoff(entry_type: EntryType, explicit: Option<HoSignoff>) -> HoSignoff {
    match entry_type {
        EntryType::Signoff => HoSignoff::Approved,
        EntryType::Exit | EntryType::Close => match explicit {
            Some(HoSignoff::Approved) => HoSignoff::Approved,
            _ => HoSignoff::Pending,
        },
        EntryType::Baseline | EntryType::Rollback | EntryType::Waiver => {
            explicit.unwrap_or(HoSignoff::NotApplicable)
        }
    }
}

fn load_run_report(path: &Path) -> Result<RunReport> {
    if !path.is_file() {
        warn!(path = %path.display(), "run report missing");
        return Err(FailReason::RunResultMissing.into());
    }
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let report: RunReport = serde_json::from_slice(&raw)
        .map_err(|_| FailReason::RunResultInvalid)
        .with_context(|| format!("failed to parse run report {}", path.display()))?;
    if report.schema_version != RUN_REPORT_SCHEMA_VERSION {
        return Err(FailReason::RunResultInvalid).with_context(|| {
            format!(
                "unsupported run report schemaVersion {} in {}",
                report.schema_version,
                path.display()
            )
        });
    }
    Ok(report)
}

fn next_entry_id(ledger: &Ledger) -> String {
    let next = ledger
        .entries
        .iter()
        .filter_map(|entry| entry.entry_id.strip_prefix("entry-"))
        .filter_map(|suffix| suffix.parse::<u64>().ok())
        .max()
        .unwrap_or(0)
        + 1;
    format!("entry-{next:04}")
}

/// Links `entry` to the current chain tail, assigns its id and hash, and appends it.
fn seal_and_push(ledger: &mut Ledger, mut entry: LedgerEntry) -> LedgerEntry {
    entry.entry_id = next_entry_id(ledger);
    entry.prev_hash = ledger
        .entries
        .last()
        .map(|last| last.entry_hash.clone())
        .unwrap_or_else(|| GENESIS_HASH.to_string());
    entry.entry_hash = compute_entry_hash(&entry);
    ledger.entries.push(entry.clone());
    entry
}
