use super::*;

/// Reads the ledger file, or synthesizes an empty ledger when none exists yet.
/// Legacy entries are normalized in memory only; nothing is written back.
pub fn load(path: &Path) -> Result<Ledger> {
    if !path.exists() {
        info!(path = %path.display(), "ledger missing; starting from empty ledger");
        return Ok(Ledger::empty());
    }

    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_slice(&raw)
        .map_err(|_| FailReason::LedgerJsonInvalid)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let ledger = parse_ledger_value(value)
        .with_context(|| format!("failed to load ledger {}", path.display()))?;
    info!(
        path = %path.display(),
        schema_version = ledger.schema_version,
        entries = ledger.entries.len(),
        "ledger loaded"
    );
    Ok(ledger)
}

pub fn parse_ledger_value(value: Value) -> Result<Ledger, FailReason> {
    let Value::Object(mut root) = value else {
        return Err(FailReason::LedgerJsonInvalid);
    };

    let schema_version = match root.get("schemaVersion") {
        None | Some(Value::Null) => 1,
        Some(Value::Number(number)) => number
            .as_u64()
            .and_then(|version| u32::try_from(version).ok())
            .ok_or(FailReason::LedgerJsonInvalid)?,
        Some(_) => return Err(FailReason::LedgerJsonInvalid),
    };
    if schema_version == 0 || schema_version > LEDGER_SCHEMA_VERSION {
        return Err(FailReason::LedgerInvalid(
            LedgerViolation::SchemaUnsupported(schema_version),
        ));
    }

    let append_only = match root.get("appendOnly") {
        None | Some(Value::Null) => true,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return Err(FailReason::LedgerJsonInvalid),
    };

    let raw_entries = match root.remove("entries") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(FailReason::LedgerJsonInvalid),
    };

    let mut entries = Vec::with_capacity(raw_entries.len());
    for (index, raw_entry) in raw_entries.into_iter().enumerate() {
        let normalized = normalize_entry(raw_entry, index).map_err(FailReason::LedgerInvalid)?;
        let entry: LedgerEntry = serde_json::from_value(normalized).map_err(|err| {
            warn!(index, error = %err, "ledger entry does not match any entry shape");
            FailReason::LedgerInvalid(LedgerViolation::EntryShapeInvalid { index })
        })?;
        entries.push(entry);
    }

    Ok(Ledger {
        schema_version,
        append_only,
        entries,
    })
}

fn infer_entry_type(action: &str) -> Option<EntryType> {
    match action.trim().to_ascii_lowercase().as_str() {
        "bootstrap" | "baseline" => Some(EntryType::Baseline),
        "record" | "exit" => Some(EntryType::Exit),
        "rollback" => Some(EntryType::Rollback),
        "waiver" | "waive" => Some(EntryType::Waiver),
        "signoff" | "ho-signoff" => Some(EntryType::Signoff),
        "close" => Some(EntryType::Close),
        _ => None,
    }
}

fn default_ho_signoff(entry_type: EntryType) -> HoSignoff {
    match entry_type {
        EntryType::Signoff => HoSignoff::Approved,
        EntryType::Exit | EntryType::Close => HoSignoff::Pending,
        _ => HoSignoff::NotApplicable,
    }
}

fn is_absent(entry: &Map<String, Value>, key: &str) -> bool {
    entry.get(key).map(Value::is_null).unwrap_or(true)
}

fn normalize_entry(raw: Value, index: usize) -> Result<Value, LedgerViolation> {
    let Value::Object(mut entry) = raw else {
        return Err(LedgerViolation::EntryShapeInvalid { index });
    };

    let entry_type = match entry.get("entryType") {
        Some(Value::String(value)) => EntryType::parse(value),
        None | Some(Value::Null) => entry
            .get("action")
            .and_then(Value::as_str)
            .and_then(infer_entry_type),
        Some(_) => None,
    }
    .ok_or(LedgerViolation::EntryTypeInvalid { index })?;
    entry.insert("entryType".to_string(), json!(entry_type.as_str()));

    let legacy_approval = entry.remove("hoApproved");
    if is_absent(&entry, "hoSignoff") {
        let ho_signoff = match legacy_approval {
            Some(Value::Bool(true)) => HoSignoff::Approved,
            Some(Value::Bool(false)) => HoSignoff::Pending,
            _ => default_ho_signoff(entry_type),
        };
        entry.insert("hoSignoff".to_string(), json!(ho_signoff.as_str()));
    }

    if is_absent(&entry, "kpi") {
        entry.insert("kpi".to_string(), json!({}));
    }
    if is_absent(&entry, "waivers") {
        entry.insert("waivers".to_string(), json!([]));
    }
    if is_absent(&entry, "proof") {
        entry.insert("proof".to_string(), json!({}));
    }
    if is_absent(&entry, "generatedBy") {
        entry.insert("generatedBy".to_string(), json!(GENERATED_BY));
    }

    Ok(Value::Object(entry))
}
