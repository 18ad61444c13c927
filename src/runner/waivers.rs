use super::*;

/// Reads the waiver registry. A missing file means no waivers; a file that is
/// present but malformed aborts the run before any check executes.
pub fn load_waiver_registry(path: &Path) -> Result<WaiverRegistry> {
    if !path.exists() {
        warn!(path = %path.display(), "waiver registry missing; no waivers apply");
        return Ok(WaiverRegistry {
            schema_version: WAIVER_REGISTRY_SCHEMA_VERSION,
            waivers: Vec::new(),
        });
    }

    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let registry: WaiverRegistry = serde_json::from_slice(&raw)
        .map_err(|_| FailReason::WaiverRegistryInvalid)
        .with_context(|| format!("failed to parse waiver registry {}", path.display()))?;

    if registry.schema_version != WAIVER_REGISTRY_SCHEMA_VERSION {
        return Err(FailReason::WaiverRegistryInvalid).with_context(|| {
            format!(
                "unsupported waiver registry schemaVersion {}",
                registry.schema_version
            )
        });
    }
    for (index, waiver) in registry.waivers.iter().enumerate() {
        if waiver.gate_id.trim().is_empty()
            || waiver.owner.trim().is_empty()
            || waiver.ttl.trim().is_empty()
        {
            return Err(FailReason::WaiverRegistryInvalid)
                .with_context(|| format!("waiver {index} lacks gateId, owner or ttl"));
        }
    }

    info!(
        path = %path.display(),
        waivers = registry.waivers.len(),
        "waiver registry loaded"
    );
    Ok(registry)
}

/// Splits the registry into waivers usable at `now` and those that are expired
/// or carry an unparseable TTL.
pub fn classify_waivers(registry: &WaiverRegistry, now: DateTime<Utc>) -> WaiverSummary {
    let mut summary = WaiverSummary::default();
    for waiver in &registry.waivers {
        if waiver_is_active(waiver, now) {
            summary.active.push(waiver.clone());
        } else {
            summary.expired_or_invalid.push(InactiveWaiver {
                gate_id: waiver.gate_id.clone(),
                ttl: waiver.ttl.clone(),
                owner: waiver.owner.clone(),
            });
        }
    }
    summary
}

pub fn find_active_waiver<'a>(summary: &'a WaiverSummary, gate_id: &str) -> Option<&'a WaiverRecord> {
    summary
        .active
        .iter()
        .find(|waiver| waiver.gate_id.trim() == gate_id)
}

/// Exit code 0 passes. A failure becomes WAIVED only with an active waiver for
/// the same gate; a pass is never waived.
pub fn apply_waiver(
    gate_id: &str,
    exit_code: i32,
    timed_out: bool,
    waivers: &WaiverSummary,
) -> (CheckStatus, Option<WaiverRecord>) {
    if exit_code == 0 && !timed_out {
        return (CheckStatus::Pass, None);
    }
    match find_active_waiver(waivers, gate_id) {
        Some(waiver) => {
            info!(check = gate_id, owner = %waiver.owner, ttl = %waiver.ttl, "failure waived");
            (CheckStatus::Waived, Some(waiver.clone()))
        }
        None => (CheckStatus::Fail, None),
    }
}
