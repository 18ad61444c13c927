use super::*;

/// Walks the chain in order and stops at the first violation. Pure: the result
/// depends only on `ledger` and `now` (waiver TTLs are judged against `now`).
pub fn validate(ledger: &Ledger, now: DateTime<Utc>) -> Result<(), LedgerViolation> {
    if !ledger.append_only {
        return Err(LedgerViolation::AppendOnlyRequired);
    }
    if ledger.schema_version == 0 || ledger.schema_version > LEDGER_SCHEMA_VERSION {
        return Err(LedgerViolation::SchemaUnsupported(ledger.schema_version));
    }

    let mut positions = HashMap::<&str, usize>::with_capacity(ledger.entries.len());
    let mut expected_prev_hash = GENESIS_HASH;

    for (index, entry) in ledger.entries.iter().enumerate() {
        let entry_id = entry.entry_id.trim();
        if entry_id.is_empty() {
            return Err(LedgerViolation::EntryIdMissing { index });
        }
        if positions.insert(entry_id, index).is_some() {
            return Err(LedgerViolation::EntryIdDuplicate {
                entry_id: entry_id.to_string(),
                index,
            });
        }

        if entry.prev_hash != expected_prev_hash {
            return Err(LedgerViolation::PrevHashMismatch { index });
        }
        if compute_entry_hash(entry) != entry.entry_hash {
            return Err(LedgerViolation::EntryHashMismatch { index });
        }

        validate_body(ledger, entry, index, &positions)?;
        validate_waivers(&entry.waivers, index, now)?;

        expected_prev_hash = entry.entry_hash.as_str();
    }

    Ok(())
}

fn validate_body(
    ledger: &Ledger,
    entry: &LedgerEntry,
    index: usize,
    positions: &HashMap<&str, usize>,
) -> Result<(), LedgerViolation> {
    match &entry.body {
        EntryBody::Exit { p0_id, rule_id } => {
            if p0_id.trim().is_empty() || rule_id.trim().is_empty() {
                return Err(LedgerViolation::ExitRequiresP0AndRule { index });
            }
        }
        EntryBody::Signoff { ref_entry_id } => {
            let ref_entry_id = ref_entry_id.trim();
            if ref_entry_id.is_empty() {
                return Err(LedgerViolation::SignoffRequiresRef { index });
            }
            match positions.get(ref_entry_id) {
                Some(position) if *position < index => {}
                Some(_) => {
                    return Err(LedgerViolation::SignoffRefNotEarlier {
                        ref_entry_id: ref_entry_id.to_string(),
                        index,
                    });
                }
                None if ledger.contains_entry(ref_entry_id) => {
                    return Err(LedgerViolation::SignoffRefNotEarlier {
                        ref_entry_id: ref_entry_id.to_string(),
                        index,
                    });
                }
                None => {
                    return Err(LedgerViolation::SignoffRefMissing {
                        ref_entry_id: ref_entry_id.to_string(),
                        index,
                    });
                }
            }
            if entry.ho_signoff != HoSignoff::Approved {
                return Err(LedgerViolation::SignoffNotApproved { index });
            }
        }
        EntryBody::Close {
            contour,
            product_step,
            ref_report,
            ..
        } => {
            if contour.trim().is_empty() {
                return Err(LedgerViolation::CloseRequires {
                    field: "CONTOUR",
                    index,
                });
            }
            if product_step.trim().is_empty() {
                return Err(LedgerViolation::CloseRequires {
                    field: "PRODUCT_STEP",
                    index,
                });
            }
            if ref_report.trim().is_empty() {
                return Err(LedgerViolation::CloseRequires {
                    field: "REF_REPORT",
                    index,
                });
            }
        }
        EntryBody::Baseline | EntryBody::Rollback | EntryBody::Waiver => {}
    }
    Ok(())
}

fn validate_waivers(
    waivers: &[WaiverRecord],
    index: usize,
    now: DateTime<Utc>,
) -> Result<(), LedgerViolation> {
    for waiver in waivers {
        if waiver.gate_id.trim().is_empty() {
            return Err(LedgerViolation::WaiverInvalid {
                field: "gateId",
                index,
            });
        }
        if waiver.owner.trim().is_empty() {
            return Err(LedgerViolation::WaiverInvalid {
                field: "owner",
                index,
            });
        }
        let Some(expiry) = parse_instant(&waiver.ttl) else {
            return Err(LedgerViolation::WaiverInvalid {
                field: "ttl",
                index,
            });
        };
        if expiry < now {
            return Err(LedgerViolation::WaiverTtlExpired {
                gate_id: waiver.gate_id.clone(),
                index,
            });
        }
    }
    Ok(())
}
