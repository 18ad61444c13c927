use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use crate::model::{EntryBody, LedgerEntry};

/// Encodes a JSON value with object keys sorted lexicographically, no insignificant
/// whitespace, and integers in plain decimal. Hashes over this form are independent
/// of the order serde happens to emit struct fields in.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                out.push_str(&int.to_string());
            } else if let Some(uint) = number.as_u64() {
                out.push_str(&uint.to_string());
            } else {
                out.push_str(&number.to_string());
            }
        }
        Value::String(text) => write_string(text, out),
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys = map.keys().collect::<Vec<&String>>();
            keys.sort();
            out.push('{');
            for (idx, key) in keys.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
    }
}

fn write_string(text: &str, out: &mut String) {
    out.push_str(&Value::from(text).to_string());
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// The hashed subset of an entry: everything except `entryHash`. Exit and signoff
/// reference fields are always present (empty when not applicable); close fields
/// only appear for `close` entries.
pub fn entry_hash_payload(entry: &LedgerEntry) -> Value {
    let (p0_id, rule_id, ref_entry_id) = match &entry.body {
        EntryBody::Exit { p0_id, rule_id } => (p0_id.as_str(), rule_id.as_str(), ""),
        EntryBody::Signoff { ref_entry_id } => ("", "", ref_entry_id.as_str()),
        _ => ("", "", ""),
    };

    let waivers = entry
        .waivers
        .iter()
        .map(|waiver| {
            json!({
                "gateId": waiver.gate_id,
                "reason": waiver.reason,
                "owner": waiver.owner,
                "ttl": waiver.ttl,
            })
        })
        .collect::<Vec<Value>>();

    let mut payload = Map::new();
    payload.insert("entryId".to_string(), json!(entry.entry_id));
    payload.insert("entryType".to_string(), json!(entry.entry_type().as_str()));
    payload.insert("timestamp".to_string(), json!(entry.timestamp));
    payload.insert("action".to_string(), json!(entry.action));
    payload.insert("baselineSha".to_string(), json!(entry.baseline_sha));
    payload.insert("owner".to_string(), json!(entry.owner));
    payload.insert("hoSignoff".to_string(), json!(entry.ho_signoff.as_str()));
    payload.insert("p0Id".to_string(), json!(p0_id));
    payload.insert("ruleId".to_string(), json!(rule_id));
    payload.insert("refEntryId".to_string(), json!(ref_entry_id));
    payload.insert(
        "kpi".to_string(),
        json!({
            "doctorOk": entry.kpi.doctor_ok,
            "p0Open": entry.kpi.p0_open,
            "targetWarnings": entry.kpi.target_warnings,
            "targetWarningDelta": entry.kpi.target_warning_delta,
        }),
    );
    payload.insert("waivers".to_string(), Value::Array(waivers));
    payload.insert(
        "proof".to_string(),
        json!({
            "runResultPath": entry.proof.run_result_path,
            "runStatus": entry.proof.run_status,
        }),
    );
    payload.insert("prevHash".to_string(), json!(entry.prev_hash));
    payload.insert("generatedBy".to_string(), json!(entry.generated_by));

    if let EntryBody::Close {
        contour,
        p0_count,
        product_step,
        ref_report,
    } = &entry.body
    {
        payload.insert("contour".to_string(), json!(contour));
        payload.insert("p0Count".to_string(), json!(p0_count));
        payload.insert("productStep".to_string(), json!(product_step));
        payload.insert("refReport".to_string(), json!(ref_report));
    }

    Value::Object(payload)
}

pub fn compute_entry_hash(entry: &LedgerEntry) -> String {
    sha256_hex(canonical_json(&entry_hash_payload(entry)).as_bytes())
}
