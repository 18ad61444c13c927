use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::CheckArgs;
use crate::error::FailReason;
use crate::ledger;
use crate::model::LEDGER_SCHEMA_VERSION;

pub fn run(args: CheckArgs) -> Result<bool> {
    let checked = ledger::load(&args.ledger_path).and_then(|loaded| {
        ledger::validate(&loaded, Utc::now()).map_err(FailReason::LedgerInvalid)?;
        Ok(loaded)
    });

    let mut loaded = match checked {
        Ok(loaded) => loaded,
        Err(err) => {
            warn!(path = %args.ledger_path.display(), "ledger check failed");
            println!("LEDGER_CHECK=FAIL");
            return Err(err);
        }
    };

    if args.ledger_path.exists() && loaded.schema_version != LEDGER_SCHEMA_VERSION {
        info!(
            from = loaded.schema_version,
            to = LEDGER_SCHEMA_VERSION,
            "upgrading ledger schema version"
        );
        ledger::persist(&args.ledger_path, &mut loaded)?;
    }

    println!("LEDGER_CHECK=PASS");
    println!("ENTRY_COUNT={}", loaded.entries.len());
    println!("RESULT=PASS");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::Utc;
    use serde_json::Value;

    use super::run;
    use crate::cli::CheckArgs;
    use crate::error::reason_code;
    use crate::ledger;

    fn downgrade_schema(path: &Path, tamper_owner: bool) {
        let raw = std::fs::read(path).expect("read ledger");
        let mut value: Value = serde_json::from_slice(&raw).expect("ledger json");
        value["schemaVersion"] = Value::from(1);
        if tamper_owner {
            value["entries"][0]["owner"] = Value::from("someone-else");
        }
        std::fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).expect("write ledger");
    }

    fn schema_version(path: &Path) -> u64 {
        let raw = std::fs::read(path).expect("read ledger");
        let value: Value = serde_json::from_slice(&raw).expect("ledger json");
        value["schemaVersion"].as_u64().expect("schemaVersion")
    }

    #[test]
    fn clean_schema_one_ledger_is_upgraded() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ledger_path = dir.path().join("ledger.json");
        ledger::bootstrap(&ledger_path, "abc123", "HO", Utc::now()).expect("bootstrap");
        downgrade_schema(&ledger_path, false);
        let before = ledger::load(&ledger_path).expect("load before");
        assert_eq!(before.schema_version, 1);

        let passed = run(CheckArgs {
            ledger_path: ledger_path.clone(),
        })
        .expect("check passes");
        assert!(passed);
        assert_eq!(schema_version(&ledger_path), 2);

        let after = ledger::load(&ledger_path).expect("load after");
        assert_eq!(after.entries, before.entries);
    }

    #[test]
    fn invalid_schema_one_ledger_is_left_untouched() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ledger_path = dir.path().join("ledger.json");
        ledger::bootstrap(&ledger_path, "abc123", "HO", Utc::now()).expect("bootstrap");
        downgrade_schema(&ledger_path, true);
        let raw_before = std::fs::read(&ledger_path).expect("read");

        let err = run(CheckArgs {
            ledger_path: ledger_path.clone(),
        })
        .expect_err("tampered ledger fails");
        assert_eq!(reason_code(&err), "LEDGER_INVALID:ENTRY_HASH_MISMATCH:0");
        assert_eq!(std::fs::read(&ledger_path).expect("read"), raw_before);
        assert_eq!(schema_version(&ledger_path), 1);
    }
}
