use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::canonical::compute_entry_hash;
use crate::error::{FailReason, LedgerViolation};
use crate::model::{
    EntryBody, EntryKpi, EntryProof, EntryType, GENERATED_BY, GENESIS_HASH, HoSignoff,
    LEDGER_SCHEMA_VERSION, Ledger, LedgerEntry, RUN_REPORT_SCHEMA_VERSION, RunReport,
    WaiverRecord,
};
use crate::util::{parse_instant, utc_string, write_json_pretty};

mod append;
mod load;
mod validate;

pub use self::append::{BootstrapOutcome, RecordOutcome, RecordRequest, bootstrap, record};
pub use self::load::{load, parse_ledger_value};
pub use self::validate::validate;

/// Writes a ledger that has already passed `validate`, stamping the current schema.
pub fn persist(path: &Path, ledger: &mut Ledger) -> Result<()> {
    ledger.schema_version = LEDGER_SCHEMA_VERSION;
    write_json_pretty(path, ledger)?;
    info!(
        path = %path.display(),
        entries = ledger.entries.len(),
        "ledger written"
    );
    Ok(())
}

/// A waiver is active while its TTL parses and has not yet passed.
pub fn waiver_is_active(waiver: &WaiverRecord, now: DateTime<Utc>) -> bool {
    parse_instant(&waiver.ttl)
        .map(|expiry| expiry >= now)
        .unwrap_or(false)
}
