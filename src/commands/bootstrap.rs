use anyhow::Result;
use chrono::Utc;

use crate::cli::BootstrapArgs;
use crate::ledger::{self, BootstrapOutcome};

pub fn run(args: BootstrapArgs) -> Result<bool> {
    match ledger::bootstrap(&args.ledger_path, &args.baseline_sha, &args.owner, Utc::now())? {
        BootstrapOutcome::Created { entry } => {
            println!("BOOTSTRAP=PASS");
            println!("ENTRY_ID={}", entry.entry_id);
            println!("ENTRY_HASH={}", entry.entry_hash);
            println!("ENTRY_COUNT=1");
        }
        BootstrapOutcome::Skipped { entry_count } => {
            println!("BOOTSTRAP=SKIP");
            println!("ENTRY_COUNT={entry_count}");
        }
    }
    println!("RESULT=PASS");
    Ok(true)
}
