use anyhow::Result;
use chrono::Utc;

use crate::cli::RecordArgs;
use crate::ledger::{self, RecordRequest};
use crate::runner::latest_report_path;

pub fn run(args: RecordArgs) -> Result<bool> {
    let run_result_path = args
        .result_path
        .unwrap_or_else(|| latest_report_path(&args.artifacts_root));

    let request = RecordRequest {
        entry_type: args.entry_type,
        owner: args.owner,
        action: args.action,
        ho_signoff: args.ho_signoff,
        run_result_path,
        p0_id: args.p0_id,
        rule_id: args.rule_id,
        ref_entry_id: args.ref_entry_id,
        contour: args.contour,
        p0_count: args.p0_count,
        product_step: args.product_step,
        ref_report: args.ref_report,
    };

    let outcome = ledger::record(&args.ledger_path, &request, Utc::now())?;
    println!("ENTRY_ID={}", outcome.entry.entry_id);
    println!("ENTRY_TYPE={}", outcome.entry.entry_type());
    println!("ENTRY_HASH={}", outcome.entry.entry_hash);
    println!("ENTRY_COUNT={}", outcome.entry_count);
    println!("RESULT=PASS");
    Ok(true)
}
