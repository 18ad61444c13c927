use anyhow::Result;
use tracing::info;

use crate::cli::RunArgs;
use crate::config::PipelineConfig;
use crate::runner::{ProcessCommandRunner, run_pipeline, summary_lines};

pub fn run(args: RunArgs) -> Result<bool> {
    let mut config = PipelineConfig::new(args.artifacts_root, args.waivers_path, args.ledger_path);
    if let Some(path) = args.config.as_deref() {
        config = config.with_overlay_file(path)?;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }

    let outcome = run_pipeline(&config, &ProcessCommandRunner)?;
    for line in summary_lines(&outcome.report, &outcome.persisted) {
        println!("{line}");
    }

    info!(
        run_id = %outcome.report.run_id,
        pass = outcome.is_pass(),
        "run command completed"
    );
    Ok(outcome.is_pass())
}
