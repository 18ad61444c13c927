use std::path::PathBuf;

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_ARTIFACTS_ROOT, DEFAULT_LEDGER_PATH, DEFAULT_WAIVERS_PATH};
use crate::error::FailReason;

#[derive(Parser, Debug)]
#[command(
    name = "release-gate",
    version,
    about = "Release gate check runner and append-only hash-chained audit ledger"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Run(RunArgs),
    Check(CheckArgs),
    Bootstrap(BootstrapArgs),
    Record(RecordArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, default_value = DEFAULT_ARTIFACTS_ROOT)]
    pub artifacts_root: PathBuf,

    #[arg(long, default_value = DEFAULT_WAIVERS_PATH)]
    pub waivers_path: PathBuf,

    #[arg(long, default_value = DEFAULT_LEDGER_PATH)]
    pub ledger_path: PathBuf,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[arg(long, default_value = DEFAULT_LEDGER_PATH)]
    pub ledger_path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct BootstrapArgs {
    #[arg(long, default_value = DEFAULT_LEDGER_PATH)]
    pub ledger_path: PathBuf,

    #[arg(long)]
    pub baseline_sha: String,

    #[arg(long)]
    pub owner: String,
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    #[arg(long, default_value = DEFAULT_LEDGER_PATH)]
    pub ledger_path: PathBuf,

    #[arg(long, default_value = DEFAULT_ARTIFACTS_ROOT)]
    pub artifacts_root: PathBuf,

    #[arg(long = "result")]
    pub result_path: Option<PathBuf>,

    #[arg(long)]
    pub owner: String,

    #[arg(long, default_value = "exit")]
    pub entry_type: String,

    #[arg(long)]
    pub action: Option<String>,

    #[arg(long)]
    pub ho_signoff: Option<String>,

    #[arg(long)]
    pub p0_id: Option<String>,

    #[arg(long)]
    pub rule_id: Option<String>,

    #[arg(long)]
    pub ref_entry_id: Option<String>,

    #[arg(long)]
    pub contour: Option<String>,

    #[arg(long, allow_negative_numbers = true)]
    pub p0_count: Option<i64>,

    #[arg(long)]
    pub product_step: Option<String>,

    #[arg(long)]
    pub ref_report: Option<String>,
}

fn context_text(err: &clap::Error, kind: ContextKind) -> String {
    match err.get(kind) {
        Some(ContextValue::String(value)) => value.clone(),
        Some(ContextValue::Strings(values)) => values.first().cloned().unwrap_or_default(),
        _ => String::new(),
    }
}

fn flag_name(raw: &str) -> String {
    raw.split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_end_matches('=')
        .to_string()
}

/// Maps a clap parse failure to its stable reason code. `None` means clap should
/// handle the error itself (help and version output).
pub fn classify_parse_error(err: &clap::Error) -> Option<FailReason> {
    let reason = match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => return None,
        ErrorKind::MissingSubcommand
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        | ErrorKind::InvalidSubcommand => FailReason::ModeRequired,
        ErrorKind::UnknownArgument => {
            FailReason::UnknownArg(flag_name(&context_text(err, ContextKind::InvalidArg)))
        }
        ErrorKind::MissingRequiredArgument => {
            FailReason::ArgRequired(flag_name(&context_text(err, ContextKind::InvalidArg)))
        }
        _ => FailReason::ArgInvalid(flag_name(&context_text(err, ContextKind::InvalidArg))),
    };
    Some(reason)
}
