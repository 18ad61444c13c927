mod canonical;
mod cli;
mod commands;
mod config;
mod error;
mod ledger;
mod model;
mod runner;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, classify_parse_error};
use crate::error::reason_code;

fn main() {
    init_tracing();

    let exit_code = match run() {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            error!(error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            println!("RESULT=FAIL");
            println!("FAIL_REASON={}", reason_code(&err));
            1
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<bool> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match classify_parse_error(&err) {
            Some(reason) => return Err(reason.into()),
            None => err.exit(),
        },
    };

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Bootstrap(args) => commands::bootstrap::run(args),
        Commands::Record(args) => commands::record::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
