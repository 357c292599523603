//! The `validate` subcommand: checks a ledger and optionally re-exports it.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use yieldtracker_lib::ledger::write_ledger_csv;

use super::load_ledger;
use crate::output::{print_transactions, OutputFormat};

#[derive(Args)]
pub struct ValidateArgs {
    /// Ledger CSV with columns ticker,date,price,volume,type
    pub file: PathBuf,

    /// Re-export the validated ledger (five columns, no index) to this file
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run(args: &ValidateArgs, format: &OutputFormat) -> Result<()> {
    let ledger = load_ledger(&args.file)?;

    eprintln!(
        "{}: {} transactions across {} tickers",
        args.file.display(),
        ledger.len(),
        ledger.tickers().len()
    );
    print_transactions(&ledger, format)?;

    if let Some(path) = &args.out {
        let file =
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
        write_ledger_csv(file, &ledger)?;
        eprintln!("Exported validated ledger to {}", path.display());
    }
    Ok(())
}
