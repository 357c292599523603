//! The `template` subcommand: writes the starter ledger.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use yieldtracker_lib::ledger::{template_ledger, write_ledger_csv};

use crate::output::{print_transactions, OutputFormat};

#[derive(Args)]
pub struct TemplateArgs {
    /// Write the ledger CSV to this file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run(args: &TemplateArgs, format: &OutputFormat) -> Result<()> {
    let ledger = template_ledger();

    match &args.out {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            write_ledger_csv(file, &ledger)?;
            eprintln!(
                "Wrote {} template transactions to {}",
                ledger.len(),
                path.display()
            );
        }
        // A template on stdout is meant to be redirected into a file, so it is always CSV
        None if matches!(format, OutputFormat::Table) => {
            write_ledger_csv(std::io::stdout(), &ledger)?;
        }
        None => print_transactions(&ledger, format)?,
    }
    Ok(())
}
