//! CLI subcommand implementations.

pub mod template;
pub mod validate;
pub mod view;

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use yieldtracker_lib::ledger::{read_ledger_csv, Ledger};

/// Open and validate a ledger file.
pub fn load_ledger(path: &Path) -> Result<Ledger> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let ledger = read_ledger_csv(file)?;
    Ok(ledger)
}
