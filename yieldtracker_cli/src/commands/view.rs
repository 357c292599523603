//! The `view` subcommand: values a ledger and prints the daily series.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use yieldtracker_lib::validation::parse_ledger_date;
use yieldtracker_lib::{value_portfolio, Config, PriceFetcher};

use super::load_ledger;
use crate::output::{print_summary, print_valuation, OutputFormat};

#[derive(Args)]
pub struct ViewArgs {
    /// Ledger CSV with columns ticker,date,price,volume,type
    pub file: PathBuf,

    /// First date of the analysis window (default: earliest ledger date)
    #[arg(long, value_parser = parse_ledger_date)]
    pub start: Option<NaiveDate>,

    /// Last date of the analysis window (default: today)
    #[arg(long, value_parser = parse_ledger_date)]
    pub end: Option<NaiveDate>,

    /// Skip fetching benchmark indices
    #[arg(long)]
    pub no_benchmarks: bool,
}

pub async fn run(args: &ViewArgs, config: &Config, format: &OutputFormat) -> Result<()> {
    let ledger = load_ledger(&args.file)?;

    let start = match args.start {
        Some(date) => date,
        None => ledger
            .first_date()
            .context("ledger has no transactions to derive a start date from")?,
    };
    let end = args
        .end
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let fetcher = PriceFetcher::new(config.build_feed()?, config.fetch_settings());
    let benchmarks = if args.no_benchmarks {
        Vec::new()
    } else {
        config.benchmarks.clone()
    };

    let result = value_portfolio(&ledger, &fetcher, &benchmarks, start, end).await?;

    for (name, reason) in &result.skipped_benchmarks {
        eprintln!("Note: benchmark {} omitted ({})", name, reason);
    }
    for warning in &result.warnings {
        eprintln!("Warning: {}", warning);
    }

    print_valuation(&result, format)?;
    if !matches!(format, OutputFormat::Json) {
        print_summary(&result);
    }
    Ok(())
}
