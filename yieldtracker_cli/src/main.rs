mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use yieldtracker_lib::Config;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "yieldtracker")]
#[command(about = "Value a buy/sell ledger against market prices and benchmark indices")]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// TOML configuration file (feed provider, fetch limits, benchmarks)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter ledger CSV
    Template(commands::template::TemplateArgs),
    /// Validate a ledger CSV and list its transactions
    Validate(commands::validate::ValidateArgs),
    /// Fetch prices and show position value, yield and benchmarks
    View(commands::view::ViewArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("yieldtracker=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let format = cli.output.clone();

    let mut config = Config::load(cli.config.as_deref())?;
    if config.feed.tiingo_api_key.is_none() {
        config.feed.tiingo_api_key = std::env::var("TIINGO_API_KEY").ok();
    }

    match &cli.command {
        Commands::Template(args) => commands::template::run(args, &format)?,
        Commands::Validate(args) => commands::validate::run(args, &format)?,
        Commands::View(args) => commands::view::run(args, &config, &format).await?,
    }

    Ok(())
}
