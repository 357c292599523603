use std::collections::BTreeMap;

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use yieldtracker_lib::ledger::Ledger;
use yieldtracker_lib::{TimeSeries, ValuationResult, ValuationSummary};

#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    #[value(alias = "md")]
    Markdown,
}

#[derive(Tabled, Serialize)]
struct TransactionRow {
    #[tabled(rename = "Ticker")]
    #[serde(rename = "Ticker")]
    ticker: String,
    #[tabled(rename = "Date")]
    #[serde(rename = "Date")]
    date: String,
    #[tabled(rename = "Price")]
    #[serde(rename = "Price")]
    price: f64,
    #[tabled(rename = "Volume")]
    #[serde(rename = "Volume")]
    volume: f64,
    #[tabled(rename = "Type")]
    #[serde(rename = "Type")]
    tx_type: String,
}

fn build_transaction_rows(ledger: &Ledger) -> Vec<TransactionRow> {
    ledger
        .iter()
        .map(|tx| TransactionRow {
            ticker: tx.ticker.clone(),
            date: tx.date.to_string(),
            price: tx.price,
            volume: tx.volume,
            tx_type: tx.tx_type.to_string(),
        })
        .collect()
}

pub fn print_transactions(ledger: &Ledger, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", Table::new(build_transaction_rows(ledger))),
        OutputFormat::Markdown => {
            let mut table = Table::new(build_transaction_rows(ledger));
            table.with(Style::markdown());
            println!("{}", table);
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            for row in build_transaction_rows(ledger) {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
        }
        OutputFormat::Json => print_json(&ledger.transactions()),
    }
    Ok(())
}

/// Daily series as display strings: date, position value, yield, then one column per benchmark.
struct SeriesTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn aligned_benchmarks(result: &ValuationResult) -> Vec<(String, Option<TimeSeries>)> {
    let index = result.position_value.index();
    result
        .benchmarks
        .iter()
        .map(|b| (b.benchmark.name.clone(), b.aligned_to(index)))
        .collect()
}

fn build_series_table(result: &ValuationResult) -> SeriesTable {
    let benchmarks = aligned_benchmarks(result);

    let mut headers = vec![
        "Date".to_string(),
        "Position Value".to_string(),
        "Yield".to_string(),
    ];
    headers.extend(benchmarks.iter().map(|(name, _)| name.clone()));

    let rows = result
        .position_value
        .iter()
        .zip(result.normalized_yield.values())
        .enumerate()
        .map(|(i, ((date, value), yield_index))| {
            let mut row = vec![
                date.to_string(),
                format_amount(value),
                format_amount(*yield_index),
            ];
            row.extend(benchmarks.iter().map(|(_, series)| {
                series
                    .as_ref()
                    .map(|s| format_amount(s.values()[i]))
                    .unwrap_or_default()
            }));
            row
        })
        .collect();

    SeriesTable { headers, rows }
}

#[derive(Serialize)]
struct SeriesPoint {
    date: String,
    position_value: f64,
    #[serde(rename = "yield")]
    yield_index: f64,
    benchmarks: BTreeMap<String, f64>,
}

#[derive(Serialize)]
struct SkippedBenchmark {
    name: String,
    reason: String,
}

#[derive(Serialize)]
struct ValuationReport {
    summary: Option<ValuationSummary>,
    series: Vec<SeriesPoint>,
    skipped_benchmarks: Vec<SkippedBenchmark>,
    warnings: Vec<String>,
}

fn build_report(result: &ValuationResult) -> ValuationReport {
    let benchmarks = aligned_benchmarks(result);

    let series = result
        .position_value
        .iter()
        .zip(result.normalized_yield.values())
        .enumerate()
        .map(|(i, ((date, value), yield_index))| SeriesPoint {
            date: date.to_string(),
            position_value: round2(value),
            yield_index: round2(*yield_index),
            benchmarks: benchmarks
                .iter()
                .filter_map(|(name, series)| {
                    series.as_ref().map(|s| (name.clone(), round2(s.values()[i])))
                })
                .collect(),
        })
        .collect();

    let summary = result.summary().map(|s| ValuationSummary {
        position_value: round2(s.position_value),
        invested_capital: round2(s.invested_capital),
        yield_index: round2(s.yield_index),
        total_return_pct: round2(s.total_return_pct),
        ..s
    });

    ValuationReport {
        summary,
        series,
        skipped_benchmarks: result
            .skipped_benchmarks
            .iter()
            .map(|(name, reason)| SkippedBenchmark {
                name: name.clone(),
                reason: reason.clone(),
            })
            .collect(),
        warnings: result.warnings.clone(),
    }
}

pub fn print_valuation(result: &ValuationResult, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&build_report(result)),
        OutputFormat::Csv => {
            let table = build_series_table(result);
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            wtr.write_record(&table.headers)?;
            for row in &table.rows {
                wtr.write_record(row)?;
            }
            wtr.flush()?;
        }
        OutputFormat::Table | OutputFormat::Markdown => {
            let table = build_series_table(result);
            let mut builder = Builder::default();
            builder.push_record(table.headers);
            for row in table.rows {
                builder.push_record(row);
            }
            let mut rendered = builder.build();
            if matches!(format, OutputFormat::Markdown) {
                rendered.with(Style::markdown());
            }
            println!("{}", rendered);
        }
    }
    Ok(())
}

/// Headline figures on stderr, so stdout stays a clean table or CSV.
pub fn print_summary(result: &ValuationResult) {
    let Some(summary) = result.summary() else {
        return;
    };
    eprintln!();
    eprintln!("Period:           {} to {}", summary.first_date, summary.last_date);
    eprintln!("Invested capital: {}", format_amount(summary.invested_capital));
    eprintln!("Position value:   {}", format_amount(summary.position_value));
    eprintln!(
        "Yield index:      {} ({})",
        format_amount(summary.yield_index),
        format_return(summary.total_return_pct)
    );
    if !summary.oversold_tickers.is_empty() {
        eprintln!("Oversold:         {}", summary.oversold_tickers.join(", "));
    }
}

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

fn format_amount(value: f64) -> String {
    format!("{:.2}", value)
}

fn format_return(pct: f64) -> String {
    if pct >= 0.0 {
        format!("+{:.2}%", pct)
    } else {
        format!("{:.2}%", pct)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
