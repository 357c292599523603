//! Transaction ledger model and its CSV codec.
//!
//! A ledger is the ordered list of buy/sell transactions the valuation engine
//! consumes. CSV files use the columns `ticker,date,price,volume,type`; extra
//! columns are tolerated on read and never written.

use std::collections::BTreeSet;
use std::fmt;
use std::io::{Read, Write};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValuationError};
use crate::validation;

/// Direction of a transaction. Parsed case-sensitively from `Buy` / `Sell`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxType {
    Buy,
    Sell,
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "Buy"),
            Self::Sell => write!(f, "Sell"),
        }
    }
}

/// A single ledger row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub ticker: String,
    pub date: NaiveDate,
    /// Execution price per unit.
    pub price: f64,
    /// Quantity traded.
    pub volume: f64,
    #[serde(rename = "type")]
    pub tx_type: TxType,
}

impl Transaction {
    pub fn new(ticker: &str, date: NaiveDate, price: f64, volume: f64, tx_type: TxType) -> Self {
        Self {
            ticker: ticker.to_string(),
            date,
            price,
            volume,
            tx_type,
        }
    }

    /// Capital exchanged at execution (`price * volume`).
    pub fn notional(&self) -> f64 {
        self.price * self.volume
    }

    pub fn is_buy(&self) -> bool {
        self.tx_type == TxType::Buy
    }
}

/// A CSV row before validation. Every field is kept as text so the validator
/// can report which value was wrong instead of a generic deserialization error.
#[derive(Debug, Deserialize)]
pub(crate) struct RawTransaction {
    pub ticker: String,
    pub date: String,
    pub price: String,
    pub volume: String,
    #[serde(rename = "type")]
    pub tx_type: String,
}

/// Ordered sequence of transactions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    transactions: Vec<Transaction>,
}

impl Ledger {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    /// Buy transactions in ledger order.
    pub fn buys(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|t| t.is_buy())
    }

    pub fn has_sells(&self) -> bool {
        self.transactions.iter().any(|t| !t.is_buy())
    }

    /// Unique tickers, sorted.
    pub fn tickers(&self) -> Vec<String> {
        self.transactions
            .iter()
            .map(|t| t.ticker.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Earliest transaction date.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.transactions.iter().map(|t| t.date).min()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Read and validate a ledger from CSV.
///
/// The header row is checked for the required columns before any row is
/// parsed; each row is then validated and converted into a [`Transaction`].
pub fn read_ledger_csv<R: Read>(reader: R) -> Result<Ledger, ValuationError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    validation::validate_columns(headers.iter())?;

    let mut transactions = Vec::new();
    for (idx, record) in rdr.deserialize::<RawTransaction>().enumerate() {
        let row = idx + 1;
        let raw = record.map_err(|e| ValidationError::InvalidRow {
            row,
            reason: e.to_string(),
        })?;
        transactions.push(validation::validate_row(row, &raw)?);
    }

    if transactions.is_empty() {
        return Err(ValidationError::EmptyLedger.into());
    }

    Ok(Ledger::new(transactions))
}

/// Write a ledger as CSV with exactly the five ledger columns and no index column.
pub fn write_ledger_csv<W: Write>(writer: W, ledger: &Ledger) -> Result<(), ValuationError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for tx in ledger.iter() {
        wtr.serialize(tx)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Starter ledger offered when building a file from scratch.
pub fn template_ledger() -> Ledger {
    Ledger::new(vec![
        Transaction::new(
            "ASML.AS",
            NaiveDate::from_ymd_opt(2021, 1, 15).unwrap_or_default(),
            10.5,
            10.0,
            TxType::Buy,
        ),
        Transaction::new(
            "AAPL",
            NaiveDate::from_ymd_opt(2021, 3, 10).unwrap_or_default(),
            11.2,
            5.0,
            TxType::Sell,
        ),
    ])
}
