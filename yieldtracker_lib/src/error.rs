//! Error types for the library layer.

use chrono::NaiveDate;
use thiserror::Error;

use crate::feed::FeedError;

/// A ledger that cannot be valued as given.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("ledger is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
    #[error("ledger contains no transactions")]
    EmptyLedger,
    #[error("{ticker} transaction on {date} is after the end of the price window ({window_end})")]
    OutsideWindow {
        ticker: String,
        date: NaiveDate,
        window_end: NaiveDate,
    },
}

impl ValidationError {
    /// Names of the missing required columns, if this is a column failure.
    pub fn missing_columns(&self) -> &[String] {
        match self {
            Self::MissingColumns(cols) => cols,
            _ => &[],
        }
    }
}

/// Top-level error for loading a ledger and valuing it.
#[derive(Error, Debug)]
pub enum ValuationError {
    #[error("Invalid ledger: {0}")]
    Validation(#[from] ValidationError),
    #[error("No price data for {ticker}: {source}")]
    Fetch {
        ticker: String,
        #[source]
        source: FeedError,
    },
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),
    #[error("Cannot align series for {ticker}: {reason}")]
    Alignment { ticker: String, reason: String },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_display_lists_names() {
        let err = ValidationError::MissingColumns(vec!["price".into(), "volume".into()]);
        assert_eq!(
            err.to_string(),
            "ledger is missing required columns: price, volume"
        );
        assert_eq!(err.missing_columns(), ["price", "volume"]);
    }

    #[test]
    fn fetch_error_names_ticker() {
        let err = ValuationError::Fetch {
            ticker: "AAPL".into(),
            source: FeedError::NoData("AAPL".into()),
        };
        assert!(err.to_string().contains("AAPL"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn validation_converts_into_valuation_error() {
        let err: ValuationError = ValidationError::EmptyLedger.into();
        assert!(matches!(err, ValuationError::Validation(ValidationError::EmptyLedger)));
    }
}
