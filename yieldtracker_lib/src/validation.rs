//! Ledger validation: required columns, row soundness, and price-window bounds.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::error::ValidationError;
use crate::ledger::{Ledger, RawTransaction, Transaction, TxType};

/// Columns every ledger must carry, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 5] = ["ticker", "date", "price", "volume", "type"];

pub const MAX_TICKER_LENGTH: usize = 20;

fn ticker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Yahoo-style symbols: AAPL, ASML.AS, BRK-B, ^GSPC, EURUSD=X
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9^][A-Za-z0-9.\-=^]*$").expect("valid regex"))
}

/// Check that every required column is present. Extra columns are allowed.
///
/// The error names all missing columns in canonical order.
pub fn validate_columns<'a, I>(headers: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: Vec<&str> = headers.into_iter().map(str::trim).collect();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !present.contains(*col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingColumns(missing))
    }
}

/// Validate a ticker symbol: trimmed, non-empty, bounded length, symbol characters only.
pub fn validate_ticker(input: &str) -> Result<String, String> {
    let ticker = input.trim();
    if ticker.is_empty() {
        return Err("ticker is empty".to_string());
    }
    if ticker.len() > MAX_TICKER_LENGTH {
        return Err(format!(
            "ticker '{}' exceeds {} characters",
            ticker, MAX_TICKER_LENGTH
        ));
    }
    if !ticker_pattern().is_match(ticker) {
        return Err(format!("ticker '{}' contains invalid characters", ticker));
    }
    Ok(ticker.to_string())
}

/// Parse a ledger date. Accepts `YYYY-MM-DD`, a naive `YYYY-MM-DD HH:MM:SS`
/// timestamp, or an RFC 3339 timestamp whose offset is dropped.
pub fn parse_ledger_date(input: &str) -> Result<NaiveDate, String> {
    let s = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local().date());
    }
    Err(format!("invalid date '{}', expected YYYY-MM-DD", s))
}

/// Parse a transaction type. Case-sensitive: only `Buy` and `Sell` are accepted.
pub fn parse_tx_type(input: &str) -> Result<TxType, String> {
    match input.trim() {
        "Buy" => Ok(TxType::Buy),
        "Sell" => Ok(TxType::Sell),
        other => Err(format!("type must be 'Buy' or 'Sell', got '{}'", other)),
    }
}

fn parse_positive(field: &str, input: &str) -> Result<f64, String> {
    let value: f64 = input
        .trim()
        .parse()
        .map_err(|_| format!("{} '{}' is not a number", field, input.trim()))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("{} must be positive, got {}", field, value));
    }
    Ok(value)
}

/// Validate one CSV row and convert it into a [`Transaction`].
///
/// `row` is the 1-based data row number used in error messages.
pub(crate) fn validate_row(row: usize, raw: &RawTransaction) -> Result<Transaction, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidRow { row, reason };

    let ticker = validate_ticker(&raw.ticker).map_err(invalid)?;
    let date = parse_ledger_date(&raw.date).map_err(invalid)?;
    let price = parse_positive("price", &raw.price).map_err(invalid)?;
    let volume = parse_positive("volume", &raw.volume).map_err(invalid)?;
    let tx_type = parse_tx_type(&raw.tx_type).map_err(invalid)?;

    Ok(Transaction {
        ticker,
        date,
        price,
        volume,
        tx_type,
    })
}

/// Reject transactions dated after the last date of the fetched price window.
///
/// Transactions before the window start are allowed; they take effect from
/// the first window date.
pub fn validate_window(ledger: &Ledger, window_end: NaiveDate) -> Result<(), ValidationError> {
    if let Some(tx) = ledger.iter().find(|t| t.date > window_end) {
        return Err(ValidationError::OutsideWindow {
            ticker: tx.ticker.clone(),
            date: tx.date,
            window_end,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(ticker: &str, date: &str, price: &str, volume: &str, tx_type: &str) -> RawTransaction {
        RawTransaction {
            ticker: ticker.to_string(),
            date: date.to_string(),
            price: price.to_string(),
            volume: volume.to_string(),
            tx_type: tx_type.to_string(),
        }
    }

    // -- Column validation --

    #[test]
    fn columns_all_present() {
        assert!(validate_columns(["ticker", "date", "price", "volume", "type"]).is_ok());
    }

    #[test]
    fn columns_extra_allowed() {
        assert!(validate_columns(["fee", "ticker", "date", "price", "volume", "type", "note"]).is_ok());
    }

    #[test]
    fn columns_missing_volume() {
        let err = validate_columns(["ticker", "date", "price", "type"]).unwrap_err();
        assert_eq!(err.missing_columns(), ["volume"]);
        assert!(err.to_string().contains("volume"));
    }

    #[test]
    fn columns_missing_several_in_canonical_order() {
        let err = validate_columns(["type", "ticker"]).unwrap_err();
        assert_eq!(err.missing_columns(), ["date", "price", "volume"]);
    }

    #[test]
    fn columns_are_case_sensitive() {
        let err = validate_columns(["Ticker", "date", "price", "volume", "type"]).unwrap_err();
        assert_eq!(err.missing_columns(), ["ticker"]);
    }

    // -- Ticker validation --

    #[test]
    fn ticker_common_forms() {
        assert_eq!(validate_ticker("AAPL").unwrap(), "AAPL");
        assert_eq!(validate_ticker(" ASML.AS ").unwrap(), "ASML.AS");
        assert_eq!(validate_ticker("BRK-B").unwrap(), "BRK-B");
        assert_eq!(validate_ticker("^GSPC").unwrap(), "^GSPC");
    }

    #[test]
    fn ticker_rejects_empty_and_garbage() {
        assert!(validate_ticker("").is_err());
        assert!(validate_ticker("   ").is_err());
        assert!(validate_ticker("AA PL").is_err());
        assert!(validate_ticker("AAPL\u{0007}").is_err());
        assert!(validate_ticker(&"X".repeat(MAX_TICKER_LENGTH + 1)).is_err());
    }

    // -- Date parsing --

    #[test]
    fn date_plain() {
        assert_eq!(
            parse_ledger_date("2021-03-10").unwrap(),
            NaiveDate::from_ymd_opt(2021, 3, 10).unwrap()
        );
    }

    #[test]
    fn date_with_time_drops_time() {
        assert_eq!(
            parse_ledger_date("2021-03-10 00:00:00").unwrap(),
            NaiveDate::from_ymd_opt(2021, 3, 10).unwrap()
        );
    }

    #[test]
    fn date_with_offset_keeps_wall_date() {
        assert_eq!(
            parse_ledger_date("2021-03-10T23:30:00-05:00").unwrap(),
            NaiveDate::from_ymd_opt(2021, 3, 10).unwrap()
        );
    }

    #[test]
    fn date_invalid() {
        assert!(parse_ledger_date("10/03/2021").is_err());
        assert!(parse_ledger_date("2021-02-30").is_err());
    }

    // -- Type parsing --

    #[test]
    fn type_case_sensitive() {
        assert_eq!(parse_tx_type("Buy").unwrap(), TxType::Buy);
        assert_eq!(parse_tx_type("Sell").unwrap(), TxType::Sell);
        assert!(parse_tx_type("buy").is_err());
        assert!(parse_tx_type("SELL").is_err());
        assert!(parse_tx_type("Hold").is_err());
    }

    // -- Row validation --

    #[test]
    fn row_valid() {
        let tx = validate_row(1, &raw("AAPL", "2021-03-10", "100", "10", "Buy")).unwrap();
        assert_eq!(tx.ticker, "AAPL");
        assert_eq!(tx.price, 100.0);
        assert_eq!(tx.volume, 10.0);
    }

    #[test]
    fn row_zero_price_rejected() {
        let err = validate_row(3, &raw("AAPL", "2021-03-10", "0", "10", "Buy")).unwrap_err();
        match err {
            ValidationError::InvalidRow { row, reason } => {
                assert_eq!(row, 3);
                assert!(reason.contains("price"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn row_negative_volume_rejected() {
        assert!(validate_row(1, &raw("AAPL", "2021-03-10", "10", "-1", "Buy")).is_err());
    }

    #[test]
    fn row_non_numeric_and_nan_rejected() {
        assert!(validate_row(1, &raw("AAPL", "2021-03-10", "abc", "1", "Buy")).is_err());
        assert!(validate_row(1, &raw("AAPL", "2021-03-10", "NaN", "1", "Buy")).is_err());
        assert!(validate_row(1, &raw("AAPL", "2021-03-10", "10", "inf", "Buy")).is_err());
    }

    // -- Window bound --

    #[test]
    fn window_rejects_future_transaction() {
        let ledger = Ledger::new(vec![
            Transaction::new(
                "AAPL",
                NaiveDate::from_ymd_opt(2021, 3, 10).unwrap(),
                1.0,
                1.0,
                TxType::Buy,
            ),
            Transaction::new(
                "AAPL",
                NaiveDate::from_ymd_opt(2021, 4, 10).unwrap(),
                1.0,
                1.0,
                TxType::Buy,
            ),
        ]);
        let end = NaiveDate::from_ymd_opt(2021, 3, 31).unwrap();
        let err = validate_window(&ledger, end).unwrap_err();
        assert!(matches!(err, ValidationError::OutsideWindow { .. }));

        let later_end = NaiveDate::from_ymd_opt(2021, 4, 10).unwrap();
        assert!(validate_window(&ledger, later_end).is_ok());
    }
}
