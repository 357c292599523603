//! Yahoo Finance feed for daily closes and dividend actions.
//!
//! Bar and dividend timestamps are converted to timezone-naive calendar dates
//! here, before anything downstream compares them. Yahoo stamps daily bars at
//! the exchange's session open, so the date is taken in exchange-local time
//! (`gmtoffset` from the chart metadata), not UTC.

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

use super::{FeedError, PriceFeed, TickerHistory};

/// Convert chrono::NaiveDate to time::OffsetDateTime at UTC midnight.
pub fn date_to_offset_datetime(date: NaiveDate) -> Result<OffsetDateTime, FeedError> {
    let datetime = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| FeedError::InvalidDate(date.to_string()))?;

    let timestamp = datetime.and_utc().timestamp();

    OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|_| FeedError::InvalidDate(date.to_string()))
}

/// Convert a unix timestamp to its UTC calendar date, dropping the time of day.
pub fn timestamp_to_date(timestamp: i64) -> Option<NaiveDate> {
    chrono::DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
}

/// UTC request range `[from, to)` covering every exchange-local date in `[start, end]`.
fn request_bounds(start: NaiveDate, end: NaiveDate) -> (NaiveDate, NaiveDate) {
    let from = start.checked_sub_days(Days::new(1)).unwrap_or(start);
    let to = end.checked_add_days(Days::new(2)).unwrap_or(end);
    (from, to)
}

/// Calendar date of `timestamp` on a wall clock `gmtoffset` seconds east of UTC.
pub fn exchange_date(timestamp: i64, gmtoffset: i32) -> Option<NaiveDate> {
    timestamp_to_date(timestamp.checked_add(i64::from(gmtoffset))?)
}

/// Convert a chart response into closes and dividends within `[start, end]`.
///
/// Non-positive and non-finite closes are dropped. Missing dividend events
/// yield an empty dividend list.
pub fn history_from_response(
    ticker: &str,
    response: &yahoo::YResponse,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<TickerHistory, FeedError> {
    let gmtoffset = match response.metadata() {
        Ok(meta) => meta.gmtoffset,
        Err(e) => {
            tracing::debug!("No exchange metadata for {} ({}), dating bars in UTC", ticker, e);
            0
        }
    };

    let quotes = response.quotes().map_err(|e| map_yahoo_error(ticker, e))?;

    let mut history = TickerHistory::new(ticker);
    history.closes = quotes
        .iter()
        .filter(|q| q.close.is_finite() && q.close > 0.0)
        .filter_map(|q| exchange_date(q.timestamp, gmtoffset).map(|d| (d, q.close)))
        .collect();

    history.dividends = match response.dividends() {
        Ok(divs) => divs
            .iter()
            .filter_map(|div| exchange_date(div.date, gmtoffset).map(|d| (d, div.amount)))
            .collect(),
        Err(e) => {
            tracing::debug!("No dividend actions for {}: {}", ticker, e);
            Vec::new()
        }
    };

    let history = history.clipped(start, end);
    if history.closes.is_empty() {
        return Err(FeedError::NoData(ticker.to_string()));
    }
    Ok(history)
}

fn map_yahoo_error(ticker: &str, err: yahoo::YahooError) -> FeedError {
    match err {
        yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult => {
            FeedError::NoData(ticker.to_string())
        }
        other => {
            let message = other.to_string();
            if message.contains("429") || message.to_lowercase().contains("too many requests") {
                FeedError::RateLimited
            } else {
                FeedError::Upstream(message)
            }
        }
    }
}

/// Yahoo Finance chart API feed.
pub struct YahooFeed {
    connector: yahoo::YahooConnector,
}

impl YahooFeed {
    pub fn new() -> Result<Self, FeedError> {
        let connector =
            yahoo::YahooConnector::new().map_err(|e| FeedError::Upstream(e.to_string()))?;
        Ok(Self { connector })
    }
}

#[async_trait]
impl PriceFeed for YahooFeed {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TickerHistory, FeedError> {
        tracing::debug!("Fetching {} from {} to {} from Yahoo", ticker, start, end);

        // Bounds are UTC and the end is exclusive. Pad a day on each side so
        // bars stamped on the neighbouring UTC day are returned, then clip locally.
        let (from, to) = request_bounds(start, end);
        let response = self
            .connector
            .get_quote_history(
                ticker,
                date_to_offset_datetime(from)?,
                date_to_offset_datetime(to)?,
            )
            .await
            .map_err(|e| map_yahoo_error(ticker, e))?;

        history_from_response(ticker, &response, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_date_to_offset_datetime_basic() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let result = date_to_offset_datetime(date).unwrap();

        assert_eq!(result.year(), 2024);
        assert_eq!(result.month() as u32, 1);
        assert_eq!(result.day(), 15);

        assert_eq!(result.hour(), 0);
        assert_eq!(result.minute(), 0);
        assert_eq!(result.offset().whole_hours(), 0);
    }

    #[test]
    fn test_date_to_offset_datetime_epoch() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        let result = date_to_offset_datetime(date).unwrap();
        assert_eq!(result.unix_timestamp(), 0);
    }

    #[test]
    fn test_timestamp_to_date_drops_time() {
        // 2024-06-15 13:30:00 UTC, a US market open bar
        let date = timestamp_to_date(1_718_458_200).unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 6);
        assert_eq!(date.day(), 15);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let dates = vec![
            NaiveDate::from_ymd_opt(2021, 3, 10).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            NaiveDate::from_ymd_opt(2020, 2, 29).unwrap(), // Leap day
        ];

        for date in dates {
            let offset_dt = date_to_offset_datetime(date).unwrap();
            let back = timestamp_to_date(offset_dt.unix_timestamp()).unwrap();
            assert_eq!(back, date, "Roundtrip failed for {}", date);
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn load_asx_chart() -> serde_json::Value {
        let json_str = include_str!("../../tests/fixtures/yahoo_chart_asx.json");
        serde_json::from_str(json_str).unwrap()
    }

    #[test]
    fn test_exchange_date_east_of_utc() {
        // ASX open, Monday 2024-01-15 10:00 AEDT, is still Sunday in UTC
        assert_eq!(timestamp_to_date(1_705_273_200), Some(ymd(2024, 1, 14)));
        assert_eq!(exchange_date(1_705_273_200, 39_600), Some(ymd(2024, 1, 15)));
    }

    #[test]
    fn test_exchange_date_west_of_utc() {
        // NYSE open, 2024-06-15 09:30 EDT
        assert_eq!(exchange_date(1_718_458_200, -14_400), Some(ymd(2024, 6, 15)));
        assert_eq!(exchange_date(1_718_458_200, 0), Some(ymd(2024, 6, 15)));
    }

    #[test]
    fn test_request_bounds_pad_both_sides() {
        let (from, to) = request_bounds(ymd(2024, 1, 15), ymd(2024, 1, 18));
        assert_eq!(from, ymd(2024, 1, 14));
        assert_eq!(to, ymd(2024, 1, 20));
    }

    #[test]
    fn test_history_from_asx_chart_uses_exchange_dates() {
        let response = yahoo::YResponse::from_json(load_asx_chart()).unwrap();
        let history =
            history_from_response("BHP.AX", &response, ymd(2024, 1, 15), ymd(2024, 1, 18)).unwrap();

        assert_eq!(history.ticker, "BHP.AX");
        // the zero close on the 17th is dropped
        assert_eq!(
            history.closes,
            vec![
                (ymd(2024, 1, 15), 45.1),
                (ymd(2024, 1, 16), 45.55),
                (ymd(2024, 1, 18), 46.02)
            ]
        );
        assert_eq!(history.dividends, vec![(ymd(2024, 1, 16), 0.72)]);
    }

    #[test]
    fn test_history_from_response_clips_to_range() {
        let response = yahoo::YResponse::from_json(load_asx_chart()).unwrap();

        let history =
            history_from_response("BHP.AX", &response, ymd(2024, 1, 16), ymd(2024, 1, 16)).unwrap();
        assert_eq!(history.closes, vec![(ymd(2024, 1, 16), 45.55)]);
        assert_eq!(history.dividends, vec![(ymd(2024, 1, 16), 0.72)]);

        let history =
            history_from_response("BHP.AX", &response, ymd(2024, 1, 15), ymd(2024, 1, 15)).unwrap();
        assert!(history.dividends.is_empty());

        // only the filtered zero close falls in this range
        let err = history_from_response("BHP.AX", &response, ymd(2024, 1, 17), ymd(2024, 1, 17))
            .unwrap_err();
        assert!(matches!(err, FeedError::NoData(ref t) if t == "BHP.AX"));
    }

    #[test]
    fn test_history_from_response_without_dividend_events() {
        let mut json = load_asx_chart();
        json["chart"]["result"][0]
            .as_object_mut()
            .unwrap()
            .remove("events");
        let response = yahoo::YResponse::from_json(json).unwrap();

        let history =
            history_from_response("BHP.AX", &response, ymd(2024, 1, 15), ymd(2024, 1, 18)).unwrap();
        assert_eq!(history.closes.len(), 3);
        assert!(history.dividends.is_empty());
    }

    #[test]
    fn test_no_quotes_maps_to_no_data() {
        let err = map_yahoo_error("FAKE", yahoo::YahooError::NoQuotes);
        assert!(matches!(err, FeedError::NoData(ref t) if t == "FAKE"));
        let err = map_yahoo_error("FAKE", yahoo::YahooError::NoResult);
        assert!(matches!(err, FeedError::NoData(_)));
    }
}
