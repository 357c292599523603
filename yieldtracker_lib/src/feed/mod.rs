//! Price feed interface and implementations.
//!
//! A feed returns raw daily closes and dividend actions for one ticker over a
//! date range. Dates are timezone-naive by the time they leave a feed;
//! alignment onto a shared index happens in [`crate::window`].

pub mod error;
pub mod tiingo;
pub mod yahoo;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;

pub use error::FeedError;
pub use tiingo::TiingoFeed;
pub use yahoo::YahooFeed;

/// Raw history for one ticker as returned by a feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerHistory {
    pub ticker: String,
    /// Daily close prices.
    pub closes: Vec<(NaiveDate, f64)>,
    /// Ex-dividend date and per-share amount. Sparse.
    pub dividends: Vec<(NaiveDate, f64)>,
}

impl TickerHistory {
    pub fn new(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            ..Default::default()
        }
    }

    /// Keep only observations within `[start, end]`.
    pub fn clipped(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.closes.retain(|(d, _)| *d >= start && *d <= end);
        self.dividends.retain(|(d, _)| *d >= start && *d <= end);
        self
    }
}

/// Source of daily close prices and dividend actions.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Closes and dividends for `ticker` within `[start, end]`.
    async fn fetch_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TickerHistory, FeedError>;

    /// Closes only, used for benchmark indices.
    async fn fetch_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, FeedError> {
        Ok(self.fetch_history(ticker, start, end).await?.closes)
    }
}

/// In-memory feed serving fixed histories. Unknown tickers return `NoData`.
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    histories: HashMap<String, TickerHistory>,
}

impl StaticFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_closes(mut self, ticker: &str, closes: Vec<(NaiveDate, f64)>) -> Self {
        self.histories
            .entry(ticker.to_string())
            .or_insert_with(|| TickerHistory::new(ticker))
            .closes = closes;
        self
    }

    pub fn with_dividends(mut self, ticker: &str, dividends: Vec<(NaiveDate, f64)>) -> Self {
        self.histories
            .entry(ticker.to_string())
            .or_insert_with(|| TickerHistory::new(ticker))
            .dividends = dividends;
        self
    }
}

#[async_trait]
impl PriceFeed for StaticFeed {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TickerHistory, FeedError> {
        let history = self
            .histories
            .get(ticker)
            .cloned()
            .ok_or_else(|| FeedError::NoData(ticker.to_string()))?
            .clipped(start, end);
        if history.closes.is_empty() {
            return Err(FeedError::NoData(ticker.to_string()));
        }
        Ok(history)
    }
}
