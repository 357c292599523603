//! Tiingo end-of-day feed.
//!
//! Alternative to Yahoo when an API key is available. One request returns the
//! daily bars for the whole range, including the cash dividend paid on each
//! ex-date (`divCash`).

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use super::{FeedError, PriceFeed, TickerHistory};

/// Request timeout for Tiingo API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_BASE_URL: &str = "https://api.tiingo.com";

/// A single daily price record from the Tiingo end-of-day API.
///
/// Only the unadjusted `close` and the cash dividend are read; the adjusted
/// and split columns in the payload are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TiingoDailyPrice {
    pub date: String,
    pub close: f64,
    #[serde(default)]
    pub div_cash: f64,
}

impl TiingoDailyPrice {
    /// Calendar date of the bar, timezone dropped.
    fn naive_date(&self) -> Result<NaiveDate, FeedError> {
        let day = self.date.get(..10).unwrap_or(self.date.as_str());
        NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map_err(|_| FeedError::ParseFailed(format!("invalid bar date '{}'", self.date)))
    }
}

/// Tiingo REST API client for end-of-day historical prices.
pub struct TiingoFeed {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TiingoFeed {
    /// Create a new TiingoFeed with the production base URL.
    pub fn new(api_key: String) -> Result<Self, FeedError> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    /// Create a new TiingoFeed with a custom base URL (for testing with wiremock).
    pub fn with_base_url(base_url: &str, api_key: String) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TiingoDailyPrice>, FeedError> {
        let url = format!("{}/tiingo/daily/{}/prices", self.base_url, ticker);
        let start_str = start.format("%Y-%m-%d").to_string();
        let end_str = end.format("%Y-%m-%d").to_string();

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .query(&[("startDate", &start_str), ("endDate", &end_str)])
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FeedError::NoData(ticker.to_string()));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FeedError::InvalidApiKey);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FeedError::RateLimited);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            let snippet: String = body.chars().take(200).collect();
            return Err(FeedError::Upstream(format!("HTTP {}: {}", status, snippet)));
        }

        // Tiingo quirk: rate-limit responses are HTTP 200 with a text/plain body
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        let body = response.text().await.map_err(|e| {
            FeedError::ParseFailed(format!("Failed to read response body: {}", e))
        })?;

        if content_type.contains("text/plain") || content_type.contains("text/html") {
            let lower = body.to_lowercase();
            if lower.contains("rate limit") || lower.contains("too many requests") {
                return Err(FeedError::RateLimited);
            }
        }

        serde_json::from_str(&body).map_err(|e| {
            let snippet: String = body.chars().take(500).collect();
            FeedError::ParseFailed(format!(
                "Failed to deserialize response: {} | body: {}",
                e, snippet
            ))
        })
    }
}

#[async_trait]
impl PriceFeed for TiingoFeed {
    fn name(&self) -> &'static str {
        "tiingo"
    }

    async fn fetch_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TickerHistory, FeedError> {
        tracing::debug!("Fetching {} from {} to {} from Tiingo", ticker, start, end);

        let bars = self.get_prices(ticker, start, end).await?;
        let mut history = TickerHistory::new(ticker);

        for bar in &bars {
            let date = bar.naive_date()?;
            if bar.close.is_finite() && bar.close > 0.0 {
                history.closes.push((date, bar.close));
            }
            if bar.div_cash > 0.0 {
                history.dividends.push((date, bar.div_cash));
            }
        }

        if history.closes.is_empty() {
            return Err(FeedError::NoData(ticker.to_string()));
        }
        Ok(history)
    }
}
