//! Error types for price feed operations.

use std::time::Duration;

use thiserror::Error;

/// Errors from fetching price or dividend history.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("No price data returned for {0}")]
    NoData(String),
    #[error("Rate limited by price feed")]
    RateLimited,
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid API key (HTTP 401)")]
    InvalidApiKey,
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Failed to parse response: {0}")]
    ParseFailed(String),
    #[error("Upstream feed error: {0}")]
    Upstream(String),
    #[error("Network error")]
    Network(#[from] reqwest::Error),
}

impl FeedError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout(_) | Self::Network(_) | Self::Upstream(_)
        )
    }
}
