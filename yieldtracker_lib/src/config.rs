//! Runtime configuration loaded from a TOML file.
//!
//! Every field has a default, so an absent file or an empty one yields a
//! working configuration (Yahoo feed, four default benchmarks).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::benchmark::{default_benchmarks, Benchmark};
use crate::error::ValuationError;
use crate::feed::{PriceFeed, TiingoFeed, YahooFeed};
use crate::fetcher::FetchSettings;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedProvider {
    #[default]
    Yahoo,
    Tiingo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub provider: FeedProvider,
    pub tiingo_api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_jitter_ms: u64,
    pub cache_ttl_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout_secs: 30,
            max_retries: 3,
            base_backoff_ms: 500,
            max_jitter_ms: 250,
            cache_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub fetch: FetchConfig,
    pub benchmarks: Vec<Benchmark>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            fetch: FetchConfig::default(),
            benchmarks: default_benchmarks(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, ValuationError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ValuationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ValuationError> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    ValuationError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&content)
            }
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ValuationError> {
        if self.fetch.concurrency == 0 {
            return Err(ValuationError::Config(
                "fetch.concurrency must be at least 1".to_string(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ValuationError::Config(
                "fetch.timeout_secs must be at least 1".to_string(),
            ));
        }
        if let Some(b) = self
            .benchmarks
            .iter()
            .find(|b| b.symbol.trim().is_empty() || b.name.trim().is_empty())
        {
            return Err(ValuationError::Config(format!(
                "benchmark entries need a name and a symbol (got name={:?}, symbol={:?})",
                b.name, b.symbol
            )));
        }
        Ok(())
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            concurrency: self.fetch.concurrency,
            timeout: Duration::from_secs(self.fetch.timeout_secs),
            retry: RetryPolicy {
                max_retries: self.fetch.max_retries,
                base_backoff: Duration::from_millis(self.fetch.base_backoff_ms),
                max_jitter: Duration::from_millis(self.fetch.max_jitter_ms),
            },
            cache_ttl: Duration::from_secs(self.fetch.cache_ttl_secs),
        }
    }

    /// Construct the configured price feed.
    pub fn build_feed(&self) -> Result<Arc<dyn PriceFeed>, ValuationError> {
        let feed: Arc<dyn PriceFeed> = match self.feed.provider {
            FeedProvider::Yahoo => Arc::new(YahooFeed::new().map_err(|e| {
                ValuationError::Config(format!("cannot create Yahoo feed: {}", e))
            })?),
            FeedProvider::Tiingo => {
                let key = self
                    .feed
                    .tiingo_api_key
                    .clone()
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| {
                        ValuationError::Config(
                            "the tiingo provider requires tiingo_api_key (or TIINGO_API_KEY)"
                                .to_string(),
                        )
                    })?;
                Arc::new(TiingoFeed::new(key).map_err(|e| {
                    ValuationError::Config(format!("cannot create Tiingo feed: {}", e))
                })?)
            }
        };
        Ok(feed)
    }
}
