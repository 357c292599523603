//! Concurrent price fetching for a ledger's tickers and the benchmark indices.
//!
//! Each ticker is fetched in its own task, bounded by a semaphore. Every
//! attempt runs under a timeout and transient failures are retried. Results
//! are collected into a `BTreeMap` so the window is assembled in ticker order
//! no matter which fetch finished first.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::benchmark::{Benchmark, BenchmarkSet};
use crate::cache::{history_key, HistoryCache};
use crate::error::ValuationError;
use crate::feed::{FeedError, PriceFeed, TickerHistory};
use crate::retry::{with_retry, RequestTracker, RetryPolicy, TrackerSummary};
use crate::window::{normalize_observations, PriceWindow};

/// Concurrency, timeout and retry settings for fetching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchSettings {
    pub concurrency: usize,
    /// Per-attempt timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub cache_ttl: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            cache_ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum RequestKind {
    History,
    Closes,
}

impl RequestKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Closes => "closes",
        }
    }
}

/// Fetches price histories through a [`PriceFeed`].
///
/// Responses are cached for the lifetime of the fetcher, bounded by the
/// configured TTL. The cache pays off for a caller that keeps one fetcher
/// across repeated valuations of the same range; a one-shot CLI run issues
/// each request once either way.
#[derive(Clone)]
pub struct PriceFetcher {
    feed: Arc<dyn PriceFeed>,
    settings: FetchSettings,
    cache: Arc<HistoryCache>,
    tracker: Arc<RequestTracker>,
}

impl PriceFetcher {
    pub fn new(feed: Arc<dyn PriceFeed>, settings: FetchSettings) -> Self {
        Self {
            feed,
            settings,
            cache: Arc::new(HistoryCache::new(settings.cache_ttl)),
            tracker: Arc::new(RequestTracker::new()),
        }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Request counters accumulated over this fetcher's lifetime.
    pub fn request_summary(&self) -> TrackerSummary {
        self.tracker.summary()
    }

    async fn fetch_one(
        &self,
        kind: RequestKind,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TickerHistory, FeedError> {
        let key = history_key(kind.as_str(), ticker, start, end);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("Cache hit for {}", key);
            return Ok(cached);
        }
        // A full history already carries the closes
        if let RequestKind::Closes = kind {
            let full_key = history_key(RequestKind::History.as_str(), ticker, start, end);
            if let Some(cached) = self.cache.get(&full_key) {
                tracing::debug!("Cache hit for {} via {}", key, full_key);
                return Ok(cached);
            }
        }

        let timeout = self.settings.timeout;
        let feed = &self.feed;
        let history = with_retry(&self.tracker, &self.settings.retry, move || async move {
            let request = async move {
                match kind {
                    RequestKind::History => feed.fetch_history(ticker, start, end).await,
                    RequestKind::Closes => {
                        let closes = feed.fetch_closes(ticker, start, end).await?;
                        let mut history = TickerHistory::new(ticker);
                        history.closes = closes;
                        Ok(history)
                    }
                }
            };
            tokio::time::timeout(timeout, request)
                .await
                .map_err(|_| FeedError::Timeout(timeout))?
        })
        .await?;

        self.cache.set(key, history.clone());
        Ok(history)
    }

    /// Fetch every ticker concurrently. The map holds one entry per requested ticker.
    async fn fetch_all(
        &self,
        kind: RequestKind,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> BTreeMap<String, Result<TickerHistory, FeedError>> {
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for ticker in tickers {
            let sem = Arc::clone(&semaphore);
            let fetcher = self.clone();
            let ticker = ticker.clone();
            join_set.spawn(async move {
                let result = match sem.acquire_owned().await {
                    Ok(_permit) => fetcher.fetch_one(kind, &ticker, start, end).await,
                    Err(_) => Err(FeedError::Upstream("fetch cancelled".to_string())),
                };
                (ticker, result)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((ticker, result)) => {
                    results.insert(ticker, result);
                }
                Err(e) => tracing::error!("Fetch task failed: {}", e),
            }
        }

        for ticker in tickers {
            results
                .entry(ticker.clone())
                .or_insert_with(|| Err(FeedError::Upstream("fetch task aborted".to_string())));
        }
        results
    }

    /// Fetch and align closes and dividends for every ticker.
    ///
    /// Any ticker without data is fatal: a position cannot be valued without prices.
    pub async fn fetch_window(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceWindow, ValuationError> {
        tracing::info!(
            "Fetching {} tickers from {} ({} to {})",
            tickers.len(),
            self.feed.name(),
            start,
            end
        );

        let results = self.fetch_all(RequestKind::History, tickers, start, end).await;

        let mut histories = Vec::with_capacity(results.len());
        for (ticker, result) in results {
            match result {
                Ok(history) => histories.push(history),
                Err(source) => {
                    tracing::error!("Fetching {} failed: {}", ticker, source);
                    return Err(ValuationError::Fetch { ticker, source });
                }
            }
        }

        let window = PriceWindow::from_histories(histories)?;
        let summary = self.tracker.summary();
        tracing::info!(
            "Price window ready: {} dates, {} requests ({} retried, {} failed)",
            window.index().len(),
            summary.requests_made,
            summary.requests_retried,
            summary.requests_failed
        );
        Ok(window)
    }

    /// Fetch and normalize benchmark closes. Failures omit that benchmark only.
    pub async fn fetch_benchmarks(
        &self,
        benchmarks: &[Benchmark],
        start: NaiveDate,
        end: NaiveDate,
    ) -> BenchmarkSet {
        let symbols: Vec<String> = benchmarks.iter().map(|b| b.symbol.clone()).collect();
        let mut results = self.fetch_all(RequestKind::Closes, &symbols, start, end).await;

        let mut set = BenchmarkSet::default();
        for benchmark in benchmarks {
            match results.remove(&benchmark.symbol) {
                Some(Ok(history)) => {
                    match normalize_observations(&benchmark.symbol, "closes", history.closes) {
                        Ok(closes) => set.push_closes(benchmark.clone(), &closes),
                        Err(e) => set.skip(benchmark.clone(), e.to_string()),
                    }
                }
                Some(Err(e)) => set.skip(benchmark.clone(), e.to_string()),
                None => set.skip(benchmark.clone(), "duplicate benchmark symbol".to_string()),
            }
        }
        set
    }
}
