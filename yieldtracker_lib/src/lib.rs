//! Library layer for yieldtracker: ledger validation, price feeds, and portfolio valuation.
//!
//! Reads a buy/sell transaction ledger, fetches daily close and dividend series
//! for every ticker it names, and computes a mark-to-market position value
//! series plus a dividend-inclusive yield series benchmarked against indices.

pub mod benchmark;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetcher;
pub mod ledger;
pub mod retry;
pub mod series;
pub mod validation;
pub mod valuation;
pub mod window;

pub use benchmark::{Benchmark, BenchmarkSet, NormalizedBenchmark};
pub use config::Config;
pub use error::{ValidationError, ValuationError};
pub use feed::{FeedError, PriceFeed, StaticFeed, TickerHistory};
pub use fetcher::{FetchSettings, PriceFetcher};
pub use ledger::{Ledger, Transaction, TxType};
pub use series::{DateIndex, TimeSeries};
pub use valuation::{compute_valuation, value_portfolio, ValuationResult, ValuationSummary};
pub use window::PriceWindow;
