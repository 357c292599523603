//! The aligned price window every valuation pass reads from.
//!
//! Raw per-ticker histories are normalized (sorted, duplicates reconciled),
//! then every close series is forward-filled onto the union of all trading
//! dates so each ticker has a value on every index date.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::ValuationError;
use crate::feed::{FeedError, TickerHistory};
use crate::series::{forward_fill, DateIndex, TimeSeries};

/// Two observations closer than this on the same date are the same observation.
const DUPLICATE_TOLERANCE: f64 = 1e-9;

/// Aligned close prices and raw dividend actions for a set of tickers.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    index: DateIndex,
    prices: BTreeMap<String, TimeSeries>,
    dividends: BTreeMap<String, Vec<(NaiveDate, f64)>>,
}

/// Sort observations by date and collapse exact duplicates.
///
/// Two different values on one date cannot be reconciled and are reported
/// as an alignment failure for `ticker`.
pub fn normalize_observations(
    ticker: &str,
    kind: &str,
    mut observations: Vec<(NaiveDate, f64)>,
) -> Result<Vec<(NaiveDate, f64)>, ValuationError> {
    observations.sort_by_key(|(d, _)| *d);

    let mut normalized: Vec<(NaiveDate, f64)> = Vec::with_capacity(observations.len());
    for (date, value) in observations {
        if let Some((last_date, last_value)) = normalized.last() {
            if *last_date == date {
                if (last_value - value).abs() <= DUPLICATE_TOLERANCE {
                    continue;
                }
                return Err(ValuationError::Alignment {
                    ticker: ticker.to_string(),
                    reason: format!(
                        "conflicting {} on {}: {} vs {}",
                        kind, date, last_value, value
                    ),
                });
            }
        }
        normalized.push((date, value));
    }
    Ok(normalized)
}

impl PriceWindow {
    /// Build a window from raw histories. Order of the input does not matter.
    pub fn from_histories<I>(histories: I) -> Result<Self, ValuationError>
    where
        I: IntoIterator<Item = TickerHistory>,
    {
        let mut closes: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();
        let mut dividends = BTreeMap::new();

        for history in histories {
            let ticker = history.ticker;
            let ticker_closes = normalize_observations(&ticker, "closes", history.closes)?;
            if ticker_closes.is_empty() {
                return Err(ValuationError::Fetch {
                    source: FeedError::NoData(ticker.clone()),
                    ticker,
                });
            }
            let ticker_divs = normalize_observations(&ticker, "dividends", history.dividends)?;
            closes.insert(ticker.clone(), ticker_closes);
            dividends.insert(ticker, ticker_divs);
        }

        let index = DateIndex::new(
            closes
                .values()
                .flat_map(|obs| obs.iter().map(|(d, _)| *d)),
        );

        let mut prices = BTreeMap::new();
        for (ticker, obs) in closes {
            let aligned = forward_fill(&obs, &index).ok_or_else(|| ValuationError::Alignment {
                ticker: ticker.clone(),
                reason: "no observations to align".to_string(),
            })?;
            if obs[0].0 > index.first().unwrap_or(obs[0].0) {
                tracing::debug!(
                    "{} starts trading on {}, earlier window dates use its first close",
                    ticker,
                    obs[0].0
                );
            }
            prices.insert(ticker, aligned);
        }

        Ok(Self {
            index,
            prices,
            dividends,
        })
    }

    pub fn index(&self) -> &DateIndex {
        &self.index
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.index.first()
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.index.last()
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.prices.keys().map(String::as_str)
    }

    /// Aligned close prices for `ticker`.
    pub fn prices(&self, ticker: &str) -> Result<&TimeSeries, ValuationError> {
        self.prices.get(ticker).ok_or_else(|| ValuationError::Fetch {
            ticker: ticker.to_string(),
            source: FeedError::NoData(ticker.to_string()),
        })
    }

    /// Dividend actions for `ticker`, sorted by ex-date. Empty when none were paid.
    pub fn dividends(&self, ticker: &str) -> &[(NaiveDate, f64)] {
        self.dividends.get(ticker).map(Vec::as_slice).unwrap_or(&[])
    }
}
