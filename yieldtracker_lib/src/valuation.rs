//! Portfolio valuation over an aligned price window.
//!
//! Two passes run over the ledger:
//!
//! - **Position value** marks the net volume of every transaction to the
//!   market price from its date onward. Buys add, Sells subtract.
//! - **Yield** reprices each Buy lot by its own growth multiple
//!   (`price_t / purchase_price`, held at 1 up to and including the purchase
//!   date), adds the lot's cumulative dividends, divides by total invested
//!   capital and rebases the result to 100. Sells do not enter this pass.
//!
//! [`compute_valuation`] is pure; [`value_portfolio`] wraps it with fetching.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::benchmark::{Benchmark, BenchmarkSet, NormalizedBenchmark};
use crate::error::ValuationError;
use crate::fetcher::PriceFetcher;
use crate::ledger::{Ledger, TxType};
use crate::series::{cumulative_after, TimeSeries};
use crate::validation::validate_window;
use crate::window::PriceWindow;

/// Net volume below this is treated as negative (oversold).
const VOLUME_TOLERANCE: f64 = 1e-9;

/// Mark-to-market value of the net volume held, priced at the daily close.
pub fn position_value_series(
    ledger: &Ledger,
    window: &PriceWindow,
) -> Result<TimeSeries, ValuationError> {
    let mut value = TimeSeries::zeros(window.index());
    for tx in ledger.iter() {
        let prices = window.prices(&tx.ticker)?;
        let sign = match tx.tx_type {
            TxType::Buy => 1.0,
            TxType::Sell => -1.0,
        };
        value.add_scaled_from(tx.date, prices, sign * tx.volume);
    }
    Ok(value)
}

/// Sorted tickers whose net volume goes negative when transactions are
/// replayed by date. Same-day transactions keep ledger order.
pub fn oversold_tickers(ledger: &Ledger) -> Vec<String> {
    let mut ordered: Vec<_> = ledger.iter().collect();
    ordered.sort_by_key(|tx| tx.date);

    let mut held: BTreeMap<&str, f64> = BTreeMap::new();
    let mut oversold = BTreeSet::new();
    for tx in ordered {
        let volume = held.entry(tx.ticker.as_str()).or_insert(0.0);
        match tx.tx_type {
            TxType::Buy => *volume += tx.volume,
            TxType::Sell => *volume -= tx.volume,
        }
        if *volume < -VOLUME_TOLERANCE {
            oversold.insert(tx.ticker.clone());
        }
    }
    oversold.into_iter().collect()
}

/// Un-normalized output of the yield pass.
#[derive(Debug, Clone)]
pub struct YieldComputation {
    /// Sum over Buy lots of growth-adjusted lot value plus received dividends.
    pub running_value: TimeSeries,
    /// Sum of `price * volume` over Buy transactions.
    pub invested_capital: f64,
}

/// Growth and dividend value of every Buy lot.
///
/// Fails with `DegenerateInput` when the ledger has no Buy, since the
/// invested capital would be zero.
pub fn yield_value_series(
    ledger: &Ledger,
    window: &PriceWindow,
) -> Result<YieldComputation, ValuationError> {
    let index = window.index();
    let mut running_value = TimeSeries::zeros(index);
    let mut invested_capital = 0.0;

    for tx in ledger.buys() {
        let prices = window.prices(&tx.ticker)?;
        let lot_capital = tx.notional();
        invested_capital += lot_capital;

        let growth = TimeSeries::from_values(
            index.clone(),
            prices
                .iter()
                .map(|(date, price)| {
                    if date <= tx.date {
                        1.0
                    } else {
                        price / tx.price
                    }
                })
                .collect(),
        )
        .ok_or_else(|| ValuationError::Alignment {
            ticker: tx.ticker.clone(),
            reason: "price series does not match the window index".to_string(),
        })?;
        running_value.add_assign(&growth.map(|g| g * lot_capital));

        let dividends = cumulative_after(window.dividends(&tx.ticker), index, tx.date);
        running_value.add_assign(&dividends.map(|per_share| per_share * tx.volume));
    }

    if invested_capital <= 0.0 {
        return Err(ValuationError::DegenerateInput(
            "ledger has no Buy transactions, invested capital is zero".to_string(),
        ));
    }

    Ok(YieldComputation {
        running_value,
        invested_capital,
    })
}

/// Express `value` as a percentage of `capital`, then rebase so it starts at 100.
pub fn normalized_yield(value: &TimeSeries, capital: f64) -> Result<TimeSeries, ValuationError> {
    if !capital.is_finite() || capital <= 0.0 {
        return Err(ValuationError::DegenerateInput(format!(
            "invested capital must be positive, got {}",
            capital
        )));
    }
    value
        .map(|v| v / capital * 100.0)
        .rebase(100.0)
        .ok_or_else(|| {
            ValuationError::DegenerateInput("yield series has no non-zero starting value".to_string())
        })
}

/// Everything the presentation layer needs for one valuation.
#[derive(Debug, Clone)]
pub struct ValuationResult {
    pub position_value: TimeSeries,
    pub running_value: TimeSeries,
    pub normalized_yield: TimeSeries,
    pub invested_capital: f64,
    pub benchmarks: Vec<NormalizedBenchmark>,
    /// `(benchmark name, reason)` for benchmarks left out.
    pub skipped_benchmarks: Vec<(String, String)>,
    pub oversold_tickers: Vec<String>,
    pub warnings: Vec<String>,
}

/// Headline figures of a [`ValuationResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationSummary {
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub position_value: f64,
    pub invested_capital: f64,
    pub yield_index: f64,
    /// `yield_index - 100`, in percent.
    pub total_return_pct: f64,
    pub oversold_tickers: Vec<String>,
}

impl ValuationResult {
    pub fn summary(&self) -> Option<ValuationSummary> {
        let (first_date, _) = self.normalized_yield.first()?;
        let (last_date, yield_index) = self.normalized_yield.last()?;
        let (_, position_value) = self.position_value.last()?;
        Some(ValuationSummary {
            first_date,
            last_date,
            position_value,
            invested_capital: self.invested_capital,
            yield_index,
            total_return_pct: yield_index - 100.0,
            oversold_tickers: self.oversold_tickers.clone(),
        })
    }
}

/// Run both passes over an already fetched window.
pub fn compute_valuation(
    ledger: &Ledger,
    window: &PriceWindow,
    benchmarks: BenchmarkSet,
) -> Result<ValuationResult, ValuationError> {
    let window_end = window.end().ok_or_else(|| {
        ValuationError::DegenerateInput("price window contains no dates".to_string())
    })?;
    validate_window(ledger, window_end)?;

    let mut warnings = Vec::new();

    let oversold = oversold_tickers(ledger);
    if !oversold.is_empty() {
        tracing::warn!(
            "Sells exceed holdings for {}; position value goes negative",
            oversold.join(", ")
        );
        warnings.push(format!(
            "Sells exceed the volume held for {}; position value includes a negative position",
            oversold.join(", ")
        ));
    }
    if ledger.has_sells() {
        warnings.push(
            "Sell transactions are not deducted from the yield series; it measures growth since each purchase"
                .to_string(),
        );
    }

    let position_value = position_value_series(ledger, window)?;
    let YieldComputation {
        running_value,
        invested_capital,
    } = yield_value_series(ledger, window)?;
    let normalized = normalized_yield(&running_value, invested_capital)?;

    Ok(ValuationResult {
        position_value,
        running_value,
        normalized_yield: normalized,
        invested_capital,
        benchmarks: benchmarks.series,
        skipped_benchmarks: benchmarks.skipped,
        oversold_tickers: oversold,
        warnings,
    })
}

/// Fetch prices for every ledger ticker and the benchmarks, then value the ledger.
pub async fn value_portfolio(
    ledger: &Ledger,
    fetcher: &PriceFetcher,
    benchmarks: &[Benchmark],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<ValuationResult, ValuationError> {
    if ledger.is_empty() {
        return Err(crate::error::ValidationError::EmptyLedger.into());
    }
    if start > end {
        return Err(ValuationError::DegenerateInput(format!(
            "start date {} is after end date {}",
            start, end
        )));
    }
    // Cheap rejection before any network traffic
    validate_window(ledger, end)?;

    let window = fetcher.fetch_window(&ledger.tickers(), start, end).await?;

    let benchmark_set = match (window.start(), window.end()) {
        (Some(first), Some(last)) if !benchmarks.is_empty() => {
            fetcher.fetch_benchmarks(benchmarks, first, last).await
        }
        _ => BenchmarkSet::default(),
    };

    compute_valuation(ledger, &window, benchmark_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::feed::TickerHistory;
    use crate::ledger::Transaction;

    const EPSILON: f64 = 1e-9;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, day).unwrap()
    }

    fn buy(ticker: &str, day: u32, price: f64, volume: f64) -> Transaction {
        Transaction::new(ticker, d(day), price, volume, TxType::Buy)
    }

    fn sell(ticker: &str, day: u32, price: f64, volume: f64) -> Transaction {
        Transaction::new(ticker, d(day), price, volume, TxType::Sell)
    }

    fn window(histories: Vec<TickerHistory>) -> PriceWindow {
        PriceWindow::from_histories(histories).unwrap()
    }

    fn history(
        ticker: &str,
        closes: Vec<(NaiveDate, f64)>,
        dividends: Vec<(NaiveDate, f64)>,
    ) -> TickerHistory {
        TickerHistory {
            ticker: ticker.to_string(),
            closes,
            dividends,
        }
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < EPSILON, "{actual:?} vs {expected:?}");
        }
    }

    #[test]
    fn single_buy_example() {
        let ledger = Ledger::new(vec![buy("AAPL", 10, 100.0, 10.0)]);
        let w = window(vec![history(
            "AAPL",
            vec![(d(10), 100.0), (d(11), 110.0)],
            vec![],
        )]);

        let result = compute_valuation(&ledger, &w, BenchmarkSet::default()).unwrap();
        assert_close(result.running_value.values(), &[1000.0, 1100.0]);
        assert_close(result.normalized_yield.values(), &[100.0, 110.0]);
        assert_close(result.position_value.values(), &[1000.0, 1100.0]);
        assert_eq!(result.invested_capital, 1000.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn position_value_without_sells_sums_prior_buys() {
        let ledger = Ledger::new(vec![
            buy("AAPL", 9, 95.0, 10.0),
            buy("MSFT", 10, 200.0, 2.0),
            buy("AAPL", 11, 120.0, 5.0),
        ]);
        let w = window(vec![
            history("AAPL", vec![(d(9), 100.0), (d(10), 105.0), (d(11), 110.0)], vec![]),
            history("MSFT", vec![(d(9), 200.0), (d(10), 210.0), (d(11), 220.0)], vec![]),
        ]);

        let value = position_value_series(&ledger, &w).unwrap();
        let expected: Vec<f64> = w
            .index()
            .dates()
            .iter()
            .map(|date| {
                ledger
                    .buys()
                    .filter(|tx| tx.date <= *date)
                    .map(|tx| tx.volume * w.prices(&tx.ticker).unwrap().value_at(*date).unwrap())
                    .sum()
            })
            .collect();
        assert_close(value.values(), &expected);
        assert_close(value.values(), &[1000.0, 1050.0 + 420.0, 15.0 * 110.0 + 440.0]);
    }

    #[test]
    fn sells_subtract_at_market_price() {
        let ledger = Ledger::new(vec![buy("AAPL", 9, 100.0, 10.0), sell("AAPL", 11, 130.0, 4.0)]);
        let w = window(vec![history(
            "AAPL",
            vec![(d(9), 100.0), (d(10), 110.0), (d(11), 120.0)],
            vec![],
        )]);

        let value = position_value_series(&ledger, &w).unwrap();
        assert_close(value.values(), &[1000.0, 1100.0, 720.0]);
    }

    #[test]
    fn oversell_is_kept_and_reported() {
        let ledger = Ledger::new(vec![buy("AAPL", 9, 100.0, 1.0), sell("AAPL", 10, 100.0, 3.0)]);
        let w = window(vec![history("AAPL", vec![(d(9), 100.0), (d(10), 100.0)], vec![])]);

        let result = compute_valuation(&ledger, &w, BenchmarkSet::default()).unwrap();
        assert_close(result.position_value.values(), &[100.0, -200.0]);
        assert_eq!(result.oversold_tickers, vec!["AAPL".to_string()]);
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn oversold_check_is_chronological() {
        // Listed out of order, but the buy happens first
        let ledger = Ledger::new(vec![sell("AAPL", 12, 1.0, 5.0), buy("AAPL", 10, 1.0, 5.0)]);
        assert!(oversold_tickers(&ledger).is_empty());

        let ledger = Ledger::new(vec![sell("AAPL", 9, 1.0, 5.0), buy("AAPL", 10, 1.0, 5.0)]);
        assert_eq!(oversold_tickers(&ledger), vec!["AAPL".to_string()]);
    }

    #[test]
    fn one_buy_with_dividends_matches_closed_form() {
        let tx = buy("KO", 10, 50.0, 20.0);
        let ledger = Ledger::new(vec![tx.clone()]);
        let closes = vec![(d(8), 48.0), (d(9), 49.0), (d(10), 52.0), (d(11), 55.0), (d(12), 54.0)];
        // The d(10) ex-date coincides with the purchase and is not received
        let dividends = vec![(d(10), 0.40), (d(11), 0.42)];
        let w = window(vec![history("KO", closes.clone(), dividends)]);

        let computed = yield_value_series(&ledger, &w).unwrap();
        let lot = tx.price * tx.volume;
        let expected: Vec<f64> = closes
            .iter()
            .map(|(date, price)| {
                let growth = if *date <= tx.date { 1.0 } else { price / tx.price };
                let divs = if *date >= d(11) { 0.42 } else { 0.0 };
                growth * lot + divs * tx.volume
            })
            .collect();

        assert_close(computed.running_value.values(), &expected);
        assert_eq!(computed.running_value.value_at(tx.date), Some(lot));
        assert_eq!(computed.invested_capital, lot);
    }

    #[test]
    fn lots_grow_by_their_own_multiple() {
        let ledger = Ledger::new(vec![buy("AAPL", 9, 100.0, 1.0), buy("AAPL", 10, 200.0, 1.0)]);
        let w = window(vec![history(
            "AAPL",
            vec![(d(9), 100.0), (d(10), 200.0), (d(11), 300.0)],
            vec![],
        )]);

        let computed = yield_value_series(&ledger, &w).unwrap();
        // d(11): 100 * 3 + 200 * 1.5
        assert_close(computed.running_value.values(), &[300.0, 400.0, 600.0]);
        assert_eq!(computed.invested_capital, 300.0);
    }

    #[test]
    fn yield_pass_ignores_sells() {
        let with_sell = Ledger::new(vec![buy("AAPL", 9, 100.0, 10.0), sell("AAPL", 10, 110.0, 5.0)]);
        let without = Ledger::new(vec![buy("AAPL", 9, 100.0, 10.0)]);
        let w = window(vec![history("AAPL", vec![(d(9), 100.0), (d(10), 110.0)], vec![])]);

        let a = yield_value_series(&with_sell, &w).unwrap();
        let b = yield_value_series(&without, &w).unwrap();
        assert_eq!(a.running_value, b.running_value);
        assert_eq!(a.invested_capital, b.invested_capital);

        let result = compute_valuation(&with_sell, &w, BenchmarkSet::default()).unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("yield series")));
    }

    #[test]
    fn no_buys_is_degenerate() {
        let ledger = Ledger::new(vec![sell("AAPL", 9, 100.0, 1.0)]);
        let w = window(vec![history("AAPL", vec![(d(9), 100.0)], vec![])]);

        let err = compute_valuation(&ledger, &w, BenchmarkSet::default()).unwrap_err();
        assert!(matches!(err, ValuationError::DegenerateInput(_)));
    }

    #[test]
    fn normalized_yield_starts_at_exactly_100() {
        let index = crate::series::DateIndex::new(vec![d(9), d(10), d(11)]);
        let value = TimeSeries::from_values(index, vec![1234.567, 1300.0, 1250.5]).unwrap();
        let normalized = normalized_yield(&value, 1000.0).unwrap();
        assert_eq!(normalized.values()[0], 100.0);
        assert!(normalized_yield(&value, 0.0).is_err());
    }

    #[test]
    fn transactions_after_window_are_rejected() {
        let ledger = Ledger::new(vec![buy("AAPL", 20, 100.0, 1.0)]);
        let w = window(vec![history("AAPL", vec![(d(9), 100.0), (d(10), 101.0)], vec![])]);

        let err = compute_valuation(&ledger, &w, BenchmarkSet::default()).unwrap_err();
        assert!(matches!(
            err,
            ValuationError::Validation(ValidationError::OutsideWindow { .. })
        ));
    }

    #[test]
    fn transactions_before_window_apply_from_first_date() {
        let ledger = Ledger::new(vec![buy("AAPL", 1, 50.0, 2.0)]);
        let w = window(vec![history("AAPL", vec![(d(9), 100.0), (d(10), 110.0)], vec![])]);

        let result = compute_valuation(&ledger, &w, BenchmarkSet::default()).unwrap();
        assert_close(result.position_value.values(), &[200.0, 220.0]);
        // growth already counted on the first window date
        assert_close(result.running_value.values(), &[200.0, 220.0]);
        assert_eq!(result.normalized_yield.values()[0], 100.0);
    }

    #[test]
    fn summary_reports_headline_figures() {
        let ledger = Ledger::new(vec![buy("AAPL", 10, 100.0, 10.0)]);
        let w = window(vec![history(
            "AAPL",
            vec![(d(10), 100.0), (d(11), 110.0)],
            vec![],
        )]);
        let summary = compute_valuation(&ledger, &w, BenchmarkSet::default())
            .unwrap()
            .summary()
            .unwrap();

        assert_eq!(summary.first_date, d(10));
        assert_eq!(summary.last_date, d(11));
        assert!((summary.position_value - 1100.0).abs() < EPSILON);
        assert!((summary.total_return_pct - 10.0).abs() < EPSILON);
        assert!(summary.oversold_tickers.is_empty());
    }
}
