//! Benchmark indices and their normalization to a base of 100.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::series::{forward_fill, DateIndex, TimeSeries};

/// A market index to compare the portfolio against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Benchmark {
    /// Display name, e.g. "S&P 500".
    pub name: String,
    /// Feed symbol, e.g. "^GSPC".
    pub symbol: String,
}

impl Benchmark {
    pub fn new(name: &str, symbol: &str) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
        }
    }
}

/// Two US equity indices, one global index and one European index.
pub fn default_benchmarks() -> Vec<Benchmark> {
    vec![
        Benchmark::new("S&P 500", "^GSPC"),
        Benchmark::new("Nasdaq", "^IXIC"),
        Benchmark::new("MSCI World", "XWD.TO"),
        Benchmark::new("AEX", "^AEX"),
    ]
}

/// Rescale a close series so its first observation equals 100.
///
/// Returns `None` when the series has no observation or its first close is
/// not a positive number.
pub fn normalize(closes: &[(NaiveDate, f64)]) -> Option<TimeSeries> {
    let (_, first) = *closes.first()?;
    if !first.is_finite() || first <= 0.0 {
        return None;
    }
    let index = DateIndex::new(closes.iter().map(|(d, _)| *d));
    let values = closes.iter().map(|(_, v)| v / first * 100.0).collect();
    TimeSeries::from_values(index, values)
}

/// A benchmark series rebased to 100 on its first observed date.
#[derive(Debug, Clone)]
pub struct NormalizedBenchmark {
    pub benchmark: Benchmark,
    pub series: TimeSeries,
}

impl NormalizedBenchmark {
    /// The normalized series carried onto another date index, for side-by-side display.
    pub fn aligned_to(&self, index: &DateIndex) -> Option<TimeSeries> {
        let observations: Vec<(NaiveDate, f64)> = self.series.iter().collect();
        forward_fill(&observations, index)
    }
}

/// Normalized benchmarks plus the ones that were omitted and why.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkSet {
    pub series: Vec<NormalizedBenchmark>,
    /// `(benchmark name, reason)` for every benchmark left out.
    pub skipped: Vec<(String, String)>,
}

impl BenchmarkSet {
    /// Normalize one benchmark's closes, recording it as skipped if that is impossible.
    pub fn push_closes(&mut self, benchmark: Benchmark, closes: &[(NaiveDate, f64)]) {
        match normalize(closes) {
            Some(series) => self.series.push(NormalizedBenchmark { benchmark, series }),
            None => {
                tracing::warn!(
                    "Benchmark {} ({}) has no usable observations, omitting it",
                    benchmark.name,
                    benchmark.symbol
                );
                self.skipped
                    .push((benchmark.name, "no observations in window".to_string()));
            }
        }
    }

    pub fn skip(&mut self, benchmark: Benchmark, reason: String) {
        tracing::warn!(
            "Benchmark {} ({}) omitted: {}",
            benchmark.name,
            benchmark.symbol,
            reason
        );
        self.skipped.push((benchmark.name, reason));
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
