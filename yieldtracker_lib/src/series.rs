//! Date-indexed series primitives.
//!
//! A [`DateIndex`] is a sorted, deduplicated list of trading dates shared by
//! every series in a valuation run. "From date X onward" updates locate the
//! insertion point by binary search and touch every entry at or after it.

use std::collections::BTreeSet;

use chrono::NaiveDate;

/// Sorted, deduplicated sequence of dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateIndex {
    dates: Vec<NaiveDate>,
}

impl DateIndex {
    pub fn new<I: IntoIterator<Item = NaiveDate>>(dates: I) -> Self {
        let unique: BTreeSet<NaiveDate> = dates.into_iter().collect();
        Self {
            dates: unique.into_iter().collect(),
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Position of the first entry on or after `date` (`len()` if none).
    pub fn position_from(&self, date: NaiveDate) -> usize {
        self.dates.partition_point(|d| *d < date)
    }

    /// Exact position of `date`, if present.
    pub fn position_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }
}

/// Values aligned one-to-one with a [`DateIndex`].
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    index: DateIndex,
    values: Vec<f64>,
}

impl TimeSeries {
    /// A series of zeros over `index`.
    pub fn zeros(index: &DateIndex) -> Self {
        Self {
            index: index.clone(),
            values: vec![0.0; index.len()],
        }
    }

    /// Build from an index and matching values. Returns `None` on length mismatch.
    pub fn from_values(index: DateIndex, values: Vec<f64>) -> Option<Self> {
        if index.len() != values.len() {
            return None;
        }
        Some(Self { index, values })
    }

    pub fn index(&self) -> &DateIndex {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first(&self) -> Option<(NaiveDate, f64)> {
        Some((self.index.first()?, *self.values.first()?))
    }

    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        Some((self.index.last()?, *self.values.last()?))
    }

    /// Value on exactly `date`.
    pub fn value_at(&self, date: NaiveDate) -> Option<f64> {
        self.index.position_of(date).map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.index.dates().iter().copied().zip(self.values.iter().copied())
    }

    /// Add `factor * other[d]` to every entry dated on or after `from`.
    ///
    /// `other` must share this series' index.
    pub fn add_scaled_from(&mut self, from: NaiveDate, other: &TimeSeries, factor: f64) {
        debug_assert_eq!(self.index, other.index);
        let start = self.index.position_from(from);
        for (v, o) in self.values[start..].iter_mut().zip(&other.values[start..]) {
            *v += factor * o;
        }
    }

    /// Element-wise addition of a series over the same index.
    pub fn add_assign(&mut self, other: &TimeSeries) {
        debug_assert_eq!(self.index, other.index);
        for (v, o) in self.values.iter_mut().zip(&other.values) {
            *v += o;
        }
    }

    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> TimeSeries {
        TimeSeries {
            index: self.index.clone(),
            values: self.values.iter().map(|v| f(*v)).collect(),
        }
    }

    /// Rescale so the first value equals `base`.
    ///
    /// Returns `None` for an empty series or a first value that is zero or not finite.
    pub fn rebase(&self, base: f64) -> Option<TimeSeries> {
        let (_, first) = self.first()?;
        if first == 0.0 || !first.is_finite() {
            return None;
        }
        Some(self.map(|v| v / first * base))
    }
}

/// Align sorted `(date, value)` observations onto `index`.
///
/// Each index date takes the most recent observation on or before it. Dates
/// before the first observation take the first observation. Returns `None`
/// when there are no observations.
pub fn forward_fill(observations: &[(NaiveDate, f64)], index: &DateIndex) -> Option<TimeSeries> {
    let (_, first_value) = *observations.first()?;
    let mut values = Vec::with_capacity(index.len());
    let mut current = first_value;
    let mut next = 0;

    for date in index.dates() {
        while next < observations.len() && observations[next].0 <= *date {
            current = observations[next].1;
            next += 1;
        }
        values.push(current);
    }

    TimeSeries::from_values(index.clone(), values)
}

/// Cumulative sum of `(date, amount)` events dated strictly after `after`,
/// aligned onto `index` with a zero floor before the first counted event.
pub fn cumulative_after(
    events: &[(NaiveDate, f64)],
    index: &DateIndex,
    after: NaiveDate,
) -> TimeSeries {
    let counted: Vec<&(NaiveDate, f64)> = events.iter().filter(|(d, _)| *d > after).collect();
    let mut values = Vec::with_capacity(index.len());
    let mut total = 0.0;
    let mut next = 0;

    for date in index.dates() {
        while next < counted.len() && counted[next].0 <= *date {
            total += counted[next].1;
            next += 1;
        }
        values.push(total);
    }

    TimeSeries {
        index: index.clone(),
        values,
    }
}
