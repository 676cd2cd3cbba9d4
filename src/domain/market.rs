//! Market data value types.
//!
//! Price histories, derived return series, option quotes and the
//! candidate records the allocation builders consume. Everything here
//! is an immutable value scoped to one evaluation run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lightweight ticker identifier used at the ports boundary.
pub type Ticker = String;

// ────────────────────────────────────────────
// Price history and returns
// ────────────────────────────────────────────

/// A single daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Ordered sequence of `(date, close)` points for one asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceHistory {
    points: Vec<PricePoint>,
}

impl PriceHistory {
    /// Builds a history, ordering points by date (stable for equal dates).
    pub fn new(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        Self { points }
    }

    /// Builds a history of consecutive calendar days starting at `start`.
    pub fn from_closes(start: NaiveDate, closes: &[f64]) -> Self {
        let points = start
            .iter_days()
            .zip(closes)
            .map(|(date, &close)| PricePoint { date, close })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closing prices in date order.
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    /// Trailing window of at most `n` points.
    pub fn tail(&self, n: usize) -> Self {
        let start = self.points.len().saturating_sub(n);
        Self {
            points: self.points[start..].to_vec(),
        }
    }

    /// Period-over-period fractional changes.
    pub fn returns(&self) -> ReturnSeries {
        ReturnSeries::from_closes(&self.closes())
    }

    /// `last / first - 1`, or 0 when undefined.
    pub fn total_return(&self) -> f64 {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) if first.close > 0.0 => last.close / first.close - 1.0,
            _ => 0.0,
        }
    }
}

/// Per-period fractional price changes derived from a price history.
///
/// Periods whose change is not finite (zero or missing previous close)
/// are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReturnSeries {
    values: Vec<f64>,
}

impl ReturnSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Derives returns from consecutive closes.
    pub fn from_closes(closes: &[f64]) -> Self {
        let values = closes
            .windows(2)
            .map(|w| w[1] / w[0] - 1.0)
            .filter(|r| r.is_finite())
            .collect();
        Self { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Trailing window of at most `n` returns.
    pub fn tail(&self, n: usize) -> Self {
        let start = self.values.len().saturating_sub(n);
        Self {
            values: self.values[start..].to_vec(),
        }
    }

    /// Strictly positive returns.
    pub fn gains(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied().filter(|r| *r > 0.0)
    }

    /// Strictly negative returns.
    pub fn losses(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied().filter(|r| *r < 0.0)
    }
}

// ────────────────────────────────────────────
// Option chain data
// ────────────────────────────────────────────

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSide {
    Call,
    Put,
}

impl std::fmt::Display for OptionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "CALL"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

/// One row of a pre-fetched option chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub strike: f64,
    pub ask: f64,
    #[serde(default)]
    pub open_interest: u64,
}

// ────────────────────────────────────────────
// Candidates handed to the allocation builders
// ────────────────────────────────────────────

/// A ticker to evaluate, with its independent qualitative ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub ticker: Ticker,
    #[serde(default)]
    pub qualitative_score: f64,
}

/// An equity the caller wants evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityCandidate {
    pub ticker: Ticker,
    pub current_price: f64,
    /// Independent qualitative ranking used by the equal-weight fallback.
    pub qualitative_score: f64,
    pub history: PriceHistory,
}

/// A screened call contract together with its underlying's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionCandidate {
    pub ticker: Ticker,
    pub underlying_price: f64,
    pub strike: f64,
    pub premium: f64,
    pub expiry: NaiveDate,
    pub days_to_expiry: i64,
    pub open_interest: u64,
    /// Screening score (leverage, upside, gamma, liquidity).
    pub score: u32,
    pub reasons: Vec<String>,
    pub underlying_history: PriceHistory,
}
