//! Snapshot Provider - JSON File Adapter for the Market Data Port
//!
//! Serves pre-fetched market data from a single JSON snapshot:
//!
//! ```json
//! {
//!   "as_of": "2024-06-03",
//!   "tickers": {
//!     "ABC": {
//!       "qualitative_score": 7.5,
//!       "current_price": 12.3,
//!       "history": [{ "date": "2024-01-02", "close": 10.0 }],
//!       "options": [{ "expiry": "2024-06-21", "calls": [{ "strike": 12.5, "ask": 0.4, "open_interest": 120 }] }]
//!     }
//!   }
//! }
//! ```
//!
//! The file is read once with `tokio::fs`; lookups are in-memory.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, instrument};

use crate::domain::{OptionQuote, PriceHistory, Ticker, WatchlistEntry};
use crate::ports::MarketDataProvider;

/// Calls listed for one expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpirySnapshot {
    pub expiry: NaiveDate,
    #[serde(default)]
    pub calls: Vec<OptionQuote>,
}

/// Everything known about one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerSnapshot {
    #[serde(default)]
    pub qualitative_score: f64,
    /// Falls back to the last close when absent.
    #[serde(default)]
    pub current_price: Option<f64>,
    pub history: PriceHistory,
    #[serde(default)]
    pub options: Vec<ExpirySnapshot>,
}

/// Full snapshot file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Valuation date used for days-to-expiry.
    pub as_of: NaiveDate,
    pub tickers: BTreeMap<Ticker, TickerSnapshot>,
}

/// In-memory [`MarketDataProvider`] backed by a [`MarketSnapshot`].
pub struct SnapshotProvider {
    snapshot: MarketSnapshot,
}

impl SnapshotProvider {
    /// Wrap a parsed snapshot, ordering every history by date.
    pub fn new(mut snapshot: MarketSnapshot) -> Self {
        for t in snapshot.tickers.values_mut() {
            t.history = PriceHistory::new(t.history.points().to_vec());
        }
        Self { snapshot }
    }

    /// Read and parse a snapshot file.
    #[instrument]
    pub async fn load(path: &str) -> Result<Self> {
        let path = Path::new(path);
        let json = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;

        let snapshot: MarketSnapshot =
            serde_json::from_str(&json).context("Failed to parse snapshot JSON")?;

        info!(
            as_of = %snapshot.as_of,
            tickers = snapshot.tickers.len(),
            "Market snapshot loaded"
        );

        Ok(Self::new(snapshot))
    }

    pub fn as_of(&self) -> NaiveDate {
        self.snapshot.as_of
    }

    /// Every ticker in the snapshot with its qualitative score.
    pub fn watchlist(&self) -> Vec<WatchlistEntry> {
        self.snapshot
            .tickers
            .iter()
            .map(|(ticker, t)| WatchlistEntry {
                ticker: ticker.clone(),
                qualitative_score: t.qualitative_score,
            })
            .collect()
    }

    fn ticker(&self, ticker: &str) -> Result<&TickerSnapshot> {
        self.snapshot
            .tickers
            .get(ticker)
            .ok_or_else(|| anyhow!("Ticker not in snapshot: {ticker}"))
    }
}

#[async_trait]
impl MarketDataProvider for SnapshotProvider {
    async fn price_history(&self, ticker: &str, lookback_days: usize) -> Result<PriceHistory> {
        Ok(self.ticker(ticker)?.history.tail(lookback_days))
    }

    async fn current_price(&self, ticker: &str) -> Result<f64> {
        let t = self.ticker(ticker)?;
        t.current_price
            .or_else(|| t.history.points().last().map(|p| p.close))
            .ok_or_else(|| anyhow!("No price available for {ticker}"))
    }

    async fn option_chain(&self, ticker: &str, expiry: NaiveDate) -> Result<Vec<OptionQuote>> {
        Ok(self
            .ticker(ticker)?
            .options
            .iter()
            .find(|e| e.expiry == expiry)
            .map(|e| e.calls.clone())
            .unwrap_or_default())
    }

    async fn expiries(&self, ticker: &str) -> Result<Vec<NaiveDate>> {
        let mut expiries: Vec<NaiveDate> =
            self.ticker(ticker)?.options.iter().map(|e| e.expiry).collect();
        expiries.sort_unstable();
        expiries.dedup();
        Ok(expiries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "as_of": "2024-06-03",
        "tickers": {
            "ABC": {
                "qualitative_score": 7.5,
                "history": [
                    { "date": "2024-05-30", "close": 10.0 },
                    { "date": "2024-05-31", "close": 10.5 },
                    { "date": "2024-06-03", "close": 11.0 }
                ],
                "options": [
                    { "expiry": "2024-07-19", "calls": [{ "strike": 12.0, "ask": 0.3 }] },
                    { "expiry": "2024-06-21", "calls": [{ "strike": 11.5, "ask": 0.4, "open_interest": 25 }] }
                ]
            },
            "XYZ": {
                "current_price": 3.2,
                "history": []
            }
        }
    }"#;

    fn provider() -> SnapshotProvider {
        SnapshotProvider::new(serde_json::from_str(SNAPSHOT).unwrap())
    }

    #[tokio::test]
    async fn test_price_lookups() {
        let p = provider();
        assert_eq!(p.current_price("ABC").await.unwrap(), 11.0);
        assert_eq!(p.current_price("XYZ").await.unwrap(), 3.2);
        assert_eq!(p.price_history("ABC", 2).await.unwrap().closes(), vec![10.5, 11.0]);
        assert!(p.current_price("NOPE").await.is_err());
    }

    #[tokio::test]
    async fn test_expiries_are_sorted() {
        let p = provider();
        let expiries = p.expiries("ABC").await.unwrap();
        assert_eq!(
            expiries,
            vec![
                NaiveDate::from_ymd_opt(2024, 6, 21).unwrap(),
                NaiveDate::from_ymd_opt(2024, 7, 19).unwrap(),
            ]
        );
        let chain = p.option_chain("ABC", expiries[0]).await.unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].open_interest, 25);
        assert!(p.expiries("XYZ").await.unwrap().is_empty());
    }

    #[test]
    fn test_watchlist_order_and_scores() {
        let list = provider().watchlist();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].ticker, "ABC");
        assert_eq!(list[0].qualitative_score, 7.5);
        assert_eq!(list[1].qualitative_score, 0.0);
    }

    #[test]
    fn test_load_missing_file() {
        let result = tokio_test::block_on(SnapshotProvider::load("does/not/exist.json"));
        assert!(result.is_err());
    }
}
