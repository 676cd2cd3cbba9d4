//! Market Data Port - Read-only Price and Option Chain Interface
//!
//! Defines the trait the evaluator uses to obtain pre-fetched market
//! data (price histories, spot prices, option chains). The engine
//! never talks to a data vendor directly.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{OptionQuote, PriceHistory};

/// Trait for market data providers.
///
/// Implementors may serve data from files, caches or remote APIs.
/// All methods are read-only; failures are per-ticker and the caller
/// skips the affected ticker.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
  /// Daily closes for `ticker`, at most `lookback_days` trailing points.
  async fn price_history(&self, ticker: &str, lookback_days: usize)
    -> anyhow::Result<PriceHistory>;

  /// Latest price for `ticker`.
  async fn current_price(&self, ticker: &str) -> anyhow::Result<f64>;

  /// Call chain for one expiry.
  async fn option_chain(&self, ticker: &str, expiry: NaiveDate)
    -> anyhow::Result<Vec<OptionQuote>>;

  /// Listed expiries, ascending.
  async fn expiries(&self, ticker: &str) -> anyhow::Result<Vec<NaiveDate>>;
}
