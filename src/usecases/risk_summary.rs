//! Portfolio Risk Summary - Weighted Position Metrics
//!
//! Aggregates per-position estimates into portfolio-level figures,
//! weighting each position by its share of allocated dollars.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use super::allocation::AllocationSet;

/// Portfolio-level risk figures for one allocation set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRiskSummary {
  /// `Σ w · p · g` per period.
  pub expected_return: f64,
  /// Weighted average of per-position volatility.
  pub portfolio_volatility: f64,
  pub portfolio_sharpe: f64,
  /// Rough estimate: twice the portfolio volatility.
  pub max_drawdown_estimate: f64,
  pub number_of_positions: usize,
  /// Largest position over total allocated.
  pub concentration_risk: f64,
}

impl PortfolioRiskSummary {
  /// Summary over the positions that carry metrics.
  ///
  /// Returns `None` when no position has metrics or nothing is
  /// allocated.
  pub fn from_allocations(set: &AllocationSet) -> Option<Self> {
    let positions: Vec<(f64, _)> = set
      .allocations
      .iter()
      .filter_map(|a| Some((a.dollar_allocation.to_f64()?, a.metrics?)))
      .collect();

    let total: f64 = positions.iter().map(|(d, _)| d).sum();
    if positions.is_empty() || total <= 0.0 {
      return None;
    }

    let (expected_return, portfolio_volatility, portfolio_sharpe) =
      positions.iter().fold((0.0, 0.0, 0.0), |(er, vol, sharpe), (dollars, m)| {
        let w = dollars / total;
        (
          er + w * m.win_probability * m.avg_gain,
          vol + w * m.volatility,
          sharpe + w * m.sharpe_ratio,
        )
      });

    let largest = positions.iter().map(|(d, _)| *d).fold(0.0, f64::max);

    Some(Self {
      expected_return,
      portfolio_volatility,
      portfolio_sharpe,
      max_drawdown_estimate: 2.0 * portfolio_volatility,
      number_of_positions: positions.len(),
      concentration_risk: largest / total,
    })
  }
}
