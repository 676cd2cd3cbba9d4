//! Allocation Builder - Equity Position Sizing
//!
//! Turns candidate equities into bounded dollar allocations:
//! - `Kelly`: full Kelly fraction drives size, flat 20% cap
//! - `ConfidenceWeighted`: Kelly shrunk by estimate confidence
//! - `Unified`: risk-adjusted Kelly, caps scaled by the unified score
//! - `EqualWeight`: fallback when nothing passes the primary filter
//!
//! Per-asset estimation runs on the rayon pool. Ranking and budget
//! clipping are sequential so totals are reproducible.

use std::fmt;

use rayon::prelude::*;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{AllocationConfig, AppConfig};
use crate::domain::error::Result;
use crate::domain::{
  EquityCandidate, KellyEngine, ProbabilityEstimate, ProbabilityEstimator, Ticker,
  UnifiedRiskRewardScorer, UnifiedScore,
};

/// Which fraction drives position size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
  Kelly,
  ConfidenceWeighted,
  #[default]
  Unified,
  EqualWeight,
}

impl fmt::Display for AllocationStrategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Kelly => "kelly",
      Self::ConfidenceWeighted => "confidence_weighted",
      Self::Unified => "unified",
      Self::EqualWeight => "equal_weight",
    };
    f.write_str(name)
  }
}

/// Supporting estimates carried by a sized position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionMetrics {
  pub win_probability: f64,
  pub avg_gain: f64,
  pub avg_loss: f64,
  pub volatility: f64,
  pub sharpe_ratio: f64,
}

impl From<&ProbabilityEstimate> for PositionMetrics {
  fn from(e: &ProbabilityEstimate) -> Self {
    Self {
      win_probability: e.win_probability,
      avg_gain: e.avg_gain,
      avg_loss: e.avg_loss,
      volatility: e.volatility,
      sharpe_ratio: e.sharpe_ratio,
    }
  }
}

impl From<&UnifiedScore> for PositionMetrics {
  fn from(s: &UnifiedScore) -> Self {
    Self {
      win_probability: s.win_probability,
      avg_gain: s.avg_gain,
      avg_loss: s.avg_loss,
      volatility: s.volatility,
      sharpe_ratio: s.sharpe_ratio,
    }
  }
}

/// One sized equity position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
  pub ticker: Ticker,
  pub current_price: f64,
  /// Fraction that drove the size, before scaling.
  pub driving_fraction: f64,
  pub scaled_fraction: f64,
  /// Dollars, rounded down to cents.
  pub dollar_allocation: Decimal,
  pub shares_to_buy: u64,
  /// Ranking key used for ordering and budget priority.
  pub rank_score: f64,
  /// `None` for equal-weight positions.
  pub metrics: Option<PositionMetrics>,
  pub confidence_factor: Option<f64>,
  pub unified: Option<UnifiedScore>,
}

/// Result of one allocation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSet {
  /// Strategy that actually produced the positions.
  pub strategy: AllocationStrategy,
  pub portfolio_value: Decimal,
  pub allocations: Vec<Allocation>,
  pub total_allocated: Decimal,
  pub cash_remaining: Decimal,
  /// `total_allocated / portfolio_value * 100`.
  pub allocation_percentage: f64,
}

impl AllocationSet {
  fn new(strategy: AllocationStrategy, portfolio_value: Decimal, allocations: Vec<Allocation>) -> Self {
    let total_allocated: Decimal = allocations.iter().map(|a| a.dollar_allocation).sum();
    Self {
      strategy,
      portfolio_value,
      allocations,
      total_allocated,
      cash_remaining: portfolio_value - total_allocated,
      allocation_percentage: percentage(total_allocated, portfolio_value),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.allocations.is_empty()
  }

  pub fn len(&self) -> usize {
    self.allocations.len()
  }

  pub fn tickers(&self) -> impl Iterator<Item = &str> {
    self.allocations.iter().map(|a| a.ticker.as_str())
  }
}

// ────────────────────────────────────────────
// Money helpers shared with the options builder
// ────────────────────────────────────────────

/// Converts dollars to `Decimal`, rounded down to cents. Non-finite
/// input maps to zero.
pub(crate) fn to_money(value: f64) -> Decimal {
  Decimal::from_f64(value)
    .unwrap_or(Decimal::ZERO)
    .round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// Whole units of `unit_cost` affordable with `dollars`.
pub(crate) fn whole_units(dollars: Decimal, unit_cost: Decimal) -> u64 {
  if unit_cost <= Decimal::ZERO {
    return 0;
  }
  (dollars / unit_cost).floor().to_u64().unwrap_or(0)
}

pub(crate) fn percentage(part: Decimal, whole: Decimal) -> f64 {
  if whole <= Decimal::ZERO {
    return 0.0;
  }
  (part / whole * Decimal::ONE_HUNDRED).to_f64().unwrap_or(0.0)
}

/// A position competing for a share of a limited budget.
pub(crate) trait Budgeted {
  fn rank(&self) -> f64;
  fn requested(&self) -> Decimal;
  /// Amount at or below which the position is dropped.
  fn floor(&self) -> Decimal;
  /// Applies the granted amount; `false` if the position no longer
  /// qualifies (e.g. it buys zero contracts).
  fn grant(&mut self, dollars: Decimal) -> bool;
}

/// Stable sort by descending rank, then grant each position
/// `min(requested, remaining)` in order.
pub(crate) fn allocate_budget<T: Budgeted>(mut items: Vec<T>, budget: Decimal) -> Vec<T> {
  items.sort_by(|a, b| b.rank().total_cmp(&a.rank()));

  let mut remaining = budget;
  items
    .into_iter()
    .filter_map(|mut item| {
      let granted = item.requested().min(remaining);
      if granted <= item.floor() || !item.grant(granted) {
        return None;
      }
      remaining -= granted;
      Some(item)
    })
    .collect()
}

struct Proposal {
  allocation: Allocation,
  floor: Decimal,
}

impl Budgeted for Proposal {
  fn rank(&self) -> f64 {
    self.allocation.rank_score
  }

  fn requested(&self) -> Decimal {
    self.allocation.dollar_allocation
  }

  fn floor(&self) -> Decimal {
    self.floor
  }

  fn grant(&mut self, dollars: Decimal) -> bool {
    let price = Decimal::from_f64(self.allocation.current_price).unwrap_or(Decimal::ZERO);
    self.allocation.dollar_allocation = dollars;
    self.allocation.shares_to_buy = whole_units(dollars, price);
    true
  }
}

// ────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────

/// Sizes equity positions for one strategy.
#[derive(Debug, Clone)]
pub struct AllocationBuilder {
  estimator: ProbabilityEstimator,
  kelly: KellyEngine,
  scorer: UnifiedRiskRewardScorer,
  config: AllocationConfig,
  min_unified_score: f64,
  lookback_days: usize,
  risk_free_rate: f64,
}

impl AllocationBuilder {
  /// Create a builder from config.
  pub fn new(config: &AppConfig) -> Self {
    let kelly = KellyEngine::new(config.kelly.risk_aversion);
    Self {
      estimator: ProbabilityEstimator::new(config.estimation.clone()),
      scorer: UnifiedRiskRewardScorer::new(
        config.estimation.clone(),
        kelly.clone(),
        config.scoring.clone(),
      ),
      kelly,
      config: config.allocation.clone(),
      min_unified_score: config.scoring.min_unified_score,
      lookback_days: config.estimation.lookback_days,
      risk_free_rate: config.estimation.risk_free_rate,
    }
  }

  /// Allocate with `strategy`, falling back to equal weight when no
  /// candidate passes the strategy's filter.
  pub fn build(
    &self,
    candidates: &[EquityCandidate],
    portfolio_value: f64,
    scaling_factor: f64,
    strategy: AllocationStrategy,
  ) -> AllocationSet {
    if strategy != AllocationStrategy::EqualWeight {
      let primary = self.build_primary(candidates, portfolio_value, scaling_factor, strategy);
      if !primary.is_empty() {
        return primary;
      }
      warn!(
        %strategy,
        candidates = candidates.len(),
        "No candidate passed the strategy filter, falling back to equal weight"
      );
    }
    self.equal_weight(candidates, portfolio_value)
  }

  /// Allocate with `strategy` only. May return an empty set.
  pub fn build_primary(
    &self,
    candidates: &[EquityCandidate],
    portfolio_value: f64,
    scaling_factor: f64,
    strategy: AllocationStrategy,
  ) -> AllocationSet {
    let proposals: Vec<Proposal> = candidates
      .par_iter()
      .filter_map(|c| match self.propose(c, portfolio_value, scaling_factor, strategy) {
        Ok(p) => p,
        Err(e) => {
          debug!(ticker = %c.ticker, error = %e, "Candidate skipped");
          None
        },
      })
      .collect();

    let budget = to_money(portfolio_value);
    let allocations: Vec<Allocation> = allocate_budget(proposals, budget)
      .into_iter()
      .map(|p| p.allocation)
      .collect();

    let set = AllocationSet::new(strategy, budget, allocations);
    info!(
      %strategy,
      positions = set.len(),
      total = %set.total_allocated,
      pct = set.allocation_percentage,
      "Allocation built"
    );
    set
  }

  /// Equal split across the top `max_positions` candidates by
  /// finite qualitative score, converted to whole shares.
  pub fn equal_weight(&self, candidates: &[EquityCandidate], portfolio_value: f64) -> AllocationSet {
    let budget = to_money(portfolio_value);

    let mut ranked: Vec<&EquityCandidate> = candidates
      .iter()
      .filter(|c| valid_price(c.current_price) && c.qualitative_score.is_finite())
      .collect();
    ranked.sort_by(|a, b| b.qualitative_score.total_cmp(&a.qualitative_score));
    ranked.truncate(self.config.max_positions);

    if ranked.is_empty() {
      return AllocationSet::new(AllocationStrategy::EqualWeight, budget, Vec::new());
    }

    let count = ranked.len();
    let per_position = budget / Decimal::from(count);
    let fraction = 1.0 / count as f64;

    let allocations = ranked
      .into_iter()
      .filter_map(|c| {
        let price = Decimal::from_f64(c.current_price)?;
        let shares = whole_units(per_position, price);
        if shares == 0 {
          debug!(ticker = %c.ticker, price = c.current_price, "Equal share buys no shares");
          return None;
        }
        Some(Allocation {
          ticker: c.ticker.clone(),
          current_price: c.current_price,
          driving_fraction: fraction,
          scaled_fraction: fraction,
          dollar_allocation: (Decimal::from(shares) * price)
            .round_dp_with_strategy(2, RoundingStrategy::ToZero),
          shares_to_buy: shares,
          rank_score: c.qualitative_score,
          metrics: None,
          confidence_factor: None,
          unified: None,
        })
      })
      .collect();

    let set = AllocationSet::new(AllocationStrategy::EqualWeight, budget, allocations);
    info!(
      positions = set.len(),
      per_position = %per_position,
      total = %set.total_allocated,
      "Equal-weight allocation built"
    );
    set
  }

  /// Size one candidate. `Ok(None)` when it fails a threshold.
  fn propose(
    &self,
    c: &EquityCandidate,
    portfolio_value: f64,
    scaling_factor: f64,
    strategy: AllocationStrategy,
  ) -> Result<Option<Proposal>> {
    if !valid_price(c.current_price) {
      debug!(ticker = %c.ticker, price = c.current_price, "Invalid price, skipping");
      return Ok(None);
    }

    // (driving fraction, rank, cap/min multiplier, metrics, confidence, unified)
    let (driving, rank, scale, metrics, confidence_factor, unified) = match strategy {
      AllocationStrategy::Kelly => {
        let est = self.estimator.estimate(&c.ticker, &c.history, self.lookback_days, false)?;
        if est.kelly_fraction <= 0.0 {
          return Ok(None);
        }
        let k = est.kelly_fraction;
        (k, k, 1.0, PositionMetrics::from(&est), None, None)
      },
      AllocationStrategy::ConfidenceWeighted => {
        let est = self.estimator.estimate(&c.ticker, &c.history, self.lookback_days, true)?;
        let Some(k) = self.kelly.from_estimate(&est) else {
          return Ok(None);
        };
        if k.confidence_weighted_kelly <= 0.0 {
          return Ok(None);
        }
        let cw = k.confidence_weighted_kelly;
        let cf = k.confidence_factor;
        (cw, cw, cf, PositionMetrics::from(&est), Some(cf), None)
      },
      AllocationStrategy::Unified => {
        let s = self
          .scorer
          .score(&c.ticker, &c.history, self.lookback_days, self.risk_free_rate)?;
        if s.unified_score <= self.min_unified_score {
          return Ok(None);
        }
        let u = s.unified_score;
        (
          s.risk_adjusted_kelly,
          u,
          u,
          PositionMetrics::from(&s),
          Some(s.confidence_factor),
          Some(s),
        )
      },
      AllocationStrategy::EqualWeight => return Ok(None),
    };

    let scaled = driving * scaling_factor;
    let cap = self.config.max_position_fraction * scale * portfolio_value;
    let dollars = (scaled * portfolio_value).min(cap);
    let floor = self.config.min_allocation * scale;
    if !(dollars > floor) {
      return Ok(None);
    }

    Ok(Some(Proposal {
      allocation: Allocation {
        ticker: c.ticker.clone(),
        current_price: c.current_price,
        driving_fraction: driving,
        scaled_fraction: scaled,
        dollar_allocation: to_money(dollars),
        shares_to_buy: 0,
        rank_score: rank,
        metrics: Some(metrics),
        confidence_factor,
        unified,
      },
      floor: to_money(floor),
    }))
  }
}

fn valid_price(price: f64) -> bool {
  price.is_finite() && price > 0.0
}
