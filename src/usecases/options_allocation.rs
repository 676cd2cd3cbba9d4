//! Options Allocation - Call Contract Sizing
//!
//! Sizes screened call contracts with quarter-Kelly on the
//! move-probability bet:
//! - Volatility from the underlying's trailing returns
//! - Kelly fraction from `OptionsRiskModel::size`
//! - Per-contract cap (5%) and minimum ($5)
//! - Whole contracts only, ranked by Kelly fraction
//!
//! Greeks and windowed move estimates are attached for reporting.

use chrono::NaiveDate;
use rayon::prelude::*;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::allocation::{Budgeted, allocate_budget, percentage, to_money, whole_units};
use crate::config::{AppConfig, OptionsConfig};
use crate::domain::error::Result;
use crate::domain::options::CONTRACT_SIZE;
use crate::domain::{
  Greeks, MoveReturns, OptionCandidate, OptionSide, OptionsRiskModel, ProbabilityEstimator, Ticker,
  compute_greeks, move_probability,
};

/// Move probabilities for the windowed returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveProbabilities {
  pub prob_25: f64,
  pub prob_50: f64,
  pub prob_100: f64,
}

/// One sized call position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionAllocation {
  pub ticker: Ticker,
  pub underlying_price: f64,
  pub strike: f64,
  pub premium: f64,
  pub expiry: NaiveDate,
  pub days_to_expiry: i64,
  pub contracts_to_buy: u64,
  pub dollar_allocation: Decimal,
  /// Premium times contract size.
  pub contract_cost: Decimal,
  pub kelly_fraction: f64,
  pub scaled_fraction: f64,
  pub win_probability: f64,
  pub potential_gain: f64,
  pub max_loss: f64,
  /// Underlying per-period volatility.
  pub volatility: f64,
  /// `None` when the pricing inputs are invalid.
  pub greeks: Option<Greeks>,
  pub move_returns: MoveReturns,
  pub move_probabilities: MoveProbabilities,
  pub screening_score: u32,
}

/// Result of one options allocation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionAllocationSet {
  pub portfolio_value: Decimal,
  pub allocations: Vec<OptionAllocation>,
  pub total_allocated: Decimal,
  pub cash_remaining: Decimal,
  pub allocation_percentage: f64,
}

impl OptionAllocationSet {
  fn new(portfolio_value: Decimal, allocations: Vec<OptionAllocation>) -> Self {
    let total_allocated: Decimal = allocations.iter().map(|a| a.dollar_allocation).sum();
    Self {
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
}

struct Proposal {
  allocation: OptionAllocation,
  /// Unrounded `premium * CONTRACT_SIZE`; `contract_cost` is its
  /// cent-truncated report value.
  unit_cost: Decimal,
  floor: Decimal,
}

impl Budgeted for Proposal {
  fn rank(&self) -> f64 {
    self.allocation.kelly_fraction
  }

  fn requested(&self) -> Decimal {
    self.allocation.dollar_allocation
  }

  fn floor(&self) -> Decimal {
    self.floor
  }

  fn grant(&mut self, dollars: Decimal) -> bool {
    let contracts = whole_units(dollars, self.unit_cost);
    self.allocation.dollar_allocation = dollars;
    self.allocation.contracts_to_buy = contracts;
    contracts > 0
  }
}

/// Sizes screened call candidates.
#[derive(Debug, Clone)]
pub struct OptionsAllocationBuilder {
  model: OptionsRiskModel,
  estimator: ProbabilityEstimator,
  config: OptionsConfig,
  lookback_days: usize,
  risk_free_rate: f64,
  periods_per_year: f64,
}

impl OptionsAllocationBuilder {
  /// Create a builder from config.
  pub fn new(config: &AppConfig) -> Self {
    let est = &config.estimation;
    Self {
      model: OptionsRiskModel::new(config.options.clone(), est.periods_per_year),
      estimator: ProbabilityEstimator::new(est.clone()),
      config: config.options.clone(),
      lookback_days: est.lookback_days,
      risk_free_rate: est.risk_free_rate,
      periods_per_year: est.periods_per_year,
    }
  }

  pub fn model(&self) -> &OptionsRiskModel {
    &self.model
  }

  /// Size every candidate, then clip against the portfolio budget in
  /// Kelly order. May return an empty set.
  pub fn build(
    &self,
    candidates: &[OptionCandidate],
    portfolio_value: f64,
    scaling_factor: f64,
  ) -> OptionAllocationSet {
    let proposals: Vec<Proposal> = candidates
      .par_iter()
      .filter_map(|c| match self.propose(c, portfolio_value, scaling_factor) {
        Ok(p) => p,
        Err(e) => {
          debug!(ticker = %c.ticker, strike = c.strike, error = %e, "Option skipped");
          None
        },
      })
      .collect();

    let budget = to_money(portfolio_value);
    let allocations: Vec<OptionAllocation> = allocate_budget(proposals, budget)
      .into_iter()
      .map(|p| p.allocation)
      .collect();

    let set = OptionAllocationSet::new(budget, allocations);
    info!(
      positions = set.len(),
      total = %set.total_allocated,
      pct = set.allocation_percentage,
      "Options allocation built"
    );
    set
  }

  fn propose(
    &self,
    c: &OptionCandidate,
    portfolio_value: f64,
    scaling_factor: f64,
  ) -> Result<Option<Proposal>> {
    let volatility = self
      .estimator
      .estimate(&c.ticker, &c.underlying_history, self.lookback_days, false)?
      .volatility;

    let days = c.days_to_expiry as f64;
    let sizing = self
      .model
      .size(c.underlying_price, c.strike, c.premium, days, volatility, scaling_factor)?;
    if sizing.kelly_fraction <= 0.0 {
      return Ok(None);
    }

    let cap = self.config.max_position_fraction * portfolio_value;
    let dollars = (sizing.scaled_fraction * portfolio_value).min(cap);
    let Some(unit_cost) = Decimal::from_f64(c.premium * CONTRACT_SIZE) else {
      return Ok(None);
    };
    let requested = to_money(dollars);
    let contracts = whole_units(requested, unit_cost);
    if !(dollars > self.config.min_allocation) || contracts == 0 {
      return Ok(None);
    }

    let greeks = compute_greeks(
      c.underlying_price,
      c.strike,
      days,
      self.risk_free_rate,
      volatility * self.periods_per_year.sqrt(),
      OptionSide::Call,
    )
    .ok();

    let window = |m: f64| move_probability(m, volatility, days, self.periods_per_year).unwrap_or(0.0);

    Ok(Some(Proposal {
      allocation: OptionAllocation {
        ticker: c.ticker.clone(),
        underlying_price: c.underlying_price,
        strike: c.strike,
        premium: c.premium,
        expiry: c.expiry,
        days_to_expiry: c.days_to_expiry,
        contracts_to_buy: contracts,
        dollar_allocation: requested,
        contract_cost: to_money(c.premium * CONTRACT_SIZE),
        kelly_fraction: sizing.kelly_fraction,
        scaled_fraction: sizing.scaled_fraction,
        win_probability: sizing.win_probability,
        potential_gain: sizing.potential_gain,
        max_loss: sizing.max_loss,
        volatility,
        greeks,
        move_returns: MoveReturns::new(c.underlying_price, c.strike, c.premium),
        move_probabilities: MoveProbabilities {
          prob_25: window(0.25),
          prob_50: window(0.50),
          prob_100: window(1.00),
        },
        screening_score: c.score,
      },
      unit_cost,
      floor: to_money(self.config.min_allocation),
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::PriceHistory;
  use rust_decimal_macros::dec;

  const SWINGING: [f64; 5] = [0.6, 0.6, 0.6, -0.4, -0.4];

  fn history_from_pattern(pattern: &[f64], periods: usize) -> PriceHistory {
    let mut closes = vec![2.0];
    for i in 0..periods {
      let last = closes[closes.len() - 1];
      closes.push(last * (1.0 + pattern[i % pattern.len()]));
    }
    PriceHistory::from_closes(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), &closes)
  }

  fn candidate(ticker: &str, strike: f64, premium: f64, days: i64) -> OptionCandidate {
    OptionCandidate {
      ticker: ticker.to_string(),
      underlying_price: 2.0,
      strike,
      premium,
      expiry: NaiveDate::from_ymd_opt(2024, 8, 30).unwrap(),
      days_to_expiry: days,
      open_interest: 100,
      score: 65,
      reasons: vec!["Ultra leverage".to_string()],
      underlying_history: history_from_pattern(&SWINGING, 60),
    }
  }

  fn builder() -> OptionsAllocationBuilder {
    OptionsAllocationBuilder::new(&AppConfig::default())
  }

  #[test]
  fn test_sizes_quarter_kelly_call() {
    let set = builder().build(&[candidate("VOL", 2.0, 0.05, 60)], 1000.0, 0.25);
    assert_eq!(set.len(), 1);

    let a = &set.allocations[0];
    assert_eq!(a.contract_cost, dec!(5));
    assert!(a.dollar_allocation > dec!(5) && a.dollar_allocation <= dec!(50));
    assert_eq!(a.contracts_to_buy, whole_units(a.dollar_allocation, dec!(5)));
    assert!(a.contracts_to_buy > 0);
    assert!((a.potential_gain - 10.0).abs() < 1e-9);
    assert!(a.greeks.is_some());
    assert!(a.move_probabilities.prob_25 > a.move_probabilities.prob_100);
    assert_eq!(a.screening_score, 65);
  }

  #[test]
  fn test_zero_day_option_is_skipped() {
    let set = builder().build(&[candidate("VOL", 2.0, 0.05, 0)], 1000.0, 0.25);
    assert!(set.is_empty());
  }

  #[test]
  fn test_out_of_money_call_gets_nothing() {
    let set = builder().build(&[candidate("VOL", 10.0, 0.05, 60)], 1000.0, 0.25);
    assert!(set.is_empty());
  }

  #[test]
  fn test_capped_dollars_at_floor_are_dropped() {
    // A $100 portfolio caps the line at exactly $5, which buys five $1
    // contracts but does not clear the $5 minimum.
    let cheap = candidate("VOL", 2.0, 0.01, 60);
    assert!(builder().build(std::slice::from_ref(&cheap), 100.0, 1.0).is_empty());

    let set = builder().build(&[cheap], 1000.0, 1.0);
    assert_eq!(set.len(), 1);
    assert!(set.allocations[0].dollar_allocation > dec!(5));
  }

  #[test]
  fn test_sub_cent_premium_never_overspends() {
    let set = builder().build(&[candidate("VOL", 1.0, 0.125099, 60)], 1000.0, 1.0);
    assert_eq!(set.len(), 1);

    let a = &set.allocations[0];
    assert_eq!(a.dollar_allocation, dec!(50));
    assert_eq!(a.contract_cost, dec!(12.50));
    assert_eq!(a.contracts_to_buy, 3);
    let spend = a.contracts_to_buy as f64 * a.premium * CONTRACT_SIZE;
    assert!(spend <= 50.0, "contracts cost {spend}");
  }

  #[test]
  fn test_full_kelly_is_capped_per_contract_line() {
    let set = builder().build(&[candidate("VOL", 2.0, 0.05, 60)], 1000.0, 1.0);
    let a = &set.allocations[0];
    assert_eq!(a.dollar_allocation, dec!(50));
    assert_eq!(a.contracts_to_buy, 10);
  }

  #[test]
  fn test_total_never_exceeds_budget() {
    let candidates: Vec<OptionCandidate> =
      (0..30).map(|i| candidate(&format!("O{i}"), 2.0, 0.05, 60)).collect();
    let set = builder().build(&candidates, 1000.0, 1.0);
    assert_eq!(set.len(), 20);
    assert_eq!(set.total_allocated, dec!(1000));
    assert_eq!(set.cash_remaining, Decimal::ZERO);
    assert_eq!(set.allocations[0].ticker, "O0");
  }
}
