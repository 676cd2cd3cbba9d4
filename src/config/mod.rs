//! Configuration Module - TOML-based Engine Configuration
//!
//! Loads and validates configuration from `config.toml`.
//! Every weight, cap, scaling factor and estimation heuristic lives
//! here and is handed to the components as an immutable value -
//! nothing is read from globals during evaluation.

pub mod loader;

use serde::Deserialize;

use crate::usecases::allocation::AllocationStrategy;

/// Top-level engine configuration.
///
/// Loaded once from `config.toml` at startup. Every section has
/// defaults, so a partial file (or none at all) is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Process settings (logging, data snapshot).
  pub engine: EngineConfig,
  /// Probability estimation parameters.
  pub estimation: EstimationConfig,
  /// Kelly sizing parameters.
  pub kelly: KellyConfig,
  /// Unified score weights and normalizers.
  pub scoring: ScoringConfig,
  /// Equity allocation limits.
  pub allocation: AllocationConfig,
  /// Options screening and sizing limits.
  pub options: OptionsConfig,
  /// Holding period bounds.
  pub holding: HoldingConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Log level (trace, debug, info, warn, error).
  pub log_level: String,
  /// JSON snapshot with pre-fetched market data.
  pub snapshot_path: String,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      log_level: "info".to_string(),
      snapshot_path: "data/snapshot.json".to_string(),
    }
  }
}

/// Probability estimation parameters.
///
/// The confidence factor heuristic is
/// `min(ceiling, floor + (n / scale) * slope)`, with `scale` set to
/// `win_sample_scale` for the win probability and `payoff_sample_scale`
/// for average gain/loss.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
  /// Trailing window of price points used for estimation.
  pub lookback_days: usize,
  /// Minimum number of price points required.
  pub min_samples: usize,
  /// Annual risk-free rate.
  pub risk_free_rate: f64,
  /// Two-sided confidence level for the win-probability interval.
  pub confidence_level: f64,
  pub confidence_floor: f64,
  pub confidence_slope: f64,
  pub confidence_ceiling: f64,
  pub win_sample_scale: f64,
  pub payoff_sample_scale: f64,
  /// Trading periods per year used for annualization.
  pub periods_per_year: f64,
}

impl Default for EstimationConfig {
  fn default() -> Self {
    Self {
      lookback_days: 252,
      min_samples: 30,
      risk_free_rate: 0.05,
      confidence_level: 0.95,
      confidence_floor: 0.5,
      confidence_slope: 0.4,
      confidence_ceiling: 0.95,
      win_sample_scale: 1000.0,
      payoff_sample_scale: 500.0,
      periods_per_year: 252.0,
    }
  }
}

/// Kelly sizing parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KellyConfig {
  /// Risk aversion coefficient for confidence weighting.
  pub risk_aversion: f64,
  /// Fraction of Kelly used for equities (0.5 = half-Kelly).
  pub scaling_factor: f64,
  /// Fraction of Kelly used for options (0.25 = quarter-Kelly).
  pub options_scaling_factor: f64,
}

impl Default for KellyConfig {
  fn default() -> Self {
    Self {
      risk_aversion: 1.0,
      scaling_factor: 0.5,
      options_scaling_factor: 0.25,
    }
  }
}

/// Unified risk-reward score weights and normalizers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
  pub kelly_weight: f64,
  pub sortino_weight: f64,
  pub calmar_weight: f64,
  /// `kelly_score = clip(cw_kelly * kelly_normalizer, 0, 1)`.
  pub kelly_normalizer: f64,
  /// `sortino_score = clip(sortino / sortino_normalizer, 0, 1)`.
  pub sortino_normalizer: f64,
  /// `calmar_score = clip(calmar / calmar_normalizer, 0, 1)`.
  pub calmar_normalizer: f64,
  /// Minimum unified score for the unified strategy.
  pub min_unified_score: f64,
}

impl Default for ScoringConfig {
  fn default() -> Self {
    Self {
      kelly_weight: 0.4,
      sortino_weight: 0.3,
      calmar_weight: 0.3,
      kelly_normalizer: 10.0,
      sortino_normalizer: 2.0,
      calmar_normalizer: 3.0,
      min_unified_score: 0.1,
    }
  }
}

/// Equity allocation limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
  /// Portfolio value in dollars.
  pub portfolio_value: f64,
  /// Primary allocation strategy.
  pub strategy: AllocationStrategy,
  /// Per-position cap as fraction of portfolio.
  pub max_position_fraction: f64,
  /// Minimum dollar allocation per position.
  pub min_allocation: f64,
  /// Maximum positions in the equal-weight fallback.
  pub max_positions: usize,
}

impl Default for AllocationConfig {
  fn default() -> Self {
    Self {
      portfolio_value: 1000.0,
      strategy: AllocationStrategy::Unified,
      max_position_fraction: 0.20,
      min_allocation: 10.0,
      max_positions: 5,
    }
  }
}

/// Options screening and sizing limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OptionsConfig {
  /// Per-contract cap as fraction of portfolio.
  pub max_position_fraction: f64,
  /// Minimum dollar allocation per contract line.
  pub min_allocation: f64,
  /// Favorable underlying move the sizing is based on (0.25 = +25%).
  pub target_move: f64,
  /// Gain assumed when the target move leaves the contract out of the money.
  pub fallback_gain: f64,
  /// Longest expiry considered by the screener.
  pub max_expiry_days: i64,
  /// Number of nearest expiries scanned per ticker.
  pub max_expiries: usize,
  /// Open interest above which a contract counts as liquid.
  pub min_open_interest: u64,
  /// Largest premium accepted, as fraction of spot.
  pub max_premium_fraction: f64,
  /// Opportunities kept per ticker.
  pub top_per_ticker: usize,
  /// Minimum screening score.
  pub min_score: u32,
  /// Minimum payoff multiple on the target move.
  pub min_return_25: f64,
}

impl Default for OptionsConfig {
  fn default() -> Self {
    Self {
      max_position_fraction: 0.05,
      min_allocation: 5.0,
      target_move: 0.25,
      fallback_gain: 0.1,
      max_expiry_days: 90,
      max_expiries: 3,
      min_open_interest: 10,
      max_premium_fraction: 0.30,
      top_per_ticker: 3,
      min_score: 30,
      min_return_25: 0.5,
    }
  }
}

/// Holding period bounds (in trading periods).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HoldingConfig {
  pub base_days: f64,
  pub min_days: f64,
  pub max_days: f64,
}

impl Default for HoldingConfig {
  fn default() -> Self {
    Self {
      base_days: 1.5,
      min_days: 0.5,
      max_days: 7.0,
    }
  }
}
