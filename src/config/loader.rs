//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    strategy = ?config.allocation.strategy,
    portfolio_value = config.allocation.portfolio_value,
    scaling = config.kelly.scaling_factor,
    lookback = config.estimation.lookback_days,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Positive numeric values where required
/// - Valid fraction ranges (0..1]
/// - Ordered holding bounds
/// - Positive score weights
pub fn validate_config(config: &AppConfig) -> Result<()> {
  let est = &config.estimation;
  anyhow::ensure!(
    est.min_samples >= 2,
    "estimation.min_samples must be at least 2, got {}",
    est.min_samples
  );
  anyhow::ensure!(
    est.lookback_days >= est.min_samples,
    "estimation.lookback_days ({}) must be >= min_samples ({})",
    est.lookback_days,
    est.min_samples
  );
  anyhow::ensure!(
    est.confidence_level > 0.0 && est.confidence_level < 1.0,
    "estimation.confidence_level must be in (0, 1), got {}",
    est.confidence_level
  );
  anyhow::ensure!(
    est.confidence_floor >= 0.0 && est.confidence_floor <= est.confidence_ceiling,
    "estimation.confidence_floor must be in [0, confidence_ceiling]"
  );
  anyhow::ensure!(
    est.confidence_ceiling <= 1.0,
    "estimation.confidence_ceiling must be <= 1, got {}",
    est.confidence_ceiling
  );
  anyhow::ensure!(
    est.win_sample_scale > 0.0 && est.payoff_sample_scale > 0.0,
    "estimation sample scales must be positive"
  );
  anyhow::ensure!(
    est.periods_per_year > 0.0,
    "estimation.periods_per_year must be positive"
  );

  // Kelly validation
  anyhow::ensure!(
    config.kelly.risk_aversion >= 0.0,
    "kelly.risk_aversion must be non-negative, got {}",
    config.kelly.risk_aversion
  );
  anyhow::ensure!(
    config.kelly.scaling_factor > 0.0 && config.kelly.scaling_factor <= 1.0,
    "kelly.scaling_factor must be in (0, 1], got {}",
    config.kelly.scaling_factor
  );
  anyhow::ensure!(
    config.kelly.options_scaling_factor > 0.0 && config.kelly.options_scaling_factor <= 1.0,
    "kelly.options_scaling_factor must be in (0, 1], got {}",
    config.kelly.options_scaling_factor
  );

  // Scoring validation
  let s = &config.scoring;
  anyhow::ensure!(
    s.kelly_weight > 0.0 && s.sortino_weight > 0.0 && s.calmar_weight > 0.0,
    "scoring weights must be positive"
  );
  anyhow::ensure!(
    s.kelly_normalizer > 0.0 && s.sortino_normalizer > 0.0 && s.calmar_normalizer > 0.0,
    "scoring normalizers must be positive"
  );

  // Allocation validation
  let a = &config.allocation;
  anyhow::ensure!(
    a.portfolio_value > 0.0,
    "allocation.portfolio_value must be positive, got {}",
    a.portfolio_value
  );
  anyhow::ensure!(
    a.max_position_fraction > 0.0 && a.max_position_fraction <= 1.0,
    "allocation.max_position_fraction must be in (0, 1], got {}",
    a.max_position_fraction
  );
  anyhow::ensure!(
    a.min_allocation >= 0.0,
    "allocation.min_allocation must be non-negative"
  );
  anyhow::ensure!(
    a.max_positions > 0,
    "allocation.max_positions must be positive"
  );

  // Options validation
  let o = &config.options;
  anyhow::ensure!(
    o.max_position_fraction > 0.0 && o.max_position_fraction <= 1.0,
    "options.max_position_fraction must be in (0, 1], got {}",
    o.max_position_fraction
  );
  anyhow::ensure!(o.target_move > 0.0, "options.target_move must be positive");
  anyhow::ensure!(
    o.max_premium_fraction > 0.0,
    "options.max_premium_fraction must be positive"
  );

  // Holding validation
  let h = &config.holding;
  anyhow::ensure!(
    h.min_days > 0.0 && h.min_days <= h.max_days,
    "holding bounds must satisfy 0 < min_days <= max_days"
  );
  anyhow::ensure!(
    h.base_days > 0.0,
    "holding.base_days must be positive"
  );

  Ok(())
}
