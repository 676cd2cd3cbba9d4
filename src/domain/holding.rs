//! Holding period advice.
//!
//! Maps an asset's unified risk metrics to a suggested holding
//! duration in trading periods, plus the rebalancing cadence, risk
//! label and stop/take-profit band that go with that duration.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::scoring::UnifiedScore;
use crate::config::HoldingConfig;

/// How often a position should be reviewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebalancingFrequency {
    Intraday,
    Daily,
    EveryOneToTwoDays,
    EveryTwoToThreeDays,
    Weekly,
}

impl fmt::Display for RebalancingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Intraday => "Intraday",
            Self::Daily => "Daily",
            Self::EveryOneToTwoDays => "Every 1-2 days",
            Self::EveryTwoToThreeDays => "Every 2-3 days",
            Self::Weekly => "Weekly",
        };
        f.write_str(label)
    }
}

/// Risk label implied by a short or long holding period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    UltraHigh,
    High,
    MediumHigh,
    Medium,
    MediumLow,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::UltraHigh => "Ultra-High",
            Self::High => "High",
            Self::MediumHigh => "Medium-High",
            Self::Medium => "Medium",
            Self::MediumLow => "Medium-Low",
        };
        f.write_str(label)
    }
}

/// Stop-loss and take-profit band, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitStrategy {
    pub stop_loss_pct: (f64, f64),
    pub take_profit_pct: (f64, f64),
}

impl ExitStrategy {
    const fn new(stop: (f64, f64), take: (f64, f64)) -> Self {
        Self {
            stop_loss_pct: stop,
            take_profit_pct: take,
        }
    }
}

impl fmt::Display for ExitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stop {}-{}%, take profit {}-{}%",
            self.stop_loss_pct.0, self.stop_loss_pct.1, self.take_profit_pct.0, self.take_profit_pct.1
        )
    }
}

/// Individual multipliers applied to the base holding period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldingFactors {
    pub unified: f64,
    pub volatility: f64,
    pub drawdown: f64,
    pub calmar: f64,
    pub sortino: f64,
}

impl HoldingFactors {
    pub fn product(&self) -> f64 {
        self.unified * self.volatility * self.drawdown * self.calmar * self.sortino
    }
}

/// Suggested holding plan for one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingPlan {
    /// Trading periods, within the configured bounds.
    pub holding_days: f64,
    pub rebalancing: RebalancingFrequency,
    pub risk_level: RiskLevel,
    pub exit_strategy: ExitStrategy,
    pub factors: HoldingFactors,
}

/// Turns risk metrics into a [`HoldingPlan`].
#[derive(Debug, Clone, Default)]
pub struct HoldingPeriodAdvisor {
    config: HoldingConfig,
}

impl HoldingPeriodAdvisor {
    pub fn new(config: HoldingConfig) -> Self {
        Self { config }
    }

    /// Holding plan from raw metrics.
    ///
    /// `volatility` is per period. `max_drawdown` may be given signed or
    /// absolute; only its magnitude is used.
    pub fn advise(
        &self,
        unified_score: f64,
        volatility: f64,
        max_drawdown: f64,
        calmar: f64,
        sortino: f64,
    ) -> HoldingPlan {
        let factors = HoldingFactors {
            unified: bounded_factor(1.0 + (unified_score - 0.5) * 0.4, 0.8, 1.2),
            volatility: bounded_factor(1.0 - (volatility - 0.05) * 10.0, 0.5, 1.5),
            drawdown: bounded_factor(1.0 - max_drawdown.abs() * 0.8, 0.3, 1.2),
            calmar: bounded_factor(1.0 + (calmar - 1.0) * 0.2, 0.6, 1.4),
            sortino: bounded_factor(1.0 + (sortino - 0.5) * 0.4, 0.7, 1.3),
        };

        let raw = self.config.base_days * factors.product();
        let holding_days = if raw.is_finite() {
            raw.clamp(self.config.min_days, self.config.max_days)
        } else {
            self.config.base_days.clamp(self.config.min_days, self.config.max_days)
        };

        let (rebalancing, risk_level, exit_strategy) = labels(holding_days);
        HoldingPlan {
            holding_days,
            rebalancing,
            risk_level,
            exit_strategy,
            factors,
        }
    }

    pub fn advise_score(&self, score: &UnifiedScore) -> HoldingPlan {
        self.advise(
            score.unified_score,
            score.volatility,
            score.max_drawdown,
            score.calmar_ratio,
            score.sortino_ratio,
        )
    }
}

/// Neutral 1.0 for non-finite input.
fn bounded_factor(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_finite() { value.clamp(lo, hi) } else { 1.0 }
}

fn labels(days: f64) -> (RebalancingFrequency, RiskLevel, ExitStrategy) {
    use RebalancingFrequency as F;
    use RiskLevel as R;

    if days <= 1.0 {
        (F::Intraday, R::UltraHigh, ExitStrategy::new((1.0, 2.0), (3.0, 5.0)))
    } else if days <= 2.0 {
        (F::Daily, R::High, ExitStrategy::new((2.0, 3.0), (5.0, 10.0)))
    } else if days <= 3.0 {
        (F::EveryOneToTwoDays, R::MediumHigh, ExitStrategy::new((3.0, 5.0), (8.0, 12.0)))
    } else if days <= 5.0 {
        (F::EveryTwoToThreeDays, R::Medium, ExitStrategy::new((4.0, 6.0), (10.0, 15.0)))
    } else {
        (F::Weekly, R::MediumLow, ExitStrategy::new((5.0, 8.0), (12.0, 18.0)))
    }
}
