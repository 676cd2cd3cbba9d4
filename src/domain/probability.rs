//! Win/loss probability estimation from price history.
//!
//! Turns a trailing price window into the inputs the Kelly engine
//! needs: win probability `p`, average gain `g`, average loss `l`,
//! plus volatility, Sharpe, total return and maximum drawdown.
//!
//! Confidence mode adds a Wald interval for `p` and sample-size
//! confidence factors for each estimated quantity. The factors are
//! heuristics, `min(ceiling, floor + (n / scale) * slope)`, with all
//! constants taken from [`EstimationConfig`].

use serde::{Deserialize, Serialize};

use super::error::{EngineError, Result};
use super::kelly::kelly_fraction;
use super::market::{PriceHistory, ReturnSeries};
use super::stats::{compounded, max_drawdown, mean, norm_ppf, sample_std};
use crate::config::EstimationConfig;

/// Wald confidence interval for the win probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub margin_of_error: f64,
    pub confidence_level: f64,
}

/// Sample-size confidence attached to an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimateConfidence {
    /// Confidence in `p`, driven by the total sample count.
    pub win_probability: f64,
    /// Confidence in `g`, driven by the number of positive periods.
    pub avg_gain: f64,
    /// Confidence in `l`, driven by the number of negative periods.
    pub avg_loss: f64,
    pub interval: ConfidenceInterval,
}

/// Point estimates for one asset over one lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityEstimate {
    pub ticker: String,
    /// Fraction of periods with a positive return.
    pub win_probability: f64,
    /// Mean positive return.
    pub avg_gain: f64,
    /// Mean absolute negative return.
    pub avg_loss: f64,
    /// Full Kelly fraction for `(p, g, l)`.
    pub kelly_fraction: f64,
    /// Sample standard deviation of returns (per period).
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub total_return: f64,
    /// Worst peak-to-trough decline, as a non-positive fraction.
    pub max_drawdown: f64,
    /// Number of returns used.
    pub sample_size: usize,
    pub confidence: Option<EstimateConfidence>,
}

/// Estimates win/loss parameters from price or return history.
#[derive(Debug, Clone, Default)]
pub struct ProbabilityEstimator {
    config: EstimationConfig,
}

impl ProbabilityEstimator {
    pub fn new(config: EstimationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimationConfig {
        &self.config
    }

    /// Estimates from the trailing `lookback_days` points of `history`.
    ///
    /// # Errors
    /// `InsufficientData` when the window holds fewer than `min_samples`
    /// points; `DegenerateDistribution` when there are no positive or no
    /// negative returns.
    pub fn estimate(
        &self,
        ticker: &str,
        history: &PriceHistory,
        lookback_days: usize,
        with_confidence: bool,
    ) -> Result<ProbabilityEstimate> {
        let window = history.tail(lookback_days);
        if window.len() < self.config.min_samples {
            return Err(EngineError::insufficient_data(
                self.config.min_samples,
                window.len(),
            ));
        }

        let closes = window.closes();
        let returns = ReturnSeries::from_closes(&closes);
        self.estimate_from_parts(
            ticker,
            &returns,
            window.total_return(),
            max_drawdown(&closes),
            with_confidence,
        )
    }

    /// Estimates directly from a return series.
    ///
    /// Total return and drawdown are taken from the compounded path.
    ///
    /// `min_samples` counts price points here too: `n` returns stand for
    /// `n + 1` closes.
    ///
    /// # Errors
    /// Same as [`ProbabilityEstimator::estimate`].
    pub fn estimate_returns(
        &self,
        ticker: &str,
        returns: &ReturnSeries,
        with_confidence: bool,
    ) -> Result<ProbabilityEstimate> {
        let points = returns.len() + 1;
        if points < self.config.min_samples {
            return Err(EngineError::insufficient_data(self.config.min_samples, points));
        }

        let mut path = vec![1.0];
        path.extend(compounded(returns.as_slice()));
        let total_return = path.last().copied().unwrap_or(1.0) - 1.0;
        self.estimate_from_parts(
            ticker,
            returns,
            total_return,
            max_drawdown(&path),
            with_confidence,
        )
    }

    /// Wald interval for the win probability of `returns`.
    pub fn confidence_interval(&self, returns: &ReturnSeries) -> ConfidenceInterval {
        let level = self.config.confidence_level;
        let n = returns.len();
        if n == 0 {
            return ConfidenceInterval {
                lower: 0.0,
                upper: 1.0,
                margin_of_error: 1.0,
                confidence_level: level,
            };
        }

        let p_hat = returns.gains().count() as f64 / n as f64;
        let se = (p_hat * (1.0 - p_hat) / n as f64).sqrt();
        let z = norm_ppf((1.0 + level) / 2.0);
        let margin = z * se;

        ConfidenceInterval {
            lower: (p_hat - margin).max(0.0),
            upper: (p_hat + margin).min(1.0),
            margin_of_error: margin,
            confidence_level: level,
        }
    }

    /// Sample-size confidence heuristic for `count` observations.
    pub fn sample_confidence(&self, count: usize, scale: f64) -> f64 {
        let c = &self.config;
        (c.confidence_floor + (count as f64 / scale) * c.confidence_slope).min(c.confidence_ceiling)
    }

    fn estimate_from_parts(
        &self,
        ticker: &str,
        returns: &ReturnSeries,
        total_return: f64,
        max_drawdown: f64,
        with_confidence: bool,
    ) -> Result<ProbabilityEstimate> {
        let values = returns.as_slice();
        let n = values.len();
        if n == 0 {
            return Err(EngineError::insufficient_data(self.config.min_samples, 0));
        }

        let gains: Vec<f64> = returns.gains().collect();
        let losses: Vec<f64> = returns.losses().collect();
        if gains.is_empty() {
            return Err(EngineError::degenerate("no positive returns in window"));
        }
        if losses.is_empty() {
            return Err(EngineError::degenerate("no negative returns in window"));
        }

        let p = gains.len() as f64 / n as f64;
        let g = mean(&gains);
        let l = mean(&losses).abs();

        let volatility = sample_std(values);
        let period_rf = self.config.risk_free_rate / self.config.periods_per_year;
        let sharpe_ratio = if volatility > 0.0 {
            (mean(values) - period_rf) / volatility
        } else {
            0.0
        };

        let confidence = with_confidence.then(|| EstimateConfidence {
            win_probability: self.sample_confidence(n, self.config.win_sample_scale),
            avg_gain: self.sample_confidence(gains.len(), self.config.payoff_sample_scale),
            avg_loss: self.sample_confidence(losses.len(), self.config.payoff_sample_scale),
            interval: self.confidence_interval(returns),
        });

        Ok(ProbabilityEstimate {
            ticker: ticker.to_string(),
            win_probability: p,
            avg_gain: g,
            avg_loss: l,
            kelly_fraction: kelly_fraction(p, g, l),
            volatility,
            sharpe_ratio,
            total_return,
            max_drawdown,
            sample_size: n,
            confidence,
        })
    }
}
