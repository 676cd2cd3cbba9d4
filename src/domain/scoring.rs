//! Unified risk-reward scoring.
//!
//! Blends three views of the same return history into one ranking
//! value in `[0, 1]`:
//! - Kelly: position sizing edge (confidence-weighted)
//! - Sortino: return per unit of downside deviation
//! - Calmar: annualized growth per unit of maximum drawdown

use serde::{Deserialize, Serialize};

use super::error::Result;
use super::kelly::KellyEngine;
use super::market::PriceHistory;
use super::probability::ProbabilityEstimator;
use super::stats::{compounded, max_drawdown, mean};
use crate::config::{EstimationConfig, ScoringConfig};

/// Sortino ratio of a per-period return series.
///
/// The annual risk-free rate is converted to a per-period rate by
/// compounding: `(1 + rf)^(1 / periods_per_year) - 1`. Returns 0 for an
/// empty series or zero downside deviation.
pub fn sortino_ratio(returns: &[f64], target: f64, annual_rf: f64, periods_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }

    let period_rf = (1.0 + annual_rf).powf(1.0 / periods_per_year) - 1.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - period_rf).collect();

    let downside_sq: Vec<f64> = excess
        .iter()
        .map(|e| (e - target).min(0.0).powi(2))
        .collect();
    let downside_deviation = mean(&downside_sq).sqrt();

    if downside_deviation > 0.0 {
        mean(&excess) / downside_deviation
    } else {
        0.0
    }
}

/// Calmar ratio: CAGR over the absolute maximum drawdown of the
/// compounded return path.
///
/// CAGR annualizes the total compounded return over
/// `lookback_days / periods_per_year` years. Returns 0 when the path is
/// empty, the window is non-positive, or there is no drawdown.
pub fn calmar_ratio(returns: &[f64], lookback_days: usize, periods_per_year: f64) -> f64 {
    let path = compounded(returns);
    let Some(&last) = path.last() else {
        return 0.0;
    };

    let years = lookback_days as f64 / periods_per_year;
    let cagr = if years > 0.0 {
        last.powf(1.0 / years) - 1.0
    } else {
        0.0
    };

    let drawdown = max_drawdown(&path).abs();
    if drawdown > 0.0 { cagr / drawdown } else { 0.0 }
}

/// Unified score and its components for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedScore {
    pub ticker: String,
    /// Weighted sum of the three sub-scores.
    pub unified_score: f64,
    pub kelly_score: f64,
    pub sortino_score: f64,
    pub calmar_score: f64,
    /// Confidence-weighted Kelly fraction.
    pub kelly_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub sharpe_ratio: f64,
    /// `kelly_ratio * unified_score`.
    pub risk_adjusted_kelly: f64,
    pub volatility: f64,
    pub avg_return: f64,
    /// Non-positive peak-to-trough decline of the price window.
    pub max_drawdown: f64,
    pub win_probability: f64,
    pub avg_gain: f64,
    pub avg_loss: f64,
    pub confidence_factor: f64,
    pub sample_size: usize,
}

/// Computes [`UnifiedScore`]s from price histories.
#[derive(Debug, Clone, Default)]
pub struct UnifiedRiskRewardScorer {
    estimator: ProbabilityEstimator,
    kelly: KellyEngine,
    scoring: ScoringConfig,
}

impl UnifiedRiskRewardScorer {
    pub fn new(estimation: EstimationConfig, kelly: KellyEngine, scoring: ScoringConfig) -> Self {
        Self {
            estimator: ProbabilityEstimator::new(estimation),
            kelly,
            scoring,
        }
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Normalized Kelly, Sortino and Calmar sub-scores, each in `[0, 1]`.
    pub fn normalize(&self, kelly: f64, sortino: f64, calmar: f64) -> (f64, f64, f64) {
        let s = &self.scoring;
        (
            clip_unit(kelly * s.kelly_normalizer),
            clip_unit(sortino / s.sortino_normalizer),
            clip_unit(calmar / s.calmar_normalizer),
        )
    }

    /// Configured weighted sum of the sub-scores.
    pub fn unified_score(&self, kelly_score: f64, sortino_score: f64, calmar_score: f64) -> f64 {
        let s = &self.scoring;
        s.kelly_weight * kelly_score + s.sortino_weight * sortino_score + s.calmar_weight * calmar_score
    }

    /// Scores the trailing `lookback_days` of `history`.
    ///
    /// `risk_free_rate` is annual and applies to both the Sharpe and the
    /// Sortino calculation.
    ///
    /// # Errors
    /// Propagates estimation failures (insufficient data, degenerate
    /// distribution).
    pub fn score(
        &self,
        ticker: &str,
        history: &PriceHistory,
        lookback_days: usize,
        risk_free_rate: f64,
    ) -> Result<UnifiedScore> {
        let mut estimation = self.estimator.config().clone();
        estimation.risk_free_rate = risk_free_rate;
        let periods_per_year = estimation.periods_per_year;
        let estimator = ProbabilityEstimator::new(estimation);

        let estimate = estimator.estimate(ticker, history, lookback_days, true)?;
        let returns = history.tail(lookback_days).returns();
        let values = returns.as_slice();

        let sortino = sortino_ratio(values, 0.0, risk_free_rate, periods_per_year);
        let calmar = calmar_ratio(values, lookback_days, periods_per_year);

        let (kelly_ratio, confidence_factor) = self
            .kelly
            .from_estimate(&estimate)
            .map_or((0.0, 0.0), |k| (k.confidence_weighted_kelly, k.confidence_factor));

        let (kelly_score, sortino_score, calmar_score) = self.normalize(kelly_ratio, sortino, calmar);
        let unified_score = self.unified_score(kelly_score, sortino_score, calmar_score);

        Ok(UnifiedScore {
            ticker: ticker.to_string(),
            unified_score,
            kelly_score,
            sortino_score,
            calmar_score,
            kelly_ratio,
            sortino_ratio: sortino,
            calmar_ratio: calmar,
            sharpe_ratio: estimate.sharpe_ratio,
            risk_adjusted_kelly: kelly_ratio * unified_score,
            volatility: estimate.volatility,
            avg_return: mean(values),
            max_drawdown: estimate.max_drawdown,
            win_probability: estimate.win_probability,
            avg_gain: estimate.avg_gain,
            avg_loss: estimate.avg_loss,
            confidence_factor,
            sample_size: estimate.sample_size,
        })
    }
}

fn clip_unit(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn history_from_pattern(pattern: &[f64], periods: usize) -> PriceHistory {
        let mut closes = vec![10.0];
        for i in 0..periods {
            let last = closes[closes.len() - 1];
            closes.push(last * (1.0 + pattern[i % pattern.len()]));
        }
        PriceHistory::from_closes(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), &closes)
    }

    #[test]
    fn test_sortino_without_downside_is_zero() {
        assert_eq!(sortino_ratio(&[0.01; 20], 0.0, 0.05, 252.0), 0.0);
        assert_eq!(sortino_ratio(&[], 0.0, 0.05, 252.0), 0.0);
    }

    #[test]
    fn test_sortino_sign_follows_mean_excess() {
        let good = [0.02, 0.02, 0.02, -0.01, -0.01];
        let bad = [0.01, -0.02, -0.02, 0.01, -0.02];
        assert!(sortino_ratio(&good, 0.0, 0.05, 252.0) > 0.0);
        assert!(sortino_ratio(&bad, 0.0, 0.05, 252.0) < 0.0);
    }

    #[test]
    fn test_sortino_zero_rate() {
        // excess = returns; downside = sqrt((0.01^2) / 2)
        let r = [0.03, -0.01];
        let expected = 0.01 / (0.0001_f64 / 2.0).sqrt();
        assert_relative_eq!(sortino_ratio(&r, 0.0, 0.0, 252.0), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_calmar_one_year() {
        // path: 1.1, 0.99, 1.188 -> total 18.8%, drawdown 10%
        let r = [0.1, -0.1, 0.2];
        assert_relative_eq!(calmar_ratio(&r, 252, 252.0), 0.188 / 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_calmar_without_drawdown_is_zero() {
        assert_eq!(calmar_ratio(&[0.01, 0.02, 0.01], 252, 252.0), 0.0);
        assert_eq!(calmar_ratio(&[], 252, 252.0), 0.0);
        assert_eq!(calmar_ratio(&[0.1, -0.1], 0, 252.0), 0.0);
    }

    #[test]
    fn test_unified_score_for_trending_asset() {
        let history = history_from_pattern(&[0.02, 0.02, 0.02, -0.01, -0.01], 60);
        let score = UnifiedRiskRewardScorer::default()
            .score("UP", &history, 252, 0.05)
            .unwrap();

        assert_relative_eq!(score.kelly_score, 1.0);
        assert_relative_eq!(score.calmar_score, 1.0);
        assert!(score.sortino_score > 0.0 && score.sortino_score < 1.0);
        assert_relative_eq!(
            score.unified_score,
            0.4 * score.kelly_score + 0.3 * score.sortino_score + 0.3 * score.calmar_score,
            epsilon = 1e-12
        );
        assert_relative_eq!(score.risk_adjusted_kelly, score.kelly_ratio * score.unified_score);
        assert!(score.unified_score > 0.1);
        assert_eq!(score.sample_size, 60);
    }

    #[test]
    fn test_unified_score_for_losing_asset() {
        let history = history_from_pattern(&[0.01, -0.02, -0.02, 0.01, -0.02], 60);
        let score = UnifiedRiskRewardScorer::default()
            .score("DOWN", &history, 252, 0.05)
            .unwrap();
        assert_eq!(score.kelly_score, 0.0);
        assert_eq!(score.sortino_score, 0.0);
        assert_eq!(score.calmar_score, 0.0);
        assert_eq!(score.unified_score, 0.0);
    }

    #[test]
    fn test_scoring_propagates_estimation_failure() {
        let history = history_from_pattern(&[0.02, -0.01], 5);
        assert!(UnifiedRiskRewardScorer::default()
            .score("SHORT", &history, 252, 0.05)
            .is_err());
    }

    #[test]
    fn test_normalize_clips_to_unit_interval() {
        let scorer = UnifiedRiskRewardScorer::default();
        assert_eq!(scorer.normalize(-1.0, -5.0, f64::NAN), (0.0, 0.0, 0.0));
        assert_eq!(scorer.normalize(5.0, 50.0, 50.0), (1.0, 1.0, 1.0));
        let (k, s, c) = scorer.normalize(0.05, 1.0, 1.5);
        assert_relative_eq!(k, 0.5);
        assert_relative_eq!(s, 0.5);
        assert_relative_eq!(c, 0.5);
    }
}
