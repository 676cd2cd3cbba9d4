//! Kelly Criterion position sizing.
//!
//! Single-asset Kelly from win probability and average gain/loss,
//! confidence-weighted and perturbed (conservative/optimistic)
//! variants, and the multi-asset matrix form `Σ⁻¹μ`.
//!
//! Full Kelly maximizes long-term growth rate but has high variance;
//! callers apply a scaling factor (half-Kelly for equities,
//! quarter-Kelly for options) before sizing.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::error::{EngineError, Result};
use super::market::ReturnSeries;
use super::probability::ProbabilityEstimate;
use super::stats::mean;

/// Full Kelly fraction for a win/loss bet.
///
/// Kelly formula:
///   f* = (b * p - q) / b
/// where:
///   p = probability of a winning period
///   q = 1 - p
///   b = g / l (average gain over average loss)
///
/// Returns 0 when `l` is zero, when the edge is negative, or when any
/// input is not finite.
pub fn kelly_fraction(p: f64, g: f64, l: f64) -> f64 {
    if !(p.is_finite() && g.is_finite() && l.is_finite()) || l <= 0.0 || g <= 0.0 {
        return 0.0;
    }

    let b = g / l;
    let q = 1.0 - p;
    ((b * p - q) / b).max(0.0)
}

/// Fraction of Kelly actually deployed (0.5 = half-Kelly).
pub fn scaled_kelly(fraction: f64, scaling_factor: f64) -> f64 {
    fraction * scaling_factor
}

/// Kelly fractions under estimate uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KellyResult {
    pub base_kelly: f64,
    pub confidence_weighted_kelly: f64,
    /// Kelly with pessimistically perturbed inputs.
    pub conservative_kelly: f64,
    /// Kelly with favorably perturbed inputs.
    pub optimistic_kelly: f64,
    /// Mean of the per-quantity confidence factors.
    pub confidence_factor: f64,
    /// `1 / (1 + r * (1 - confidence_factor))`.
    pub risk_adjustment: f64,
}

/// Confidence-weighted Kelly for point estimates `(p, g, l)` with
/// confidences `(p_c, g_c, l_c)` and risk aversion `r`.
///
/// Lower confidence shrinks the fraction twice: once linearly through
/// the confidence factor and once through the risk adjustment.
pub fn confidence_weighted_kelly(
    (p, g, l): (f64, f64, f64),
    (p_c, g_c, l_c): (f64, f64, f64),
    risk_aversion: f64,
) -> KellyResult {
    let base_kelly = kelly_fraction(p, g, l);

    let confidence_factor = (p_c + g_c + l_c) / 3.0;
    let risk_adjustment = 1.0 / (1.0 + risk_aversion * (1.0 - confidence_factor));

    // Worst case: shrink p and g, inflate l
    let conservative_l = if l_c > 0.0 { l / l_c } else { l * 2.0 };
    let conservative_kelly = kelly_fraction(p * p_c, g * g_c, conservative_l);

    // Best case: nudge p and g up, shrink l
    let optimistic_kelly = kelly_fraction(
        p + (1.0 - p_c) * 0.1,
        g + (1.0 - g_c) * 0.05,
        l * (1.0 - (1.0 - l_c) * 0.5),
    );

    KellyResult {
        base_kelly,
        confidence_weighted_kelly: base_kelly * confidence_factor * risk_adjustment,
        conservative_kelly,
        optimistic_kelly,
        confidence_factor,
        risk_adjustment,
    }
}

/// Kelly calculator bound to a risk-aversion coefficient.
#[derive(Debug, Clone)]
pub struct KellyEngine {
    risk_aversion: f64,
}

impl KellyEngine {
    pub fn new(risk_aversion: f64) -> Self {
        Self { risk_aversion }
    }

    pub fn risk_aversion(&self) -> f64 {
        self.risk_aversion
    }

    /// Confidence-weighted Kelly for explicit estimates.
    pub fn confidence_weighted(
        &self,
        estimates: (f64, f64, f64),
        confidences: (f64, f64, f64),
    ) -> KellyResult {
        confidence_weighted_kelly(estimates, confidences, self.risk_aversion)
    }

    /// Confidence-weighted Kelly for an estimate produced in confidence
    /// mode; `None` when the estimate carries no confidence factors.
    pub fn from_estimate(&self, estimate: &ProbabilityEstimate) -> Option<KellyResult> {
        let conf = estimate.confidence?;
        Some(self.confidence_weighted(
            (estimate.win_probability, estimate.avg_gain, estimate.avg_loss),
            (conf.win_probability, conf.avg_gain, conf.avg_loss),
        ))
    }
}

impl Default for KellyEngine {
    /// Default: risk aversion 1.0.
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Multi-asset Kelly weights `Σ⁻¹μ`, normalized to unit L1 norm.
///
/// Series are aligned on their trailing common length. Excess returns
/// subtract the per-period risk-free rate `annual_rf / periods_per_year`.
///
/// # Errors
/// `InsufficientData` for no assets or fewer than two aligned
/// observations; `SingularCovariance` when Σ cannot be inverted;
/// `DegenerateDistribution` when every weight is zero.
pub fn portfolio_kelly(
    series: &[ReturnSeries],
    annual_rf: f64,
    periods_per_year: f64,
) -> Result<Vec<f64>> {
    let k = series.len();
    let len = series.iter().map(ReturnSeries::len).min().unwrap_or(0);
    if k == 0 || len < 2 {
        return Err(EngineError::insufficient_data(2, len));
    }

    let rf = annual_rf / periods_per_year;
    let excess: Vec<Vec<f64>> = series
        .iter()
        .map(|s| s.tail(len).as_slice().iter().map(|r| r - rf).collect())
        .collect();
    let mu: Vec<f64> = excess.iter().map(|e| mean(e)).collect();

    let sigma = DMatrix::from_fn(k, k, |i, j| {
        excess[i]
            .iter()
            .zip(&excess[j])
            .map(|(a, b)| (a - mu[i]) * (b - mu[j]))
            .sum::<f64>()
            / (len - 1) as f64
    });

    let sigma_inv = sigma
        .try_inverse()
        .ok_or(EngineError::SingularCovariance { dimension: k })?;
    let raw = sigma_inv * DVector::from_vec(mu);
    if raw.iter().any(|w| !w.is_finite()) {
        return Err(EngineError::SingularCovariance { dimension: k });
    }

    let l1: f64 = raw.iter().map(|w| w.abs()).sum();
    if l1 <= 0.0 {
        return Err(EngineError::degenerate("all multi-asset Kelly weights are zero"));
    }
    Ok(raw.iter().map(|w| w / l1).collect())
}
