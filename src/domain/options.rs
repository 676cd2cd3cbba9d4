//! Option Greeks, move-probability sizing and chain screening.
//!
//! Greeks come from the closed-form Black-Scholes model. Sizing treats
//! a long call as a binary bet on the underlying making a favorable
//! move before expiry: the win probability is the normal tail of the
//! move over the horizon volatility, the payoff is the intrinsic value
//! at that move per unit of premium, and the loss is the full premium.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::{EngineError, Result};
use super::kelly::{kelly_fraction, scaled_kelly};
use super::market::{OptionCandidate, OptionQuote, OptionSide, PriceHistory};
use super::stats::{norm_cdf, norm_pdf};
use crate::config::OptionsConfig;

/// Calendar days per year used to convert days-to-expiry for pricing.
const CALENDAR_DAYS: f64 = 365.0;

/// Contract multiplier (shares per contract).
pub const CONTRACT_SIZE: f64 = 100.0;

/// Black-Scholes sensitivities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    /// Per year.
    pub theta: f64,
    pub vega: f64,
}

/// Closed-form Greeks for a European option.
///
/// `days_to_expiry` is converted to years over 365 days; `rate` and
/// `volatility` are annual.
///
/// # Errors
/// `InvalidOptionInputs` when time, volatility, spot or strike is not
/// strictly positive.
pub fn compute_greeks(
    spot: f64,
    strike: f64,
    days_to_expiry: f64,
    rate: f64,
    volatility: f64,
    side: OptionSide,
) -> Result<Greeks> {
    let t = days_to_expiry / CALENDAR_DAYS;
    // Negated comparisons also reject NaN
    if !(t > 0.0) || !(volatility > 0.0) || !(spot > 0.0) || !(strike > 0.0) {
        return Err(EngineError::invalid_option(format!(
            "T={t}, sigma={volatility}, S={spot}, K={strike}"
        )));
    }

    let sqrt_t = t.sqrt();
    let vol_sqrt_t = volatility * sqrt_t;
    let d1 = ((spot / strike).ln() + (rate + 0.5 * volatility * volatility) * t) / vol_sqrt_t;
    let d2 = d1 - vol_sqrt_t;

    let pdf_d1 = norm_pdf(d1);
    let discount = strike * (-rate * t).exp();
    let decay = -spot * pdf_d1 * volatility / (2.0 * sqrt_t);

    let (delta, theta) = match side {
        OptionSide::Call => (norm_cdf(d1), decay - rate * discount * norm_cdf(d2)),
        OptionSide::Put => (norm_cdf(d1) - 1.0, decay + rate * discount * norm_cdf(-d2)),
    };

    Ok(Greeks {
        delta,
        gamma: pdf_d1 / (spot * vol_sqrt_t),
        theta,
        vega: spot * sqrt_t * pdf_d1,
    })
}

/// Probability that the underlying rises by at least `move_fraction`
/// within `days_to_expiry` trading periods, given per-period volatility.
///
/// # Errors
/// `InvalidOptionInputs` for non-positive volatility or horizon.
pub fn move_probability(
    move_fraction: f64,
    volatility: f64,
    days_to_expiry: f64,
    periods_per_year: f64,
) -> Result<f64> {
    if !(volatility > 0.0) || !(days_to_expiry > 0.0) {
        return Err(EngineError::invalid_option(format!(
            "sigma={volatility}, days={days_to_expiry}"
        )));
    }
    let horizon_vol = volatility * (days_to_expiry / periods_per_year).sqrt();
    Ok(1.0 - norm_cdf(move_fraction / horizon_vol))
}

/// Payoff multiple on premium if the underlying moves by `move_fraction`;
/// 0 when the contract would still be out of the money.
pub fn move_return(spot: f64, strike: f64, premium: f64, move_fraction: f64) -> f64 {
    let moved = spot * (1.0 + move_fraction);
    if moved > strike && premium > 0.0 {
        (moved - strike) / premium
    } else {
        0.0
    }
}

/// Payoff multiples at +25%, +50% and +100% underlying moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveReturns {
    pub return_25: f64,
    pub return_50: f64,
    pub return_100: f64,
}

impl MoveReturns {
    pub fn new(spot: f64, strike: f64, premium: f64) -> Self {
        Self {
            return_25: move_return(spot, strike, premium, 0.25),
            return_50: move_return(spot, strike, premium, 0.50),
            return_100: move_return(spot, strike, premium, 1.00),
        }
    }
}

/// Kelly sizing of one call contract, as fractions of the portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionSizing {
    /// Probability of the target move.
    pub win_probability: f64,
    /// Payoff multiple on premium at the target move.
    pub potential_gain: f64,
    /// Loss multiple on premium (full premium).
    pub max_loss: f64,
    pub kelly_fraction: f64,
    pub scaled_fraction: f64,
}

/// A call opportunity found by [`OptionsRiskModel::screen_chain`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenedQuote {
    pub expiry: NaiveDate,
    pub days_to_expiry: i64,
    pub quote: OptionQuote,
    pub returns: MoveReturns,
    pub score: u32,
    pub reasons: Vec<String>,
}

/// Options screening and Kelly sizing.
#[derive(Debug, Clone)]
pub struct OptionsRiskModel {
    config: OptionsConfig,
    periods_per_year: f64,
}

impl OptionsRiskModel {
    pub fn new(config: OptionsConfig, periods_per_year: f64) -> Self {
        Self {
            config,
            periods_per_year,
        }
    }

    pub fn config(&self) -> &OptionsConfig {
        &self.config
    }

    /// Sizes a call from the underlying's per-period volatility.
    ///
    /// # Errors
    /// `InvalidOptionInputs` for non-positive spot, strike, premium,
    /// horizon or volatility.
    pub fn size(
        &self,
        spot: f64,
        strike: f64,
        premium: f64,
        days_to_expiry: f64,
        volatility: f64,
        scaling_factor: f64,
    ) -> Result<OptionSizing> {
        if !(spot > 0.0) || !(strike > 0.0) || !(premium > 0.0) {
            return Err(EngineError::invalid_option(format!(
                "S={spot}, K={strike}, premium={premium}"
            )));
        }

        let m = self.config.target_move;
        let p = move_probability(m, volatility, days_to_expiry, self.periods_per_year)?;
        let g = match move_return(spot, strike, premium, m) {
            r if r > 0.0 => r,
            _ => self.config.fallback_gain,
        };
        let l = 1.0;

        let kelly = kelly_fraction(p, g, l);
        Ok(OptionSizing {
            win_probability: p,
            potential_gain: g,
            max_loss: l,
            kelly_fraction: kelly,
            scaled_fraction: scaled_kelly(kelly, scaling_factor),
        })
    }

    /// Scores one quote; `None` when it fails the premium filters or the
    /// score/upside floor.
    pub fn screen_quote(
        &self,
        spot: f64,
        expiry: NaiveDate,
        days_to_expiry: i64,
        quote: OptionQuote,
    ) -> Option<ScreenedQuote> {
        let c = &self.config;
        let ask = quote.ask;
        if !(ask >= 0.01) || ask > spot * c.max_premium_fraction {
            return None;
        }

        let returns = MoveReturns::new(spot, quote.strike, ask);
        let mut score = 0;
        let mut reasons = Vec::new();

        if ask < spot * 0.05 {
            score += 25;
            reasons.push("Ultra leverage".to_string());
        } else if ask < spot * 0.1 {
            score += 20;
            reasons.push("High leverage".to_string());
        }

        if returns.return_25 > 2.0 {
            score += 25;
            reasons.push("Massive upside".to_string());
        } else if returns.return_25 > 1.0 {
            score += 15;
            reasons.push("High upside".to_string());
        }

        if days_to_expiry < 30 {
            score += 10;
            reasons.push("High gamma".to_string());
        }

        if quote.open_interest > c.min_open_interest {
            score += 5;
            reasons.push("Some liquidity".to_string());
        }

        (score >= c.min_score && returns.return_25 >= c.min_return_25).then_some(ScreenedQuote {
            expiry,
            days_to_expiry,
            quote,
            returns,
            score,
            reasons,
        })
    }

    /// Screens the nearest expiries of a pre-fetched call chain and keeps
    /// the best `top_per_ticker` opportunities by score.
    ///
    /// `chains` must be ordered by expiry; only the first `max_expiries`
    /// with `0 <= days <= max_expiry_days` are scanned.
    pub fn screen_chain(
        &self,
        ticker: &str,
        spot: f64,
        underlying_history: &PriceHistory,
        chains: &[(NaiveDate, Vec<OptionQuote>)],
        today: NaiveDate,
    ) -> Vec<OptionCandidate> {
        if !(spot > 0.0) {
            return Vec::new();
        }

        let mut found: Vec<ScreenedQuote> = chains
            .iter()
            .take(self.config.max_expiries)
            .filter_map(|(expiry, quotes)| {
                let days = (*expiry - today).num_days();
                (0..=self.config.max_expiry_days)
                    .contains(&days)
                    .then_some((expiry, days, quotes))
            })
            .flat_map(|(expiry, days, quotes)| {
                quotes
                    .iter()
                    .filter_map(move |q| self.screen_quote(spot, *expiry, days, *q))
            })
            .collect();

        found.sort_by(|a, b| b.score.cmp(&a.score));
        found.truncate(self.config.top_per_ticker);

        found
            .into_iter()
            .map(|s| OptionCandidate {
                ticker: ticker.to_string(),
                underlying_price: spot,
                strike: s.quote.strike,
                premium: s.quote.ask,
                expiry: s.expiry,
                days_to_expiry: s.days_to_expiry,
                open_interest: s.quote.open_interest,
                score: s.score,
                reasons: s.reasons,
                underlying_history: underlying_history.clone(),
            })
            .collect()
    }
}

impl Default for OptionsRiskModel {
    fn default() -> Self {
        Self::new(OptionsConfig::default(), 252.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_atm_call_delta() {
        let g = compute_greeks(100.0, 100.0, 30.0, 0.05, 0.3, OptionSide::Call).unwrap();
        assert!(g.delta > 0.5 && g.delta < 0.6, "delta = {}", g.delta);
        assert!(g.gamma > 0.0);
        assert!(g.theta < 0.0);
        assert!(g.vega > 0.0);
    }

    #[test]
    fn test_put_call_relationships() {
        let call = compute_greeks(100.0, 95.0, 45.0, 0.05, 0.4, OptionSide::Call).unwrap();
        let put = compute_greeks(100.0, 95.0, 45.0, 0.05, 0.4, OptionSide::Put).unwrap();
        assert_relative_eq!(call.delta - put.delta, 1.0, epsilon = 1e-12);
        assert_relative_eq!(call.gamma, put.gamma);
        assert_relative_eq!(call.vega, put.vega);
        assert!(put.theta > call.theta);
    }

    #[test]
    fn test_invalid_greeks_inputs() {
        for (s, k, t, v) in [
            (100.0, 100.0, 0.0, 0.3),
            (100.0, 100.0, 30.0, 0.0),
            (0.0, 100.0, 30.0, 0.3),
            (100.0, -1.0, 30.0, 0.3),
            (100.0, 100.0, f64::NAN, 0.3),
        ] {
            let r = compute_greeks(s, k, t, 0.05, v, OptionSide::Call);
            assert!(matches!(r, Err(EngineError::InvalidOptionInputs { .. })));
        }
    }

    #[test]
    fn test_move_probability_decreases_with_move() {
        let p25 = move_probability(0.25, 0.5, 60.0, 252.0).unwrap();
        let p50 = move_probability(0.50, 0.5, 60.0, 252.0).unwrap();
        assert!(p25 > p50);
        assert!(p25 > 0.0 && p25 < 0.5);
        assert!(move_probability(0.25, 0.0, 60.0, 252.0).is_err());
    }

    #[test]
    fn test_move_returns() {
        let r = MoveReturns::new(2.0, 2.0, 0.1);
        assert_relative_eq!(r.return_25, 5.0, epsilon = 1e-12);
        assert_relative_eq!(r.return_50, 10.0, epsilon = 1e-12);
        assert_relative_eq!(r.return_100, 20.0, epsilon = 1e-12);
        assert_eq!(move_return(2.0, 3.0, 0.1, 0.25), 0.0);
    }

    #[test]
    fn test_size_high_volatility_call() {
        let model = OptionsRiskModel::default();
        let s = model.size(2.0, 2.0, 0.05, 60.0, 0.5, 0.25).unwrap();
        assert_relative_eq!(s.potential_gain, 10.0, epsilon = 1e-9);
        assert_eq!(s.max_loss, 1.0);
        assert!(s.kelly_fraction > 0.0);
        assert_relative_eq!(s.scaled_fraction, s.kelly_fraction * 0.25);
    }

    #[test]
    fn test_size_out_of_money_uses_fallback_gain() {
        let model = OptionsRiskModel::default();
        let s = model.size(2.0, 5.0, 0.05, 60.0, 0.5, 0.25).unwrap();
        assert_relative_eq!(s.potential_gain, 0.1);
        assert_eq!(s.kelly_fraction, 0.0);
    }

    #[test]
    fn test_size_rejects_bad_premium() {
        let model = OptionsRiskModel::default();
        assert!(model.size(2.0, 2.0, 0.0, 60.0, 0.5, 0.25).is_err());
    }

    #[test]
    fn test_screen_quote_scoring() {
        let model = OptionsRiskModel::default();
        let expiry = NaiveDate::from_ymd_opt(2024, 7, 19).unwrap();
        let quote = OptionQuote {
            strike: 2.0,
            ask: 0.08,
            open_interest: 50,
        };
        let s = model.screen_quote(2.0, expiry, 20, quote).unwrap();
        // ultra leverage 25 + massive upside 25 + gamma 10 + liquidity 5
        assert_eq!(s.score, 65);
        assert_eq!(s.reasons.len(), 4);

        let expensive = OptionQuote {
            strike: 2.0,
            ask: 0.9,
            open_interest: 50,
        };
        assert!(model.screen_quote(2.0, expiry, 20, expensive).is_none());
    }

    #[test]
    fn test_screen_chain_filters_expiries_and_keeps_top() {
        let model = OptionsRiskModel::default();
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let near = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let far = NaiveDate::from_ymd_opt(2024, 12, 20).unwrap();
        let quotes: Vec<OptionQuote> = [1.8, 1.9, 2.0, 2.1, 2.2]
            .iter()
            .map(|&strike| OptionQuote {
                strike,
                ask: 0.05,
                open_interest: 100,
            })
            .collect();

        let found = model.screen_chain(
            "PNY",
            2.0,
            &PriceHistory::default(),
            &[(near, quotes.clone()), (far, quotes)],
            today,
        );
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|c| c.expiry == near && c.days_to_expiry == 20));
        assert!(found.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
