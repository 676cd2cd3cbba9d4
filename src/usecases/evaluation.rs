//! Portfolio Evaluator - One Full Evaluation Run
//!
//! Orchestrates a run end to end:
//! 1. Fetch histories, prices and option chains through the port
//! 2. Screen option chains into call candidates
//! 3. Equity allocation (configured strategy, equal-weight fallback)
//! 4. Multi-asset Kelly weights across the allocated tickers
//! 5. Holding plans for every scored position
//! 6. Options allocation and portfolio risk summary
//!
//! Fetching is async (one future per ticker, joined). Everything after
//! that is synchronous and deterministic for a given input.

use chrono::NaiveDate;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::allocation::{AllocationBuilder, AllocationSet};
use super::options_allocation::{OptionAllocationSet, OptionsAllocationBuilder};
use super::risk_summary::PortfolioRiskSummary;
use crate::config::AppConfig;
use crate::domain::{
  EquityCandidate, HoldingPeriodAdvisor, HoldingPlan, OptionCandidate, OptionQuote, ReturnSeries,
  Ticker, WatchlistEntry, portfolio_kelly,
};
use crate::ports::MarketDataProvider;

/// Inputs for one evaluation, as fetched from the data port.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
  pub equities: Vec<EquityCandidate>,
  pub options: Vec<OptionCandidate>,
}

/// Normalized multi-asset Kelly weight for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerWeight {
  pub ticker: Ticker,
  pub weight: f64,
}

/// Holding plan for one allocated ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionPlan {
  pub ticker: Ticker,
  pub plan: HoldingPlan,
}

/// Everything produced by one run.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
  pub equity: AllocationSet,
  /// `None` when nothing is allocated or Σ is singular.
  pub kelly_weights: Option<Vec<TickerWeight>>,
  pub holding_plans: Vec<PositionPlan>,
  pub options: OptionAllocationSet,
  pub risk_summary: Option<PortfolioRiskSummary>,
}

/// Runs evaluations against an immutable configuration.
pub struct PortfolioEvaluator {
  config: AppConfig,
  equities: AllocationBuilder,
  options: OptionsAllocationBuilder,
  holding: HoldingPeriodAdvisor,
}

impl PortfolioEvaluator {
  /// Create an evaluator; the config is fixed for its lifetime.
  pub fn new(config: AppConfig) -> Self {
    Self {
      equities: AllocationBuilder::new(&config),
      options: OptionsAllocationBuilder::new(&config),
      holding: HoldingPeriodAdvisor::new(config.holding.clone()),
      config,
    }
  }

  pub fn config(&self) -> &AppConfig {
    &self.config
  }

  /// Fetch and screen candidates for every watchlist entry.
  ///
  /// Tickers whose price or history cannot be fetched are skipped with
  /// a warning; a failed option chain only drops that ticker's options.
  #[instrument(skip(self, provider, watchlist), fields(tickers = watchlist.len()))]
  pub async fn collect_candidates<P>(
    &self,
    provider: &P,
    watchlist: &[WatchlistEntry],
    today: NaiveDate,
  ) -> CandidateSet
  where
    P: MarketDataProvider + ?Sized,
  {
    let fetches = watchlist
      .iter()
      .map(|entry| self.fetch_ticker(provider, entry, today));

    let mut set = CandidateSet::default();
    for (equity, options) in join_all(fetches).await.into_iter().flatten() {
      set.equities.push(equity);
      set.options.extend(options);
    }

    info!(
      equities = set.equities.len(),
      options = set.options.len(),
      "Candidates collected"
    );
    set
  }

  async fn fetch_ticker<P>(
    &self,
    provider: &P,
    entry: &WatchlistEntry,
    today: NaiveDate,
  ) -> Option<(EquityCandidate, Vec<OptionCandidate>)>
  where
    P: MarketDataProvider + ?Sized,
  {
    let ticker = entry.ticker.as_str();
    let lookback = self.config.estimation.lookback_days;

    let (history, price) = tokio::join!(
      provider.price_history(ticker, lookback),
      provider.current_price(ticker)
    );
    let (history, price) = match (history, price) {
      (Ok(h), Ok(p)) => (h, p),
      (Err(e), _) | (_, Err(e)) => {
        warn!(ticker, error = %e, "Market data unavailable, skipping ticker");
        return None;
      },
    };

    let options = match self.fetch_chains(provider, ticker).await {
      Ok(chains) => self
        .options
        .model()
        .screen_chain(ticker, price, &history, &chains, today),
      Err(e) => {
        debug!(ticker, error = %e, "Option chain unavailable");
        Vec::new()
      },
    };

    let equity = EquityCandidate {
      ticker: entry.ticker.clone(),
      current_price: price,
      qualitative_score: entry.qualitative_score,
      history,
    };
    Some((equity, options))
  }

  async fn fetch_chains<P>(
    &self,
    provider: &P,
    ticker: &str,
  ) -> anyhow::Result<Vec<(NaiveDate, Vec<OptionQuote>)>>
  where
    P: MarketDataProvider + ?Sized,
  {
    let mut expiries = provider.expiries(ticker).await?;
    expiries.truncate(self.config.options.max_expiries);

    let chains = join_all(expiries.iter().map(|&e| provider.option_chain(ticker, e))).await;
    expiries
      .into_iter()
      .zip(chains)
      .map(|(expiry, chain)| Ok((expiry, chain?)))
      .collect()
  }

  /// Run the pure evaluation over pre-fetched candidates.
  pub fn evaluate(&self, candidates: &CandidateSet) -> EvaluationReport {
    let alloc = &self.config.allocation;
    let kelly = &self.config.kelly;

    let equity = self.equities.build(
      &candidates.equities,
      alloc.portfolio_value,
      kelly.scaling_factor,
      alloc.strategy,
    );

    let kelly_weights = self.kelly_weights(&equity, &candidates.equities);

    let holding_plans: Vec<PositionPlan> = equity
      .allocations
      .iter()
      .filter_map(|a| {
        a.unified.as_ref().map(|score| PositionPlan {
          ticker: a.ticker.clone(),
          plan: self.holding.advise_score(score),
        })
      })
      .collect();

    let options = self.options.build(
      &candidates.options,
      alloc.portfolio_value,
      kelly.options_scaling_factor,
    );

    let risk_summary = PortfolioRiskSummary::from_allocations(&equity);

    info!(
      strategy = %equity.strategy,
      positions = equity.len(),
      equity_total = %equity.total_allocated,
      option_positions = options.len(),
      options_total = %options.total_allocated,
      plans = holding_plans.len(),
      "Evaluation complete"
    );

    EvaluationReport {
      equity,
      kelly_weights,
      holding_plans,
      options,
      risk_summary,
    }
  }

  /// Σ⁻¹μ weights across the allocated tickers' return series.
  fn kelly_weights(
    &self,
    equity: &AllocationSet,
    candidates: &[EquityCandidate],
  ) -> Option<Vec<TickerWeight>> {
    if equity.is_empty() {
      return None;
    }
    let est = &self.config.estimation;

    let (tickers, series): (Vec<Ticker>, Vec<ReturnSeries>) = equity
      .tickers()
      .filter_map(|t| {
        let c = candidates.iter().find(|c| c.ticker == t)?;
        Some((t.to_string(), c.history.tail(est.lookback_days).returns()))
      })
      .unzip();

    match portfolio_kelly(&series, est.risk_free_rate, est.periods_per_year) {
      Ok(weights) => Some(
        tickers
          .into_iter()
          .zip(weights)
          .map(|(ticker, weight)| TickerWeight { ticker, weight })
          .collect(),
      ),
      Err(e) => {
        warn!(error = %e, assets = series.len(), "Multi-asset Kelly unavailable");
        None
      },
    }
  }
}
