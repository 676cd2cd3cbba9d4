//! Integration Tests - End-to-end Evaluation Runs
//!
//! Tests the interaction between usecases, ports, and mock adapters.
//! Uses mockall for trait mocking and tokio::test for async tests.

use anyhow::anyhow;
use chrono::{Days, NaiveDate};
use mockall::mock;
use rust_decimal::Decimal;

use kelly_risk_engine::adapters::{MarketSnapshot, SnapshotProvider};
use kelly_risk_engine::config::AppConfig;
use kelly_risk_engine::config::loader::parse_config;
use kelly_risk_engine::domain::{OptionQuote, PriceHistory, WatchlistEntry};
use kelly_risk_engine::ports::MarketDataProvider;
use kelly_risk_engine::usecases::{AllocationStrategy, PortfolioEvaluator};

// ---- Mock Definitions ----

mock! {
    pub Provider {}

    #[async_trait::async_trait]
    impl MarketDataProvider for Provider {
        async fn price_history(&self, ticker: &str, lookback_days: usize)
            -> anyhow::Result<PriceHistory>;
        async fn current_price(&self, ticker: &str) -> anyhow::Result<f64>;
        async fn option_chain(&self, ticker: &str, expiry: NaiveDate)
            -> anyhow::Result<Vec<OptionQuote>>;
        async fn expiries(&self, ticker: &str) -> anyhow::Result<Vec<NaiveDate>>;
    }
}

// ---- Fixtures ----

const TRENDING: [f64; 5] = [0.02, 0.02, 0.02, -0.01, -0.01];
const SWINGING: [f64; 5] = [0.6, -0.4, 0.6, 0.6, -0.4];

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

/// Repeats `pattern` for `periods` returns, scaled so the last close
/// equals `last_price`.
fn history_ending_at(pattern: &[f64], periods: usize, last_price: f64) -> PriceHistory {
    let mut closes = vec![1.0];
    for i in 0..periods {
        let last = closes[closes.len() - 1];
        closes.push(last * (1.0 + pattern[i % pattern.len()]));
    }
    let scale = last_price / closes[closes.len() - 1];
    let closes: Vec<f64> = closes.iter().map(|c| c * scale).collect();
    let start = as_of() - Days::new(periods as u64);
    PriceHistory::from_closes(start, &closes)
}

fn watchlist(tickers: &[(&str, f64)]) -> Vec<WatchlistEntry> {
    tickers
        .iter()
        .map(|(t, q)| WatchlistEntry {
            ticker: (*t).to_string(),
            qualitative_score: *q,
        })
        .collect()
}

fn near_expiry() -> NaiveDate {
    as_of() + Days::new(60)
}

fn far_expiry() -> NaiveDate {
    as_of() + Days::new(200)
}

/// Mock serving a trending equity ("UP") and a volatile one with a
/// listed call chain ("VOL").
fn market_mock() -> MockProvider {
    let mut mock = MockProvider::new();

    mock.expect_price_history()
        .withf(|_, lookback| *lookback == 252)
        .returning(|ticker, _| match ticker {
            "UP" => Ok(history_ending_at(&TRENDING, 60, 25.0)),
            "VOL" => Ok(history_ending_at(&SWINGING, 60, 2.0)),
            other => Err(anyhow!("unknown ticker {other}")),
        });

    mock.expect_current_price()
        .times(2)
        .returning(|ticker| match ticker {
            "UP" => Ok(25.0),
            "VOL" => Ok(2.0),
            other => Err(anyhow!("unknown ticker {other}")),
        });

    mock.expect_expiries().returning(|ticker| match ticker {
        "VOL" => Ok(vec![near_expiry(), far_expiry()]),
        _ => Ok(Vec::new()),
    });

    mock.expect_option_chain().returning(|_, expiry| {
        let quotes = if expiry == near_expiry() {
            vec![
                OptionQuote { strike: 2.0, ask: 0.05, open_interest: 50 },
                OptionQuote { strike: 3.0, ask: 0.01, open_interest: 0 },
            ]
        } else {
            vec![OptionQuote { strike: 2.0, ask: 0.02, open_interest: 500 }]
        };
        Ok(quotes)
    });

    mock
}

// ---- Tests ----

#[tokio::test]
async fn test_full_evaluation_with_mock_provider() {
    let provider = market_mock();
    let evaluator = PortfolioEvaluator::new(AppConfig::default());

    let candidates = evaluator
        .collect_candidates(&provider, &watchlist(&[("UP", 3.0), ("VOL", 1.0)]), as_of())
        .await;

    assert_eq!(candidates.equities.len(), 2);
    // Only the near expiry is inside the 90-day window; the 3.0 strike
    // has no upside at +25%.
    assert_eq!(candidates.options.len(), 1);
    let option = &candidates.options[0];
    assert_eq!(option.ticker, "VOL");
    assert_eq!(option.expiry, near_expiry());
    assert_eq!(option.days_to_expiry, 60);

    let report = evaluator.evaluate(&candidates);

    assert_eq!(report.equity.strategy, AllocationStrategy::Unified);
    assert_eq!(report.equity.len(), 2);
    assert!(report.equity.total_allocated <= report.equity.portfolio_value);
    assert_eq!(report.holding_plans.len(), 2);
    assert!(report.risk_summary.is_some());

    let weights = report.kelly_weights.expect("two independent series");
    assert_eq!(weights.len(), 2);

    assert_eq!(report.options.len(), 1);
    let call = &report.options.allocations[0];
    assert_eq!(call.contracts_to_buy, 3);
    assert!(call.dollar_allocation <= Decimal::from(50));
    assert!(call.greeks.is_some());
}

#[tokio::test]
async fn test_unavailable_ticker_is_skipped() {
    let mut provider = MockProvider::new();
    provider
        .expect_price_history()
        .returning(|_, _| Ok(history_ending_at(&TRENDING, 60, 25.0)));
    provider.expect_current_price().returning(|ticker| match ticker {
        "UP" => Ok(25.0),
        _ => Err(anyhow!("quote service down")),
    });
    provider.expect_expiries().returning(|_| Ok(Vec::new()));

    let evaluator = PortfolioEvaluator::new(AppConfig::default());
    let candidates = evaluator
        .collect_candidates(&provider, &watchlist(&[("UP", 1.0), ("DOWN", 9.0)]), as_of())
        .await;

    assert_eq!(candidates.equities.len(), 1);
    assert_eq!(candidates.equities[0].ticker, "UP");
}

#[tokio::test]
async fn test_chain_failure_keeps_equity() {
    let mut provider = MockProvider::new();
    provider
        .expect_price_history()
        .returning(|_, _| Ok(history_ending_at(&SWINGING, 60, 2.0)));
    provider.expect_current_price().returning(|_| Ok(2.0));
    provider
        .expect_expiries()
        .returning(|_| Err(anyhow!("chain endpoint unavailable")));
    provider.expect_option_chain().never();

    let evaluator = PortfolioEvaluator::new(AppConfig::default());
    let candidates = evaluator
        .collect_candidates(&provider, &watchlist(&[("VOL", 1.0)]), as_of())
        .await;

    assert_eq!(candidates.equities.len(), 1);
    assert!(candidates.options.is_empty());
}

#[tokio::test]
async fn test_losing_universe_falls_back_to_equal_weight() {
    let losing = [0.01, -0.02, -0.02, 0.01, -0.02];
    let mut provider = MockProvider::new();
    provider
        .expect_price_history()
        .returning(move |_, _| Ok(history_ending_at(&losing, 60, 10.0)));
    provider.expect_current_price().returning(|_| Ok(10.0));
    provider.expect_expiries().returning(|_| Ok(Vec::new()));

    let config = parse_config("[allocation]\nportfolio_value = 600.0\n").unwrap();
    let evaluator = PortfolioEvaluator::new(config);
    let candidates = evaluator
        .collect_candidates(
            &provider,
            &watchlist(&[("A", 1.0), ("B", 3.0), ("C", 2.0)]),
            as_of(),
        )
        .await;
    let report = evaluator.evaluate(&candidates);

    assert_eq!(report.equity.strategy, AllocationStrategy::EqualWeight);
    let tickers: Vec<&str> = report.equity.tickers().collect();
    assert_eq!(tickers, ["B", "C", "A"]);
    assert!(report
        .equity
        .allocations
        .iter()
        .all(|a| a.dollar_allocation == Decimal::from(200) && a.shares_to_buy == 20));
    assert!(report.holding_plans.is_empty());
}

#[tokio::test]
async fn test_snapshot_provider_round_trip() {
    let json = serde_json::json!({
        "as_of": "2024-06-03",
        "tickers": {
            "UP": {
                "qualitative_score": 2.0,
                "history": history_ending_at(&TRENDING, 60, 25.0),
            }
        }
    });
    let snapshot: MarketSnapshot = serde_json::from_value(json).unwrap();
    let provider = SnapshotProvider::new(snapshot);

    let evaluator = PortfolioEvaluator::new(AppConfig::default());
    let candidates = evaluator
        .collect_candidates(&provider, &provider.watchlist(), provider.as_of())
        .await;
    let report = evaluator.evaluate(&candidates);

    assert_eq!(report.equity.len(), 1);
    assert_eq!(report.equity.allocations[0].ticker, "UP");
    assert!(report.equity.allocations[0].current_price > 24.99);
}
