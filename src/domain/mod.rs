//! Domain layer - Core risk math and models.
//!
//! Pure, synchronous estimation, Kelly sizing, scoring, option
//! pricing and holding-period logic. No I/O and no logging here
//! (hexagonal architecture inner ring).
//! All types are serializable and testable in isolation.

pub mod error;
pub mod holding;
pub mod kelly;
pub mod market;
pub mod options;
pub mod probability;
pub mod scoring;
pub mod stats;

// Re-export core types for convenience
pub use error::{EngineError, Result};
pub use holding::{
    ExitStrategy, HoldingFactors, HoldingPeriodAdvisor, HoldingPlan, RebalancingFrequency,
    RiskLevel,
};
pub use kelly::{
    KellyEngine, KellyResult, confidence_weighted_kelly, kelly_fraction, portfolio_kelly,
    scaled_kelly,
};
pub use market::{
    EquityCandidate, OptionCandidate, OptionQuote, OptionSide, PriceHistory, PricePoint,
    ReturnSeries, Ticker, WatchlistEntry,
};
pub use options::{
    Greeks, MoveReturns, OptionSizing, OptionsRiskModel, compute_greeks, move_probability,
};
pub use probability::{ProbabilityEstimate, ProbabilityEstimator};
pub use scoring::{UnifiedRiskRewardScorer, UnifiedScore, calmar_ratio, sortino_ratio};
