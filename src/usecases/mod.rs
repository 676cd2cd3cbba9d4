//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the engine's workflows. Each use case is a self-contained
//! business operation.
//!
//! Use cases:
//! - `AllocationBuilder`: Equity sizing with equal-weight fallback
//! - `OptionsAllocationBuilder`: Call contract sizing
//! - `PortfolioRiskSummary`: Weighted portfolio risk figures
//! - `PortfolioEvaluator`: Fetch, screen, allocate and report

pub mod allocation;
pub mod evaluation;
pub mod options_allocation;
pub mod risk_summary;

pub use allocation::{Allocation, AllocationBuilder, AllocationSet, AllocationStrategy};
pub use evaluation::{CandidateSet, EvaluationReport, PortfolioEvaluator};
pub use options_allocation::{OptionAllocation, OptionAllocationSet, OptionsAllocationBuilder};
pub use risk_summary::PortfolioRiskSummary;
