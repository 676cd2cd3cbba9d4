//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `MarketDataProvider`: Read-only price histories and option chains

pub mod market_data;

pub use market_data::MarketDataProvider;
