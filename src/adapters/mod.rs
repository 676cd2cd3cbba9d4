//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (file I/O). Each sub-module groups adapters
//! by infrastructure concern.
//!
//! Adapter categories:
//! - `snapshot`: JSON market-data snapshot served through `MarketDataProvider`

pub mod snapshot;

pub use snapshot::{MarketSnapshot, SnapshotProvider};
