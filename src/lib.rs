//! `WinterReady` - environmental risk aggregation for winter travel
//!
//! This library ingests five independent external feeds (weather, avalanche
//! danger, road status, ocean conditions and aurora visibility), keeps them
//! fresh behind a stale-while-revalidate cache, and fuses them into a single
//! three-level safety verdict.

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod config;
pub mod destinations;
pub mod error;
pub mod gatekeeper;
pub mod models;
pub mod safety;
pub mod sources;
pub mod telemetry;
pub mod web;

// Re-export core types for public API
pub use aggregator::{SafetyAggregator, SafetySnapshot};
pub use cache::{CacheRead, CacheStore, FreshnessPolicy, MemoryStore, SwrCache};
pub use config::AppConfig;
pub use error::{ErrorCode, WinterReadyError};
pub use gatekeeper::{Gatekeeper, InMemoryRateLimitStore, RateLimitStore};
pub use models::{Coordinates, Destination};
pub use safety::{OverallSafety, compute_overall_safety};
pub use sources::{Source, SourceCaches, Sourced};
pub use telemetry::ErrorReporter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, WinterReadyError>;
