//! Data models for the `WinterReady` engine
//!
//! One module per feed plus the destination value used as the fetch key:
//! - Destination: name and coordinates of a travel destination
//! - Weather: point forecast snapshot with its derived risk level
//! - Avalanche: NVE danger warnings
//! - Road: per-region road status bundles
//! - Ocean: sea state for boat tours
//! - Aurora: northern lights visibility forecast

pub mod aurora;
pub mod avalanche;
pub mod destination;
pub mod ocean;
pub mod road;
pub mod weather;

// Re-export all public types for convenient access
pub use aurora::{AuroraForecast, AuroraParams, AuroraRating};
pub use avalanche::{AvalancheData, AvalancheParams, AvalancheWarning, DangerLevel, Language};
pub use destination::{Coordinates, Destination};
pub use ocean::OceanSnapshot;
pub use road::{RoadCondition, RoadData, RoadRegion, RoadStatus};
pub use weather::{RiskLevel, WeatherSnapshot};
