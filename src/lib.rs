//! `AquaRoute` - Weather-weighted maritime route planning
//!
//! This library provides the weather grid (indexing, cost model and cost
//! store), the ingestion pipeline that keeps the grid fresh, and the
//! pathfinding engine that plans routes over it.

pub mod api;
pub mod cache;
pub mod config;
pub mod cost;
pub mod error;
pub mod grid;
pub mod ingest;
pub mod land;
pub mod pathfinding;
pub mod route;
pub mod telemetry;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use cache::{CellCost, CellCostEntry, CostSource, CostStore, FjallCostStore, MemoryCostStore};
pub use config::AppConfig;
pub use cost::{CostModel, CostModelConfig, WeatherObservation};
pub use error::RouteError;
pub use grid::{BoundingBox, GridCell, GridConfig, GridIndexer};
pub use ingest::{IngestionOptions, IngestionPipeline, IngestionReport};
pub use land::{CellSetLandMask, LandMask, OpenSea};
pub use pathfinding::{Heuristic, PathfindingEngine, RetryPolicy, RouteOutcome};
pub use route::{LiveCostSource, RoutePlan, RouteService};
pub use weather::{OpenWeatherMapClient, WeatherProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, RouteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
