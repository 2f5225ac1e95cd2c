//! Route requests
//!
//! Snaps raw coordinates to the lattice, runs the pathfinding engine against
//! the configured cost source and reports the path with its distance and an
//! estimated travel time.

mod live;

pub use live::LiveCostSource;

use haversine::{Location, Units, distance};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use crate::Result;
use crate::cache::CostSource;
use crate::grid::{GridCell, GridIndexer};
use crate::land::LandMask;
use crate::pathfinding::{PathfindingEngine, RetryPolicy};

/// Default cruising speed
pub const DEFAULT_VESSEL_SPEED_KNOTS: f64 = 15.0;

const KM_PER_NAUTICAL_MILE: f64 = 1.852;

/// A computed route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePlan {
    /// Waypoints from start to goal, both included
    pub path: Vec<GridCell>,
    /// Great-circle length of the waypoint sequence, km
    pub distance_km: f64,
    pub estimated_time_hours: f64,
    /// Sum of the weather costs along the path
    pub cost: f64,
    pub attempts: u32,
    pub lat_buffer: u32,
    pub lon_buffer: u32,
}

/// Sum of haversine distances between consecutive waypoints, km, two decimals
#[must_use]
pub fn path_distance_km(path: &[GridCell]) -> f64 {
    let total: f64 = path
        .windows(2)
        .map(|pair| {
            distance(
                Location {
                    latitude: pair[0].latitude(),
                    longitude: pair[0].longitude(),
                },
                Location {
                    latitude: pair[1].latitude(),
                    longitude: pair[1].longitude(),
                },
                Units::Kilometers,
            )
        })
        .sum();
    round2(total)
}

/// Hours to cover `distance_km` at `speed_knots`, two decimals
#[must_use]
pub fn estimate_travel_time(distance_km: f64, speed_knots: f64) -> f64 {
    round2(distance_km / (speed_knots * KM_PER_NAUTICAL_MILE))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Entry point for route requests
pub struct RouteService {
    source: Arc<dyn CostSource>,
    land: Arc<dyn LandMask>,
    indexer: GridIndexer,
    engine: PathfindingEngine,
    policy: RetryPolicy,
    vessel_speed_knots: f64,
}

impl RouteService {
    pub fn new(
        source: Arc<dyn CostSource>,
        land: Arc<dyn LandMask>,
        indexer: GridIndexer,
        engine: PathfindingEngine,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            source,
            land,
            indexer,
            engine,
            policy,
            vessel_speed_knots: DEFAULT_VESSEL_SPEED_KNOTS,
        }
    }

    #[must_use]
    pub fn with_vessel_speed(mut self, knots: f64) -> Self {
        self.vessel_speed_knots = knots;
        self
    }

    /// Plan a route between two raw coordinates
    ///
    /// Coordinates outside the valid range fail with
    /// [`RouteError::OutOfRange`](crate::RouteError::OutOfRange) before any
    /// cost is read.
    #[instrument(skip(self))]
    pub async fn calculate_route(
        &self,
        start_lat: f64,
        start_lon: f64,
        end_lat: f64,
        end_lon: f64,
    ) -> Result<RoutePlan> {
        let start = self.indexer.to_cell(start_lat, start_lon)?;
        let goal = self.indexer.to_cell(end_lat, end_lon)?;

        let outcome = self
            .engine
            .route_with_retry(
                self.source.as_ref(),
                self.land.as_ref(),
                start,
                goal,
                self.policy,
            )
            .await?;

        let distance_km = path_distance_km(&outcome.path);
        Ok(RoutePlan {
            distance_km,
            estimated_time_hours: estimate_travel_time(distance_km, self.vessel_speed_knots),
            path: outcome.path,
            cost: outcome.cost,
            attempts: outcome.attempts,
            lat_buffer: outcome.lat_buffer,
            lon_buffer: outcome.lon_buffer,
        })
    }
}
