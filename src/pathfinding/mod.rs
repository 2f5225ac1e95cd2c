//! Weighted route search with window growth
//!
//! A route attempt loads the known costs of a window around both endpoints,
//! removes land and runs A* over what is left. If the search drains without
//! reaching the goal, the window grows on one axis and the attempt repeats,
//! up to a cap on each axis.

mod astar;
mod graph;

pub use astar::{FoundPath, SearchOutcome};
pub use graph::SearchGraph;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::cache::CostSource;
use crate::grid::{GridCell, GridIndexer};
use crate::land::LandMask;
use crate::{Result, RouteError};

/// Remaining-cost estimate used to order the open set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    /// `|Δlat| + |Δlon|` in grid steps. Fast, but with diagonal moves and
    /// costs below 1 it overestimates, so paths are not guaranteed cheapest.
    #[default]
    Manhattan,
    /// `max(|Δlat|, |Δlon|)` times the cheapest possible step. Admissible.
    ScaledChebyshev,
}

/// Window growth limits, in whole degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub initial_lat_buffer: u32,
    pub initial_lon_buffer: u32,
    /// Cap applied to each axis independently
    pub max_buffer: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_lat_buffer: 1,
            initial_lon_buffer: 1,
            max_buffer: 8,
        }
    }
}

/// Successful route with the attempt that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct RouteOutcome {
    pub path: Vec<GridCell>,
    pub cost: f64,
    pub attempts: u32,
    pub lat_buffer: u32,
    pub lon_buffer: u32,
    pub nodes_expanded: usize,
}

/// A* engine over the lattice
#[derive(Debug, Clone, Copy)]
pub struct PathfindingEngine {
    indexer: GridIndexer,
    heuristic: Heuristic,
    /// Lowest cost a single step can have, used by [`Heuristic::ScaledChebyshev`]
    min_step_cost: f64,
}

impl Default for PathfindingEngine {
    fn default() -> Self {
        Self::new(
            GridIndexer::default(),
            Heuristic::default(),
            crate::cost::DEFAULT_COST_FLOOR,
        )
    }
}

impl PathfindingEngine {
    #[must_use]
    pub fn new(indexer: GridIndexer, heuristic: Heuristic, min_step_cost: f64) -> Self {
        Self {
            indexer,
            heuristic,
            min_step_cost,
        }
    }

    #[must_use]
    pub fn heuristic(&self) -> Heuristic {
        self.heuristic
    }

    /// Search with a growing window until a path is found or both axes hit
    /// the cap
    ///
    /// Fails with [`RouteError::EndpointUnresolved`] as soon as either
    /// endpoint has no known cost, and with [`RouteError::NoRouteFound`] once
    /// growth is no longer possible. A land goal is never entered, so it ends
    /// in `NoRouteFound` as well.
    #[instrument(skip(self, source, land, start, goal), fields(start = %start, goal = %goal))]
    pub async fn route_with_retry<S>(
        &self,
        source: &S,
        land: &dyn LandMask,
        start: GridCell,
        goal: GridCell,
        policy: RetryPolicy,
    ) -> Result<RouteOutcome>
    where
        S: CostSource + ?Sized,
    {
        let mut lat_buffer = policy.initial_lat_buffer.min(policy.max_buffer);
        let mut lon_buffer = policy.initial_lon_buffer.min(policy.max_buffer);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let window = self.indexer.with_buffer(start, goal, lat_buffer, lon_buffer);
            let costs = source.costs_within(window).await?;
            let graph = SearchGraph::build(window, costs, land);

            debug!(
                "Attempt {}: window {} has {} traversable cells",
                attempts,
                window,
                graph.len()
            );

            let engine = *self;
            let outcome = tokio::task::spawn_blocking(move || {
                engine.find_path(
                    start,
                    goal,
                    |cell| graph.cost_of(cell),
                    |cell| graph.is_land(cell),
                )
            })
            .await
            .map_err(|e| RouteError::Task {
                message: format!("route search panicked or was cancelled: {e}"),
            })??;

            match outcome {
                SearchOutcome::Found(found) => {
                    info!(
                        "Route found on attempt {} ({} cells, cost {:.2}, buffers {}/{})",
                        attempts,
                        found.cells.len(),
                        found.cost,
                        lat_buffer,
                        lon_buffer
                    );
                    return Ok(RouteOutcome {
                        path: found.cells,
                        cost: found.cost,
                        attempts,
                        lat_buffer,
                        lon_buffer,
                        nodes_expanded: found.nodes_expanded,
                    });
                }
                SearchOutcome::Exhausted { nodes_expanded } => {
                    debug!(
                        "Attempt {} exhausted after {} nodes at buffers {}/{}",
                        attempts, nodes_expanded, lat_buffer, lon_buffer
                    );
                    match grow_buffers(start, goal, lat_buffer, lon_buffer, policy.max_buffer) {
                        Some((lat, lon)) => {
                            lat_buffer = lat;
                            lon_buffer = lon;
                        }
                        None => {
                            info!(
                                "No route between {} and {} after {} attempts",
                                start, goal, attempts
                            );
                            return Err(RouteError::NoRouteFound {
                                lat_buffer,
                                lon_buffer,
                            });
                        }
                    }
                }
            }
        }
    }
}

/// Next buffers after an exhausted attempt
///
/// The axis with the larger endpoint delta grows first, latitude on ties.
/// When that axis is at the cap the other one grows instead; `None` once both
/// are capped.
fn grow_buffers(
    start: GridCell,
    goal: GridCell,
    lat_buffer: u32,
    lon_buffer: u32,
    max_buffer: u32,
) -> Option<(u32, u32)> {
    let (d_lat, d_lon) = start.grid_delta(&goal);
    let lat_first = d_lat >= d_lon;

    let grow_lat = (lat_buffer < max_buffer).then_some((lat_buffer + 1, lon_buffer));
    let grow_lon = (lon_buffer < max_buffer).then_some((lat_buffer, lon_buffer + 1));

    if lat_first {
        grow_lat.or(grow_lon)
    } else {
        grow_lon.or(grow_lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CellCostEntry, CostStore, MemoryCostStore};
    use crate::land::OpenSea;
    use chrono::Utc;
    use rstest::rstest;

    fn cell(lat: i32, lon: i32) -> GridCell {
        GridCell::from_tenths(lat, lon).unwrap()
    }

    async fn store_with(cells: &[(i32, i32)], cost: f64) -> MemoryCostStore {
        let store = MemoryCostStore::new();
        let now = Utc::now();
        store
            .upsert_batch(
                cells
                    .iter()
                    .map(|&(lat, lon)| CellCostEntry::new(cell(lat, lon), cost, now))
                    .collect(),
            )
            .await
            .unwrap();
        store
    }

    #[rstest]
    #[case((0, 0), (10, 2), 1, 1, 8, Some((2, 1)))]
    #[case((0, 0), (2, 10), 1, 1, 8, Some((1, 2)))]
    #[case((0, 0), (5, 5), 1, 1, 8, Some((2, 1)))]
    #[case((0, 0), (10, 2), 8, 1, 8, Some((8, 2)))]
    #[case((0, 0), (10, 2), 8, 8, 8, None)]
    fn test_grow_buffers(
        #[case] start: (i32, i32),
        #[case] goal: (i32, i32),
        #[case] lat_buffer: u32,
        #[case] lon_buffer: u32,
        #[case] max_buffer: u32,
        #[case] expected: Option<(u32, u32)>,
    ) {
        let next = grow_buffers(
            cell(start.0, start.1),
            cell(goal.0, goal.1),
            lat_buffer,
            lon_buffer,
            max_buffer,
        );
        assert_eq!(next, expected);
    }

    #[tokio::test]
    async fn test_route_found_on_first_attempt() {
        let cells: Vec<(i32, i32)> = (0..=3).flat_map(|lat| (0..=3).map(move |lon| (lat, lon))).collect();
        let store = store_with(&cells, 1.0).await;

        let outcome = PathfindingEngine::default()
            .route_with_retry(&store, &OpenSea, cell(0, 0), cell(3, 3), RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!((outcome.lat_buffer, outcome.lon_buffer), (1, 1));
        assert_eq!(outcome.path.len(), 4);
        assert_eq!(outcome.cost, 3.0);
    }

    #[tokio::test]
    async fn test_unknown_endpoint_is_terminal() {
        let store = store_with(&[(0, 0), (0, 1)], 1.0).await;

        let result = PathfindingEngine::default()
            .route_with_retry(&store, &OpenSea, cell(0, 0), cell(0, 2), RetryPolicy::default())
            .await;
        assert!(matches!(result, Err(RouteError::EndpointUnresolved { .. })));
    }

    #[tokio::test]
    async fn test_land_goal_is_never_reached() {
        let store = store_with(&[(0, 0), (0, 1)], 1.0).await;
        let goal = cell(0, 1);
        let land = move |c: GridCell| c == goal;
        let policy = RetryPolicy {
            max_buffer: 2,
            ..RetryPolicy::default()
        };

        let result = PathfindingEngine::default()
            .route_with_retry(&store, &land, cell(0, 0), goal, policy)
            .await;
        assert!(matches!(
            result,
            Err(RouteError::NoRouteFound {
                lat_buffer: 2,
                lon_buffer: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_disconnected_endpoints_hit_the_cap() {
        // two known cells far apart with nothing between them
        let store = store_with(&[(0, 0), (0, 30)], 1.0).await;
        let policy = RetryPolicy {
            initial_lat_buffer: 1,
            initial_lon_buffer: 1,
            max_buffer: 2,
        };

        let result = PathfindingEngine::default()
            .route_with_retry(&store, &OpenSea, cell(0, 0), cell(0, 30), policy)
            .await;
        assert!(matches!(
            result,
            Err(RouteError::NoRouteFound {
                lat_buffer: 2,
                lon_buffer: 2
            })
        ));
    }
}
