//! A* over the 8-connected lattice

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use tracing::trace;

use super::{Heuristic, PathfindingEngine};
use crate::grid::GridCell;
use crate::{Result, RouteError};

/// Open-set entry
///
/// Ordered so that [`BinaryHeap`] pops the lowest `f` first; equal `f` falls
/// back to insertion order.
#[derive(Debug, Clone, Copy)]
struct OpenNode {
    f: f64,
    seq: u64,
    g: f64,
    cell: GridCell,
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: reverse both keys
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

/// A path from start to goal, both included
#[derive(Debug, Clone, PartialEq)]
pub struct FoundPath {
    pub cells: Vec<GridCell>,
    /// Sum of the costs of every cell entered after the start
    pub cost: f64,
    pub nodes_expanded: usize,
}

/// Result of one search over a fixed graph
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(FoundPath),
    /// Open set drained without reaching the goal
    Exhausted { nodes_expanded: usize },
}

impl PathfindingEngine {
    /// Search from `start` to `goal`
    ///
    /// `cost_of` is the cost of entering a cell, `None` when unknown. A
    /// neighbour is only expanded if it has a known cost and is not land.
    /// Both endpoints must have a known cost, otherwise the search fails with
    /// [`RouteError::EndpointUnresolved`] before anything is enqueued.
    pub fn find_path<C, L>(
        &self,
        start: GridCell,
        goal: GridCell,
        cost_of: C,
        is_land: L,
    ) -> Result<SearchOutcome>
    where
        C: Fn(GridCell) -> Option<f64>,
        L: Fn(GridCell) -> bool,
    {
        for endpoint in [start, goal] {
            if cost_of(endpoint).is_none() {
                return Err(RouteError::EndpointUnresolved {
                    latitude: endpoint.latitude(),
                    longitude: endpoint.longitude(),
                });
            }
        }

        let mut open_set = BinaryHeap::new();
        let mut came_from: HashMap<GridCell, GridCell> = HashMap::new();
        let mut g_scores: HashMap<GridCell, f64> = HashMap::new();
        let mut seq = 0_u64;

        g_scores.insert(start, 0.0);
        open_set.push(OpenNode {
            f: self.heuristic_cost(start, goal),
            seq,
            g: 0.0,
            cell: start,
        });

        let mut nodes_expanded = 0;

        while let Some(current) = open_set.pop() {
            // Skip entries superseded by a cheaper relaxation
            if current.g > g_scores.get(&current.cell).copied().unwrap_or(f64::INFINITY) {
                continue;
            }
            nodes_expanded += 1;

            if current.cell == goal {
                trace!(
                    "A* reached {} after expanding {} nodes (cost {:.3})",
                    goal, nodes_expanded, current.g
                );
                return Ok(SearchOutcome::Found(FoundPath {
                    cells: reconstruct_path(&came_from, goal),
                    cost: current.g,
                    nodes_expanded,
                }));
            }

            for neighbor in self.indexer.neighbors8(current.cell) {
                let Some(step_cost) = cost_of(neighbor) else {
                    continue;
                };
                if is_land(neighbor) {
                    continue;
                }

                let tentative_g = current.g + step_cost;
                let known_g = g_scores.get(&neighbor).copied().unwrap_or(f64::INFINITY);
                if tentative_g < known_g {
                    came_from.insert(neighbor, current.cell);
                    g_scores.insert(neighbor, tentative_g);
                    seq += 1;
                    open_set.push(OpenNode {
                        f: tentative_g + self.heuristic_cost(neighbor, goal),
                        seq,
                        g: tentative_g,
                        cell: neighbor,
                    });
                }
            }
        }

        trace!("A* exhausted after expanding {} nodes", nodes_expanded);
        Ok(SearchOutcome::Exhausted { nodes_expanded })
    }

    /// Estimated remaining cost in grid steps
    fn heuristic_cost(&self, from: GridCell, to: GridCell) -> f64 {
        let step = f64::from(self.indexer.config().step_tenths);
        let (d_lat, d_lon) = from.grid_delta(&to);
        let d_lat = f64::from(d_lat) / step;
        let d_lon = f64::from(d_lon) / step;

        match self.heuristic {
            Heuristic::Manhattan => d_lat + d_lon,
            Heuristic::ScaledChebyshev => d_lat.max(d_lon) * self.min_step_cost,
        }
    }
}

fn reconstruct_path(came_from: &HashMap<GridCell, GridCell>, goal: GridCell) -> Vec<GridCell> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridIndexer;
    use std::collections::HashSet;

    fn cell(lat: i32, lon: i32) -> GridCell {
        GridCell::from_tenths(lat, lon).unwrap()
    }

    fn uniform_square(size: i32, cost: f64) -> HashMap<GridCell, f64> {
        let mut costs = HashMap::new();
        for lat in 0..size {
            for lon in 0..size {
                costs.insert(cell(lat, lon), cost);
            }
        }
        costs
    }

    fn found(outcome: SearchOutcome) -> FoundPath {
        match outcome {
            SearchOutcome::Found(path) => path,
            SearchOutcome::Exhausted { .. } => panic!("expected a path"),
        }
    }

    #[test]
    fn test_uniform_grid_takes_diagonal() {
        let engine = PathfindingEngine::default();
        let costs = uniform_square(3, 1.0);

        let path = found(
            engine
                .find_path(cell(0, 0), cell(2, 2), |c| costs.get(&c).copied(), |_| false)
                .unwrap(),
        );
        assert_eq!(path.cells, vec![cell(0, 0), cell(1, 1), cell(2, 2)]);
        assert_eq!(path.cost, 2.0);
    }

    #[test]
    fn test_start_equals_goal() {
        let engine = PathfindingEngine::default();
        let costs = uniform_square(1, 3.0);
        let path = found(
            engine
                .find_path(cell(0, 0), cell(0, 0), |c| costs.get(&c).copied(), |_| false)
                .unwrap(),
        );
        assert_eq!(path.cells, vec![cell(0, 0)]);
        assert_eq!(path.cost, 0.0);
    }

    #[test]
    fn test_missing_endpoint_fails_before_search() {
        let engine = PathfindingEngine::default();
        let costs = uniform_square(3, 1.0);
        let land_calls = std::cell::Cell::new(0);

        let result = engine.find_path(
            cell(0, 0),
            cell(5, 5),
            |c| costs.get(&c).copied(),
            |_| {
                land_calls.set(land_calls.get() + 1);
                false
            },
        );
        assert!(matches!(result, Err(RouteError::EndpointUnresolved { .. })));
        assert_eq!(land_calls.get(), 0);
    }

    #[test]
    fn test_land_wall_exhausts() {
        let engine = PathfindingEngine::default();
        let costs = uniform_square(3, 1.0);
        let wall: HashSet<GridCell> = [cell(0, 1), cell(1, 1), cell(2, 1)].into();

        let outcome = engine
            .find_path(
                cell(1, 0),
                cell(1, 2),
                |c| costs.get(&c).copied(),
                |c| wall.contains(&c),
            )
            .unwrap();
        assert!(matches!(outcome, SearchOutcome::Exhausted { .. }));
    }

    #[test]
    fn test_path_avoids_land_and_unknown_cells() {
        let engine = PathfindingEngine::default();
        let mut costs = uniform_square(3, 1.0);
        costs.remove(&cell(0, 1));
        let land: HashSet<GridCell> = [cell(1, 1)].into();

        let path = found(
            engine
                .find_path(
                    cell(1, 0),
                    cell(1, 2),
                    |c| costs.get(&c).copied(),
                    |c| land.contains(&c),
                )
                .unwrap(),
        );
        assert_eq!(path.cells, vec![cell(1, 0), cell(2, 1), cell(1, 2)]);
        assert_eq!(path.cost, 2.0);
    }

    /// Row 0 is expensive, row 1 is cheap. Manhattan overestimates the
    /// remaining cost and settles for the expensive straight line; the
    /// floor-scaled Chebyshev heuristic is admissible and finds the detour.
    fn detour_costs() -> HashMap<GridCell, f64> {
        let mut costs = HashMap::new();
        for lon in 0..=4 {
            costs.insert(cell(0, lon), 1.0);
        }
        for lon in 1..=3 {
            costs.insert(cell(1, lon), 0.1);
        }
        costs
    }

    #[test]
    fn test_manhattan_is_not_cost_optimal() {
        let engine = PathfindingEngine::default();
        let costs = detour_costs();

        let path = found(
            engine
                .find_path(cell(0, 0), cell(0, 4), |c| costs.get(&c).copied(), |_| false)
                .unwrap(),
        );
        assert_eq!(
            path.cells,
            vec![cell(0, 0), cell(0, 1), cell(0, 2), cell(0, 3), cell(0, 4)]
        );
        assert!((path.cost - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_scaled_chebyshev_finds_cheapest_path() {
        let engine = PathfindingEngine::new(GridIndexer::default(), Heuristic::ScaledChebyshev, 0.1);
        let costs = detour_costs();

        let path = found(
            engine
                .find_path(cell(0, 0), cell(0, 4), |c| costs.get(&c).copied(), |_| false)
                .unwrap(),
        );
        assert_eq!(
            path.cells,
            vec![cell(0, 0), cell(1, 1), cell(1, 2), cell(1, 3), cell(0, 4)]
        );
        assert!((path.cost - 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_identical_inputs_give_identical_paths() {
        let engine = PathfindingEngine::default();
        let costs = uniform_square(6, 1.0);

        let first = found(
            engine
                .find_path(cell(0, 0), cell(5, 3), |c| costs.get(&c).copied(), |_| false)
                .unwrap(),
        );
        for _ in 0..10 {
            let again = found(
                engine
                    .find_path(cell(0, 0), cell(5, 3), |c| costs.get(&c).copied(), |_| false)
                    .unwrap(),
            );
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_open_node_pops_lowest_f_then_oldest() {
        let c = cell(0, 0);
        let mut heap = BinaryHeap::new();
        heap.push(OpenNode { f: 2.0, seq: 0, g: 0.0, cell: c });
        heap.push(OpenNode { f: 1.0, seq: 2, g: 0.0, cell: c });
        heap.push(OpenNode { f: 1.0, seq: 1, g: 0.0, cell: c });

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|n| n.seq)).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }
}
