//! Per-attempt search graph

use std::collections::{HashMap, HashSet};

use crate::grid::{BoundingBox, GridCell};
use crate::land::LandMask;

/// Known costs inside one search window, minus land
///
/// Built fresh for every attempt and discarded afterwards. A cell is a
/// member when it has a known cost and is not land.
#[derive(Debug, Clone)]
pub struct SearchGraph {
    window: BoundingBox,
    costs: HashMap<GridCell, f64>,
    land: HashSet<GridCell>,
}

impl SearchGraph {
    /// Classify every known cell of the window against the land mask once
    pub fn build(window: BoundingBox, costs: HashMap<GridCell, f64>, land: &dyn LandMask) -> Self {
        let land = costs
            .keys()
            .copied()
            .filter(|cell| land.is_land(*cell))
            .collect();
        Self {
            window,
            costs,
            land,
        }
    }

    #[must_use]
    pub fn window(&self) -> BoundingBox {
        self.window
    }

    /// Known cost of a cell, land or not
    #[must_use]
    pub fn cost_of(&self, cell: GridCell) -> Option<f64> {
        self.costs.get(&cell).copied()
    }

    #[must_use]
    pub fn is_land(&self, cell: GridCell) -> bool {
        self.land.contains(&cell)
    }

    #[must_use]
    pub fn is_member(&self, cell: GridCell) -> bool {
        self.costs.contains_key(&cell) && !self.is_land(cell)
    }

    /// Number of traversable cells
    #[must_use]
    pub fn len(&self) -> usize {
        self.costs.len() - self.land.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_land_cells_are_not_members() {
        let a = GridCell::from_tenths(0, 0).unwrap();
        let b = GridCell::from_tenths(0, 1).unwrap();
        let c = GridCell::from_tenths(0, 2).unwrap();
        let costs = HashMap::from([(a, 1.0), (b, 2.0)]);
        let land = move |cell: GridCell| cell == b;

        let graph = SearchGraph::build(BoundingBox::new(a, c), costs, &land);
        assert!(graph.is_member(a));
        assert!(!graph.is_member(b));
        assert!(graph.is_land(b));
        assert_eq!(graph.cost_of(b), Some(2.0));
        assert!(!graph.is_member(c));
        assert_eq!(graph.len(), 1);
    }
}
