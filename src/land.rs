//! Land/water classification
//!
//! Consulted as a pure function of a cell. Land cells never enter a search
//! graph.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::grid::{GridCell, GridIndexer};
use crate::{Result, RouteError};

/// Land/water oracle
pub trait LandMask: Send + Sync {
    fn is_land(&self, cell: GridCell) -> bool;
}

impl<F> LandMask for F
where
    F: Fn(GridCell) -> bool + Send + Sync,
{
    fn is_land(&self, cell: GridCell) -> bool {
        self(cell)
    }
}

/// Treats every cell as open water
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSea;

impl LandMask for OpenSea {
    fn is_land(&self, _cell: GridCell) -> bool {
        false
    }
}

/// Explicit set of land cells
#[derive(Debug, Clone, Default)]
pub struct CellSetLandMask {
    land: HashSet<GridCell>,
}

impl CellSetLandMask {
    #[must_use]
    pub fn new(cells: impl IntoIterator<Item = GridCell>) -> Self {
        Self {
            land: cells.into_iter().collect(),
        }
    }

    /// Load a JSON array of `[lat, lon]` pairs; each pair is snapped to its cell
    pub fn load(path: impl AsRef<Path>, indexer: &GridIndexer) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let pairs: Vec<[f64; 2]> = serde_json::from_str(&raw).map_err(|e| {
            RouteError::config(format!("Invalid land mask {}: {e}", path.display()))
        })?;

        let land = pairs
            .into_iter()
            .map(|[lat, lon]| indexer.to_cell(lat, lon))
            .collect::<Result<HashSet<_>>>()?;

        tracing::info!("Loaded {} land cells from {}", land.len(), path.display());
        Ok(Self { land })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.land.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.land.is_empty()
    }
}

impl LandMask for CellSetLandMask {
    fn is_land(&self, cell: GridCell) -> bool {
        self.land.contains(&cell)
    }
}
