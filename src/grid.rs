//! Grid indexing on the 0.1° lattice
//!
//! Every coordinate that enters the system is snapped to a [`GridCell`] here,
//! both by the ingestion pipeline when it writes costs and by the route search
//! when it reads them back. Cells are stored as integer tenths of a degree so
//! that equality, hashing and ordering never depend on floating point noise.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::{Result, RouteError};

/// Lattice resolution: cells per degree
pub const CELLS_PER_DEGREE: i32 = 10;
/// Largest valid latitude in tenths of a degree
pub const MAX_LAT_TENTHS: i32 = 90 * CELLS_PER_DEGREE;
/// Largest valid longitude in tenths of a degree
pub const MAX_LON_TENTHS: i32 = 180 * CELLS_PER_DEGREE;

/// One point of the 0.1° lattice
///
/// Ordering is row-major: latitude first, then longitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    lat_tenths: i32,
    lon_tenths: i32,
}

impl GridCell {
    /// Build a cell from tenths of a degree, returning `None` outside the globe
    #[must_use]
    pub fn from_tenths(lat_tenths: i32, lon_tenths: i32) -> Option<Self> {
        if lat_tenths.abs() > MAX_LAT_TENTHS || lon_tenths.abs() > MAX_LON_TENTHS {
            return None;
        }
        Some(Self {
            lat_tenths,
            lon_tenths,
        })
    }

    #[must_use]
    pub fn lat_tenths(&self) -> i32 {
        self.lat_tenths
    }

    #[must_use]
    pub fn lon_tenths(&self) -> i32 {
        self.lon_tenths
    }

    /// Latitude in decimal degrees (one decimal place)
    #[must_use]
    pub fn latitude(&self) -> f64 {
        f64::from(self.lat_tenths) / f64::from(CELLS_PER_DEGREE)
    }

    /// Longitude in decimal degrees (one decimal place)
    #[must_use]
    pub fn longitude(&self) -> f64 {
        f64::from(self.lon_tenths) / f64::from(CELLS_PER_DEGREE)
    }

    /// Absolute lattice deltas `(Δlat, Δlon)` to another cell, in grid units
    #[must_use]
    pub fn grid_delta(&self, other: &GridCell) -> (u32, u32) {
        (
            self.lat_tenths.abs_diff(other.lat_tenths),
            self.lon_tenths.abs_diff(other.lon_tenths),
        )
    }

    fn offset(&self, d_lat: i32, d_lon: i32) -> Option<Self> {
        Self::from_tenths(self.lat_tenths + d_lat, self.lon_tenths + d_lon)
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.latitude(), self.longitude())
    }
}

// Cells travel over the wire as `[lat, lon]` pairs.
impl Serialize for GridCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        [self.latitude(), self.longitude()].serialize(serializer)
    }
}

/// Inclusive rectangle of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min: GridCell,
    pub max: GridCell,
}

impl BoundingBox {
    /// The whole globe
    pub const GLOBAL: BoundingBox = BoundingBox {
        min: GridCell {
            lat_tenths: -MAX_LAT_TENTHS,
            lon_tenths: -MAX_LON_TENTHS,
        },
        max: GridCell {
            lat_tenths: MAX_LAT_TENTHS,
            lon_tenths: MAX_LON_TENTHS,
        },
    };

    /// Box spanning two corner cells given in any order
    #[must_use]
    pub fn new(a: GridCell, b: GridCell) -> Self {
        Self {
            min: GridCell {
                lat_tenths: a.lat_tenths.min(b.lat_tenths),
                lon_tenths: a.lon_tenths.min(b.lon_tenths),
            },
            max: GridCell {
                lat_tenths: a.lat_tenths.max(b.lat_tenths),
                lon_tenths: a.lon_tenths.max(b.lon_tenths),
            },
        }
    }

    #[must_use]
    pub fn contains(&self, cell: GridCell) -> bool {
        (self.min.lat_tenths..=self.max.lat_tenths).contains(&cell.lat_tenths)
            && (self.min.lon_tenths..=self.max.lon_tenths).contains(&cell.lon_tenths)
    }

    /// Number of lattice cells inside the box at the given step
    #[must_use]
    pub fn cell_count(&self, step_tenths: u32) -> u64 {
        let step = u64::from(step_tenths.max(1));
        let rows = u64::from(self.min.lat_tenths.abs_diff(self.max.lat_tenths)) / step + 1;
        let cols = u64::from(self.min.lon_tenths.abs_diff(self.max.lon_tenths)) / step + 1;
        rows * cols
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.min, self.max)
    }
}

/// Lattice configuration handed to the indexer at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Enumeration and neighbour step in tenths of a degree
    pub step_tenths: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { step_tenths: 1 }
    }
}

/// Deterministic mapping between coordinates and lattice cells
#[derive(Debug, Clone, Copy, Default)]
pub struct GridIndexer {
    config: GridConfig,
}

impl GridIndexer {
    #[must_use]
    pub fn new(config: GridConfig) -> Self {
        Self {
            config: GridConfig {
                step_tenths: config.step_tenths.max(1),
            },
        }
    }

    #[must_use]
    pub fn config(&self) -> GridConfig {
        self.config
    }

    /// Snap a coordinate to its cell, rounding to one decimal place
    pub fn to_cell(&self, latitude: f64, longitude: f64) -> Result<GridCell> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(RouteError::OutOfRange {
                latitude,
                longitude,
            });
        }
        let lat_tenths = (latitude * f64::from(CELLS_PER_DEGREE)).round() as i32;
        let lon_tenths = (longitude * f64::from(CELLS_PER_DEGREE)).round() as i32;
        GridCell::from_tenths(lat_tenths, lon_tenths).ok_or(RouteError::OutOfRange {
            latitude,
            longitude,
        })
    }

    /// Build a box from raw corner coordinates
    pub fn bbox(&self, lat_min: f64, lon_min: f64, lat_max: f64, lon_max: f64) -> Result<BoundingBox> {
        Ok(BoundingBox::new(
            self.to_cell(lat_min, lon_min)?,
            self.to_cell(lat_max, lon_max)?,
        ))
    }

    /// Every lattice cell inside the inclusive box, row-major
    ///
    /// The iterator is lazy so a global enumeration never materialises the
    /// full cell list.
    #[must_use]
    pub fn enumerate(&self, bbox: BoundingBox) -> CellIter {
        CellIter {
            bbox,
            step: self.config.step_tenths as i32,
            next: Some(bbox.min),
        }
    }

    /// Bounding box of `start` and `goal` widened by whole-degree buffers,
    /// clipped to the globe
    #[must_use]
    pub fn with_buffer(
        &self,
        start: GridCell,
        goal: GridCell,
        lat_buffer: u32,
        lon_buffer: u32,
    ) -> BoundingBox {
        let tight = BoundingBox::new(start, goal);
        let lat_pad = lat_buffer as i32 * CELLS_PER_DEGREE;
        let lon_pad = lon_buffer as i32 * CELLS_PER_DEGREE;

        BoundingBox {
            min: GridCell {
                lat_tenths: (tight.min.lat_tenths - lat_pad).max(-MAX_LAT_TENTHS),
                lon_tenths: (tight.min.lon_tenths - lon_pad).max(-MAX_LON_TENTHS),
            },
            max: GridCell {
                lat_tenths: (tight.max.lat_tenths + lat_pad).min(MAX_LAT_TENTHS),
                lon_tenths: (tight.max.lon_tenths + lon_pad).min(MAX_LON_TENTHS),
            },
        }
    }

    /// The Chebyshev-adjacent cells of `cell`
    ///
    /// Orthogonal moves come first, then diagonals. Neighbours that would
    /// fall off the globe are omitted, so cells on the poles or the
    /// antimeridian have fewer than eight.
    #[must_use]
    pub fn neighbors8(&self, cell: GridCell) -> Vec<GridCell> {
        let s = self.config.step_tenths as i32;
        [
            (s, 0),
            (-s, 0),
            (0, s),
            (0, -s),
            (s, s),
            (-s, s),
            (s, -s),
            (-s, -s),
        ]
        .into_iter()
        .filter_map(|(d_lat, d_lon)| cell.offset(d_lat, d_lon))
        .collect()
    }
}

/// Row-major walk over a [`BoundingBox`]
#[derive(Debug, Clone)]
pub struct CellIter {
    bbox: BoundingBox,
    step: i32,
    next: Option<GridCell>,
}

impl Iterator for CellIter {
    type Item = GridCell;

    fn next(&mut self) -> Option<GridCell> {
        let current = self.next?;
        let lon = current.lon_tenths + self.step;
        self.next = if lon <= self.bbox.max.lon_tenths {
            Some(GridCell {
                lat_tenths: current.lat_tenths,
                lon_tenths: lon,
            })
        } else {
            let lat = current.lat_tenths + self.step;
            (lat <= self.bbox.max.lat_tenths).then_some(GridCell {
                lat_tenths: lat,
                lon_tenths: self.bbox.min.lon_tenths,
            })
        };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cell(lat: f64, lon: f64) -> GridCell {
        GridIndexer::default().to_cell(lat, lon).unwrap()
    }

    #[rstest]
    #[case(18.93705, 72.92861, 189, 729)]
    #[case(22.48208, 69.80712, 225, 698)]
    #[case(-0.04, 0.04, 0, 0)]
    #[case(-12.36, -45.64, -124, -456)]
    #[case(90.0, -180.0, 900, -1800)]
    fn test_to_cell_rounds_to_one_decimal(
        #[case] lat: f64,
        #[case] lon: f64,
        #[case] lat_tenths: i32,
        #[case] lon_tenths: i32,
    ) {
        let c = cell(lat, lon);
        assert_eq!(c.lat_tenths(), lat_tenths);
        assert_eq!(c.lon_tenths(), lon_tenths);
    }

    #[rstest]
    #[case(90.1, 0.0)]
    #[case(-91.0, 0.0)]
    #[case(0.0, 180.5)]
    #[case(0.0, -200.0)]
    #[case(f64::NAN, 0.0)]
    fn test_to_cell_out_of_range(#[case] lat: f64, #[case] lon: f64) {
        let err = GridIndexer::default().to_cell(lat, lon).unwrap_err();
        assert!(matches!(err, RouteError::OutOfRange { .. }));
    }

    #[test]
    fn test_equal_after_rounding() {
        assert_eq!(cell(10.04, 20.01), cell(9.96, 19.96));
        assert_eq!(cell(10.04, 20.01).to_string(), "(10.0, 20.0)");
    }

    #[test]
    fn test_enumerate_small_box_row_major() {
        let indexer = GridIndexer::default();
        let bbox = BoundingBox::new(cell(0.0, 0.0), cell(0.2, 0.2));
        let cells: Vec<(f64, f64)> = indexer
            .enumerate(bbox)
            .map(|c| (c.latitude(), c.longitude()))
            .collect();

        assert_eq!(
            cells,
            vec![
                (0.0, 0.0),
                (0.0, 0.1),
                (0.0, 0.2),
                (0.1, 0.0),
                (0.1, 0.1),
                (0.1, 0.2),
                (0.2, 0.0),
                (0.2, 0.1),
                (0.2, 0.2),
            ]
        );
        assert_eq!(bbox.cell_count(1), 9);
    }

    #[test]
    fn test_enumerate_single_cell() {
        let indexer = GridIndexer::default();
        let c = cell(-33.9, 151.2);
        let cells: Vec<_> = indexer.enumerate(BoundingBox::new(c, c)).collect();
        assert_eq!(cells, vec![c]);
    }

    #[test]
    fn test_global_cell_count() {
        assert_eq!(BoundingBox::GLOBAL.cell_count(1), 1801 * 3601);
    }

    #[test]
    fn test_with_buffer_expands_and_clips() {
        let indexer = GridIndexer::default();
        let bbox = indexer.with_buffer(cell(22.5, 69.8), cell(18.9, 72.9), 1, 2);
        assert_eq!(bbox.min, cell(17.9, 67.8));
        assert_eq!(bbox.max, cell(23.5, 74.9));

        let polar = indexer.with_buffer(cell(89.5, 179.5), cell(89.0, 179.0), 3, 3);
        assert_eq!(polar.max, cell(90.0, 180.0));
        assert_eq!(polar.min, cell(86.0, 176.0));
    }

    #[test]
    fn test_neighbors8() {
        let indexer = GridIndexer::default();
        let centre = cell(10.0, 10.0);
        let mut neighbours = indexer.neighbors8(centre);
        neighbours.sort();
        assert_eq!(neighbours.len(), 8);
        assert!(!neighbours.contains(&centre));
        for n in &neighbours {
            let (d_lat, d_lon) = n.grid_delta(&centre);
            assert!(d_lat <= 1 && d_lon <= 1);
        }

        // north pole corner only keeps the on-globe neighbours
        assert_eq!(indexer.neighbors8(cell(90.0, 180.0)).len(), 3);
    }

    #[test]
    fn test_serializes_as_pair() {
        let json = serde_json::to_string(&cell(18.9, 72.9)).unwrap();
        assert_eq!(json, "[18.9,72.9]");
    }
}
