use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Database, Keyspace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::task;

use super::{CellCost, CellCostEntry, CostStore};
use crate::grid::{BoundingBox, GridCell, MAX_LAT_TENTHS, MAX_LON_TENTHS};
use crate::{Result, RouteError};

#[derive(Serialize, Deserialize)]
struct StoredCost {
    cost: f64,
    last_updated_ms: i64, // Unix timestamp (milliseconds)
}

/// fjall-backed grid cost table keyed by `(latitude, longitude)`
///
/// Keys are the cell's offset tenths as two big-endian `u16`s, so the
/// keyspace is ordered row-major like [`GridCell`] itself and one key maps
/// to exactly one row.
#[derive(Clone)]
pub struct FjallCostStore {
    db: Database,
    store: Keyspace,
}

fn cell_key(cell: GridCell) -> [u8; 4] {
    let lat = (cell.lat_tenths() + MAX_LAT_TENTHS) as u16;
    let lon = (cell.lon_tenths() + MAX_LON_TENTHS) as u16;
    let [a, b] = lat.to_be_bytes();
    let [c, d] = lon.to_be_bytes();
    [a, b, c, d]
}

fn key_cell(key: &[u8]) -> Option<GridCell> {
    let [a, b, c, d] = <[u8; 4]>::try_from(key).ok()?;
    let lat = i32::from(u16::from_be_bytes([a, b])) - MAX_LAT_TENTHS;
    let lon = i32::from(u16::from_be_bytes([c, d])) - MAX_LON_TENTHS;
    GridCell::from_tenths(lat, lon)
}

fn decode(bytes: &[u8]) -> anyhow::Result<CellCost> {
    let stored: StoredCost = postcard::from_bytes(bytes)?;
    let last_updated = DateTime::from_timestamp_millis(stored.last_updated_ms)
        .ok_or(anyhow!("Stored timestamp out of range"))?;
    Ok(CellCost {
        cost: stored.cost,
        last_updated,
    })
}

fn get_from_store(store: &Keyspace, cell: GridCell) -> anyhow::Result<Option<CellCost>> {
    store
        .get(cell_key(cell))?
        .map(|v| decode(&v))
        .transpose()
}

impl FjallCostStore {
    /// Opens (or creates) the grid cost database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let open = || -> anyhow::Result<(Database, Keyspace)> {
            let db = Database::builder(&path).open()?;
            let store = db.keyspace("grid_costs", fjall::KeyspaceCreateOptions::default)?;
            Ok((db, store))
        };
        let (db, store) = open().map_err(|e| {
            RouteError::store(
                format!("Failed to open grid cache at {}: {e}", path.as_ref().display()),
                0,
            )
        })?;
        Ok(FjallCostStore { db, store })
    }
}

#[async_trait]
impl CostStore for FjallCostStore {
    #[tracing::instrument(name = "upsert_batch", level = "debug", skip(self, entries), fields(cells = entries.len()))]
    async fn upsert_batch(&self, entries: Vec<CellCostEntry>) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        let cells = entries.len();
        let db = self.db.clone();
        let store = self.store.clone();

        // one write batch, so a failed upsert leaves nothing behind
        let written = task::spawn_blocking(move || -> anyhow::Result<usize> {
            let mut batch = db.batch();
            for entry in &entries {
                let bytes = postcard::to_stdvec(&StoredCost {
                    cost: entry.cost,
                    last_updated_ms: entry.last_updated.timestamp_millis(),
                })?;
                batch.insert(&store, cell_key(entry.cell).to_vec(), bytes);
            }
            batch.commit()?;
            Ok(entries.len())
        })
        .await
        .map_err(|e| RouteError::store(format!("Batch writer panicked: {e}"), cells))?
        .map_err(|e| RouteError::store(format!("Batch upsert failed: {e}"), cells))?;

        tracing::debug!("Upserted {} cells", written);
        Ok(written)
    }

    #[tracing::instrument(name = "range_query", level = "debug", skip(self))]
    async fn range_query(&self, min: GridCell, max: GridCell) -> Result<HashMap<GridCell, f64>> {
        let store = self.store.clone();
        let bbox = BoundingBox::new(min, max);

        let found = task::spawn_blocking(move || -> anyhow::Result<HashMap<GridCell, f64>> {
            let mut found = HashMap::new();
            // row-major keys: one contiguous scan per latitude row
            for lat in bbox.min.lat_tenths()..=bbox.max.lat_tenths() {
                let (Some(from), Some(to)) = (
                    GridCell::from_tenths(lat, bbox.min.lon_tenths()),
                    GridCell::from_tenths(lat, bbox.max.lon_tenths()),
                ) else {
                    continue;
                };
                for item in store.range(cell_key(from)..=cell_key(to)) {
                    let (key, value) = item.into_inner()?;
                    let cell = key_cell(&key).ok_or(anyhow!("Malformed grid key"))?;
                    found.insert(cell, decode(&value)?.cost);
                }
            }
            Ok(found)
        })
        .await
        .map_err(|e| RouteError::store(format!("Range reader panicked: {e}"), 0))?
        .map_err(|e| RouteError::store(format!("Range query failed: {e}"), 0))?;

        tracing::debug!("Found {} cells in {}", found.len(), bbox);
        Ok(found)
    }

    async fn get(&self, cell: GridCell) -> Result<Option<CellCost>> {
        let store = self.store.clone();
        task::spawn_blocking(move || get_from_store(&store, cell))
            .await
            .map_err(|e| RouteError::store(format!("Reader panicked: {e}"), 0))?
            .map_err(|e| RouteError::store(format!("Read failed for {cell}: {e}"), 0))
    }
}
