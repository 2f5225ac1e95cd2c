//! Weather grid cache
//!
//! Durable mapping from [`GridCell`] to its last computed traversal cost.
//! Writers are ingestion batches, readers are route attempts; the store is
//! the only shared mutable resource in the system.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::Result;
use crate::grid::{BoundingBox, GridCell};

mod fjall_store;

pub use fjall_store::FjallCostStore;

/// Persisted cost of one cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellCost {
    /// Traversal cost, always at or above the cost model floor
    pub cost: f64,
    /// When the cost was computed
    pub last_updated: DateTime<Utc>,
}

/// One row of a batch write
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellCostEntry {
    pub cell: GridCell,
    pub cost: f64,
    pub last_updated: DateTime<Utc>,
}

impl CellCostEntry {
    #[must_use]
    pub fn new(cell: GridCell, cost: f64, last_updated: DateTime<Utc>) -> Self {
        Self {
            cell,
            cost,
            last_updated,
        }
    }
}

/// Ranged reads and idempotent batch writes over cell costs
#[async_trait]
pub trait CostStore: Send + Sync {
    /// Insert or overwrite every entry, returning the number written.
    ///
    /// Re-inserting a cell replaces its cost and timestamp. An empty batch is
    /// a no-op.
    async fn upsert_batch(&self, entries: Vec<CellCostEntry>) -> Result<usize>;

    /// All known costs inside the inclusive rectangle `min..=max`.
    ///
    /// Cells without a stored cost are absent from the result.
    async fn range_query(&self, min: GridCell, max: GridCell) -> Result<HashMap<GridCell, f64>>;

    /// Stored cost and timestamp of one cell
    async fn get(&self, cell: GridCell) -> Result<Option<CellCost>>;
}

/// Read side used by route attempts: all known costs inside a window
#[async_trait]
pub trait CostSource: Send + Sync {
    async fn costs_within(&self, window: BoundingBox) -> Result<HashMap<GridCell, f64>>;
}

#[async_trait]
impl<T: CostStore + ?Sized> CostSource for T {
    async fn costs_within(&self, window: BoundingBox) -> Result<HashMap<GridCell, f64>> {
        self.range_query(window.min, window.max).await
    }
}

/// In-process store, used for live-fetch windows and tests
#[derive(Debug, Default)]
pub struct MemoryCostStore {
    cells: RwLock<BTreeMap<GridCell, CellCost>>,
}

impl MemoryCostStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored cells
    pub async fn len(&self) -> usize {
        self.cells.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cells.read().await.is_empty()
    }
}

#[async_trait]
impl CostStore for MemoryCostStore {
    async fn upsert_batch(&self, entries: Vec<CellCostEntry>) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        let mut cells = self.cells.write().await;
        let written = entries.len();
        for entry in entries {
            cells.insert(
                entry.cell,
                CellCost {
                    cost: entry.cost,
                    last_updated: entry.last_updated,
                },
            );
        }
        Ok(written)
    }

    async fn range_query(&self, min: GridCell, max: GridCell) -> Result<HashMap<GridCell, f64>> {
        let bbox = BoundingBox::new(min, max);
        let cells = self.cells.read().await;
        let mut found = HashMap::new();

        // row-major keys: one contiguous range per latitude row
        for lat in bbox.min.lat_tenths()..=bbox.max.lat_tenths() {
            let (Some(from), Some(to)) = (
                GridCell::from_tenths(lat, bbox.min.lon_tenths()),
                GridCell::from_tenths(lat, bbox.max.lon_tenths()),
            ) else {
                continue;
            };
            found.extend(cells.range(from..=to).map(|(cell, entry)| (*cell, entry.cost)));
        }
        Ok(found)
    }

    async fn get(&self, cell: GridCell) -> Result<Option<CellCost>> {
        Ok(self.cells.read().await.get(&cell).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn cell(lat: i32, lon: i32) -> GridCell {
        GridCell::from_tenths(lat, lon).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_cell() {
        let store = MemoryCostStore::new();
        let t1 = Utc::now();
        let t2 = t1 + Duration::minutes(30);

        store
            .upsert_batch(vec![CellCostEntry::new(cell(189, 729), 5.0, t1)])
            .await
            .unwrap();
        store
            .upsert_batch(vec![CellCostEntry::new(cell(189, 729), 7.0, t2)])
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        let stored = store.get(cell(189, 729)).await.unwrap().unwrap();
        assert_eq!(stored.cost, 7.0);
        assert_eq!(stored.last_updated, t2);
    }

    #[tokio::test]
    async fn test_concurrent_overlapping_writers() {
        let store = std::sync::Arc::new(MemoryCostStore::new());
        let t_a = Utc::now();
        let t_b = t_a + Duration::minutes(5);

        let writer = |from: i32, to: i32, cost: f64, at: DateTime<Utc>| {
            let store = store.clone();
            tokio::spawn(async move {
                let entries = (from..=to)
                    .flat_map(|lat| (0..10).map(move |lon| cell(lat, lon)))
                    .map(|c| CellCostEntry::new(c, cost, at))
                    .collect();
                store.upsert_batch(entries).await
            })
        };
        let a = writer(0, 5, 1.0, t_a);
        let b = writer(3, 8, 2.0, t_b);
        assert_eq!(a.await.unwrap().unwrap(), 60);
        assert_eq!(b.await.unwrap().unwrap(), 60);

        assert_eq!(store.len().await, 90);
        // each batch lands whole, so the overlap comes from a single writer
        let winner = store.get(cell(3, 0)).await.unwrap().unwrap();
        for lat in 3..=5 {
            for lon in 0..10 {
                let stored = store.get(cell(lat, lon)).await.unwrap().unwrap();
                assert_eq!(stored, winner);
            }
        }
        assert!(
            (winner.cost == 1.0 && winner.last_updated == t_a)
                || (winner.cost == 2.0 && winner.last_updated == t_b)
        );
        assert_eq!(store.get(cell(0, 0)).await.unwrap().unwrap().cost, 1.0);
        assert_eq!(store.get(cell(8, 9)).await.unwrap().unwrap().cost, 2.0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let store = MemoryCostStore::new();
        assert_eq!(store.upsert_batch(Vec::new()).await.unwrap(), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_range_query_is_inclusive_and_skips_unknown() {
        let store = MemoryCostStore::new();
        let now = Utc::now();
        let entries = vec![
            CellCostEntry::new(cell(0, 0), 1.0, now),
            CellCostEntry::new(cell(0, 2), 2.0, now),
            CellCostEntry::new(cell(2, 2), 3.0, now),
            CellCostEntry::new(cell(3, 0), 4.0, now),
            CellCostEntry::new(cell(1, 5), 5.0, now),
        ];
        store.upsert_batch(entries).await.unwrap();

        let found = store.range_query(cell(2, 2), cell(0, 0)).await.unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[&cell(0, 0)], 1.0);
        assert_eq!(found[&cell(2, 2)], 3.0);
        assert!(!found.contains_key(&cell(1, 1)));
        assert!(!found.contains_key(&cell(3, 0)));
        assert!(!found.contains_key(&cell(1, 5)));
    }
}
