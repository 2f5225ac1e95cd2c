//! Weather grid ingestion
//!
//! Walks a region of the lattice in row-major order, fetches one observation
//! per cell through a shared [`AdmissionGate`], converts it to a cost and
//! writes each batch to the store once all of its fetches have resolved.
//! Failed cells are dropped from the run; a store failure aborts it.

mod gate;

pub use gate::{AdmissionGate, AdmissionPermit};

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CellCostEntry, CostStore};
use crate::cost::CostModel;
use crate::grid::{BoundingBox, GridCell, GridIndexer};
use crate::weather::WeatherProvider;
use crate::{Result, RouteError};

/// How a run partitions its work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionMode {
    /// Consecutive fixed-size batches over the whole region
    #[default]
    Flat,
    /// Disjoint latitude bands, each walked in batches
    Bands,
}

impl std::str::FromStr for IngestionMode {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "bands" => Ok(Self::Bands),
            other => Err(RouteError::config(format!(
                "Unknown ingestion mode '{other}', expected 'flat' or 'bands'"
            ))),
        }
    }
}

/// Per-run limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionOptions {
    /// Fetches awaiting a response at any instant, across the whole run
    pub concurrency_limit: usize,
    /// Cells per store write
    pub batch_size: usize,
    /// Upper bound on a single fetch; a timeout drops the cell
    pub fetch_timeout: Duration,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: 50,
            batch_size: 5000,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestionReport {
    pub cells_enumerated: u64,
    pub cells_written: u64,
    /// Cells whose fetch failed or timed out
    pub cells_failed: u64,
    /// Batches written to the store
    pub batches: u64,
    pub cancelled: bool,
    pub peak_in_flight: usize,
    pub elapsed: Duration,
}

impl fmt::Display for IngestionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cells enumerated, {} written, {} dropped in {} batches ({:.1}s){}",
            self.cells_enumerated,
            self.cells_written,
            self.cells_failed,
            self.batches,
            self.elapsed.as_secs_f64(),
            if self.cancelled { ", cancelled" } else { "" }
        )
    }
}

/// Four disjoint latitude bands covering the globe
#[must_use]
pub fn default_bands() -> Vec<BoundingBox> {
    [(-900, -451), (-450, -1), (0, 449), (450, 900)]
        .into_iter()
        .filter_map(|(south, north)| {
            Some(BoundingBox::new(
                GridCell::from_tenths(south, -crate::grid::MAX_LON_TENTHS)?,
                GridCell::from_tenths(north, crate::grid::MAX_LON_TENTHS)?,
            ))
        })
        .collect()
}

/// The default bands clipped to `region`; bands outside it are dropped
#[must_use]
pub fn bands_within(region: BoundingBox) -> Vec<BoundingBox> {
    default_bands()
        .into_iter()
        .filter_map(|band| {
            let south = band.min.lat_tenths().max(region.min.lat_tenths());
            let north = band.max.lat_tenths().min(region.max.lat_tenths());
            if south > north {
                return None;
            }
            Some(BoundingBox::new(
                GridCell::from_tenths(south, region.min.lon_tenths())?,
                GridCell::from_tenths(north, region.max.lon_tenths())?,
            ))
        })
        .collect()
}

/// Reject band lists where two bands share a cell
pub fn validate_bands(bands: &[BoundingBox]) -> Result<()> {
    for (i, a) in bands.iter().enumerate() {
        for b in &bands[i + 1..] {
            let overlaps = a.min.lat_tenths() <= b.max.lat_tenths()
                && b.min.lat_tenths() <= a.max.lat_tenths()
                && a.min.lon_tenths() <= b.max.lon_tenths()
                && b.min.lon_tenths() <= a.max.lon_tenths();
            if overlaps {
                return Err(RouteError::config(format!("Ingestion bands {a} and {b} overlap")));
            }
        }
    }
    Ok(())
}

/// Fetch one cell and turn the observation into a cost entry
///
/// A timeout is reported as [`RouteError::FetchFailure`] like any other
/// provider failure.
pub async fn fetch_cell_cost(
    provider: &dyn WeatherProvider,
    model: &CostModel,
    cell: GridCell,
    timeout: Duration,
) -> Result<CellCostEntry> {
    let observation = tokio::time::timeout(timeout, provider.fetch(cell))
        .await
        .map_err(|_| {
            RouteError::fetch(
                cell.latitude(),
                cell.longitude(),
                format!("timed out after {}s", timeout.as_secs_f64()),
            )
        })??;

    Ok(CellCostEntry::new(cell, model.cost(&observation), Utc::now()))
}

/// Refreshes cell costs from the weather provider
pub struct IngestionPipeline {
    provider: Arc<dyn WeatherProvider>,
    store: Arc<dyn CostStore>,
    model: CostModel,
    indexer: GridIndexer,
}

impl IngestionPipeline {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        store: Arc<dyn CostStore>,
        model: CostModel,
        indexer: GridIndexer,
    ) -> Self {
        Self {
            provider,
            store,
            model,
            indexer,
        }
    }

    /// Ingest every cell of `region` in consecutive batches
    #[instrument(skip(self, options, cancel), fields(region = %region))]
    pub async fn run(
        &self,
        region: BoundingBox,
        options: &IngestionOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestionReport> {
        info!(
            "Starting ingestion of {} cells (limit {}, batch size {})",
            region.cell_count(self.indexer.config().step_tenths),
            options.concurrency_limit,
            options.batch_size
        );
        let started = Instant::now();
        let gate = AdmissionGate::new(options.concurrency_limit);
        let mut report = IngestionReport::default();

        self.ingest_region(region, options, &gate, cancel, &mut report)
            .await?;

        report.peak_in_flight = gate.peak_in_flight();
        report.elapsed = started.elapsed();
        info!("Ingestion finished: {}", report);
        Ok(report)
    }

    /// Ingest each band in turn, all under one admission gate
    #[instrument(skip(self, bands, options, cancel), fields(bands = bands.len()))]
    pub async fn run_by_bands(
        &self,
        bands: &[BoundingBox],
        options: &IngestionOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestionReport> {
        validate_bands(bands)?;

        let started = Instant::now();
        let gate = AdmissionGate::new(options.concurrency_limit);
        let mut report = IngestionReport::default();

        for band in bands {
            if report.cancelled {
                break;
            }
            info!("Ingesting band {}", band);
            self.ingest_region(*band, options, &gate, cancel, &mut report)
                .await?;
        }

        report.peak_in_flight = gate.peak_in_flight();
        report.elapsed = started.elapsed();
        info!("Band ingestion finished: {}", report);
        Ok(report)
    }

    async fn ingest_region(
        &self,
        region: BoundingBox,
        options: &IngestionOptions,
        gate: &AdmissionGate,
        cancel: &CancellationToken,
        report: &mut IngestionReport,
    ) -> Result<()> {
        let batch_size = options.batch_size.max(1);
        let mut cells = self.indexer.enumerate(region);

        loop {
            if cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(());
            }

            let batch: Vec<GridCell> = cells.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                return Ok(());
            }
            report.cells_enumerated += batch.len() as u64;

            let results = join_all(
                batch
                    .iter()
                    .map(|&cell| self.fetch_admitted(cell, gate, options.fetch_timeout, cancel)),
            )
            .await;

            if cancel.is_cancelled() {
                info!(
                    "Ingestion cancelled, discarding partial batch of {} cells",
                    batch.len()
                );
                report.cancelled = true;
                return Ok(());
            }

            let mut entries = Vec::with_capacity(results.len());
            for result in results.into_iter().flatten() {
                match result {
                    Ok(entry) => entries.push(entry),
                    Err(e) => {
                        debug!("Dropping cell: {}", e);
                        report.cells_failed += 1;
                    }
                }
            }

            let batch_number = report.batches + 1;
            let attempted = entries.len();
            let written = self.store.upsert_batch(entries).await.map_err(|e| {
                warn!("Store rejected batch {}: {}", batch_number, e);
                match e {
                    RouteError::StoreFailure { message, .. } => {
                        RouteError::store(format!("batch {batch_number}: {message}"), attempted)
                    }
                    other => other,
                }
            })?;

            report.cells_written += written as u64;
            report.batches = batch_number;
            debug!(
                "Batch {} written: {}/{} cells",
                batch_number,
                written,
                batch.len()
            );
        }
    }

    /// `None` when the run was cancelled before a slot opened
    async fn fetch_admitted(
        &self,
        cell: GridCell,
        gate: &AdmissionGate,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<Result<CellCostEntry>> {
        let _permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            permit = gate.acquire() => match permit {
                Ok(permit) => permit,
                Err(e) => return Some(Err(e)),
            },
        };
        Some(fetch_cell_cost(self.provider.as_ref(), &self.model, cell, timeout).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCostStore;
    use crate::cost::WeatherObservation;
    use async_trait::async_trait;

    struct CalmSea;

    #[async_trait]
    impl WeatherProvider for CalmSea {
        async fn fetch(&self, _cell: GridCell) -> Result<WeatherObservation> {
            Ok(WeatherObservation::default())
        }
    }

    struct Stalled;

    #[async_trait]
    impl WeatherProvider for Stalled {
        async fn fetch(&self, _cell: GridCell) -> Result<WeatherObservation> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(WeatherObservation::default())
        }
    }

    fn bbox(a: (i32, i32), b: (i32, i32)) -> BoundingBox {
        BoundingBox::new(
            GridCell::from_tenths(a.0, a.1).unwrap(),
            GridCell::from_tenths(b.0, b.1).unwrap(),
        )
    }

    #[test]
    fn test_bands_within_clips_to_region() {
        let region = BoundingBox::new(
            GridCell::from_tenths(-100, 680).unwrap(),
            GridCell::from_tenths(230, 740).unwrap(),
        );
        let bands = bands_within(region);
        let rows: Vec<(i32, i32)> = bands
            .iter()
            .map(|b| (b.min.lat_tenths(), b.max.lat_tenths()))
            .collect();
        assert_eq!(rows, vec![(-100, -1), (0, 230)]);
        assert!(bands
            .iter()
            .all(|b| b.min.lon_tenths() == 680 && b.max.lon_tenths() == 740));
        assert!(validate_bands(&bands).is_ok());

        assert_eq!(bands_within(BoundingBox::GLOBAL), default_bands());
    }

    #[test]
    fn test_default_bands_are_disjoint_and_cover_all_latitudes() {
        let bands = default_bands();
        assert_eq!(bands.len(), 4);
        validate_bands(&bands).unwrap();

        let rows: i32 = bands
            .iter()
            .map(|b| b.max.lat_tenths() - b.min.lat_tenths() + 1)
            .sum();
        assert_eq!(rows, 1801);
    }

    #[test]
    fn test_overlapping_bands_rejected() {
        let bands = [bbox((0, 0), (10, 10)), bbox((10, 5), (20, 20))];
        assert!(matches!(validate_bands(&bands), Err(RouteError::Config { .. })));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Bands".parse::<IngestionMode>().unwrap(), IngestionMode::Bands);
        assert!("tiles".parse::<IngestionMode>().is_err());
    }

    #[tokio::test]
    async fn test_batches_are_written_in_order() {
        let store = Arc::new(MemoryCostStore::new());
        let pipeline = IngestionPipeline::new(
            Arc::new(CalmSea),
            store.clone(),
            CostModel::default(),
            GridIndexer::default(),
        );
        let options = IngestionOptions {
            batch_size: 4,
            ..IngestionOptions::default()
        };

        let report = pipeline
            .run(bbox((0, 0), (2, 2)), &options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.cells_enumerated, 9);
        assert_eq!(report.cells_written, 9);
        assert_eq!(report.batches, 3);
        assert!(!report.cancelled);
        assert_eq!(store.len().await, 9);
    }

    #[tokio::test]
    async fn test_timeout_drops_cell() {
        let store = Arc::new(MemoryCostStore::new());
        let pipeline = IngestionPipeline::new(
            Arc::new(Stalled),
            store.clone(),
            CostModel::default(),
            GridIndexer::default(),
        );
        let options = IngestionOptions {
            fetch_timeout: Duration::from_millis(20),
            ..IngestionOptions::default()
        };

        let report = pipeline
            .run(bbox((0, 0), (0, 1)), &options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.cells_failed, 2);
        assert_eq!(report.cells_written, 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_writes_nothing() {
        let store = Arc::new(MemoryCostStore::new());
        let pipeline = IngestionPipeline::new(
            Arc::new(CalmSea),
            store.clone(),
            CostModel::default(),
            GridIndexer::default(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = pipeline
            .run(bbox((0, 0), (5, 5)), &IngestionOptions::default(), &cancel)
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.batches, 0);
        assert!(store.is_empty().await);
    }
}
