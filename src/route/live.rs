//! Cost source that fetches the window from the weather provider

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::Result;
use crate::cache::CostSource;
use crate::cost::CostModel;
use crate::grid::{BoundingBox, GridCell, GridIndexer};
use crate::ingest::{AdmissionGate, fetch_cell_cost};
use crate::weather::WeatherProvider;

/// Builds each window's costs from fresh observations instead of the cache
///
/// Cells whose fetch fails or times out are left out of the window, exactly
/// like cache misses.
pub struct LiveCostSource {
    provider: Arc<dyn WeatherProvider>,
    model: CostModel,
    indexer: GridIndexer,
    concurrency_limit: usize,
    fetch_timeout: Duration,
}

impl LiveCostSource {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        model: CostModel,
        indexer: GridIndexer,
        concurrency_limit: usize,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            model,
            indexer,
            concurrency_limit,
            fetch_timeout,
        }
    }
}

#[async_trait]
impl CostSource for LiveCostSource {
    #[instrument(skip(self, window), fields(window = %window))]
    async fn costs_within(&self, window: BoundingBox) -> Result<HashMap<GridCell, f64>> {
        let gate = AdmissionGate::new(self.concurrency_limit);
        let cells: Vec<GridCell> = self.indexer.enumerate(window).collect();

        let results = join_all(cells.iter().map(|&cell| {
            let gate = &gate;
            async move {
                let _permit = gate.acquire().await?;
                fetch_cell_cost(self.provider.as_ref(), &self.model, cell, self.fetch_timeout).await
            }
        }))
        .await;

        let mut costs = HashMap::with_capacity(cells.len());
        let mut failed = 0;
        for result in results {
            match result {
                Ok(entry) => {
                    costs.insert(entry.cell, entry.cost);
                }
                Err(e) => {
                    debug!("Live fetch dropped: {}", e);
                    failed += 1;
                }
            }
        }
        debug!(
            "Live window fetched {} of {} cells ({} failed)",
            costs.len(),
            cells.len(),
            failed
        );
        Ok(costs)
    }
}
