//! `AquaRoute` CLI
//!
//! Serves the route API, plans a single route, or refreshes the weather grid.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use aquaroute::cache::CostSource;
use aquaroute::config::{AppConfig, CostSourceKind, RegionConfig};
use aquaroute::ingest::{IngestionMode, bands_within};
use aquaroute::{
    CellSetLandMask, CostModel, FjallCostStore, GridIndexer, IngestionPipeline, LandMask,
    LiveCostSource, OpenSea, OpenWeatherMapClient, PathfindingEngine, RouteService, telemetry,
    web,
};

#[derive(Parser)]
#[command(name = "aquaroute")]
#[command(about = "Weather-weighted maritime route planning", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP route API
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Plan one route and print it
    Route {
        /// Start as LAT,LON
        #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
        from: (f64, f64),
        /// Destination as LAT,LON
        #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
        to: (f64, f64),
    },
    /// Refresh cell costs from the weather provider
    Ingest {
        /// Region as LAT_MIN,LON_MIN,LAT_MAX,LON_MAX (whole globe when absent)
        #[arg(long, value_parser = parse_region, allow_hyphen_values = true)]
        region: Option<RegionConfig>,
        /// `flat` batches or latitude `bands`
        #[arg(long)]
        mode: Option<IngestionMode>,
    },
}

fn parse_numbers(value: &str, expected: usize) -> std::result::Result<Vec<f64>, String> {
    let numbers = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid number in '{value}': {e}"))?;
    if numbers.len() != expected {
        return Err(format!(
            "expected {expected} comma-separated values, got {}",
            numbers.len()
        ));
    }
    Ok(numbers)
}

fn parse_coordinate(value: &str) -> std::result::Result<(f64, f64), String> {
    let n = parse_numbers(value, 2)?;
    Ok((n[0], n[1]))
}

fn parse_region(value: &str) -> std::result::Result<RegionConfig, String> {
    let n = parse_numbers(value, 4)?;
    Ok(RegionConfig {
        lat_min: n[0],
        lon_min: n[1],
        lat_max: n[2],
        lon_max: n[3],
    })
}

fn open_store(config: &AppConfig) -> Result<Arc<FjallCostStore>> {
    let dir = config.cache_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;
    let store = FjallCostStore::open(&dir)
        .with_context(|| format!("Failed to open grid store at {}", dir.display()))?;
    Ok(Arc::new(store))
}

fn weather_client(config: &AppConfig) -> Result<Arc<OpenWeatherMapClient>> {
    Ok(Arc::new(
        OpenWeatherMapClient::new(&config.weather).context("Failed to create weather client")?,
    ))
}

fn land_mask(config: &AppConfig, indexer: &GridIndexer) -> Result<Arc<dyn LandMask>> {
    match &config.land.mask_path {
        Some(path) => Ok(Arc::new(
            CellSetLandMask::load(path, indexer).context("Failed to load land mask")?,
        )),
        None => Ok(Arc::new(OpenSea)),
    }
}

fn route_service(config: &AppConfig) -> Result<RouteService> {
    let indexer = GridIndexer::default();
    let model = CostModel::new(config.cost);

    let source: Arc<dyn CostSource> = match config.routing.cost_source {
        CostSourceKind::Cache => open_store(config)? as Arc<dyn CostSource>,
        CostSourceKind::Live => Arc::new(LiveCostSource::new(
            weather_client(config)?,
            model,
            indexer,
            config.ingestion.concurrency_limit,
            config.fetch_timeout(),
        )),
    };

    let engine = PathfindingEngine::new(indexer, config.routing.heuristic, model.floor());
    Ok(RouteService::new(
        source,
        land_mask(config, &indexer)?,
        indexer,
        engine,
        config.retry_policy(),
    )
    .with_vessel_speed(config.routing.vessel_speed_knots))
}

async fn serve(config: &AppConfig, port: Option<u16>, shutdown: CancellationToken) -> Result<ExitCode> {
    let service = Arc::new(route_service(config)?);
    web::run(port.unwrap_or(config.server.port), service, shutdown).await?;
    Ok(ExitCode::SUCCESS)
}

async fn plan_route(config: &AppConfig, from: (f64, f64), to: (f64, f64)) -> Result<ExitCode> {
    let service = route_service(config)?;
    match service.calculate_route(from.0, from.1, to.0, to.1).await {
        Ok(plan) => {
            println!(
                "Route with {} waypoints, {:.2} km, about {:.2} h (attempt {}, buffers {}/{})",
                plan.path.len(),
                plan.distance_km,
                plan.estimated_time_hours,
                plan.attempts,
                plan.lat_buffer,
                plan.lon_buffer
            );
            for cell in &plan.path {
                println!("  {cell}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Route failed: {}", e);
            eprintln!("Error: {}", e.user_message());
            Ok(ExitCode::from(if e.is_client_error() { 2 } else { 1 }))
        }
    }
}

async fn ingest(
    config: &AppConfig,
    region: Option<RegionConfig>,
    mode: Option<IngestionMode>,
    cancel: CancellationToken,
) -> Result<ExitCode> {
    let indexer = GridIndexer::default();
    let pipeline = IngestionPipeline::new(
        weather_client(config)?,
        open_store(config)?,
        CostModel::new(config.cost),
        indexer,
    );
    let options = config.ingestion_options();

    let region = match region {
        Some(r) => indexer.bbox(r.lat_min, r.lon_min, r.lat_max, r.lon_max)?,
        None => config.ingestion_region(&indexer)?,
    };

    let report = match mode.unwrap_or(config.ingestion.mode) {
        IngestionMode::Flat => pipeline.run(region, &options, &cancel).await?,
        IngestionMode::Bands => {
            pipeline
                .run_by_bands(&bands_within(region), &options, &cancel)
                .await?
        }
    };

    println!("{report}");
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = AppConfig::load_from_path(cli.config.clone())?;
    let _telemetry = telemetry::init(&config.logging)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            on_signal.cancel();
        }
    });

    match cli.command {
        Command::Serve { port } => serve(&config, port, cancel).await,
        Command::Route { from, to } => plan_route(&config, from, to).await,
        Command::Ingest { region, mode } => ingest(&config, region, mode, cancel).await,
    }
}
