use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use turbcast::advisories::{AdvisoryMatcher, HttpAdvisoryFeed};
use turbcast::api::AppState;
use turbcast::cache::{CacheStore, ForecastCache, MemoryStore, PersistentStore};
use turbcast::clock::{Clock, SystemClock};
use turbcast::config::TurbcastConfig;
use turbcast::forecast::TurbulenceForecastService;
use turbcast::location_resolver::{AirportTable, LocationResolver};
use turbcast::raster::{HttpRasterResource, RasterCache, WafsSampler};
use turbcast::{logging, web};

fn open_store(config: &TurbcastConfig) -> Result<Arc<dyn CacheStore>> {
    if config.cache.location.is_empty() {
        info!("No cache location configured, keeping forecasts in memory");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = PersistentStore::open(&config.cache.location)
        .with_context(|| format!("Failed to open cache database at {}", config.cache.location))?;
    info!(location = %config.cache.location, "Opened forecast cache");
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = TurbcastConfig::load().context("Failed to load configuration")?;
    logging::init(&config.logging)?;
    info!(version = turbcast::VERSION, "Starting turbcast");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let raster_cache = Arc::new(RasterCache::new(
        clock.clone(),
        chrono::Duration::minutes(i64::from(config.raster.cache_ttl_minutes)),
    ));
    let sampler = WafsSampler::new(
        Arc::new(HttpRasterResource::new(&config.raster)?),
        raster_cache,
        &config.raster,
    );
    let matcher = AdvisoryMatcher::new(Arc::new(HttpAdvisoryFeed::new(&config.advisories)?), &config.advisories);
    let cache = ForecastCache::new(
        open_store(&config)?,
        clock.clone(),
        chrono::Duration::minutes(i64::from(config.cache.ttl_minutes)),
    );

    let state = Arc::new(AppState {
        service: TurbulenceForecastService::new(Arc::new(sampler), matcher, cache, clock, &config.route),
        resolver: LocationResolver::new(Arc::new(AirportTable::new())),
    });

    web::run(state, &config.server).await
}
