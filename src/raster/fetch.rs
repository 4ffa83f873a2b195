//! Raster retrieval: addressing, HTTP client, shared image cache and the
//! run-fallback state machine.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use image::RgbaImage;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::run::ModelRun;
use crate::clock::Clock;
use crate::config::RasterConfig;
use crate::{Result, TurbcastError};

/// Published raster products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterProduct {
    Turbulence,
    WindSpeed,
}

impl RasterProduct {
    #[must_use]
    pub fn slug(&self) -> &'static str {
        match self {
            RasterProduct::Turbulence => "turb_edr",
            RasterProduct::WindSpeed => "wind_speed",
        }
    }
}

/// Identity of one raster image
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RasterAddress {
    pub run: ModelRun,
    pub forecast_hour: u32,
    pub product: RasterProduct,
    pub pressure_level_hpa: u32,
}

impl RasterAddress {
    /// Path relative to the raster base URL
    #[must_use]
    pub fn path(&self) -> String {
        format!(
            "{}/{:02}/f{:03}/{}_{}hpa.png",
            self.run.date.format("%Y%m%d"),
            self.run.hour,
            self.forecast_hour,
            self.product.slug(),
            self.pressure_level_hpa
        )
    }
}

/// Why a single raster fetch failed
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    /// HTTP 404, the only status that steps back to an older run
    #[error("raster not published")]
    NotFound,
    #[error("raster request returned HTTP {0}")]
    Status(u16),
    #[error("raster transport error: {0}")]
    Transport(String),
    #[error("raster decode error: {0}")]
    Decode(String),
    #[error("no published run after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Source of raster images
#[async_trait]
pub trait RasterResource: Send + Sync {
    async fn fetch(&self, address: &RasterAddress) -> std::result::Result<RgbaImage, FetchError>;
}

/// Decode a PNG (or any format the image crate recognises) into RGBA
pub fn decode_image(bytes: &[u8]) -> std::result::Result<RgbaImage, FetchError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| FetchError::Decode(e.to_string()))
}

/// Raster resource served over HTTP
pub struct HttpRasterResource {
    client: Client,
    base_url: String,
}

impl HttpRasterResource {
    pub fn new(config: &RasterConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(u64::from(config.timeout_seconds)))
            .user_agent(concat!("turbcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TurbcastError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn url_for(&self, address: &RasterAddress) -> String {
        format!("{}/{}", self.base_url, address.path())
    }
}

#[async_trait]
impl RasterResource for HttpRasterResource {
    #[instrument(level = "debug", skip(self), fields(path = %address.path()))]
    async fn fetch(&self, address: &RasterAddress) -> std::result::Result<RgbaImage, FetchError> {
        let response = self
            .client
            .get(self.url_for(address))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        // Decoding is CPU bound
        tokio::task::spawn_blocking(move || decode_image(&bytes))
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?
    }
}

struct CachedImage {
    image: Arc<RgbaImage>,
    stored_at: DateTime<Utc>,
}

struct CachedRun {
    run: ModelRun,
    stored_at: DateTime<Utc>,
}

type RunKey = (ModelRun, u32, RasterProduct);

/// Process-wide cache of decoded images and resolved runs.
///
/// Values are inserted whole after a successful decode and never mutated, so
/// concurrent requests can at worst duplicate a fetch.
pub struct RasterCache {
    images: DashMap<RasterAddress, CachedImage>,
    runs: DashMap<RunKey, CachedRun>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl RasterCache {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            images: DashMap::new(),
            runs: DashMap::new(),
            clock,
            ttl,
        }
    }

    fn is_fresh(&self, stored_at: DateTime<Utc>) -> bool {
        self.clock.now() - stored_at < self.ttl
    }

    pub fn image(&self, address: &RasterAddress) -> Option<Arc<RgbaImage>> {
        let hit = self
            .images
            .get(address)
            .map(|entry| (entry.image.clone(), entry.stored_at));
        match hit {
            Some((image, stored_at)) if self.is_fresh(stored_at) => Some(image),
            Some(_) => {
                self.images.remove(address);
                None
            }
            None => None,
        }
    }

    pub fn store_image(&self, address: RasterAddress, image: Arc<RgbaImage>) {
        let stored_at = self.clock.now();
        self.images.insert(address, CachedImage { image, stored_at });
    }

    /// Run that last satisfied a request starting from `start`
    pub fn resolved_run(&self, start: ModelRun, forecast_hour: u32, product: RasterProduct) -> Option<ModelRun> {
        let key = (start, forecast_hour, product);
        let hit = self.runs.get(&key).map(|entry| (entry.run, entry.stored_at));
        match hit {
            Some((run, stored_at)) if self.is_fresh(stored_at) => Some(run),
            Some(_) => {
                self.runs.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn remember_run(&self, start: ModelRun, forecast_hour: u32, product: RasterProduct, run: ModelRun) {
        let stored_at = self.clock.now();
        self.runs.insert((start, forecast_hour, product), CachedRun { run, stored_at });
    }

    /// Drop every expired entry
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        self.images.retain(|_, entry| now - entry.stored_at < self.ttl);
        self.runs.retain(|_, entry| now - entry.stored_at < self.ttl);
    }

    #[must_use]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

/// A successfully fetched raster and the run it came from
#[derive(Debug, Clone)]
pub struct ResolvedRaster {
    pub image: Arc<RgbaImage>,
    pub run: ModelRun,
    pub attempts: u32,
}

enum FallbackState {
    Attempt { run: ModelRun, attempt: u32 },
    Success(ResolvedRaster),
    Failure(FetchError),
}

/// Fetch one product/hour, stepping back one cycle per 404.
///
/// At most `max_attempts` runs are tried. Any failure other than 404 ends
/// the search immediately.
#[instrument(level = "debug", skip(resource, cache))]
pub async fn fetch_with_fallback(
    resource: &dyn RasterResource,
    cache: &RasterCache,
    start: ModelRun,
    forecast_hour: u32,
    product: RasterProduct,
    pressure_level_hpa: u32,
    max_attempts: u32,
) -> std::result::Result<ResolvedRaster, FetchError> {
    // A remembered run resumes the search without resetting the attempt budget
    let mut state = match cache.resolved_run(start, forecast_hour, product) {
        Some(run) => FallbackState::Attempt {
            run,
            attempt: run.cycles_until(&start) + 1,
        },
        None => FallbackState::Attempt { run: start, attempt: 1 },
    };

    loop {
        state = match state {
            FallbackState::Attempt { run, attempt } => {
                let address = RasterAddress {
                    run,
                    forecast_hour,
                    product,
                    pressure_level_hpa,
                };

                if let Some(image) = cache.image(&address) {
                    debug!(run = %run, "Raster cache hit");
                    FallbackState::Success(ResolvedRaster { image, run, attempts: attempt })
                } else {
                    match resource.fetch(&address).await {
                        Ok(image) => {
                            let image = Arc::new(image);
                            cache.store_image(address, image.clone());
                            FallbackState::Success(ResolvedRaster { image, run, attempts: attempt })
                        }
                        Err(FetchError::NotFound) if attempt < max_attempts => {
                            info!(run = %run, "Raster not published yet, stepping back one cycle");
                            FallbackState::Attempt {
                                run: run.previous(),
                                attempt: attempt + 1,
                            }
                        }
                        Err(FetchError::NotFound) => FallbackState::Failure(FetchError::Exhausted {
                            attempts: attempt,
                        }),
                        Err(e) => FallbackState::Failure(e),
                    }
                }
            }
            FallbackState::Success(resolved) => {
                cache.remember_run(start, forecast_hour, product, resolved.run);
                return Ok(resolved);
            }
            FallbackState::Failure(e) => {
                warn!(error = %e, "Raster fetch failed");
                return Err(e);
            }
        };
    }
}
