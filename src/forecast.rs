//! Route forecast pipeline: route, cache, model and reports, fusion

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::Result;
use crate::advisories::{AdvisoryMatcher, HazardReports};
use crate::cache::ForecastCache;
use crate::clock::Clock;
use crate::config::RouteConfig;
use crate::fusion::fuse;
use crate::models::{Coordinate, RouteForecast};
use crate::raster::{FlightTiming, ModelRun, TurbulenceModel, forecast_hour};
use crate::routing::build_route;

/// One forecast request
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    /// Defaults to now
    pub departure: Option<DateTime<Utc>>,
    /// Defaults to the configured waypoint spacing
    pub spacing_km: Option<f64>,
}

impl ForecastRequest {
    #[must_use]
    pub fn new(origin: Coordinate, destination: Coordinate) -> Self {
        Self {
            origin,
            destination,
            departure: None,
            spacing_km: None,
        }
    }
}

/// Cache key for a route departing in a given model cycle and forecast step
#[must_use]
pub fn cache_key(origin: &Coordinate, destination: &Coordinate, departure: DateTime<Utc>, spacing_km: f64) -> String {
    let run = ModelRun::latest_for(departure);
    format!(
        "{CACHE_KEY_PREFIX}{}:{}:{}:f{:03}:{:.1}",
        origin.key_fragment(),
        destination.key_fragment(),
        run.id(),
        forecast_hour(&run, departure, u32::MAX),
        spacing_km
    )
}

/// Prefix shared by every forecast cache key
pub const CACHE_KEY_PREFIX: &str = "forecast:v2:";

pub struct TurbulenceForecastService {
    model: Arc<dyn TurbulenceModel>,
    matcher: AdvisoryMatcher,
    cache: ForecastCache,
    clock: Arc<dyn Clock>,
    default_spacing_km: f64,
    stage_timeout: Duration,
}

impl TurbulenceForecastService {
    #[must_use]
    pub fn new(
        model: Arc<dyn TurbulenceModel>,
        matcher: AdvisoryMatcher,
        cache: ForecastCache,
        clock: Arc<dyn Clock>,
        config: &RouteConfig,
    ) -> Self {
        Self {
            model,
            matcher,
            cache,
            clock,
            default_spacing_km: config.waypoint_spacing_km,
            stage_timeout: Duration::from_secs(u64::from(config.pipeline_timeout_seconds)),
        }
    }

    /// Forecast turbulence along a route.
    ///
    /// Only invalid input is returned as an error. Model or feed outages are
    /// reflected in the forecast metadata instead.
    #[instrument(skip(self), fields(origin = %request.origin.key_fragment(), destination = %request.destination.key_fragment()))]
    pub async fn forecast(&self, request: &ForecastRequest) -> Result<RouteForecast> {
        let spacing_km = request.spacing_km.unwrap_or(self.default_spacing_km);
        let route = build_route(request.origin, request.destination, spacing_km)?;
        let departure = request.departure.unwrap_or_else(|| self.clock.now());

        let key = cache_key(&route.origin, &route.destination, departure, spacing_km);
        if let Some(cached) = self.cache.get::<RouteForecast>(&key).await {
            info!("Serving forecast from cache");
            return Ok(cached);
        }

        let timing = FlightTiming {
            departure,
            duration_minutes: route.estimated_duration_minutes,
        };

        let (sample, reports) = tokio::join!(
            timeout(self.stage_timeout, self.model.sample(&route.waypoints, &timing)),
            timeout(self.stage_timeout, self.matcher.match_route(&route.waypoints)),
        );

        let sample = match sample {
            Ok(Ok(sample)) => Some(sample),
            Ok(Err(e)) => {
                warn!(error = %e, "Model unavailable, using heuristic baseline");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.stage_timeout, "Model sampling timed out");
                None
            }
        };

        let reports = reports.unwrap_or_else(|_| {
            warn!(timeout = ?self.stage_timeout, "Advisory matching timed out");
            HazardReports::unavailable()
        });

        let forecast = fuse(&route, sample.as_ref(), &reports, self.clock.now());

        // Pure-heuristic results are never cached
        if forecast.metadata.using_fallback {
            info!("Forecast uses heuristic fallback only, not caching");
        } else {
            self.cache.set(&key, &forecast).await;
        }

        info!(
            segments = forecast.segments.len(),
            worst = ?forecast.worst_level(),
            quality = ?forecast.metadata.data_quality,
            "Forecast computed"
        );
        Ok(forecast)
    }
}
