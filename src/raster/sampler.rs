//! WAFS gridded turbulence sampler

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::fetch::{RasterCache, RasterProduct, RasterResource, ResolvedRaster, fetch_with_fallback};
use super::legend::{classify_edr, classify_wind};
use super::projection::read_pixel;
use super::run::{FlightTiming, ModelRun, forecast_hour};
use super::{ModelSample, PointSample, TurbulenceModel};
use crate::config::RasterConfig;
use crate::models::{ModelProvenance, Waypoint};
use crate::{Result, TurbcastError};

/// EDR reported for pixels that carry no data
pub const NO_DATA_EDR: f64 = 0.05;

const SOURCE: &str = "WAFS";

/// Both products for one forecast hour; `None` where the fetch failed
struct HourRasters {
    hour: u32,
    turbulence: Option<ResolvedRaster>,
    wind: Option<ResolvedRaster>,
}

pub struct WafsSampler {
    resource: Arc<dyn RasterResource>,
    cache: Arc<RasterCache>,
    max_attempts: u32,
    max_forecast_hour: u32,
    pressure_level_hpa: u32,
}

impl WafsSampler {
    #[must_use]
    pub fn new(resource: Arc<dyn RasterResource>, cache: Arc<RasterCache>, config: &RasterConfig) -> Self {
        Self {
            resource,
            cache,
            max_attempts: config.max_run_attempts,
            max_forecast_hour: config.max_forecast_hour,
            pressure_level_hpa: config.pressure_level_hpa,
        }
    }

    async fn fetch_product(&self, run: ModelRun, hour: u32, product: RasterProduct) -> Option<ResolvedRaster> {
        match fetch_with_fallback(
            self.resource.as_ref(),
            &self.cache,
            run,
            hour,
            product,
            self.pressure_level_hpa,
            self.max_attempts,
        )
        .await
        {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                warn!(hour, product = product.slug(), error = %e, "Raster product unavailable");
                None
            }
        }
    }

    async fn fetch_hour(&self, run: ModelRun, hour: u32) -> HourRasters {
        let (turbulence, wind) = tokio::join!(
            self.fetch_product(run, hour, RasterProduct::Turbulence),
            self.fetch_product(run, hour, RasterProduct::WindSpeed),
        );
        HourRasters { hour, turbulence, wind }
    }

    /// Forecast hour each waypoint is flown through
    fn hours_for(&self, run: &ModelRun, waypoints: &[Waypoint], timing: &FlightTiming) -> Vec<u32> {
        let total_km = waypoints.last().map_or(0.0, |w| w.distance_from_origin_km);
        waypoints
            .iter()
            .map(|w| {
                let progress = if total_km > 0.0 {
                    w.distance_from_origin_km / total_km
                } else {
                    0.0
                };
                forecast_hour(run, timing.time_at(progress), self.max_forecast_hour)
            })
            .collect()
    }
}

fn sample_point(waypoint: &Waypoint, rasters: Option<&HourRasters>) -> PointSample {
    let Some(rasters) = rasters else {
        return PointSample::default();
    };

    let edr = rasters.turbulence.as_ref().map(|r| {
        read_pixel(&r.image, waypoint.longitude, waypoint.latitude).map_or(NO_DATA_EDR, classify_edr)
    });
    let wind_speed_kt = rasters.wind.as_ref().map(|r| {
        read_pixel(&r.image, waypoint.longitude, waypoint.latitude).map_or(0.0, classify_wind)
    });

    PointSample { edr, wind_speed_kt }
}

/// Run and hour of the most frequently needed hour with turbulence data,
/// ties going to the lower hour
fn headline(hours: &[u32], fetched: &BTreeMap<u32, HourRasters>, pressure_level_hpa: u32) -> Option<ModelProvenance> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for hour in hours {
        *counts.entry(*hour).or_default() += 1;
    }

    let (hour, resolved) = counts
        .iter()
        .filter_map(|(hour, count)| {
            let resolved = fetched.get(hour)?.turbulence.as_ref()?;
            Some((*hour, *count, resolved))
        })
        .fold(None, |best: Option<(u32, usize, &ResolvedRaster)>, candidate| match best {
            Some(current) if current.1 >= candidate.1 => Some(current),
            _ => Some(candidate),
        })
        .map(|(hour, _, resolved)| (hour, resolved))?;

    Some(ModelProvenance {
        source: SOURCE.to_string(),
        run_id: resolved.run.id(),
        forecast_hour: hour,
        pressure_level_hpa,
    })
}

#[async_trait]
impl TurbulenceModel for WafsSampler {
    #[instrument(level = "debug", skip(self, waypoints), fields(waypoints = waypoints.len()))]
    async fn sample(&self, waypoints: &[Waypoint], timing: &FlightTiming) -> Result<ModelSample> {
        // Addresses are keyed by run, so entries from past cycles are never read again
        self.cache.purge_expired();

        let run = ModelRun::latest_for(timing.departure);
        let hours = self.hours_for(&run, waypoints, timing);

        let mut distinct = hours.clone();
        distinct.sort_unstable();
        distinct.dedup();
        debug!(run = %run, hours = ?distinct, "Fetching raster hours");

        let fetched: BTreeMap<u32, HourRasters> = join_all(distinct.iter().map(|hour| self.fetch_hour(run, *hour)))
            .await
            .into_iter()
            .map(|rasters| (rasters.hour, rasters))
            .collect();

        if fetched.values().all(|r| r.turbulence.is_none()) {
            return Err(TurbcastError::upstream(format!(
                "no turbulence raster available for run {run} or its fallbacks"
            )));
        }

        let points = waypoints
            .iter()
            .zip(hours.iter())
            .map(|(waypoint, hour)| sample_point(waypoint, fetched.get(hour)))
            .collect();

        Ok(ModelSample {
            points,
            provenance: headline(&hours, &fetched, self.pressure_level_hpa),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::raster::fetch::{FetchError, RasterAddress};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use image::{Rgba, RgbaImage};
    use std::collections::HashSet;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const WIND_110: Rgba<u8> = Rgba([255, 220, 0, 255]);

    /// Serves uniform images per product; listed products or hours answer 404
    struct UniformResource {
        turbulence: Rgba<u8>,
        wind: Rgba<u8>,
        missing_products: HashSet<RasterProduct>,
        missing_hours: HashSet<u32>,
        missing_runs: HashSet<ModelRun>,
    }

    impl UniformResource {
        fn new() -> Self {
            Self {
                turbulence: RED,
                wind: WIND_110,
                missing_products: HashSet::new(),
                missing_hours: HashSet::new(),
                missing_runs: HashSet::new(),
            }
        }
    }

    #[async_trait]
    impl RasterResource for UniformResource {
        async fn fetch(&self, address: &RasterAddress) -> std::result::Result<RgbaImage, FetchError> {
            if self.missing_products.contains(&address.product)
                || self.missing_hours.contains(&address.forecast_hour)
                || self.missing_runs.contains(&address.run)
            {
                return Err(FetchError::NotFound);
            }
            let pixel = match address.product {
                RasterProduct::Turbulence => self.turbulence,
                RasterProduct::WindSpeed => self.wind,
            };
            Ok(RgbaImage::from_pixel(360, 200, pixel))
        }
    }

    fn departure() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 13, 0, 0).unwrap()
    }

    fn sampler(resource: UniformResource) -> WafsSampler {
        let clock = Arc::new(ManualClock::new(departure()));
        let cache = Arc::new(RasterCache::new(clock, Duration::minutes(20)));
        WafsSampler::new(Arc::new(resource), cache, &RasterConfig::default())
    }

    fn waypoints(points: &[(f64, f64)]) -> Vec<Waypoint> {
        points
            .iter()
            .enumerate()
            .map(|(index, (lat, lon))| Waypoint {
                latitude: *lat,
                longitude: *lon,
                distance_from_origin_km: index as f64 * 100.0,
                altitude_ft: 35000.0,
                index,
            })
            .collect()
    }

    fn timing(duration_minutes: u32) -> FlightTiming {
        FlightTiming {
            departure: departure(),
            duration_minutes,
        }
    }

    #[tokio::test]
    async fn test_samples_classified_pixels() {
        let sampler = sampler(UniformResource::new());
        let route = waypoints(&[(40.0, -70.0), (45.0, -50.0), (50.0, -20.0)]);

        let sample = sampler.sample(&route, &timing(60)).await.unwrap();
        assert_eq!(sample.points.len(), 3);
        for point in &sample.points {
            assert_eq!(point.edr, Some(0.50));
            assert_eq!(point.wind_speed_kt, Some(110.0));
        }

        let provenance = sample.provenance.as_ref().unwrap();
        assert_eq!(provenance.source, "WAFS");
        assert_eq!(provenance.run_id, "20261019/12z");
        assert_eq!(provenance.pressure_level_hpa, 250);
        assert!(sample.has_raster());
    }

    #[tokio::test]
    async fn test_out_of_bounds_is_no_data_baseline() {
        let sampler = sampler(UniformResource::new());
        let route = waypoints(&[(60.0, 0.0), (80.0, 10.0)]);

        let sample = sampler.sample(&route, &timing(60)).await.unwrap();
        assert_eq!(sample.points[0].edr, Some(0.50));
        assert_eq!(sample.points[1].edr, Some(NO_DATA_EDR));
        assert_eq!(sample.points[1].wind_speed_kt, Some(0.0));
    }

    #[tokio::test]
    async fn test_transparent_pixels_are_no_data() {
        let mut resource = UniformResource::new();
        resource.turbulence = Rgba([255, 0, 0, 0]);
        let sample = sampler(resource)
            .sample(&waypoints(&[(10.0, 10.0)]), &timing(30))
            .await
            .unwrap();
        assert_eq!(sample.points[0].edr, Some(NO_DATA_EDR));
    }

    #[tokio::test]
    async fn test_missing_wind_only_drops_wind() {
        let mut resource = UniformResource::new();
        resource.missing_products.insert(RasterProduct::WindSpeed);
        let sample = sampler(resource)
            .sample(&waypoints(&[(10.0, 10.0), (12.0, 14.0)]), &timing(30))
            .await
            .unwrap();
        assert!(sample.points.iter().all(|p| p.edr == Some(0.50)));
        assert!(sample.points.iter().all(|p| p.wind_speed_kt.is_none()));
    }

    #[tokio::test]
    async fn test_all_runs_missing_is_an_error() {
        let mut resource = UniformResource::new();
        resource.missing_products.insert(RasterProduct::Turbulence);
        let result = sampler(resource)
            .sample(&waypoints(&[(10.0, 10.0)]), &timing(30))
            .await;
        assert!(matches!(result, Err(TurbcastError::Upstream { .. })));
    }

    #[tokio::test]
    async fn test_stepped_back_run_is_reported() {
        let mut resource = UniformResource::new();
        resource
            .missing_runs
            .insert(ModelRun::latest_for(departure()));
        let sample = sampler(resource)
            .sample(&waypoints(&[(10.0, 10.0)]), &timing(30))
            .await
            .unwrap();
        assert_eq!(sample.provenance.unwrap().run_id, "20261019/06z");
    }

    #[tokio::test]
    async fn test_long_flight_uses_several_hours_and_headline_is_most_common() {
        // Departure 13:00 against the 12z run: the first waypoints round to f000,
        // the rest of a 9 hour flight to f003..f009
        let route = waypoints(&[
            (40.0, -70.0),
            (41.0, -65.0),
            (42.0, -60.0),
            (43.0, -55.0),
            (44.0, -50.0),
            (45.0, -45.0),
            (46.0, -40.0),
            (47.0, -35.0),
            (48.0, -30.0),
            (49.0, -25.0),
        ]);
        let sampler = sampler(UniformResource::new());
        let hours = sampler.hours_for(&ModelRun::latest_for(departure()), &route, &timing(540));
        assert_eq!(hours.first(), Some(&0));
        assert_eq!(hours.last(), Some(&9));

        let sample = sampler.sample(&route, &timing(540)).await.unwrap();
        let headline = sample.provenance.unwrap().forecast_hour;

        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for h in &hours {
            *counts.entry(*h).or_default() += 1;
        }
        let best = counts.values().max().copied().unwrap();
        let expected = counts.iter().find(|(_, c)| **c == best).map(|(h, _)| *h).unwrap();
        assert_eq!(headline, expected);
    }

    #[tokio::test]
    async fn test_failed_hour_leaves_its_waypoints_without_raster() {
        let route = waypoints(&[(40.0, -70.0), (41.0, -65.0), (42.0, -60.0), (43.0, -55.0)]);
        let mut resource = UniformResource::new();
        resource.missing_hours.insert(9);
        let sample = sampler(resource).sample(&route, &timing(540)).await.unwrap();

        assert_eq!(sample.points[0].edr, Some(0.50));
        assert_eq!(sample.points[3].edr, None);
        assert_eq!(sample.points[3].wind_speed_kt, None);
    }

    #[tokio::test]
    async fn test_sampling_sweeps_images_from_past_cycles() {
        let clock = Arc::new(ManualClock::new(departure()));
        let cache = Arc::new(RasterCache::new(clock.clone(), Duration::minutes(20)));
        let sampler = WafsSampler::new(Arc::new(UniformResource::new()), cache.clone(), &RasterConfig::default());
        let route = waypoints(&[(40.0, -70.0), (45.0, -50.0)]);

        sampler
            .sample(&route, &FlightTiming { departure: departure(), duration_minutes: 10 })
            .await
            .unwrap();
        let per_cycle = cache.image_count();
        assert_eq!(per_cycle, 2);

        for cycle in 1..=4 {
            clock.advance(Duration::hours(6));
            let later = departure() + Duration::hours(6 * cycle);
            sampler
                .sample(&route, &FlightTiming { departure: later, duration_minutes: 10 })
                .await
                .unwrap();
            assert_eq!(cache.image_count(), per_cycle);
        }
    }
}
