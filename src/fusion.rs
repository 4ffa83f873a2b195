//! Combines model output, reports and heuristics into a route forecast

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::advisories::HazardReports;
use crate::heuristic::{heuristic_edr, heuristic_wind_direction, heuristic_wind_speed};
use crate::models::{DataQuality, ForecastMetadata, Route, RouteForecast, SegmentForecast, TurbulenceSample};
use crate::raster::ModelSample;

/// Build the forecast for every waypoint of `route`.
///
/// A missing model sample is the same as a sampler failure. This never fails;
/// the worst case is the pure heuristic path.
#[must_use]
pub fn fuse(
    route: &Route,
    model: Option<&ModelSample>,
    reports: &HazardReports,
    now: DateTime<Utc>,
) -> RouteForecast {
    let segments: Vec<SegmentForecast> = route
        .waypoints
        .iter()
        .map(|waypoint| {
            let point = model.map(|m| m.point(waypoint.index)).unwrap_or_default();
            let (lat, lon, alt, index) = (
                waypoint.latitude,
                waypoint.longitude,
                waypoint.altitude_ft,
                waypoint.index,
            );

            let baseline = point
                .edr
                .unwrap_or_else(|| heuristic_edr(lat, lon, alt, index));
            let edr = reports
                .waypoint_floor(waypoint)
                .map_or(baseline, |floor| baseline.max(floor));

            let wind_speed = point
                .wind_speed_kt
                .unwrap_or_else(|| heuristic_wind_speed(lat, lon, alt, index));

            SegmentForecast {
                waypoint: waypoint.clone(),
                turbulence: TurbulenceSample::new(edr, wind_speed, heuristic_wind_direction(lat, lon, index)),
            }
        })
        .collect();

    let has_raster = model.is_some_and(ModelSample::has_raster);
    let metadata = ForecastMetadata {
        pirep_count: reports.pirep_count(),
        sigmet_count: reports.sigmet_count(),
        airmet_count: reports.airmet_count(),
        data_quality: DataQuality::from_counts(
            reports.pirep_count(),
            reports.sigmet_count(),
            reports.airmet_count(),
        ),
        last_updated: now,
        using_fallback: !has_raster && !reports.has_reports(),
        model_only: reports.feeds_degraded(),
        model: model.and_then(|m| m.provenance.clone()),
    };

    debug!(
        segments = segments.len(),
        using_fallback = metadata.using_fallback,
        model_only = metadata.model_only,
        "Fused route forecast"
    );

    RouteForecast {
        route: route.clone(),
        segments,
        metadata,
    }
}
