//! Great-circle route construction with a climb/cruise/descent profile

use tracing::instrument;

use crate::models::{Coordinate, Route, Waypoint};
use crate::{Result, TurbcastError};

/// Mean Earth radius used for the direct geodesic formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const CRUISE_SPEED_KMH: f64 = 800.0;
const CLIMB_START_FT: f64 = 5000.0;
const DESCENT_END_FT: f64 = 2000.0;
const MAX_CLIMB_KM: f64 = 150.0;
const MAX_DESCENT_KM: f64 = 200.0;

/// Below this distance two coordinates are treated as the same airport
const MIN_ROUTE_KM: f64 = 1e-6;

/// Upper bound on segments per route; finer spacings are rejected
pub const MAX_ROUTE_SEGMENTS: usize = 10_000;

/// Build a route between two coordinates with waypoints every `spacing_km`
#[instrument(level = "debug")]
pub fn build_route(origin: Coordinate, destination: Coordinate, spacing_km: f64) -> Result<Route> {
    let origin = origin.validate()?;
    let destination = destination.validate()?;
    if !spacing_km.is_finite() || spacing_km <= 0.0 {
        return Err(TurbcastError::invalid_input(format!(
            "waypoint spacing must be positive, got {spacing_km}"
        )));
    }

    let total_distance_km = origin.distance_km(&destination);
    if total_distance_km < MIN_ROUTE_KM {
        return Err(TurbcastError::invalid_route(
            "origin and destination are the same point",
        ));
    }

    let cruise_altitude_ft = cruise_altitude_for(total_distance_km);
    let bearing = initial_bearing(&origin, &destination);
    let segments = waypoint_segments(total_distance_km, spacing_km)?;

    let waypoints = (0..=segments)
        .map(|i| {
            let fraction = i as f64 / segments as f64;
            let along_km = fraction * total_distance_km;
            let position = if i == segments {
                destination
            } else {
                destination_point(&origin, bearing, along_km)
            };
            Waypoint {
                latitude: position.latitude,
                longitude: position.longitude,
                distance_from_origin_km: along_km,
                altitude_ft: altitude_at(fraction, total_distance_km, cruise_altitude_ft),
                index: i,
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        distance_km = total_distance_km,
        waypoints = waypoints.len(),
        "Built route"
    );

    Ok(Route {
        origin,
        destination,
        waypoints,
        total_distance_km,
        cruise_altitude_ft,
        estimated_duration_minutes: estimated_duration_minutes(total_distance_km),
    })
}

/// Cruise altitude tier for a route length
#[must_use]
pub fn cruise_altitude_for(distance_km: f64) -> f64 {
    if distance_km < 500.0 {
        25_000.0
    } else if distance_km < 1500.0 {
        33_000.0
    } else if distance_km < 3000.0 {
        37_000.0
    } else {
        41_000.0
    }
}

/// Block time at a flat cruise speed, in whole minutes
#[must_use]
pub fn estimated_duration_minutes(distance_km: f64) -> u32 {
    (distance_km / CRUISE_SPEED_KMH * 60.0).round() as u32
}

fn waypoint_segments(distance_km: f64, spacing_km: f64) -> Result<usize> {
    let segments = (distance_km / spacing_km).ceil();
    if segments > MAX_ROUTE_SEGMENTS as f64 {
        return Err(TurbcastError::invalid_input(format!(
            "waypoint spacing of {spacing_km} km needs more than {MAX_ROUTE_SEGMENTS} segments over {distance_km:.0} km"
        )));
    }
    Ok((segments as usize).max(1))
}

/// Altitude at a route fraction: linear climb, flat cruise, linear descent
#[must_use]
pub fn altitude_at(fraction: f64, total_distance_km: f64, cruise_ft: f64) -> f64 {
    let climb_fraction = MAX_CLIMB_KM.min(0.15 * total_distance_km) / total_distance_km;
    let descent_fraction = MAX_DESCENT_KM.min(0.20 * total_distance_km) / total_distance_km;

    let altitude = if fraction < climb_fraction {
        CLIMB_START_FT + (cruise_ft - CLIMB_START_FT) * (fraction / climb_fraction)
    } else if fraction > 1.0 - descent_fraction {
        let into_descent = (fraction - (1.0 - descent_fraction)) / descent_fraction;
        cruise_ft - (cruise_ft - DESCENT_END_FT) * into_descent.min(1.0)
    } else {
        cruise_ft
    };
    altitude.round()
}

/// Initial great-circle bearing in radians
#[must_use]
pub fn initial_bearing(from: &Coordinate, to: &Coordinate) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let delta_lambda = (to.longitude - from.longitude).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();
    y.atan2(x)
}

/// Point reached by travelling `distance_km` from `from` on the given bearing
#[must_use]
pub fn destination_point(from: &Coordinate, bearing_rad: f64, distance_km: f64) -> Coordinate {
    let angular = distance_km / EARTH_RADIUS_KM;
    let phi1 = from.latitude.to_radians();
    let lambda1 = from.longitude.to_radians();

    let sin_phi2 = phi1.sin() * angular.cos() + phi1.cos() * angular.sin() * bearing_rad.cos();
    let phi2 = sin_phi2.clamp(-1.0, 1.0).asin();
    let lambda2 = lambda1
        + (bearing_rad.sin() * angular.sin() * phi1.cos()).atan2(angular.cos() - phi1.sin() * sin_phi2);

    Coordinate::new(phi2.to_degrees(), normalize_longitude(lambda2.to_degrees()))
}

/// Wrap a longitude into (-180, 180]
#[must_use]
pub fn normalize_longitude(longitude: f64) -> f64 {
    let wrapped = (longitude + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 { 180.0 } else { wrapped }
}
