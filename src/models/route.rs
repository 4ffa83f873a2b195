//! Route and waypoint models

use serde::{Deserialize, Serialize};

use super::Coordinate;

/// A point along the flown route
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Distance along the route from the origin in km
    pub distance_from_origin_km: f64,
    /// Planned altitude in feet
    pub altitude_ft: f64,
    /// 0-based position in the route
    pub index: usize,
}

impl Waypoint {
    #[must_use]
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A great-circle route with its vertical profile
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Route {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub waypoints: Vec<Waypoint>,
    pub total_distance_km: f64,
    pub cruise_altitude_ft: f64,
    pub estimated_duration_minutes: u32,
}

impl Route {
    /// Fraction of the route covered at the given waypoint, in [0, 1]
    #[must_use]
    pub fn progress(&self, waypoint: &Waypoint) -> f64 {
        if self.total_distance_km <= 0.0 {
            return 0.0;
        }
        (waypoint.distance_from_origin_km / self.total_distance_km).clamp(0.0, 1.0)
    }
}
