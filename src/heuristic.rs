//! Deterministic turbulence and wind estimates for waypoints without model data.
//!
//! Every pseudo-random component comes from [`noise`], a pure function of the
//! waypoint position, its index and a per-phenomenon salt. Identical inputs
//! always reproduce identical forecasts.

/// Salts, one per phenomenon drawing noise
pub mod salt {
    pub const JET_STREAM: u64 = 1;
    pub const MOUNTAIN_WAVE: u64 = 2;
    pub const CONVECTION_GATE: u64 = 3;
    pub const CONVECTION: u64 = 4;
    pub const CLEAR_AIR: u64 = 5;
    pub const WIND_SPEED: u64 = 6;
    pub const WIND_DIRECTION: u64 = 7;
    pub const PIREP_LIGHT: u64 = 11;
    pub const PIREP_MODERATE: u64 = 12;
    pub const PIREP_SEVERE: u64 = 13;
}

/// Upper bound of the heuristic EDR
pub const MAX_HEURISTIC_EDR: f64 = 0.65;

/// Chance that a low-latitude, low-altitude waypoint sees convection
const CONVECTION_PROBABILITY: f64 = 0.3;

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Pseudo-random value in [0, 1) derived only from the arguments
#[must_use]
pub fn noise(latitude: f64, longitude: f64, index: usize, salt: u64) -> f64 {
    // -0.0 and 0.0 must hash alike
    let lat_bits = (latitude + 0.0).to_bits();
    let lon_bits = (longitude + 0.0).to_bits();

    let mut h = splitmix64(lat_bits);
    h = splitmix64(h ^ lon_bits.rotate_left(17));
    h = splitmix64(h ^ index as u64);
    h = splitmix64(h ^ salt.wrapping_mul(0xD6E8_FEB8_6659_FD93));

    // Top 53 bits give a uniformly spaced f64 in [0, 1)
    (h >> 11) as f64 / (1u64 << 53) as f64
}

/// Synthetic EDR from jet-stream, mountain-wave, convective and clear-air bands
#[must_use]
pub fn heuristic_edr(latitude: f64, longitude: f64, altitude_ft: f64, index: usize) -> f64 {
    let abs_lat = latitude.abs();
    let n = |s: u64| noise(latitude, longitude, index, s);
    let mut edr = 0.0;

    if (28_000.0..=42_000.0).contains(&altitude_ft) && (30.0..=45.0).contains(&abs_lat) {
        edr += 0.10 + 0.15 * n(salt::JET_STREAM);
    }

    if (35.0..=50.0).contains(&abs_lat) && (15_000.0..=35_000.0).contains(&altitude_ft) {
        edr += 0.05 + 0.10 * n(salt::MOUNTAIN_WAVE);
    }

    if abs_lat < 35.0 && altitude_ft < 30_000.0 && n(salt::CONVECTION_GATE) < CONVECTION_PROBABILITY {
        edr += 0.10 + 0.20 * n(salt::CONVECTION);
    }

    edr += 0.02 + 0.06 * n(salt::CLEAR_AIR);

    edr.min(MAX_HEURISTIC_EDR)
}

/// Synthetic wind speed in knots, scaled with altitude
#[must_use]
pub fn heuristic_wind_speed(latitude: f64, longitude: f64, altitude_ft: f64, index: usize) -> f64 {
    let perturbation = noise(latitude, longitude, index, salt::WIND_SPEED) * 20.0 - 10.0;
    (altitude_ft / 1000.0 * 2.5 + perturbation).max(0.0)
}

/// Synthetic wind direction: westerly north of the equator, easterly south
#[must_use]
pub fn heuristic_wind_direction(latitude: f64, longitude: f64, index: usize) -> f64 {
    let prevailing = if latitude >= 0.0 { 270.0 } else { 90.0 };
    let perturbation = noise(latitude, longitude, index, salt::WIND_DIRECTION) * 60.0 - 30.0;
    (prevailing + perturbation).rem_euclid(360.0)
}
