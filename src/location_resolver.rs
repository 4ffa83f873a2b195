//! Location Resolution Module
//!
//! Turns user input (`"lat,lon"` or an airport code) into a validated
//! coordinate.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::models::Coordinate;
use crate::{Result, TurbcastError};

/// Airport code to position lookup
pub trait CoordinateLookup: Send + Sync {
    fn lookup(&self, code: &str) -> Option<Coordinate>;
}

/// Built-in table of major airports, addressable by ICAO or IATA code
pub struct AirportTable {
    by_code: HashMap<&'static str, Coordinate>,
}

// (ICAO, IATA, latitude, longitude)
const AIRPORTS: &[(&str, &str, f64, f64)] = &[
    ("KJFK", "JFK", 40.6413, -73.7781),
    ("EGLL", "LHR", 51.4700, -0.4543),
    ("KLAX", "LAX", 33.9416, -118.4085),
    ("KSFO", "SFO", 37.6213, -122.3790),
    ("KORD", "ORD", 41.9742, -87.9073),
    ("KATL", "ATL", 33.6407, -84.4277),
    ("KDFW", "DFW", 32.8998, -97.0403),
    ("KDEN", "DEN", 39.8561, -104.6737),
    ("KSEA", "SEA", 47.4502, -122.3088),
    ("KBOS", "BOS", 42.3656, -71.0096),
    ("KMIA", "MIA", 25.7959, -80.2870),
    ("CYYZ", "YYZ", 43.6777, -79.6248),
    ("LFPG", "CDG", 49.0097, 2.5479),
    ("EDDF", "FRA", 50.0379, 8.5622),
    ("EHAM", "AMS", 52.3105, 4.7683),
    ("LSZH", "ZRH", 47.4582, 8.5555),
    ("OMDB", "DXB", 25.2532, 55.3657),
    ("RJTT", "HND", 35.5494, 139.7798),
    ("VHHH", "HKG", 22.3080, 113.9185),
    ("WSSS", "SIN", 1.3644, 103.9915),
    ("YSSY", "SYD", -33.9399, 151.1753),
    ("SBGR", "GRU", -23.4356, -46.4731),
];

impl AirportTable {
    #[must_use]
    pub fn new() -> Self {
        let mut by_code = HashMap::with_capacity(AIRPORTS.len() * 2);
        for (icao, iata, lat, lon) in AIRPORTS {
            let coordinate = Coordinate::new(*lat, *lon);
            by_code.insert(*icao, coordinate);
            by_code.insert(*iata, coordinate);
        }
        Self { by_code }
    }
}

impl Default for AirportTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinateLookup for AirportTable {
    fn lookup(&self, code: &str) -> Option<Coordinate> {
        self.by_code.get(code.to_ascii_uppercase().as_str()).copied()
    }
}

/// Types of location input
#[derive(Debug, Clone, PartialEq)]
pub enum LocationInput {
    Coordinates(Coordinate),
    /// ICAO or IATA code, upper-cased
    AirportCode(String),
}

impl LocationInput {
    /// Parse `"lat,lon"` (comma and/or whitespace separated) or an airport code
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TurbcastError::invalid_input("location must not be empty"));
        }

        let parts: Vec<&str> = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();

        if parts.len() == 2 && parts.iter().all(|p| looks_numeric(p)) {
            let lat = parse_degrees(parts[0], "latitude")?;
            let lon = parse_degrees(parts[1], "longitude")?;
            return Ok(LocationInput::Coordinates(Coordinate::validated(lat, lon)?));
        }

        if is_airport_code(input) {
            return Ok(LocationInput::AirportCode(input.to_ascii_uppercase()));
        }

        Err(TurbcastError::invalid_input(format!(
            "'{input}' is neither 'lat,lon' nor an airport code"
        )))
    }
}

fn looks_numeric(part: &str) -> bool {
    part.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
}

fn parse_degrees(part: &str, what: &str) -> Result<f64> {
    part.parse::<f64>()
        .map_err(|_| TurbcastError::invalid_input(format!("Invalid {what}: {part}")))
}

/// Three-letter IATA or four-letter ICAO code
fn is_airport_code(input: &str) -> bool {
    (3..=4).contains(&input.len())
        && input.chars().all(|c| c.is_ascii_alphanumeric())
        && input.chars().any(|c| c.is_ascii_alphabetic())
}

/// Service for resolving location inputs
pub struct LocationResolver {
    lookup: Arc<dyn CoordinateLookup>,
}

impl LocationResolver {
    #[must_use]
    pub fn new(lookup: Arc<dyn CoordinateLookup>) -> Self {
        Self { lookup }
    }

    /// Resolve raw input into a coordinate
    pub fn resolve(&self, input: &str) -> Result<Coordinate> {
        let coordinate = match LocationInput::parse(input)? {
            LocationInput::Coordinates(coordinate) => coordinate,
            LocationInput::AirportCode(code) => self
                .lookup
                .lookup(&code)
                .ok_or_else(|| TurbcastError::not_found(format!("Unknown airport code: {code}")))?,
        };

        debug!(
            "Resolved '{}' to ({:.4}, {:.4})",
            input, coordinate.latitude, coordinate.longitude
        );
        Ok(coordinate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn resolver() -> LocationResolver {
        LocationResolver::new(Arc::new(AirportTable::new()))
    }

    #[rstest]
    #[case("46.8182,8.2275", 46.8182, 8.2275)]
    #[case("46.8182 8.2275", 46.8182, 8.2275)]
    #[case("-46.8182, -8.2275", -46.8182, -8.2275)]
    fn test_parse_coordinates(#[case] input: &str, #[case] lat: f64, #[case] lon: f64) {
        assert_eq!(
            LocationInput::parse(input).unwrap(),
            LocationInput::Coordinates(Coordinate::new(lat, lon))
        );
    }

    #[rstest]
    #[case("91.0,8.0")]
    #[case("46.0,-181.0")]
    #[case("1.2.3,4")]
    #[case("46.0")]
    #[case("Interlaken")]
    #[case("")]
    #[case("K J")]
    fn test_malformed_input_is_invalid(#[case] input: &str) {
        assert!(matches!(
            LocationInput::parse(input),
            Err(TurbcastError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_parse_airport_codes() {
        assert_eq!(
            LocationInput::parse("kjfk").unwrap(),
            LocationInput::AirportCode("KJFK".into())
        );
        assert_eq!(
            LocationInput::parse(" LHR ").unwrap(),
            LocationInput::AirportCode("LHR".into())
        );
    }

    #[test]
    fn test_resolve_by_icao_and_iata() {
        let resolver = resolver();
        let jfk = resolver.resolve("JFK").unwrap();
        assert_eq!(jfk, resolver.resolve("KJFK").unwrap());
        assert_eq!(jfk, Coordinate::new(40.6413, -73.7781));
        assert_eq!(resolver.resolve("egll").unwrap().latitude, 51.47);
    }

    #[test]
    fn test_unknown_code_is_not_found() {
        assert!(matches!(
            resolver().resolve("ZZZZ"),
            Err(TurbcastError::NotFound { .. })
        ));
    }

    #[test]
    fn test_coordinates_bypass_lookup() {
        let coordinate = resolver().resolve("10.5,-20.25").unwrap();
        assert_eq!(coordinate, Coordinate::new(10.5, -20.25));
    }
}
