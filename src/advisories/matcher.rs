//! Route relevance and EDR floors from reports and advisories

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{AdvisoryFeed, AdvisoryKind, AdvisoryRecord, BoundingBox, Intensity};
use crate::config::AdvisoryConfig;
use crate::heuristic::{noise, salt};
use crate::models::{Coordinate, Waypoint};

/// Reports further than this from the route are ignored
pub const RELEVANCE_RADIUS_NM: f64 = 50.0;

/// Waypoints checked for PIREP relevance, the final waypoint comes on top
pub const MAX_PIREP_SAMPLES: usize = 40;

const TURBULENCE_TOKENS: &[&str] = &["turb", "convect", "tstm", "thunder", "mtn wave", "mtw"];

/// Hazard tags too short for substring matching
const TURBULENCE_HAZARDS: &[&str] = &["ts", "conv"];

const SEVERE_FLOOR: f64 = 0.45;
const SEVERE_JITTER: f64 = 0.10;
const MODERATE_FLOOR: f64 = 0.28;
const MODERATE_JITTER: f64 = 0.08;
const LIGHT_FLOOR: f64 = 0.16;
const LIGHT_JITTER: f64 = 0.06;

/// Whether an advisory is about turbulence or convection
#[must_use]
pub fn is_turbulence_related(record: &AdvisoryRecord) -> bool {
    let hazard = record.hazard.as_deref().unwrap_or_default().to_lowercase();
    if TURBULENCE_HAZARDS.contains(&hazard.trim()) {
        return true;
    }
    let raw = record.raw_text.as_deref().unwrap_or_default().to_lowercase();
    TURBULENCE_TOKENS
        .iter()
        .any(|token| hazard.contains(token) || raw.contains(token))
}

/// Severity of an advisory, from its tag or else its text
#[must_use]
pub fn advisory_intensity(record: &AdvisoryRecord) -> Option<Intensity> {
    record
        .severity
        .as_deref()
        .and_then(Intensity::parse)
        .or_else(|| record.raw_text.as_deref().and_then(Intensity::parse))
}

/// Floor a pilot report imposes on a nearby waypoint, with bounded jitter
#[must_use]
pub fn report_floor(intensity: Intensity, waypoint: &Waypoint) -> f64 {
    let (base, jitter, salt) = match intensity {
        Intensity::Severe => (SEVERE_FLOOR, SEVERE_JITTER, salt::PIREP_SEVERE),
        Intensity::Moderate => (MODERATE_FLOOR, MODERATE_JITTER, salt::PIREP_MODERATE),
        Intensity::Light => (LIGHT_FLOOR, LIGHT_JITTER, salt::PIREP_LIGHT),
    };
    base + jitter * noise(waypoint.latitude, waypoint.longitude, waypoint.index, salt)
}

/// Route-wide floor an advisory imposes; light advisories impose none
#[must_use]
pub fn advisory_floor(intensity: Intensity) -> Option<f64> {
    match intensity {
        Intensity::Severe => Some(SEVERE_FLOOR),
        Intensity::Moderate => Some(MODERATE_FLOOR),
        Intensity::Light => None,
    }
}

/// A pilot report with a usable position
#[derive(Debug, Clone, PartialEq)]
pub struct PilotReport {
    pub position: Coordinate,
    pub intensity: Option<Intensity>,
    pub timestamp: Option<String>,
}

impl PilotReport {
    #[must_use]
    pub fn from_record(record: &AdvisoryRecord) -> Option<Self> {
        let position = Coordinate::validated(record.lat?, record.lon?).ok()?;
        Some(Self {
            position,
            intensity: record.turbulence_intensity.as_deref().and_then(Intensity::parse),
            timestamp: record.timestamp.clone(),
        })
    }

    /// Identity used to collapse duplicates
    fn key(&self) -> String {
        format!(
            "{:.4},{:.4}|{}|{}",
            self.position.latitude,
            self.position.longitude,
            self.timestamp.as_deref().unwrap_or_default(),
            self.intensity.map(|i| i.to_string()).unwrap_or_default()
        )
    }

    fn within_radius(&self, waypoint: &Waypoint) -> bool {
        self.position.distance_nm(&waypoint.coordinate()) <= RELEVANCE_RADIUS_NM
    }
}

/// Every `stride`-th waypoint, capped at [`MAX_PIREP_SAMPLES`], plus the last one
#[must_use]
pub fn sample_waypoints(waypoints: &[Waypoint]) -> Vec<&Waypoint> {
    let stride = waypoints.len().div_ceil(MAX_PIREP_SAMPLES).max(1);
    let mut sampled: Vec<&Waypoint> = waypoints.iter().step_by(stride).collect();
    if let Some(last) = waypoints.last()
        && sampled.last().is_none_or(|w| w.index != last.index)
    {
        sampled.push(last);
    }
    sampled
}

/// Reports and advisories that apply to one route
#[derive(Debug, Clone, Default)]
pub struct HazardReports {
    /// Deduplicated reports inside the query box
    pub pireps: Vec<PilotReport>,
    /// Reports within the relevance radius of the sampled route
    pub relevant_pirep_count: u32,
    /// Turbulence-related SIGMETs
    pub sigmets: Vec<AdvisoryRecord>,
    /// Turbulence-related AIRMETs
    pub airmets: Vec<AdvisoryRecord>,
    pub failed_feeds: Vec<AdvisoryKind>,
}

impl HazardReports {
    /// Result when none of the feeds could be queried
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            failed_feeds: vec![AdvisoryKind::Pirep, AdvisoryKind::Sigmet, AdvisoryKind::Airmet],
            ..Self::default()
        }
    }

    /// Filter raw feed output down to what matters for `waypoints`
    #[must_use]
    pub fn from_records(
        waypoints: &[Waypoint],
        pireps: &[AdvisoryRecord],
        sigmets: &[AdvisoryRecord],
        airmets: &[AdvisoryRecord],
        failed_feeds: Vec<AdvisoryKind>,
    ) -> Self {
        let mut seen = HashSet::new();
        let pireps: Vec<PilotReport> = pireps
            .iter()
            .filter_map(PilotReport::from_record)
            .filter(|report| seen.insert(report.key()))
            .collect();

        let sampled = sample_waypoints(waypoints);
        let relevant_pirep_count = pireps
            .iter()
            .filter(|report| sampled.iter().any(|w| report.within_radius(w)))
            .count() as u32;

        let relevant = |records: &[AdvisoryRecord]| -> Vec<AdvisoryRecord> {
            records.iter().filter(|r| is_turbulence_related(r)).cloned().collect()
        };

        Self {
            pireps,
            relevant_pirep_count,
            sigmets: relevant(sigmets),
            airmets: relevant(airmets),
            failed_feeds,
        }
    }

    #[must_use]
    pub fn pirep_count(&self) -> u32 {
        self.relevant_pirep_count
    }

    #[must_use]
    pub fn sigmet_count(&self) -> u32 {
        self.sigmets.len() as u32
    }

    #[must_use]
    pub fn airmet_count(&self) -> u32 {
        self.airmets.len() as u32
    }

    #[must_use]
    pub fn has_reports(&self) -> bool {
        self.pirep_count() + self.sigmet_count() + self.airmet_count() > 0
    }

    /// At least one feed failed and nothing relevant came back from the rest
    #[must_use]
    pub fn feeds_degraded(&self) -> bool {
        !self.failed_feeds.is_empty() && !self.has_reports()
    }

    /// Highest floor from any relevant advisory, applied along the whole route
    #[must_use]
    pub fn route_floor(&self) -> Option<f64> {
        self.sigmets
            .iter()
            .chain(self.airmets.iter())
            .filter_map(advisory_intensity)
            .filter_map(advisory_floor)
            .reduce(f64::max)
    }

    /// Highest floor for one waypoint from nearby reports and the route floor
    #[must_use]
    pub fn waypoint_floor(&self, waypoint: &Waypoint) -> Option<f64> {
        self.pireps
            .iter()
            .filter(|report| report.within_radius(waypoint))
            .filter_map(|report| report.intensity)
            .map(|intensity| report_floor(intensity, waypoint))
            .chain(self.route_floor())
            .reduce(f64::max)
    }
}

/// Queries the three feeds for a route and scores the results
pub struct AdvisoryMatcher {
    feed: Arc<dyn AdvisoryFeed>,
    padding_deg: f64,
}

impl AdvisoryMatcher {
    #[must_use]
    pub fn new(feed: Arc<dyn AdvisoryFeed>, config: &AdvisoryConfig) -> Self {
        Self {
            feed,
            padding_deg: config.bbox_padding_deg,
        }
    }

    async fn fetch_or_empty(
        &self,
        kind: AdvisoryKind,
        bbox: &BoundingBox,
    ) -> (Vec<AdvisoryRecord>, Option<AdvisoryKind>) {
        match self.feed.fetch(kind, bbox).await {
            Ok(records) => (records, None),
            Err(e) => {
                warn!(feed = %kind, error = %e, "Advisory feed unavailable, continuing without it");
                (Vec::new(), Some(kind))
            }
        }
    }

    /// Never fails: unavailable feeds count as empty and are listed in
    /// [`HazardReports::failed_feeds`]
    #[instrument(skip(self, waypoints), fields(waypoints = waypoints.len()))]
    pub async fn match_route(&self, waypoints: &[Waypoint]) -> HazardReports {
        let Some(bbox) = BoundingBox::around(waypoints, self.padding_deg) else {
            return HazardReports::default();
        };

        let ((pireps, p_failed), (sigmets, s_failed), (airmets, a_failed)) = tokio::join!(
            self.fetch_or_empty(AdvisoryKind::Pirep, &bbox),
            self.fetch_or_empty(AdvisoryKind::Sigmet, &bbox),
            self.fetch_or_empty(AdvisoryKind::Airmet, &bbox),
        );
        let failed_feeds = [p_failed, s_failed, a_failed].into_iter().flatten().collect();

        let reports = HazardReports::from_records(waypoints, &pireps, &sigmets, &airmets, failed_feeds);
        info!(
            pireps = reports.pirep_count(),
            sigmets = reports.sigmet_count(),
            airmets = reports.airmet_count(),
            "Matched reports to route"
        );
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Result, TurbcastError};
    use async_trait::async_trait;
    use rstest::rstest;

    fn route(n: usize) -> Vec<Waypoint> {
        // Eastbound along 40N, roughly 85 km apart
        (0..n)
            .map(|i| Waypoint {
                latitude: 40.0,
                longitude: -100.0 + i as f64,
                distance_from_origin_km: i as f64 * 85.0,
                altitude_ft: 35_000.0,
                index: i,
            })
            .collect()
    }

    fn pirep(lat: f64, lon: f64, intensity: &str, time: &str) -> AdvisoryRecord {
        AdvisoryRecord {
            lat: Some(lat),
            lon: Some(lon),
            turbulence_intensity: Some(intensity.to_string()),
            timestamp: Some(time.to_string()),
            ..AdvisoryRecord::default()
        }
    }

    fn advisory(hazard: &str, severity: &str, raw: &str) -> AdvisoryRecord {
        AdvisoryRecord {
            hazard: Some(hazard.to_string()),
            severity: Some(severity.to_string()),
            raw_text: Some(raw.to_string()),
            ..AdvisoryRecord::default()
        }
    }

    #[rstest]
    #[case("TURB", "", true)]
    #[case("CONVECTIVE", "", true)]
    #[case("TS", "", true)]
    #[case("ICE", "MOD ICE BTN FL180 AND FL240", false)]
    #[case("IFR", "CIG BLW 010", false)]
    #[case("", "OCNL SEV TURB BTN FL300 AND FL390", true)]
    #[case("MTW", "", true)]
    fn test_turbulence_relevance(#[case] hazard: &str, #[case] raw: &str, #[case] expected: bool) {
        assert_eq!(is_turbulence_related(&advisory(hazard, "", raw)), expected);
    }

    #[test]
    fn test_stride_caps_samples_and_keeps_last() {
        let waypoints = route(112);
        let sampled = sample_waypoints(&waypoints);
        assert!(sampled.len() <= MAX_PIREP_SAMPLES + 1);
        assert_eq!(sampled.first().map(|w| w.index), Some(0));
        assert_eq!(sampled.last().map(|w| w.index), Some(111));

        let short = route(5);
        assert_eq!(sample_waypoints(&short).len(), 5);
    }

    #[test]
    fn test_pirep_relevance_and_dedup() {
        let waypoints = route(10);
        let pireps = vec![
            // On the route, reported twice
            pirep(40.2, -97.0, "MOD", "1000"),
            pirep(40.2, -97.0, "MOD", "1000"),
            // Same place, later time
            pirep(40.2, -97.0, "MOD", "2000"),
            // Inside the padded box but ~180 nm north
            pirep(43.0, -97.0, "SEV", "1000"),
            // No position
            AdvisoryRecord {
                turbulence_intensity: Some("LGT".into()),
                ..AdvisoryRecord::default()
            },
        ];
        let reports = HazardReports::from_records(&waypoints, &pireps, &[], &[], Vec::new());
        assert_eq!(reports.pireps.len(), 3);
        assert_eq!(reports.pirep_count(), 2);
    }

    #[test]
    fn test_waypoint_floor_from_nearby_report() {
        let waypoints = route(10);
        let pireps = vec![pirep(40.1, -95.0, "SEV", "1000"), pirep(40.0, -91.0, "LGT", "1000")];
        let reports = HazardReports::from_records(&waypoints, &pireps, &[], &[], Vec::new());

        let near_severe = reports.waypoint_floor(&waypoints[5]).unwrap();
        assert!((SEVERE_FLOOR..SEVERE_FLOOR + SEVERE_JITTER).contains(&near_severe));

        let near_light = reports.waypoint_floor(&waypoints[9]).unwrap();
        assert!((LIGHT_FLOOR..LIGHT_FLOOR + LIGHT_JITTER).contains(&near_light));

        assert_eq!(reports.waypoint_floor(&waypoints[0]), None);
        // Same inputs, same jitter
        assert_eq!(reports.waypoint_floor(&waypoints[5]), reports.waypoint_floor(&waypoints[5]));
    }

    #[test]
    fn test_advisory_floor_applies_route_wide() {
        let waypoints = route(10);
        let sigmets = vec![advisory("TURB", "SEV", "SIGMET SEV TURB")];
        let airmets = vec![
            advisory("TURB", "MOD", "AIRMET TANGO MOD TURB"),
            advisory("ICE", "MOD", "AIRMET ZULU MOD ICE"),
        ];
        let reports = HazardReports::from_records(&waypoints, &[], &sigmets, &airmets, Vec::new());

        assert_eq!(reports.sigmet_count(), 1);
        assert_eq!(reports.airmet_count(), 1);
        assert_eq!(reports.route_floor(), Some(SEVERE_FLOOR));
        for w in &waypoints {
            assert_eq!(reports.waypoint_floor(w), Some(SEVERE_FLOOR));
        }
    }

    #[test]
    fn test_light_advisories_do_not_raise_floor() {
        let reports = HazardReports::from_records(
            &route(3),
            &[],
            &[],
            &[advisory("TURB", "LGT", "")],
            Vec::new(),
        );
        assert_eq!(reports.airmet_count(), 1);
        assert_eq!(reports.route_floor(), None);
    }

    struct FlakyFeed {
        failing: Vec<AdvisoryKind>,
    }

    #[async_trait]
    impl AdvisoryFeed for FlakyFeed {
        async fn fetch(&self, kind: AdvisoryKind, _bbox: &BoundingBox) -> Result<Vec<AdvisoryRecord>> {
            if self.failing.contains(&kind) {
                return Err(TurbcastError::upstream("feed down"));
            }
            Ok(match kind {
                AdvisoryKind::Pirep => vec![pirep(40.0, -98.0, "MOD", "1")],
                AdvisoryKind::Sigmet => vec![advisory("TURB", "SEV", "")],
                AdvisoryKind::Airmet => vec![advisory("IFR", "", "")],
            })
        }
    }

    #[tokio::test]
    async fn test_matcher_absorbs_single_feed_failure() {
        let matcher = AdvisoryMatcher::new(
            Arc::new(FlakyFeed {
                failing: vec![AdvisoryKind::Sigmet],
            }),
            &AdvisoryConfig::default(),
        );
        let reports = matcher.match_route(&route(10)).await;
        assert_eq!(reports.pirep_count(), 1);
        assert_eq!(reports.sigmet_count(), 0);
        assert_eq!(reports.airmet_count(), 0);
        assert_eq!(reports.failed_feeds, vec![AdvisoryKind::Sigmet]);
        // The surviving PIREP feed still produced something relevant
        assert!(!reports.feeds_degraded());
    }

    #[tokio::test]
    async fn test_matcher_reports_total_outage() {
        let matcher = AdvisoryMatcher::new(
            Arc::new(FlakyFeed {
                failing: vec![AdvisoryKind::Pirep, AdvisoryKind::Sigmet, AdvisoryKind::Airmet],
            }),
            &AdvisoryConfig::default(),
        );
        let reports = matcher.match_route(&route(10)).await;
        assert_eq!(reports.failed_feeds.len(), 3);
        assert!(!reports.has_reports());
        assert!(reports.feeds_degraded());
        assert!(HazardReports::unavailable().feeds_degraded());
        assert!(!HazardReports::default().feeds_degraded());
    }
}
