//! Gridded model rasters: run selection, fetching, projection and color
//! classification.

pub mod fetch;
pub mod legend;
pub mod projection;
pub mod run;
pub mod sampler;

use async_trait::async_trait;

use crate::Result;
use crate::models::{ModelProvenance, Waypoint};

pub use fetch::{FetchError, HttpRasterResource, RasterAddress, RasterCache, RasterProduct, RasterResource};
pub use run::{FlightTiming, ModelRun, forecast_hour};
pub use sampler::WafsSampler;

/// Raster values at one waypoint. `None` means the product could not be
/// fetched for the hour the waypoint is flown through.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointSample {
    pub edr: Option<f64>,
    pub wind_speed_kt: Option<f64>,
}

/// Model output aligned index-for-index with the sampled waypoints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSample {
    pub points: Vec<PointSample>,
    pub provenance: Option<ModelProvenance>,
}

impl ModelSample {
    /// True when at least one waypoint got a raster EDR value
    #[must_use]
    pub fn has_raster(&self) -> bool {
        self.points.iter().any(|p| p.edr.is_some())
    }

    #[must_use]
    pub fn point(&self, index: usize) -> PointSample {
        self.points.get(index).copied().unwrap_or_default()
    }
}

/// Source of gridded turbulence and wind values along a route
#[async_trait]
pub trait TurbulenceModel: Send + Sync {
    async fn sample(&self, waypoints: &[Waypoint], timing: &FlightTiming) -> Result<ModelSample>;
}
