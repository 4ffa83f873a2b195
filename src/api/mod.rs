use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TurbcastError;
use crate::forecast::{ForecastRequest, TurbulenceForecastService};
use crate::location_resolver::LocationResolver;
use crate::models::RouteForecast;

/// Shared handler state
pub struct AppState {
    pub service: TurbulenceForecastService,
    pub resolver: LocationResolver,
}

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    /// `lat,lon` or airport code
    pub origin: String,
    pub destination: String,
    /// RFC 3339 departure time
    pub departure: Option<String>,
    pub spacing_km: Option<f64>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps library errors onto HTTP responses
pub struct ApiError(TurbcastError);

impl From<TurbcastError> for ApiError {
    fn from(err: TurbcastError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TurbcastError::InvalidInput { .. } | TurbcastError::InvalidRoute { .. } => StatusCode::BAD_REQUEST,
            TurbcastError::NotFound { .. } => StatusCode::NOT_FOUND,
            TurbcastError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            TurbcastError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        let body = ErrorBody {
            error: self.0.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/forecast", get(get_forecast))
        .route("/health", get(health))
        .with_state(state)
}

fn parse_departure(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, TurbcastError> {
    raw.map(|value| {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| TurbcastError::invalid_input(format!("departure '{value}' is not RFC 3339: {e}")))
    })
    .transpose()
}

async fn get_forecast(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<RouteForecast>, ApiError> {
    let request = ForecastRequest {
        origin: state.resolver.resolve(&query.origin)?,
        destination: state.resolver.resolve(&query.destination)?,
        departure: parse_departure(query.departure.as_deref())?,
        spacing_km: query.spacing_km,
    };

    let forecast = state.service.forecast(&request).await?;
    Ok(Json(forecast))
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisories::{AdvisoryFeed, AdvisoryKind, AdvisoryMatcher, AdvisoryRecord, BoundingBox};
    use crate::cache::{ForecastCache, MemoryStore};
    use crate::clock::SystemClock;
    use crate::config::{AdvisoryConfig, RouteConfig};
    use crate::location_resolver::AirportTable;
    use crate::models::Waypoint;
    use crate::raster::{FlightTiming, ModelSample, TurbulenceModel};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    struct NoModel;

    #[async_trait]
    impl TurbulenceModel for NoModel {
        async fn sample(&self, _waypoints: &[Waypoint], _timing: &FlightTiming) -> crate::Result<ModelSample> {
            Err(TurbcastError::upstream("offline"))
        }
    }

    struct NoFeed;

    #[async_trait]
    impl AdvisoryFeed for NoFeed {
        async fn fetch(&self, _kind: AdvisoryKind, _bbox: &BoundingBox) -> crate::Result<Vec<AdvisoryRecord>> {
            Err(TurbcastError::upstream("offline"))
        }
    }

    fn app() -> Router {
        let clock = Arc::new(SystemClock);
        let service = TurbulenceForecastService::new(
            Arc::new(NoModel),
            AdvisoryMatcher::new(Arc::new(NoFeed), &AdvisoryConfig::default()),
            ForecastCache::new(Arc::new(MemoryStore::new()), clock.clone(), chrono::Duration::minutes(30)),
            clock,
            &RouteConfig::default(),
        );
        router(Arc::new(AppState {
            service,
            resolver: LocationResolver::new(Arc::new(AirportTable::new())),
        }))
    }

    async fn get(uri: &str) -> (StatusCode, String) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_forecast_by_airport_codes() {
        let (status, body) = get("/forecast?origin=JFK&destination=EGLL&departure=2026-10-19T13:00:00Z").await;
        assert_eq!(status, StatusCode::OK);

        let forecast: RouteForecast = serde_json::from_str(&body).unwrap();
        assert!((111..=114).contains(&forecast.segments.len()));
        assert!(forecast.metadata.using_fallback);
        assert!(forecast.metadata.model_only);
    }

    #[tokio::test]
    async fn test_coordinates_and_spacing() {
        let (status, body) = get("/forecast?origin=10,10&destination=10,12&spacing_km=100").await;
        assert_eq!(status, StatusCode::OK);
        let forecast: RouteForecast = serde_json::from_str(&body).unwrap();
        assert_eq!(forecast.segments.len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_airport_is_404() {
        let (status, body) = get("/forecast?origin=ZZZZ&destination=LHR").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("ZZZZ"));
    }

    #[tokio::test]
    async fn test_invalid_input_is_400() {
        let (status, _) = get("/forecast?origin=JFK&destination=JFK").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get("/forecast?origin=95,0&destination=LHR").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get("/forecast?origin=JFK&destination=LHR&departure=tomorrow").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get("/forecast?origin=JFK&destination=LHR&spacing_km=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get("/forecast?origin=JFK&destination=LHR&spacing_km=1e-300").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get("/forecast?origin=JFK").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
