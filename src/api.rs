use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::RouteError;
use crate::route::{RoutePlan, RouteService};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: f64,
    pub end_longitude: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RouteResponse {
    /// `[lat, lon]` pairs
    pub path: Vec<[f64; 2]>,
    pub distance: Option<f64>,
    #[serde(rename = "estimatedTime")]
    pub estimated_time: Option<f64>,
    pub message: Option<String>,
}

impl From<RoutePlan> for RouteResponse {
    fn from(plan: RoutePlan) -> Self {
        Self {
            path: waypoints(&plan),
            distance: Some(plan.distance_km),
            estimated_time: Some(plan.estimated_time_hours),
            message: Some("Route calculated successfully".to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
}

fn waypoints(plan: &RoutePlan) -> Vec<[f64; 2]> {
    plan.path
        .iter()
        .map(|cell| [cell.latitude(), cell.longitude()])
        .collect()
}

/// Route failure rendered as `{"error": ...}`
pub struct ApiError(RouteError);

impl From<RouteError> for ApiError {
    fn from(err: RouteError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RouteError::OutOfRange { .. } | RouteError::EndpointUnresolved { .. } => {
                StatusCode::BAD_REQUEST
            }
            RouteError::NoRouteFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Route request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.user_message() }))).into_response()
    }
}

pub fn router(service: Arc<RouteService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/route/calculate", post(calculate_route))
        .with_state(service)
}

/// Pre-`/api` endpoint, kept for older clients
pub fn legacy_router(service: Arc<RouteService>) -> Router {
    Router::new()
        .route("/calculate-route", post(calculate_route_legacy))
        .with_state(service)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "AquaRoute API is running".to_string(),
        version: crate::VERSION.to_string(),
    })
}

async fn calculate_route(
    State(service): State<Arc<RouteService>>,
    Json(request): Json<RouteRequest>,
) -> Result<Json<RouteResponse>, ApiError> {
    let plan = service
        .calculate_route(
            request.start_latitude,
            request.start_longitude,
            request.end_latitude,
            request.end_longitude,
        )
        .await?;
    Ok(Json(plan.into()))
}

/// Always 200; failures come back as `{"error": ...}`
async fn calculate_route_legacy(
    State(service): State<Arc<RouteService>>,
    Json(request): Json<RouteRequest>,
) -> Json<serde_json::Value> {
    let result = service
        .calculate_route(
            request.start_latitude,
            request.start_longitude,
            request.end_latitude,
            request.end_longitude,
        )
        .await;

    match result {
        Ok(plan) => Json(json!({ "path": waypoints(&plan) })),
        Err(e) => Json(json!({ "error": e.user_message() })),
    }
}
