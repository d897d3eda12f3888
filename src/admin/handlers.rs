use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::http::HealthReport;
use crate::load_balancer::EndpointSnapshot;
use crate::net::PoolRecommendation;
use crate::observability::ClientMetrics;
use crate::resilience::CircuitState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub connected: bool,
    pub strategy: String,
    pub endpoints: usize,
    pub healthy_endpoints: usize,
    pub circuit_breaker_state: Option<CircuitState>,
}

#[derive(Debug, Deserialize)]
pub struct AddEndpoint {
    pub url: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
pub struct EndpointQuery {
    pub url: String,
}

#[derive(Serialize)]
pub struct PoolStatus {
    pub expected_rps: f64,
    pub avg_response_time_ms: f64,
    #[serde(flatten)]
    pub recommendation: PoolRecommendation,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let client = &state.client;
    let balancer = client.balancer();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        connected: client.is_connected(),
        strategy: balancer.strategy().to_string(),
        endpoints: balancer.len(),
        healthy_endpoints: balancer.get_healthy_endpoints().len(),
        circuit_breaker_state: client.executor().breaker().map(|b| b.state()),
    })
}

pub async fn get_metrics(State(state): State<AdminState>) -> Json<ClientMetrics> {
    Json(state.client.get_metrics())
}

pub async fn get_endpoints(State(state): State<AdminState>) -> Json<Vec<EndpointSnapshot>> {
    Json(state.client.endpoints())
}

pub async fn add_endpoint(
    State(state): State<AdminState>,
    Json(body): Json<AddEndpoint>,
) -> Response {
    match state.client.add_endpoint(&body.url, body.weight) {
        Ok(endpoint) => (StatusCode::CREATED, Json(endpoint.snapshot())).into_response(),
        Err(e) => error(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

pub async fn remove_endpoint(
    State(state): State<AdminState>,
    Query(query): Query<EndpointQuery>,
) -> Response {
    if state.client.remove_endpoint(&query.url) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error(StatusCode::NOT_FOUND, format!("endpoint '{}' is not registered", query.url))
    }
}

pub async fn get_health(State(state): State<AdminState>) -> Json<HealthReport> {
    Json(state.client.health_check().await)
}

pub async fn get_pool(State(state): State<AdminState>) -> Json<PoolStatus> {
    let pool = &state.client.config().pool;
    Json(PoolStatus {
        expected_rps: pool.expected_rps,
        avg_response_time_ms: pool.avg_response_time_ms,
        recommendation: state.client.pool_recommendation(),
    })
}
