//! Admin API.
//!
//! Read-only views of the client plus runtime endpoint management, behind
//! a bearer API key.

pub mod auth;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::http::ServiceClient;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub client: Arc<ServiceClient>,
    pub api_key: Arc<str>,
}

pub fn router(client: Arc<ServiceClient>, api_key: &str) -> Router {
    let state = AdminState {
        client,
        api_key: Arc::from(api_key),
    };
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/metrics", get(get_metrics))
        .route(
            "/admin/endpoints",
            get(get_endpoints).post(add_endpoint).delete(remove_endpoint),
        )
        .route("/admin/health", get(get_health))
        .route("/admin/pool", get(get_pool))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    client: Arc<ServiceClient>,
    api_key: &str,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");
    axum::serve(listener, router(client, api_key))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
