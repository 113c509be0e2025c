//! Axum HTTP surface: CSV export, filtered search and hints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use oppdesk_core::Filter;
use oppdesk_services::{OpportunityService, ServiceError};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub const CRATE_NAME: &str = "oppdesk-web";

#[derive(Clone)]
pub struct AppState {
    pub service: OpportunityService,
}

impl AppState {
    pub fn new(service: OpportunityService) -> Self {
        Self { service }
    }
}

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 4040,
        }
    }
}

impl WebConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: std::env::var("OPPDESK_BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port: std::env::var("OPPDESK_WEB_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
        }
    }
}

/// Body of `POST /opportunities/filtered-search`. A missing `filters` key means no filters.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilteredSearchRequest {
    #[serde(default)]
    pub filters: Vec<Filter>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/opportunities/export", get(export_handler))
        .route("/opportunities/filtered-search", post(filtered_search_handler))
        .route("/opportunities/hints", get(hints_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

pub async fn serve(service: OpportunityService, config: &WebConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind((config.bind_address.as_str(), config.port)).await?;
    info!(address = %listener.local_addr()?, "opportunity service listening");
    axum::serve(listener, app(AppState::new(service)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("opportunity service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "failed to listen for shutdown signal");
    }
}

async fn export_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.service.export_csv().await {
        Ok(csv) => ([(header::CONTENT_TYPE, "text/csv")], csv).into_response(),
        Err(err) => server_error(err),
    }
}

async fn filtered_search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FilteredSearchRequest>,
) -> Response {
    match state.service.filtered_search(&request.filters).await {
        Ok(opportunities) => Json(opportunities).into_response(),
        Err(err) => server_error(err),
    }
}

async fn hints_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.service.hints().await {
        Ok(hints) => Json(hints).into_response(),
        Err(err) => server_error(err),
    }
}

fn server_error(err: ServiceError) -> Response {
    error!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Server error: {err}"),
    )
        .into_response()
}
