pub mod dto;
pub mod errors;
pub mod export;
pub mod extract;
pub mod handlers;
pub mod params;
pub mod render;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::config::{Config, SourceFallback};
use handlers::ApiDoc;

/// Everything a handler needs: the pool plus read-only settings.
#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub view_limit: u32,
    pub max_view_limit: u32,
    pub source_fallback: SourceFallback,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        Self {
            pool,
            view_limit: config.view_limit,
            max_view_limit: config.max_view_limit,
            source_fallback: config.source_fallback.clone(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/log", post(handlers::log_readings))
        .route("/", get(handlers::view_readings))
        .route("/view", get(handlers::view_readings))
        .route("/api/readings", get(handlers::list_readings))
        .route("/download", get(handlers::export_readings))
        .route("/export", get(handlers::export_readings))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        .layer(TraceLayer::new_for_http())
}
