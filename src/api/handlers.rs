use axum::{
    body::Body,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::header,
    response::{Html, IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use serde_json::Value;
use tracing::{debug, error, info};
use utoipa::OpenApi;

use super::{
    dto::{ErrorResponse, LogResponse, SensorReadingDto},
    errors::AppError,
    export,
    extract::PeerAddr,
    params::FilterParams,
    render, AppState,
};
use crate::{
    db::readings,
    ingest::{Defaults, FixedBatchPayload, Payload, ReadingPayload},
    timestamp,
};

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Store one reading, a list of readings, or a fixed batch of five.
///
/// All rows are written in one transaction; a single invalid reading
/// rejects the whole request.
#[utoipa::path(
    post,
    path = "/log",
    request_body(
        content = ReadingPayload,
        description = "A reading object, an array of reading objects, or a `FixedBatchPayload`"
    ),
    responses(
        (status = 200, description = "Readings stored", body = LogResponse),
        (status = 400, description = "Invalid body", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "readings"
)]
pub async fn log_readings(
    State(state): State<AppState>,
    peer: PeerAddr,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<LogResponse>, AppError> {
    let Json(body) = payload?;
    let defaults = Defaults {
        now: timestamp::now_utc(),
        source: peer.fallback_source(&state.source_fallback),
    };

    let new_readings = Payload::from_json(body)?.into_readings(&defaults)?;
    let stored = readings::insert_all(&state.pool, &new_readings).await?;

    info!(stored, "Readings stored");
    Ok(Json(LogResponse::success(stored)))
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// HTML table of the most recent readings, newest first.
#[utoipa::path(
    get,
    path = "/view",
    params(FilterParams),
    responses(
        (status = 200, description = "Readings table", content_type = "text/html", body = String),
        (status = 400, description = "Malformed filter", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "readings"
)]
pub async fn view_readings(
    State(state): State<AppState>,
    query: Result<Query<FilterParams>, QueryRejection>,
) -> Result<Html<String>, AppError> {
    let Query(params) = query?;
    let filter = params.filter()?;
    let limit = params.limit(state.view_limit, state.max_view_limit)?;

    let rows = readings::fetch_recent(&state.pool, &filter, limit).await?;
    debug!(?filter, limit, rows = rows.len(), "Rendering readings view");

    Ok(Html(render::readings_page(&rows, &params, limit)))
}

/// The readings behind the HTML view, as JSON.
#[utoipa::path(
    get,
    path = "/api/readings",
    params(FilterParams),
    responses(
        (status = 200, description = "Matching readings, newest first", body = Vec<SensorReadingDto>),
        (status = 400, description = "Malformed filter", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "readings"
)]
pub async fn list_readings(
    State(state): State<AppState>,
    query: Result<Query<FilterParams>, QueryRejection>,
) -> Result<Json<Vec<SensorReadingDto>>, AppError> {
    let Query(params) = query?;
    let filter = params.filter()?;
    let limit = params.limit(state.view_limit, state.max_view_limit)?;

    let rows = readings::fetch_recent(&state.pool, &filter, limit).await?;
    debug!(?filter, limit, rows = rows.len(), "Listing readings");

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Every matching reading as a CSV attachment. `limit` is ignored.
///
/// Rows are streamed from a database cursor, so a storage failure after the
/// first chunk truncates the body instead of changing the status.
#[utoipa::path(
    get,
    path = "/download",
    params(FilterParams),
    responses(
        (status = 200, description = "CSV export", content_type = "text/csv", body = String),
        (status = 400, description = "Malformed filter", body = ErrorResponse),
    ),
    tag = "readings"
)]
pub async fn export_readings(
    State(state): State<AppState>,
    query: Result<Query<FilterParams>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(params) = query?;
    let filter = params.filter()?;
    info!(?filter, "Starting CSV export");

    let rows = readings::stream_matching(state.pool.clone(), filter);
    let csv = export::csv_stream(rows)
        .inspect_err(|e| error!(error = %e, "CSV export aborted"));

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"sensor_data.csv\"",
            ),
        ],
        Body::from_stream(csv),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI document
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(log_readings, view_readings, list_readings, export_readings, health),
    components(schemas(
        ReadingPayload,
        FixedBatchPayload,
        LogResponse,
        SensorReadingDto,
        ErrorResponse
    )),
    tags(
        (name = "readings", description = "Sensor reading ingestion and read-back"),
        (name = "system",   description = "System endpoints"),
    ),
    info(
        title = "Sensor Log API",
        version = "0.1.0",
        description = "Ingests temperature and humidity readings and serves them back as HTML, JSON and CSV"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
