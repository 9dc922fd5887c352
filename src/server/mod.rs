//! HTTP façade
//!
//! Binds the analysis and cache façades to a small REST surface. Result
//! blobs cross the wire base64-encoded and are never inspected. The
//! server is a thin collaborator: every decision lives in the analysis
//! and cache layers.

use crate::analysis::{analyze_select, analyze_write, WriteInfo};
use crate::cache::{Cache, StoreMetrics};
use crate::error::Error;
use crate::types::Params;
use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, instrument};

/// API errors. Analysis failures are the caller's fault; storage
/// failures are ours.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::ParseFailed(_) | Error::Unsupported(_) => StatusCode::BAD_REQUEST,
            Error::StorageFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
            code: self.status.as_u16(),
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<Cache>,
    pub start_time: Instant,
    pub cors_enabled: bool,
}

impl AppState {
    pub fn new(cache: Arc<Cache>, cors_enabled: bool) -> Self {
        Self {
            cache,
            start_time: Instant::now(),
            cors_enabled,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    sql: String,
    #[serde(default)]
    params: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    sql: String,
    #[serde(default)]
    params: Option<serde_json::Value>,
    /// Base64-encoded opaque result bytes.
    result: String,
    /// Accepted for wire compatibility; entries live until invalidated.
    #[serde(default)]
    #[allow(dead_code)]
    ttl: Option<u64>,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    fingerprint: String,
    classification: crate::analysis::Classification,
    tables: Vec<String>,
    normalized_sql: String,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    success: bool,
    fingerprint: String,
}

#[derive(Debug, Serialize)]
struct CacheResponse {
    result: Option<String>,
}

#[derive(Debug, Serialize)]
struct InvalidateResponse {
    success: bool,
    invalidated: WriteInfo,
}

#[derive(Debug, Serialize)]
struct ShouldInvalidateResponse {
    should_invalidate: bool,
}

#[derive(Debug, Serialize)]
struct ClearTableResponse {
    success: bool,
    table: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    store: StoreMetrics,
    hits: u64,
    misses: u64,
    registrations: u64,
    invalidations: u64,
    entries_invalidated: u64,
}

fn parse_params(params: &Option<serde_json::Value>) -> Option<Params> {
    params.as_ref().and_then(Params::from_json)
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let cors_enabled = state.cors_enabled;
    let router = Router::new()
        .route("/analyze", post(analyze_handler))
        .route("/register", post(register_handler))
        .route("/cache/:fingerprint", get(cache_get_handler))
        .route("/invalidate", post(invalidate_handler))
        .route("/should-invalidate", post(should_invalidate_handler))
        .route("/table/:name", delete(clear_table_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state);
    if cors_enabled {
        router.layer(middleware::from_fn(cors_headers))
    } else {
        router
    }
}

async fn cors_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

#[instrument(skip(request))]
async fn analyze_handler(
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let params = parse_params(&request.params);
    let key = analyze_select(&request.sql, params.as_ref())?;
    Ok(Json(AnalyzeResponse {
        fingerprint: key.fingerprint.clone(),
        classification: key.classification,
        tables: key.tables.iter().map(|t| t.table.clone()).collect(),
        normalized_sql: key.normalized_sql,
    }))
}

#[instrument(skip(state, request))]
async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let params = parse_params(&request.params);
    let key = analyze_select(&request.sql, params.as_ref())?;
    let result = BASE64.decode(request.result.as_bytes()).map_err(|e| ApiError {
        status: StatusCode::BAD_REQUEST,
        message: format!("invalid base64 result: {}", e),
    })?;
    state.cache.register(&key.fingerprint, &result, &key)?;
    Ok(Json(RegisterResponse {
        success: true,
        fingerprint: key.fingerprint,
    }))
}

#[instrument(skip(state))]
async fn cache_get_handler(
    State(state): State<AppState>,
    Path(fingerprint): Path<String>,
) -> Result<Response, ApiError> {
    match state.cache.get(&fingerprint)? {
        Some(result) => Ok(Json(CacheResponse {
            result: Some(BASE64.encode(result.as_slice())),
        })
        .into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(CacheResponse { result: None }),
        )
            .into_response()),
    }
}

#[instrument(skip(state, request))]
async fn invalidate_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let params = parse_params(&request.params);
    let write = analyze_write(&request.sql, params.as_ref())?;
    let deleted = state.cache.invalidate(&write)?;
    info!(table = %write.table, deleted, "invalidated");
    Ok(Json(InvalidateResponse {
        success: true,
        invalidated: write,
    }))
}

#[instrument(skip(state, request))]
async fn should_invalidate_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<ShouldInvalidateResponse>, ApiError> {
    let params = parse_params(&request.params);
    let write = analyze_write(&request.sql, params.as_ref())?;
    let would_delete = state.cache.preview_invalidate(&write)?;
    Ok(Json(ShouldInvalidateResponse {
        should_invalidate: would_delete > 0,
    }))
}

#[instrument(skip(state))]
async fn clear_table_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ClearTableResponse>, ApiError> {
    let deleted = state.cache.clear_table(&name)?;
    info!(table = %name, deleted, "cleared table");
    Ok(Json(ClearTableResponse {
        success: true,
        table: name,
    }))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    })
}

async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let store = state.cache.metrics()?;
    let counters = state.cache.counters();
    Ok(Json(StatsResponse {
        store,
        hits: counters.hits.load(Ordering::Relaxed),
        misses: counters.misses.load(Ordering::Relaxed),
        registrations: counters.registrations.load(Ordering::Relaxed),
        invalidations: counters.invalidations.load(Ordering::Relaxed),
        entries_invalidated: counters.entries_invalidated.load(Ordering::Relaxed),
    }))
}

/// Prometheus text exposition of the process counters and entry count.
async fn metrics_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let counters = state.cache.counters();
    let store = state.cache.metrics()?;
    let mut body = String::new();
    for (name, help, value) in [
        (
            "cadabra_cache_hits_total",
            "Cache lookups served from the store or LRU.",
            counters.hits.load(Ordering::Relaxed),
        ),
        (
            "cadabra_cache_misses_total",
            "Cache lookups that found nothing.",
            counters.misses.load(Ordering::Relaxed),
        ),
        (
            "cadabra_registrations_total",
            "Cache entries registered.",
            counters.registrations.load(Ordering::Relaxed),
        ),
        (
            "cadabra_invalidations_total",
            "Invalidation calls processed.",
            counters.invalidations.load(Ordering::Relaxed),
        ),
        (
            "cadabra_entries_invalidated_total",
            "Cache entries deleted by invalidation.",
            counters.entries_invalidated.load(Ordering::Relaxed),
        ),
    ] {
        body.push_str(&format!(
            "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n"
        ));
    }
    body.push_str(&format!(
        "# HELP cadabra_cache_entries Current number of cache entries.\n\
         # TYPE cadabra_cache_entries gauge\ncadabra_cache_entries {}\n",
        store.total_entries
    ));
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// Bind and serve until the task is cancelled.
pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> crate::error::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
