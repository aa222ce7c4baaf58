//! HTTP front end over the persisted metrics.
//!
//! - `GET /metrics`: overall summary
//! - `GET /metrics/daily?from=&to=`: per-day commits, optionally date-filtered
//! - `POST /refresh`: re-run aggregation and rewrite the files

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Query, Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::config::Config;
use crate::error::MetricsError;
use crate::hosting::HostingApi;
use crate::output::{self, DateRange, Table};
use crate::aggregator;
use crate::refresh::persist_metrics;
use crate::types::{DateWindow, ErrorResponse};
use crate::utils::{parse_date, parse_date_window, trailing_window};

pub struct AppState {
    api: Arc<dyn HostingApi>,
    repo: String,
    output_dir: PathBuf,
    max_concurrency: usize,
    default_days: u32,
    allowed_origin: HeaderValue,
    /// Held for the duration of a refresh so two never run at once.
    refresh_lock: Mutex<()>,
    /// Readers share it; a refresh takes it exclusively only while rewriting the files.
    files: RwLock<()>,
}

impl AppState {
    pub fn new(config: &Config, api: Arc<dyn HostingApi>) -> Result<Self> {
        let allowed_origin = HeaderValue::from_str(&config.server.allowed_origin)
            .map_err(|e| anyhow::anyhow!("Invalid allowed origin: {e}"))?;
        Ok(Self {
            api,
            repo: config.github.repo.clone(),
            output_dir: config.aggregation.output_dir.clone(),
            max_concurrency: config.aggregation.max_concurrent_branches,
            default_days: config.aggregation.default_days,
            allowed_origin,
            refresh_lock: Mutex::new(()),
            files: RwLock::new(()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    from: Option<String>,
    to: Option<String>,
}

impl RangeParams {
    fn to_range(&self) -> Result<DateRange, MetricsError> {
        Ok(DateRange {
            from: self.from.as_deref().map(parse_date).transpose()?,
            to: self.to.as_deref().map(parse_date).transpose()?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct RefreshRequest {
    from: Option<String>,
    to: Option<String>,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    message: String,
    from: String,
    to: String,
    users: usize,
    daily_rows: usize,
}

struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl From<MetricsError> for ApiError {
    fn from(err: MetricsError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<MetricsError>() {
            Some(MetricsError::MetricsNotFound(_)) => StatusCode::NOT_FOUND,
            Some(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {:#}", self.0);
        }
        let body = ErrorResponse {
            error: format!("{:#}", self.0),
        };
        (status, Json(body)).into_response()
    }
}

async fn get_overall(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Response, ApiError> {
    let range = params.to_range()?;
    let _files = state.files.read().await;
    let result = output::query(&state.output_dir, Table::Overall, range)?;
    Ok(Json(result).into_response())
}

async fn get_daily(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Response, ApiError> {
    let range = params.to_range()?;
    let _files = state.files.read().await;
    let result = output::query(&state.output_dir, Table::Daily, range)?;
    Ok(Json(result).into_response())
}

fn refresh_window(request: &RefreshRequest, default_days: u32) -> Result<DateWindow, MetricsError> {
    match (&request.from, &request.to) {
        (Some(from), Some(to)) => parse_date_window(from, to),
        (None, None) => Ok(trailing_window(default_days, Utc::now())),
        _ => Err(MetricsError::InvalidRequest(
            "from and to must be given together".to_string(),
        )),
    }
}

async fn post_refresh(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response, ApiError> {
    let request: RefreshRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RefreshRequest::default()
    } else {
        let mut body = body.to_vec();
        simd_json::from_slice(&mut body)
            .map_err(|e| MetricsError::InvalidRequest(format!("malformed refresh body: {e}")))?
    };
    let window = refresh_window(&request, state.default_days)?;

    let _refreshing = state.refresh_lock.lock().await;
    let tables = aggregator::aggregate(
        state.api.clone(),
        &state.repo,
        window,
        state.max_concurrency,
    )
    .await
    .map_err(|e| ApiError(e.context("Failed to refresh metrics")))?;

    {
        let _files = state.files.write().await;
        persist_metrics(&state.output_dir, &tables)
            .await
            .map_err(|e| ApiError(e.context("Failed to refresh metrics")))?;
    }

    Ok(Json(RefreshResponse {
        message: "Metrics refreshed successfully".to_string(),
        from: window.start.format("%Y-%m-%d").to_string(),
        to: window.end.format("%Y-%m-%d").to_string(),
        users: tables.overall.len(),
        daily_rows: tables.daily.len(),
    })
    .into_response())
}

/// Log every request and stamp the CORS origin on every response.
async fn log_and_allow_origin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    info!(method = %request.method(), path = %request.uri().path(), "request");
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        state.allowed_origin.clone(),
    );
    response
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/metrics", get(get_overall))
        .route("/metrics/daily", get(get_daily))
        .route("/refresh", post(post_refresh))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            log_and_allow_origin,
        ))
        .with_state(state)
}

pub async fn serve(config: &Config, api: Arc<dyn HostingApi>) -> Result<()> {
    let state = Arc::new(AppState::new(config, api)?);
    let app = router(state);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!(
        "Listening on http://{}:{} (repository {}, output {})",
        config.server.host,
        config.server.port,
        config.github.repo,
        config.aggregation.output_dir.display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
