//! HTTP surface.
//!
//! Routes:
//! - POST /solve-case (also /v1/solve-case)
//! - GET  /health

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::async_trait;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::core::{SolveError, SolvePipeline};
use crate::domain::{validate_requested_count, CaseQuery, SolveResult, ValidationError};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SolvePipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<SolvePipeline>) -> Self {
        Self { pipeline }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/solve-case", post(solve_case))
        .route("/v1/solve-case", post(solve_case))
        .with_state(state)
}

/// Query string of `POST /solve-case`
#[derive(Debug, Default, Deserialize)]
pub struct SolveParams {
    /// Number of suggestions to generate (defaults to k)
    pub n: Option<u32>,
}

/// Errors returned to HTTP callers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Body or query string that does not deserialize
    #[error("{0}")]
    Malformed(String),

    #[error(transparent)]
    Unavailable(#[from] SolveError),

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Malformed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Malformed(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Malformed(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Internal(e) => error!(error = %format!("{:#}", e), "Unhandled error"),
            other => warn!(%status, error = %other, "Request failed"),
        }

        // Internal errors keep their detail in the logs only
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// `Json` whose rejection is reported as an `ApiError`
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Query` whose rejection is reported as an `ApiError`
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Retrieve context docs and generate suggestions for a case
pub async fn solve_case(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SolveParams>,
    ApiJson(query): ApiJson<CaseQuery>,
) -> Result<Json<SolveResult>, ApiError> {
    query.validate()?;
    validate_requested_count(params.n)?;

    let result = state.pipeline.solve(&query, params.n).await?;
    Ok(Json(result))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Bind `address` and serve until `shutdown` resolves
pub async fn serve<S>(address: &str, state: AppState, shutdown: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", address))?;
    info!(address = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}
