//! API error responses.
//!
//! # Responsibilities
//! - Map router errors to HTTP status codes
//! - Render every error as `{"error": kind, "message": text}`
//!
//! # Design Decisions
//! - 401 for a missing or wrong bearer key, 403 for a non-owner caller
//! - Rejected callbacks return 4xx so the host reverts the contributor's action
//! - Invariant and host failures are 500: they are not the caller's fault

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::router::error::RouterError;
use crate::router::snapshot::SnapshotError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Router(#[from] RouterError),

    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("snapshot persistence is not configured")]
    SnapshotDisabled,

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("background task failed: {0}")]
    Task(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Router(err) => router_status(err),
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::SnapshotDisabled => StatusCode::CONFLICT,
            ApiError::Snapshot(_) | ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Router(err) => err.kind(),
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::SnapshotDisabled => "snapshot_disabled",
            ApiError::Snapshot(_) => "snapshot",
            ApiError::Task(_) => "task",
        }
    }
}

fn router_status(err: &RouterError) -> StatusCode {
    match err {
        RouterError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        RouterError::UnknownStream(_) => StatusCode::NOT_FOUND,
        RouterError::AlreadyRegistered(_)
        | RouterError::AlreadyInitialized
        | RouterError::StreamExists(_)
        | RouterError::DistributionNotInitialized => StatusCode::CONFLICT,
        RouterError::InvalidRecipient(_)
        | RouterError::InvalidFlowRate(_)
        | RouterError::UnsupportedToken(_)
        | RouterError::RateOverflow { .. }
        | RouterError::PartialRouteFailure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        RouterError::InvariantViolation(_) | RouterError::Host(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
