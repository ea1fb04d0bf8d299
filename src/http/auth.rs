//! Request authentication.
//!
//! # Responsibilities
//! - Check bearer keys for host callbacks and admin routes
//! - Extract the admin caller's identity from `X-Caller-Address`
//!
//! # Design Decisions
//! - The bearer key authenticates the client; ownership of admin operations
//!   is still decided by the router against the caller address

use alloy::primitives::Address;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::http::response::ApiError;
use crate::http::server::AppState;

pub const X_CALLER_ADDRESS: &str = "x-caller-address";

fn bearer_matches(headers: &HeaderMap, key: &str) -> Result<(), ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::Unauthenticated("missing bearer token"))?;
    match value.strip_prefix("Bearer ") {
        Some(token) if token == key => Ok(()),
        _ => Err(ApiError::Unauthenticated("invalid bearer token")),
    }
}

pub async fn require_host_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    bearer_matches(request.headers(), &state.config.server.host_api_key)?;
    Ok(next.run(request).await)
}

pub async fn require_admin_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    bearer_matches(request.headers(), &state.config.server.admin_api_key)?;
    Ok(next.run(request).await)
}

/// The account an admin request acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerAddress(pub Address);

impl<S: Send + Sync> FromRequestParts<S> for CallerAddress {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(X_CALLER_ADDRESS)
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError::Unauthenticated("missing X-Caller-Address header"))?;
        let address = raw
            .trim()
            .parse::<Address>()
            .map_err(|_| ApiError::BadRequest(format!("invalid X-Caller-Address: {raw}")))?;
        Ok(CallerAddress(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_matches() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            bearer_matches(&headers, "k"),
            Err(ApiError::Unauthenticated("missing bearer token"))
        ));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer wrong"));
        assert!(bearer_matches(&headers, "k").is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer k"));
        assert!(bearer_matches(&headers, "k").is_ok());
    }
}
