// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API key authentication for `/internal/*` routes.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Alternative header for callers that cannot set `Authorization`.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Require a configured internal API key, as a Bearer token or `X-Api-Key`.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let headers = request.headers();
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .or_else(|| headers.get(API_KEY_HEADER).and_then(|h| h.to_str().ok()))
        .map(|k| k.trim().to_string());

    match presented {
        Some(key) if state.config.is_valid_api_key(&key) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "Blocked internal request with invalid API key");
            Err(AppError::Unauthorized)
        }
        None => Err(AppError::Unauthorized),
    }
}
