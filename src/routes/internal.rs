// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Service-to-service routes, authenticated by API key.
//!
//! Identity provisioning and payment capture happen elsewhere; these routes
//! receive their results.

use crate::db::collections;
use crate::error::{AppError, Result};
use crate::middleware::auth::create_jwt;
use crate::models::credits::MAX_CREDIT_AMOUNT;
use crate::models::{Role, User};
use crate::routes::extract::ValidatedJson;
use crate::services::ledger::LedgerOutcome;
use crate::time_utils::{format_utc_rfc3339, new_id};
use crate::AppState;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/internal/users", post(create_user))
        .route("/internal/sessions", post(create_session))
        .route("/internal/credits/purchase", post(record_purchase))
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user: User,
    /// Session JWT
    pub token: String,
}

fn issue_token(state: &AppState, user_id: &str) -> Result<String> {
    Ok(create_jwt(
        user_id,
        &state.config.jwt_signing_key,
        state.config.session_ttl_days,
    )?)
}

#[derive(Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// Provision a user and return a session for it.
async fn create_user(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let email = req.email.trim().to_lowercase();
    let _guard = state
        .db
        .lock(collections::USERS, &format!("email:{}", email))
        .await;

    if state.db.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::BadRequest(format!("Email {} is already registered", email)));
    }

    let mut roles: Vec<Role> = Vec::new();
    for role in req.roles {
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    if roles.is_empty() {
        roles.push(Role::Student);
    }

    let user = User {
        id: new_id()?,
        email,
        display_name: req.display_name.trim().to_string(),
        roles,
        created_at: format_utc_rfc3339(Utc::now()),
    };
    state.db.upsert_user(&user).await?;
    let token = issue_token(&state, &user.id)?;

    tracing::info!(user_id = %user.id, roles = ?user.roles, "User provisioned");
    Ok((StatusCode::CREATED, Json(SessionResponse { user, token })))
}

#[derive(Deserialize, Validate)]
pub struct SessionRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
}

/// Issue a session JWT for an existing user.
async fn create_session(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<SessionRequest>,
) -> Result<Json<SessionResponse>> {
    let user = state
        .db
        .get_user(&req.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", req.user_id)))?;
    let token = issue_token(&state, &user.id)?;

    tracing::debug!(user_id = %user.id, "Session issued");
    Ok(Json(SessionResponse { user, token }))
}

#[derive(Deserialize, Validate)]
pub struct PurchaseRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(range(min = 1, max = MAX_CREDIT_AMOUNT))]
    pub amount: i64,
    /// Payment capture id
    #[validate(length(min = 1, max = 200))]
    pub reference: String,
}

/// Record credits bought through a captured payment.
async fn record_purchase(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<PurchaseRequest>,
) -> Result<Json<LedgerOutcome>> {
    if state.db.get_user(&req.user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User {} not found", req.user_id)));
    }

    let outcome = state
        .ledger
        .purchase(&req.user_id, req.amount, &req.reference, Utc::now())
        .await?;
    Ok(Json(outcome))
}
