// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users: profile, credits, points and streaks.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::credits::MAX_CREDIT_AMOUNT;
use crate::models::{CreditTransaction, Role, User};
use crate::routes::extract::{ValidatedJson, ValidatedQuery};
use crate::services::ledger::LedgerOutcome;
use crate::services::rewards::ActivityCompletion;
use crate::services::streak::StreakView;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

const DEFAULT_HISTORY_LIMIT: u32 = 20;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/credits", get(get_credits))
        .route("/api/credits/transactions", get(get_credit_history))
        .route("/api/credits/spend", post(spend_credits))
        .route("/api/admin/credits/grant", post(grant_credits))
        .route("/api/points", get(get_points))
        .route("/api/streak", get(get_streak))
        .route(
            "/api/activities/{activity_id}/complete",
            post(complete_activity),
        )
}

/// Load the caller's user record.
pub(crate) async fn current_user(state: &AppState, auth: &AuthUser) -> Result<User> {
    state
        .db
        .get_user(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", auth.user_id)))
}

// ─── User Profile ────────────────────────────────────────────

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<User>> {
    Ok(Json(current_user(&state, &user).await?))
}

// ─── Credits ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct CreditsResponse {
    pub user_id: String,
    pub total_credits: i64,
    pub spent_credits: i64,
    pub available_credits: i64,
}

async fn get_credits(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<CreditsResponse>> {
    let balance = state.ledger.balance(&user.user_id).await?;
    Ok(Json(CreditsResponse {
        available_credits: balance.available(),
        user_id: balance.user_id,
        total_credits: balance.total_credits,
        spent_credits: balance.spent_credits,
    }))
}

#[derive(Deserialize, Validate)]
struct HistoryQuery {
    #[validate(range(min = 1))]
    limit: Option<u32>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub transactions: Vec<CreditTransaction>,
}

async fn get_credit_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ValidatedQuery(params): ValidatedQuery<HistoryQuery>,
) -> Result<Json<HistoryResponse>> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let transactions = state.ledger.history(&user.user_id, limit).await?;
    Ok(Json(HistoryResponse { transactions }))
}

#[derive(Deserialize, Validate)]
pub struct SpendRequest {
    #[validate(range(min = 1, max = MAX_CREDIT_AMOUNT))]
    pub amount: i64,
    #[validate(length(min = 1, max = 200))]
    pub reason: String,
    /// Client-chosen idempotency reference
    #[validate(length(min = 1, max = 200))]
    pub reference: String,
}

async fn spend_credits(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<SpendRequest>,
) -> Result<Json<LedgerOutcome>> {
    let outcome = state
        .ledger
        .spend(&user.user_id, req.amount, &req.reason, &req.reference, Utc::now())
        .await?;
    Ok(Json(outcome))
}

#[derive(Deserialize, Validate)]
pub struct GrantRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(range(min = 1, max = MAX_CREDIT_AMOUNT))]
    pub amount: i64,
    #[validate(length(min = 1, max = 200))]
    pub reason: String,
    #[validate(length(min = 1, max = 200))]
    pub reference: String,
}

/// Administrator credit grant.
async fn grant_credits(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<GrantRequest>,
) -> Result<Json<LedgerOutcome>> {
    let admin = current_user(&state, &user).await?;
    if !admin.has_role(Role::Admin) {
        return Err(AppError::Forbidden("Granting credits requires ADMIN".to_string()));
    }
    if state.db.get_user(&req.user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User {} not found", req.user_id)));
    }

    let outcome = state
        .ledger
        .grant(&req.user_id, req.amount, &req.reason, &req.reference, Utc::now())
        .await?;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %req.user_id,
        amount = req.amount,
        applied = outcome.applied,
        "Admin credit grant"
    );
    Ok(Json(outcome))
}

// ─── Rewards & Streaks ───────────────────────────────────────

#[derive(Serialize)]
pub struct PointsResponse {
    pub user_id: String,
    pub total_points: i64,
}

async fn get_points(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<PointsResponse>> {
    let points = state.rewards.points(&user.user_id).await?;
    Ok(Json(PointsResponse {
        user_id: points.user_id,
        total_points: points.total_points,
    }))
}

async fn get_streak(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<StreakView>> {
    let today = Utc::now().date_naive();
    Ok(Json(state.streaks.view(&user.user_id, today).await?))
}

async fn complete_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<String>,
) -> Result<Json<ActivityCompletion>> {
    let completion = state
        .rewards
        .complete_activity(&user.user_id, &activity_id, Utc::now())
        .await?;
    Ok(Json(completion))
}
