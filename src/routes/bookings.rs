// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Class booking routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::ClassBooking;
use crate::routes::extract::ValidatedJson;
use crate::services::booking::AttendanceOutcome;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/bookings", post(create_booking).get(list_bookings))
        .route("/api/bookings/{id}", get(get_booking))
        .route("/api/bookings/{id}/confirm", post(confirm_booking))
        .route("/api/bookings/{id}/cancel", post(cancel_booking))
        .route("/api/bookings/{id}/attendance", post(mark_attendance))
        .route("/api/bookings/{id}/complete", post(complete_booking))
}

#[derive(Deserialize, Validate)]
pub struct CreateBookingRequest {
    #[validate(length(min = 1))]
    pub teacher_id: String,
    /// `YYYY-MM-DD`
    #[validate(length(equal = 10))]
    pub day: String,
    /// `HH:MM-HH:MM`
    #[validate(length(min = 9, max = 16))]
    pub time_slot: String,
}

/// Book a class; the caller is the student.
async fn create_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ClassBooking>)> {
    let booking = state
        .bookings
        .create(&user.user_id, &req.teacher_id, &req.day, &req.time_slot, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[derive(Serialize)]
pub struct BookingsResponse {
    pub bookings: Vec<ClassBooking>,
}

async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<BookingsResponse>> {
    let bookings = state.bookings.list_for_user(&user.user_id).await?;
    Ok(Json(BookingsResponse { bookings }))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ClassBooking>> {
    Ok(Json(state.bookings.get(&id, &user.user_id).await?))
}

async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ClassBooking>> {
    Ok(Json(
        state.bookings.confirm(&id, &user.user_id, Utc::now()).await?,
    ))
}

#[derive(Deserialize, Validate, Default)]
pub struct CancelRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// Body is optional.
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ClassBooking>> {
    let req: CancelRequest = if body.is_empty() {
        CancelRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    req.validate()?;

    Ok(Json(
        state
            .bookings
            .cancel(&id, &user.user_id, req.reason, Utc::now())
            .await?,
    ))
}

async fn mark_attendance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<AttendanceOutcome>> {
    Ok(Json(
        state
            .bookings
            .mark_attendance(&id, &user.user_id, Utc::now())
            .await?,
    ))
}

async fn complete_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ClassBooking>> {
    Ok(Json(
        state.bookings.complete(&id, &user.user_id, Utc::now()).await?,
    ))
}
