// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Exam and attempt routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{Exam, ExamAttempt, ExamQuestion, ExamView};
use crate::routes::api::current_user;
use crate::routes::extract::ValidatedJson;
use crate::services::exam::{ExamDraft, SubmitOutcome};
use crate::AppState;
use axum::{
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
        .route("/api/exams", post(create_exam))
        .route("/api/exams/{id}", get(get_exam))
        .route("/api/exams/{id}/attempts", post(start_attempt))
        .route("/api/attempts/{id}/answers", post(answer_question))
        .route("/api/attempts/{id}/submit", post(submit_attempt))
}

// `length` on the question list records the list in its error params.
#[derive(Serialize, Deserialize, Validate)]
pub struct QuestionRequest {
    /// Defaults to `q{n}` by position
    #[validate(length(min = 1, max = 64))]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 500))]
    pub correct_answer: String,
}

#[derive(Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: u32,
    #[validate(range(min = 1, max = 600))]
    pub time_limit_minutes: u32,
    #[validate(range(min = 0, max = 100))]
    pub passing_score_percent: u32,
    #[validate(length(min = 1, max = 200), nested)]
    pub questions: Vec<QuestionRequest>,
}

/// Create an exam (ADMIN or EDITOR).
async fn create_exam(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<CreateExamRequest>,
) -> Result<(StatusCode, Json<Exam>)> {
    let actor = current_user(&state, &user).await?;

    let questions = req
        .questions
        .into_iter()
        .enumerate()
        .map(|(i, q)| ExamQuestion {
            id: q.id.unwrap_or_else(|| format!("q{}", i + 1)),
            prompt: q.prompt,
            options: q.options,
            correct_answer: q.correct_answer,
        })
        .collect();

    let draft = ExamDraft {
        title: req.title,
        max_attempts: req.max_attempts,
        time_limit_minutes: req.time_limit_minutes,
        passing_score_percent: req.passing_score_percent,
        questions,
    };

    let exam = state.exams.create_exam(&actor, draft, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(exam)))
}

/// Exam without correct answers.
async fn get_exam(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ExamView>> {
    Ok(Json(state.exams.get_exam(&id).await?.view()))
}

async fn start_attempt(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ExamAttempt>> {
    Ok(Json(
        state.exams.start(&id, &user.user_id, Utc::now()).await?,
    ))
}

#[derive(Deserialize, Validate)]
pub struct AnswerRequest {
    #[validate(length(min = 1))]
    pub question_id: String,
    #[validate(length(max = 2000))]
    pub answer: String,
}

async fn answer_question(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<AnswerRequest>,
) -> Result<Json<ExamAttempt>> {
    let attempt = state
        .exams
        .answer(&id, &user.user_id, &req.question_id, &req.answer, Utc::now())
        .await?;
    Ok(Json(attempt))
}

async fn submit_attempt(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SubmitOutcome>> {
    Ok(Json(
        state.exams.submit(&id, &user.user_id, Utc::now()).await?,
    ))
}
