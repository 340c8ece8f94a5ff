// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Exams with bounded, timed attempts.

use crate::db::{collections, Db, Write};
use crate::error::{AppError, Result};
use crate::models::exam::{attempt_id, next_attempt_number};
use crate::models::{
    AttemptStatus, Exam, ExamAttempt, ExamQuestion, RewardReason, Role, User,
};
use crate::services::rewards::{DispatchOutcome, RewardDispatcher};
use crate::time_utils::{format_utc_rfc3339, new_id};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Exam contents before it is stored.
#[derive(Debug, Clone)]
pub struct ExamDraft {
    pub title: String,
    pub max_attempts: u32,
    pub time_limit_minutes: u32,
    pub passing_score_percent: u32,
    pub questions: Vec<ExamQuestion>,
}

/// Result of submitting an attempt.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub attempt: ExamAttempt,
    pub passed: bool,
    pub reward: Option<DispatchOutcome>,
}

#[derive(Clone)]
pub struct ExamService {
    db: Db,
    rewards: RewardDispatcher,
}

impl ExamService {
    pub fn new(db: Db, rewards: RewardDispatcher) -> Self {
        Self { db, rewards }
    }

    /// Store a new exam. Requires ADMIN or EDITOR.
    pub async fn create_exam(&self, actor: &User, draft: ExamDraft, now: DateTime<Utc>) -> Result<Exam> {
        if !actor.has_any_role(&[Role::Admin, Role::Editor]) {
            return Err(AppError::Forbidden(
                "Creating exams requires ADMIN or EDITOR".to_string(),
            ));
        }
        validate_questions(&draft.questions)?;

        let exam = Exam {
            id: new_id()?,
            title: draft.title,
            max_attempts: draft.max_attempts,
            time_limit_minutes: draft.time_limit_minutes,
            passing_score_percent: draft.passing_score_percent,
            questions: draft.questions,
            created_by: actor.id.clone(),
            created_at: format_utc_rfc3339(now),
        };
        self.db.set(collections::EXAMS, &exam.id, &exam).await?;

        tracing::info!(
            exam_id = %exam.id,
            created_by = %actor.id,
            questions = exam.questions.len(),
            "Exam created"
        );
        Ok(exam)
    }

    pub async fn get_exam(&self, exam_id: &str) -> Result<Exam> {
        self.db
            .get(collections::EXAMS, exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", exam_id)))
    }

    async fn load_attempt(&self, attempt_id: &str, user_id: &str) -> Result<ExamAttempt> {
        let attempt: ExamAttempt = self
            .db
            .get(collections::EXAM_ATTEMPTS, attempt_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))?;
        if attempt.user_id != user_id {
            return Err(AppError::Forbidden("Not your attempt".to_string()));
        }
        Ok(attempt)
    }

    /// Start an attempt, or return the one already in progress.
    pub async fn start(&self, exam_id: &str, user_id: &str, now: DateTime<Utc>) -> Result<ExamAttempt> {
        let exam = self.get_exam(exam_id).await?;
        let _guard = self
            .db
            .lock(collections::EXAM_ATTEMPTS, &format!("{}_{}", exam_id, user_id))
            .await;

        let mut attempts: Vec<ExamAttempt> = self
            .db
            .query_eq(
                collections::EXAM_ATTEMPTS,
                &[("exam_id", exam_id), ("user_id", user_id)],
            )
            .await?;

        for attempt in attempts.iter_mut().filter(|a| a.is_open()) {
            if !attempt.is_expired_at(now) {
                tracing::debug!(attempt_id = %attempt.id, "Resuming open attempt");
                return Ok(attempt.clone());
            }
            let _guard = self.db.lock(collections::EXAM_ATTEMPTS, &attempt.id).await;
            let mut fresh = self.load_attempt(&attempt.id, user_id).await?;
            if fresh.is_open() {
                let (score, passed, _) = self.close_and_reward(&mut fresh, &exam, now).await?;
                tracing::info!(attempt_id = %fresh.id, score, passed, "Expired attempt timed out");
            }
            *attempt = fresh;
        }

        let attempt_number = next_attempt_number(&attempts, exam.max_attempts)?;
        let attempt = ExamAttempt {
            id: attempt_id(exam_id, user_id, attempt_number),
            exam_id: exam_id.to_string(),
            user_id: user_id.to_string(),
            attempt_number,
            status: AttemptStatus::InProgress,
            answers: Vec::new(),
            started_at: now,
            expires_at: now + Duration::minutes(i64::from(exam.time_limit_minutes)),
            closed_at: None,
            score_percent: None,
        };

        if !self
            .db
            .create(collections::EXAM_ATTEMPTS, &attempt.id, &attempt)
            .await?
        {
            // Started concurrently elsewhere; hand back that attempt.
            return self.load_attempt(&attempt.id, user_id).await;
        }

        tracing::info!(
            exam_id,
            user_id,
            attempt_number,
            expires_at = %format_utc_rfc3339(attempt.expires_at),
            "Exam attempt started"
        );
        Ok(attempt)
    }

    /// Record an answer; the latest answer to a question counts.
    pub async fn answer(
        &self,
        attempt_id: &str,
        user_id: &str,
        question_id: &str,
        answer: &str,
        now: DateTime<Utc>,
    ) -> Result<ExamAttempt> {
        let _guard = self.db.lock(collections::EXAM_ATTEMPTS, attempt_id).await;

        let mut attempt = self.load_attempt(attempt_id, user_id).await?;
        let exam = self.get_exam(&attempt.exam_id).await?;

        if attempt.is_open() && attempt.is_expired_at(now) {
            let (score, passed, _) = self.close_and_reward(&mut attempt, &exam, now).await?;
            tracing::info!(attempt_id, score, passed, "Answer after deadline, attempt timed out");
            return Err(AppError::InvalidState(
                "Attempt time limit has passed".to_string(),
            ));
        }

        attempt.append_answer(&exam, question_id, answer, now)?;
        self.db
            .set(collections::EXAM_ATTEMPTS, attempt_id, &attempt)
            .await?;

        tracing::debug!(attempt_id, question_id, "Answer recorded");
        Ok(attempt)
    }

    /// Grade and close the attempt. A passing score earns the exam reward
    /// once per exam.
    pub async fn submit(&self, attempt_id: &str, user_id: &str, now: DateTime<Utc>) -> Result<SubmitOutcome> {
        let _guard = self.db.lock(collections::EXAM_ATTEMPTS, attempt_id).await;

        let mut attempt = self.load_attempt(attempt_id, user_id).await?;
        let exam = self.get_exam(&attempt.exam_id).await?;

        let (score, passed, reward) = self.close_and_reward(&mut attempt, &exam, now).await?;

        tracing::info!(
            attempt_id,
            user_id,
            score,
            passed,
            status = ?attempt.status,
            "Exam attempt submitted"
        );
        Ok(SubmitOutcome {
            attempt,
            passed,
            reward,
        })
    }

    /// Grade, close and store `attempt`. A passing score earns the exam
    /// reward in the same commit, whether the attempt was submitted or
    /// timed out.
    async fn close_and_reward(
        &self,
        attempt: &mut ExamAttempt,
        exam: &Exam,
        now: DateTime<Utc>,
    ) -> Result<(u32, bool, Option<DispatchOutcome>)> {
        let score = attempt.close(exam, now)?;
        let passed = exam.passes(score);
        let write = Write::set(collections::EXAM_ATTEMPTS, attempt.id.clone(), &*attempt)?;

        let reward = if passed {
            let reason = RewardReason::ExamPassed {
                exam_id: exam.id.clone(),
            };
            Some(
                self.rewards
                    .dispatch_with(&attempt.user_id, reason, now, vec![write])
                    .await?,
            )
        } else {
            self.db.commit(vec![write]).await?;
            None
        };
        Ok((score, passed, reward))
    }
}

fn validate_questions(questions: &[ExamQuestion]) -> Result<()> {
    if questions.is_empty() {
        return Err(AppError::BadRequest("An exam needs at least one question".to_string()));
    }

    let mut seen = HashSet::new();
    for q in questions {
        if !seen.insert(q.id.as_str()) {
            return Err(AppError::BadRequest(format!("Duplicate question id {}", q.id)));
        }
        if !q.options.is_empty() && !q.options.contains(&q.correct_answer) {
            return Err(AppError::BadRequest(format!(
                "Correct answer for {} is not one of its options",
                q.id
            )));
        }
    }
    Ok(())
}
