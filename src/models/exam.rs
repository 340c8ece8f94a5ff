//! Exams and bounded exam attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamQuestion {
    pub id: String,
    pub prompt: String,
    /// Multiple-choice options; empty for free-text answers
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// Exam definition in `exams`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    pub id: String,
    pub title: String,
    pub max_attempts: u32,
    pub time_limit_minutes: u32,
    pub passing_score_percent: u32,
    pub questions: Vec<ExamQuestion>,
    pub created_by: String,
    pub created_at: String,
}

/// Question as shown to candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
}

/// Exam without its answer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamView {
    pub id: String,
    pub title: String,
    pub max_attempts: u32,
    pub time_limit_minutes: u32,
    pub passing_score_percent: u32,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamAnswer {
    pub question_id: String,
    pub answer: String,
    pub answered_at: DateTime<Utc>,
}

/// One attempt in `exam_attempts`, id `{exam}_{user}_{n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamAttempt {
    pub id: String,
    pub exam_id: String,
    pub user_id: String,
    pub attempt_number: u32,
    pub status: AttemptStatus,
    /// Append-only; the latest answer per question counts
    #[serde(default)]
    pub answers: Vec<ExamAnswer>,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score_percent: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExamError {
    #[error("Question {0} is not part of this exam")]
    UnknownQuestion(String),

    #[error("Attempt is closed ({0:?})")]
    Closed(AttemptStatus),

    #[error("Attempt time limit has passed")]
    Expired,

    #[error("Maximum of {0} attempts reached")]
    AttemptsExhausted(u32),
}

fn normalize(answer: &str) -> String {
    answer
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl Exam {
    pub fn question(&self, question_id: &str) -> Option<&ExamQuestion> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Percentage (floored) of questions whose latest answer is correct.
    pub fn grade(&self, answers: &[ExamAnswer]) -> u32 {
        if self.questions.is_empty() {
            return 0;
        }

        let mut latest: HashMap<&str, &str> = HashMap::new();
        for a in answers {
            latest.insert(a.question_id.as_str(), a.answer.as_str());
        }

        let correct = self
            .questions
            .iter()
            .filter(|q| {
                latest
                    .get(q.id.as_str())
                    .is_some_and(|given| normalize(given) == normalize(&q.correct_answer))
            })
            .count();

        (correct * 100 / self.questions.len()) as u32
    }

    pub fn passes(&self, score_percent: u32) -> bool {
        score_percent >= self.passing_score_percent
    }

    pub fn view(&self) -> ExamView {
        ExamView {
            id: self.id.clone(),
            title: self.title.clone(),
            max_attempts: self.max_attempts,
            time_limit_minutes: self.time_limit_minutes,
            passing_score_percent: self.passing_score_percent,
            questions: self
                .questions
                .iter()
                .map(|q| QuestionView {
                    id: q.id.clone(),
                    prompt: q.prompt.clone(),
                    options: q.options.clone(),
                })
                .collect(),
        }
    }
}

impl ExamAttempt {
    pub fn is_open(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Append an answer. The caller closes expired attempts.
    pub fn append_answer(
        &mut self,
        exam: &Exam,
        question_id: &str,
        answer: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ExamError> {
        if !self.is_open() {
            return Err(ExamError::Closed(self.status));
        }
        if self.is_expired_at(now) {
            return Err(ExamError::Expired);
        }
        if exam.question(question_id).is_none() {
            return Err(ExamError::UnknownQuestion(question_id.to_string()));
        }

        self.answers.push(ExamAnswer {
            question_id: question_id.to_string(),
            answer: answer.to_string(),
            answered_at: now,
        });
        Ok(())
    }

    /// Close and grade. Past the deadline the attempt is TIMED_OUT,
    /// otherwise SUBMITTED.
    pub fn close(&mut self, exam: &Exam, now: DateTime<Utc>) -> Result<u32, ExamError> {
        if !self.is_open() {
            return Err(ExamError::Closed(self.status));
        }

        let score = exam.grade(&self.answers);
        self.status = if self.is_expired_at(now) {
            AttemptStatus::TimedOut
        } else {
            AttemptStatus::Submitted
        };
        self.closed_at = Some(now);
        self.score_percent = Some(score);
        Ok(score)
    }
}

pub fn attempt_id(exam_id: &str, user_id: &str, attempt_number: u32) -> String {
    format!("{}_{}_{}", exam_id, user_id, attempt_number)
}

/// Next attempt number given the user's existing attempts for an exam.
pub fn next_attempt_number(existing: &[ExamAttempt], max_attempts: u32) -> Result<u32, ExamError> {
    let used = existing
        .iter()
        .map(|a| a.attempt_number)
        .max()
        .unwrap_or(0);
    if used >= max_attempts {
        return Err(ExamError::AttemptsExhausted(max_attempts));
    }
    Ok(used + 1)
}
