// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reward dispatcher.
//!
//! Grants points for completion events. Each reason has an idempotency key;
//! the transaction row for a key is written at most once per user, together
//! with the points total it produced.

use crate::config::RewardSettings;
use crate::db::{collections, Db, Write};
use crate::error::{AppError, Result};
use crate::models::rewards::reward_transaction_id;
use crate::models::{RewardReason, RewardTransaction, StreakTransition, UserPoints};
use crate::services::streak::{StreakTracker, StreakView};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of dispatching one reward.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    /// False when this reward had already been granted
    pub applied: bool,
    pub transaction: RewardTransaction,
}

/// Result of completing an activity.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityCompletion {
    pub reward: DispatchOutcome,
    /// Streak bonus granted by this completion
    pub milestone: Option<DispatchOutcome>,
    pub streak: StreakView,
    pub streak_transition: Option<StreakTransition>,
    pub total_points: i64,
}

#[derive(Clone)]
pub struct RewardDispatcher {
    db: Db,
    settings: RewardSettings,
    streaks: StreakTracker,
}

impl RewardDispatcher {
    pub fn new(db: Db, settings: RewardSettings, streaks: StreakTracker) -> Self {
        Self {
            db,
            settings,
            streaks,
        }
    }

    pub fn points_for(&self, reason: &RewardReason) -> i64 {
        match reason {
            RewardReason::ActivityCompleted { .. } => self.settings.activity_completion_points,
            RewardReason::StreakMilestone { days, .. } => {
                self.settings.milestone_points(*days).unwrap_or(0)
            }
            RewardReason::ExamPassed { .. } => self.settings.exam_pass_points,
        }
    }

    pub async fn points(&self, user_id: &str) -> Result<UserPoints> {
        Ok(self
            .db
            .get(collections::USER_POINTS, user_id)
            .await?
            .unwrap_or_else(|| UserPoints::empty(user_id)))
    }

    /// Grant the reward for `reason` once.
    pub async fn dispatch(
        &self,
        user_id: &str,
        reason: RewardReason,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome> {
        self.dispatch_with(user_id, reason, now, Vec::new()).await
    }

    /// Like [`dispatch`](Self::dispatch), committing `extra` in the same
    /// transaction. `extra` is committed alone when the reward already exists.
    pub(crate) async fn dispatch_with(
        &self,
        user_id: &str,
        reason: RewardReason,
        now: DateTime<Utc>,
        extra: Vec<Write>,
    ) -> Result<DispatchOutcome> {
        let _guard = self.db.lock(collections::USER_POINTS, user_id).await;

        let mut points = self.points(user_id).await?;
        let (outcome, row) = self.prepare(&mut points, user_id, reason, now).await?;

        let mut writes = extra;
        if let Some(row) = row {
            writes.push(Write::set(collections::USER_POINTS, user_id, &points)?);
            writes.push(row);
        }
        self.db.commit(writes).await?;

        if outcome.applied {
            tracing::info!(
                user_id,
                reason = %outcome.transaction.reference,
                points = outcome.transaction.points,
                total_points = points.total_points,
                "Reward granted"
            );
        }
        Ok(outcome)
    }

    /// Grant activity points, record the day in the streak and grant a
    /// streak bonus when the new streak length is a milestone. All of it is
    /// committed together; a repeated completion changes nothing.
    pub async fn complete_activity(
        &self,
        user_id: &str,
        activity_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ActivityCompletion> {
        if activity_id.trim().is_empty() {
            return Err(AppError::BadRequest("activity_id must not be empty".to_string()));
        }
        let today = now.date_naive();

        let _points_guard = self.db.lock(collections::USER_POINTS, user_id).await;
        let _streak_guard = self.db.lock(collections::USER_STREAKS, user_id).await;

        let mut points = self.points(user_id).await?;
        let mut streak = self.streaks.load(user_id).await?;

        let reason = RewardReason::ActivityCompleted {
            activity_id: activity_id.to_string(),
        };
        let (reward, row) = self.prepare(&mut points, user_id, reason, now).await?;

        let Some(row) = row else {
            tracing::debug!(user_id, activity_id, "Activity already completed");
            return Ok(ActivityCompletion {
                reward,
                milestone: None,
                streak: StreakView::of(&streak, today),
                streak_transition: None,
                total_points: points.total_points,
            });
        };
        let mut writes = vec![row];

        let transition = streak.record(today);
        let mut milestone = None;
        if transition.changed() {
            streak.updated_at = format_utc_rfc3339(now);
            writes.push(Write::set(collections::USER_STREAKS, user_id, &streak)?);

            if let (Some(_), Some(started_on)) = (
                self.settings.milestone_points(streak.current_streak),
                streak.started_on,
            ) {
                let bonus = RewardReason::StreakMilestone {
                    days: streak.current_streak,
                    started_on,
                };
                let (outcome, row) = self.prepare(&mut points, user_id, bonus, now).await?;
                if let Some(row) = row {
                    writes.push(row);
                    milestone = Some(outcome);
                }
            }
        }

        writes.push(Write::set(collections::USER_POINTS, user_id, &points)?);
        self.db.commit(writes).await?;

        tracing::info!(
            user_id,
            activity_id,
            current_streak = streak.current_streak,
            milestone = milestone.is_some(),
            total_points = points.total_points,
            "Activity completed"
        );

        Ok(ActivityCompletion {
            reward,
            milestone,
            streak: StreakView::of(&streak, today),
            streak_transition: Some(transition),
            total_points: points.total_points,
        })
    }

    /// Apply `reason` to `points` in memory. Returns the transaction row to
    /// write, or `None` if the reward was already granted.
    async fn prepare(
        &self,
        points: &mut UserPoints,
        user_id: &str,
        reason: RewardReason,
        now: DateTime<Utc>,
    ) -> Result<(DispatchOutcome, Option<Write>)> {
        let tx_id = reward_transaction_id(user_id, &reason);
        let existing: Option<RewardTransaction> =
            self.db.get(collections::REWARD_TRANSACTIONS, &tx_id).await?;
        if let Some(transaction) = existing {
            return Ok((
                DispatchOutcome {
                    applied: false,
                    transaction,
                },
                None,
            ));
        }

        let amount = self.points_for(&reason);
        if amount <= 0 {
            return Err(AppError::BadRequest(format!(
                "No points configured for {}",
                reason.key()
            )));
        }

        points.total_points = points.total_points.checked_add(amount).ok_or_else(|| {
            AppError::BadRequest(format!("Points total would overflow for {}", reason.key()))
        })?;
        let now = format_utc_rfc3339(now);
        points.updated_at = now.clone();

        let transaction = RewardTransaction {
            id: tx_id.clone(),
            user_id: user_id.to_string(),
            points: amount,
            reference: reason.key(),
            reason,
            total_after: points.total_points,
            created_at: now,
        };
        let row = Write::set(collections::REWARD_TRANSACTIONS, tx_id, &transaction)?;

        Ok((
            DispatchOutcome {
                applied: true,
                transaction,
            },
            Some(row),
        ))
    }
}
