//! Gamification points and their transaction log.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Points total, stored in `user_points` keyed by user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPoints {
    pub user_id: String,
    #[serde(default)]
    pub total_points: i64,
    #[serde(default)]
    pub updated_at: String,
}

impl UserPoints {
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_points: 0,
            updated_at: String::new(),
        }
    }
}

/// Completion event that earns points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardReason {
    ActivityCompleted { activity_id: String },
    StreakMilestone { days: u32, started_on: NaiveDate },
    ExamPassed { exam_id: String },
}

impl RewardReason {
    /// Idempotency key: one grant per key per user.
    pub fn key(&self) -> String {
        match self {
            RewardReason::ActivityCompleted { activity_id } => format!("activity-{}", activity_id),
            RewardReason::StreakMilestone { days, started_on } => {
                format!("streak-{}-{}", days, started_on)
            }
            RewardReason::ExamPassed { exam_id } => format!("exam-{}", exam_id),
        }
    }
}

/// Immutable row in `reward_transactions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTransaction {
    pub id: String,
    pub user_id: String,
    pub points: i64,
    pub reason: RewardReason,
    /// Idempotency key, see [`RewardReason::key`]
    pub reference: String,
    /// Points total after this grant
    pub total_after: i64,
    pub created_at: String,
}

/// Document id of the grant for `reason`.
pub fn reward_transaction_id(user_id: &str, reason: &RewardReason) -> String {
    format!("{}_{}", user_id, urlencoding::encode(&reason.key()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_distinguish_streak_runs() {
        let a = RewardReason::StreakMilestone {
            days: 7,
            started_on: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        };
        let b = RewardReason::StreakMilestone {
            days: 7,
            started_on: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
        };
        assert_eq!(a.key(), "streak-7-2025-01-01");
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_reason_serializes_tagged() {
        let reason = RewardReason::ActivityCompleted {
            activity_id: "lesson-3".to_string(),
        };
        let value = serde_json::to_value(&reason).unwrap();
        assert_eq!(value["type"], "activity_completed");
        assert_eq!(value["activity_id"], "lesson-3");
        assert_eq!(reward_transaction_id("u1", &reason), "u1_activity-lesson-3");
    }
}
