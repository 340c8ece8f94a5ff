//! Streak tracker: one streak document per user, updated once per day.
//!
//! Writes happen only through activity completion, which records the day
//! together with the points it grants.

use crate::db::{collections, Db};
use crate::error::Result;
use crate::models::UserStreak;
use chrono::NaiveDate;
use serde::Serialize;

/// Streak as presented to the user on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakView {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub started_on: Option<NaiveDate>,
}

impl StreakView {
    pub fn of(streak: &UserStreak, today: NaiveDate) -> Self {
        let current_streak = streak.current_as_of(today);
        Self {
            current_streak,
            longest_streak: streak.longest_streak,
            last_activity_date: streak.last_activity_date,
            // A broken run has no start
            started_on: streak.started_on.filter(|_| current_streak > 0),
        }
    }
}

#[derive(Clone)]
pub struct StreakTracker {
    db: Db,
}

impl StreakTracker {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub(crate) async fn load(&self, user_id: &str) -> Result<UserStreak> {
        Ok(self
            .db
            .get(collections::USER_STREAKS, user_id)
            .await?
            .unwrap_or_else(|| UserStreak::new(user_id)))
    }

    pub async fn view(&self, user_id: &str, today: NaiveDate) -> Result<StreakView> {
        Ok(StreakView::of(&self.load(user_id).await?, today))
    }
}
