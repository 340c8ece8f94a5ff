//! Consecutive-day activity streaks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Streak state, stored in `user_streaks` keyed by user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStreak {
    pub user_id: String,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    /// Calendar day (UTC) of the most recent recorded activity
    #[serde(default)]
    pub last_activity_date: Option<NaiveDate>,
    /// First day of the current run; distinguishes milestone rewards across runs
    #[serde(default)]
    pub started_on: Option<NaiveDate>,
    #[serde(default)]
    pub updated_at: String,
}

/// What recording an activity did to the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakTransition {
    /// First activity ever
    Started,
    /// Activity exactly one day after the previous one
    Continued,
    /// Gap of more than one day; a fresh run of 1 begins
    Reset,
    /// Already recorded today (or an older day)
    AlreadyRecorded,
}

impl StreakTransition {
    /// True if the streak document changed.
    pub fn changed(self) -> bool {
        !matches!(self, StreakTransition::AlreadyRecorded)
    }
}

impl UserStreak {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            started_on: None,
            updated_at: String::new(),
        }
    }

    /// Record activity on `today`.
    pub fn record(&mut self, today: NaiveDate) -> StreakTransition {
        let transition = match self.last_activity_date {
            None => {
                self.current_streak = 1;
                self.started_on = Some(today);
                StreakTransition::Started
            }
            Some(last) if today <= last => return StreakTransition::AlreadyRecorded,
            Some(last) if (today - last).num_days() == 1 => {
                self.current_streak += 1;
                StreakTransition::Continued
            }
            Some(_) => {
                self.current_streak = 1;
                self.started_on = Some(today);
                StreakTransition::Reset
            }
        };

        self.last_activity_date = Some(today);
        self.longest_streak = self.longest_streak.max(self.current_streak);
        transition
    }

    /// Streak length as seen on `today`: a run whose last activity is more
    /// than one day old is broken and reads as 0.
    pub fn current_as_of(&self, today: NaiveDate) -> u32 {
        match self.last_activity_date {
            Some(last) if (today - last).num_days() <= 1 => self.current_streak,
            _ => 0,
        }
    }
}
