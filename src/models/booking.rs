// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One-to-one class bookings between a teacher and a student.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Booking lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Cannot move booking from {} to {}", .from.as_str(), .to.as_str())]
pub struct TransitionError {
    pub from: BookingStatus,
    pub to: BookingStatus,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
        )
    }

    /// Validate a transition, returning the new status.
    pub fn transition(self, next: BookingStatus) -> Result<BookingStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

/// Which side of a booking a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantRole {
    Teacher,
    Student,
}

impl ParticipantRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ParticipantRole::Teacher => "teacher",
            ParticipantRole::Student => "student",
        }
    }
}

/// Booking document in `bookings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassBooking {
    pub id: String,
    pub teacher_id: String,
    pub student_id: String,
    pub day: NaiveDate,
    /// `HH:MM-HH:MM`
    pub time_slot: String,
    pub status: BookingStatus,
    /// Credits charged to the student at creation
    #[serde(default)]
    pub credits_spent: i64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub cancelled_by: Option<String>,
    #[serde(default)]
    pub cancel_reason: Option<String>,
}

impl ClassBooking {
    /// Role of `user_id` in this booking, if any.
    pub fn participant_role(&self, user_id: &str) -> Option<ParticipantRole> {
        if self.teacher_id == user_id {
            Some(ParticipantRole::Teacher)
        } else if self.student_id == user_id {
            Some(ParticipantRole::Student)
        } else {
            None
        }
    }
}

/// Attendance record in `booking_attendance`; at most one per (booking, role).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendance {
    pub booking_id: String,
    pub user_id: String,
    pub role: ParticipantRole,
    pub marked_at: String,
}

/// Teacher calendar claim in `booking_slots`; its id is the uniqueness key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotClaim {
    pub booking_id: String,
    pub teacher_id: String,
    pub day: NaiveDate,
    pub time_slot: String,
}

pub fn attendance_id(booking_id: &str, role: ParticipantRole) -> String {
    format!("{}_{}", booking_id, role.as_str())
}

pub fn slot_id(teacher_id: &str, day: NaiveDate, time_slot: &str) -> String {
    format!("{}_{}_{}", teacher_id, day, urlencoding::encode(time_slot))
}

/// Parse `HH:MM-HH:MM`, requiring start before end. Surrounding spaces and
/// unpadded hours are accepted; store [`format_time_slot`] of the result.
pub fn parse_time_slot(raw: &str) -> Option<(NaiveTime, NaiveTime)> {
    let (start, end) = raw.split_once('-')?;
    let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").ok()?;
    let end = NaiveTime::parse_from_str(end.trim(), "%H:%M").ok()?;
    (start < end).then_some((start, end))
}

/// Canonical spelling of a slot, used for claim ids and stored bookings.
pub fn format_time_slot(start: NaiveTime, end: NaiveTime) -> String {
    format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"))
}

/// Slots are half-open, so back-to-back slots do not overlap.
pub fn slots_overlap(a: (NaiveTime, NaiveTime), b: (NaiveTime, NaiveTime)) -> bool {
    a.0 < b.1 && b.0 < a.1
}
