// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod booking;
pub mod credits;
pub mod exam;
pub mod rewards;
pub mod streak;
pub mod user;

pub use booking::{Attendance, BookingStatus, ClassBooking, ParticipantRole, SlotClaim};
pub use credits::{CreditBalance, CreditKind, CreditTransaction};
pub use exam::{AttemptStatus, Exam, ExamAttempt, ExamQuestion, ExamView};
pub use rewards::{RewardReason, RewardTransaction, UserPoints};
pub use streak::{StreakTransition, UserStreak};
pub use user::{Role, User};
