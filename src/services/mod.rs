// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.
//!
//! Services are cheap to clone and share one [`Db`](crate::db::Db). Time is
//! passed in by the caller so behavior at day and deadline boundaries is
//! deterministic under test.

pub mod booking;
pub mod exam;
pub mod ledger;
pub mod rewards;
pub mod streak;

pub use booking::BookingService;
pub use exam::ExamService;
pub use ledger::LedgerService;
pub use rewards::RewardDispatcher;
pub use streak::StreakTracker;
