// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Lingo-Ledger: credits, rewards, streaks, bookings and exams for a
//! language-learning platform.
//!
//! This crate provides the backend API. State lives in a document store
//! (Firestore in production, in memory for development and tests).

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Db;
use services::{BookingService, ExamService, LedgerService, RewardDispatcher, StreakTracker};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub ledger: LedgerService,
    pub rewards: RewardDispatcher,
    pub streaks: StreakTracker,
    pub bookings: BookingService,
    pub exams: ExamService,
}

impl AppState {
    /// Wire up all services over one store.
    pub fn new(config: Config, db: Db) -> Self {
        let ledger = LedgerService::new(db.clone());
        let streaks = StreakTracker::new(db.clone());
        let rewards = RewardDispatcher::new(db.clone(), config.rewards.clone(), streaks.clone());
        let bookings = BookingService::new(db.clone(), ledger.clone(), config.booking_credit_cost);
        let exams = ExamService::new(db.clone(), rewards.clone());

        Self {
            config,
            db,
            ledger,
            rewards,
            streaks,
            bookings,
            exams,
        }
    }
}
