// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Concurrent requests against the same user, booking or slot.
//!
//! Each test fires the same operation from many tasks at once and checks
//! that it took effect exactly once (or never overdrew).

use chrono::{Duration, Utc};
use futures_util::future::join_all;
use lingo_ledger::error::AppError;
use lingo_ledger::models::Role;

mod common;
use common::{create_test_app, provision_user};

const TASKS: usize = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_completions_rewarded_once() {
    let (_, state) = create_test_app();
    let now = Utc::now();

    let results = join_all((0..TASKS).map(|_| {
        let state = state.clone();
        tokio::spawn(async move {
            state
                .rewards
                .complete_activity("user-ana", "lesson-1", now)
                .await
        })
    }))
    .await;

    let applied = results
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .filter(|c| c.reward.applied)
        .count();
    assert_eq!(applied, 1);
    assert_eq!(state.rewards.points("user-ana").await.unwrap().total_points, 10);
    assert_eq!(
        state
            .streaks
            .view("user-ana", now.date_naive())
            .await
            .unwrap()
            .current_streak,
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_spends_never_overdraw() {
    let (_, state) = create_test_app();
    let now = Utc::now();
    state
        .ledger
        .purchase("user-ben", 5, "pay-1", now)
        .await
        .unwrap();

    let results = join_all((0..TASKS).map(|i| {
        let state = state.clone();
        tokio::spawn(async move {
            state
                .ledger
                .spend("user-ben", 1, "Lesson", &format!("spend-{}", i), now)
                .await
        })
    }))
    .await;

    let mut succeeded = 0;
    for result in results {
        match result.unwrap() {
            Ok(outcome) => {
                assert!(outcome.applied);
                succeeded += 1;
            }
            Err(e) => assert!(matches!(e, AppError::InsufficientCredits { .. })),
        }
    }
    assert_eq!(succeeded, 5);

    let balance = state.ledger.balance("user-ben").await.unwrap();
    assert_eq!(balance.available(), 0);
    assert_eq!(balance.spent_credits, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_replayed_purchase_applied_once_under_contention() {
    let (_, state) = create_test_app();
    let now = Utc::now();

    let results = join_all((0..TASKS).map(|_| {
        let state = state.clone();
        tokio::spawn(async move { state.ledger.purchase("user-cy", 20, "capture-1", now).await })
    }))
    .await;

    let applied = results
        .into_iter()
        .filter(|r| r.as_ref().unwrap().as_ref().unwrap().applied)
        .count();
    assert_eq!(applied, 1);
    assert_eq!(state.ledger.balance("user-cy").await.unwrap().total_credits, 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_booking_per_slot() {
    let (_, state) = create_test_app();
    let now = Utc::now();
    let day = (now + Duration::days(2)).date_naive().to_string();
    provision_user(&state, "tess", &[Role::Teacher]).await;
    for i in 0..TASKS {
        state
            .ledger
            .purchase(&format!("student-{}", i), 1, "pay", now)
            .await
            .unwrap();
    }

    let results = join_all((0..TASKS).map(|i| {
        let state = state.clone();
        let day = day.clone();
        tokio::spawn(async move {
            state
                .bookings
                .create(&format!("student-{}", i), "user-tess", &day, "15:00-16:00", now)
                .await
        })
    }))
    .await;

    let booked: Vec<_> = results
        .into_iter()
        .filter_map(|r| r.unwrap().ok())
        .collect();
    assert_eq!(booked.len(), 1);

    // Only the winner was charged.
    let mut charged = 0;
    for i in 0..TASKS {
        let balance = state.ledger.balance(&format!("student-{}", i)).await.unwrap();
        charged += balance.spent_credits;
    }
    assert_eq!(charged, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_attendance_recorded_once() {
    let (_, state) = create_test_app();
    let now = Utc::now();
    let day = (now + Duration::days(1)).date_naive().to_string();
    provision_user(&state, "tess", &[Role::Teacher]).await;
    state.ledger.purchase("user-sam", 1, "pay", now).await.unwrap();
    let booking = state
        .bookings
        .create("user-sam", "user-tess", &day, "09:00-10:00", now)
        .await
        .unwrap();
    state
        .bookings
        .confirm(&booking.id, "user-tess", now)
        .await
        .unwrap();

    let results = join_all((0..TASKS).map(|_| {
        let state = state.clone();
        let id = booking.id.clone();
        tokio::spawn(async move { state.bookings.mark_attendance(&id, "user-sam", now).await })
    }))
    .await;

    let recorded = results
        .into_iter()
        .filter(|r| r.as_ref().unwrap().as_ref().unwrap().recorded)
        .count();
    assert_eq!(recorded, 1);
}
