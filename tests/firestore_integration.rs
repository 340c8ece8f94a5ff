// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running and
//! FIRESTORE_EMULATOR_HOST to point at it.

use chrono::Utc;
use lingo_ledger::config::Config;
use lingo_ledger::db::{collections, Write};
use lingo_ledger::models::{CreditBalance, Role, User};
use lingo_ledger::AppState;

mod common;
use common::test_db;

/// Unique suffix for test isolation.
fn unique_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", prefix, nanos)
}

fn test_user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: format!("{}@example.com", id),
        display_name: "Test".to_string(),
        roles: vec![Role::Student],
        created_at: "2025-01-01T00:00:00.000Z".to_string(),
    }
}

#[tokio::test]
async fn test_user_roundtrip_and_email_lookup() {
    require_emulator!();

    let db = test_db().await;
    let id = unique_id("user");

    assert!(db.get_user(&id).await.unwrap().is_none());

    let user = test_user(&id);
    db.upsert_user(&user).await.unwrap();

    assert_eq!(db.get_user(&id).await.unwrap(), Some(user.clone()));
    let found = db.find_user_by_email(&user.email).await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(id));
}

#[tokio::test]
async fn test_create_is_exclusive() {
    require_emulator!();

    let db = test_db().await;
    let id = unique_id("slot");
    let user = test_user(&id);

    assert!(db.create(collections::BOOKING_SLOTS, &id, &user).await.unwrap());
    assert!(!db.create(collections::BOOKING_SLOTS, &id, &user).await.unwrap());

    db.delete(collections::BOOKING_SLOTS, &id).await.unwrap();
    assert!(db.create(collections::BOOKING_SLOTS, &id, &user).await.unwrap());
}

#[tokio::test]
async fn test_commit_applies_all_writes() {
    require_emulator!();

    let db = test_db().await;
    let a = unique_id("a");
    let b = unique_id("b");
    db.upsert_user(&test_user(&b)).await.unwrap();

    db.commit(vec![
        Write::set(collections::USERS, a.clone(), &test_user(&a)).unwrap(),
        Write::delete(collections::USERS, b.clone()),
    ])
    .await
    .unwrap();

    assert!(db.get_user(&a).await.unwrap().is_some());
    assert!(db.get_user(&b).await.unwrap().is_none());
}

#[tokio::test]
async fn test_ledger_against_firestore() {
    require_emulator!();

    let state = AppState::new(Config::test_default(), test_db().await);
    let user = unique_id("buyer");
    let now = Utc::now();

    let first = state.ledger.purchase(&user, 10, "cap-1", now).await.unwrap();
    let replay = state.ledger.purchase(&user, 10, "cap-1", now).await.unwrap();
    state
        .ledger
        .spend(&user, 4, "Lesson", "spend-1", now)
        .await
        .unwrap();

    assert!(first.applied);
    assert!(!replay.applied);
    let balance: CreditBalance = state
        .db
        .get(collections::CREDIT_BALANCES, &user)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.available(), 6);
    assert_eq!(state.ledger.history(&user, 10).await.unwrap().len(), 2);
}
