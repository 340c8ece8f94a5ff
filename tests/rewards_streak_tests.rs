// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity completion, points and streak tests.

use axum::http::StatusCode;
use chrono::{Duration, TimeZone, Utc};
use lingo_ledger::config::Config;
use lingo_ledger::models::{RewardReason, Role, StreakTransition};
use serde_json::json;

mod common;
use common::{create_test_app, create_test_app_with, get, post, provision_user};

#[tokio::test]
async fn test_complete_activity_grants_points_and_starts_streak() {
    let (app, state) = create_test_app();
    let (_, token) = provision_user(&state, "ana", &[Role::Student]).await;

    let (status, body) = post(&app, "/api/activities/lesson-1/complete", &token, json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reward"]["applied"], true);
    assert_eq!(body["reward"]["transaction"]["points"], 10);
    assert_eq!(body["reward"]["transaction"]["reference"], "activity-lesson-1");
    assert_eq!(body["streak_transition"], "started");
    assert_eq!(body["streak"]["current_streak"], 1);
    assert_eq!(body["total_points"], 10);

    let (_, points) = get(&app, "/api/points", &token).await;
    assert_eq!(points["total_points"], 10);

    let (_, streak) = get(&app, "/api/streak", &token).await;
    assert_eq!(streak["current_streak"], 1);
    assert_eq!(streak["longest_streak"], 1);
}

#[tokio::test]
async fn test_repeated_completion_is_not_rewarded() {
    let (app, state) = create_test_app();
    let (_, token) = provision_user(&state, "ben", &[Role::Student]).await;

    let (_, first) = post(&app, "/api/activities/quiz-9/complete", &token, json!({})).await;
    let (status, second) = post(&app, "/api/activities/quiz-9/complete", &token, json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["reward"]["applied"], false);
    assert_eq!(second["reward"]["transaction"]["id"], first["reward"]["transaction"]["id"]);
    assert!(second["streak_transition"].is_null());
    assert_eq!(second["total_points"], 10);

    let (_, points) = get(&app, "/api/points", &token).await;
    assert_eq!(points["total_points"], 10);
}

#[tokio::test]
async fn test_second_activity_same_day_keeps_streak() {
    let (app, state) = create_test_app();
    let (_, token) = provision_user(&state, "cy", &[Role::Student]).await;

    post(&app, "/api/activities/a/complete", &token, json!({})).await;
    let (_, body) = post(&app, "/api/activities/b/complete", &token, json!({})).await;

    assert_eq!(body["reward"]["applied"], true);
    assert_eq!(body["streak_transition"], "already_recorded");
    assert_eq!(body["streak"]["current_streak"], 1);
    assert_eq!(body["total_points"], 20);
}

#[tokio::test]
async fn test_milestone_bonus_granted_with_completion() {
    let mut config = Config::test_default();
    config.rewards.streak_milestones = vec![(1, 5)];
    let (app, state) = create_test_app_with(config);
    let (_, token) = provision_user(&state, "dee", &[Role::Student]).await;

    let (_, body) = post(&app, "/api/activities/a/complete", &token, json!({})).await;

    assert_eq!(body["milestone"]["applied"], true);
    assert_eq!(body["milestone"]["transaction"]["points"], 5);
    assert_eq!(body["milestone"]["transaction"]["reason"]["type"], "streak_milestone");
    assert_eq!(body["total_points"], 15);

    // Same day, same streak length: no second bonus.
    let (_, body) = post(&app, "/api/activities/b/complete", &token, json!({})).await;
    assert!(body["milestone"].is_null());
    assert_eq!(body["total_points"], 25);
}

#[tokio::test]
async fn test_streak_over_several_days() {
    let mut config = Config::test_default();
    config.rewards.streak_milestones = vec![(3, 100)];
    let (_, state) = create_test_app_with(config);
    let start = Utc.with_ymd_and_hms(2025, 3, 10, 18, 0, 0).unwrap();

    for day in 0..3 {
        let completion = state
            .rewards
            .complete_activity("user-fay", &format!("day-{}", day), start + Duration::days(day))
            .await
            .unwrap();
        assert_eq!(completion.streak.current_streak, day as u32 + 1);
        assert_eq!(completion.milestone.is_some(), day == 2);
    }

    // Skip a day: the run resets and the milestone can be earned again later.
    let completion = state
        .rewards
        .complete_activity("user-fay", "late", start + Duration::days(4))
        .await
        .unwrap();
    assert_eq!(completion.streak_transition, Some(StreakTransition::Reset));
    assert_eq!(completion.streak.current_streak, 1);
    assert_eq!(completion.streak.longest_streak, 3);
    assert_eq!(completion.total_points, 4 * 10 + 100);
}

#[tokio::test]
async fn test_streak_view_reports_broken_streak() {
    let (_, state) = create_test_app();
    let start = Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap();
    state
        .rewards
        .complete_activity("user-gus", "a", start)
        .await
        .unwrap();

    let today = (start + Duration::days(1)).date_naive();
    assert_eq!(state.streaks.view("user-gus", today).await.unwrap().current_streak, 1);

    let later = (start + Duration::days(5)).date_naive();
    let view = state.streaks.view("user-gus", later).await.unwrap();
    assert_eq!(view.current_streak, 0);
    assert_eq!(view.longest_streak, 1);
}

#[tokio::test]
async fn test_exam_reward_dispatched_once() {
    let (_, state) = create_test_app();
    let now = Utc::now();
    let reason = RewardReason::ExamPassed {
        exam_id: "exam-1".to_string(),
    };

    let first = state
        .rewards
        .dispatch("user-hal", reason.clone(), now)
        .await
        .unwrap();
    let second = state.rewards.dispatch("user-hal", reason, now).await.unwrap();

    assert!(first.applied);
    assert!(!second.applied);
    assert_eq!(first.transaction.points, 50);
    assert_eq!(state.rewards.points("user-hal").await.unwrap().total_points, 50);
}
