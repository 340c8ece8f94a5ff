// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credit ledger.
//!
//! Every mutation is keyed by a caller-supplied reference. The transaction
//! row id is derived from it, so a replayed request finds the existing row
//! and returns it with `applied: false` instead of moving credits twice.

use crate::db::{collections, Db, Write};
use crate::error::{AppError, Result};
use crate::models::credits::transaction_id;
use crate::models::{CreditBalance, CreditKind, CreditTransaction};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const MAX_HISTORY_LIMIT: u32 = 100;

/// Result of a ledger mutation.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerOutcome {
    /// False when the reference had already been applied
    pub applied: bool,
    pub transaction: CreditTransaction,
    pub available_credits: i64,
}

#[derive(Clone)]
pub struct LedgerService {
    db: Db,
}

impl LedgerService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Current balance; zero for users with no history.
    pub async fn balance(&self, user_id: &str) -> Result<CreditBalance> {
        Ok(self
            .db
            .get(collections::CREDIT_BALANCES, user_id)
            .await?
            .unwrap_or_else(|| CreditBalance::empty(user_id)))
    }

    /// Record a captured payment.
    pub async fn purchase(
        &self,
        user_id: &str,
        amount: i64,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerOutcome> {
        self.apply(
            user_id,
            CreditKind::Purchase,
            amount,
            "Credit purchase",
            reference,
            now,
            Vec::new(),
        )
        .await
    }

    pub async fn grant(
        &self,
        user_id: &str,
        amount: i64,
        reason: &str,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerOutcome> {
        self.apply(user_id, CreditKind::Grant, amount, reason, reference, now, Vec::new())
            .await
    }

    /// Spend credits; fails with `InsufficientCredits` without writing anything.
    pub async fn spend(
        &self,
        user_id: &str,
        amount: i64,
        reason: &str,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerOutcome> {
        self.apply(user_id, CreditKind::Spend, amount, reason, reference, now, Vec::new())
            .await
    }

    pub async fn refund(
        &self,
        user_id: &str,
        amount: i64,
        reason: &str,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerOutcome> {
        self.apply(user_id, CreditKind::Refund, amount, reason, reference, now, Vec::new())
            .await
    }

    /// Most recent transactions first. `limit` is clamped to 1..=100.
    pub async fn history(&self, user_id: &str, limit: u32) -> Result<Vec<CreditTransaction>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT) as usize;

        let mut transactions: Vec<CreditTransaction> = self
            .db
            .query_eq(collections::CREDIT_TRANSACTIONS, &[("user_id", user_id)])
            .await?;

        transactions.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        transactions.truncate(limit);
        Ok(transactions)
    }

    /// Apply one mutation, committing `extra` writes in the same transaction.
    ///
    /// `extra` is dropped when the reference was already applied.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn apply(
        &self,
        user_id: &str,
        kind: CreditKind,
        amount: i64,
        reason: &str,
        reference: &str,
        now: DateTime<Utc>,
        extra: Vec<Write>,
    ) -> Result<LedgerOutcome> {
        if reference.trim().is_empty() {
            return Err(AppError::BadRequest("reference must not be empty".to_string()));
        }

        let _guard = self.db.lock(collections::CREDIT_BALANCES, user_id).await;

        let tx_id = transaction_id(user_id, reference);
        let existing: Option<CreditTransaction> =
            self.db.get(collections::CREDIT_TRANSACTIONS, &tx_id).await?;
        if let Some(transaction) = existing {
            if transaction.kind != kind {
                return Err(AppError::BadRequest(format!(
                    "Reference {} already used for a {:?} transaction",
                    reference, transaction.kind
                )));
            }
            tracing::debug!(user_id, reference, "Ledger reference already applied");
            let balance = self.balance(user_id).await?;
            return Ok(LedgerOutcome {
                applied: false,
                transaction,
                available_credits: balance.available(),
            });
        }

        let now = format_utc_rfc3339(now);
        let mut balance = self.balance(user_id).await?;
        let delta = balance.apply(kind, amount, &now)?;

        let transaction = CreditTransaction {
            id: tx_id.clone(),
            user_id: user_id.to_string(),
            kind,
            amount: delta,
            reason: reason.to_string(),
            reference: reference.to_string(),
            balance_after: balance.available(),
            created_at: now,
        };

        let mut writes = vec![
            Write::set(collections::CREDIT_BALANCES, user_id, &balance)?,
            Write::set(collections::CREDIT_TRANSACTIONS, tx_id, &transaction)?,
        ];
        writes.extend(extra);
        self.db.commit(writes).await?;

        tracing::info!(
            user_id,
            kind = ?kind,
            amount = delta,
            available = balance.available(),
            reference,
            "Credit transaction applied"
        );

        Ok(LedgerOutcome {
            applied: true,
            transaction,
            available_credits: balance.available(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 12, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_purchase_then_spend() {
        let ledger = LedgerService::new(Db::in_memory());

        ledger.purchase("u1", 100, "pay-1", at(0)).await.unwrap();
        ledger.spend("u1", 20, "lesson", "spend-1", at(1)).await.unwrap();
        let outcome = ledger.spend("u1", 30, "lesson", "spend-2", at(2)).await.unwrap();

        assert!(outcome.applied);
        assert_eq!(outcome.available_credits, 50);
        assert_eq!(outcome.transaction.amount, -30);

        let balance = ledger.balance("u1").await.unwrap();
        assert_eq!(balance.total_credits, 100);
        assert_eq!(balance.spent_credits, 50);
    }

    #[tokio::test]
    async fn test_insufficient_spend_writes_nothing() {
        let ledger = LedgerService::new(Db::in_memory());
        ledger.grant("u1", 2, "welcome", "grant-1", at(0)).await.unwrap();

        let err = ledger.spend("u1", 3, "lesson", "spend-1", at(1)).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientCredits {
                available: 2,
                required: 3
            }
        ));

        assert_eq!(ledger.history("u1", 10).await.unwrap().len(), 1);
        assert_eq!(ledger.balance("u1").await.unwrap().available(), 2);
    }

    #[tokio::test]
    async fn test_replayed_reference_applies_once() {
        let ledger = LedgerService::new(Db::in_memory());

        let first = ledger.purchase("u1", 10, "pay-1", at(0)).await.unwrap();
        let again = ledger.purchase("u1", 10, "pay-1", at(5)).await.unwrap();

        assert!(first.applied);
        assert!(!again.applied);
        assert_eq!(again.transaction, first.transaction);
        assert_eq!(ledger.balance("u1").await.unwrap().available(), 10);
    }

    #[tokio::test]
    async fn test_overflowing_purchase_rejected() {
        let ledger = LedgerService::new(Db::in_memory());
        ledger.purchase("u1", i64::MAX, "p1", at(0)).await.unwrap();

        let err = ledger.purchase("u1", 1, "p2", at(1)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let balance = ledger.balance("u1").await.unwrap();
        assert_eq!(balance.total_credits, i64::MAX);
        assert_eq!(ledger.history("u1", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reference_reuse_across_kinds_rejected() {
        let ledger = LedgerService::new(Db::in_memory());
        ledger.purchase("u1", 10, "ref", at(0)).await.unwrap();

        let err = ledger.spend("u1", 1, "x", "ref", at(1)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_history_newest_first_and_clamped() {
        let ledger = LedgerService::new(Db::in_memory());
        for i in 0..5 {
            ledger
                .grant("u1", 1, "bonus", &format!("g-{}", i), at(i))
                .await
                .unwrap();
        }

        let history = ledger.history("u1", 3).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].reference, "g-4");
        assert_eq!(history[0].balance_after, 5);

        assert_eq!(ledger.history("u1", 0).await.unwrap().len(), 1);
        assert!(ledger.history("u2", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sum_of_amounts_matches_available() {
        let ledger = LedgerService::new(Db::in_memory());
        ledger.purchase("u1", 40, "p", at(0)).await.unwrap();
        ledger.spend("u1", 15, "s", "s1", at(1)).await.unwrap();
        ledger.refund("u1", 5, "r", "r1", at(2)).await.unwrap();
        let _ = ledger.spend("u1", 100, "s", "s2", at(3)).await;

        let sum: i64 = ledger
            .history("u1", 100)
            .await
            .unwrap()
            .iter()
            .map(|t| t.amount)
            .sum();
        assert_eq!(sum, ledger.balance("u1").await.unwrap().available());
        assert_eq!(sum, 30);
    }
}
