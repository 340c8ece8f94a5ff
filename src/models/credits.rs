// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credit balances and the append-only credit transaction log.
//!
//! A balance stores only `total_credits` and `spent_credits`. The available
//! amount is always derived, so the two stored counters cannot drift apart
//! from it. Every applied mutation is written together with exactly one
//! [`CreditTransaction`].

use serde::{Deserialize, Serialize};

/// Largest amount a single request may move.
pub const MAX_CREDIT_AMOUNT: i64 = 1_000_000;

/// Kind of credit movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditKind {
    /// Credits bought through a captured payment
    Purchase,
    /// Credits granted by an administrator
    Grant,
    /// Credits consumed (e.g. booking a class)
    Spend,
    /// A previous spend given back
    Refund,
}

/// Errors from applying a ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    #[error("Insufficient credits: {available} available, {required} required")]
    Insufficient { available: i64, required: i64 },

    #[error("Refund of {amount} exceeds spent credits {spent}")]
    RefundExceedsSpent { amount: i64, spent: i64 },

    #[error("Amount {0} would overflow the balance")]
    Overflow(i64),
}

/// Per-user credit balance, stored in `credit_balances` keyed by user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalance {
    pub user_id: String,
    #[serde(default)]
    pub total_credits: i64,
    #[serde(default)]
    pub spent_credits: i64,
    #[serde(default)]
    pub updated_at: String,
}

impl CreditBalance {
    /// Balance for a user with no history yet.
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_credits: 0,
            spent_credits: 0,
            updated_at: String::new(),
        }
    }

    pub fn available(&self) -> i64 {
        self.total_credits - self.spent_credits
    }

    /// Apply a mutation in memory.
    ///
    /// Returns the signed delta to record on the transaction row. The
    /// balance is left untouched on error.
    pub fn apply(&mut self, kind: CreditKind, amount: i64, now: &str) -> Result<i64, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::NonPositiveAmount(amount));
        }

        let delta = match kind {
            CreditKind::Purchase | CreditKind::Grant => {
                self.total_credits = self
                    .total_credits
                    .checked_add(amount)
                    .ok_or(LedgerError::Overflow(amount))?;
                amount
            }
            CreditKind::Spend => {
                let available = self.available();
                if amount > available {
                    return Err(LedgerError::Insufficient {
                        available,
                        required: amount,
                    });
                }
                self.spent_credits = self
                    .spent_credits
                    .checked_add(amount)
                    .ok_or(LedgerError::Overflow(amount))?;
                -amount
            }
            CreditKind::Refund => {
                if amount > self.spent_credits {
                    return Err(LedgerError::RefundExceedsSpent {
                        amount,
                        spent: self.spent_credits,
                    });
                }
                self.spent_credits -= amount;
                amount
            }
        };

        self.updated_at = now.to_string();
        Ok(delta)
    }
}

/// Immutable row in `credit_transactions`.
///
/// The document id is derived from the user id and the caller-supplied
/// reference, so replaying the same reference finds the existing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: String,
    pub user_id: String,
    pub kind: CreditKind,
    /// Signed change to the available balance
    pub amount: i64,
    pub reason: String,
    /// Idempotency reference (payment capture id, booking id, ...)
    pub reference: String,
    /// Available credits after this transaction
    pub balance_after: i64,
    pub created_at: String,
}

/// Document id for the transaction identified by `reference`.
pub fn transaction_id(user_id: &str, reference: &str) -> String {
    format!("{}_{}", user_id, urlencoding::encode(reference))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(total: i64, spent: i64) -> CreditBalance {
        CreditBalance {
            user_id: "u1".to_string(),
            total_credits: total,
            spent_credits: spent,
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_spend_reduces_available() {
        let mut b = balance(100, 20);
        assert_eq!(b.available(), 80);

        let delta = b.apply(CreditKind::Spend, 30, "now").unwrap();

        assert_eq!(delta, -30);
        assert_eq!(b.available(), 50);
        assert_eq!(b.total_credits - b.spent_credits, b.available());
    }

    #[test]
    fn test_spend_more_than_available_is_rejected() {
        let mut b = balance(10, 8);
        let err = b.apply(CreditKind::Spend, 3, "now").unwrap_err();

        assert_eq!(
            err,
            LedgerError::Insufficient {
                available: 2,
                required: 3
            }
        );
        assert_eq!(b, balance(10, 8));
    }

    #[test]
    fn test_refund_cannot_exceed_spent() {
        let mut b = balance(10, 2);
        assert!(matches!(
            b.apply(CreditKind::Refund, 3, "now"),
            Err(LedgerError::RefundExceedsSpent { .. })
        ));
        assert_eq!(b.apply(CreditKind::Refund, 2, "now").unwrap(), 2);
        assert_eq!(b.available(), 10);
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let mut b = balance(10, 0);
        for kind in [
            CreditKind::Purchase,
            CreditKind::Grant,
            CreditKind::Spend,
            CreditKind::Refund,
        ] {
            assert_eq!(
                b.apply(kind, 0, "now"),
                Err(LedgerError::NonPositiveAmount(0))
            );
        }
    }

    #[test]
    fn test_invariant_holds_over_mixed_sequence() {
        let mut b = CreditBalance::empty("u1");
        let ops = [
            (CreditKind::Purchase, 50),
            (CreditKind::Spend, 20),
            (CreditKind::Grant, 5),
            (CreditKind::Spend, 35),
            (CreditKind::Spend, 1),
            (CreditKind::Refund, 10),
        ];
        let mut running = 0;
        for (kind, amount) in ops {
            if let Ok(delta) = b.apply(kind, amount, "now") {
                running += delta;
            }
            assert_eq!(b.available(), b.total_credits - b.spent_credits);
            assert!(b.available() >= 0);
        }
        assert_eq!(running, b.available());
        assert_eq!(b.available(), 10);
    }

    #[test]
    fn test_overflowing_purchase_rejected() {
        let mut b = balance(i64::MAX, 0);

        for kind in [CreditKind::Purchase, CreditKind::Grant] {
            assert_eq!(b.apply(kind, 1, "now"), Err(LedgerError::Overflow(1)));
        }
        assert_eq!(b, balance(i64::MAX, 0));
        assert!(b.available() >= 0);
    }

    #[test]
    fn test_transaction_id_encodes_reference() {
        assert_eq!(transaction_id("u1", "booking-42"), "u1_booking-42");
        assert_eq!(transaction_id("u1", "a/b c"), "u1_a%2Fb%20c");
    }
}
