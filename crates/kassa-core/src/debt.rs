//! # Debt Rules
//!
//! Settlement math for credit sales and the de-duplication state used by
//! the overdue watcher.
//!
//! ## Lifecycle
//! ```text
//!            checkout (debt)
//!                  │
//!                  ▼
//!        ┌──────────────────┐   payment < remaining   ┌──────────────────┐
//!        │  open            │ ───────────────────────►│  open            │
//!        │  remaining = A   │                         │  remaining = A-p │
//!        └────────┬─────────┘                         └────────┬─────────┘
//!                 │ payment == remaining / mark paid           │
//!                 ▼                                            ▼
//!        ┌──────────────────┐                         ┌──────────────────┐
//!        │ settled (paid)   │                         │ settled          │
//!        │ sale → completed │                         │ (written_off)    │◄── sale cancelled
//!        └──────────────────┘                         └──────────────────┘
//! ```
//!
//! A payment larger than what is still owed is rejected rather than
//! silently absorbed; see [`apply_payment`].

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Debt, DebtOverview};

// =============================================================================
// Balance
// =============================================================================

/// Outstanding balance: `max(0, amount - paid)`.
#[inline]
pub fn remaining(amount: Money, paid: Money) -> Money {
    amount.saturating_sub(paid)
}

/// A debt is overdue when it is still open and its due date has passed.
#[inline]
pub fn is_overdue(settled: bool, due_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    !settled && due_at < now
}

// =============================================================================
// Payment Application
// =============================================================================

/// Result of applying one installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentOutcome {
    /// The accepted installment.
    pub amount: Money,
    /// Sum of all payments including this one.
    pub total_paid: Money,
    /// What is still owed afterwards.
    pub remaining: Money,
    /// Whether the debt is now fully paid.
    pub settles: bool,
}

/// Checks an installment against a debt and computes the new balance.
///
/// ## Rules
/// - `amount` must be positive (`InvalidAmount`)
/// - settled debts take no payments (`DebtAlreadySettled`)
/// - `amount` may not exceed the remainder (`PaymentExceedsBalance`)
///
/// ```rust
/// # use chrono::Utc;
/// # use kassa_core::{Debt, Money};
/// # use kassa_core::debt::apply_payment;
/// # let now = Utc::now();
/// # let debt = Debt {
/// #     id: "d1".into(), tenant_id: "t".into(), sale_id: "s1".into(),
/// #     customer_id: "c1".into(), amount_cents: 5000, due_at: now,
/// #     settled: false, settlement: None, created_at: now, updated_at: now,
/// #     settled_at: None,
/// # };
/// let first = apply_payment(&debt, Money::zero(), Money::from_cents(2000)).unwrap();
/// assert_eq!(first.remaining.cents(), 3000);
/// assert!(!first.settles);
///
/// let second = apply_payment(&debt, first.total_paid, Money::from_cents(3000)).unwrap();
/// assert!(second.settles);
/// ```
pub fn apply_payment(debt: &Debt, already_paid: Money, amount: Money) -> CoreResult<PaymentOutcome> {
    if !amount.is_positive() {
        return Err(CoreError::invalid_amount("payment must be greater than zero"));
    }
    if debt.settled {
        return Err(CoreError::DebtAlreadySettled(debt.id.clone()));
    }

    let outstanding = remaining(debt.amount(), already_paid);
    if amount > outstanding {
        return Err(CoreError::PaymentExceedsBalance {
            debt_id: debt.id.clone(),
            remaining_cents: outstanding.cents(),
            requested_cents: amount.cents(),
        });
    }

    let total_paid = already_paid + amount;
    let left = remaining(debt.amount(), total_paid);
    Ok(PaymentOutcome {
        amount,
        total_paid,
        remaining: left,
        settles: left.is_zero(),
    })
}

/// The payment that closes a debt when it is explicitly marked as paid.
///
/// Returns `None` when nothing is left to record (the payments already
/// cover the amount and only the settled flag is missing).
pub fn closing_payment(debt: &Debt, already_paid: Money) -> CoreResult<Option<Money>> {
    if debt.settled {
        return Err(CoreError::DebtAlreadySettled(debt.id.clone()));
    }

    let outstanding = remaining(debt.amount(), already_paid);
    Ok(outstanding.is_positive().then_some(outstanding))
}

// =============================================================================
// Overdue Tracking
// =============================================================================

/// Remembers which debts have already been reported as overdue.
///
/// ```text
/// poll 1: overdue {A}      → notify A          seen {A}
/// poll 2: overdue {A, B}   → notify B          seen {A, B}
/// poll 3: overdue {B}      → (A paid)          seen {B}
/// poll 4: overdue {A, B}   → notify A again    seen {A, B}
/// ```
///
/// Ids that drop out of the overdue set are forgotten, so the set never
/// grows past the number of currently overdue debts.
#[derive(Debug, Default)]
pub struct OverdueTracker {
    seen: HashSet<String>,
}

impl OverdueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the current overdue set and returns the entries not reported
    /// on a previous call.
    pub fn newly_overdue<'a>(&mut self, current: &'a [DebtOverview]) -> Vec<&'a DebtOverview> {
        let current_ids: HashSet<&str> = current.iter().map(|d| d.id.as_str()).collect();
        self.seen.retain(|id| current_ids.contains(id.as_str()));

        current
            .iter()
            .filter(|debt| self.seen.insert(debt.id.clone()))
            .collect()
    }

    /// Number of debts currently remembered as overdue.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
