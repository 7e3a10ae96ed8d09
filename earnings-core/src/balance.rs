//! Per-user balance record and its mutators
//!
//! # Invariants
//!
//! - `pending` never drops below zero through a release (clamped)
//! - `total` only grows, and only on approval
//! - `available` is NOT floored by `debit_available`; callers that need a
//!   guarantee must check funds first (see `withdrawal`)

use crate::{types::Money, Error, Result};
use serde::{Deserialize, Serialize};

/// Balance of one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Cumulative approved earnings
    pub total: Money,
    /// Spendable funds
    pub available: Money,
    /// Funds reserved against unresolved submissions
    pub pending: Money,
}

fn checked(value: Option<Money>, field: &str) -> Result<Money> {
    value.ok_or_else(|| Error::InvalidAmount(format!("{} balance would overflow", field)))
}

impl Balance {
    /// Zero balance
    pub fn zero() -> Self {
        Self::default()
    }

    /// Reserve a claimed amount against a new submission
    pub fn credit_pending(&mut self, amount: Money) -> Result<()> {
        self.pending = checked(self.pending.checked_add(amount), "pending")?;
        Ok(())
    }

    /// Convert a reservation into spendable earnings.
    ///
    /// `pending_delta` is the amount reserved at submission time and
    /// `credit_amount` the operator-approved amount; the two differ when the
    /// operator repriced the submission. On overflow nothing is changed.
    pub fn settle_approved(&mut self, pending_delta: Money, credit_amount: Money) -> Result<()> {
        let total = checked(self.total.checked_add(credit_amount), "total")?;
        let available = checked(self.available.checked_add(credit_amount), "available")?;

        self.total = total;
        self.available = available;
        self.release_pending(pending_delta);
        Ok(())
    }

    /// Drop a reservation without crediting anything
    pub fn release_pending(&mut self, pending_delta: Money) {
        self.pending = self.pending.saturating_sub(pending_delta).max(Money::ZERO);
    }

    /// Debit spendable funds for a withdrawal request. No floor.
    pub fn debit_available(&mut self, amount: Money) -> Result<()> {
        self.available = checked(self.available.checked_sub(amount), "available")?;
        Ok(())
    }

    /// Return previously debited funds
    pub fn credit_available(&mut self, amount: Money) -> Result<()> {
        self.available = checked(self.available.checked_add(amount), "available")?;
        Ok(())
    }
}
