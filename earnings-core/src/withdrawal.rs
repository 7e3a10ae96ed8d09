//! Withdrawal request and resolution rules
//!
//! A request debits `available` immediately. Resolution only changes the
//! journal entry unless [`RefundPolicy::RefundOnReject`] is selected, in
//! which case a rejected payout returns its amount to `available`.

use crate::{
    balance::Balance,
    config::WithdrawalConfig,
    types::{Money, Transaction, UserId, WithdrawalDecision, WithdrawalRequest},
    Error, Result,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fate of debited funds when a withdrawal is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundPolicy {
    /// Keep the debit; rejection only updates the journal
    #[default]
    Retain,
    /// Credit the amount back to `available` on rejection
    RefundOnReject,
}

impl RefundPolicy {
    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "retain" => Some(RefundPolicy::Retain),
            "refund_on_reject" | "refund-on-reject" => Some(RefundPolicy::RefundOnReject),
            _ => None,
        }
    }
}

/// Check a request against the configured rules and the current balance
pub fn validate_request(
    config: &WithdrawalConfig,
    balance: &Balance,
    request: &WithdrawalRequest,
) -> Result<()> {
    if request.amount <= Money::ZERO || request.amount < config.min_withdrawal {
        return Err(Error::BelowMinimum {
            requested: request.amount,
            minimum: config.min_withdrawal,
        });
    }

    if !config.methods.iter().any(|m| m == &request.method) {
        return Err(Error::UnknownMethod(request.method.clone()));
    }

    if request.account_ref.trim().chars().count() <= config.min_account_ref_len {
        return Err(Error::InvalidAccountRef(format!(
            "must be longer than {} characters",
            config.min_account_ref_len
        )));
    }

    if config.enforce_available_funds && request.amount > balance.available {
        return Err(Error::InsufficientFunds {
            requested: request.amount,
            available: balance.available,
        });
    }

    Ok(())
}

/// Validate, debit and journal a withdrawal request
pub fn request(
    config: &WithdrawalConfig,
    user: UserId,
    balance: &mut Balance,
    request: &WithdrawalRequest,
    now: DateTime<Utc>,
) -> Result<Transaction> {
    validate_request(config, balance, request)?;

    balance.debit_available(request.amount)?;
    Ok(Transaction::withdrawal(user, request, now))
}

/// Resolve a pending withdrawal.
///
/// Returns the amount credited back to `available` (zero unless refunded).
/// On error neither the entry nor the balance is changed.
pub fn resolve(
    policy: RefundPolicy,
    transaction: &mut Transaction,
    balance: &mut Balance,
    decision: WithdrawalDecision,
) -> Result<Money> {
    let mut resolved = transaction.clone();
    resolved.resolve(decision.status())?;

    let refunded = match (decision, policy) {
        (WithdrawalDecision::Reject, RefundPolicy::RefundOnReject) => resolved.amount,
        _ => Money::ZERO,
    };

    let mut updated = *balance;
    if !refunded.is_zero() {
        updated.credit_available(refunded)?;
    }

    *transaction = resolved;
    *balance = updated;
    Ok(refunded)
}
