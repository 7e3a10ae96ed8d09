//! Core types for the earnings ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money)
//! - Time-ordered identifiers (UUIDv7)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Monetary amount (exact decimal, single currency)
pub type Money = Decimal;

/// User identity (account email in the mobile app)
///
/// Partition key for balances, submissions and transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create new user ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Review status shared by submissions and the transactions mirroring them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReviewStatus {
    /// Awaiting first review
    Pending = 1,
    /// Accepted by the first review stage, awaiting payout approval
    Received = 2,
    /// Approved (terminal)
    Approved = 3,
    /// Rejected (terminal)
    Rejected = 4,
}

impl ReviewStatus {
    /// Check if status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewStatus::Approved | ReviewStatus::Rejected)
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "Pending",
            ReviewStatus::Received => "Received",
            ReviewStatus::Approved => "Approved",
            ReviewStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Number of operator review stages a submission passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDepth {
    /// `PENDING -> APPROVED | REJECTED`
    Direct,
    /// `PENDING -> RECEIVED -> APPROVED`, rejection from either stage
    #[default]
    Staged,
}

impl ReviewDepth {
    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Some(ReviewDepth::Direct),
            "staged" => Some(ReviewDepth::Staged),
            _ => None,
        }
    }
}

/// Task definition served by the task catalog (read-only to the ledger)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Task ID
    pub id: String,
    /// Display title
    pub title: String,
    /// Price per unit of work
    pub rate: Money,
    /// Unit label ("ID", "1K", ...)
    pub rate_type: String,
}

impl TaskDefinition {
    /// Create new task definition
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        rate: Money,
        rate_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            rate,
            rate_type: rate_type.into(),
        }
    }
}

/// Claim of completed task work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Submission ID (UUIDv7)
    pub id: Uuid,
    /// Submitting user
    pub user: UserId,
    /// Task this claim is for
    pub task_id: String,
    /// Task title at submission time
    pub task_title: String,
    /// Rate at submission time
    pub rate: Money,
    /// Unit label at submission time
    pub rate_type: String,
    /// Current quantity (operator may override)
    pub quantity: i64,
    /// Current amount (`quantity * rate` after any override)
    pub amount: Money,
    /// Amount credited to `pending` at creation; never changes
    pub reserved: Money,
    /// Free-form proof details
    pub details: String,
    /// Evidence reference (uploaded screenshot, etc.)
    pub evidence: Option<String>,
    /// Review status
    pub status: ReviewStatus,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

/// Journal entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionKind {
    /// Earning accrued from a submission
    Earning = 1,
    /// Payout requested by the user
    Withdrawal = 2,
}

/// Journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction ID (UUIDv7)
    pub id: Uuid,
    /// Owning user
    pub user: UserId,
    /// Display label (task title or "Withdrawal Request")
    pub label: String,
    /// Amount
    pub amount: Money,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Status (mirrors the submission for earnings)
    pub status: ReviewStatus,
    /// Entry kind
    pub kind: TransactionKind,
    /// Originating submission (earnings only)
    pub submission_id: Option<Uuid>,
    /// Payout method (withdrawals only)
    pub payment_method: Option<String>,
    /// Additional details
    pub details: Option<String>,
}

/// User input for a new submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    /// Task ID
    pub task_id: String,
    /// Proof details
    pub details: String,
    /// Evidence reference
    pub evidence: Option<String>,
    /// Claimed amount
    pub amount: Money,
}

/// User input for a withdrawal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// Payout method ID ("bKash", "Nagad", ...)
    pub method: String,
    /// Payout account reference
    pub account_ref: String,
    /// Requested amount
    pub amount: Money,
}

/// Operator decision on a withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawalDecision {
    /// Payout confirmed
    Approve,
    /// Payout refused
    Reject,
}

impl WithdrawalDecision {
    /// Resulting transaction status
    pub fn status(&self) -> ReviewStatus {
        match self {
            WithdrawalDecision::Approve => ReviewStatus::Approved,
            WithdrawalDecision::Reject => ReviewStatus::Rejected,
        }
    }
}

/// Operator dashboard summary of the review queues
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    /// Submissions awaiting first review
    pub pending: usize,
    /// Submissions received, awaiting payout approval
    pub received: usize,
    /// Approved submissions
    pub approved: usize,
    /// Rejected submissions
    pub rejected: usize,
    /// Sum of amounts over received submissions
    pub awaiting_payout: Money,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_status_terminal() {
        assert!(!ReviewStatus::Pending.is_terminal());
        assert!(!ReviewStatus::Received.is_terminal());
        assert!(ReviewStatus::Approved.is_terminal());
        assert!(ReviewStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_review_depth_parse() {
        assert_eq!(ReviewDepth::parse("direct"), Some(ReviewDepth::Direct));
        assert_eq!(ReviewDepth::parse("STAGED"), Some(ReviewDepth::Staged));
        assert_eq!(ReviewDepth::parse("triple"), None);
        assert_eq!(ReviewDepth::default(), ReviewDepth::Staged);
    }

    #[test]
    fn test_withdrawal_decision_status() {
        assert_eq!(WithdrawalDecision::Approve.status(), ReviewStatus::Approved);
        assert_eq!(WithdrawalDecision::Reject.status(), ReviewStatus::Rejected);
    }
}
