//! Transaction journal entries
//!
//! The journal is a display and audit view. Balances are never recomputed
//! from it: the workflow mutates them directly, so a replay would count
//! every earning twice.

use crate::{
    types::{
        ReviewStatus, Submission, Transaction, TransactionKind, UserId, WithdrawalRequest,
    },
    Error, Result,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Label used for withdrawal entries
pub const WITHDRAWAL_LABEL: &str = "Withdrawal Request";

impl Transaction {
    /// EARNING entry mirroring a freshly created submission
    pub fn earning(submission: &Submission) -> Self {
        Self {
            id: Uuid::now_v7(),
            user: submission.user.clone(),
            label: submission.task_title.clone(),
            amount: submission.amount,
            created_at: submission.created_at,
            status: submission.status,
            kind: TransactionKind::Earning,
            submission_id: Some(submission.id),
            payment_method: None,
            details: Some(submission.details.clone()),
        }
    }

    /// PENDING WITHDRAWAL entry
    pub fn withdrawal(user: UserId, request: &WithdrawalRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user,
            label: WITHDRAWAL_LABEL.to_string(),
            amount: request.amount,
            created_at: now,
            status: ReviewStatus::Pending,
            kind: TransactionKind::Withdrawal,
            submission_id: None,
            payment_method: Some(request.method.clone()),
            details: Some(format!("Account: {}", request.account_ref.trim())),
        }
    }

    /// Copy status and amount from the owning submission.
    ///
    /// Rejection keeps the last amount shown to the user.
    pub fn sync_from(&mut self, submission: &Submission) -> Result<()> {
        if self.submission_id != Some(submission.id) {
            return Err(Error::NotFound(format!(
                "transaction {} does not mirror submission {}",
                self.id, submission.id
            )));
        }

        self.status = submission.status;
        if submission.status != ReviewStatus::Rejected {
            self.amount = submission.amount;
        }
        Ok(())
    }

    /// Resolve a pending withdrawal
    pub fn resolve(&mut self, status: ReviewStatus) -> Result<()> {
        if self.kind != TransactionKind::Withdrawal {
            return Err(Error::NotFound(format!("withdrawal {}", self.id)));
        }

        if self.status != ReviewStatus::Pending {
            return Err(Error::InvalidTransition(format!(
                "withdrawal {} already {}",
                self.id, self.status
            )));
        }

        self.status = status;
        Ok(())
    }
}

/// Records listed newest first
pub trait Chronological {
    /// `(created_at, id)`; the UUIDv7 id breaks ties between equal timestamps
    fn sort_key(&self) -> (DateTime<Utc>, Uuid);
}

impl Chronological for Transaction {
    fn sort_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.created_at, self.id)
    }
}

impl Chronological for Submission {
    fn sort_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.created_at, self.id)
    }
}

/// Order records most recent first.
pub fn most_recent_first<T: Chronological>(entries: &mut [T]) {
    entries.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SubmissionRequest, TaskDefinition};
    use rust_decimal::Decimal;

    fn submission() -> Submission {
        Submission::create(
            UserId::new("u1"),
            &TaskDefinition::new("t1", "Facebook 2FA Setup", Decimal::from(7), "ID"),
            SubmissionRequest {
                task_id: "t1".into(),
                details: "3 accounts".into(),
                evidence: Some("shot.png".into()),
                amount: Decimal::from(21),
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn withdrawal_request() -> WithdrawalRequest {
        WithdrawalRequest {
            method: "bKash".into(),
            account_ref: " 01712345678 ".into(),
            amount: Decimal::from(30),
        }
    }

    #[test]
    fn test_earning_mirrors_submission() {
        let sub = submission();
        let tx = Transaction::earning(&sub);
        assert_eq!(tx.kind, TransactionKind::Earning);
        assert_eq!(tx.submission_id, Some(sub.id));
        assert_eq!(tx.label, "Facebook 2FA Setup");
        assert_eq!(tx.amount, Decimal::from(21));
        assert_eq!(tx.status, ReviewStatus::Pending);
    }

    #[test]
    fn test_sync_from_rejects_foreign_submission() {
        let sub = submission();
        let mut tx = Transaction::earning(&sub);
        let other = submission();
        assert!(matches!(tx.sync_from(&other), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_sync_keeps_amount_on_rejection() {
        let mut sub = submission();
        let mut tx = Transaction::earning(&sub);

        sub.status = ReviewStatus::Rejected;
        sub.amount = Decimal::ZERO;
        tx.sync_from(&sub).unwrap();

        assert_eq!(tx.status, ReviewStatus::Rejected);
        assert_eq!(tx.amount, Decimal::from(21));
    }

    #[test]
    fn test_withdrawal_entry() {
        let tx = Transaction::withdrawal(UserId::new("u1"), &withdrawal_request(), Utc::now());
        assert_eq!(tx.label, WITHDRAWAL_LABEL);
        assert_eq!(tx.payment_method.as_deref(), Some("bKash"));
        assert_eq!(tx.details.as_deref(), Some("Account: 01712345678"));
        assert_eq!(tx.amount, Decimal::from(30));
    }

    #[test]
    fn test_resolve_once() {
        let mut tx = Transaction::withdrawal(UserId::new("u1"), &withdrawal_request(), Utc::now());
        tx.resolve(ReviewStatus::Rejected).unwrap();
        assert_eq!(tx.status, ReviewStatus::Rejected);

        let again = tx.resolve(ReviewStatus::Approved);
        assert!(matches!(again, Err(Error::InvalidTransition(_))));
        assert_eq!(tx.status, ReviewStatus::Rejected);
    }

    #[test]
    fn test_resolve_refuses_earnings() {
        let mut tx = Transaction::earning(&submission());
        assert!(matches!(
            tx.resolve(ReviewStatus::Approved),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_most_recent_first() {
        let now = Utc::now();
        let mut older = Transaction::withdrawal(UserId::new("u1"), &withdrawal_request(), now);
        older.created_at = now - chrono::Duration::seconds(10);
        let mut newer = Transaction::withdrawal(UserId::new("u1"), &withdrawal_request(), now);
        newer.id = Uuid::from_u128(1);
        let mut tied = Transaction::withdrawal(UserId::new("u1"), &withdrawal_request(), now);
        tied.id = Uuid::from_u128(2);

        let mut entries = vec![older.clone(), newer.clone(), tied.clone()];
        most_recent_first(&mut entries);

        assert_eq!(entries[0].id, tied.id);
        assert_eq!(entries[1].id, newer.id);
        assert_eq!(entries[2].id, older.id);
    }

    #[test]
    fn test_submissions_share_ordering() {
        let now = Utc::now();
        let mut first = submission();
        first.created_at = now;
        first.id = Uuid::from_u128(1);
        let mut second = submission();
        second.created_at = now;
        second.id = Uuid::from_u128(2);
        let mut oldest = submission();
        oldest.created_at = now - chrono::Duration::minutes(1);

        let mut subs = vec![oldest.clone(), first.clone(), second.clone()];
        most_recent_first(&mut subs);

        let ids: Vec<Uuid> = subs.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second.id, first.id, oldest.id]);
    }
}
