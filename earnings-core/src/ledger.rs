//! Main ledger orchestration layer
//!
//! This module ties together storage, the writer actors and the task
//! catalog into the API used by the app and operator screens.
//!
//! Writes are routed to the shard actor owning the user; reads go straight
//! to storage, where every commit is a single atomic batch.
//!
//! # Example
//!
//! ```no_run
//! use earnings_core::{Config, InMemoryCatalog, Ledger};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> earnings_core::Result<()> {
//!     let catalog = Arc::new(InMemoryCatalog::new());
//!     let ledger = Ledger::open(Config::default(), catalog).await?;
//!
//!     // let submission = ledger.create_submission(&user, request).await?;
//!     // ledger.approve_submission(submission.id, Some(8)).await?;
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_writer_pool, WriterPool},
    balance::Balance,
    catalog::TaskCatalog,
    journal::most_recent_first,
    metrics::Metrics,
    storage::Storage,
    types::{
        ReviewStatus, ReviewSummary, Submission, SubmissionRequest, Transaction, UserId,
        WithdrawalDecision, WithdrawalRequest,
    },
    workflow::Transition,
    Config, Error, Result,
};
use std::sync::Arc;
use uuid::Uuid;

/// Main ledger interface
pub struct Ledger {
    /// Shard actors for writes
    writers: WriterPool,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Task pricing lookup
    catalog: Arc<dyn TaskCatalog>,

    /// Metrics
    metrics: Arc<Metrics>,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config, catalog: Arc<dyn TaskCatalog>) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Arc::new(
            Metrics::new().map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?,
        );
        let writers = spawn_writer_pool(storage.clone(), &config, metrics.clone());

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            shards = writers.shards(),
            review_depth = ?config.review.depth,
            refund_policy = ?config.withdrawal.refund_policy,
            "Ledger opened"
        );

        Ok(Self {
            writers,
            storage,
            catalog,
            metrics,
            config,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    // Submission workflow

    /// Record a user's claim and reserve the claimed amount
    pub async fn create_submission(
        &self,
        user: &UserId,
        request: SubmissionRequest,
    ) -> Result<Submission> {
        let task = self
            .catalog
            .resolve_task(&request.task_id)
            .ok_or_else(|| Error::InvalidTask(format!("unknown task {}", request.task_id)))?;

        self.writers
            .for_user(user)
            .create_submission(user.clone(), task, request)
            .await
    }

    /// First review stage (staged review only)
    pub async fn advance_submission(
        &self,
        submission_id: Uuid,
        override_quantity: Option<i64>,
    ) -> Result<Submission> {
        self.transition(submission_id, Transition::Advance { override_quantity })
            .await
    }

    /// Final approval; credits the approved amount
    pub async fn approve_submission(
        &self,
        submission_id: Uuid,
        override_quantity: Option<i64>,
    ) -> Result<Submission> {
        self.transition(submission_id, Transition::Approve { override_quantity })
            .await
    }

    /// Rejection; releases the reservation
    pub async fn reject_submission(&self, submission_id: Uuid) -> Result<Submission> {
        self.transition(submission_id, Transition::Reject).await
    }

    async fn transition(&self, submission_id: Uuid, transition: Transition) -> Result<Submission> {
        // Owner never changes, so routing on a plain read is safe; the actor
        // re-reads the submission before mutating it.
        let owner = self.storage.get_submission(submission_id)?.user;

        self.writers
            .for_user(&owner)
            .transition(submission_id, transition)
            .await
    }

    // Withdrawal flow

    /// Debit and journal a withdrawal request
    pub async fn request_withdrawal(
        &self,
        user: &UserId,
        request: WithdrawalRequest,
    ) -> Result<Transaction> {
        self.writers
            .for_user(user)
            .request_withdrawal(user.clone(), request)
            .await
    }

    /// Approve or reject a pending withdrawal
    pub async fn resolve_withdrawal(
        &self,
        transaction_id: Uuid,
        decision: WithdrawalDecision,
    ) -> Result<Transaction> {
        let owner = self.storage.get_transaction(transaction_id)?.user;

        self.writers
            .for_user(&owner)
            .resolve_withdrawal(transaction_id, decision)
            .await
    }

    // Reads

    /// Current balance, zero for unknown users
    pub async fn get_balance(&self, user: &UserId) -> Result<Balance> {
        self.storage.get_balance(user)
    }

    /// Get submission by ID
    pub async fn get_submission(&self, submission_id: Uuid) -> Result<Submission> {
        self.storage.get_submission(submission_id)
    }

    /// Journal of one user, most recent first
    pub async fn list_transactions(&self, user: &UserId) -> Result<Vec<Transaction>> {
        let mut transactions = self.storage.user_transactions(user)?;
        most_recent_first(&mut transactions);
        Ok(transactions)
    }

    /// Submissions of every user, optionally filtered by status, most recent first
    pub async fn list_submissions(&self, status: Option<ReviewStatus>) -> Result<Vec<Submission>> {
        let mut submissions: Vec<Submission> = self
            .storage
            .all_submissions()?
            .into_iter()
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .collect();
        most_recent_first(&mut submissions);
        Ok(submissions)
    }

    /// Submissions of one user, most recent first
    pub async fn list_user_submissions(&self, user: &UserId) -> Result<Vec<Submission>> {
        let mut submissions = self.storage.user_submissions(user)?;
        most_recent_first(&mut submissions);
        Ok(submissions)
    }

    /// Withdrawal entries of every user, optionally filtered by status, most recent first
    pub async fn list_withdrawals(&self, status: Option<ReviewStatus>) -> Result<Vec<Transaction>> {
        let mut withdrawals: Vec<Transaction> = self
            .storage
            .withdrawals()?
            .into_iter()
            .filter(|t| status.map_or(true, |wanted| t.status == wanted))
            .collect();
        most_recent_first(&mut withdrawals);
        Ok(withdrawals)
    }

    /// Queue sizes and value awaiting payout
    pub async fn review_summary(&self) -> Result<ReviewSummary> {
        let mut summary = ReviewSummary::default();

        for submission in self.storage.all_submissions()? {
            match submission.status {
                ReviewStatus::Pending => summary.pending += 1,
                ReviewStatus::Received => {
                    summary.received += 1;
                    summary.awaiting_payout += submission.amount;
                }
                ReviewStatus::Approved => summary.approved += 1,
                ReviewStatus::Rejected => summary.rejected += 1,
            }
        }

        Ok(summary)
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.writers.shutdown().await?;

        match Arc::try_unwrap(self.storage) {
            Ok(storage) => storage.close()?,
            Err(_) => tracing::warn!("Store still referenced at shutdown"),
        }

        tracing::info!("Ledger shut down");
        Ok(())
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("writers", &self.writers)
            .field("storage", &self.storage)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::types::{ReviewDepth, TaskDefinition, TransactionKind};
    use crate::withdrawal::RefundPolicy;
    use rust_decimal::Decimal;

    struct TestLedger {
        ledger: Ledger,
        _temp: tempfile::TempDir,
    }

    async fn create_test_ledger(configure: impl FnOnce(&mut Config)) -> TestLedger {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        configure(&mut config);

        let catalog = Arc::new(InMemoryCatalog::with_tasks([
            TaskDefinition::new("t1", "Facebook 2FA Setup", Decimal::from(7), "ID"),
            TaskDefinition::new("t3", "Survey Submission", Decimal::from(5), "STAR"),
        ]));

        TestLedger {
            ledger: Ledger::open(config, catalog).await.unwrap(),
            _temp: temp_dir,
        }
    }

    fn claim(task_id: &str, amount: i64) -> SubmissionRequest {
        SubmissionRequest {
            task_id: task_id.into(),
            details: "proof attached".into(),
            evidence: Some("evidence/shot.png".into()),
            amount: Decimal::from(amount),
        }
    }

    fn payout(amount: i64) -> WithdrawalRequest {
        WithdrawalRequest {
            method: "bKash".into(),
            account_ref: "01712345678".into(),
            amount: Decimal::from(amount),
        }
    }

    /// Give `user` an available balance through an approved submission
    async fn fund(ledger: &Ledger, user: &UserId, amount: i64) {
        let sub = ledger.create_submission(user, claim("t3", amount)).await.unwrap();
        if ledger.config().review.depth == ReviewDepth::Staged {
            ledger.advance_submission(sub.id, None).await.unwrap();
        }
        ledger.approve_submission(sub.id, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_ledger_open() {
        let t = create_test_ledger(|_| {}).await;
        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_submission_reserves_pending() {
        let t = create_test_ledger(|_| {}).await;
        let user = UserId::new("u1");

        let sub = t.ledger.create_submission(&user, claim("t3", 50)).await.unwrap();
        assert_eq!(sub.quantity, 10);
        assert_eq!(sub.status, ReviewStatus::Pending);

        let balance = t.ledger.get_balance(&user).await.unwrap();
        assert_eq!(balance.pending, Decimal::from(50));
        assert_eq!(balance.total, Decimal::ZERO);

        let journal = t.ledger.list_transactions(&user).await.unwrap();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].kind, TransactionKind::Earning);
        assert_eq!(journal[0].submission_id, Some(sub.id));

        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_task_is_invalid() {
        let t = create_test_ledger(|_| {}).await;
        let user = UserId::new("u1");

        let result = t.ledger.create_submission(&user, claim("t9", 50)).await;
        assert!(matches!(result, Err(Error::InvalidTask(_))));
        assert_eq!(t.ledger.get_balance(&user).await.unwrap(), Balance::zero());
        assert!(t.ledger.list_transactions(&user).await.unwrap().is_empty());

        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reprice_on_approval_scenario() {
        let t = create_test_ledger(|c| c.review.depth = ReviewDepth::Direct).await;
        let user = UserId::new("u1");

        let sub = t.ledger.create_submission(&user, claim("t3", 50)).await.unwrap();
        assert_eq!(t.ledger.get_balance(&user).await.unwrap().pending, Decimal::from(50));

        t.ledger.approve_submission(sub.id, Some(8)).await.unwrap();

        let balance = t.ledger.get_balance(&user).await.unwrap();
        assert_eq!(balance.total, Decimal::from(40));
        assert_eq!(balance.available, Decimal::from(40));
        assert_eq!(balance.pending, Decimal::ZERO);
        assert_eq!(t.ledger.metrics().reservation_drift.get(), 1);

        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_staged_review_syncs_journal() {
        let t = create_test_ledger(|_| {}).await;
        let user = UserId::new("u1");

        let sub = t.ledger.create_submission(&user, claim("t1", 21)).await.unwrap();
        let received = t.ledger.advance_submission(sub.id, Some(2)).await.unwrap();
        assert_eq!(received.status, ReviewStatus::Received);
        assert_eq!(received.amount, Decimal::from(14));

        // Advancing moves no money
        let balance = t.ledger.get_balance(&user).await.unwrap();
        assert_eq!(balance.pending, Decimal::from(21));
        assert_eq!(balance.available, Decimal::ZERO);

        let journal = t.ledger.list_transactions(&user).await.unwrap();
        assert_eq!(journal[0].status, ReviewStatus::Received);
        assert_eq!(journal[0].amount, Decimal::from(14));

        let approved = t.ledger.approve_submission(sub.id, None).await.unwrap();
        assert_eq!(approved.amount, Decimal::from(14));

        let balance = t.ledger.get_balance(&user).await.unwrap();
        assert_eq!(balance.total, Decimal::from(14));
        assert_eq!(balance.pending, Decimal::ZERO);

        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reject_restores_pre_create_balance() {
        let t = create_test_ledger(|_| {}).await;
        let user = UserId::new("u1");
        let before = t.ledger.get_balance(&user).await.unwrap();

        let sub = t.ledger.create_submission(&user, claim("t3", 35)).await.unwrap();
        t.ledger.advance_submission(sub.id, Some(3)).await.unwrap();
        t.ledger.reject_submission(sub.id).await.unwrap();

        assert_eq!(t.ledger.get_balance(&user).await.unwrap(), before);

        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_terminal_resubmission_leaves_balance() {
        let t = create_test_ledger(|c| c.review.depth = ReviewDepth::Direct).await;
        let user = UserId::new("u1");

        let sub = t.ledger.create_submission(&user, claim("t3", 50)).await.unwrap();
        t.ledger.approve_submission(sub.id, None).await.unwrap();
        let settled = t.ledger.get_balance(&user).await.unwrap();

        let again = t.ledger.approve_submission(sub.id, None).await;
        assert!(matches!(again, Err(Error::InvalidTransition(_))));
        let reject = t.ledger.reject_submission(sub.id).await;
        assert!(matches!(reject, Err(Error::InvalidTransition(_))));

        assert_eq!(t.ledger.get_balance(&user).await.unwrap(), settled);

        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_ids_not_found() {
        let t = create_test_ledger(|_| {}).await;

        let result = t.ledger.approve_submission(Uuid::now_v7(), None).await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let result = t
            .ledger
            .resolve_withdrawal(Uuid::now_v7(), WithdrawalDecision::Approve)
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_withdrawal_rejection_retains_debit() {
        let t = create_test_ledger(|_| {}).await;
        let user = UserId::new("u1");
        fund(&t.ledger, &user, 100).await;

        let wd = t.ledger.request_withdrawal(&user, payout(30)).await.unwrap();
        assert_eq!(wd.status, ReviewStatus::Pending);
        assert_eq!(t.ledger.get_balance(&user).await.unwrap().available, Decimal::from(70));

        let resolved = t
            .ledger
            .resolve_withdrawal(wd.id, WithdrawalDecision::Reject)
            .await
            .unwrap();
        assert_eq!(resolved.status, ReviewStatus::Rejected);
        assert_eq!(t.ledger.get_balance(&user).await.unwrap().available, Decimal::from(70));

        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_withdrawal_rejection_refunds_under_policy() {
        let t = create_test_ledger(|c| {
            c.withdrawal.refund_policy = RefundPolicy::RefundOnReject;
        })
        .await;
        let user = UserId::new("u1");
        fund(&t.ledger, &user, 100).await;

        let wd = t.ledger.request_withdrawal(&user, payout(30)).await.unwrap();
        t.ledger
            .resolve_withdrawal(wd.id, WithdrawalDecision::Reject)
            .await
            .unwrap();
        assert_eq!(t.ledger.get_balance(&user).await.unwrap().available, Decimal::from(100));

        let twice = t
            .ledger
            .resolve_withdrawal(wd.id, WithdrawalDecision::Reject)
            .await;
        assert!(matches!(twice, Err(Error::InvalidTransition(_))));
        assert_eq!(t.ledger.get_balance(&user).await.unwrap().available, Decimal::from(100));

        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_withdrawal_insufficient_funds() {
        let t = create_test_ledger(|_| {}).await;
        let user = UserId::new("u1");
        fund(&t.ledger, &user, 25).await;

        let result = t.ledger.request_withdrawal(&user, payout(30)).await;
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));
        assert_eq!(t.ledger.get_balance(&user).await.unwrap().available, Decimal::from(25));
        assert!(t.ledger.list_withdrawals(None).await.unwrap().is_empty());

        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_listings_and_summary() {
        let t = create_test_ledger(|_| {}).await;
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");

        let a = t.ledger.create_submission(&u1, claim("t3", 10)).await.unwrap();
        let b = t.ledger.create_submission(&u2, claim("t1", 14)).await.unwrap();
        let c = t.ledger.create_submission(&u1, claim("t3", 20)).await.unwrap();

        t.ledger.advance_submission(b.id, None).await.unwrap();
        t.ledger.reject_submission(c.id).await.unwrap();

        let pending = t.ledger.list_submissions(Some(ReviewStatus::Pending)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a.id);

        let all = t.ledger.list_submissions(None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        assert_eq!(t.ledger.list_user_submissions(&u1).await.unwrap().len(), 2);

        let summary = t.ledger.review_summary().await.unwrap();
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.received, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.approved, 0);
        assert_eq!(summary.awaiting_payout, Decimal::from(14));

        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_overflowing_withdrawal_keeps_shard_alive() {
        let t = create_test_ledger(|c| {
            c.actor.shards = 1;
            c.withdrawal.enforce_available_funds = false;
        })
        .await;
        let user = UserId::new("u1");
        let neighbour = UserId::new("u2");
        let mut huge = payout(30);
        huge.amount = Decimal::MAX;

        t.ledger.request_withdrawal(&user, huge.clone()).await.unwrap();
        let after_first = t.ledger.get_balance(&user).await.unwrap();

        let second = t.ledger.request_withdrawal(&user, huge).await;
        assert!(matches!(second, Err(Error::InvalidAmount(_))));
        assert_eq!(t.ledger.get_balance(&user).await.unwrap(), after_first);
        assert_eq!(t.ledger.list_withdrawals(None).await.unwrap().len(), 1);

        // Same shard still serves commands
        let sub = t.ledger.create_submission(&neighbour, claim("t3", 10)).await.unwrap();
        assert_eq!(sub.status, ReviewStatus::Pending);

        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_get_balance_idempotent() {
        let t = create_test_ledger(|_| {}).await;
        let user = UserId::new("u1");
        t.ledger.create_submission(&user, claim("t3", 15)).await.unwrap();

        let first = t.ledger.get_balance(&user).await.unwrap();
        for _ in 0..5 {
            assert_eq!(t.ledger.get_balance(&user).await.unwrap(), first);
        }

        t.ledger.shutdown().await.unwrap();
    }
}
