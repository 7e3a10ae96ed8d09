//! Actor-based concurrency for the ledger
//!
//! Single writer per user, implemented as a fixed pool of Tokio actors:
//! - Each user is routed to exactly one shard, so all balance mutations of
//!   that user are serialized
//! - Different users on different shards proceed in parallel
//! - Bounded mailboxes give backpressure
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  Ledger (facade)                      │
//! │     user / operator commands from the app layer       │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ shard = blake3(user) % shards
//!         ┌─────────────┼─────────────┐
//!         ▼             ▼             ▼
//!   ┌──────────┐  ┌──────────┐  ┌──────────┐
//!   │ shard 0  │  │ shard 1  │  │ shard N  │   LedgerActor (single task)
//!   └────┬─────┘  └────┬─────┘  └────┬─────┘
//!        │  load → apply → Storage::commit (one WriteBatch)
//!        ▼             ▼             ▼
//! ┌──────────────────────────────────────────────────────┐
//! │                     RocksDB                           │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::{
    config::{Config, WithdrawalConfig},
    metrics::Metrics,
    storage::{Commit, Storage},
    types::{
        ReviewDepth, Submission, SubmissionRequest, TaskDefinition, Transaction, UserId,
        WithdrawalDecision, WithdrawalRequest,
    },
    withdrawal,
    workflow::{BalanceEffect, Transition},
    Error, Result,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Message sent to a ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Record a new submission and reserve its amount
    CreateSubmission {
        user: UserId,
        task: TaskDefinition,
        request: SubmissionRequest,
        response: oneshot::Sender<Result<Submission>>,
    },

    /// Operator transition on a submission
    Transition {
        submission_id: Uuid,
        transition: Transition,
        response: oneshot::Sender<Result<Submission>>,
    },

    /// Debit and journal a withdrawal
    RequestWithdrawal {
        user: UserId,
        request: WithdrawalRequest,
        response: oneshot::Sender<Result<Transaction>>,
    },

    /// Operator resolution of a withdrawal
    ResolveWithdrawal {
        transaction_id: Uuid,
        decision: WithdrawalDecision,
        response: oneshot::Sender<Result<Transaction>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that owns the writes of one shard of users
pub struct LedgerActor {
    /// Shard index
    shard: usize,

    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Review depth
    depth: ReviewDepth,

    /// Withdrawal rules
    withdrawal: WithdrawalConfig,

    /// Metrics
    metrics: Arc<Metrics>,
}

impl std::fmt::Debug for LedgerActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerActor")
            .field("shard", &self.shard)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        shard: usize,
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<LedgerMessage>,
        depth: ReviewDepth,
        withdrawal: WithdrawalConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            shard,
            storage,
            mailbox,
            depth,
            withdrawal,
            metrics,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if let LedgerMessage::Shutdown = msg {
                break;
            }
            self.handle_message(msg);
        }

        tracing::debug!(shard = self.shard, "Ledger actor stopped");
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::CreateSubmission {
                user,
                task,
                request,
                response,
            } => {
                let result = self.create_submission(user, &task, request);
                self.log_failure("create_submission", &result);
                let _ = response.send(result);
            }

            LedgerMessage::Transition {
                submission_id,
                transition,
                response,
            } => {
                let result = self.transition(submission_id, transition);
                self.log_failure("transition", &result);
                let _ = response.send(result);
            }

            LedgerMessage::RequestWithdrawal {
                user,
                request,
                response,
            } => {
                let result = self.request_withdrawal(user, &request);
                self.log_failure("request_withdrawal", &result);
                let _ = response.send(result);
            }

            LedgerMessage::ResolveWithdrawal {
                transaction_id,
                decision,
                response,
            } => {
                let result = self.resolve_withdrawal(transaction_id, decision);
                self.log_failure("resolve_withdrawal", &result);
                let _ = response.send(result);
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    fn log_failure<T>(&self, operation: &'static str, result: &Result<T>) {
        match result {
            Err(e) if e.is_business() => {
                tracing::debug!(shard = self.shard, operation, error = %e, "Command refused");
            }
            Err(e) => {
                tracing::error!(shard = self.shard, operation, error = %e, "Command failed");
            }
            Ok(_) => {}
        }
    }

    fn create_submission(
        &self,
        user: UserId,
        task: &TaskDefinition,
        request: SubmissionRequest,
    ) -> Result<Submission> {
        let submission = Submission::create(user, task, request, Utc::now())?;
        let transaction = Transaction::earning(&submission);

        let mut balance = self.storage.get_balance(&submission.user)?;
        balance.credit_pending(submission.reserved)?;

        self.storage.commit(&Commit {
            balance: Some((submission.user.clone(), balance)),
            submission: Some(submission.clone()),
            transaction: Some(transaction),
        })?;

        self.metrics.submissions_created.inc();
        tracing::info!(
            user = %submission.user,
            submission_id = %submission.id,
            task_id = %submission.task_id,
            amount = %submission.amount,
            quantity = submission.quantity,
            "Submission created"
        );

        Ok(submission)
    }

    fn transition(&self, submission_id: Uuid, transition: Transition) -> Result<Submission> {
        let mut submission = self.storage.get_submission(submission_id)?;
        let mut transaction = self.storage.get_earning_transaction(submission_id)?;
        let mut balance = self.storage.get_balance(&submission.user)?;

        let effect = submission.apply(self.depth, transition, Utc::now())?;
        transaction.sync_from(&submission)?;
        effect.apply_to(&mut balance)?;

        let balance_update = match effect {
            BalanceEffect::None => None,
            _ => Some((submission.user.clone(), balance)),
        };

        self.storage.commit(&Commit {
            balance: balance_update,
            submission: Some(submission.clone()),
            transaction: Some(transaction),
        })?;

        match (transition, effect) {
            (Transition::Advance { .. }, _) => self.metrics.submissions_advanced.inc(),
            (Transition::Approve { .. }, BalanceEffect::Settle { pending_delta, credit_amount }) => {
                self.metrics.submissions_approved.inc();
                if pending_delta != credit_amount {
                    self.metrics.reservation_drift.inc();
                    tracing::warn!(
                        user = %submission.user,
                        submission_id = %submission.id,
                        reserved = %pending_delta,
                        credited = %credit_amount,
                        "Approved amount differs from reservation"
                    );
                }
            }
            (Transition::Reject, _) => self.metrics.submissions_rejected.inc(),
            _ => {}
        }

        tracing::info!(
            user = %submission.user,
            submission_id = %submission.id,
            status = %submission.status,
            amount = %submission.amount,
            "Submission transitioned"
        );

        Ok(submission)
    }

    fn request_withdrawal(&self, user: UserId, request: &WithdrawalRequest) -> Result<Transaction> {
        let mut balance = self.storage.get_balance(&user)?;
        let transaction =
            withdrawal::request(&self.withdrawal, user.clone(), &mut balance, request, Utc::now())?;

        self.storage.commit(&Commit {
            balance: Some((user, balance)),
            submission: None,
            transaction: Some(transaction.clone()),
        })?;

        self.metrics.withdrawals_requested.inc();
        tracing::info!(
            user = %transaction.user,
            transaction_id = %transaction.id,
            method = %request.method,
            amount = %transaction.amount,
            available = %balance.available,
            "Withdrawal requested"
        );

        Ok(transaction)
    }

    fn resolve_withdrawal(
        &self,
        transaction_id: Uuid,
        decision: WithdrawalDecision,
    ) -> Result<Transaction> {
        let mut transaction = self.storage.get_transaction(transaction_id)?;
        let mut balance = self.storage.get_balance(&transaction.user)?;

        let refunded = withdrawal::resolve(
            self.withdrawal.refund_policy,
            &mut transaction,
            &mut balance,
            decision,
        )?;

        let balance_update = if refunded.is_zero() {
            None
        } else {
            Some((transaction.user.clone(), balance))
        };

        self.storage.commit(&Commit {
            balance: balance_update,
            submission: None,
            transaction: Some(transaction.clone()),
        })?;

        let label = match decision {
            WithdrawalDecision::Approve => "approve",
            WithdrawalDecision::Reject => "reject",
        };
        self.metrics.record_withdrawal_resolved(label);
        tracing::info!(
            user = %transaction.user,
            transaction_id = %transaction.id,
            status = %transaction.status,
            refunded = %refunded,
            "Withdrawal resolved"
        );

        Ok(transaction)
    }
}

/// Handle for sending messages to one actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Create a submission
    pub async fn create_submission(
        &self,
        user: UserId,
        task: TaskDefinition,
        request: SubmissionRequest,
    ) -> Result<Submission> {
        self.call(|response| LedgerMessage::CreateSubmission {
            user,
            task,
            request,
            response,
        })
        .await
    }

    /// Apply an operator transition
    pub async fn transition(&self, submission_id: Uuid, transition: Transition) -> Result<Submission> {
        self.call(|response| LedgerMessage::Transition {
            submission_id,
            transition,
            response,
        })
        .await
    }

    /// Request a withdrawal
    pub async fn request_withdrawal(
        &self,
        user: UserId,
        request: WithdrawalRequest,
    ) -> Result<Transaction> {
        self.call(|response| LedgerMessage::RequestWithdrawal {
            user,
            request,
            response,
        })
        .await
    }

    /// Resolve a withdrawal
    pub async fn resolve_withdrawal(
        &self,
        transaction_id: Uuid,
        decision: WithdrawalDecision,
    ) -> Result<Transaction> {
        self.call(|response| LedgerMessage::ResolveWithdrawal {
            transaction_id,
            decision,
            response,
        })
        .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Fixed set of shard actors
#[derive(Clone, Debug)]
pub struct WriterPool {
    handles: Vec<LedgerHandle>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl WriterPool {
    /// Handle of the shard owning `user`
    pub fn for_user(&self, user: &UserId) -> &LedgerHandle {
        &self.handles[shard_for(user, self.handles.len())]
    }

    /// Number of shards
    pub fn shards(&self) -> usize {
        self.handles.len()
    }

    /// Stop every shard and wait for the actors to drop their storage handle
    pub async fn shutdown(&self) -> Result<()> {
        for handle in &self.handles {
            handle.shutdown().await?;
        }

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();

        for task in tasks {
            task.await
                .map_err(|e| Error::Concurrency(format!("Ledger actor panicked: {}", e)))?;
        }
        Ok(())
    }
}

/// Stable shard assignment for a user
pub fn shard_for(user: &UserId, shards: usize) -> usize {
    let digest = blake3::hash(user.as_str().as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_be_bytes(prefix) % shards.max(1) as u64) as usize
}

/// Spawn one actor per shard
pub fn spawn_writer_pool(storage: Arc<Storage>, config: &Config, metrics: Arc<Metrics>) -> WriterPool {
    let mut tasks = Vec::new();
    let handles = (0..config.actor.shards.max(1))
        .map(|shard| {
            let (tx, rx) = mpsc::channel(config.actor.mailbox_capacity.max(1));
            let actor = LedgerActor::new(
                shard,
                storage.clone(),
                rx,
                config.review.depth,
                config.withdrawal.clone(),
                metrics.clone(),
            );

            tasks.push(tokio::spawn(async move {
                actor.run().await;
            }));

            LedgerHandle::new(tx)
        })
        .collect();

    WriterPool {
        handles,
        tasks: Arc::new(Mutex::new(tasks)),
    }
}
