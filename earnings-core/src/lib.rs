//! TaskPay Earnings Core
//!
//! Per-user earnings ledger for a task-reward app: users claim rewards for
//! completed tasks, operators review the claims, and approved earnings
//! become withdrawable funds.
//!
//! # Architecture
//!
//! - **Reservation**: A claim reserves its amount as pending until reviewed
//! - **Single Writer per User**: Writes are routed to a sharded actor pool
//! - **Atomic Commits**: Balance, submission and journal entry land in one batch
//! - **Journal**: Every money movement is a transaction entry the user can see
//!
//! # Invariants
//!
//! - `pending` and `available` never go below zero through the review workflow
//! - `total` only grows by approved amounts
//! - Terminal records (APPROVED, REJECTED) never change again
//! - An earning entry mirrors the status and amount of its submission

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod balance;
pub mod workflow;
pub mod journal;
pub mod withdrawal;
pub mod catalog;
pub mod storage;
pub mod ledger;
pub mod error;
pub mod actor;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    Money, ReviewDepth, ReviewStatus, ReviewSummary, Submission, SubmissionRequest,
    TaskDefinition, Transaction, TransactionKind, UserId, WithdrawalDecision, WithdrawalRequest,
};
pub use balance::Balance;
pub use catalog::{InMemoryCatalog, TaskCatalog};
pub use withdrawal::RefundPolicy;
pub use workflow::Transition;
pub use ledger::Ledger;
pub use config::Config;
