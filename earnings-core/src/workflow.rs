//! Submission review state machine
//!
//! ```text
//!            advance (staged)           approve
//!  PENDING ───────────────────► RECEIVED ────────► APPROVED
//!     │  \                         │
//!     │   └── approve (direct) ────┼─────────────► APPROVED
//!     │                            │
//!     └──────── reject ────────────┴─────────────► REJECTED
//! ```
//!
//! Transitions only mutate the submission; the balance change they imply is
//! returned as a [`BalanceEffect`] so the caller can commit both atomically.

use crate::{
    balance::Balance,
    types::{Money, ReviewDepth, ReviewStatus, Submission, SubmissionRequest, TaskDefinition, UserId},
    Error, Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::RoundingStrategy;
use uuid::Uuid;

/// Operator action on a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First review stage, optional quantity override
    Advance {
        /// Replacement quantity
        override_quantity: Option<i64>,
    },
    /// Final approval, optional quantity override
    Approve {
        /// Replacement quantity
        override_quantity: Option<i64>,
    },
    /// Rejection from any non-terminal state
    Reject,
}

impl Transition {
    /// Target status
    pub fn target(&self) -> ReviewStatus {
        match self {
            Transition::Advance { .. } => ReviewStatus::Received,
            Transition::Approve { .. } => ReviewStatus::Approved,
            Transition::Reject => ReviewStatus::Rejected,
        }
    }
}

/// Balance change implied by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceEffect {
    /// Nothing to move
    None,
    /// Convert the reservation into earnings
    Settle {
        /// Reserved at creation
        pending_delta: Money,
        /// Approved amount
        credit_amount: Money,
    },
    /// Drop the reservation
    Release {
        /// Reserved at creation
        pending_delta: Money,
    },
}

impl BalanceEffect {
    /// Apply to a balance record
    pub fn apply_to(&self, balance: &mut Balance) -> Result<()> {
        match *self {
            BalanceEffect::None => Ok(()),
            BalanceEffect::Settle {
                pending_delta,
                credit_amount,
            } => balance.settle_approved(pending_delta, credit_amount),
            BalanceEffect::Release { pending_delta } => {
                balance.release_pending(pending_delta);
                Ok(())
            }
        }
    }
}

/// Quantity implied by a claimed amount, rounded half away from zero
pub fn derive_quantity(amount: Money, rate: Money) -> Result<i64> {
    amount
        .checked_div(rate)
        .map(|q| q.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|q| q.to_i64())
        .ok_or_else(|| Error::InvalidAmount(format!("{} cannot be priced at rate {}", amount, rate)))
}

/// Price a quantity at a rate
pub fn price(quantity: i64, rate: Money) -> Result<Money> {
    if quantity < 0 {
        return Err(Error::InvalidQuantity(quantity));
    }

    Money::from(quantity)
        .checked_mul(rate)
        .ok_or(Error::InvalidQuantity(quantity))
}

impl Submission {
    /// Build a new PENDING submission from a user claim
    pub fn create(
        user: UserId,
        task: &TaskDefinition,
        request: SubmissionRequest,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if task.rate <= Money::ZERO {
            return Err(Error::InvalidTask(format!(
                "task {} has non-positive rate {}",
                task.id, task.rate
            )));
        }

        if request.amount <= Money::ZERO {
            return Err(Error::InvalidAmount(format!(
                "claimed amount must be positive, got {}",
                request.amount
            )));
        }

        let quantity = derive_quantity(request.amount, task.rate)?;

        Ok(Self {
            id: Uuid::now_v7(),
            user,
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            rate: task.rate,
            rate_type: task.rate_type.clone(),
            quantity,
            amount: request.amount,
            reserved: request.amount,
            details: request.details,
            evidence: request.evidence,
            status: ReviewStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply an operator transition.
    ///
    /// On error the submission is left untouched.
    pub fn apply(
        &mut self,
        depth: ReviewDepth,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<BalanceEffect> {
        self.check_transition(depth, transition)?;

        let effect = match transition {
            Transition::Advance { override_quantity } => {
                self.reprice(override_quantity)?;
                BalanceEffect::None
            }
            Transition::Approve { override_quantity } => {
                self.reprice(override_quantity)?;
                BalanceEffect::Settle {
                    pending_delta: self.reserved,
                    credit_amount: self.amount,
                }
            }
            Transition::Reject => BalanceEffect::Release {
                pending_delta: self.reserved,
            },
        };

        self.status = transition.target();
        self.updated_at = now;

        Ok(effect)
    }

    fn check_transition(&self, depth: ReviewDepth, transition: Transition) -> Result<()> {
        let allowed = match (transition, self.status, depth) {
            (Transition::Advance { .. }, ReviewStatus::Pending, ReviewDepth::Staged) => true,
            (Transition::Approve { .. }, ReviewStatus::Received, ReviewDepth::Staged) => true,
            // RECEIVED under Direct only exists after a switch from Staged
            (
                Transition::Approve { .. },
                ReviewStatus::Pending | ReviewStatus::Received,
                ReviewDepth::Direct,
            ) => true,
            (Transition::Reject, ReviewStatus::Pending | ReviewStatus::Received, _) => true,
            _ => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(Error::InvalidTransition(format!(
                "submission {} cannot move from {} to {} ({:?} review)",
                self.id,
                self.status,
                transition.target(),
                depth
            )))
        }
    }

    fn reprice(&mut self, override_quantity: Option<i64>) -> Result<()> {
        let quantity = override_quantity.unwrap_or(self.quantity);
        let amount = price(quantity, self.rate)?;

        self.quantity = quantity;
        self.amount = amount;
        Ok(())
    }
}
