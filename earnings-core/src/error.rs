//! Error types for the earnings ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown submission, transaction or withdrawal id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transition attempted from a state that does not allow it
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Negative quantity override
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Withdrawal exceeds available balance
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        /// Requested amount
        requested: rust_decimal::Decimal,
        /// Available balance at request time
        available: rust_decimal::Decimal,
    },

    /// Task reference does not resolve to a usable definition
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// Claimed or requested amount is not positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Withdrawal below the configured minimum
    #[error("Withdrawal below minimum: requested {requested}, minimum {minimum}")]
    BelowMinimum {
        /// Requested amount
        requested: rust_decimal::Decimal,
        /// Configured minimum
        minimum: rust_decimal::Decimal,
    },

    /// Withdrawal method not configured
    #[error("Unknown withdrawal method: {0}")]
    UnknownMethod(String),

    /// Payout account reference rejected
    #[error("Invalid account reference: {0}")]
    InvalidAccountRef(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for expected business conditions surfaced to the operator or user.
    ///
    /// Everything else is an infrastructure failure.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::InvalidTransition(_)
                | Error::InvalidQuantity(_)
                | Error::InsufficientFunds { .. }
                | Error::InvalidTask(_)
                | Error::InvalidAmount(_)
                | Error::BelowMinimum { .. }
                | Error::UnknownMethod(_)
                | Error::InvalidAccountRef(_)
        )
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
