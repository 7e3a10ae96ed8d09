//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `balances` - One balance per user (key: user id)
//! - `submissions` - Submissions (key: submission_id)
//! - `transactions` - Journal entries (key: transaction_id)
//! - `indices` - Secondary indices for per-user listing and lookups
//!
//! Every mutation goes through [`Storage::commit`], which writes the balance,
//! the records and their index entries in a single `WriteBatch`.

use crate::{
    balance::Balance,
    error::{Error, Result},
    types::{Submission, Transaction, TransactionKind, UserId},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_BALANCES: &str = "balances";
const CF_SUBMISSIONS: &str = "submissions";
const CF_TRANSACTIONS: &str = "transactions";
const CF_INDICES: &str = "indices";

/// Index tags
const IDX_USER_SUBMISSION: u8 = b's';
const IDX_USER_TRANSACTION: u8 = b't';
const IDX_SUBMISSION_EARNING: u8 = b'e';
const IDX_WITHDRAWAL: u8 = b'w';

/// Records written together in one atomic batch
#[derive(Debug, Clone, Default)]
pub struct Commit {
    /// Updated balance
    pub balance: Option<(UserId, Balance)>,
    /// New or updated submission
    pub submission: Option<Submission>,
    /// New or updated journal entry
    pub transaction: Option<Transaction>,
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").field("path", &self.db.path()).finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_BALANCES, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_SUBMISSIONS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened earnings store");

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_records() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Reads

    /// Get balance, zero when the user has none yet
    pub fn get_balance(&self, user: &UserId) -> Result<Balance> {
        let cf = self.cf_handle(CF_BALANCES)?;

        match self.db.get_cf(cf, user.as_str().as_bytes())? {
            Some(value) => Ok(bincode::deserialize(&value)?),
            None => Ok(Balance::zero()),
        }
    }

    /// Get submission by ID
    pub fn get_submission(&self, submission_id: Uuid) -> Result<Submission> {
        let cf = self.cf_handle(CF_SUBMISSIONS)?;

        let value = self
            .db
            .get_cf(cf, submission_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("submission {}", submission_id)))?;

        Ok(bincode::deserialize(&value)?)
    }

    /// Get journal entry by ID
    pub fn get_transaction(&self, transaction_id: Uuid) -> Result<Transaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;

        let value = self
            .db
            .get_cf(cf, transaction_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", transaction_id)))?;

        Ok(bincode::deserialize(&value)?)
    }

    /// Get the EARNING entry mirroring a submission
    pub fn get_earning_transaction(&self, submission_id: Uuid) -> Result<Transaction> {
        let cf = self.cf_handle(CF_INDICES)?;
        let key = Self::index_key_submission_earning(submission_id);

        let value = self.db.get_cf(cf, &key)?.ok_or_else(|| {
            Error::NotFound(format!("earning entry for submission {}", submission_id))
        })?;

        self.get_transaction(Self::uuid_from_slice(&value)?)
    }

    /// All submissions of one user
    pub fn user_submissions(&self, user: &UserId) -> Result<Vec<Submission>> {
        let prefix = Self::index_prefix_user(IDX_USER_SUBMISSION, user);
        self.scan_index(&prefix)?
            .into_iter()
            .map(|id| self.get_submission(id))
            .collect()
    }

    /// All journal entries of one user
    pub fn user_transactions(&self, user: &UserId) -> Result<Vec<Transaction>> {
        let prefix = Self::index_prefix_user(IDX_USER_TRANSACTION, user);
        self.scan_index(&prefix)?
            .into_iter()
            .map(|id| self.get_transaction(id))
            .collect()
    }

    /// All withdrawal entries
    pub fn withdrawals(&self) -> Result<Vec<Transaction>> {
        self.scan_index(&[IDX_WITHDRAWAL])?
            .into_iter()
            .map(|id| self.get_transaction(id))
            .collect()
    }

    /// All submissions, every user
    pub fn all_submissions(&self) -> Result<Vec<Submission>> {
        let cf = self.cf_handle(CF_SUBMISSIONS)?;

        let mut submissions = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            submissions.push(bincode::deserialize(&value)?);
        }

        Ok(submissions)
    }

    // Writes

    /// Write balance, records and indices atomically
    pub fn commit(&self, commit: &Commit) -> Result<()> {
        let mut batch = WriteBatch::default();

        if let Some((user, balance)) = &commit.balance {
            let cf = self.cf_handle(CF_BALANCES)?;
            batch.put_cf(cf, user.as_str().as_bytes(), bincode::serialize(balance)?);
        }

        let cf_indices = self.cf_handle(CF_INDICES)?;

        if let Some(submission) = &commit.submission {
            let cf = self.cf_handle(CF_SUBMISSIONS)?;
            batch.put_cf(cf, submission.id.as_bytes(), bincode::serialize(submission)?);

            let idx = Self::index_key_user(IDX_USER_SUBMISSION, &submission.user, submission.id);
            batch.put_cf(cf_indices, &idx, b"");
        }

        if let Some(transaction) = &commit.transaction {
            let cf = self.cf_handle(CF_TRANSACTIONS)?;
            batch.put_cf(cf, transaction.id.as_bytes(), bincode::serialize(transaction)?);

            let idx = Self::index_key_user(IDX_USER_TRANSACTION, &transaction.user, transaction.id);
            batch.put_cf(cf_indices, &idx, b"");

            match transaction.kind {
                TransactionKind::Earning => {
                    if let Some(submission_id) = transaction.submission_id {
                        let idx = Self::index_key_submission_earning(submission_id);
                        batch.put_cf(cf_indices, &idx, transaction.id.as_bytes());
                    }
                }
                TransactionKind::Withdrawal => {
                    let mut idx = vec![IDX_WITHDRAWAL];
                    idx.extend_from_slice(transaction.id.as_bytes());
                    batch.put_cf(cf_indices, &idx, b"");
                }
            }
        }

        self.db.write(batch)?;

        tracing::debug!(
            balance = commit.balance.is_some(),
            submission = ?commit.submission.as_ref().map(|s| s.id),
            transaction = ?commit.transaction.as_ref().map(|t| t.id),
            "Commit written"
        );

        Ok(())
    }

    // Index key helpers

    /// `tag || len(user) || user`; the length keeps one user's prefix from
    /// matching another user whose id extends it.
    fn index_prefix_user(tag: u8, user: &UserId) -> Vec<u8> {
        let bytes = user.as_str().as_bytes();
        let mut key = Vec::with_capacity(1 + 4 + bytes.len() + 16);
        key.push(tag);
        key.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        key.extend_from_slice(bytes);
        key
    }

    fn index_key_user(tag: u8, user: &UserId, id: Uuid) -> Vec<u8> {
        let mut key = Self::index_prefix_user(tag, user);
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn index_key_submission_earning(submission_id: Uuid) -> Vec<u8> {
        let mut key = vec![IDX_SUBMISSION_EARNING];
        key.extend_from_slice(submission_id.as_bytes());
        key
    }

    /// Ids stored as the trailing 16 bytes of every key under `prefix`
    fn scan_index(&self, prefix: &[u8]) -> Result<Vec<Uuid>> {
        let cf = self.cf_handle(CF_INDICES)?;

        let mut ids = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            if key.len() == prefix.len() + 16 {
                ids.push(Self::uuid_from_slice(&key[prefix.len()..])?);
            }
        }

        Ok(ids)
    }

    fn uuid_from_slice(bytes: &[u8]) -> Result<Uuid> {
        Uuid::from_slice(bytes).map_err(|e| Error::Storage(format!("Corrupt index entry: {}", e)))
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("Earnings store closed");
        Ok(())
    }
}
